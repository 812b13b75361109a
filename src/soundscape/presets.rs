//! Built-in soundscapes.

use super::model::{AudioEvent, BaseLayer, Soundscape};

/// File extension used when resolving preset assets from a directory.
pub const PRESET_ASSET_EXTENSION: &str = "mp3";

/// Lakeside city scene: wind, water and city hum, with footsteps, bikes
/// and the occasional seaplane.
pub fn south_lake_union() -> Soundscape {
    Soundscape::new("slu", "South Lake Union")
        .with_base_layer(BaseLayer::new("wind1", "Wind"))
        .with_base_layer(BaseLayer::new("water", "Water"))
        .with_base_layer(BaseLayer::new("hum", "City Hum"))
        .with_event(AudioEvent::new("footsteps", "Footsteps", 0.3, 5_000, 15_000))
        .with_event(AudioEvent::new("bikes", "Bikes", 0.25, 8_000, 20_000))
        .with_event(AudioEvent::new("seaplanes", "Seaplanes", 0.15, 20_000, 45_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_is_valid() {
        let scene = south_lake_union();
        assert!(scene.validate().is_ok());
        assert_eq!(scene.base_layers.len(), 3);
        assert_eq!(scene.events.len(), 3);
        assert!((scene.total_weight() - 0.7).abs() < 1e-9);
    }
}
