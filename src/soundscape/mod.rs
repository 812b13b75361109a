//! Declarative soundscape data.
//!
//! A soundscape is an immutable bundle of continuously looping base layers
//! and candidate foreground events. This module provides the data types,
//! their validation, the mapping from identifiers to loadable assets, and
//! the built-in presets.

mod assets;
mod model;
mod presets;

pub use assets::{AssetHandle, AssetMap};
pub use model::{AudioEvent, BaseLayer, Soundscape};
pub use presets::{south_lake_union, PRESET_ASSET_EXTENSION};
