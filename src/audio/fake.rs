//! In-memory output used by engine tests.
//!
//! Records every decode and play call, keeps completion hooks so tests can
//! simulate a sound ending naturally, and fails on demand for chosen assets.

use super::{AudioOutput, CompletionHook, OutputCapabilities, SampleBuffer, Voice, VoiceMix};
use crate::error::AudioError;
use crate::soundscape::AssetHandle;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

/// How a recorded voice was started.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayKind {
    Buffer { mix: VoiceMix, looped: bool },
    Stream { volume: f32 },
}

/// One voice started on the fake output.
pub struct PlayRecord {
    pub asset: String,
    pub kind: PlayKind,
    pub stopped: Arc<AtomicBool>,
    on_end: Option<CompletionHook>,
}

/// Holds the next play call until released.
struct PlayGate {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

#[derive(Default)]
pub struct FakeOutput {
    open: AtomicBool,
    pub open_calls: AtomicUsize,
    pub fail_open: AtomicBool,
    pub stereo: bool,
    pub completion: bool,
    /// Asset labels whose decode/play fails.
    pub broken: Mutex<HashSet<String>>,
    pub decoded: Mutex<Vec<String>>,
    /// Decoded buffer address -> asset label.
    buffers: Mutex<Vec<(usize, String)>>,
    pub plays: Mutex<Vec<PlayRecord>>,
    pub buffer_length: Duration,
    gate: Mutex<Option<PlayGate>>,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self {
            stereo: true,
            completion: true,
            buffer_length: Duration::from_secs(1),
            ..Default::default()
        }
    }

    pub fn without_completion() -> Self {
        Self {
            completion: false,
            ..Self::new()
        }
    }

    pub fn mono() -> Self {
        Self {
            stereo: false,
            ..Self::new()
        }
    }

    pub fn break_asset(&self, label: &str) {
        self.broken.lock().unwrap().insert(label.to_string());
    }

    /// Makes the next `play_buffer` or `play_stream` call block. The
    /// returned receiver fires once the call is blocked; sending on the
    /// returned sender lets it continue.
    pub fn gate_next_play(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered, entered_rx) = mpsc::channel();
        let (release_tx, release) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(PlayGate { entered, release });
        (entered_rx, release_tx)
    }

    fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
    }

    pub fn decode_count(&self) -> usize {
        self.decoded.lock().unwrap().len()
    }

    /// Voices that were started and not stopped.
    pub fn sounding(&self) -> Vec<(String, PlayKind)> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.stopped.load(Ordering::SeqCst))
            .map(|p| (p.asset.clone(), p.kind.clone()))
            .collect()
    }

    /// Event voices (non-looped buffers) ever started.
    pub fn event_plays(&self) -> Vec<(String, VoiceMix)> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| match p.kind {
                PlayKind::Buffer { mix, looped: false } => Some((p.asset.clone(), mix)),
                _ => None,
            })
            .collect()
    }

    /// Fires the completion hook of every voice that has one, simulating
    /// all sounds reaching their natural end.
    pub fn finish_all(&self) {
        let hooks: Vec<CompletionHook> = self
            .plays
            .lock()
            .unwrap()
            .iter_mut()
            .filter_map(|p| {
                let hook = p.on_end.take()?;
                p.stopped.store(true, Ordering::SeqCst);
                Some(hook)
            })
            .collect();
        for hook in hooks {
            hook();
        }
    }

    fn label(asset: &AssetHandle) -> String {
        match asset {
            AssetHandle::Path(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            AssetHandle::Embedded(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    fn address(buffer: &SampleBuffer) -> usize {
        Arc::as_ptr(&buffer.samples) as *const f32 as usize
    }

    fn check(&self, label: &str) -> Result<(), AudioError> {
        if self.broken.lock().unwrap().contains(label) {
            return Err(AudioError::Decode {
                asset: label.to_string(),
                reason: "broken on purpose".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, asset: String, kind: PlayKind, on_end: Option<CompletionHook>) -> Box<dyn Voice> {
        let stopped = Arc::new(AtomicBool::new(false));
        self.plays.lock().unwrap().push(PlayRecord {
            asset,
            kind,
            stopped: Arc::clone(&stopped),
            on_end,
        });
        Box::new(FakeVoice { stopped })
    }
}

impl AudioOutput for FakeOutput {
    fn open(&self) -> Result<(), AudioError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable("no device".to_string()));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> OutputCapabilities {
        OutputCapabilities {
            stereo_panning: self.stereo,
        }
    }

    fn decode(&self, asset: &AssetHandle) -> Result<SampleBuffer, AudioError> {
        let label = Self::label(asset);
        self.check(&label)?;
        let frames = (self.buffer_length.as_secs_f64() * 1_000.0) as usize;
        let buffer = SampleBuffer::new(1, 1_000, vec![0.0_f32; frames.max(1)]);
        self.buffers
            .lock()
            .unwrap()
            .push((Self::address(&buffer), label.clone()));
        self.decoded.lock().unwrap().push(label);
        Ok(buffer)
    }

    fn play_buffer(
        &self,
        buffer: &SampleBuffer,
        mix: VoiceMix,
        looped: bool,
        on_end: Option<CompletionHook>,
    ) -> Result<Box<dyn Voice>, AudioError> {
        if !self.is_open() {
            return Err(AudioError::NotOpen);
        }
        self.pass_gate();
        let on_end = if self.completion { on_end } else { None };
        let address = Self::address(buffer);
        let asset = self
            .buffers
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, label)| label.clone())
            .unwrap_or_default();
        Ok(self.record(asset, PlayKind::Buffer { mix, looped }, on_end))
    }

    fn play_stream(&self, asset: &AssetHandle, volume: f32) -> Result<Box<dyn Voice>, AudioError> {
        if !self.is_open() {
            return Err(AudioError::NotOpen);
        }
        self.pass_gate();
        let label = Self::label(asset);
        self.check(&label)?;
        Ok(self.record(label, PlayKind::Stream { volume }, None))
    }

    fn signals_completion(&self) -> bool {
        self.completion
    }
}

struct FakeVoice {
    stopped: Arc<AtomicBool>,
}

impl Voice for FakeVoice {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
