//! Headless controller for the multipad.
//!
//! Owns one [`Engine`] behind a mutex so a UI or CLI thread can drive it
//! while a dedicated audio thread renders it to the output device. Also
//! offers offline rendering and sample loading with decode off the render
//! path.

use mp_audio::{AudioOutput, CpalOutput};
use mp_engine::SampleDecoder;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};

// Re-export common types so callers don't need the lower crates directly.
pub use mp_audio::AudioError;
pub use mp_engine::{ContextState, Engine, EngineConfig, EngineError, Frame, TrackControls};
pub use mp_formats::{encode_wav, load_wav, write_wav, FormatError, WavDecoder};
pub use mp_ir::{
    Gesture, InstrumentKind, NoteId, NoteInfo, RecordedEvent, Resolution, SampleBuffer, Scale,
    TRACK_COUNT,
};

/// Frames rendered per engine lock on the audio thread.
const RENDER_BLOCK: usize = 256;

/// Anything a controller operation can fail with.
#[derive(Debug)]
pub enum ControllerError {
    Engine(EngineError),
    Format(FormatError),
    Audio(AudioError),
    Io(std::io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Engine(e) => write!(f, "engine: {}", e),
            ControllerError::Format(e) => write!(f, "format: {}", e),
            ControllerError::Audio(e) => write!(f, "audio: {}", e),
            ControllerError::Io(e) => write!(f, "I/O: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControllerError::Engine(e) => Some(e),
            ControllerError::Format(e) => Some(e),
            ControllerError::Audio(e) => Some(e),
            ControllerError::Io(e) => Some(e),
        }
    }
}

impl From<EngineError> for ControllerError {
    fn from(e: EngineError) -> Self {
        ControllerError::Engine(e)
    }
}

impl From<FormatError> for ControllerError {
    fn from(e: FormatError) -> Self {
        ControllerError::Format(e)
    }
}

impl From<AudioError> for ControllerError {
    fn from(e: AudioError) -> Self {
        ControllerError::Audio(e)
    }
}

impl From<std::io::Error> for ControllerError {
    fn from(e: std::io::Error) -> Self {
        ControllerError::Io(e)
    }
}

/// Headless multipad controller.
pub struct Controller {
    engine: Arc<Mutex<Engine>>,
    live: Option<LiveHandle>,
}

struct LiveHandle {
    stop_signal: Arc<AtomicBool>,
    rendered: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// A poisoned lock only means another thread panicked mid-render; the
/// engine state is still usable.
fn lock(engine: &Mutex<Engine>) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    pub fn new(config: EngineConfig) -> Result<Self, ControllerError> {
        Ok(Self {
            engine: Arc::new(Mutex::new(Engine::new(config)?)),
            live: None,
        })
    }

    /// Lock the engine for direct use.
    pub fn engine(&self) -> MutexGuard<'_, Engine> {
        lock(&self.engine)
    }

    /// The shared engine handle.
    pub fn shared(&self) -> Arc<Mutex<Engine>> {
        Arc::clone(&self.engine)
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine().sample_rate()
    }

    // --- Samples ---

    /// Decode WAV bytes onto `track`. The engine stays locked for the decode.
    pub fn load_sample(&self, track: usize, bytes: &[u8], name: &str) -> Result<(), ControllerError> {
        self.engine().load_sample(&WavDecoder, track, bytes, name)?;
        Ok(())
    }

    /// Read and decode a WAV file onto `track`, named after the file stem.
    pub fn load_sample_file(&self, track: usize, path: impl AsRef<Path>) -> Result<(), ControllerError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.load_sample(track, &bytes, &name)
    }

    /// Decode on a worker thread, then install under the engine lock.
    /// Gestures arriving before the handle resolves play without the
    /// sample. The handle yields whether the sample was installed.
    pub fn load_sample_async(&self, track: usize, bytes: Vec<u8>, name: String) -> JoinHandle<bool> {
        let engine = Arc::clone(&self.engine);
        std::thread::spawn(move || {
            let buffer = match WavDecoder.decode(&bytes, &name) {
                Ok(buffer) if !buffer.is_empty() => buffer,
                Ok(_) => {
                    warn!("sample {:?} has no audio frames", name);
                    return false;
                }
                Err(e) => {
                    warn!("sample {:?} failed to decode: {}", name, e);
                    return false;
                }
            };
            let seconds = buffer.duration_seconds();
            match lock(&engine).install_sample(track, Arc::new(buffer)) {
                Ok(()) => {
                    info!("sample {:?} loaded on track {} ({:.2}s)", name, track, seconds);
                    true
                }
                Err(e) => {
                    warn!("sample {:?} not installed: {}", name, e);
                    false
                }
            }
        })
    }

    // --- Live output ---

    /// Open the output device at the engine's sample rate and render on a
    /// dedicated thread until [`Controller::stop_live`].
    pub fn start_live(&mut self) -> Result<(), ControllerError> {
        self.stop_live();

        let stop_signal = Arc::new(AtomicBool::new(false));
        let rendered = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let engine = Arc::clone(&self.engine);
        let stop = Arc::clone(&stop_signal);
        let count = Arc::clone(&rendered);
        let done = Arc::clone(&finished);
        let thread = std::thread::spawn(move || {
            audio_thread(engine, stop, count, done, ready_tx);
        });

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::DeviceInit("audio thread exited".into())));
        if let Err(e) = started {
            let _ = thread.join();
            return Err(e.into());
        }

        self.live = Some(LiveHandle {
            stop_signal,
            rendered,
            finished,
            thread: Some(thread),
        });
        Ok(())
    }

    pub fn stop_live(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = live.thread.take() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|l| !l.finished.load(Ordering::Relaxed))
    }

    /// Frames rendered by the live thread so far.
    pub fn live_frames(&self) -> u64 {
        self.live
            .as_ref()
            .map_or(0, |l| l.rendered.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Render `frames` frames from the shared engine, advancing its clock.
    pub fn render_frames(&self, frames: usize) -> Vec<Frame> {
        let mut out = vec![Frame::silence(); frames];
        self.engine().render_block(&mut out);
        out
    }

    /// Render `seconds` of audio into a 16-bit stereo WAV file image.
    pub fn render_to_wav(&self, seconds: f64) -> Result<Vec<u8>, ControllerError> {
        let rate = self.sample_rate();
        let frames = (seconds.max(0.0) * rate as f64) as usize;
        let rendered = self.render_frames(frames);
        Ok(encode_wav(&rendered, rate)?)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop_live();
    }
}

fn audio_thread(
    engine: Arc<Mutex<Engine>>,
    stop_signal: Arc<AtomicBool>,
    rendered: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), AudioError>>,
) {
    let rate = lock(&engine).sample_rate();
    let opened = CpalOutput::new(Some(rate)).and_then(|(mut output, consumer)| {
        output.build_stream(consumer)?;
        output.start()?;
        Ok(output)
    });
    let mut output = match opened {
        Ok(output) => output,
        Err(e) => {
            finished.store(true, Ordering::Relaxed);
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    info!("live output started at {} Hz", rate);

    let mut block = [Frame::silence(); RENDER_BLOCK];
    'render: while !stop_signal.load(Ordering::Relaxed) {
        lock(&engine).render_block(&mut block);
        rendered.fetch_add(RENDER_BLOCK as u64, Ordering::Relaxed);

        let mut pending = &block[..];
        while !pending.is_empty() {
            if stop_signal.load(Ordering::Relaxed) {
                break 'render;
            }
            let n = output.vacant().min(pending.len());
            output.write(&pending[..n]);
            pending = &pending[n..];
            if !pending.is_empty() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    if let Err(e) = output.stop() {
        warn!("stopping output: {}", e);
    }
    if output.underruns() > 0 {
        warn!("{} device frames underran", output.underruns());
    }
    info!("live output stopped");
    finished.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> Controller {
        Controller::new(EngineConfig {
            sample_rate: 8_000,
            reverb_seconds: 0.05,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn tone_wav(frames: usize) -> Vec<u8> {
        let frames: Vec<Frame> = (0..frames)
            .map(|i| {
                let v = if i % 16 < 8 { 8_000 } else { -8_000 };
                Frame { left: v, right: v }
            })
            .collect();
        encode_wav(&frames, 8_000).unwrap()
    }

    #[test]
    fn render_to_wav_has_header_and_length() {
        let c = controller();
        c.engine().play_note(0.2, 0.0, 1.0, 1.0, NoteId::Pointer(1), None, 0);
        let wav = c.render_to_wav(0.5).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 4_000 * 4);
        let decoded = load_wav(&wav, "out").unwrap();
        assert!(decoded.left.iter().any(|s| s.abs() > 0.001));
    }

    #[test]
    fn load_sample_installs_on_track() {
        let c = controller();
        c.load_sample(5, &tone_wav(400), "square").unwrap();
        assert_eq!(c.engine().sample_name(5), Some("square"));
        let err = c.load_sample(5, b"garbage", "bad").unwrap_err();
        assert!(matches!(err, ControllerError::Engine(EngineError::Decode(_))));
        assert_eq!(c.engine().sample_name(5), Some("square"));
    }

    #[test]
    fn async_load_reports_success() {
        let c = controller();
        let ok = c.load_sample_async(1, tone_wav(100), "tone".into());
        assert!(ok.join().unwrap());
        assert_eq!(c.engine().sample_name(1), Some("tone"));
        let bad = c.load_sample_async(1, vec![1, 2, 3], "broken".into());
        assert!(!bad.join().unwrap());
        let out_of_range = c.load_sample_async(12, tone_wav(100), "x".into());
        assert!(!out_of_range.join().unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let c = controller();
        let err = c.load_sample_file(0, "/nonexistent/sample.wav").unwrap_err();
        assert!(matches!(err, ControllerError::Io(_)));
    }

    #[test]
    fn not_live_until_started() {
        let c = controller();
        assert!(!c.is_live());
        assert_eq!(c.live_frames(), 0);
    }
}
