//! Audio output through rodio.
//!
//! `rodio::OutputStream` is not `Send`, so the stream is owned by a dedicated
//! thread for the lifetime of the sink. Only the `rodio::Sink`, which is
//! thread-safe, is shared with callers.

use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink};

const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    /// The output device has not been opened (yet).
    #[error("Audio output is not ready")]
    NotReady,
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),
}

/// Destination for synthesized speech.
pub trait PlaybackSink: Send + Sync + 'static {
    /// Replace whatever is playing with `audio` (an encoded file, e.g. MP3/WAV).
    fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError>;
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
    /// True while queued audio remains and output is not paused.
    fn is_playing(&self) -> bool;
    /// True while queued audio is held by `pause`.
    fn is_paused(&self) -> bool;
}

struct OutputThread {
    sink: Arc<Sink>,
    shutdown_tx: std_mpsc::Sender<()>,
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.sink.stop();
        let _ = self.shutdown_tx.send(());
    }
}

/// Default output device. The device is opened on first use and reopened on
/// a later call if opening failed.
#[derive(Default)]
pub struct RodioSink {
    output: Mutex<Option<OutputThread>>,
}

impl RodioSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn sink(&self) -> Result<Arc<Sink>, PlaybackError> {
        let mut output = self.output.lock().map_err(|_| PlaybackError::NotReady)?;
        if let Some(thread) = output.as_ref() {
            return Ok(thread.sink.clone());
        }

        let thread = open_output()?;
        let sink = thread.sink.clone();
        *output = Some(thread);
        Ok(sink)
    }

    fn current(&self) -> Option<Arc<Sink>> {
        self.output
            .lock()
            .ok()
            .and_then(|output| output.as_ref().map(|thread| thread.sink.clone()))
    }
}

fn open_output() -> Result<OutputThread, PlaybackError> {
    let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Option<Arc<Sink>>>(1);
    let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

    std::thread::Builder::new()
        .name("speech-output".to_string())
        .spawn(move || {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::error!("Failed to open audio output: {}", e);
                    let _ = ready_tx.send(None);
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    log::error!("Failed to create audio sink: {}", e);
                    let _ = ready_tx.send(None);
                    return;
                }
            };
            let _ = ready_tx.send(Some(sink));

            let _ = shutdown_rx.recv();
            drop(stream);
            log::debug!("Audio output released");
        })
        .map_err(|e| {
            log::error!("Failed to spawn audio output thread: {}", e);
            PlaybackError::NotReady
        })?;

    match ready_rx.recv_timeout(OPEN_TIMEOUT) {
        Ok(Some(sink)) => Ok(OutputThread { sink, shutdown_tx }),
        _ => Err(PlaybackError::NotReady),
    }
}

impl PlaybackSink for RodioSink {
    fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| PlaybackError::InvalidAudioFormat(e.to_string()))?;
        let sink = self.sink()?;

        sink.clear();
        sink.append(source);
        sink.play();
        Ok(())
    }

    fn pause(&self) {
        if let Some(sink) = self.current() {
            sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(sink) = self.current() {
            sink.play();
        }
    }

    fn stop(&self) {
        if let Some(sink) = self.current() {
            sink.clear();
        }
    }

    fn is_playing(&self) -> bool {
        self.current()
            .map(|sink| !sink.empty() && !sink.is_paused())
            .unwrap_or(false)
    }

    fn is_paused(&self) -> bool {
        self.current()
            .map(|sink| !sink.empty() && sink.is_paused())
            .unwrap_or(false)
    }
}
