//! Recording lifecycle with a size-bounded payload.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use super::recorder::{ActiveCapture, Microphone, MicrophoneError};

/// Largest encoded recording that may be sent for transcription (1 MiB).
pub const MAX_RECORDING_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// The platform refused or could not provide the microphone.
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),
    /// The finalized recording exceeds the transport limit and was discarded.
    #[error("Recording is too large ({size} bytes, limit {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("No recording in progress")]
    NotRecording,
    /// Capture failed after the device was acquired.
    #[error("Audio device error: {0}")]
    Device(String),
}

impl From<MicrophoneError> for CaptureError {
    fn from(e: MicrophoneError) -> Self {
        match e {
            MicrophoneError::EncodeFailed(msg) => CaptureError::Device(msg),
            other => CaptureError::PermissionDenied(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Processing,
}

/// A finalized recording, ready for transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAudio {
    pub id: Uuid,
    pub wav: Vec<u8>,
}

impl RecordedAudio {
    pub fn size(&self) -> usize {
        self.wav.len()
    }

    /// Base64 without any `data:` prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.wav)
    }
}

/// Owns the microphone for one recording at a time.
pub struct AudioCaptureSession {
    microphone: Arc<dyn Microphone>,
    state: RecordingState,
    active: Option<(Uuid, Box<dyn ActiveCapture>)>,
    /// Recording cancelled before its start reached the device.
    cancelled: Option<Uuid>,
    /// Finalized recording awaiting `complete`.
    processing: Option<Uuid>,
    max_bytes: usize,
}

impl AudioCaptureSession {
    pub fn new(microphone: Arc<dyn Microphone>) -> Self {
        Self::with_limit(microphone, MAX_RECORDING_BYTES)
    }

    pub fn with_limit(microphone: Arc<dyn Microphone>, max_bytes: usize) -> Self {
        Self {
            microphone,
            state: RecordingState::Idle,
            active: None,
            cancelled: None,
            processing: None,
            max_bytes,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Acquire the microphone and start recording.
    ///
    /// Returns `Ok(false)` without touching the device when a recording is
    /// already active or still being processed, or when `id` was cancelled
    /// before it got here.
    pub fn start(&mut self, id: Uuid) -> Result<bool, CaptureError> {
        if self.cancelled == Some(id) {
            self.cancelled = None;
            log::info!("Recording {} was cancelled before it started", id);
            return Ok(false);
        }
        if self.state != RecordingState::Idle {
            log::debug!("Capture start ignored, state is {:?}", self.state);
            return Ok(false);
        }

        match self.microphone.open() {
            Ok(capture) => {
                self.active = Some((id, capture));
                self.state = RecordingState::Recording;
                log::info!("Recording {} started", id);
                Ok(true)
            }
            Err(e) => {
                self.state = RecordingState::Idle;
                log::error!("Microphone acquisition failed: {}", e);
                Err(CaptureError::from(e))
            }
        }
    }

    /// Finalize the recording and enter `Processing`.
    ///
    /// The device is released on every path. An oversized payload is discarded
    /// and the session returns to `Idle`.
    pub fn stop(&mut self) -> Result<RecordedAudio, CaptureError> {
        let Some((id, capture)) = self.active.take() else {
            return Err(CaptureError::NotRecording);
        };
        self.state = RecordingState::Processing;

        let wav = match capture.finish() {
            Ok(wav) => wav,
            Err(e) => {
                self.state = RecordingState::Idle;
                log::error!("Recording {} failed to finalize: {}", id, e);
                return Err(CaptureError::Device(e.to_string()));
            }
        };

        if wav.len() > self.max_bytes {
            self.state = RecordingState::Idle;
            log::warn!(
                "Recording {} discarded: {} bytes exceeds {} byte limit",
                id,
                wav.len(),
                self.max_bytes
            );
            return Err(CaptureError::PayloadTooLarge {
                size: wav.len(),
                limit: self.max_bytes,
            });
        }

        log::info!("Recording {} finalized ({} bytes)", id, wav.len());
        self.processing = Some(id);
        Ok(RecordedAudio { id, wav })
    }

    /// Downstream processing is over; accept new recordings.
    pub fn complete(&mut self) {
        if self.state == RecordingState::Processing {
            self.state = RecordingState::Idle;
        }
        self.processing = None;
    }

    /// Cancel recording `id`, releasing the device if it holds it.
    ///
    /// A cancel that arrives before the matching `start` is remembered so the
    /// late start never opens the device. Another recording is left alone.
    pub fn abort(&mut self, id: Uuid) {
        match self.active.take() {
            Some((active_id, capture)) if active_id == id => {
                log::info!("Recording {} aborted", id);
                // The capture releases the device when finished or dropped.
                let _ = capture.finish();
                self.state = RecordingState::Idle;
            }
            Some(other) => {
                log::debug!("Abort of {} ignored, recording {} is active", id, other.0);
                self.active = Some(other);
            }
            None => match self.state {
                RecordingState::Idle => self.cancelled = Some(id),
                // Finalized but never handed on for transcription
                RecordingState::Processing if self.processing == Some(id) => {
                    log::info!("Recording {} discarded", id);
                    self.processing = None;
                    self.state = RecordingState::Idle;
                }
                _ => {}
            },
        }
    }
}
