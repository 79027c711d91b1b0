//! Audio capture for speaking practice.
//!
//! `recorder` talks to the microphone (CPAL) and encodes WAV in memory (hound);
//! `capture` owns the recording lifecycle and the payload size limit.

pub mod capture;
pub mod recorder;

pub use capture::{AudioCaptureSession, CaptureError, RecordedAudio, RecordingState, MAX_RECORDING_BYTES};
pub use recorder::{ActiveCapture, CpalMicrophone, Microphone, MicrophoneError};
