//! Sends finished recordings to the transcription collaborator.
//!
//! The backend applies the extended (60 s) deadline to this call. Failures are
//! reported to the caller, never retried here.

use std::sync::Arc;

use crate::audio::RecordedAudio;
use crate::backend::{wire, BackendError, TutorBackend};

/// Errors that can occur during transcription
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Transcription failed: {0}")]
    Failed(#[from] BackendError),
    /// The collaborator answered but recognized nothing.
    #[error("No speech was recognized")]
    Empty,
}

pub struct TranscriptionGateway {
    backend: Arc<dyn TutorBackend>,
}

impl TranscriptionGateway {
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self { backend }
    }

    /// Transcribe a recording with a language hint such as `en` or `zh`.
    pub async fn transcribe(
        &self,
        audio: &RecordedAudio,
        language_code: &str,
    ) -> Result<String, TranscriptionError> {
        let encoded = audio.to_base64();
        self.transcribe_base64(&encoded, language_code).await
    }

    /// Transcribe an already encoded payload. A `data:` prefix is stripped.
    pub async fn transcribe_base64(
        &self,
        payload: &str,
        language_code: &str,
    ) -> Result<String, TranscriptionError> {
        let audio_data = wire::strip_data_url_prefix(payload);
        let started = std::time::Instant::now();

        let text = match self.backend.transcribe(audio_data, language_code).await {
            Ok(text) => text.trim().to_string(),
            Err(e) if e.is_timeout() => {
                log::warn!("Transcription timed out after {:?}", started.elapsed());
                return Err(e.into());
            }
            Err(e) => {
                log::error!("Transcription failed: {}", e);
                return Err(e.into());
            }
        };

        log::info!(
            "Transcription finished in {:?}: {} chars",
            started.elapsed(),
            text.len()
        );

        if text.is_empty() {
            log::warn!("Transcription returned no text");
            return Err(TranscriptionError::Empty);
        }
        Ok(text)
    }
}
