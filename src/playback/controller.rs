//! Speaks tutor replies: synthesis, decoding, and a single playing flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::sink::{PlaybackError, PlaybackSink};
use crate::backend::{wire, TutorBackend};

/// Delay before the one retry when the sink is not ready.
pub const NOT_READY_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct SpeechPlaybackController {
    backend: Arc<dyn TutorBackend>,
    sink: Arc<dyn PlaybackSink>,
    playing: AtomicBool,
    retry_delay: Duration,
}

impl SpeechPlaybackController {
    pub fn new(backend: Arc<dyn TutorBackend>, sink: Arc<dyn PlaybackSink>) -> Self {
        Self {
            backend,
            sink,
            playing: AtomicBool::new(false),
            retry_delay: NOT_READY_RETRY_DELAY,
        }
    }

    /// Synthesize `text` and play it. Returns whether playback started.
    ///
    /// Never fails: synthesis, decoding, and device errors are logged and the
    /// call becomes a no-op.
    pub async fn play(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let payload = match self.backend.synthesize(text).await {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Speech synthesis failed: {}", e);
                return false;
            }
        };

        let audio = match decode_audio(&payload) {
            Ok(audio) => audio,
            Err(e) => {
                log::error!("Cannot play synthesized speech: {}", e);
                return false;
            }
        };

        match self.start(audio).await {
            Ok(()) => {
                self.playing.store(true, Ordering::SeqCst);
                log::info!("Speaking {} chars", text.chars().count());
                true
            }
            Err(e) => {
                log::warn!("Playback skipped: {}", e);
                false
            }
        }
    }

    async fn start(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
        match self.sink.play(audio.clone()) {
            Err(PlaybackError::NotReady) => {
                log::debug!("Audio output not ready, retrying in {:?}", self.retry_delay);
                tokio::time::sleep(self.retry_delay).await;
                self.sink.play(audio)
            }
            other => other,
        }
    }

    pub fn pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.sink.pause();
        }
    }

    /// Continue paused speech. Nothing happens unless the sink is paused.
    pub fn resume(&self) {
        if self.sink.is_paused() && !self.playing.swap(true, Ordering::SeqCst) {
            self.sink.resume();
        }
    }

    pub fn toggle(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.resume();
        }
    }

    pub fn stop(&self) {
        self.sink.stop();
        self.playing.store(false, Ordering::SeqCst);
    }

    /// The flag clears itself once the sink has drained.
    pub fn is_playing(&self) -> bool {
        if !self.playing.load(Ordering::SeqCst) {
            return false;
        }
        if !self.sink.is_playing() {
            self.playing.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }
}

/// Base64 audio, with or without a `data:...;base64,` prefix.
pub fn decode_audio(payload: &str) -> Result<Vec<u8>, PlaybackError> {
    let data = wire::strip_data_url_prefix(payload).trim();
    if data.is_empty() {
        return Err(PlaybackError::InvalidAudioFormat("empty audio payload".to_string()));
    }
    STANDARD
        .decode(data)
        .map_err(|e| PlaybackError::InvalidAudioFormat(e.to_string()))
}
