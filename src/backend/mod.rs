//! Tutoring backend collaborator.
//!
//! Every remote operation the session core depends on is a method of
//! [`TutorBackend`]. Implementations return canonical domain types; the HTTP
//! implementation normalizes the backend's inconsistent payloads in `wire`.

mod http;
pub mod wire;

use async_trait::async_trait;

use crate::model::{
    AiReply, ContentAnalysis, LanguageDetection, PronunciationFeedback, QuizQuestion,
    ReadingPassage, StartConversationRequest, WritingExercise, WritingFeedback,
};

pub use http::HttpBackend;

/// Errors returned by collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport failure, including timeouts.
    #[error("Network error: {0}")]
    Network(String),
    /// Backend answered with a non-success status or `success: false`.
    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Response body did not match any tolerated shape.
    #[error("Failed to parse backend response: {0}")]
    Parse(String),
    /// Local file could not be read for upload.
    #[error("Failed to read file: {0}")]
    FileRead(String),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Network(msg) if msg.contains("timed out"))
    }
}

/// Remote AI services consumed by the tutoring session.
#[async_trait]
pub trait TutorBackend: Send + Sync + 'static {
    /// Open a conversation and return its identifier.
    async fn start_conversation(
        &self,
        request: &StartConversationRequest,
    ) -> Result<String, BackendError>;

    async fn send_message(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<AiReply, BackendError>;

    /// `audio_base64` has no `data:` prefix.
    async fn transcribe(
        &self,
        audio_base64: &str,
        language_code: &str,
    ) -> Result<String, BackendError>;

    /// Returns the synthesized audio as base64 (a `data:` prefix may remain).
    async fn synthesize(&self, text: &str) -> Result<String, BackendError>;

    async fn analyze_pronunciation(
        &self,
        audio_base64: &str,
        text: &str,
        expected_text: &str,
    ) -> Result<PronunciationFeedback, BackendError>;

    async fn analyze_writing(
        &self,
        text: &str,
        language: &str,
    ) -> Result<WritingFeedback, BackendError>;

    async fn analyze_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ContentAnalysis, BackendError>;

    async fn analyze_content(&self, content: &str) -> Result<ContentAnalysis, BackendError>;

    async fn generate_passage(
        &self,
        prompt: &str,
        level: &str,
    ) -> Result<ReadingPassage, BackendError>;

    async fn generate_exercise(
        &self,
        prompt: &str,
        level: &str,
    ) -> Result<WritingExercise, BackendError>;

    async fn generate_quiz(
        &self,
        content: &str,
        analysis: &str,
    ) -> Result<Vec<QuizQuestion>, BackendError>;

    async fn answer_question(
        &self,
        question: &str,
        content: &str,
        analysis: &str,
    ) -> Result<String, BackendError>;

    async fn detect_language(&self, text: &str) -> Result<LanguageDetection, BackendError>;

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: Option<&str>,
    ) -> Result<String, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = BackendError::Api {
            status: 401,
            message: "Invalid token".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid token"));
    }

    #[test]
    fn timeout_detection() {
        assert!(BackendError::Network("operation timed out".into()).is_timeout());
        assert!(!BackendError::Parse("timed out".into()).is_timeout());
    }

    #[test]
    fn backend_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BackendError>();
    }
}
