//! HTTP client for the tutoring backend.
//!
//! JSON over HTTPS for everything except document upload, which is multipart.
//! Ordinary calls use the short request timeout; transcription, analysis and
//! content generation use the extended one.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::wire::{self, *};
use super::{BackendError, TutorBackend};
use crate::model::{
    AiReply, ContentAnalysis, LanguageDetection, PronunciationFeedback, QuizQuestion,
    ReadingPassage, StartConversationRequest, WritingExercise, WritingFeedback,
};
use crate::settings::AppSettings;

/// Which deadline a call runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    Standard,
    Extended,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    extended_timeout: Duration,
}

impl HttpBackend {
    pub fn new(settings: &AppSettings, api_key: Option<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            extended_timeout: Duration::from_secs(settings.extended_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn deadline(&self, deadline: Deadline) -> Duration {
        match deadline {
            Deadline::Standard => self.timeout,
            Deadline::Extended => self.extended_timeout,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, deadline: Deadline) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        log::debug!("POST {} (deadline {:?})", path, deadline);
        let request = self
            .client
            .post(self.url(path))
            .json(body)
            .timeout(self.deadline(deadline));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        read_response(path, response).await
    }
}

fn network_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Network(format!("request timed out: {}", e))
    } else {
        BackendError::Network(e.to_string())
    }
}

async fn read_response<R: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<R, BackendError> {
    let status = response.status();

    if status.is_success() {
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        wire::decode(body)
    } else {
        let error_text = response.text().await.unwrap_or_default();
        let message = wire::error_message(&error_text);
        log::error!("Backend error on {} ({}): {}", path, status.as_u16(), message);
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Content type for the upload extensions the client accepts.
fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl TutorBackend for HttpBackend {
    async fn start_conversation(
        &self,
        request: &StartConversationRequest,
    ) -> Result<String, BackendError> {
        let raw: ConversationRaw = self
            .post_json("/conversation/start", request, Deadline::Standard)
            .await?;
        log::info!("Conversation started: {}", raw.conversation_id);
        Ok(raw.conversation_id)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<AiReply, BackendError> {
        let raw: ReplyRaw = self
            .post_json(
                "/conversation/message",
                &SendMessageRequest {
                    conversation_id,
                    message,
                },
                Deadline::Standard,
            )
            .await?;
        raw.normalize()
    }

    async fn transcribe(
        &self,
        audio_base64: &str,
        language_code: &str,
    ) -> Result<String, BackendError> {
        log::info!(
            "Transcribing audio ({} base64 chars, language {})",
            audio_base64.len(),
            language_code
        );
        let raw: TranscriptRaw = self
            .post_json(
                "/speech/transcribe",
                &TranscribeRequest {
                    audio_data: audio_base64,
                    language_code,
                },
                Deadline::Extended,
            )
            .await?;
        Ok(raw.text)
    }

    async fn synthesize(&self, text: &str) -> Result<String, BackendError> {
        let raw: SynthesisRaw = self
            .post_json("/speech/synthesize", &TextRequest { text }, Deadline::Standard)
            .await?;
        Ok(raw.normalize())
    }

    async fn analyze_pronunciation(
        &self,
        audio_base64: &str,
        text: &str,
        expected_text: &str,
    ) -> Result<PronunciationFeedback, BackendError> {
        let raw: PronunciationRaw = self
            .post_json(
                "/speech/pronunciation",
                &PronunciationRequest {
                    audio_data: audio_base64,
                    text,
                    expected_text,
                },
                Deadline::Extended,
            )
            .await?;
        raw.normalize()
    }

    async fn analyze_writing(
        &self,
        text: &str,
        language: &str,
    ) -> Result<WritingFeedback, BackendError> {
        let raw: WritingRaw = self
            .post_json(
                "/writing/analyze",
                &WritingRequest { text, language },
                Deadline::Extended,
            )
            .await?;
        Ok(raw.normalize())
    }

    async fn analyze_upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ContentAnalysis, BackendError> {
        log::info!("Uploading {} ({} bytes) for analysis", file_name, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.url("/content/upload"))
            .multipart(form)
            .timeout(self.deadline(Deadline::Extended));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(network_error)?;
        let raw: ContentAnalysisRaw = read_response("/content/upload", response).await?;
        Ok(raw.normalize())
    }

    async fn analyze_content(&self, content: &str) -> Result<ContentAnalysis, BackendError> {
        let raw: ContentAnalysisRaw = self
            .post_json(
                "/content/analyze",
                &ContentRequest { content },
                Deadline::Extended,
            )
            .await?;
        Ok(raw.normalize())
    }

    async fn generate_passage(
        &self,
        prompt: &str,
        level: &str,
    ) -> Result<ReadingPassage, BackendError> {
        let raw: PassageRaw = self
            .post_json(
                "/content/passage",
                &GenerateRequest { prompt, level },
                Deadline::Extended,
            )
            .await?;
        raw.normalize()
    }

    async fn generate_exercise(
        &self,
        prompt: &str,
        level: &str,
    ) -> Result<WritingExercise, BackendError> {
        let raw: ExerciseRaw = self
            .post_json(
                "/content/exercise",
                &GenerateRequest { prompt, level },
                Deadline::Extended,
            )
            .await?;
        Ok(raw.normalize())
    }

    async fn generate_quiz(
        &self,
        content: &str,
        analysis: &str,
    ) -> Result<Vec<QuizQuestion>, BackendError> {
        let raw: QuizListRaw = self
            .post_json(
                "/content/quiz",
                &QuizRequest { content, analysis },
                Deadline::Extended,
            )
            .await?;
        Ok(raw
            .questions
            .into_iter()
            .map(QuizQuestionRaw::normalize)
            .collect())
    }

    async fn answer_question(
        &self,
        question: &str,
        content: &str,
        analysis: &str,
    ) -> Result<String, BackendError> {
        let raw: AnswerRaw = self
            .post_json(
                "/content/answer",
                &AnswerRequest {
                    question,
                    content,
                    analysis,
                },
                Deadline::Extended,
            )
            .await?;
        Ok(raw.answer)
    }

    async fn detect_language(&self, text: &str) -> Result<LanguageDetection, BackendError> {
        let raw: DetectionRaw = self
            .post_json("/language/detect", &TextRequest { text }, Deadline::Standard)
            .await?;
        Ok(raw.normalize())
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: Option<&str>,
    ) -> Result<String, BackendError> {
        let raw: TranslationRaw = self
            .post_json(
                "/language/translate",
                &TranslateRequest {
                    text,
                    target_language,
                    source_language,
                },
                Deadline::Standard,
            )
            .await?;
        Ok(raw.translated_text)
    }
}
