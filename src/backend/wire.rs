//! Wire formats of the tutoring backend and their normalization.
//!
//! The backend is inconsistent across its own endpoints. Each tolerated shape
//! is listed on the raw type that accepts it:
//!
//! - envelopes: `{success, data: {...}}` or the payload at the top level;
//!   `success: false` is an error carrying `error` or `message`
//! - dialogue reply: `content` or `text`
//! - synthesized audio: `audioData` as a bare string or `{audioData: string}`
//! - pronunciation: `overallScore`/`overall`, `fluencyScore`/`fluency`,
//!   `clarityScore`/`clarity`
//! - quiz `correctAnswer`: string, number or bool; reading `correctAnswer`:
//!   number or numeric string

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BackendError;
use crate::model::{
    AiReply, ContentAnalysis, Flashcard, LanguageDetection, PronunciationFeedback, QuizKind,
    QuizQuestion, ReadingPassage, ReadingQuestion, WritingExercise, WritingFeedback,
};
use crate::scoring::canonical_score;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest<'a> {
    pub conversation_id: &'a str,
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest<'a> {
    pub audio_data: &'a str,
    pub language_code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TextRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationRequest<'a> {
    pub audio_data: &'a str,
    pub text: &'a str,
    pub expected_text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct WritingRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ContentRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub level: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QuizRequest<'a> {
    pub content: &'a str,
    pub analysis: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AnswerRequest<'a> {
    pub question: &'a str,
    pub content: &'a str,
    pub analysis: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub target_language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<&'a str>,
}

// ============================================================================
// Envelope
// ============================================================================

/// Strip the `{success, data}` envelope, failing on `success: false`.
/// Payloads without a `data` member are returned whole.
pub fn unwrap_envelope(mut body: Value) -> Result<Value, BackendError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("error")
            .or_else(|| body.get("message"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "request was not successful".to_string());
        return Err(BackendError::Api {
            status: 200,
            message,
        });
    }

    if body.get("data").is_some_and(|data| !data.is_null()) {
        return Ok(body["data"].take());
    }
    Ok(body)
}

/// Unwrap the envelope and deserialize the payload.
pub fn decode<T: DeserializeOwned>(body: Value) -> Result<T, BackendError> {
    let payload = unwrap_envelope(body)?;
    serde_json::from_value(payload).map_err(|e| BackendError::Parse(e.to_string()))
}

/// Pull a readable message out of an error response body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => ["error", "message"]
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Object(obj)) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRaw {
    pub conversation_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyMetadataRaw {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRaw {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub metadata: Option<ReplyMetadataRaw>,
}

impl ReplyRaw {
    pub fn normalize(self) -> Result<AiReply, BackendError> {
        let text = self
            .content
            .filter(|c| !c.is_empty())
            .or(self.text)
            .ok_or_else(|| BackendError::Parse("reply has neither content nor text".into()))?;
        let metadata = self.metadata.unwrap_or_default();
        Ok(AiReply {
            text,
            language: metadata.language,
            confidence: metadata.confidence,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRaw {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AudioPayloadRaw {
    Bare(String),
    Wrapped {
        #[serde(rename = "audioData")]
        audio_data: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRaw {
    pub audio_data: AudioPayloadRaw,
}

impl SynthesisRaw {
    pub fn normalize(self) -> String {
        match self.audio_data {
            AudioPayloadRaw::Bare(s) => s,
            AudioPayloadRaw::Wrapped { audio_data } => audio_data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationRaw {
    #[serde(default, alias = "overall")]
    pub overall_score: Option<f64>,
    #[serde(default, alias = "fluency")]
    pub fluency_score: Option<f64>,
    #[serde(default, alias = "clarity")]
    pub clarity_score: Option<f64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl PronunciationRaw {
    pub fn normalize(self) -> Result<PronunciationFeedback, BackendError> {
        let overall = self
            .overall_score
            .map(canonical_score)
            .ok_or_else(|| BackendError::Parse("pronunciation result has no overall score".into()))?;
        Ok(PronunciationFeedback {
            overall,
            fluency: self.fluency_score.map(canonical_score).unwrap_or(overall),
            clarity: self.clarity_score.map(canonical_score).unwrap_or(overall),
            strengths: self.strengths,
            improvements: self.improvements,
            fallback: false,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingRaw {
    pub overall_score: f64,
    #[serde(default)]
    pub grammar_score: Option<f64>,
    #[serde(default)]
    pub vocabulary_score: Option<f64>,
    #[serde(default)]
    pub structure_score: Option<f64>,
    #[serde(default)]
    pub style_score: Option<f64>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl WritingRaw {
    pub fn normalize(self) -> WritingFeedback {
        let overall = canonical_score(self.overall_score);
        let sub = |s: Option<f64>| s.map(canonical_score).unwrap_or(overall);
        WritingFeedback {
            overall,
            grammar: sub(self.grammar_score),
            vocabulary: sub(self.vocabulary_score),
            structure: sub(self.structure_score),
            style: sub(self.style_score),
            suggestions: self.suggestions,
            strengths: self.strengths,
            improvements: self.improvements,
            fallback: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FlashcardRaw {
    #[serde(alias = "question", alias = "term")]
    pub front: String,
    #[serde(alias = "answer", alias = "definition")]
    pub back: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionRaw {
    pub question: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: Value,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl QuizQuestionRaw {
    pub fn normalize(self) -> QuizQuestion {
        let kind = match self.kind.as_deref() {
            Some("true_false") => QuizKind::TrueFalse,
            Some(_) => QuizKind::MultipleChoice,
            None if self.options.is_empty() => QuizKind::TrueFalse,
            None => QuizKind::MultipleChoice,
        };
        let options = if kind == QuizKind::TrueFalse && self.options.is_empty() {
            vec!["true".to_string(), "false".to_string()]
        } else {
            self.options
        };
        let correct_answer = match self.correct_answer {
            Value::String(s) => s,
            other => other.to_string(),
        };
        QuizQuestion {
            question: self.question,
            kind,
            options,
            correct_answer,
            explanation: self.explanation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentAnalysisRaw {
    #[serde(default)]
    pub analysis: Value,
    #[serde(default)]
    pub flashcards: Option<Vec<FlashcardRaw>>,
    #[serde(default, alias = "questions")]
    pub quiz: Option<Vec<QuizQuestionRaw>>,
}

impl ContentAnalysisRaw {
    pub fn normalize(self) -> ContentAnalysis {
        ContentAnalysis {
            analysis: value_to_text(self.analysis),
            flashcards: self
                .flashcards
                .unwrap_or_default()
                .into_iter()
                .map(|f| Flashcard {
                    front: f.front,
                    back: f.back,
                })
                .collect(),
            quiz: self
                .quiz
                .unwrap_or_default()
                .into_iter()
                .map(QuizQuestionRaw::normalize)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuizListRaw {
    pub questions: Vec<QuizQuestionRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingQuestionRaw {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: Value,
}

#[derive(Debug, Deserialize)]
pub struct PassageRaw {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(alias = "text", alias = "content")]
    pub passage: String,
    #[serde(default)]
    pub questions: Vec<ReadingQuestionRaw>,
}

impl PassageRaw {
    pub fn normalize(self) -> Result<ReadingPassage, BackendError> {
        let questions = self
            .questions
            .into_iter()
            .map(|q| {
                let correct_answer = match &q.correct_answer {
                    Value::Number(n) => n.as_u64().map(|n| n as usize),
                    Value::String(s) => s.trim().parse::<usize>().ok(),
                    _ => None,
                }
                .ok_or_else(|| {
                    BackendError::Parse(format!(
                        "reading question has non-index correctAnswer: {}",
                        q.correct_answer
                    ))
                })?;
                Ok(ReadingQuestion {
                    question: q.question,
                    options: q.options,
                    correct_answer,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(ReadingPassage {
            title: self.title.unwrap_or_else(|| "Reading Practice".to_string()),
            text: self.passage,
            questions,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ExerciseRaw {
    #[serde(alias = "exercise", alias = "content")]
    pub prompt: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl ExerciseRaw {
    pub fn normalize(self) -> WritingExercise {
        WritingExercise {
            prompt: self.prompt,
            hints: self.hints,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRaw {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRaw {
    pub detected_language: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub language_name: Option<String>,
    #[serde(default)]
    pub cultural_context: Option<Value>,
    #[serde(default = "default_true")]
    pub is_supported: bool,
    #[serde(default)]
    pub fallback_used: bool,
}

impl DetectionRaw {
    pub fn normalize(self) -> LanguageDetection {
        LanguageDetection {
            detected_language: self.detected_language,
            confidence: self.confidence,
            is_supported: self.is_supported,
            fallback_used: self.fallback_used,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRaw {
    pub translated_text: String,
}

fn default_true() -> bool {
    true
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ============================================================================
// Audio payloads
// ============================================================================

/// Remove a `data:<mime>;base64,` prefix, if present.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        if let Some(idx) = trimmed.find(";base64,") {
            return &trimmed[idx + ";base64,".len()..];
        }
        if let Some(idx) = trimmed.find(',') {
            return &trimmed[idx + 1..];
        }
    }
    trimmed
}
