//! Domain types shared by the session core.
//!
//! Everything in here is canonical: collaborator responses are normalized into
//! these shapes at the backend boundary (see `backend::wire`) before the rest of
//! the crate ever sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Active learning activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Speaking,
    Reading,
    Writing,
    Listening,
    Flashcards,
    Quiz,
    Qa,
    #[default]
    None,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Speaking => "speaking",
            Mode::Reading => "reading",
            Mode::Writing => "writing",
            Mode::Listening => "listening",
            Mode::Flashcards => "flashcards",
            Mode::Quiz => "quiz",
            Mode::Qa => "qa",
            Mode::None => "none",
        }
    }

    /// Parse a mode name as typed by the user. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Mode> {
        let mode = match name.trim().to_lowercase().as_str() {
            "speaking" | "speak" => Mode::Speaking,
            "reading" | "read" => Mode::Reading,
            "writing" | "write" => Mode::Writing,
            "listening" | "listen" => Mode::Listening,
            "flashcards" | "flashcard" => Mode::Flashcards,
            "quiz" => Mode::Quiz,
            "qa" | "q&a" => Mode::Qa,
            "none" | "chat" => Mode::None,
            _ => return None,
        };
        Some(mode)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

/// One entry of the conversation log. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(Role::Ai, text.into())
    }

    fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            created_at: Utc::now(),
            language: None,
            confidence: None,
        }
    }

    pub fn with_language(mut self, language: Option<String>, confidence: Option<f32>) -> Self {
        self.language = language;
        self.confidence = confidence;
        self
    }
}

/// Progress card for one of the four skill activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningCard {
    pub id: String,
    pub mode: Mode,
    pub is_active: bool,
    /// 0..=100, never decreases.
    pub progress: u8,
    pub title: String,
}

impl LearningCard {
    pub fn new(mode: Mode, title: &str) -> Self {
        Self {
            id: format!("{}-card", mode.label()),
            mode,
            is_active: false,
            progress: 0,
            title: title.to_string(),
        }
    }

    /// The four skill cards shown on the tutoring dashboard.
    pub fn defaults() -> Vec<LearningCard> {
        vec![
            LearningCard::new(Mode::Speaking, "Speaking Practice"),
            LearningCard::new(Mode::Reading, "Reading Comprehension"),
            LearningCard::new(Mode::Writing, "Writing Skills"),
            LearningCard::new(Mode::Listening, "Listening Practice"),
        ]
    }
}

/// Request body for opening a conversation with the dialogue collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub scenario: String,
    pub language: String,
    pub proficiency_level: String,
}

/// Canonical AI dialogue reply.
#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub text: String,
    pub language: Option<String>,
    pub confidence: Option<f32>,
}

/// Canonical pronunciation scores, all on a 0..=10 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PronunciationFeedback {
    pub overall: f64,
    pub fluency: f64,
    pub clarity: f64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    /// Set when the collaborator failed and the local fallback was substituted.
    pub fallback: bool,
}

impl PronunciationFeedback {
    /// Neutral result shown when pronunciation analysis is unavailable.
    pub fn fallback() -> Self {
        Self {
            overall: 7.0,
            fluency: 7.0,
            clarity: 7.0,
            strengths: vec!["Clear effort and good attempt".to_string()],
            improvements: vec!["Keep practicing for better fluency".to_string()],
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritingFeedback {
    pub overall: f64,
    pub grammar: f64,
    pub vocabulary: f64,
    pub structure: f64,
    pub style: f64,
    pub suggestions: Vec<String>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub fallback: bool,
}

impl WritingFeedback {
    pub fn fallback() -> Self {
        Self {
            overall: 7.0,
            grammar: 7.0,
            vocabulary: 7.0,
            structure: 7.0,
            style: 7.0,
            suggestions: vec!["Review grammar and sentence structure".to_string()],
            strengths: vec!["Good effort expressing your ideas".to_string()],
            improvements: Vec::new(),
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    MultipleChoice,
    TrueFalse,
}

/// Quiz question as produced by content analysis. `correct_answer` holds the
/// answer text, not an option index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestion {
    pub question: String,
    pub kind: QuizKind,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// A learner's answer to one quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAnswer {
    /// Index into `QuizQuestion::options`.
    Choice(usize),
    /// Free answer, used for true/false questions.
    Text(String),
}

/// Result of analyzing an uploaded document or a text prompt.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContentAnalysis {
    pub analysis: String,
    pub flashcards: Vec<Flashcard>,
    pub quiz: Vec<QuizQuestion>,
}

/// Reading-comprehension question. Unlike quiz questions the answer is an
/// option index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingPassage {
    pub title: String,
    pub text: String,
    pub questions: Vec<ReadingQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WritingExercise {
    pub prompt: String,
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    pub detected_language: String,
    pub confidence: f32,
    pub is_supported: bool,
    pub fallback_used: bool,
}

impl LanguageDetection {
    /// Used when the detection collaborator cannot be reached.
    pub fn fallback() -> Self {
        Self {
            detected_language: "en".to_string(),
            confidence: 0.0,
            is_supported: true,
            fallback_used: true,
        }
    }
}
