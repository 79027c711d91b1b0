//! State machine for a tutoring session
//!
//! This module implements the session using a single-writer pattern.
//! All state transitions go through the `reduce()` function, which returns
//! a new state and a list of effects to execute. Completions of asynchronous
//! work come back as events carrying the request id they were issued with;
//! a completion whose id is no longer pending is dropped.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::audio::{CaptureError, RecordedAudio};
use crate::language::UiLanguage;
use crate::mode_detector;
use crate::model::{
    AiReply, ContentAnalysis, LearningCard, Message, Mode, PronunciationFeedback, QuizAnswer,
    QuizQuestion, ReadingPassage, StartConversationRequest, WritingExercise, WritingFeedback,
};
use crate::scoring::{self, AchievementSet, SpeakingStats};
use crate::settings::AppSettings;

/// Progress added to a learning card each time its mode is entered.
pub const CARD_PROGRESS_STEP: u8 = 20;

/// Extensions accepted for document upload (compared case-insensitively).
pub const SUPPORTED_DOCUMENTS: [&str; 6] = ["pdf", "doc", "docx", "txt", "ppt", "pptx"];

const GREETING: &str =
    "Hello! I'm your language tutor. What would you like to practice today?";
const REPLY_FALLBACK: &str =
    "Sorry, I couldn't process that right now. Please try sending it again.";
const ANSWER_FALLBACK: &str = "I couldn't find an answer to that right now. Please try again.";

/// Coarse activity of the session, derived from outstanding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply,
    Analyzing,
}

/// Microphone workflow. At most one recording exists at a time.
#[derive(Debug, Clone, Default)]
pub enum Recording {
    #[default]
    Idle,
    Arming {
        id: Uuid,
    },
    Active {
        id: Uuid,
    },
    Stopping {
        id: Uuid,
    },
    Transcribing {
        id: Uuid,
        audio: Arc<RecordedAudio>,
    },
}

impl Recording {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Recording::Idle => None,
            Recording::Arming { id }
            | Recording::Active { id }
            | Recording::Stopping { id }
            | Recording::Transcribing { id, .. } => Some(*id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Recording::Idle)
    }
}

/// What an outstanding request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Start,
    Reply,
    Pronunciation,
    Writing,
    Exercise,
    Passage,
    Content,
    Answer,
    Quiz,
}

/// User-visible condition raised by the last event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NoActiveConversation,
    ConversationStartFailed(String),
    PermissionDenied(String),
    PayloadTooLarge { size: usize, limit: usize },
    RecordingFailed(String),
    TranscriptionFailed(String),
    AnalysisFailed(String),
    UnsupportedFile(String),
    NoContent,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::NoActiveConversation => {
                "No active conversation. Restart the session to continue.".to_string()
            }
            Notice::ConversationStartFailed(err) => {
                format!("Could not start a conversation: {}", err)
            }
            Notice::PermissionDenied(err) => format!(
                "Microphone access was denied ({}). Allow access and try again.",
                err
            ),
            Notice::PayloadTooLarge { size, limit } => format!(
                "Recording is too long ({} KB, limit {} KB). Please record a shorter clip.",
                size / 1024,
                limit / 1024
            ),
            Notice::RecordingFailed(err) => format!("Recording failed: {}", err),
            Notice::TranscriptionFailed(err) => {
                format!("Could not transcribe your recording ({}). Try again.", err)
            }
            Notice::AnalysisFailed(err) => format!("Content generation failed: {}", err),
            Notice::UnsupportedFile(name) => format!(
                "{} is not a supported document. Use PDF, DOC, DOCX, TXT, PPT or PPTX.",
                name
            ),
            Notice::NoContent => "Upload a document or generate content first.".to_string(),
        }
    }
}

/// Per-session preferences captured when the session is created.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub scenario: String,
    pub language: String,
    pub proficiency_level: String,
    pub auto_speak: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for SessionConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            scenario: settings.scenario.clone(),
            language: settings.language.clone(),
            proficiency_level: settings.proficiency_level.clone(),
            auto_speak: settings.auto_speak,
        }
    }
}

impl SessionConfig {
    fn start_request(&self) -> StartConversationRequest {
        StartConversationRequest {
            scenario: self.scenario.clone(),
            language: self.language.clone(),
            proficiency_level: self.proficiency_level.clone(),
        }
    }
}

/// Analysed material backing Q&A, flashcards and quizzes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedContent {
    /// File name or the prompt that produced it.
    pub source: String,
    /// Text the tutor answers questions from.
    pub text: String,
    pub analysis: ContentAnalysis,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlashcardCursor {
    pub index: usize,
    pub flipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizState {
    pub questions: Vec<QuizQuestion>,
    pub answers: Vec<Option<QuizAnswer>>,
    pub score: Option<u32>,
}

impl QuizState {
    fn load(questions: Vec<QuizQuestion>) -> Self {
        let answers = vec![None; questions.len()];
        Self {
            questions,
            answers,
            score: None,
        }
    }
}

/// Authoritative session state. Only the session loop writes it.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Changes on restart; requests from an earlier epoch are never pending.
    pub epoch: Uuid,
    pub config: SessionConfig,
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
    pub mode: Mode,
    pub cards: Vec<LearningCard>,
    pub recording: Recording,
    pub pending: HashMap<Uuid, Pending>,
    /// Dialogue turns waiting for the in-flight reply.
    pub outbox: VecDeque<String>,
    pub stats: SpeakingStats,
    pub achievements: AchievementSet,
    pub practice_sentence: Option<String>,
    pub pronunciation: Option<PronunciationFeedback>,
    pub writing: Option<WritingFeedback>,
    pub exercise: Option<WritingExercise>,
    pub passage: Option<ReadingPassage>,
    pub reading_score: Option<u32>,
    pub content: Option<LoadedContent>,
    pub flashcard: FlashcardCursor,
    pub quiz: QuizState,
    pub ui_language: UiLanguage,
    pub notice: Option<Notice>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            epoch: Uuid::new_v4(),
            config,
            conversation_id: None,
            messages: Vec::new(),
            mode: Mode::None,
            cards: LearningCard::defaults(),
            recording: Recording::Idle,
            pending: HashMap::new(),
            outbox: VecDeque::new(),
            stats: SpeakingStats::default(),
            achievements: AchievementSet::default(),
            practice_sentence: None,
            pronunciation: None,
            writing: None,
            exercise: None,
            passage: None,
            reading_score: None,
            content: None,
            flashcard: FlashcardCursor::default(),
            quiz: QuizState::default(),
            ui_language: UiLanguage::default(),
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        let awaiting = self
            .pending
            .values()
            .any(|p| matches!(p, Pending::Reply | Pending::Start));
        if awaiting {
            Phase::AwaitingReply
        } else if !self.pending.is_empty()
            || matches!(self.recording, Recording::Transcribing { .. })
        {
            Phase::Analyzing
        } else {
            Phase::Idle
        }
    }

    pub fn is_pending(&self, kind: Pending) -> bool {
        self.pending.values().any(|p| *p == kind)
    }

    pub fn active_card(&self) -> Option<&LearningCard> {
        self.cards.iter().find(|card| card.is_active)
    }

    pub fn current_flashcard(&self) -> Option<&crate::model::Flashcard> {
        self.content
            .as_ref()
            .and_then(|c| c.analysis.flashcards.get(self.flashcard.index))
    }

    fn flashcard_count(&self) -> usize {
        self.content
            .as_ref()
            .map(|c| c.analysis.flashcards.len())
            .unwrap_or(0)
    }

    fn track(&mut self, kind: Pending) -> Uuid {
        let id = Uuid::new_v4();
        self.pending.insert(id, kind);
        id
    }

    /// Remove `id` if it is pending as `kind`. False means the completion is stale.
    fn settle(&mut self, id: Uuid, kind: Pending) -> bool {
        match self.pending.get(&id) {
            Some(pending) if *pending == kind => {
                self.pending.remove(&id);
                true
            }
            _ => {
                log::debug!("Dropping stale {:?} completion {}", kind, id);
                false
            }
        }
    }

    fn say(&mut self, text: impl Into<String>) {
        self.messages.push(Message::ai(text));
    }
}

/// Events that can trigger state transitions.
/// These come from user input and from completed effects.
#[derive(Debug, Clone)]
pub enum Event {
    // Session lifecycle
    StartSession,
    ConversationStarted {
        id: Uuid,
        conversation_id: String,
    },
    ConversationStartFailed {
        id: Uuid,
        err: String,
    },
    /// Clear everything and start a new conversation.
    Restart,
    /// Handled by the session loop, never reduced.
    Shutdown,

    // Input
    SubmitText {
        text: String,
    },
    SetMode {
        mode: Mode,
    },
    SetPracticeSentence {
        text: String,
    },
    UiLanguageChanged {
        language: UiLanguage,
    },
    DismissNotice,

    // Recording
    MicToggle,
    CancelRecording,
    AudioStartOk {
        id: Uuid,
    },
    AudioStartFail {
        id: Uuid,
        err: CaptureError,
    },
    AudioStopped {
        id: Uuid,
        audio: Arc<RecordedAudio>,
    },
    AudioStopFail {
        id: Uuid,
        err: CaptureError,
    },
    TranscribeOk {
        id: Uuid,
        text: String,
    },
    TranscribeFail {
        id: Uuid,
        err: String,
    },

    // Dialogue
    ReplyReceived {
        id: Uuid,
        reply: AiReply,
    },
    ReplyFailed {
        id: Uuid,
        err: String,
    },

    // Speaking
    PronunciationAnalyzed {
        id: Uuid,
        feedback: PronunciationFeedback,
    },
    PronunciationFailed {
        id: Uuid,
        err: String,
    },

    // Writing
    SubmitWriting {
        text: String,
    },
    WritingAnalyzed {
        id: Uuid,
        feedback: WritingFeedback,
    },
    WritingFailed {
        id: Uuid,
        err: String,
    },
    ExerciseGenerated {
        id: Uuid,
        exercise: WritingExercise,
    },
    ExerciseFailed {
        id: Uuid,
        err: String,
    },

    // Reading
    PassageGenerated {
        id: Uuid,
        passage: ReadingPassage,
    },
    PassageFailed {
        id: Uuid,
        err: String,
    },
    SubmitReadingAnswers {
        answers: Vec<Option<usize>>,
    },

    // Content, Q&A, flashcards, quiz
    UploadDocument {
        path: PathBuf,
    },
    ContentAnalyzed {
        id: Uuid,
        content: LoadedContent,
    },
    ContentFailed {
        id: Uuid,
        err: String,
    },
    AskQuestion {
        question: String,
    },
    QuestionAnswered {
        id: Uuid,
        answer: String,
    },
    QuestionFailed {
        id: Uuid,
        err: String,
    },
    GenerateQuiz,
    QuizGenerated {
        id: Uuid,
        questions: Vec<QuizQuestion>,
    },
    QuizFailed {
        id: Uuid,
        err: String,
    },
    AnswerQuiz {
        index: usize,
        answer: QuizAnswer,
    },
    SubmitQuiz,
    FlipCard,
    NextCard,
    PrevCard,
}

/// Effects to be executed after a state transition.
/// The effect runner handles these asynchronously.
#[derive(Debug, Clone)]
pub enum Effect {
    StartConversation {
        id: Uuid,
        request: StartConversationRequest,
    },
    SendMessage {
        id: Uuid,
        conversation_id: String,
        text: String,
    },
    StartAudio {
        id: Uuid,
    },
    StopAudio {
        id: Uuid,
    },
    /// Drop the capture without producing audio.
    CancelAudio {
        id: Uuid,
    },
    Transcribe {
        id: Uuid,
        audio: Arc<RecordedAudio>,
        language: String,
    },
    AnalyzePronunciation {
        id: Uuid,
        audio: Arc<RecordedAudio>,
        transcript: String,
        expected: String,
    },
    AnalyzeWriting {
        id: Uuid,
        text: String,
        language: String,
    },
    GenerateExercise {
        id: Uuid,
        prompt: String,
        level: String,
    },
    GeneratePassage {
        id: Uuid,
        prompt: String,
        level: String,
    },
    AnalyzeUpload {
        id: Uuid,
        path: PathBuf,
    },
    AnalyzeContent {
        id: Uuid,
        content: String,
    },
    AnswerQuestion {
        id: Uuid,
        question: String,
        content: String,
        analysis: String,
    },
    GenerateQuiz {
        id: Uuid,
        content: String,
        analysis: String,
    },
    /// Vocalize a tutor reply.
    Speak {
        text: String,
    },
    /// Signal to publish the state to the interface
    EmitUi,
}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Never mutate state directly
/// - Ignore completions whose id is not pending
/// - Always emit EmitUi after state changes
pub fn reduce(state: &SessionState, event: Event) -> (SessionState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    if !apply(&mut next, event, &mut effects) {
        return (state.clone(), vec![]);
    }

    effects.push(Effect::EmitUi);
    (next, effects)
}

/// Returns false when the event is ignored and nothing changed.
fn apply(s: &mut SessionState, event: Event, fx: &mut Vec<Effect>) -> bool {
    use Event::*;

    match event {
        // -----------------
        // Session lifecycle
        // -----------------
        StartSession => {
            if s.conversation_id.is_some() || s.is_pending(Pending::Start) {
                return false;
            }
            start_conversation(s, fx);
        }
        ConversationStarted {
            id,
            conversation_id,
        } => {
            if !s.settle(id, Pending::Start) {
                return false;
            }
            log::info!("Conversation {} started", conversation_id);
            s.conversation_id = Some(conversation_id);
            s.say(GREETING);
        }
        ConversationStartFailed { id, err } => {
            if !s.settle(id, Pending::Start) {
                return false;
            }
            log::error!("Conversation start failed: {}", err);
            s.notice = Some(Notice::ConversationStartFailed(err));
        }
        Restart => {
            if let Some(id) = s.recording.id() {
                if !matches!(s.recording, Recording::Transcribing { .. }) {
                    fx.push(Effect::CancelAudio { id });
                }
            }
            let ui_language = s.ui_language;
            *s = SessionState::new(s.config.clone());
            s.ui_language = ui_language;
            log::info!("Session restarted (epoch {})", s.epoch);
            start_conversation(s, fx);
        }
        Shutdown => return false,

        // -----------------
        // Input
        // -----------------
        SubmitText { text } => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return false;
            }
            route_text(s, text, fx);
        }
        SetMode { mode } => {
            if mode == s.mode {
                return false;
            }
            enter_mode(s, mode, fx);
        }
        SetPracticeSentence { text } => {
            let text = text.trim();
            s.practice_sentence = (!text.is_empty()).then(|| text.to_string());
        }
        UiLanguageChanged { language } => {
            if s.ui_language == language {
                return false;
            }
            log::info!("UI language switched to {}", language.code());
            s.ui_language = language;
        }
        DismissNotice => {
            if s.notice.take().is_none() {
                return false;
            }
        }

        // -----------------
        // Recording
        // -----------------
        MicToggle => match s.recording {
            Recording::Idle => {
                let id = Uuid::new_v4();
                s.recording = Recording::Arming { id };
                s.notice = None;
                fx.push(Effect::StartAudio { id });
            }
            Recording::Active { id } => {
                s.recording = Recording::Stopping { id };
                fx.push(Effect::StopAudio { id });
            }
            // Starting again while a recording is underway is a no-op
            _ => return false,
        },
        CancelRecording => match s.recording {
            Recording::Arming { id } | Recording::Active { id } | Recording::Stopping { id } => {
                s.recording = Recording::Idle;
                fx.push(Effect::CancelAudio { id });
            }
            _ => return false,
        },
        AudioStartOk { id } => match s.recording {
            Recording::Arming { id: current } if current == id => {
                s.recording = Recording::Active { id };
            }
            _ => {
                // Cancelled while arming; the device opened anyway
                log::info!("Releasing microphone for stale recording {}", id);
                fx.push(Effect::CancelAudio { id });
            }
        },
        AudioStartFail { id, err } => match s.recording {
            Recording::Arming { id: current } if current == id => {
                s.recording = Recording::Idle;
                s.notice = Some(capture_notice(err));
            }
            _ => return false,
        },
        AudioStopped { id, audio } => match s.recording {
            Recording::Stopping { id: current } if current == id => {
                s.recording = Recording::Transcribing {
                    id,
                    audio: audio.clone(),
                };
                fx.push(Effect::Transcribe {
                    id,
                    audio,
                    language: s.config.language.clone(),
                });
            }
            _ => return false,
        },
        AudioStopFail { id, err } => match s.recording {
            Recording::Stopping { id: current } if current == id => {
                // No transcription is requested for a discarded recording
                s.recording = Recording::Idle;
                s.notice = Some(capture_notice(err));
            }
            _ => return false,
        },
        TranscribeOk { id, text } => {
            let audio = match &s.recording {
                Recording::Transcribing { id: current, audio } if *current == id => audio.clone(),
                _ => return false,
            };
            s.recording = Recording::Idle;

            match (s.mode, s.practice_sentence.clone()) {
                (Mode::Speaking, Some(expected)) => {
                    s.messages.push(Message::user(text.clone()));
                    let id = s.track(Pending::Pronunciation);
                    fx.push(Effect::AnalyzePronunciation {
                        id,
                        audio,
                        transcript: text,
                        expected,
                    });
                }
                _ => route_text(s, text, fx),
            }
        }
        TranscribeFail { id, err } => match s.recording {
            Recording::Transcribing { id: current, .. } if current == id => {
                s.recording = Recording::Idle;
                s.notice = Some(Notice::TranscriptionFailed(err));
            }
            _ => return false,
        },

        // -----------------
        // Dialogue
        // -----------------
        ReplyReceived { id, reply } => {
            if !s.settle(id, Pending::Reply) {
                return false;
            }
            let text = reply.text.clone();
            s.messages
                .push(Message::ai(reply.text).with_language(reply.language, reply.confidence));
            if s.config.auto_speak {
                fx.push(Effect::Speak { text: text.clone() });
            }

            let detected = mode_detector::detect(&text);
            if detected != Mode::None && detected != s.mode {
                log::info!("Reply suggests {} practice", detected);
                enter_mode(s, detected, fx);
            }
            flush_outbox(s, fx);
        }
        ReplyFailed { id, err } => {
            if !s.settle(id, Pending::Reply) {
                return false;
            }
            log::error!("Tutor reply failed: {}", err);
            s.say(REPLY_FALLBACK);
            flush_outbox(s, fx);
        }

        // -----------------
        // Speaking
        // -----------------
        PronunciationAnalyzed { id, feedback } => {
            if !s.settle(id, Pending::Pronunciation) {
                return false;
            }
            apply_pronunciation(s, feedback);
        }
        PronunciationFailed { id, err } => {
            if !s.settle(id, Pending::Pronunciation) {
                return false;
            }
            log::warn!("Pronunciation analysis failed, using fallback: {}", err);
            apply_pronunciation(s, PronunciationFeedback::fallback());
        }

        // -----------------
        // Writing
        // -----------------
        SubmitWriting { text } => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return false;
            }
            s.messages.push(Message::user(text.clone()));
            let id = s.track(Pending::Writing);
            fx.push(Effect::AnalyzeWriting {
                id,
                text,
                language: s.config.language.clone(),
            });
        }
        WritingAnalyzed { id, feedback } => {
            if !s.settle(id, Pending::Writing) {
                return false;
            }
            s.say(writing_summary(&feedback));
            s.writing = Some(feedback);
        }
        WritingFailed { id, err } => {
            if !s.settle(id, Pending::Writing) {
                return false;
            }
            log::warn!("Writing analysis failed, using fallback: {}", err);
            let feedback = WritingFeedback::fallback();
            s.say(writing_summary(&feedback));
            s.writing = Some(feedback);
        }
        ExerciseGenerated { id, exercise } => {
            if !s.settle(id, Pending::Exercise) {
                return false;
            }
            s.say(format!("✍️ Writing exercise: {}", exercise.prompt));
            s.exercise = Some(exercise);
        }
        ExerciseFailed { id, err } => {
            if !s.settle(id, Pending::Exercise) {
                return false;
            }
            s.notice = Some(Notice::AnalysisFailed(err));
        }

        // -----------------
        // Reading
        // -----------------
        PassageGenerated { id, passage } => {
            if !s.settle(id, Pending::Passage) {
                return false;
            }
            s.say(format!("📖 {}\n\n{}", passage.title, passage.text));
            s.passage = Some(passage);
            s.reading_score = None;
        }
        PassageFailed { id, err } => {
            if !s.settle(id, Pending::Passage) {
                return false;
            }
            s.notice = Some(Notice::AnalysisFailed(err));
        }
        SubmitReadingAnswers { answers } => {
            let Some(passage) = &s.passage else {
                s.notice = Some(Notice::NoContent);
                return true;
            };
            let score = scoring::score_reading(&passage.questions, &answers);
            s.reading_score = Some(score);
            s.say(format!("Reading comprehension score: {}%", score));
        }

        // -----------------
        // Content
        // -----------------
        UploadDocument { path } => {
            if !is_supported_document(&path) {
                s.notice = Some(Notice::UnsupportedFile(display_name(&path)));
                return true;
            }
            let id = s.track(Pending::Content);
            fx.push(Effect::AnalyzeUpload { id, path });
        }
        ContentAnalyzed { id, content } => {
            if !s.settle(id, Pending::Content) {
                return false;
            }
            s.say(format!(
                "📄 {}: {} ({} flashcards, {} quiz questions)",
                content.source,
                content.analysis.analysis,
                content.analysis.flashcards.len(),
                content.analysis.quiz.len()
            ));
            s.quiz = QuizState::load(content.analysis.quiz.clone());
            s.flashcard = FlashcardCursor::default();
            s.content = Some(content);
        }
        ContentFailed { id, err } => {
            if !s.settle(id, Pending::Content) {
                return false;
            }
            s.notice = Some(Notice::AnalysisFailed(err));
        }
        AskQuestion { question } => {
            let question = question.trim().to_string();
            if question.is_empty() {
                return false;
            }
            ask_question(s, question, fx);
        }
        QuestionAnswered { id, answer } => {
            if !s.settle(id, Pending::Answer) {
                return false;
            }
            s.say(answer);
        }
        QuestionFailed { id, err } => {
            if !s.settle(id, Pending::Answer) {
                return false;
            }
            log::warn!("Question answering failed: {}", err);
            s.say(ANSWER_FALLBACK);
        }
        GenerateQuiz => {
            let Some(content) = &s.content else {
                s.notice = Some(Notice::NoContent);
                return true;
            };
            if s.is_pending(Pending::Quiz) {
                return false;
            }
            let (text, analysis) = (content.text.clone(), content.analysis.analysis.clone());
            let id = s.track(Pending::Quiz);
            fx.push(Effect::GenerateQuiz {
                id,
                content: text,
                analysis,
            });
        }
        QuizGenerated { id, questions } => {
            if !s.settle(id, Pending::Quiz) {
                return false;
            }
            s.say(format!("📝 New quiz with {} questions", questions.len()));
            s.quiz = QuizState::load(questions);
        }
        QuizFailed { id, err } => {
            if !s.settle(id, Pending::Quiz) {
                return false;
            }
            s.notice = Some(Notice::AnalysisFailed(err));
        }
        AnswerQuiz { index, answer } => {
            let Some(slot) = s.quiz.answers.get_mut(index) else {
                return false;
            };
            *slot = Some(answer);
            s.quiz.score = None;
        }
        SubmitQuiz => {
            if s.quiz.questions.is_empty() {
                s.notice = Some(Notice::NoContent);
                return true;
            }
            let score = scoring::score_quiz(&s.quiz.questions, &s.quiz.answers);
            s.quiz.score = Some(score);
            s.say(format!("Quiz score: {}%", score));
        }
        FlipCard => {
            if s.flashcard_count() == 0 {
                return false;
            }
            s.flashcard.flipped = !s.flashcard.flipped;
        }
        NextCard => {
            let count = s.flashcard_count();
            if count == 0 {
                return false;
            }
            s.flashcard = FlashcardCursor {
                index: (s.flashcard.index + 1) % count,
                flipped: false,
            };
        }
        PrevCard => {
            let count = s.flashcard_count();
            if count == 0 {
                return false;
            }
            s.flashcard = FlashcardCursor {
                index: (s.flashcard.index + count - 1) % count,
                flipped: false,
            };
        }
    }

    true
}

fn start_conversation(s: &mut SessionState, fx: &mut Vec<Effect>) {
    let id = s.track(Pending::Start);
    fx.push(Effect::StartConversation {
        id,
        request: s.config.start_request(),
    });
}

/// Route typed or transcribed text according to the current mode.
fn route_text(s: &mut SessionState, text: String, fx: &mut Vec<Effect>) {
    match s.mode {
        Mode::Reading => {
            // A content prompt, not a dialogue turn
            let id = s.track(Pending::Passage);
            fx.push(Effect::GeneratePassage {
                id,
                prompt: text,
                level: s.config.proficiency_level.clone(),
            });
        }
        Mode::Qa if s.content.is_some() => ask_question(s, text, fx),
        Mode::Qa | Mode::Flashcards | Mode::Quiz => {
            let id = s.track(Pending::Content);
            fx.push(Effect::AnalyzeContent { id, content: text });
        }
        _ => send_dialogue(s, text, fx),
    }
}

fn send_dialogue(s: &mut SessionState, text: String, fx: &mut Vec<Effect>) {
    let Some(conversation_id) = s.conversation_id.clone() else {
        log::warn!("Send attempted without an active conversation");
        s.notice = Some(Notice::NoActiveConversation);
        return;
    };

    s.messages.push(Message::user(text.clone()));

    if s.is_pending(Pending::Reply) {
        log::debug!("Reply in flight, queueing message");
        s.outbox.push_back(text);
        return;
    }

    let id = s.track(Pending::Reply);
    fx.push(Effect::SendMessage {
        id,
        conversation_id,
        text,
    });
}

/// Dispatch the next queued dialogue turn, if any.
fn flush_outbox(s: &mut SessionState, fx: &mut Vec<Effect>) {
    let Some(conversation_id) = s.conversation_id.clone() else {
        s.outbox.clear();
        return;
    };
    if let Some(text) = s.outbox.pop_front() {
        let id = s.track(Pending::Reply);
        fx.push(Effect::SendMessage {
            id,
            conversation_id,
            text,
        });
    }
}

fn ask_question(s: &mut SessionState, question: String, fx: &mut Vec<Effect>) {
    let Some(content) = &s.content else {
        s.notice = Some(Notice::NoContent);
        return;
    };
    let (text, analysis) = (content.text.clone(), content.analysis.analysis.clone());
    s.messages.push(Message::user(question.clone()));
    let id = s.track(Pending::Answer);
    fx.push(Effect::AnswerQuestion {
        id,
        question,
        content: text,
        analysis,
    });
}

/// Switch mode, update the learning cards and kick off mode content.
fn enter_mode(s: &mut SessionState, mode: Mode, fx: &mut Vec<Effect>) {
    log::info!("Mode transition: {} -> {}", s.mode, mode);
    s.mode = mode;
    update_active_card(&mut s.cards, mode);

    let level = s.config.proficiency_level.clone();
    match mode {
        Mode::Reading if !s.is_pending(Pending::Passage) => {
            let id = s.track(Pending::Passage);
            fx.push(Effect::GeneratePassage {
                id,
                prompt: format!(
                    "Generate a {} level reading passage in {} with comprehension questions",
                    level, s.config.language
                ),
                level,
            });
        }
        Mode::Writing if !s.is_pending(Pending::Exercise) => {
            let id = s.track(Pending::Exercise);
            fx.push(Effect::GenerateExercise {
                id,
                prompt: format!(
                    "Generate a writing exercise in {} for a {} learner",
                    s.config.language, level
                ),
                level,
            });
        }
        _ => {}
    }
}

/// Activate only the card for `mode` and advance its progress.
pub fn update_active_card(cards: &mut [LearningCard], mode: Mode) {
    for card in cards.iter_mut() {
        card.is_active = card.mode == mode;
        if card.is_active {
            card.progress = card.progress.saturating_add(CARD_PROGRESS_STEP).min(100);
        }
    }
}

fn apply_pronunciation(s: &mut SessionState, mut feedback: PronunciationFeedback) {
    feedback.overall = scoring::canonical_score(feedback.overall);
    feedback.fluency = scoring::canonical_score(feedback.fluency);
    feedback.clarity = scoring::canonical_score(feedback.clarity);

    s.say(pronunciation_summary(&feedback));

    if !feedback.fallback {
        s.stats = scoring::record_pronunciation(&s.stats, feedback.overall);
        for achievement in scoring::evaluate_achievements(&s.stats, &mut s.achievements) {
            log::info!("Achievement unlocked: {}", achievement.id());
            s.say(achievement.announcement());
        }
    }

    s.pronunciation = Some(feedback);
}

fn pronunciation_summary(feedback: &PronunciationFeedback) -> String {
    let mut summary = format!(
        "🎤 Pronunciation {:.1}/10 (fluency {:.1}, clarity {:.1})",
        feedback.overall, feedback.fluency, feedback.clarity
    );
    if let Some(strength) = feedback.strengths.first() {
        summary.push_str(&format!("\n✓ {}", strength));
    }
    if let Some(improvement) = feedback.improvements.first() {
        summary.push_str(&format!("\n→ {}", improvement));
    }
    summary
}

fn writing_summary(feedback: &WritingFeedback) -> String {
    let mut summary = format!(
        "📝 Writing {:.1}/10 (grammar {:.1}, vocabulary {:.1}, structure {:.1}, style {:.1})",
        feedback.overall, feedback.grammar, feedback.vocabulary, feedback.structure, feedback.style
    );
    for suggestion in &feedback.suggestions {
        summary.push_str(&format!("\n→ {}", suggestion));
    }
    summary
}

fn capture_notice(err: CaptureError) -> Notice {
    match err {
        CaptureError::PermissionDenied(msg) => Notice::PermissionDenied(msg),
        CaptureError::PayloadTooLarge { size, limit } => Notice::PayloadTooLarge { size, limit },
        other => Notice::RecordingFailed(other.to_string()),
    }
}

pub fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_DOCUMENTS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flashcard, QuizKind, ReadingQuestion, Role};
    use crate::scoring::Achievement;

    fn reply(text: &str) -> AiReply {
        AiReply {
            text: text.to_string(),
            language: None,
            confidence: None,
        }
    }

    /// A session with an acknowledged conversation.
    fn started() -> SessionState {
        let (s, effects) = reduce(&SessionState::default(), Event::StartSession);
        let id = match effects.first() {
            Some(Effect::StartConversation { id, .. }) => *id,
            other => panic!("expected StartConversation, got {:?}", other),
        };
        let (s, _) = reduce(
            &s,
            Event::ConversationStarted {
                id,
                conversation_id: "conv-1".to_string(),
            },
        );
        s
    }

    fn send_id(effects: &[Effect]) -> Uuid {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::SendMessage { id, .. } => Some(*id),
                _ => None,
            })
            .expect("SendMessage effect")
    }

    fn count<F: Fn(&Effect) -> bool>(effects: &[Effect], f: F) -> usize {
        effects.iter().filter(|e| f(e)).count()
    }

    fn with_content(mut s: SessionState, cards: usize) -> SessionState {
        s.content = Some(LoadedContent {
            source: "notes.txt".to_string(),
            text: "Photosynthesis converts light into energy".to_string(),
            analysis: ContentAnalysis {
                analysis: "Biology basics".to_string(),
                flashcards: (0..cards)
                    .map(|i| Flashcard {
                        front: format!("front {i}"),
                        back: format!("back {i}"),
                    })
                    .collect(),
                quiz: Vec::new(),
            },
        });
        s
    }

    #[test]
    fn start_session_acknowledges_conversation() {
        let s = started();
        assert_eq!(s.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role, Role::Ai);
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn send_without_conversation_fails_fast() {
        let (s, effects) = reduce(
            &SessionState::default(),
            Event::SubmitText {
                text: "hello".to_string(),
            },
        );
        assert_eq!(s.notice, Some(Notice::NoActiveConversation));
        assert!(s.messages.is_empty());
        assert_eq!(count(&effects, |e| matches!(e, Effect::SendMessage { .. })), 0);
    }

    #[test]
    fn typed_text_is_appended_and_sent() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "  How are you?  ".to_string(),
            },
        );
        assert_eq!(s.messages.last().map(|m| m.text.as_str()), Some("How are you?"));
        assert_eq!(s.phase(), Phase::AwaitingReply);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::SendMessage { conversation_id, text, .. }
                if conversation_id == "conv-1" && text == "How are you?"
        )));
        assert!(matches!(effects.last(), Some(Effect::EmitUi)));
    }

    #[test]
    fn practice_reading_reply_triggers_one_passage() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "I'd like to practice".to_string(),
            },
        );
        let id = send_id(&effects);

        let (s, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id,
                reply: reply("Let's practice reading"),
            },
        );

        assert_eq!(s.mode, Mode::Reading);
        assert_eq!(
            count(&effects, |e| matches!(e, Effect::GeneratePassage { .. })),
            1
        );
        let card = s.active_card().expect("active card");
        assert_eq!(card.mode, Mode::Reading);
        assert_eq!(card.progress, CARD_PROGRESS_STEP);

        // Staying in reading does not generate again
        let (s, effects) = reduce(&s, Event::SetMode { mode: Mode::Reading });
        assert!(effects.is_empty());
        assert_eq!(s.mode, Mode::Reading);
    }

    #[test]
    fn replies_are_spoken_when_auto_speak_is_on() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "hi".to_string(),
            },
        );
        let id = send_id(&effects);
        let (_, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id,
                reply: reply("Nice to meet you"),
            },
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Speak { text } if text == "Nice to meet you")));

        let mut quiet = started();
        quiet.config.auto_speak = false;
        let (s, effects) = reduce(
            &quiet,
            Event::SubmitText {
                text: "hi".to_string(),
            },
        );
        let id = send_id(&effects);
        let (_, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id,
                reply: reply("Nice to meet you"),
            },
        );
        assert_eq!(count(&effects, |e| matches!(e, Effect::Speak { .. })), 0);
    }

    #[test]
    fn writing_reply_generates_exercise() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "help".to_string(),
            },
        );
        let id = send_id(&effects);
        let (s, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id,
                reply: reply("Let's work on your grammar"),
            },
        );
        assert_eq!(s.mode, Mode::Writing);
        assert_eq!(
            count(&effects, |e| matches!(e, Effect::GenerateExercise { .. })),
            1
        );
    }

    #[test]
    fn sends_are_serialized_while_awaiting_reply() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "first".to_string(),
            },
        );
        let first = send_id(&effects);

        let (s, effects) = reduce(
            &s,
            Event::SubmitText {
                text: "second".to_string(),
            },
        );
        assert_eq!(count(&effects, |e| matches!(e, Effect::SendMessage { .. })), 0);
        assert_eq!(s.outbox.len(), 1);
        // The queued turn is already in the log
        assert_eq!(s.messages.last().map(|m| m.text.as_str()), Some("second"));

        let (s, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id: first,
                reply: reply("ok"),
            },
        );
        assert!(s.outbox.is_empty());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::SendMessage { text, .. } if text == "second")));
    }

    #[test]
    fn reply_failure_appends_fallback_and_drains_queue() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "first".to_string(),
            },
        );
        let id = send_id(&effects);
        let (s, _) = reduce(
            &s,
            Event::SubmitText {
                text: "second".to_string(),
            },
        );
        let (s, effects) = reduce(
            &s,
            Event::ReplyFailed {
                id,
                err: "timeout".to_string(),
            },
        );
        assert_eq!(s.messages.last().map(|m| m.text.as_str()), Some(REPLY_FALLBACK));
        assert_eq!(count(&effects, |e| matches!(e, Effect::SendMessage { .. })), 1);
    }

    #[test]
    fn stale_reply_is_ignored() {
        let s = started();
        let (next, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id: Uuid::new_v4(),
                reply: reply("late"),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(next.messages.len(), s.messages.len());
    }

    #[test]
    fn restart_drops_in_flight_completions() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitText {
                text: "hello".to_string(),
            },
        );
        let id = send_id(&effects);

        let (s, effects) = reduce(&s, Event::Restart);
        assert!(s.messages.is_empty());
        assert!(s.conversation_id.is_none());
        assert_eq!(
            count(&effects, |e| matches!(e, Effect::StartConversation { .. })),
            1
        );

        let (_, effects) = reduce(
            &s,
            Event::ReplyReceived {
                id,
                reply: reply("from the old session"),
            },
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn reading_mode_text_becomes_passage_prompt() {
        let (s, _) = reduce(&started(), Event::SetMode { mode: Mode::Reading });
        let before = s.messages.len();
        let (s, effects) = reduce(
            &s,
            Event::SubmitText {
                text: "a story about trains".to_string(),
            },
        );
        assert_eq!(s.messages.len(), before);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::GeneratePassage { prompt, .. } if prompt == "a story about trains"
        )));
        assert_eq!(count(&effects, |e| matches!(e, Effect::SendMessage { .. })), 0);
    }

    #[test]
    fn card_progress_caps_at_one_hundred() {
        let mut cards = LearningCard::defaults();
        for _ in 0..7 {
            update_active_card(&mut cards, Mode::Speaking);
        }
        assert_eq!(cards[0].progress, 100);
        update_active_card(&mut cards, Mode::Listening);
        assert_eq!(cards.iter().filter(|c| c.is_active).count(), 1);
        assert!(cards[3].is_active);
        assert_eq!(cards[0].progress, 100);
    }

    // =========================================================================
    // Recording
    // =========================================================================

    fn recording(s: &SessionState) -> (SessionState, Uuid) {
        let (s, effects) = reduce(s, Event::MicToggle);
        let id = match effects.first() {
            Some(Effect::StartAudio { id }) => *id,
            other => panic!("expected StartAudio, got {:?}", other),
        };
        let (s, _) = reduce(&s, Event::AudioStartOk { id });
        (s, id)
    }

    fn audio(id: Uuid) -> Arc<RecordedAudio> {
        Arc::new(RecordedAudio {
            id,
            wav: vec![1, 2, 3],
        })
    }

    #[test]
    fn mic_toggle_records_then_transcribes() {
        let (s, id) = recording(&started());
        assert!(matches!(s.recording, Recording::Active { .. }));

        let (s, effects) = reduce(&s, Event::MicToggle);
        assert!(matches!(s.recording, Recording::Stopping { .. }));
        assert!(effects.iter().any(|e| matches!(e, Effect::StopAudio { .. })));

        let (s, effects) = reduce(
            &s,
            Event::AudioStopped {
                id,
                audio: audio(id),
            },
        );
        assert!(effects.iter().any(|e| matches!(e, Effect::Transcribe { .. })));
        assert_eq!(s.phase(), Phase::Analyzing);

        let (s, effects) = reduce(
            &s,
            Event::TranscribeOk {
                id,
                text: "good morning".to_string(),
            },
        );
        assert!(s.recording.is_idle());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::SendMessage { text, .. } if text == "good morning")));
    }

    #[test]
    fn toggle_while_arming_is_a_no_op() {
        let (s, _) = reduce(&started(), Event::MicToggle);
        let (_, effects) = reduce(&s, Event::MicToggle);
        assert!(effects.is_empty());
    }

    #[test]
    fn late_start_of_cancelled_recording_releases_the_microphone() {
        let (s, effects) = reduce(&started(), Event::MicToggle);
        let Some(Effect::StartAudio { id }) = effects.first().cloned() else {
            panic!("expected StartAudio");
        };
        let (s, effects) = reduce(&s, Event::CancelRecording);
        assert!(s.recording.is_idle());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CancelAudio { id: cancelled } if *cancelled == id)));

        let (s, effects) = reduce(&s, Event::AudioStartOk { id });
        assert!(s.recording.is_idle());
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::CancelAudio { id: cancelled } if *cancelled == id)));

        // A fresh toggle arms a new recording
        let (s, effects) = reduce(&s, Event::MicToggle);
        assert!(matches!(s.recording, Recording::Arming { .. }));
        assert!(effects.iter().any(|e| matches!(e, Effect::StartAudio { .. })));
    }

    #[test]
    fn permission_denied_returns_to_idle_with_notice() {
        let (s, effects) = reduce(&started(), Event::MicToggle);
        let Some(Effect::StartAudio { id }) = effects.first().cloned() else {
            panic!("expected StartAudio");
        };
        let (s, _) = reduce(
            &s,
            Event::AudioStartFail {
                id,
                err: CaptureError::PermissionDenied("NotAllowedError".to_string()),
            },
        );
        assert!(s.recording.is_idle());
        assert!(matches!(s.notice, Some(Notice::PermissionDenied(_))));
    }

    #[test]
    fn oversized_recording_issues_no_transcription() {
        let (s, id) = recording(&started());
        let (s, _) = reduce(&s, Event::MicToggle);
        let (s, effects) = reduce(
            &s,
            Event::AudioStopFail {
                id,
                err: CaptureError::PayloadTooLarge {
                    size: 2_000_000,
                    limit: 1_048_576,
                },
            },
        );
        assert!(s.recording.is_idle());
        assert!(matches!(s.notice, Some(Notice::PayloadTooLarge { .. })));
        assert_eq!(count(&effects, |e| matches!(e, Effect::Transcribe { .. })), 0);
    }

    #[test]
    fn transcription_failure_is_actionable() {
        let (s, id) = recording(&started());
        let (s, _) = reduce(&s, Event::MicToggle);
        let (s, _) = reduce(
            &s,
            Event::AudioStopped {
                id,
                audio: audio(id),
            },
        );
        let (s, _) = reduce(
            &s,
            Event::TranscribeFail {
                id,
                err: "timed out".to_string(),
            },
        );
        assert!(s.recording.is_idle());
        assert!(matches!(s.notice, Some(Notice::TranscriptionFailed(_))));
        let (_, effects) = reduce(&s, Event::MicToggle);
        assert!(effects.iter().any(|e| matches!(e, Effect::StartAudio { .. })));
    }

    // =========================================================================
    // Speaking practice
    // =========================================================================

    fn speaking_with_pending_analysis() -> (SessionState, Uuid) {
        let (s, _) = reduce(&started(), Event::SetMode { mode: Mode::Speaking });
        let (s, _) = reduce(
            &s,
            Event::SetPracticeSentence {
                text: "The weather is lovely today".to_string(),
            },
        );
        let (s, id) = recording(&s);
        let (s, _) = reduce(&s, Event::MicToggle);
        let (s, _) = reduce(
            &s,
            Event::AudioStopped {
                id,
                audio: audio(id),
            },
        );
        let (s, effects) = reduce(
            &s,
            Event::TranscribeOk {
                id,
                text: "the weather is lovely today".to_string(),
            },
        );
        let analysis_id = effects
            .iter()
            .find_map(|e| match e {
                Effect::AnalyzePronunciation { id, expected, .. } => {
                    assert_eq!(expected, "The weather is lovely today");
                    Some(*id)
                }
                _ => None,
            })
            .expect("AnalyzePronunciation effect");
        assert_eq!(count(&effects, |e| matches!(e, Effect::SendMessage { .. })), 0);
        (s, analysis_id)
    }

    #[test]
    fn pronunciation_updates_stats_and_unlocks_first_recording() {
        let (s, id) = speaking_with_pending_analysis();
        let (s, _) = reduce(
            &s,
            Event::PronunciationAnalyzed {
                id,
                feedback: PronunciationFeedback {
                    overall: 85.0,
                    fluency: 80.0,
                    clarity: 9.0,
                    strengths: vec![],
                    improvements: vec![],
                    fallback: false,
                },
            },
        );
        assert_eq!(s.stats.total_recordings, 1);
        assert!((s.stats.best_score - 8.5).abs() < f64::EPSILON);
        assert!(s.achievements.contains(Achievement::FirstRecording));
        assert!(s
            .messages
            .iter()
            .any(|m| m.text == Achievement::FirstRecording.announcement()));
        let feedback = s.pronunciation.expect("feedback");
        assert!((feedback.fluency - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pronunciation_failure_uses_fallback_without_stats() {
        let (s, id) = speaking_with_pending_analysis();
        let (s, _) = reduce(
            &s,
            Event::PronunciationFailed {
                id,
                err: "500".to_string(),
            },
        );
        assert_eq!(s.pronunciation, Some(PronunciationFeedback::fallback()));
        assert_eq!(s.stats, SpeakingStats::default());
        assert!(s.achievements.is_empty());
    }

    #[test]
    fn writing_failure_uses_fallback() {
        let (s, effects) = reduce(
            &started(),
            Event::SubmitWriting {
                text: "Dear team, I writes to you".to_string(),
            },
        );
        let id = effects
            .iter()
            .find_map(|e| match e {
                Effect::AnalyzeWriting { id, .. } => Some(*id),
                _ => None,
            })
            .expect("AnalyzeWriting");
        let (s, _) = reduce(
            &s,
            Event::WritingFailed {
                id,
                err: "boom".to_string(),
            },
        );
        let feedback = s.writing.expect("writing feedback");
        assert!(feedback.fallback);
        assert_eq!(feedback.suggestions, vec!["Review grammar and sentence structure"]);
    }

    // =========================================================================
    // Reading, content, quiz, flashcards
    // =========================================================================

    #[test]
    fn reading_answers_are_scored() {
        let mut s = started();
        s.passage = Some(ReadingPassage {
            title: "Trains".to_string(),
            text: "...".to_string(),
            questions: vec![ReadingQuestion {
                question: "Q".to_string(),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer: 2,
            }],
        });
        let (s, _) = reduce(
            &s,
            Event::SubmitReadingAnswers {
                answers: vec![Some(2)],
            },
        );
        assert_eq!(s.reading_score, Some(100));
    }

    #[test]
    fn unsupported_upload_makes_no_request() {
        let (s, effects) = reduce(
            &started(),
            Event::UploadDocument {
                path: PathBuf::from("/tmp/photo.png"),
            },
        );
        assert_eq!(s.notice, Some(Notice::UnsupportedFile("photo.png".to_string())));
        assert_eq!(count(&effects, |e| matches!(e, Effect::AnalyzeUpload { .. })), 0);

        let (_, effects) = reduce(
            &started(),
            Event::UploadDocument {
                path: PathBuf::from("/tmp/Lecture.PDF"),
            },
        );
        assert_eq!(count(&effects, |e| matches!(e, Effect::AnalyzeUpload { .. })), 1);
    }

    #[test]
    fn questions_require_content() {
        let (s, effects) = reduce(
            &started(),
            Event::AskQuestion {
                question: "What is this about?".to_string(),
            },
        );
        assert_eq!(s.notice, Some(Notice::NoContent));
        assert_eq!(count(&effects, |e| matches!(e, Effect::AnswerQuestion { .. })), 0);

        let (_, effects) = reduce(
            &with_content(started(), 0),
            Event::AskQuestion {
                question: "What is this about?".to_string(),
            },
        );
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::AnswerQuestion { analysis, .. } if analysis == "Biology basics"
        )));
    }

    #[test]
    fn flashcards_wrap_and_reset_flip() {
        let s = with_content(started(), 3);
        let (s, _) = reduce(&s, Event::FlipCard);
        assert!(s.flashcard.flipped);
        let (s, _) = reduce(&s, Event::PrevCard);
        assert_eq!(s.flashcard, FlashcardCursor { index: 2, flipped: false });
        let (s, _) = reduce(&s, Event::NextCard);
        assert_eq!(s.flashcard.index, 0);
        assert_eq!(s.current_flashcard().map(|c| c.front.as_str()), Some("front 0"));
    }

    #[test]
    fn quiz_flow_scores_answers() {
        let mut s = with_content(started(), 0);
        s.quiz = QuizState::load(
            (0..4)
                .map(|i| QuizQuestion {
                    question: format!("Q{i}"),
                    kind: QuizKind::MultipleChoice,
                    options: vec!["a".into(), "b".into()],
                    correct_answer: "b".to_string(),
                    explanation: None,
                })
                .collect(),
        );
        for (index, choice) in [1, 1, 1, 0].into_iter().enumerate() {
            s = reduce(
                &s,
                Event::AnswerQuiz {
                    index,
                    answer: QuizAnswer::Choice(choice),
                },
            )
            .0;
        }
        let (s, _) = reduce(&s, Event::SubmitQuiz);
        assert_eq!(s.quiz.score, Some(75));
    }

    #[test]
    fn generated_quiz_replaces_answers() {
        let (s, effects) = reduce(&with_content(started(), 0), Event::GenerateQuiz);
        let id = effects
            .iter()
            .find_map(|e| match e {
                Effect::GenerateQuiz { id, .. } => Some(*id),
                _ => None,
            })
            .expect("GenerateQuiz effect");
        let question = QuizQuestion {
            question: "Plants need light".to_string(),
            kind: QuizKind::TrueFalse,
            options: vec!["true".into(), "false".into()],
            correct_answer: "true".to_string(),
            explanation: None,
        };
        let (s, _) = reduce(
            &s,
            Event::QuizGenerated {
                id,
                questions: vec![question],
            },
        );
        assert_eq!(s.quiz.answers, vec![None]);
        assert_eq!(s.quiz.score, None);
    }

    #[test]
    fn supported_document_filter() {
        for name in ["a.pdf", "b.DOCX", "c.Txt", "d.ppt", "e.pptx", "f.doc"] {
            assert!(is_supported_document(Path::new(name)), "{name}");
        }
        for name in ["a.png", "b", "c.pdf.exe", "d.md"] {
            assert!(!is_supported_document(Path::new(name)), "{name}");
        }
    }
}
