//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use polyglot_tutor::audio::{ActiveCapture, Microphone, MicrophoneError};
use polyglot_tutor::backend::{BackendError, TutorBackend};
use polyglot_tutor::model::{
    AiReply, ContentAnalysis, Flashcard, LanguageDetection, PronunciationFeedback, QuizKind,
    QuizQuestion, ReadingPassage, ReadingQuestion, StartConversationRequest, WritingExercise,
    WritingFeedback,
};
use polyglot_tutor::playback::{PlaybackError, PlaybackSink};

/// Scripted tutoring backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    replies: Mutex<VecDeque<String>>,
    reply_delay: Mutex<Option<Duration>>,
    transcript: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn queue_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(text.to_string());
    }

    /// Text returned by every later transcription.
    pub fn set_transcript(&self, text: &str) {
        *self.transcript.lock().unwrap() = Some(text.to_string());
    }

    pub fn delay_replies(&self, delay: Duration) {
        *self.reply_delay.lock().unwrap() = Some(delay);
    }

    /// Highest number of dialogue sends observed in flight at once.
    pub fn max_concurrent_sends(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, op: &'static str) -> Result<(), BackendError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(op) {
            return Err(BackendError::Network(format!("{op}: connection refused")));
        }
        Ok(())
    }
}

pub fn sample_analysis(summary: &str) -> ContentAnalysis {
    ContentAnalysis {
        analysis: summary.to_string(),
        flashcards: vec![
            Flashcard {
                front: "chlorophyll".to_string(),
                back: "green pigment".to_string(),
            },
            Flashcard {
                front: "stomata".to_string(),
                back: "leaf pores".to_string(),
            },
        ],
        quiz: vec![QuizQuestion {
            question: "Plants need light".to_string(),
            kind: QuizKind::TrueFalse,
            options: vec!["true".to_string(), "false".to_string()],
            correct_answer: "true".to_string(),
            explanation: None,
        }],
    }
}

#[async_trait]
impl TutorBackend for FakeBackend {
    async fn start_conversation(
        &self,
        _request: &StartConversationRequest,
    ) -> Result<String, BackendError> {
        self.record("start_conversation")?;
        Ok("conv-test".to_string())
    }

    async fn send_message(
        &self,
        _conversation_id: &str,
        message: &str,
    ) -> Result<AiReply, BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.to_string());

        let delay = *self.reply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.record("send_message")?;
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("You said: {message}"));
        Ok(AiReply {
            text,
            language: Some("en".to_string()),
            confidence: Some(0.9),
        })
    }

    async fn transcribe(
        &self,
        _audio_base64: &str,
        _language_code: &str,
    ) -> Result<String, BackendError> {
        self.record("transcribe")?;
        let transcript = self.transcript.lock().unwrap().clone();
        Ok(transcript.unwrap_or_else(|| "good morning teacher".to_string()))
    }

    async fn synthesize(&self, _text: &str) -> Result<String, BackendError> {
        self.record("synthesize")?;
        Ok("data:audio/mpeg;base64,QUJD".to_string())
    }

    async fn analyze_pronunciation(
        &self,
        _audio_base64: &str,
        _text: &str,
        _expected_text: &str,
    ) -> Result<PronunciationFeedback, BackendError> {
        self.record("analyze_pronunciation")?;
        Ok(PronunciationFeedback {
            overall: 92.0,
            fluency: 88.0,
            clarity: 9.5,
            strengths: vec!["Natural rhythm".to_string()],
            improvements: vec!["Stress the second syllable".to_string()],
            fallback: false,
        })
    }

    async fn analyze_writing(
        &self,
        _text: &str,
        _language: &str,
    ) -> Result<WritingFeedback, BackendError> {
        self.record("analyze_writing")?;
        Ok(WritingFeedback {
            overall: 8.0,
            grammar: 7.5,
            vocabulary: 8.0,
            structure: 8.5,
            style: 8.0,
            suggestions: vec!["Vary sentence openings".to_string()],
            strengths: vec![],
            improvements: vec![],
            fallback: false,
        })
    }

    async fn analyze_upload(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<ContentAnalysis, BackendError> {
        self.record("analyze_upload")?;
        Ok(sample_analysis(&format!("Summary of {file_name}")))
    }

    async fn analyze_content(&self, content: &str) -> Result<ContentAnalysis, BackendError> {
        self.record("analyze_content")?;
        Ok(sample_analysis(&format!("Notes on {content}")))
    }

    async fn generate_passage(
        &self,
        _prompt: &str,
        _level: &str,
    ) -> Result<ReadingPassage, BackendError> {
        self.record("generate_passage")?;
        Ok(ReadingPassage {
            title: "The Night Train".to_string(),
            text: "The train left at midnight.".to_string(),
            questions: vec![ReadingQuestion {
                question: "When did the train leave?".to_string(),
                options: vec!["Noon".into(), "Dawn".into(), "Midnight".into()],
                correct_answer: 2,
            }],
        })
    }

    async fn generate_exercise(
        &self,
        _prompt: &str,
        _level: &str,
    ) -> Result<WritingExercise, BackendError> {
        self.record("generate_exercise")?;
        Ok(WritingExercise {
            prompt: "Describe your favourite meal.".to_string(),
            hints: vec![],
        })
    }

    async fn generate_quiz(
        &self,
        _content: &str,
        _analysis: &str,
    ) -> Result<Vec<QuizQuestion>, BackendError> {
        self.record("generate_quiz")?;
        Ok(sample_analysis("").quiz)
    }

    async fn answer_question(
        &self,
        question: &str,
        _content: &str,
        _analysis: &str,
    ) -> Result<String, BackendError> {
        self.record("answer_question")?;
        Ok(format!("Answer to: {question}"))
    }

    async fn detect_language(&self, text: &str) -> Result<LanguageDetection, BackendError> {
        self.record("detect_language")?;
        let chinese = text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c));
        Ok(LanguageDetection {
            detected_language: if chinese { "zh-CN" } else { "fr" }.to_string(),
            confidence: 0.95,
            is_supported: true,
            fallback_used: false,
        })
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
        _source_language: Option<&str>,
    ) -> Result<String, BackendError> {
        self.record("translate")?;
        Ok(format!("[{target_language}] {text}"))
    }
}

/// Microphone producing a fixed-size recording.
pub struct FakeMicrophone {
    payload_len: usize,
    deny: bool,
    pub released: Arc<AtomicUsize>,
}

impl FakeMicrophone {
    pub fn with_payload(payload_len: usize) -> Arc<Self> {
        Arc::new(Self {
            payload_len,
            deny: false,
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            payload_len: 0,
            deny: true,
            released: Arc::new(AtomicUsize::new(0)),
        })
    }
}

struct FakeCapture {
    payload_len: usize,
    released: Arc<AtomicUsize>,
}

impl ActiveCapture for FakeCapture {
    fn finish(self: Box<Self>) -> Result<Vec<u8>, MicrophoneError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(vec![7u8; self.payload_len])
    }
}

impl Microphone for FakeMicrophone {
    fn open(&self) -> Result<Box<dyn ActiveCapture>, MicrophoneError> {
        if self.deny {
            return Err(MicrophoneError::AccessDenied("NotAllowedError".to_string()));
        }
        Ok(Box::new(FakeCapture {
            payload_len: self.payload_len,
            released: self.released.clone(),
        }))
    }
}

/// Output sink that can refuse the first `not_ready` attempts.
#[derive(Default)]
pub struct FakeSink {
    not_ready: AtomicUsize,
    pub attempts: AtomicUsize,
    pub played: Mutex<Vec<Vec<u8>>>,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    playing: AtomicBool,
    paused: AtomicBool,
}

impl FakeSink {
    pub fn ready() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn not_ready_for(attempts: usize) -> Arc<Self> {
        let sink = Self::default();
        sink.not_ready.store(attempts, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl PlaybackSink for FakeSink {
    fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .not_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(PlaybackError::NotReady);
        }
        self.played.lock().unwrap().push(audio);
        self.playing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.paused.store(self.playing.swap(false, Ordering::SeqCst), Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.paused.swap(false, Ordering::SeqCst) {
            self.playing.store(true, Ordering::SeqCst);
        }
    }

    /// Also stands in for the queued audio running out.
    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}
