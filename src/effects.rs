//! Effect runner for the tutoring session
//!
//! This module executes effects produced by the state machine. Each effect
//! runs on its own task and reports back with a completion event carrying the
//! request id. Collaborator failures become failure events; the reducer turns
//! them into fallbacks or notices.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};

use crate::audio::{AudioCaptureSession, CaptureError};
use crate::backend::{BackendError, TutorBackend};
use crate::language::LanguageAutoSwitcher;
use crate::playback::SpeechPlaybackController;
use crate::state_machine::{Effect, Event, LoadedContent};
use crate::transcription::TranscriptionGateway;

/// Longest prompt excerpt used as the source label of generated content.
const SOURCE_LABEL_CHARS: usize = 40;

/// Trait for running effects asynchronously.
/// Completion events are sent back via the provided channel.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);
}

/// Effect runner backed by a tutoring collaborator, a microphone and a
/// playback sink.
pub struct SessionEffectRunner {
    backend: Arc<dyn TutorBackend>,
    capture: Arc<Mutex<AudioCaptureSession>>,
    transcription: Arc<TranscriptionGateway>,
    playback: Arc<SpeechPlaybackController>,
    language: Option<LanguageAutoSwitcher>,
}

impl SessionEffectRunner {
    pub fn new(
        backend: Arc<dyn TutorBackend>,
        capture: AudioCaptureSession,
        playback: Arc<SpeechPlaybackController>,
    ) -> Arc<Self> {
        Self::build(backend, capture, playback, None)
    }

    /// Like [`SessionEffectRunner::new`], also running language detection on
    /// every transcript.
    pub fn with_language_switcher(
        backend: Arc<dyn TutorBackend>,
        capture: AudioCaptureSession,
        playback: Arc<SpeechPlaybackController>,
        switcher: LanguageAutoSwitcher,
    ) -> Arc<Self> {
        Self::build(backend, capture, playback, Some(switcher))
    }

    fn build(
        backend: Arc<dyn TutorBackend>,
        capture: AudioCaptureSession,
        playback: Arc<SpeechPlaybackController>,
        language: Option<LanguageAutoSwitcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transcription: Arc::new(TranscriptionGateway::new(backend.clone())),
            backend,
            capture: Arc::new(Mutex::new(capture)),
            playback,
            language,
        })
    }
}

/// Debounced language detection on user input. A detected UI language is
/// posted back to the session as `UiLanguageChanged`.
pub fn watch_language(switcher: &LanguageAutoSwitcher, text: String, tx: mpsc::Sender<Event>) {
    if !switcher.auto_switch_enabled() {
        return;
    }
    let handle = switcher.schedule_detection(text);
    tokio::spawn(async move {
        if let Ok(Some(outcome)) = handle.await {
            if let Some(language) = outcome.ui_language {
                send(&tx, Event::UiLanguageChanged { language }).await;
            }
        }
    });
}

/// Run a capture operation off the async runtime. Opening and releasing the
/// device block on the capture thread.
async fn with_capture<T, F>(
    capture: &Arc<Mutex<AudioCaptureSession>>,
    op: F,
) -> Result<T, CaptureError>
where
    T: Send + 'static,
    F: FnOnce(&mut AudioCaptureSession) -> Result<T, CaptureError> + Send + 'static,
{
    let mut guard = capture.clone().lock_owned().await;
    match tokio::task::spawn_blocking(move || op(&mut guard)).await {
        Ok(result) => result,
        Err(e) => Err(CaptureError::Device(format!("capture task failed: {}", e))),
    }
}

async fn send(tx: &mpsc::Sender<Event>, event: Event) {
    if tx.send(event).await.is_err() {
        log::debug!("Session loop gone, dropping completion");
    }
}

fn source_label(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.chars().count() <= SOURCE_LABEL_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(SOURCE_LABEL_CHARS).collect();
    format!("{}…", cut.trim_end())
}

async fn read_upload(path: &Path) -> Result<(String, Vec<u8>), BackendError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BackendError::FileRead(format!("{}: {}", path.display(), e)))?;
    Ok((name, bytes))
}

impl EffectRunner for SessionEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::StartConversation { id, request } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.start_conversation(&request).await {
                        Ok(conversation_id) => Event::ConversationStarted {
                            id,
                            conversation_id,
                        },
                        Err(e) => Event::ConversationStartFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::SendMessage {
                id,
                conversation_id,
                text,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let started = Instant::now();
                    let event = match backend.send_message(&conversation_id, &text).await {
                        Ok(reply) => {
                            log::info!(
                                "Tutor replied in {:?} ({} chars)",
                                started.elapsed(),
                                reply.text.len()
                            );
                            Event::ReplyReceived { id, reply }
                        }
                        Err(e) => Event::ReplyFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::StartAudio { id } => {
                let capture = self.capture.clone();
                tokio::spawn(async move {
                    let result = with_capture(&capture, move |session| session.start(id)).await;
                    let event = match result {
                        Ok(true) => Event::AudioStartOk { id },
                        Ok(false) => Event::AudioStartFail {
                            id,
                            err: CaptureError::Device(
                                "previous recording is still being processed".to_string(),
                            ),
                        },
                        Err(err) => Event::AudioStartFail { id, err },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::StopAudio { id } => {
                let capture = self.capture.clone();
                tokio::spawn(async move {
                    let result = with_capture(&capture, |session| session.stop()).await;
                    let event = match result {
                        Ok(audio) => Event::AudioStopped {
                            id,
                            audio: Arc::new(audio),
                        },
                        Err(err) => Event::AudioStopFail { id, err },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::CancelAudio { id } => {
                let capture = self.capture.clone();
                tokio::spawn(async move {
                    log::info!("Cancelling recording {}", id);
                    let result = with_capture(&capture, move |session| {
                        session.abort(id);
                        Ok(())
                    })
                    .await;
                    if let Err(e) = result {
                        log::error!("Cancelling recording {} failed: {}", id, e);
                    }
                });
            }

            Effect::Transcribe {
                id,
                audio,
                language,
            } => {
                let capture = self.capture.clone();
                let gateway = self.transcription.clone();
                let switcher = self.language.clone();
                tokio::spawn(async move {
                    let result = gateway.transcribe(&audio, &language).await;
                    capture.lock().await.complete();

                    let event = match result {
                        Ok(text) => {
                            if let Some(switcher) = &switcher {
                                watch_language(switcher, text.clone(), tx.clone());
                            }
                            Event::TranscribeOk { id, text }
                        }
                        Err(e) => Event::TranscribeFail {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::AnalyzePronunciation {
                id,
                audio,
                transcript,
                expected,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend
                        .analyze_pronunciation(&audio.to_base64(), &transcript, &expected)
                        .await
                    {
                        Ok(feedback) => Event::PronunciationAnalyzed { id, feedback },
                        Err(e) => Event::PronunciationFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::AnalyzeWriting { id, text, language } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.analyze_writing(&text, &language).await {
                        Ok(feedback) => Event::WritingAnalyzed { id, feedback },
                        Err(e) => Event::WritingFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::GenerateExercise { id, prompt, level } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.generate_exercise(&prompt, &level).await {
                        Ok(exercise) => Event::ExerciseGenerated { id, exercise },
                        Err(e) => Event::ExerciseFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::GeneratePassage { id, prompt, level } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.generate_passage(&prompt, &level).await {
                        Ok(passage) => Event::PassageGenerated { id, passage },
                        Err(e) => Event::PassageFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::AnalyzeUpload { id, path } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let result = match read_upload(&path).await {
                        Ok((name, bytes)) => {
                            log::info!("Uploading {} ({} bytes)", name, bytes.len());
                            backend
                                .analyze_upload(&name, bytes)
                                .await
                                .map(|analysis| LoadedContent {
                                    source: name,
                                    text: analysis.analysis.clone(),
                                    analysis,
                                })
                        }
                        Err(e) => Err(e),
                    };
                    let event = match result {
                        Ok(content) => Event::ContentAnalyzed { id, content },
                        Err(e) => Event::ContentFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::AnalyzeContent { id, content } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.analyze_content(&content).await {
                        Ok(analysis) => Event::ContentAnalyzed {
                            id,
                            content: LoadedContent {
                                source: source_label(&content),
                                text: content,
                                analysis,
                            },
                        },
                        Err(e) => Event::ContentFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::AnswerQuestion {
                id,
                question,
                content,
                analysis,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend
                        .answer_question(&question, &content, &analysis)
                        .await
                    {
                        Ok(answer) => Event::QuestionAnswered { id, answer },
                        Err(e) => Event::QuestionFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::GenerateQuiz {
                id,
                content,
                analysis,
            } => {
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    let event = match backend.generate_quiz(&content, &analysis).await {
                        Ok(questions) => Event::QuizGenerated { id, questions },
                        Err(e) => Event::QuizFailed {
                            id,
                            err: e.to_string(),
                        },
                    };
                    send(&tx, event).await;
                });
            }

            Effect::Speak { text } => {
                let playback = self.playback.clone();
                tokio::spawn(async move {
                    playback.play(&text).await;
                });
            }

            Effect::EmitUi => {
                // Published by the session loop itself
                log::warn!("EmitUi reached the effect runner; ignoring");
            }
        }
    }
}
