pub mod audio;
pub mod backend;
pub mod commands;
pub mod effects;
pub mod language;
pub mod mode_detector;
pub mod model;
pub mod playback;
pub mod scoring;
pub mod settings;
pub mod state_machine;
pub mod transcription;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use audio::{AudioCaptureSession, CpalMicrophone};
use backend::{BackendError, HttpBackend, TutorBackend};
use commands::Command;
use effects::{watch_language, EffectRunner, SessionEffectRunner};
use language::{LanguageAutoSwitcher, SwitcherConfig};
use model::Role;
use playback::{RodioSink, SpeechPlaybackController};
use settings::AppSettings;
use state_machine::{reduce, Effect, Event, SessionConfig, SessionState};

/// Capacity of the session event channel.
const EVENT_BUFFER: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// Run the session loop until `Shutdown` or until every sender is gone.
///
/// The loop is the only writer of the session state. Every state change is
/// published on `ui`; all other effects go to the runner. Returns the final
/// state.
pub async fn run_session_loop(
    initial: SessionState,
    mut rx: mpsc::Receiver<Event>,
    tx: mpsc::Sender<Event>,
    effect_runner: Arc<dyn EffectRunner>,
    ui: watch::Sender<SessionState>,
) -> SessionState {
    let mut state = initial;

    ui.send_replace(state.clone());
    log::info!("Session loop started");

    while let Some(event) = rx.recv().await {
        log::debug!("Received event: {:?}", event);

        // Handle Shutdown at the edge
        if matches!(event, Event::Shutdown) {
            log::info!("Shutdown requested, ending session loop");
            break;
        }

        let old_phase = state.phase();
        let old_mode = state.mode;
        let (next, effects) = reduce(&state, event);

        if old_phase != next.phase() || old_mode != next.mode {
            log::info!(
                "Session: {:?}/{} -> {:?}/{}",
                old_phase,
                old_mode,
                next.phase(),
                next.mode
            );
        }

        state = next;

        for eff in effects {
            match eff {
                Effect::EmitUi => {
                    ui.send_replace(state.clone());
                }
                other => effect_runner.spawn(other, tx.clone()),
            }
        }
    }

    log::info!("Session loop ended");
    state
}

/// Terminal front end: wires the HTTP collaborator, the default microphone and
/// speaker to a session loop and drives it from stdin.
pub async fn run(settings: AppSettings) -> Result<(), RunError> {
    let backend: Arc<dyn TutorBackend> = Arc::new(HttpBackend::new(
        &settings,
        settings::api_key_from_env(),
    )?);
    log::info!("Using tutoring backend at {}", settings.api_base_url);

    let playback = Arc::new(SpeechPlaybackController::new(
        backend.clone(),
        Arc::new(RodioSink::new()),
    ));
    let capture = AudioCaptureSession::new(Arc::new(CpalMicrophone::new()));
    let switcher = LanguageAutoSwitcher::new(backend.clone(), SwitcherConfig::from(&settings));
    let runner = SessionEffectRunner::with_language_switcher(
        backend,
        capture,
        playback.clone(),
        switcher.clone(),
    );

    let (tx, rx) = mpsc::channel::<Event>(EVENT_BUFFER);
    let initial = SessionState::new(SessionConfig::from(&settings));
    let (ui_tx, ui_rx) = watch::channel(initial.clone());

    let session = tokio::spawn(run_session_loop(initial, rx, tx.clone(), runner, ui_tx));
    tokio::spawn(render(ui_rx.clone()));

    if tx.send(Event::StartSession).await.is_err() {
        log::error!("Session loop is not running");
        return Ok(());
    }

    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Session(event) => {
                if let Event::SubmitText { text } = &event {
                    watch_language(&switcher, text.clone(), tx.clone());
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Command::Listen(text) => {
                let playback = playback.clone();
                tokio::spawn(async move {
                    playback.play(&text).await;
                });
            }
            Command::Pause => playback.pause(),
            Command::Resume => playback.resume(),
            Command::Stop => playback.stop(),
            Command::Translate { target, text } => {
                let switcher = switcher.clone();
                tokio::spawn(async move {
                    let translated = switcher.translate(&text, &target, None).await;
                    println!("[{}] {}", target, translated);
                });
            }
            Command::Status => print_status(&ui_rx.borrow()),
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => break,
        }
    }

    playback.stop();
    let _ = tx.send(Event::Shutdown).await;
    if let Ok(state) = session.await {
        log::info!(
            "Session finished: {} messages, {} recordings",
            state.messages.len(),
            state.stats.total_recordings
        );
    }
    Ok(())
}

/// Print new messages and notices as the session state changes.
async fn render(mut ui: watch::Receiver<SessionState>) {
    let mut epoch = ui.borrow().epoch;
    let mut shown = 0usize;
    let mut last_notice = None;

    while ui.changed().await.is_ok() {
        let state = ui.borrow_and_update().clone();

        if state.epoch != epoch {
            epoch = state.epoch;
            shown = 0;
            println!("--- new session ---");
        }

        for message in state.messages.iter().skip(shown) {
            match message.role {
                Role::User => println!("you> {}", message.text),
                Role::Ai => println!("tutor> {}", message.text),
            }
        }
        shown = state.messages.len();

        if state.notice != last_notice {
            if let Some(notice) = &state.notice {
                println!("! {}", notice.message());
            }
            last_notice = state.notice.clone();
        }
    }
}

fn print_status(state: &SessionState) {
    println!("mode: {}   phase: {:?}", state.mode, state.phase());
    for card in &state.cards {
        let marker = if card.is_active { "*" } else { " " };
        println!("{} {:<24} {:>3}%", marker, card.title, card.progress);
    }
    let stats = &state.stats;
    println!(
        "recordings: {}  average: {}  best: {:.1}  challenges: {}",
        stats.total_recordings, stats.average_score, stats.best_score, stats.challenges_completed
    );
    if !state.achievements.is_empty() {
        let titles: Vec<&str> = state.achievements.iter().map(|a| a.title()).collect();
        println!("achievements: {}", titles.join(", "));
    }
    if let Some(sentence) = &state.practice_sentence {
        println!("practice sentence: {}", sentence);
    }
    if let Some(card) = state.current_flashcard() {
        let face = if state.flashcard.flipped {
            &card.back
        } else {
            &card.front
        };
        println!("flashcard {}: {}", state.flashcard.index + 1, face);
    }
    if let Some(passage) = &state.passage {
        for (i, q) in passage.questions.iter().enumerate() {
            println!("Q{}. {}", i + 1, q.question);
            for (j, option) in q.options.iter().enumerate() {
                println!("   {}) {}", j + 1, option);
            }
        }
    }
    for (i, q) in state.quiz.questions.iter().enumerate() {
        println!("quiz {}. {}", i + 1, q.question);
        for (j, option) in q.options.iter().enumerate() {
            println!("   {}) {}", j + 1, option);
        }
    }
    println!("ui language: {}", state.ui_language.code());
}
