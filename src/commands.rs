//! Terminal input parsing.
//!
//! Plain lines are chat input; lines starting with `/` are commands. Numbers
//! typed by the user are 1-based.

use std::path::PathBuf;

use crate::model::{Mode, QuizAnswer};
use crate::state_machine::Event;

pub const HELP: &str = "\
Type a message to talk to the tutor, or use a command:
  /start                 start a conversation
  /restart               clear the session and start over
  /mode <name>           speaking | reading | writing | listening | flashcards | quiz | qa | none
  /record                start or stop a recording
  /cancel                discard the current recording
  /practice <sentence>   set the sentence for pronunciation practice
  /write <text>          submit writing for feedback
  /upload <path>         analyze a PDF, DOC(X), TXT or PPT(X) document
  /ask <question>        ask about the loaded content
  /quiz                  generate a quiz from the loaded content
  /answer <n> <choice>   answer quiz question n (choice number or true/false)
  /submit                grade the quiz
  /read <a> <b> ...      answer the reading questions (choice numbers, - to skip)
  /flip /next /prev      flashcards
  /listen <text>         hear text spoken
  /pause /resume /stop   playback control
  /translate <lang> <text>
  /dismiss               clear the current notice
  /status                show progress
  /quit";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid argument: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Forwarded to the session loop.
    Session(Event),
    Listen(String),
    Pause,
    Resume,
    Stop,
    Translate { target: String, text: String },
    Status,
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for blank input.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Session(Event::SubmitText {
            text: line.to_string(),
        })));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name.to_lowercase().as_str() {
        "start" => Command::Session(Event::StartSession),
        "restart" => Command::Session(Event::Restart),
        "mode" => {
            let mode = Mode::from_name(arg).ok_or(CommandError::Usage(
                "/mode speaking|reading|writing|listening|flashcards|quiz|qa|none",
            ))?;
            Command::Session(Event::SetMode { mode })
        }
        "record" | "rec" => Command::Session(Event::MicToggle),
        "cancel" => Command::Session(Event::CancelRecording),
        "practice" => Command::Session(Event::SetPracticeSentence {
            text: arg.to_string(),
        }),
        "write" => Command::Session(Event::SubmitWriting {
            text: required(arg, "/write <text>")?,
        }),
        "upload" => Command::Session(Event::UploadDocument {
            path: PathBuf::from(required(arg, "/upload <path>")?),
        }),
        "ask" => Command::Session(Event::AskQuestion {
            question: required(arg, "/ask <question>")?,
        }),
        "quiz" => Command::Session(Event::GenerateQuiz),
        "answer" => parse_quiz_answer(arg)?,
        "submit" => Command::Session(Event::SubmitQuiz),
        "read" => Command::Session(Event::SubmitReadingAnswers {
            answers: parse_reading_answers(arg)?,
        }),
        "flip" => Command::Session(Event::FlipCard),
        "next" => Command::Session(Event::NextCard),
        "prev" => Command::Session(Event::PrevCard),
        "listen" => Command::Listen(required(arg, "/listen <text>")?),
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "translate" => {
            let (target, text) = arg
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("/translate <lang> <text>"))?;
            Command::Translate {
                target: target.to_string(),
                text: text.trim().to_string(),
            }
        }
        "dismiss" => Command::Session(Event::DismissNotice),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn required(arg: &str, usage: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok(arg.to_string())
}

fn one_based(token: &str) -> Result<usize, CommandError> {
    match token.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(CommandError::Invalid(format!(
            "'{}' is not a number starting from 1",
            token
        ))),
    }
}

fn parse_quiz_answer(arg: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "/answer <question number> <choice number | true | false>";

    let (index, answer) = arg
        .split_once(char::is_whitespace)
        .ok_or(CommandError::Usage(USAGE))?;
    let index = one_based(index)?;
    let answer = answer.trim();

    let answer = if answer.chars().all(|c| c.is_ascii_digit()) {
        QuizAnswer::Choice(one_based(answer)?)
    } else {
        QuizAnswer::Text(answer.to_lowercase())
    };

    Ok(Command::Session(Event::AnswerQuiz { index, answer }))
}

fn parse_reading_answers(arg: &str) -> Result<Vec<Option<usize>>, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Usage("/read <choice> <choice> ..."));
    }
    arg.split_whitespace()
        .map(|token| match token {
            "-" | "_" => Ok(None),
            n => one_based(n).map(Some),
        })
        .collect()
}
