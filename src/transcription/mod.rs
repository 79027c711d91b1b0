//! Speech-to-text for recorded answers.

mod gateway;

pub use gateway::{TranscriptionError, TranscriptionGateway};
