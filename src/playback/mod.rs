mod controller;
mod sink;

pub use controller::{decode_audio, SpeechPlaybackController, NOT_READY_RETRY_DELAY};
pub use sink::{PlaybackError, PlaybackSink, RodioSink};
