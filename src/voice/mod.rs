//! Voice processing module
//!
//! Handles recording, transcription, and sentence-pipelined speech output.

mod capture;
mod command;
mod device;
mod playback;
mod segment;
mod streaming;
mod stt;
mod tts;

pub use capture::{CommandRecorder, DeviceRecorder, Recorder, SAMPLE_RATE, samples_to_wav};
pub use playback::{CommandPlayer, DevicePlayer};
pub use segment::{Sentence, segment, sentences};
pub use streaming::{
    AudioPlayer, DEFAULT_POLL_INTERVAL, DrainTrigger, SpeechReport, SpeechSynthesizer,
    StreamingSpeaker,
};
pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::OpenAiSpeech;
