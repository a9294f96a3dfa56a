//! Voice Sales Assistant - spoken customer conversations with an AI sales rep
//!
//! This library provides:
//! - Sentence-pipelined speech output (synthesis overlapped with playback)
//! - Recording and transcription of customer utterances
//! - Chat-completion replies with conversation history
//! - A turn-taking conversation loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Conversation Loop                    │
//! │   Record  │  Transcribe  │  Reply  │  Exit phrase   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ reply text
//! ┌────────────────────▼────────────────────────────────┐
//! │              Streaming Speaker                       │
//! │   Segment  │  Concurrent TTS  │  Ordered playback   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          OpenAI (STT / Chat / TTS) + sox             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod assistant;
pub mod config;
pub mod conversation;
pub mod error;
pub mod persona;
pub mod voice;

pub use agent::{APOLOGY, Agent, ChatModel, OpenAiChat};
pub use assistant::{Assistant, TurnOutcome};
pub use config::Config;
pub use conversation::{Conversation, Message, Role};
pub use error::{Error, Result};
pub use persona::Persona;
pub use voice::{SpeechReport, StreamingSpeaker};
