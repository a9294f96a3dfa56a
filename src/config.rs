//! Configuration management for the voice sales assistant
//!
//! Settings come from the environment (optionally seeded from a `.env` file by
//! the binary). Only `OPENAI_API_KEY` is required.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::{DEFAULT_POLL_INTERVAL, DrainTrigger};
use crate::{Error, Result};

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credentials and endpoint
    pub openai: OpenAiConfig,

    /// Chat completion settings
    pub chat: ChatConfig,

    /// STT/TTS model settings
    pub speech: SpeechConfig,

    /// Recording and playback settings
    pub audio: AudioConfig,

    /// Streaming synthesis settings
    pub pipeline: PipelineConfig,

    /// Optional persona file (JSON or TOML), embedded persona otherwise
    pub persona_file: Option<PathBuf>,
}

/// `OpenAI` credentials and endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key (from `OPENAI_API_KEY`)
    pub api_key: SecretString,

    /// API base URL, without trailing `/`
    pub base_url: String,
}

/// Chat completion settings
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Chat model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens per reply
    pub max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

/// Speech model settings
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Transcription model (e.g. "whisper-1")
    pub stt_model: String,

    /// Synthesis model (e.g. "tts-1")
    pub tts_model: String,

    /// Synthesis voice
    pub tts_voice: String,

    /// Synthesis speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// Where recording and playback happen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioBackend {
    /// External `sox`/`play` processes
    #[default]
    Command,
    /// Default input/output device via cpal
    Device,
}

impl FromStr for AudioBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" | "sox" => Ok(Self::Command),
            "device" | "cpal" => Ok(Self::Device),
            other => Err(Error::Config(format!("unknown audio backend: {other}"))),
        }
    }
}

/// Recording and playback settings
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Directory for recorded input and synthesized artifacts
    pub dir: PathBuf,

    /// Recording/playback backend
    pub backend: AudioBackend,

    /// Length of each recording
    pub record_seconds: u64,

    /// Player program for the command backend
    pub play_command: String,

    /// Recorder program for the command backend
    pub record_command: String,
}

/// Streaming synthesis settings
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Completion poll interval
    pub poll_interval: Duration,

    /// When the playback drain first starts
    pub drain_trigger: DrainTrigger,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_trigger: DrainTrigger::default(),
        }
    }
}

/// Default audio directory (`~/.local/share/voice-assistant/audio` on Linux)
fn default_audio_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "omni", "voice-assistant")
        .map_or_else(|| PathBuf::from("audio"), |d| d.data_dir().join("audio"))
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Creates the audio directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing, a value fails to parse, or
    /// the audio directory cannot be created
    pub fn from_env() -> Result<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        std::fs::create_dir_all(&config.audio.dir).map_err(|e| {
            Error::Config(format!(
                "failed to create audio directory {}: {e}",
                config.audio.dir.display()
            ))
        })?;
        tracing::debug!(path = %config.audio.dir.display(), "audio directory ready");

        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing or a value fails to parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is required".to_string()))?;

        let openai = OpenAiConfig {
            api_key: SecretString::from(api_key),
            base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        let chat_defaults = ChatConfig::default();
        let chat = ChatConfig {
            model: lookup("ASSISTANT_CHAT_MODEL").unwrap_or(chat_defaults.model),
            temperature: parse_or(&lookup, "ASSISTANT_TEMPERATURE", chat_defaults.temperature)?,
            max_tokens: parse_or(&lookup, "ASSISTANT_MAX_TOKENS", chat_defaults.max_tokens)?,
        };

        let speech_defaults = SpeechConfig::default();
        let speech = SpeechConfig {
            stt_model: lookup("ASSISTANT_STT_MODEL").unwrap_or(speech_defaults.stt_model),
            tts_model: lookup("ASSISTANT_TTS_MODEL").unwrap_or(speech_defaults.tts_model),
            tts_voice: lookup("ASSISTANT_TTS_VOICE").unwrap_or(speech_defaults.tts_voice),
            tts_speed: parse_or(&lookup, "ASSISTANT_TTS_SPEED", speech_defaults.tts_speed)?,
        };

        if !(0.25..=4.0).contains(&speech.tts_speed) {
            return Err(Error::Config(format!(
                "ASSISTANT_TTS_SPEED must be between 0.25 and 4.0, got {}",
                speech.tts_speed
            )));
        }

        let audio = AudioConfig {
            dir: lookup("ASSISTANT_AUDIO_DIR").map_or_else(default_audio_dir, PathBuf::from),
            backend: parse_or(&lookup, "ASSISTANT_AUDIO_BACKEND", AudioBackend::default())?,
            record_seconds: parse_or(&lookup, "ASSISTANT_RECORD_SECONDS", 5)?,
            play_command: lookup("ASSISTANT_PLAY_COMMAND").unwrap_or_else(|| "play".to_string()),
            record_command: lookup("ASSISTANT_RECORD_COMMAND")
                .unwrap_or_else(|| "sox".to_string()),
        };

        let pipeline = PipelineConfig {
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "ASSISTANT_POLL_INTERVAL_MS",
                100,
            )?),
            drain_trigger: parse_or(&lookup, "ASSISTANT_DRAIN_TRIGGER", DrainTrigger::default())?,
        };

        let persona_file = lookup("ASSISTANT_PERSONA_FILE").map(PathBuf::from);

        Ok(Self {
            openai,
            chat,
            speech,
            audio,
            pipeline,
            persona_file,
        })
    }
}

/// Parse an optional value, falling back to `default` when unset
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key} {raw:?}: {e}")))
    })
}
