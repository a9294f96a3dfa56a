use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use voice_sales_assistant::assistant::{build_recorder, build_speaker};
use voice_sales_assistant::config::AudioBackend;
use voice_sales_assistant::voice::sentences;
use voice_sales_assistant::{Assistant, Config};

/// Voice sales assistant - talk to an AI sales representative
#[derive(Parser)]
#[command(name = "voice-assistant", version, about)]
struct Cli {
    /// Seconds to record per customer turn (overrides `ASSISTANT_RECORD_SECONDS`)
    #[arg(long)]
    record_seconds: Option<u64>,

    /// Audio backend: "command" (sox/play) or "device" (cpal)
    #[arg(long)]
    audio_backend: Option<AudioBackend>,

    /// Persona file, JSON or TOML (overrides `ASSISTANT_PERSONA_FILE`)
    #[arg(long)]
    persona: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    /// Flags given on the command line win over the environment
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(secs) = self.record_seconds {
            config.audio.record_seconds = secs;
        }
        if let Some(backend) = self.audio_backend {
            config.audio.backend = backend;
        }
        if let Some(persona) = &self.persona {
            config.persona_file = Some(persona.clone());
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Speak text through the streaming synthesizer
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Show how text is split into sentences
    Segment {
        /// Text to split
        text: String,
    },
    /// Record one utterance and print where it was saved
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voice_sales_assistant=info",
        1 => "info,voice_sales_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Segment { text }) = &cli.command {
        for sentence in sentences(text) {
            println!("{}: {}", sentence.index(), sentence.text());
        }
        return Ok(());
    }

    let mut config = Config::from_env()?;
    cli.apply_overrides(&mut config);
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Speak { text }) => speak(&config, &text).await,
        Some(Command::TestMic { duration }) => test_mic(&config, duration).await,
        Some(Command::Segment { .. }) => Ok(()),
        None => converse(&config).await,
    }
}

/// Run the conversation loop on stdin
async fn converse(config: &Config) -> anyhow::Result<()> {
    let mut assistant = Assistant::from_config(config)?;
    println!("Starting {} ...", assistant.persona().name);

    assistant.run(BufReader::new(tokio::io::stdin())).await?;
    Ok(())
}

/// Speak text once
async fn speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let speaker = build_speaker(config)?;
    let report = speaker.stream_text(text).await;

    println!(
        "Spoke {}/{} sentences ({} failed, {} discarded)",
        report.played,
        report.sentences,
        report.failed.len(),
        report.discarded
    );
    Ok(())
}

/// Record one utterance
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Recording for {duration} seconds, speak into your microphone!");

    let recorder = build_recorder(config)?;
    let path = recorder.record(Duration::from_secs(duration)).await?;

    println!("Saved recording to {}", path.display());
    println!("If the file is silent, check your default input device.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_config() -> Config {
        Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "ASSISTANT_RECORD_SECONDS" => Some("8".to_string()),
            "ASSISTANT_PERSONA_FILE" => Some("env.json".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::try_parse_from([
            "voice-assistant",
            "--record-seconds",
            "3",
            "--audio-backend",
            "device",
            "--persona",
            "sam.toml",
        ])
        .unwrap();

        let mut config = env_config();
        cli.apply_overrides(&mut config);

        assert_eq!(config.audio.record_seconds, 3);
        assert_eq!(config.audio.backend, AudioBackend::Device);
        assert_eq!(config.persona_file, Some(PathBuf::from("sam.toml")));
    }

    #[test]
    fn test_absent_flags_keep_environment() {
        let cli = Cli::try_parse_from(["voice-assistant", "speak", "Hello."]).unwrap();
        assert!(cli.record_seconds.is_none());
        assert!(cli.audio_backend.is_none());

        let mut config = env_config();
        cli.apply_overrides(&mut config);

        assert_eq!(config.audio.record_seconds, 8);
        assert_eq!(config.audio.backend, AudioBackend::Command);
        assert_eq!(config.persona_file, Some(PathBuf::from("env.json")));
    }

    #[test]
    fn test_invalid_backend_flag_rejected_by_parser() {
        assert!(Cli::try_parse_from(["voice-assistant", "--audio-backend", "speakers"]).is_err());
    }
}
