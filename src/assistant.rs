//! Turn-taking conversation loop
//!
//! Each turn waits for the customer to press Enter, records a fixed-length
//! utterance, transcribes it, and either says goodbye or speaks the agent's
//! reply through the streaming speaker.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::{Agent, ChatModel, OpenAiChat};
use crate::config::{AudioBackend, Config};
use crate::persona::Persona;
use crate::voice::{
    AudioPlayer, CommandPlayer, CommandRecorder, DevicePlayer, DeviceRecorder, OpenAiSpeech,
    Recorder, SpeechReport, StreamingSpeaker, Transcriber, WhisperTranscriber,
};
use crate::Result;

/// Default recording length per turn
pub const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(5);

/// What happens after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Keep listening
    Continue,
    /// Customer said an exit phrase
    Exit,
}

/// Voice sales assistant conversation
pub struct Assistant {
    persona: Persona,
    agent: Agent,
    speaker: StreamingSpeaker,
    recorder: Arc<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    record_duration: Duration,
}

impl Assistant {
    /// Assemble an assistant from its collaborators
    #[must_use]
    pub fn new(
        persona: Persona,
        chat: Arc<dyn ChatModel>,
        speaker: StreamingSpeaker,
        recorder: Arc<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let agent = Agent::new(chat, &persona.system_prompt);
        Self {
            persona,
            agent,
            speaker,
            recorder,
            transcriber,
            record_duration: DEFAULT_RECORD_DURATION,
        }
    }

    /// Set the recording length per turn
    #[must_use]
    pub const fn with_record_duration(mut self, record_duration: Duration) -> Self {
        self.record_duration = record_duration;
        self
    }

    /// Build an assistant wired to `OpenAI` and the configured audio backend
    ///
    /// # Errors
    ///
    /// Returns error if the persona cannot be loaded or a collaborator cannot
    /// be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let persona = Persona::resolve(config.persona_file.as_deref())?;
        let chat = Arc::new(OpenAiChat::new(&config.openai, config.chat.clone())?);
        let transcriber = Arc::new(WhisperTranscriber::new(
            &config.openai,
            config.speech.stt_model.clone(),
        )?);

        let assistant = Self::new(
            persona,
            chat,
            build_speaker(config)?,
            build_recorder(config)?,
            transcriber,
        )
        .with_record_duration(Duration::from_secs(config.audio.record_seconds));

        Ok(assistant)
    }

    /// Active persona
    #[must_use]
    pub const fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Agent holding the conversation history
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Greet the customer, then take turns until an exit phrase or end of input
    ///
    /// A line read from `input` starts each recording. Errors inside a turn are
    /// logged and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns error only if reading from `input` fails
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        tracing::info!(persona = %self.persona.id, "starting conversation");

        let greeting = self.persona.greeting.clone();
        self.say(&greeting).await;

        let mut lines = input.lines();
        loop {
            println!(
                "\nPress Enter to start recording ({} seconds)...",
                self.record_duration.as_secs()
            );

            if lines.next_line().await?.is_none() {
                tracing::info!("input closed, ending conversation");
                break;
            }

            match self.turn().await {
                Ok(TurnOutcome::Continue) => {}
                Ok(TurnOutcome::Exit) => break,
                Err(e) => tracing::error!(error = %e, "error in conversation turn"),
            }
        }

        Ok(())
    }

    /// Record, transcribe, and answer one customer utterance
    ///
    /// # Errors
    ///
    /// Returns error if recording or transcription fails
    pub async fn turn(&mut self) -> Result<TurnOutcome> {
        println!("Recording...");
        let audio = self.recorder.record(self.record_duration).await?;
        let user_input = self.transcriber.transcribe(&audio).await?;
        println!("Customer: {user_input}");

        if self.persona.is_exit(&user_input) {
            let farewell = self.persona.farewell.clone();
            self.say(&farewell).await;
            return Ok(TurnOutcome::Exit);
        }

        let reply = self.agent.reply(&user_input).await;
        self.say(&reply).await;
        Ok(TurnOutcome::Continue)
    }

    /// Print and speak one assistant line
    pub async fn say(&self, text: &str) -> SpeechReport {
        println!("Assistant: {text}");
        let report = self.speaker.stream_text(text).await;

        if !report.failed.is_empty() || report.discarded > 0 {
            tracing::warn!(
                failed = ?report.failed,
                discarded = report.discarded,
                "part of the reply was not spoken"
            );
        }
        report
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("persona", &self.persona.id)
            .field("agent", &self.agent)
            .field("speaker", &self.speaker)
            .field("record_duration", &self.record_duration)
            .finish_non_exhaustive()
    }
}

/// Build the player for the configured backend
///
/// # Errors
///
/// Returns error if the output device cannot be opened
pub fn build_player(config: &Config) -> Result<Arc<dyn AudioPlayer>> {
    let player: Arc<dyn AudioPlayer> = match config.audio.backend {
        AudioBackend::Command => Arc::new(CommandPlayer::new(&config.audio.play_command)),
        AudioBackend::Device => Arc::new(DevicePlayer::new()?),
    };
    Ok(player)
}

/// Build the recorder for the configured backend
///
/// # Errors
///
/// Returns error if the input device cannot be opened
pub fn build_recorder(config: &Config) -> Result<Arc<dyn Recorder>> {
    let recorder: Arc<dyn Recorder> = match config.audio.backend {
        AudioBackend::Command => Arc::new(CommandRecorder::new(
            &config.audio.record_command,
            &config.audio.dir,
        )),
        AudioBackend::Device => Arc::new(DeviceRecorder::new(&config.audio.dir)?),
    };
    Ok(recorder)
}

/// Build a streaming speaker using `OpenAI` speech and the configured player
///
/// # Errors
///
/// Returns error if the synthesizer or player cannot be created
pub fn build_speaker(config: &Config) -> Result<StreamingSpeaker> {
    let synthesizer = Arc::new(OpenAiSpeech::new(
        &config.openai,
        &config.speech,
        &config.audio.dir,
    )?);

    Ok(StreamingSpeaker::new(synthesizer, build_player(config)?)
        .with_poll_interval(config.pipeline.poll_interval)
        .with_drain_trigger(config.pipeline.drain_trigger))
}
