//! Sentence-pipelined speech synthesis with ordered playback
//!
//! A reply is segmented into sentences and every sentence is sent to the
//! synthesizer at once. Results are awaited in sentence order and appended to
//! a playback queue, which a single background drain plays one artifact at a
//! time. Later sentences are therefore synthesized while earlier ones are
//! already sounding.
//!
//! The drain is first started when sentence 0 has been synthesized. If that
//! sentence fails under [`DrainTrigger::FirstSentence`], nothing in the reply is
//! played: the queued artifacts are deleted once every task has resolved. The
//! same happens to whatever is still queued if a player panics mid-reply.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::segment::{self, Sentence};
use crate::{Error, Result};

/// Default interval between completion checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Converts one sentence into an audio artifact
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize a sentence and return the path of the written artifact
    ///
    /// # Errors
    ///
    /// Returns error if the provider call or the artifact write fails
    async fn synthesize(&self, sentence: &Sentence) -> Result<PathBuf>;
}

/// Plays an audio artifact to completion
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the artifact, returning once it has finished sounding
    ///
    /// Implementations delete the artifact afterward, whether or not playback
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns error if the device or player process fails
    async fn play(&self, artifact: &Path) -> Result<()>;
}

/// When the playback drain is first started for a reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainTrigger {
    /// Only when sentence 0 has been synthesized
    #[default]
    FirstSentence,
    /// On the first successfully synthesized sentence of any index
    FirstSuccess,
}

impl FromStr for DrainTrigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "first-sentence" | "first_sentence" => Ok(Self::FirstSentence),
            "first-success" | "first_success" => Ok(Self::FirstSuccess),
            other => Err(Error::Config(format!("unknown drain trigger: {other}"))),
        }
    }
}

/// Outcome of streaming one reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechReport {
    /// Number of sentences the reply was split into
    pub sentences: usize,
    /// Sentences synthesized successfully
    pub synthesized: usize,
    /// Artifacts played without error
    pub played: usize,
    /// Indices of sentences whose synthesis failed
    pub failed: Vec<usize>,
    /// Artifacts deleted without being played
    pub discarded: usize,
}

/// Queue contents and drain flags, guarded together
#[derive(Debug, Default)]
struct PlaybackQueue {
    artifacts: VecDeque<PathBuf>,
    /// True exactly while one `play` call is in flight
    playing: bool,
    /// At most one drain runs at a time
    draining: bool,
    /// A drain has been started at least once for this reply
    activated: bool,
    /// The drain died in a panicking player; no drain may start again
    halted: bool,
    played: usize,
}

/// Per-reply playback state shared between the await loop and the drain
#[derive(Debug, Default)]
struct PlaybackState {
    queue: Mutex<PlaybackQueue>,
}

impl PlaybackState {
    fn lock(&self) -> MutexGuard<'_, PlaybackQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, artifact: PathBuf) {
        self.lock().artifacts.push_back(artifact);
    }

    fn is_activated(&self) -> bool {
        self.lock().activated
    }

    /// Claim the drain guard, returning false if a drain is already running
    fn try_begin_drain(&self) -> bool {
        let mut queue = self.lock();
        if queue.draining || queue.halted {
            return false;
        }
        queue.draining = true;
        queue.activated = true;
        true
    }

    /// Pop the head artifact and mark it playing, or release the drain guard
    fn next_artifact(&self) -> Option<PathBuf> {
        let mut queue = self.lock();
        let artifact = queue.artifacts.pop_front();
        if artifact.is_some() {
            queue.playing = true;
        } else {
            queue.draining = false;
        }
        artifact
    }

    fn finish_playing(&self, played: bool) {
        let mut queue = self.lock();
        queue.playing = false;
        if played {
            queue.played += 1;
        }
    }

    /// Release the drain for good after its task panicked
    fn halt(&self) {
        let mut queue = self.lock();
        queue.playing = false;
        queue.draining = false;
        queue.halted = true;
    }
}

/// Halts the playback state if the drain unwinds out of `play`
struct DrainGuard {
    state: Arc<PlaybackState>,
    /// Artifact handed to the player and not yet returned
    current: Option<PathBuf>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }

        tracing::error!("audio player panicked, stopping playback for this reply");
        self.state.halt();

        if let Some(path) = self.current.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %e, "failed to remove audio");
            }
        }
    }
}

/// One in-flight synthesis call bound to its sentence index
struct SynthesisTask {
    index: usize,
    handle: JoinHandle<Result<PathBuf>>,
}

impl SynthesisTask {
    async fn wait(self) -> (usize, Result<PathBuf>) {
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Tts(format!("synthesis task aborted: {e}"))),
        };
        (self.index, result)
    }
}

/// Streams replies through synthesis and playback sentence by sentence
pub struct StreamingSpeaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    poll_interval: Duration,
    trigger: DrainTrigger,
}

impl StreamingSpeaker {
    /// Create a speaker over a synthesizer and a player
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            synthesizer,
            player,
            poll_interval: DEFAULT_POLL_INTERVAL,
            trigger: DrainTrigger::default(),
        }
    }

    /// Set the completion poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set when the playback drain is first started
    #[must_use]
    pub const fn with_drain_trigger(mut self, trigger: DrainTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Synthesize and play `text`, returning once all of its audio has played
    ///
    /// Synthesis failures are logged per sentence and skipped. Playback
    /// failures are logged and the drain moves on to the next artifact.
    pub async fn stream_text(&self, text: &str) -> SpeechReport {
        let sentences = segment::sentences(text);
        let mut report = SpeechReport {
            sentences: sentences.len(),
            ..SpeechReport::default()
        };

        if sentences.is_empty() {
            tracing::debug!("nothing to speak");
            return report;
        }

        tracing::debug!(sentences = sentences.len(), "streaming reply");

        let state = Arc::new(PlaybackState::default());
        let tasks: Vec<SynthesisTask> = sentences
            .into_iter()
            .map(|sentence| self.dispatch(sentence))
            .collect();

        // Awaited in sentence order, so the queue is always in playback order
        for task in tasks {
            let (index, result) = task.wait().await;
            match result {
                Ok(artifact) => {
                    tracing::debug!(index, path = %artifact.display(), "sentence synthesized");
                    report.synthesized += 1;
                    state.enqueue(artifact);

                    if self.should_drain(index, &state) {
                        self.start_drain(&state);
                    }
                }
                Err(e) => {
                    tracing::error!(index, error = %e, "failed to convert sentence to speech");
                    report.failed.push(index);
                }
            }
        }

        report.discarded = self.wait_for_completion(&state).await;
        report.played = state.lock().played;

        tracing::debug!(
            played = report.played,
            failed = report.failed.len(),
            discarded = report.discarded,
            "reply finished"
        );
        report
    }

    /// Start synthesis for one sentence without waiting on it
    fn dispatch(&self, sentence: Sentence) -> SynthesisTask {
        let index = sentence.index();
        let synthesizer = Arc::clone(&self.synthesizer);
        let handle = tokio::spawn(async move { synthesizer.synthesize(&sentence).await });
        SynthesisTask { index, handle }
    }

    fn should_drain(&self, index: usize, state: &PlaybackState) -> bool {
        match self.trigger {
            DrainTrigger::FirstSentence => index == 0 || state.is_activated(),
            DrainTrigger::FirstSuccess => true,
        }
    }

    /// Spawn the drain unless one is already running
    fn start_drain(&self, state: &Arc<PlaybackState>) {
        if !state.try_begin_drain() {
            return;
        }

        let state = Arc::clone(state);
        let player = Arc::clone(&self.player);
        tokio::spawn(drain(state, player));
    }

    /// Poll until the queue is empty and nothing is playing
    ///
    /// Returns the number of artifacts discarded because no drain was ever
    /// started for them, or because the drain was halted by a panic.
    async fn wait_for_completion(&self, state: &PlaybackState) -> usize {
        loop {
            let orphaned = {
                let mut queue = state.lock();
                if queue.artifacts.is_empty() && !queue.playing {
                    return 0;
                }
                if queue.activated && !queue.halted {
                    None
                } else {
                    Some(queue.artifacts.drain(..).collect::<Vec<_>>())
                }
            };

            if let Some(orphaned) = orphaned {
                tracing::warn!(
                    count = orphaned.len(),
                    "playback is not running, discarding queued audio"
                );
                for path in &orphaned {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        tracing::debug!(path = %path.display(), error = %e, "failed to remove audio");
                    }
                }
                return orphaned.len();
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl std::fmt::Debug for StreamingSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSpeaker")
            .field("poll_interval", &self.poll_interval)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Play queued artifacts one at a time until the queue runs dry
async fn drain(state: Arc<PlaybackState>, player: Arc<dyn AudioPlayer>) {
    let mut guard = DrainGuard {
        state: Arc::clone(&state),
        current: None,
    };

    while let Some(artifact) = state.next_artifact() {
        tracing::debug!(path = %artifact.display(), "playing");
        guard.current = Some(artifact.clone());
        let result = player.play(&artifact).await;
        guard.current = None;

        if let Err(e) = &result {
            tracing::error!(path = %artifact.display(), error = %e, "failed to play audio");
        }
        state.finish_playing(result.is_ok());
    }
}
