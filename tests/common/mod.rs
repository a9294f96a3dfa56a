//! Shared test fakes
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use voice_sales_assistant::conversation::Message;
use voice_sales_assistant::voice::{AudioPlayer, Recorder, Sentence, SpeechSynthesizer, Transcriber};
use voice_sales_assistant::{ChatModel, Error, Result};

/// Writes each sentence's text to `output_<index>.mp3` after a scripted delay
pub struct FakeSynthesizer {
    dir: PathBuf,
    delays: HashMap<usize, Duration>,
    failures: HashSet<usize>,
    barrier: Option<Barrier>,
    calls: Mutex<Vec<usize>>,
}

impl FakeSynthesizer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            delays: HashMap::new(),
            failures: HashSet::new(),
            barrier: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn delay(mut self, index: usize, millis: u64) -> Self {
        self.delays.insert(index, Duration::from_millis(millis));
        self
    }

    pub fn fail(mut self, index: usize) -> Self {
        self.failures.insert(index);
        self
    }

    /// Every call waits until `parties` calls are in flight at once
    pub fn rendezvous(mut self, parties: usize) -> Self {
        self.barrier = Some(Barrier::new(parties));
        self
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, sentence: &Sentence) -> Result<PathBuf> {
        let index = sentence.index();
        self.calls.lock().unwrap().push(index);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(delay) = self.delays.get(&index) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(&index) {
            return Err(Error::Tts(format!("provider rejected sentence {index}")));
        }

        let path = self.dir.join(format!("output_{index}.mp3"));
        tokio::fs::write(&path, sentence.text()).await?;
        Ok(path)
    }
}

/// Records what was played and how many plays overlapped
#[derive(Default)]
pub struct FakePlayer {
    delay: Duration,
    failing_text: Option<String>,
    panicking_text: Option<String>,
    played: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePlayer {
    pub fn new(millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
            ..Self::default()
        }
    }

    /// Fail playback of the artifact holding `text`
    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing_text = Some(text.to_string());
        self
    }

    /// Panic while playing the artifact holding `text`, leaving it on disk
    pub fn panicking_on(mut self, text: &str) -> Self {
        self.panicking_text = Some(text.to_string());
        self
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play(&self, artifact: &Path) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let text = tokio::fs::read_to_string(artifact).await?;
        tokio::time::sleep(self.delay).await;
        if self.panicking_text.as_deref() == Some(text.as_str()) {
            panic!("audio backend crashed on {text:?}");
        }
        tokio::fs::remove_file(artifact).await?;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_text.as_deref() == Some(text.as_str()) {
            return Err(Error::Playback("device unplugged".to_string()));
        }
        self.played.lock().unwrap().push(text);
        Ok(())
    }
}

/// Returns a fixed path without touching any device
pub struct FakeRecorder {
    path: PathBuf,
    recordings: AtomicUsize,
}

impl FakeRecorder {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("input.wav"),
            recordings: AtomicUsize::new(0),
        }
    }

    pub fn recordings(&self) -> usize {
        self.recordings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn record(&self, _duration: Duration) -> Result<PathBuf> {
        self.recordings.fetch_add(1, Ordering::SeqCst);
        Ok(self.path.clone())
    }
}

/// Replays scripted transcripts in order
pub struct ScriptedTranscriber {
    transcripts: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedTranscriber {
    pub fn new(transcripts: Vec<Result<String>>) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.into()),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String> {
        self.transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Stt("no more transcripts".to_string())))
    }
}

/// Replays scripted chat replies in order
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: AtomicUsize,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Files left behind in `dir`
pub fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
