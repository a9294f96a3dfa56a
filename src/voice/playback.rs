//! Audio playback of synthesized artifacts
//!
//! Both players delete the artifact once playback ends, successful or not.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::command::run_command;
use super::device::choose_config;
use super::streaming::AudioPlayer;
use crate::{Error, Result};

/// Sample rate for device playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Remove a played artifact, logging instead of failing
async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove audio file");
    }
}

/// Plays artifacts by running an external player (`play <file>` by default)
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
}

impl CommandPlayer {
    /// Create a player that runs `program <file>`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

}

impl Default for CommandPlayer {
    fn default() -> Self {
        Self::new("play")
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, artifact: &Path) -> Result<()> {
        let result = run_command(&self.program, [artifact], Error::Playback).await;
        remove_artifact(artifact).await;
        result
    }
}

/// Plays MP3 artifacts on the default output device
#[derive(Debug, Clone)]
pub struct DevicePlayer {
    config: StreamConfig,
}

impl DevicePlayer {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device or suitable config is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let ranges = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let config = choose_config(ranges, PLAYBACK_SAMPLE_RATE, &[1, 2]).ok_or_else(|| {
            Error::Audio(format!("no output config at {PLAYBACK_SAMPLE_RATE} Hz"))
        })?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }
}

#[async_trait]
impl AudioPlayer for DevicePlayer {
    async fn play(&self, artifact: &Path) -> Result<()> {
        let path: PathBuf = artifact.to_path_buf();
        let config = self.config.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            let mp3 = std::fs::read(&path)?;
            let samples = decode_mp3(&mp3)?;
            play_samples_blocking(&config, samples)
        })
        .await
        .map_err(|e| Error::Playback(format!("playback task failed: {e}")))
        .and_then(|r| r);

        remove_artifact(artifact).await;
        result
    }
}

/// Play mono samples on the default output device, blocking until done
fn play_samples_blocking(config: &StreamConfig, samples: Vec<f32>) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device".to_string()))?;

    let channels = usize::from(config.channels);
    let sample_count = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Release);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            position.store(pos + 1, Ordering::Relaxed);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while !finished.load(Ordering::Acquire) && start.elapsed() <= timeout {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device flush its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!(samples = sample_count, "playback complete");
    Ok(())
}

/// Decode an MP3 artifact to mono f32 samples
fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => return Ok(samples),
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        };
        samples.extend(frame.data.chunks(frame.channels.max(1)).map(downmix));
    }
}

/// Average one interleaved frame into a single sample in `-1.0..1.0`
#[allow(clippy::cast_precision_loss)]
fn downmix(frame: &[i16]) -> f32 {
    let sum: f32 = frame.iter().map(|&s| f32::from(s)).sum();
    sum / (frame.len() as f32 * 32768.0)
}
