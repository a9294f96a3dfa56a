//! Microphone recording

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::command::run_command;
use super::device::choose_config;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// File name of the recorded customer utterance
const INPUT_FILE: &str = "input.wav";

/// Records one fixed-length utterance to a WAV file
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Record for `duration` and return the path of the WAV file
    ///
    /// # Errors
    ///
    /// Returns error if the recording device or process fails
    async fn record(&self, duration: Duration) -> Result<PathBuf>;
}

/// Records via an external `sox` process (`sox -d <file> trim 0 <secs>`)
#[derive(Debug, Clone)]
pub struct CommandRecorder {
    program: String,
    output: PathBuf,
}

impl CommandRecorder {
    /// Create a recorder writing `input.wav` into `audio_dir`
    #[must_use]
    pub fn new(program: impl Into<String>, audio_dir: &Path) -> Self {
        Self {
            program: program.into(),
            output: audio_dir.join(INPUT_FILE),
        }
    }

    /// Arguments passed to the recorder program
    fn args(&self, duration: Duration) -> Vec<String> {
        vec![
            "-d".to_string(),
            self.output.display().to_string(),
            "trim".to_string(),
            "0".to_string(),
            duration.as_secs().to_string(),
        ]
    }
}

#[async_trait]
impl Recorder for CommandRecorder {
    async fn record(&self, duration: Duration) -> Result<PathBuf> {
        tracing::debug!(program = %self.program, secs = duration.as_secs(), "recording");

        run_command(&self.program, self.args(duration), Error::Recording).await?;
        Ok(self.output.clone())
    }
}

/// Records from the default input device via cpal
#[derive(Debug, Clone)]
pub struct DeviceRecorder {
    config: StreamConfig,
    output: PathBuf,
}

impl DeviceRecorder {
    /// Open the default input device, writing `input.wav` into `audio_dir`
    ///
    /// # Errors
    ///
    /// Returns error if no input device or suitable config is available
    pub fn new(audio_dir: &Path) -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let ranges = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let config = choose_config(ranges, SAMPLE_RATE, &[1])
            .ok_or_else(|| Error::Audio(format!("no mono input config at {SAMPLE_RATE} Hz")))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            output: audio_dir.join(INPUT_FILE),
        })
    }
}

#[async_trait]
impl Recorder for DeviceRecorder {
    async fn record(&self, duration: Duration) -> Result<PathBuf> {
        let config = self.config.clone();
        let samples = tokio::task::spawn_blocking(move || capture_blocking(&config, duration))
            .await
            .map_err(|e| Error::Recording(format!("capture task failed: {e}")))??;

        tracing::debug!(samples = samples.len(), "capture complete");

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        tokio::fs::write(&self.output, wav).await?;
        Ok(self.output.clone())
    }
}

/// Capture from the default input device for `duration`
fn capture_blocking(config: &StreamConfig, duration: Duration) -> Result<Vec<f32>> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or_else(|| Error::Recording("no input device".to_string()))?;

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(data);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Recording(e.to_string()))?;

    stream.play().map_err(|e| Error::Recording(e.to_string()))?;
    std::thread::sleep(duration);
    drop(stream);

    let samples = buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .unwrap_or_default();
    Ok(samples)
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_recorder_args() {
        let recorder = CommandRecorder::new("sox", Path::new("/tmp/audio"));
        assert_eq!(
            recorder.args(Duration::from_secs(5)),
            vec!["-d", "/tmp/audio/input.wav", "trim", "0", "5"]
        );
    }

    #[tokio::test]
    async fn test_command_recorder_failure() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = CommandRecorder::new("false", dir.path());

        let err = recorder.record(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Recording(_)));
    }

    #[tokio::test]
    async fn test_command_recorder_returns_input_path() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = CommandRecorder::new("true", dir.path());

        let path = recorder.record(Duration::from_secs(1)).await.unwrap();
        assert_eq!(path, dir.path().join("input.wav"));
    }

    #[test]
    fn test_samples_to_wav_header() {
        let samples = vec![0.0, 0.5, -0.5, 1.0, -1.0];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![0, 16383, -16383, 32767, -32767]);
    }
}
