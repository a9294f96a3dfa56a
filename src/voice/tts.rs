//! Text-to-speech (TTS) processing

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::segment::Sentence;
use super::streaming::SpeechSynthesizer;
use crate::config::{OpenAiConfig, SpeechConfig};
use crate::{Error, Result};

/// Synthesizes sentences with the `OpenAI` speech endpoint
///
/// Each sentence is written to `output_<index>.mp3` in the audio directory.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    voice: String,
    speed: f32,
    audio_dir: PathBuf,
}

impl OpenAiSpeech {
    /// Create a new `OpenAI` TTS instance
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(openai: &OpenAiConfig, speech: &SpeechConfig, audio_dir: &Path) -> Result<Self> {
        if openai.api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: openai.api_key.clone(),
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            model: speech.tts_model.clone(),
            voice: speech.tts_voice.clone(),
            speed: speech.tts_speed,
            audio_dir: audio_dir.to_path_buf(),
        })
    }

    /// Path the artifact for a sentence is written to
    #[must_use]
    pub fn artifact_path(&self, index: usize) -> PathBuf {
        self.audio_dir.join(format!("output_{index}.mp3"))
    }

    /// Request MP3 audio for `text`
    async fn request_audio(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, sentence: &Sentence) -> Result<PathBuf> {
        let audio = self.request_audio(sentence.text()).await?;
        let path = self.artifact_path(sentence.index());

        tokio::fs::write(&path, &audio).await?;
        tracing::debug!(
            index = sentence.index(),
            bytes = audio.len(),
            path = %path.display(),
            "speech written"
        );

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(api_key: &str) -> (OpenAiConfig, SpeechConfig) {
        (
            OpenAiConfig {
                api_key: SecretString::from(api_key),
                base_url: "https://api.openai.com/v1/".to_string(),
            },
            SpeechConfig::default(),
        )
    }

    #[test]
    fn test_requires_api_key() {
        let (openai, speech) = configs("");
        assert!(matches!(
            OpenAiSpeech::new(&openai, &speech, Path::new("audio")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_artifact_path_uses_index() {
        let (openai, speech) = configs("sk-test");
        let tts = OpenAiSpeech::new(&openai, &speech, Path::new("/tmp/audio")).unwrap();

        assert_eq!(tts.artifact_path(3), PathBuf::from("/tmp/audio/output_3.mp3"));
        assert_eq!(tts.base_url, "https://api.openai.com/v1");
    }
}
