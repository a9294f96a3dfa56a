//! Speech-to-text (STT) processing

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::OpenAiConfig;
use crate::{Error, Result};

/// Turns a recorded utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or transcription fails
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech with `OpenAI` Whisper
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(openai: &OpenAiConfig, model: impl Into<String>) -> Result<Self> {
        if openai.api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: openai.api_key.clone(),
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        tracing::debug!(audio_bytes = bytes.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let openai = OpenAiConfig {
            api_key: SecretString::from(""),
            base_url: "https://api.openai.com/v1".to_string(),
        };
        assert!(WhisperTranscriber::new(&openai, "whisper-1").is_err());
    }

    #[tokio::test]
    async fn test_missing_audio_file() {
        let openai = OpenAiConfig {
            api_key: SecretString::from("sk-test"),
            base_url: "http://127.0.0.1:9".to_string(),
        };
        let stt = WhisperTranscriber::new(&openai, "whisper-1").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = stt.transcribe(&dir.path().join("input.wav")).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_parse_response() {
        let parsed: WhisperResponse =
            serde_json::from_str(r#"{"text":"Tell me about the E5"}"#).unwrap();
        assert_eq!(parsed.text, "Tell me about the E5");
    }
}
