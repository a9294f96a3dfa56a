//! Assistant persona
//!
//! A persona supplies the system prompt and the fixed lines the assistant
//! speaks at the start and end of a conversation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Persona compiled into the binary
const EMBEDDED_PERSONA: &str = include_str!("../personas/olivia.json");

/// Identity and scripted lines of the assistant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// System prompt seeding every conversation
    pub system_prompt: String,

    /// Spoken when the conversation starts
    pub greeting: String,

    /// Spoken when the customer says an exit phrase
    pub farewell: String,

    /// Phrases that end the conversation (case-insensitive substring match)
    #[serde(default = "default_exit_phrases")]
    pub exit_phrases: Vec<String>,
}

fn default_exit_phrases() -> Vec<String> {
    vec!["goodbye".to_string(), "bye".to_string()]
}

impl Persona {
    /// Load the embedded default persona
    ///
    /// # Errors
    ///
    /// Returns error if the embedded JSON is malformed
    pub fn embedded() -> Result<Self> {
        serde_json::from_str(EMBEDDED_PERSONA)
            .map_err(|e| Error::Config(format!("failed to parse embedded persona: {e}")))
    }

    /// Load a persona from a JSON or TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let persona: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", path.display()))
            })?,
        };

        tracing::info!(persona = %persona.id, path = %path.display(), "loaded persona");
        Ok(persona)
    }

    /// Load from `path` if given, otherwise the embedded persona
    ///
    /// # Errors
    ///
    /// Returns error if the chosen source cannot be loaded
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(Self::embedded, Self::load)
    }

    /// Whether the transcript contains any exit phrase
    #[must_use]
    pub fn is_exit(&self, transcript: &str) -> bool {
        let lower = transcript.to_lowercase();
        self.exit_phrases
            .iter()
            .any(|phrase| lower.contains(&phrase.to_lowercase()))
    }
}
