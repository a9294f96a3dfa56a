//! Sentence segmentation for streaming synthesis

/// Sentence boundary delimiter
const DELIMITER: char = '.';

/// One trimmed, non-empty fragment of a reply with its fixed playback index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    index: usize,
    text: String,
}

impl Sentence {
    /// Create a sentence at the given position
    #[must_use]
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Position of this sentence in the reply
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Sentence text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Split text on periods, trimming each fragment and dropping empty ones
///
/// Total over any input: an empty string yields an empty vector and runs of
/// delimiters collapse.
#[must_use]
pub fn segment(text: &str) -> Vec<String> {
    text.split(DELIMITER)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Segment text and assign each sentence its permanent index
#[must_use]
pub fn sentences(text: &str) -> Vec<Sentence> {
    segment(text)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Sentence::new(index, text))
        .collect()
}
