//! Core type definitions for utterance corpora

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Unique identifier types
pub type UtteranceId = String;

/// Index into a word or character vocabulary
pub type LabelIndex = u32;

/// Training step and epoch counters
pub type Step = u64;
pub type Epoch = u64;

/// Data split an utterance belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum DataSplit {
    /// Training data, labels are vocabulary indices
    Train,

    /// Held-out evaluation data, labels are vocabulary indices
    Dev,

    /// Test data, labels are raw reference transcripts
    Test,
}

impl DataSplit {
    /// Returns true if labels for this split are raw transcripts
    pub fn is_test(&self) -> bool {
        matches!(self, DataSplit::Test)
    }

    /// Returns true if the input/label length invariant is enforced
    pub fn is_training(&self) -> bool {
        matches!(self, DataSplit::Train)
    }
}

impl fmt::Display for DataSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSplit::Train => "train",
            DataSplit::Dev => "dev",
            DataSplit::Test => "test",
        };
        f.write_str(name)
    }
}

impl FromStr for DataSplit {
    type Err = Error;

    /// Accepts bare split names and corpus subsets such as `dev_clean`
    /// or `test_other`.
    fn from_str(s: &str) -> Result<Self> {
        let base = s.split('_').next().unwrap_or_default();
        match base {
            "train" => Ok(DataSplit::Train),
            "dev" => Ok(DataSplit::Dev),
            "test" => Ok(DataSplit::Test),
            _ => Err(Error::config(format!("unknown data split: {}", s))),
        }
    }
}

impl TryFrom<String> for DataSplit {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DataSplit> for String {
    fn from(value: DataSplit) -> Self {
        value.to_string()
    }
}

/// Granularity of a transcription
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum LabelGranularity {
    /// Words occurring at least `min_freq` times, rarer words map to OOV
    Word { min_freq: u32 },

    /// Characters
    Character,

    /// Characters with word boundaries marked by capitalization
    CharacterCapitalDivide,
}

impl fmt::Display for LabelGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelGranularity::Word { min_freq } => write!(f, "word_freq{}", min_freq),
            LabelGranularity::Character => f.write_str("character"),
            LabelGranularity::CharacterCapitalDivide => f.write_str("character_capital_divide"),
        }
    }
}

impl FromStr for LabelGranularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "character" => Ok(LabelGranularity::Character),
            "character_capital_divide" => Ok(LabelGranularity::CharacterCapitalDivide),
            _ => s
                .strip_prefix("word_freq")
                .and_then(|freq| freq.parse().ok())
                .map(|min_freq| LabelGranularity::Word { min_freq })
                .ok_or_else(|| Error::config(format!("unknown label type: {}", s))),
        }
    }
}

impl TryFrom<String> for LabelGranularity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LabelGranularity> for String {
    fn from(value: LabelGranularity) -> Self {
        value.to_string()
    }
}

/// Acoustic features for one utterance, row-major `[frames, feature_dim]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Features {
    /// Flattened frame data
    pub data: Vec<f32>,

    /// Width of a single frame
    pub feature_dim: usize,
}

impl Features {
    /// Create features from flattened frame data
    pub fn new(data: Vec<f32>, feature_dim: usize) -> Self {
        Self { data, feature_dim }
    }

    /// Zero-filled features with the given shape
    pub fn zeros(num_frames: usize, feature_dim: usize) -> Self {
        Self::new(vec![0.0; num_frames * feature_dim], feature_dim)
    }

    /// Number of time steps
    pub fn num_frames(&self) -> usize {
        if self.feature_dim == 0 {
            return 0;
        }
        self.data.len() / self.feature_dim
    }

    /// Returns true if the data forms whole frames
    pub fn is_well_formed(&self) -> bool {
        self.feature_dim > 0 && self.data.len() % self.feature_dim == 0
    }

    /// Borrow a single frame
    pub fn frame(&self, t: usize) -> Option<&[f32]> {
        let start = t.checked_mul(self.feature_dim)?;
        self.data.get(start..start + self.feature_dim)
    }
}

/// Labels attached to an utterance at both granularities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptLabels {
    /// Vocabulary indices, used for train and dev
    Encoded {
        word: Vec<LabelIndex>,
        char: Vec<LabelIndex>,
    },

    /// Raw reference transcripts, used for test
    Transcript { word: String, char: String },
}

/// One utterance of the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtteranceRecord {
    /// Unique utterance identifier
    pub id: UtteranceId,

    /// Acoustic features after external extraction
    pub input: Features,

    /// Labels, absent when the loader could not supply them
    #[serde(default)]
    pub labels: Option<TranscriptLabels>,
}

impl UtteranceRecord {
    /// Create a record with encoded labels
    pub fn encoded(
        id: impl Into<UtteranceId>,
        input: Features,
        word: Vec<LabelIndex>,
        char: Vec<LabelIndex>,
    ) -> Self {
        Self {
            id: id.into(),
            input,
            labels: Some(TranscriptLabels::Encoded { word, char }),
        }
    }

    /// Create a record with raw reference transcripts
    pub fn transcript(
        id: impl Into<UtteranceId>,
        input: Features,
        word: impl Into<String>,
        char: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            input,
            labels: Some(TranscriptLabels::Transcript {
                word: word.into(),
                char: char.into(),
            }),
        }
    }

    /// Number of input time steps
    pub fn input_length(&self) -> usize {
        self.input.num_frames()
    }

    /// Length of the word label sequence (0 for transcripts)
    pub fn word_length(&self) -> usize {
        match &self.labels {
            Some(TranscriptLabels::Encoded { word, .. }) => word.len(),
            _ => 0,
        }
    }

    /// Length of the character label sequence (0 for transcripts)
    pub fn char_length(&self) -> usize {
        match &self.labels {
            Some(TranscriptLabels::Encoded { char, .. }) => char.len(),
            _ => 0,
        }
    }
}
