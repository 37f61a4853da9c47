//! Error types for corpus loading and batch iteration

use thiserror::Error;

/// Result type alias using the corpus Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for corpus loading and batch iteration
#[derive(Error, Debug)]
pub enum Error {
    // Corpus errors
    #[error("Corpus integrity error: {utterance_id} - {reason}")]
    CorpusIntegrity { utterance_id: String, reason: String },

    // Batch errors
    #[error("Batch assembly failed for {utterance_ids:?}: {reason}")]
    BatchAssembly {
        utterance_ids: Vec<String>,
        reason: String,
    },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // Channel errors
    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for a corpus integrity error
    pub fn corpus(utterance_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorpusIntegrity {
            utterance_id: utterance_id.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates bad input data rather than bad setup
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::CorpusIntegrity { .. } | Error::BatchAssembly { .. }
        )
    }

    /// Returns true if this error indicates a fatal condition
    ///
    /// Nothing produced by the iterator is transient, so there is no
    /// retryable counterpart.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorpusIntegrity { .. }
                | Error::BatchAssembly { .. }
                | Error::InvalidConfig { .. }
        )
    }

    /// Utterance ids implicated in a data error
    pub fn utterance_ids(&self) -> Vec<&str> {
        match self {
            Error::CorpusIntegrity { utterance_id, .. } => vec![utterance_id.as_str()],
            Error::BatchAssembly { utterance_ids, .. } => {
                utterance_ids.iter().map(String::as_str).collect()
            }
            _ => vec![],
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
