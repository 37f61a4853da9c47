//! Corpus Core - Shared foundation for hierarchical speech batching
//!
//! Provides utterance types, error handling, and the iterator
//! configuration surface used by the batching crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{IteratorConfig, OrderingConfig};
pub use error::{Error, Result};
pub use types::*;
