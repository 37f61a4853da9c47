//! Epoch progress tracking
//!
//! Progress is an exact `(consumed, corpus_size)` counter pair; fractions
//! are derived on demand so long runs never accumulate rounding drift.

use corpus_core::Epoch;
use serde::{Deserialize, Serialize};

/// Exact progress through the corpus
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpochProgress {
    /// Utterances consumed since the start of the run
    pub consumed: u64,

    /// Utterances per epoch
    pub corpus_size: u64,
}

impl EpochProgress {
    /// Completed epochs
    pub fn epoch(&self) -> Epoch {
        self.consumed / self.corpus_size
    }

    /// Cumulative progress, 1.0 after one full epoch
    pub fn fraction(&self) -> f64 {
        self.consumed as f64 / self.corpus_size as f64
    }

    /// Progress within the current epoch, wrapped to `[0, 1)`
    pub fn within_epoch(&self) -> f64 {
        (self.consumed % self.corpus_size) as f64 / self.corpus_size as f64
    }
}

/// Result of advancing the tracker by one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochAdvance {
    /// Epoch before the batch was consumed
    pub epoch_before: Epoch,

    /// Epoch after the batch was consumed
    pub epoch_after: Epoch,

    /// Whether the batch crossed an epoch boundary
    pub is_new_epoch: bool,

    /// Progress including the batch
    pub progress: EpochProgress,
}

/// Tracks position and epoch as utterances are consumed
///
/// States are `(epoch k, position p)` with `p < corpus_size`. Each batch
/// advances `p` by its actual row count; reaching `corpus_size` wraps `p`
/// and increments `k`.
#[derive(Debug, Clone)]
pub struct EpochTracker {
    corpus_size: u64,
    consumed: u64,
}

impl EpochTracker {
    /// Create a tracker at the start of epoch 0
    ///
    /// # Panics
    /// Panics if `corpus_size` is zero; corpus loading rejects empty corpora.
    pub fn new(corpus_size: usize) -> Self {
        assert!(corpus_size > 0, "corpus_size must be positive");
        Self {
            corpus_size: corpus_size as u64,
            consumed: 0,
        }
    }

    /// Current epoch
    pub fn epoch(&self) -> Epoch {
        self.consumed / self.corpus_size
    }

    /// Position within the current epoch
    pub fn position(&self) -> usize {
        (self.consumed % self.corpus_size) as usize
    }

    /// Utterances consumed since the start of the run
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Utterances per epoch
    pub fn corpus_size(&self) -> usize {
        self.corpus_size as usize
    }

    /// Rows left before the next epoch boundary
    pub fn remaining_in_epoch(&self) -> usize {
        self.corpus_size() - self.position()
    }

    /// Returns true if the next batch starts a new traversal
    pub fn at_epoch_start(&self) -> bool {
        self.position() == 0
    }

    /// Exact progress
    pub fn progress(&self) -> EpochProgress {
        EpochProgress {
            consumed: self.consumed,
            corpus_size: self.corpus_size,
        }
    }

    /// Outcome of consuming `rows` utterances, without consuming them
    pub fn preview(&self, rows: usize) -> EpochAdvance {
        let progress = EpochProgress {
            consumed: self.consumed + rows as u64,
            corpus_size: self.corpus_size,
        };
        let epoch_before = self.epoch();
        let epoch_after = progress.epoch();

        EpochAdvance {
            epoch_before,
            epoch_after,
            is_new_epoch: epoch_after > epoch_before,
            progress,
        }
    }

    /// Consume `rows` utterances
    pub fn advance(&mut self, rows: usize) -> EpochAdvance {
        let advance = self.preview(rows);
        self.consumed = advance.progress.consumed;

        if advance.is_new_epoch {
            tracing::info!(
                epoch = advance.epoch_after,
                consumed = self.consumed,
                "Epoch boundary crossed"
            );
        }

        advance
    }

    /// Jump to an absolute consumed count
    pub fn restore(&mut self, consumed: u64) {
        self.consumed = consumed;
    }

    /// Return to the start of epoch 0
    pub fn reset(&mut self) {
        self.consumed = 0;
    }
}
