//! Iterator configuration types

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{DataSplit, Epoch, Error, LabelGranularity, Result};

/// Main iterator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IteratorConfig {
    /// Split the corpus was loaded for
    pub data_split: DataSplit,

    /// Primary (coarse) label granularity
    pub label_type: LabelGranularity,

    /// Secondary (fine) label granularity
    pub label_type_sub: LabelGranularity,

    /// Rows per batch
    pub batch_size: usize,

    /// Number of epochs to produce, unbounded if not set
    pub max_epoch: Option<Epoch>,

    /// Traversal order settings
    #[serde(flatten)]
    pub ordering: OrderingConfig,

    /// Number of compute replicas each batch is split across
    pub num_replicas: usize,

    /// Depth of the look-ahead queue, no prefetching if not set
    pub prefetch_depth: Option<usize>,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            data_split: DataSplit::Train,
            label_type: LabelGranularity::Word { min_freq: 5 },
            label_type_sub: LabelGranularity::Character,
            batch_size: 64,
            max_epoch: None,
            ordering: OrderingConfig::default(),
            num_replicas: 1,
            prefetch_depth: None,
        }
    }
}

impl IteratorConfig {
    /// Check the configuration for contradictions and out-of-range values
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be positive"));
        }

        if self.num_replicas == 0 {
            return Err(Error::config("num_replicas must be positive"));
        }

        if self.batch_size % self.num_replicas != 0 {
            return Err(Error::config(format!(
                "batch_size {} is not divisible by num_replicas {}",
                self.batch_size, self.num_replicas
            )));
        }

        if self.prefetch_depth == Some(0) {
            return Err(Error::config("prefetch_depth must be positive when set"));
        }

        if self.max_epoch == Some(0) {
            return Err(Error::config("max_epoch must be positive when set"));
        }

        if self.label_type == self.label_type_sub {
            return Err(Error::config(format!(
                "label_type and label_type_sub are both {}",
                self.label_type
            )));
        }

        if self.ordering.sort_by_length
            && self.ordering.shuffle
            && self.ordering.sort_stop_epoch.is_none()
        {
            warn!("shuffle ignored: sort_by_length without sort_stop_epoch sorts every epoch");
        }

        if !self.ordering.sort_by_length && self.ordering.sort_stop_epoch.is_some() {
            warn!("sort_stop_epoch ignored: sort_by_length is disabled");
        }

        Ok(())
    }

    /// Rows each replica receives from a full batch
    pub fn rows_per_replica(&self) -> usize {
        self.batch_size / self.num_replicas.max(1)
    }
}

/// Traversal order configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrderingConfig {
    /// Shuffle utterances when not length-sorted
    pub shuffle: bool,

    /// Sort utterances by input length
    pub sort_by_length: bool,

    /// Sort in descending order of input length
    pub reverse: bool,

    /// First epoch that is shuffled instead of sorted, sort forever if not set
    pub sort_stop_epoch: Option<Epoch>,

    /// Base seed for per-epoch shuffling
    pub seed: u64,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            sort_by_length: true,
            reverse: false,
            sort_stop_epoch: None,
            seed: 42,
        }
    }
}
