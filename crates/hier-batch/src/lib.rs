//! Hierarchical batching for speech corpora
//!
//! This crate provides:
//! - **Corpus indexing** with load-time integrity checks per data split
//! - **Curriculum ordering**: length-sorted epochs followed by seeded shuffling
//! - **Epoch tracking** with exact fractional progress
//! - **Batch assembly** with per-field padding and replica splitting
//! - **Bounded prefetching** on a background producer thread
//!
//! # Example
//!
//! ```rust
//! use hier_batch::{CorpusIndex, DatasetIterator};
//! use corpus_core::{DataSplit, Features, IteratorConfig, UtteranceRecord};
//! use std::sync::Arc;
//!
//! let records = (0..10)
//!     .map(|i| {
//!         UtteranceRecord::encoded(
//!             format!("utt-{}", i),
//!             Features::zeros(20 + i, 40),
//!             vec![3, 1],     // word indices
//!             vec![5, 2, 7],  // character indices
//!         )
//!     })
//!     .collect();
//! let corpus = Arc::new(CorpusIndex::load(records, DataSplit::Train, 40).unwrap());
//!
//! let config = IteratorConfig {
//!     batch_size: 4,
//!     max_epoch: Some(1),
//!     ..Default::default()
//! };
//!
//! let sizes: Vec<usize> = DatasetIterator::new(corpus, config)
//!     .unwrap()
//!     .map(|batch| batch.unwrap().len())
//!     .collect();
//! assert_eq!(sizes, vec![4, 4, 2]);
//! ```

pub mod assembler;
pub mod batch;
mod corpus;
mod epoch;
mod iterator;
mod ordering;
pub mod prefetch;
pub mod vocab;

// Re-export main types
pub use assembler::{BatchAssembler, LabelMode};
pub use batch::{Batch, BatchLabels, BatchMeta, PaddedFeatures, PaddedLabels, ReplicaView};
pub use corpus::{CorpusHandle, CorpusIndex};
pub use epoch::{EpochAdvance, EpochProgress, EpochTracker};
pub use iterator::{DatasetIterator, IteratorState};
pub use ordering::{EpochOrdering, OrderingPolicy};
pub use prefetch::{BatchSource, Prefetcher};
pub use vocab::{CharDecoder, LabelDecoder, Vocabulary, WordDecoder};

// Re-export types from corpus-core for convenience
pub use corpus_core::{
    DataSplit, Epoch, Error, IteratorConfig, LabelGranularity, OrderingConfig, Result, Step,
    UtteranceId, UtteranceRecord,
};
