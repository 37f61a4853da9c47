//! Dataset iterator
//!
//! Drives ordering, epoch tracking, and assembly to produce the batch
//! stream for one corpus split.

use corpus_core::{Epoch, Error, IteratorConfig, Result, Step};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assembler::{BatchAssembler, LabelMode};
use crate::batch::{Batch, BatchMeta};
use crate::{CorpusIndex, EpochOrdering, EpochProgress, EpochTracker, OrderingPolicy};

/// Synchronous, resumable producer of batches
#[derive(Debug)]
pub struct DatasetIterator {
    /// Utterance catalog
    corpus: Arc<CorpusIndex>,

    /// Validated configuration
    config: IteratorConfig,

    /// Per-epoch permutations
    ordering: EpochOrdering,

    /// Position and epoch bookkeeping
    tracker: EpochTracker,

    /// Gathers, pads, and splits rows
    assembler: BatchAssembler,

    /// Permutation for the current epoch, computed on first use
    order: Option<(Epoch, Arc<Vec<usize>>)>,

    /// Batches produced so far
    step: Step,

    /// Set once an error has been returned
    failed: bool,
}

/// Serializable resume point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IteratorState {
    /// Utterances consumed since the start of the run
    pub consumed: u64,

    /// Batches produced so far
    pub step: Step,

    /// Corpus size the state was taken against
    pub corpus_size: u64,

    /// Shuffle seed the state was taken with
    pub seed: u64,
}

impl DatasetIterator {
    /// Create an iterator at the start of epoch 0
    pub fn new(corpus: Arc<CorpusIndex>, config: IteratorConfig) -> Result<Self> {
        config.validate()?;

        if config.data_split != corpus.split() {
            return Err(Error::config(format!(
                "config is for the {} split but the corpus was loaded for {}",
                config.data_split,
                corpus.split()
            )));
        }

        let assembler =
            BatchAssembler::new(LabelMode::for_split(config.data_split), config.num_replicas)?;

        tracing::info!(
            split = %config.data_split,
            label_type = %config.label_type,
            label_type_sub = %config.label_type_sub,
            utterances = corpus.size(),
            batch_size = config.batch_size,
            num_replicas = config.num_replicas,
            rows_per_replica = config.rows_per_replica(),
            max_epoch = ?config.max_epoch,
            "Created dataset iterator"
        );

        Ok(Self {
            ordering: EpochOrdering::new(config.ordering),
            tracker: EpochTracker::new(corpus.size()),
            corpus,
            config,
            assembler,
            order: None,
            step: 0,
            failed: false,
        })
    }

    /// Create an iterator continuing from a saved state
    pub fn resume(corpus: Arc<CorpusIndex>, config: IteratorConfig, state: IteratorState) -> Result<Self> {
        if state.corpus_size != corpus.size() as u64 {
            return Err(Error::config(format!(
                "state was saved for {} utterances, corpus has {}",
                state.corpus_size,
                corpus.size()
            )));
        }

        if state.seed != config.ordering.seed {
            return Err(Error::config(format!(
                "state was saved with seed {}, config has seed {}",
                state.seed, config.ordering.seed
            )));
        }

        // The current epoch must be able to complete without overflow
        if state.consumed.checked_add(state.corpus_size).is_none() {
            return Err(Error::config(format!(
                "state position {} is out of range",
                state.consumed
            )));
        }

        // Every batch holds at least one utterance
        if state.step > state.consumed {
            return Err(Error::config(format!(
                "state has {} steps but only {} utterances consumed",
                state.step, state.consumed
            )));
        }

        let mut iter = Self::new(corpus, config)?;
        iter.tracker.restore(state.consumed);
        iter.step = state.step;

        tracing::info!(
            consumed = state.consumed,
            step = state.step,
            epoch = iter.epoch(),
            "Resumed dataset iterator"
        );

        Ok(iter)
    }

    /// Snapshot the current position
    pub fn state(&self) -> IteratorState {
        IteratorState {
            consumed: self.tracker.consumed(),
            step: self.step,
            corpus_size: self.tracker.corpus_size() as u64,
            seed: self.ordering.seed(),
        }
    }

    /// Restart from the beginning of epoch 0
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.order = None;
        self.step = 0;
        self.failed = false;
    }

    /// Current epoch
    pub fn epoch(&self) -> Epoch {
        self.tracker.epoch()
    }

    /// Progress so far
    pub fn epoch_progress(&self) -> EpochProgress {
        self.tracker.progress()
    }

    /// Ordering policy for the current epoch
    pub fn policy(&self) -> OrderingPolicy {
        self.ordering.policy(self.epoch())
    }

    /// The corpus being iterated
    pub fn corpus(&self) -> &Arc<CorpusIndex> {
        &self.corpus
    }

    /// Active configuration
    pub fn config(&self) -> &IteratorConfig {
        &self.config
    }

    /// Returns true once `max_epoch` epochs have been produced
    pub fn is_finished(&self) -> bool {
        self.config
            .max_epoch
            .is_some_and(|max_epoch| self.tracker.epoch() >= max_epoch)
    }

    /// Produce the next batch, `None` once the run is complete
    ///
    /// After an error the iterator yields nothing until `reset`.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.failed || self.is_finished() {
            return Ok(None);
        }

        let epoch = self.tracker.epoch();
        let order = self.epoch_order(epoch);

        let start = self.tracker.position();
        let rows = self.config.batch_size.min(self.tracker.remaining_in_epoch());
        let advance = self.tracker.preview(rows);

        let meta = BatchMeta {
            step: self.step,
            epoch,
            epoch_progress: advance.progress,
            is_new_epoch: advance.is_new_epoch,
        };

        let batch = match self
            .assembler
            .assemble(&order[start..start + rows], &self.corpus, meta)
        {
            Ok(batch) => batch,
            Err(e) => {
                self.failed = true;
                tracing::error!(step = self.step, epoch = epoch, error = %e, "Batch assembly failed");
                return Err(e);
            }
        };

        self.tracker.advance(rows);
        self.step += 1;

        Ok(Some(batch))
    }

    fn epoch_order(&mut self, epoch: Epoch) -> Arc<Vec<usize>> {
        if let Some((cached_epoch, order)) = &self.order {
            if *cached_epoch == epoch {
                return order.clone();
            }
        }

        if epoch > 0 {
            self.ordering.release_before(epoch);
        }

        let order = self.ordering.order(epoch, &self.corpus);
        tracing::info!(
            epoch = epoch,
            policy = ?self.ordering.policy(epoch),
            "Starting epoch"
        );

        self.order = Some((epoch, order.clone()));
        order
    }
}

impl Iterator for DatasetIterator {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
