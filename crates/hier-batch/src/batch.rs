//! Padded batch types handed to the training loop

use corpus_core::{Epoch, LabelIndex, Step, UtteranceId};
use std::ops::Range;

use crate::EpochProgress;

/// Input features padded to the longest row, row-major `[rows, max_frames, feature_dim]`
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedFeatures {
    pub data: Vec<f32>,
    pub rows: usize,
    pub max_frames: usize,
    pub feature_dim: usize,
}

impl PaddedFeatures {
    /// Values making up one row, padding included
    pub fn row(&self, i: usize) -> &[f32] {
        self.rows_slice(i..i + 1)
    }

    /// Values making up a contiguous range of rows
    pub fn rows_slice(&self, rows: Range<usize>) -> &[f32] {
        let stride = self.max_frames * self.feature_dim;
        &self.data[rows.start * stride..rows.end * stride]
    }
}

/// Label indices padded to the longest row, row-major `[rows, max_length]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedLabels {
    pub data: Vec<LabelIndex>,
    pub max_length: usize,
    pub lengths: Vec<usize>,
}

impl PaddedLabels {
    /// Number of rows
    pub fn rows(&self) -> usize {
        self.lengths.len()
    }

    /// One row, padding included
    pub fn row(&self, i: usize) -> &[LabelIndex] {
        self.rows_slice(i..i + 1)
    }

    /// Contiguous range of rows, padding included
    pub fn rows_slice(&self, rows: Range<usize>) -> &[LabelIndex] {
        &self.data[rows.start * self.max_length..rows.end * self.max_length]
    }

    /// One row without padding
    pub fn labels(&self, i: usize) -> &[LabelIndex] {
        &self.row(i)[..self.lengths[i]]
    }
}

/// Labels of a batch at both granularities
#[derive(Debug, Clone, PartialEq)]
pub enum BatchLabels {
    /// Padded vocabulary indices (train, dev)
    Encoded {
        word: PaddedLabels,
        char: PaddedLabels,
    },

    /// Raw reference transcripts, one per row (test)
    Transcripts { word: Vec<String>, char: Vec<String> },
}

/// Position of a batch within the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMeta {
    /// Zero-based global step
    pub step: Step,

    /// Epoch the rows were drawn from
    pub epoch: Epoch,

    /// Progress including this batch
    pub epoch_progress: EpochProgress,

    /// Whether this batch completes an epoch
    pub is_new_epoch: bool,
}

/// One mini-batch
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub utterance_ids: Vec<UtteranceId>,
    pub inputs: PaddedFeatures,
    pub input_lengths: Vec<usize>,
    pub labels: BatchLabels,

    /// Contiguous row ranges, one per replica
    pub replicas: Vec<Range<usize>>,

    pub step: Step,
    pub epoch: Epoch,
    pub epoch_progress: EpochProgress,
    pub is_new_epoch: bool,
}

impl Batch {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.utterance_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterance_ids.is_empty()
    }

    /// Longest input in the batch
    pub fn max_input_length(&self) -> usize {
        self.inputs.max_frames
    }

    /// Per-row word label lengths, absent for transcripts
    pub fn word_lengths(&self) -> Option<&[usize]> {
        match &self.labels {
            BatchLabels::Encoded { word, .. } => Some(&word.lengths),
            BatchLabels::Transcripts { .. } => None,
        }
    }

    /// Per-row character label lengths, absent for transcripts
    pub fn char_lengths(&self) -> Option<&[usize]> {
        match &self.labels {
            BatchLabels::Encoded { char, .. } => Some(&char.lengths),
            BatchLabels::Transcripts { .. } => None,
        }
    }

    /// Number of replicas the batch is split across
    pub fn num_replicas(&self) -> usize {
        self.replicas.len()
    }

    /// Borrow the rows assigned to replica `index`
    pub fn replica(&self, index: usize) -> Option<ReplicaView<'_>> {
        let rows = self.replicas.get(index)?.clone();
        Some(ReplicaView { batch: self, rows })
    }

    /// Borrow every replica's rows in order
    pub fn replica_views(&self) -> impl Iterator<Item = ReplicaView<'_>> {
        (0..self.replicas.len()).filter_map(move |i| self.replica(i))
    }
}

/// Rows of a batch assigned to one replica
///
/// Shares the batch-wide padding so every replica sees the same row shape.
#[derive(Debug, Clone)]
pub struct ReplicaView<'a> {
    batch: &'a Batch,
    rows: Range<usize>,
}

impl<'a> ReplicaView<'a> {
    /// Row range within the batch
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn utterance_ids(&self) -> &'a [UtteranceId] {
        &self.batch.utterance_ids[self.rows.clone()]
    }

    pub fn inputs(&self) -> &'a [f32] {
        self.batch.inputs.rows_slice(self.rows.clone())
    }

    pub fn input_lengths(&self) -> &'a [usize] {
        &self.batch.input_lengths[self.rows.clone()]
    }

    /// Padded word and character labels with their lengths
    pub fn encoded_labels(&self) -> Option<ReplicaLabels<'a>> {
        match &self.batch.labels {
            BatchLabels::Encoded { word, char } => Some(ReplicaLabels {
                word: word.rows_slice(self.rows.clone()),
                word_lengths: &word.lengths[self.rows.clone()],
                char: char.rows_slice(self.rows.clone()),
                char_lengths: &char.lengths[self.rows.clone()],
            }),
            BatchLabels::Transcripts { .. } => None,
        }
    }

    /// Word and character transcripts
    pub fn transcripts(&self) -> Option<(&'a [String], &'a [String])> {
        match &self.batch.labels {
            BatchLabels::Transcripts { word, char } => {
                Some((&word[self.rows.clone()], &char[self.rows.clone()]))
            }
            BatchLabels::Encoded { .. } => None,
        }
    }
}

/// Label slices for one replica
#[derive(Debug, Clone, Copy)]
pub struct ReplicaLabels<'a> {
    pub word: &'a [LabelIndex],
    pub word_lengths: &'a [usize],
    pub char: &'a [LabelIndex],
    pub char_lengths: &'a [usize],
}
