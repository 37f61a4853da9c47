//! Read-only utterance catalog
//!
//! Built once from loader-supplied records and validated against the data
//! split before any batch is produced.

use corpus_core::{DataSplit, Error, Result, TranscriptLabels, UtteranceRecord};
use std::collections::HashSet;
use std::sync::Arc;

/// Immutable index over the utterances of one corpus split
#[derive(Debug)]
pub struct CorpusIndex {
    /// Records in loader order
    records: Vec<UtteranceRecord>,

    /// Cached input lengths, parallel to `records`
    input_lengths: Vec<usize>,

    /// Split the records were validated for
    split: DataSplit,

    /// Width of every frame
    feature_dim: usize,
}

/// Shared handle to a corpus index
pub type CorpusHandle = Arc<CorpusIndex>;

impl CorpusIndex {
    /// Validate records for `split` and build the index
    pub fn load(records: Vec<UtteranceRecord>, split: DataSplit, feature_dim: usize) -> Result<Self> {
        if feature_dim == 0 {
            return Err(Error::config("feature_dim must be positive"));
        }

        if records.is_empty() {
            return Err(Error::corpus("<corpus>", "corpus contains no utterances"));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            check_record(record, split, feature_dim)?;
            if !seen.insert(record.id.as_str()) {
                return Err(Error::corpus(&record.id, "duplicate utterance id"));
            }
        }

        let input_lengths = records.iter().map(UtteranceRecord::input_length).collect();

        tracing::info!(
            split = %split,
            utterances = records.len(),
            feature_dim = feature_dim,
            "Loaded corpus index"
        );

        Ok(Self {
            records,
            input_lengths,
            split,
            feature_dim,
        })
    }

    /// Number of utterances
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Get a record by position
    pub fn get(&self, index: usize) -> Option<&UtteranceRecord> {
        self.records.get(index)
    }

    /// Input length of every record, in corpus order
    pub fn input_lengths(&self) -> &[usize] {
        &self.input_lengths
    }

    /// Split the corpus was loaded for
    pub fn split(&self) -> DataSplit {
        self.split
    }

    /// Width of a single frame
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }
}

fn check_record(record: &UtteranceRecord, split: DataSplit, feature_dim: usize) -> Result<()> {
    if record.id.is_empty() {
        return Err(Error::corpus("<empty>", "utterance id is empty"));
    }

    if record.input.feature_dim != feature_dim {
        return Err(Error::corpus(
            &record.id,
            format!(
                "feature_dim {} does not match corpus feature_dim {}",
                record.input.feature_dim, feature_dim
            ),
        ));
    }

    if !record.input.is_well_formed() {
        return Err(Error::corpus(
            &record.id,
            format!(
                "{} feature values do not form whole frames of width {}",
                record.input.data.len(),
                feature_dim
            ),
        ));
    }

    if record.input_length() == 0 {
        return Err(Error::corpus(&record.id, "input has no frames"));
    }

    match (&record.labels, split.is_test()) {
        (None, _) => Err(Error::corpus(&record.id, "labels are missing")),
        (Some(TranscriptLabels::Encoded { .. }), false) => Ok(()),
        (Some(TranscriptLabels::Transcript { .. }), true) => Ok(()),
        (Some(TranscriptLabels::Encoded { .. }), true) => Err(Error::corpus(
            &record.id,
            "test split requires raw transcripts",
        )),
        (Some(TranscriptLabels::Transcript { .. }), false) => Err(Error::corpus(
            &record.id,
            format!("{} split requires encoded labels", split),
        )),
    }
}
