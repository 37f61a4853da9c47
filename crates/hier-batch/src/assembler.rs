//! Batch assembly: gather, pad, and split rows across replicas

use corpus_core::{DataSplit, Error, LabelIndex, Result, TranscriptLabels, UtteranceRecord};
use std::ops::Range;

use crate::batch::{Batch, BatchLabels, BatchMeta, PaddedFeatures, PaddedLabels};
use crate::CorpusIndex;

/// Value written into padded feature frames
pub const FEATURE_PAD: f32 = 0.0;

/// Value written into padded label positions; consumers must rely on lengths
pub const LABEL_PAD: LabelIndex = 0;

/// How a split's labels are collated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// Padded index matrices; `enforce_lengths` rejects inputs shorter than labels
    Indexed { enforce_lengths: bool },

    /// Raw transcripts carried through unpadded
    Transcripts,
}

impl LabelMode {
    /// Mode used for a data split
    pub fn for_split(split: DataSplit) -> Self {
        if split.is_test() {
            LabelMode::Transcripts
        } else {
            LabelMode::Indexed {
                enforce_lengths: split.is_training(),
            }
        }
    }

    fn collate(&self, records: &[&UtteranceRecord]) -> Result<BatchLabels> {
        match self {
            LabelMode::Indexed { enforce_lengths } => {
                if *enforce_lengths {
                    check_label_lengths(records)?;
                }

                let mut words = Vec::with_capacity(records.len());
                let mut chars = Vec::with_capacity(records.len());
                for record in records {
                    match &record.labels {
                        Some(TranscriptLabels::Encoded { word, char }) => {
                            words.push(word.as_slice());
                            chars.push(char.as_slice());
                        }
                        _ => return Err(label_kind_error(record, "encoded labels")),
                    }
                }

                Ok(BatchLabels::Encoded {
                    word: pad_labels(&words),
                    char: pad_labels(&chars),
                })
            }
            LabelMode::Transcripts => {
                let mut words = Vec::with_capacity(records.len());
                let mut chars = Vec::with_capacity(records.len());
                for record in records {
                    match &record.labels {
                        Some(TranscriptLabels::Transcript { word, char }) => {
                            words.push(word.clone());
                            chars.push(char.clone());
                        }
                        _ => return Err(label_kind_error(record, "raw transcripts")),
                    }
                }

                Ok(BatchLabels::Transcripts {
                    word: words,
                    char: chars,
                })
            }
        }
    }
}

/// Builds padded batches from slices of an epoch ordering
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    mode: LabelMode,
    num_replicas: usize,
}

impl BatchAssembler {
    /// Create an assembler splitting every batch across `num_replicas`
    pub fn new(mode: LabelMode, num_replicas: usize) -> Result<Self> {
        if num_replicas == 0 {
            return Err(Error::config("num_replicas must be positive"));
        }
        Ok(Self { mode, num_replicas })
    }

    /// Gather the utterances at `indices` into one padded batch
    pub fn assemble(&self, indices: &[usize], corpus: &CorpusIndex, meta: BatchMeta) -> Result<Batch> {
        let records = indices
            .iter()
            .map(|&i| {
                corpus.get(i).ok_or_else(|| Error::BatchAssembly {
                    utterance_ids: vec![],
                    reason: format!("index {} outside corpus of {}", i, corpus.size()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let labels = self.mode.collate(&records)?;
        let input_lengths: Vec<usize> = records.iter().map(|r| r.input_length()).collect();
        let inputs = pad_features(&records, corpus.feature_dim());

        tracing::debug!(
            step = meta.step,
            rows = records.len(),
            max_frames = inputs.max_frames,
            "Assembled batch"
        );

        Ok(Batch {
            utterance_ids: records.iter().map(|r| r.id.clone()).collect(),
            inputs,
            input_lengths,
            labels,
            replicas: replica_ranges(records.len(), self.num_replicas),
            step: meta.step,
            epoch: meta.epoch,
            epoch_progress: meta.epoch_progress,
            is_new_epoch: meta.is_new_epoch,
        })
    }
}

/// Split `rows` into `num_replicas` contiguous ranges
///
/// Every replica receives `rows / n` rows and the first `rows % n`
/// replicas receive one more.
pub fn replica_ranges(rows: usize, num_replicas: usize) -> Vec<Range<usize>> {
    let base = rows / num_replicas;
    let extra = rows % num_replicas;

    let mut start = 0;
    (0..num_replicas)
        .map(|replica| {
            let len = base + usize::from(replica < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

fn check_label_lengths(records: &[&UtteranceRecord]) -> Result<()> {
    let offending: Vec<String> = records
        .iter()
        .filter(|r| r.input_length() < r.word_length() || r.input_length() < r.char_length())
        .map(|r| r.id.clone())
        .collect();

    if offending.is_empty() {
        return Ok(());
    }

    tracing::error!(utterances = ?offending, "Input shorter than label sequence");
    Err(Error::BatchAssembly {
        utterance_ids: offending,
        reason: "input length must not be shorter than label length".to_string(),
    })
}

fn label_kind_error(record: &UtteranceRecord, expected: &str) -> Error {
    Error::BatchAssembly {
        utterance_ids: vec![record.id.clone()],
        reason: format!("expected {}", expected),
    }
}

fn pad_features(records: &[&UtteranceRecord], feature_dim: usize) -> PaddedFeatures {
    let max_frames = records.iter().map(|r| r.input_length()).max().unwrap_or(0);
    let stride = max_frames * feature_dim;

    let mut data = vec![FEATURE_PAD; records.len() * stride];
    for (row, record) in data.chunks_mut(stride.max(1)).zip(records) {
        let values = &record.input.data;
        row[..values.len()].copy_from_slice(values);
    }

    PaddedFeatures {
        data,
        rows: records.len(),
        max_frames,
        feature_dim,
    }
}

fn pad_labels(sequences: &[&[LabelIndex]]) -> PaddedLabels {
    let max_length = sequences.iter().map(|s| s.len()).max().unwrap_or(0);

    let mut data = vec![LABEL_PAD; sequences.len() * max_length];
    if max_length > 0 {
        for (row, seq) in data.chunks_mut(max_length).zip(sequences) {
            row[..seq.len()].copy_from_slice(seq);
        }
    }

    PaddedLabels {
        data,
        max_length,
        lengths: sequences.iter().map(|s| s.len()).collect(),
    }
}
