//! Batch stream properties over a hierarchical corpus

mod common;

use anyhow::Result;
use common::{corpus, record_with_lengths, FEATURE_DIM, TRANSCRIPTS};
use corpus_core::{DataSplit, Epoch, Error, IteratorConfig, OrderingConfig};
use hier_batch::{Batch, BatchLabels, CorpusIndex, DatasetIterator, LabelDecoder};
use std::collections::HashSet;
use std::sync::Arc;

fn config(batch_size: usize, max_epoch: Epoch, ordering: OrderingConfig) -> IteratorConfig {
    IteratorConfig {
        batch_size,
        max_epoch: Some(max_epoch),
        ordering,
        ..Default::default()
    }
}

fn sorted(reverse: bool, sort_stop_epoch: Option<Epoch>) -> OrderingConfig {
    OrderingConfig {
        sort_by_length: true,
        reverse,
        sort_stop_epoch,
        ..Default::default()
    }
}

fn shuffled(seed: u64) -> OrderingConfig {
    OrderingConfig {
        sort_by_length: false,
        shuffle: true,
        seed,
        ..Default::default()
    }
}

fn run(corpus: Arc<CorpusIndex>, config: IteratorConfig) -> Result<Vec<Batch>> {
    Ok(DatasetIterator::new(corpus, config)?.collect::<corpus_core::Result<Vec<_>>>()?)
}

#[test]
fn test_every_utterance_once_per_epoch() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 37)?;

    let orderings = [
        sorted(false, None),
        sorted(true, None),
        sorted(false, Some(1)),
        shuffled(7),
        OrderingConfig {
            sort_by_length: false,
            shuffle: false,
            ..Default::default()
        },
    ];

    for ordering in orderings {
        for (batch_size, num_replicas) in [(1, 1), (4, 2), (6, 3), (37, 1), (64, 4)] {
            let cfg = IteratorConfig {
                num_replicas,
                ..config(batch_size, 3, ordering)
            };
            let batches = run(corpus.clone(), cfg)?;

            for epoch in 0..3 {
                let ids: Vec<&String> = batches
                    .iter()
                    .filter(|b| b.epoch == epoch)
                    .flat_map(|b| &b.utterance_ids)
                    .collect();
                let unique: HashSet<_> = ids.iter().collect();

                assert_eq!(ids.len(), 37, "{:?} bs={}", ordering, batch_size);
                assert_eq!(unique.len(), 37);
            }
        }
    }

    Ok(())
}

#[test]
fn test_progress_and_new_epoch_flags() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 23)?;
    let batches = run(corpus, config(5, 4, sorted(false, Some(2))))?;

    for epoch in 0..4 {
        let in_epoch: Vec<&Batch> = batches.iter().filter(|b| b.epoch == epoch).collect();

        let progress: Vec<u64> = in_epoch.iter().map(|b| b.epoch_progress.consumed).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]));

        let fractions: Vec<f64> = in_epoch.iter().map(|b| b.epoch_progress.fraction()).collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));

        let flagged: Vec<bool> = in_epoch.iter().map(|b| b.is_new_epoch).collect();
        assert_eq!(flagged.iter().filter(|f| **f).count(), 1);
        assert_eq!(flagged.last(), Some(&true));

        let last = in_epoch.last().unwrap();
        assert_eq!(last.epoch_progress.fraction(), (epoch + 1) as f64);
        assert_eq!(last.epoch_progress.within_epoch(), 0.0);
    }

    Ok(())
}

#[test]
fn test_sorted_epochs_are_monotonic() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 48)?;

    for reverse in [false, true] {
        let batches = run(corpus.clone(), config(8, 3, sorted(reverse, Some(2))))?;

        for epoch in 0..2 {
            let maxima: Vec<usize> = batches
                .iter()
                .filter(|b| b.epoch == epoch)
                .map(|b| *b.input_lengths.iter().max().unwrap())
                .collect();

            let monotonic = if reverse {
                maxima.windows(2).all(|w| w[0] >= w[1])
            } else {
                maxima.windows(2).all(|w| w[0] <= w[1])
            };
            assert!(monotonic, "epoch {} reverse={} maxima={:?}", epoch, reverse, maxima);
        }
    }

    Ok(())
}

#[test]
fn test_curriculum_switches_to_shuffle() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 40)?;
    let batches = run(corpus, config(40, 4, sorted(false, Some(2))))?;
    assert_eq!(batches.len(), 4);

    assert_eq!(batches[0].utterance_ids, batches[1].utterance_ids);
    assert_ne!(batches[1].utterance_ids, batches[2].utterance_ids);
    assert_ne!(batches[2].utterance_ids, batches[3].utterance_ids);

    let lengths = &batches[0].input_lengths;
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));

    Ok(())
}

#[test]
fn test_same_seed_reproduces_run() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 30)?;

    let a = run(corpus.clone(), config(7, 3, shuffled(1234)))?;
    let b = run(corpus.clone(), config(7, 3, shuffled(1234)))?;
    let c = run(corpus, config(7, 3, shuffled(4321)))?;

    assert_eq!(a, b);
    assert_ne!(a, c);
    Ok(())
}

#[test]
fn test_labels_decode_to_transcripts() -> Result<()> {
    let (corpus, vocab) = corpus(DataSplit::Train, TRANSCRIPTS.len() * 2)?;
    let word_decoder = vocab.word_decoder();
    let char_decoder = vocab.char_decoder();

    let batch = DatasetIterator::new(corpus.clone(), config(8, 1, shuffled(3)))?
        .next()
        .unwrap()?;

    let (word, char) = match &batch.labels {
        BatchLabels::Encoded { word, char } => (word, char),
        other => panic!("expected encoded labels, got {:?}", other),
    };

    for (row, id) in batch.utterance_ids.iter().enumerate() {
        let index: usize = id.rsplit('-').next().unwrap().parse()?;
        let expected = TRANSCRIPTS[index % TRANSCRIPTS.len()];

        assert_eq!(word_decoder.decode(word.row(row), word.lengths[row])?, expected);
        assert_eq!(char_decoder.decode(char.row(row), char.lengths[row])?, expected);
    }

    Ok(())
}

#[test]
fn test_ten_utterances_batch_of_four() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 10)?;
    let batches = run(corpus, config(4, 1, sorted(false, None)))?;

    let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
    assert_eq!(sizes, vec![4, 4, 2]);

    let flags: Vec<bool> = batches.iter().map(|b| b.is_new_epoch).collect();
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(batches[2].epoch_progress.consumed, 10);

    Ok(())
}

#[test]
fn test_two_replicas_of_two_rows() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 12)?;
    let cfg = IteratorConfig {
        num_replicas: 2,
        ..config(4, 2, shuffled(9))
    };

    for batch in run(corpus, cfg)? {
        assert_eq!(batch.num_replicas(), 2);
        for replica in batch.replica_views() {
            assert_eq!(replica.len(), 2);
            assert_eq!(replica.input_lengths().len(), 2);
            assert_eq!(replica.inputs().len(), 2 * batch.max_input_length() * FEATURE_DIM);
            assert_eq!(replica.encoded_labels().unwrap().word_lengths.len(), 2);
        }
    }

    Ok(())
}

#[test]
fn test_short_final_batch_front_loads_replicas() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 11)?;
    let cfg = IteratorConfig {
        num_replicas: 4,
        ..config(8, 1, sorted(false, None))
    };
    let batches = run(corpus, cfg)?;

    let last = batches.last().unwrap();
    assert_eq!(last.len(), 3);
    let sizes: Vec<usize> = last.replica_views().map(|r| r.len()).collect();
    assert_eq!(sizes, vec![1, 1, 1, 0]);

    Ok(())
}

#[test]
fn test_input_shorter_than_words_is_fatal() -> Result<()> {
    let records = vec![
        record_with_lengths("good-1", 20, 4),
        record_with_lengths("bad", 3, 5),
        record_with_lengths("good-2", 20, 4),
    ];
    let corpus = Arc::new(CorpusIndex::load(records, DataSplit::Train, FEATURE_DIM)?);
    let sequential = OrderingConfig {
        sort_by_length: false,
        ..Default::default()
    };

    let mut iter = DatasetIterator::new(corpus, config(4, 1, sequential))?;
    match iter.next() {
        Some(Err(Error::BatchAssembly { utterance_ids, .. })) => {
            assert_eq!(utterance_ids, vec!["bad".to_string()]);
        }
        other => panic!("expected batch assembly error, got {:?}", other.map(|r| r.is_ok())),
    }
    assert!(iter.next().is_none());

    Ok(())
}

#[test]
fn test_test_split_carries_transcripts() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Test, 9)?;
    let cfg = IteratorConfig {
        data_split: DataSplit::Test,
        ..config(4, 1, sorted(true, None))
    };

    let batches = run(corpus, cfg)?;
    assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), 9);

    for batch in &batches {
        assert!(batch.word_lengths().is_none());
        match &batch.labels {
            BatchLabels::Transcripts { word, char } => {
                assert_eq!(word.len(), batch.len());
                for (w, c) in word.iter().zip(char) {
                    assert!(TRANSCRIPTS.contains(&w.as_str()));
                    assert_eq!(c.replace('_', " "), *w);
                }
            }
            other => panic!("expected transcripts, got {:?}", other),
        }
    }

    Ok(())
}

#[test]
fn test_configuration_errors_surface_at_construction() -> Result<()> {
    let (corpus, _) = corpus(DataSplit::Train, 8)?;

    let bad = [
        IteratorConfig {
            batch_size: 0,
            ..Default::default()
        },
        IteratorConfig {
            batch_size: 6,
            num_replicas: 4,
            ..Default::default()
        },
        IteratorConfig {
            data_split: DataSplit::Dev,
            ..Default::default()
        },
    ];

    for cfg in bad {
        let err = DatasetIterator::new(corpus.clone(), cfg).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.is_fatal());
    }

    Ok(())
}
