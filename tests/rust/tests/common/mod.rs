//! Shared fixtures: a small hierarchical corpus built from transcripts

#![allow(dead_code)]

use anyhow::Result;
use corpus_core::{DataSplit, Features, UtteranceRecord};
use hier_batch::{CharDecoder, CorpusIndex, Vocabulary, WordDecoder};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const FEATURE_DIM: usize = 120;

pub const TRANSCRIPTS: &[&str] = &[
    "he hoped there would be stew for dinner",
    "turnips and carrots and bruised potatoes",
    "and fat mutton pieces to be ladled out in thick peppered flour fattened sauce",
    "stuff it into you his belly counselled him",
    "after early nightfall the yellow lamps would light up here and there",
    "hello bertie any good in your mind",
    "number ten fresh nelly is waiting on you good night husband",
    "the music came nearer and he recalled the words",
    "the dull light fell more faintly upon the page",
    "he had no idea",
    "it is",
    "what a pity",
    "she sang",
    "the twin brother did something she did not like",
    "yes",
    "and then the rain",
];

/// Word and character vocabularies covering every fixture transcript
pub struct Vocabularies {
    pub words: Arc<Vocabulary>,
    pub chars: Arc<Vocabulary>,
}

impl Vocabularies {
    pub fn new() -> Result<Self> {
        let words: BTreeSet<&str> = TRANSCRIPTS.iter().flat_map(|t| t.split_whitespace()).collect();
        let chars: BTreeSet<String> = TRANSCRIPTS
            .iter()
            .flat_map(|t| t.chars())
            .filter(|c| *c != ' ')
            .map(String::from)
            .collect();

        let words = Vocabulary::from_tokens(std::iter::once("<pad>").chain(words))?;
        let chars = Vocabulary::from_tokens(
            ["<pad>".to_string(), "_".to_string()].into_iter().chain(chars),
        )?;

        Ok(Self {
            words: Arc::new(words),
            chars: Arc::new(chars),
        })
    }

    pub fn word_decoder(&self) -> WordDecoder {
        WordDecoder::new(self.words.clone())
    }

    pub fn char_decoder(&self) -> CharDecoder {
        CharDecoder::with_space_symbol(self.chars.clone(), '_')
    }
}

/// Frames per utterance: long enough for every character label
pub fn frames_for(transcript: &str) -> usize {
    transcript.len() * 2 + 5
}

/// Features whose every value identifies the utterance
pub fn features(index: usize, frames: usize) -> Features {
    Features::new(vec![index as f32 + 1.0; frames * FEATURE_DIM], FEATURE_DIM)
}

/// Records for `split`, cycling through the fixture transcripts
pub fn records(split: DataSplit, count: usize, vocab: &Vocabularies) -> Result<Vec<UtteranceRecord>> {
    (0..count)
        .map(|i| {
            let text = TRANSCRIPTS[i % TRANSCRIPTS.len()];
            let id = format!("1272-{:06}-{:04}", 128104 + i / TRANSCRIPTS.len(), i);
            let input = features(i, frames_for(text) + i % 3);

            Ok(if split.is_test() {
                UtteranceRecord::transcript(id, input, text, text.replace(' ', "_"))
            } else {
                UtteranceRecord::encoded(
                    id,
                    input,
                    vocab.words.encode_words(text)?,
                    vocab.chars.encode_chars(text, '_')?,
                )
            })
        })
        .collect()
}

pub fn corpus(split: DataSplit, count: usize) -> Result<(Arc<CorpusIndex>, Vocabularies)> {
    let vocab = Vocabularies::new()?;
    let corpus = CorpusIndex::load(records(split, count, &vocab)?, split, FEATURE_DIM)?;
    Ok((Arc::new(corpus), vocab))
}

/// Record with `frames` input frames and `words` word labels
pub fn record_with_lengths(id: &str, frames: usize, words: usize) -> UtteranceRecord {
    UtteranceRecord::encoded(
        id,
        Features::zeros(frames, FEATURE_DIM),
        vec![1; words],
        vec![1; words.min(frames)],
    )
}
