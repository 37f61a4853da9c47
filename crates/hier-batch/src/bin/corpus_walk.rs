//! Corpus walker entry point
//!
//! Loads a JSON corpus manifest, iterates it with the given configuration,
//! and logs a summary of every batch.
//!
//! Usage: `corpus-walk <manifest.json> [config.json] [--stop-at <epoch-progress>]`

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hier_batch::{
    Batch, BatchLabels, BatchSource, CharDecoder, CorpusIndex, DataSplit, DatasetIterator,
    IteratorConfig, LabelDecoder, UtteranceRecord, Vocabulary, WordDecoder,
};

/// Corpus metadata as written by an external loader
#[derive(Debug, Deserialize)]
struct CorpusManifest {
    split: DataSplit,
    feature_dim: usize,
    utterances: Vec<UtteranceRecord>,

    #[serde(default)]
    word_vocab: Option<Vec<String>>,

    #[serde(default)]
    char_vocab: Option<Vec<String>>,
}

struct Args {
    manifest: PathBuf,
    config: Option<PathBuf>,
    stop_at: Option<f64>,
}

fn parse_args() -> Result<Args, String> {
    let mut manifest = None;
    let mut config = None;
    let mut stop_at = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--stop-at" {
            let value = args.next().ok_or("--stop-at needs a value")?;
            stop_at = Some(value.parse().map_err(|_| format!("invalid --stop-at: {}", value))?);
        } else if manifest.is_none() {
            manifest = Some(PathBuf::from(arg));
        } else if config.is_none() {
            config = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument: {}", arg));
        }
    }

    Ok(Args {
        manifest: manifest.ok_or("usage: corpus-walk <manifest.json> [config.json] [--stop-at <p>]")?,
        config,
        stop_at,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> hier_batch::Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn decoders(
    manifest: &CorpusManifest,
) -> hier_batch::Result<Option<(WordDecoder, CharDecoder)>> {
    match (&manifest.word_vocab, &manifest.char_vocab) {
        (Some(words), Some(chars)) => {
            let words = Arc::new(Vocabulary::from_tokens(words.iter().cloned())?);
            let chars = Arc::new(Vocabulary::from_tokens(chars.iter().cloned())?);
            Ok(Some((
                WordDecoder::new(words),
                CharDecoder::with_space_symbol(chars, '_'),
            )))
        }
        _ => Ok(None),
    }
}

/// Reference text of the first row at both granularities
fn first_row_text(
    batch: &Batch,
    decoders: Option<&(WordDecoder, CharDecoder)>,
) -> hier_batch::Result<Option<(String, String)>> {
    match (&batch.labels, decoders) {
        (BatchLabels::Transcripts { word, char }, _) => {
            Ok(word.first().cloned().zip(char.first().cloned()))
        }
        (BatchLabels::Encoded { word, char }, Some((word_decoder, char_decoder))) => {
            let word_text = word_decoder.decode(word.row(0), word.lengths[0])?;
            let char_text = char_decoder.decode(char.row(0), char.lengths[0])?;
            Ok(Some((word_text, char_text)))
        }
        (BatchLabels::Encoded { .. }, None) => Ok(None),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpus_walk=info,hier_batch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;

    let manifest: CorpusManifest = read_json(&args.manifest)?;
    let config = match &args.config {
        Some(path) => read_json(path)?,
        None => IteratorConfig {
            data_split: manifest.split,
            max_epoch: Some(1),
            ..Default::default()
        },
    };

    let decoders = decoders(&manifest)?;
    let corpus = CorpusIndex::load(manifest.utterances, manifest.split, manifest.feature_dim)?;
    let iter = DatasetIterator::new(Arc::new(corpus), config)?;

    for batch in BatchSource::from_iterator(iter)? {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }

        let progress = batch.epoch_progress.fraction();
        tracing::info!(
            step = batch.step,
            utterance = %batch.utterance_ids[0],
            epoch = %format!("{:.3}", progress),
            rows = batch.len(),
            input_length = batch.input_lengths[0],
            word_length = ?batch.word_lengths().map(|l| l[0]),
            char_length = ?batch.char_lengths().map(|l| l[0]),
            new_epoch = batch.is_new_epoch,
            "Batch"
        );

        if let Some((word, char)) = first_row_text(&batch, decoders.as_ref())? {
            tracing::info!(word = %word, char = %char, "Reference");
        }

        if args.stop_at.is_some_and(|stop| progress >= stop) {
            tracing::info!(progress = progress, "Stop threshold reached");
            break;
        }
    }

    Ok(())
}
