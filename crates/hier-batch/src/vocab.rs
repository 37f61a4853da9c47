//! Index ↔ text conversion for word and character labels
//!
//! Vocabulary files are read elsewhere; this module only maps between
//! tokens and indices once the token list is known.

use corpus_core::{Error, LabelIndex, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered token list with reverse lookup
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, LabelIndex>,
    unknown: Option<LabelIndex>,
}

impl Vocabulary {
    /// Build a vocabulary where the i-th token has index i
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(tokens.len());

        for (i, token) in tokens.iter().enumerate() {
            if index.insert(token.clone(), i as LabelIndex).is_some() {
                return Err(Error::config(format!("duplicate vocabulary token: {}", token)));
            }
        }

        Ok(Self {
            tokens,
            index,
            unknown: None,
        })
    }

    /// Map out-of-vocabulary words to `token`, which must be in the vocabulary
    pub fn with_unknown(mut self, token: &str) -> Result<Self> {
        let idx = self
            .index(token)
            .ok_or_else(|| Error::config(format!("unknown token {} not in vocabulary", token)))?;
        self.unknown = Some(idx);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token for an index
    pub fn token(&self, idx: LabelIndex) -> Option<&str> {
        self.tokens.get(idx as usize).map(String::as_str)
    }

    /// Index for a token
    pub fn index(&self, token: &str) -> Option<LabelIndex> {
        self.index.get(token).copied()
    }

    /// Encode whitespace-separated words
    pub fn encode_words(&self, text: &str) -> Result<Vec<LabelIndex>> {
        text.split_whitespace().map(|word| self.lookup(word)).collect()
    }

    /// Encode characters, writing spaces as `space_mark`
    pub fn encode_chars(&self, text: &str, space_mark: char) -> Result<Vec<LabelIndex>> {
        let mut buf = [0u8; 4];
        text.chars()
            .map(|c| {
                let c = if c == ' ' { space_mark } else { c };
                self.lookup(c.encode_utf8(&mut buf))
            })
            .collect()
    }

    fn lookup(&self, token: &str) -> Result<LabelIndex> {
        self.index(token).or(self.unknown).ok_or_else(|| {
            Error::corpus("<transcript>", format!("token {:?} not in vocabulary", token))
        })
    }

    fn resolve(&self, idx: LabelIndex) -> Result<&str> {
        self.token(idx).ok_or_else(|| {
            Error::corpus(
                "<labels>",
                format!("label index {} outside vocabulary of {}", idx, self.len()),
            )
        })
    }
}

/// Converts a label index sequence back to text
pub trait LabelDecoder: Send + Sync {
    /// Decode the first `max_len` indices
    fn decode(&self, indices: &[LabelIndex], max_len: usize) -> Result<String>;
}

/// Decodes word indices, joining words with a space mark
#[derive(Debug, Clone)]
pub struct WordDecoder {
    vocab: Arc<Vocabulary>,
    space_mark: String,
}

impl WordDecoder {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self::with_space_mark(vocab, " ")
    }

    pub fn with_space_mark(vocab: Arc<Vocabulary>, space_mark: impl Into<String>) -> Self {
        Self {
            vocab,
            space_mark: space_mark.into(),
        }
    }
}

impl LabelDecoder for WordDecoder {
    fn decode(&self, indices: &[LabelIndex], max_len: usize) -> Result<String> {
        let words = indices[..max_len.min(indices.len())]
            .iter()
            .map(|&idx| self.vocab.resolve(idx))
            .collect::<Result<Vec<_>>>()?;
        Ok(words.join(&self.space_mark))
    }
}

/// Decodes character indices, turning the space symbol back into ' '
#[derive(Debug, Clone)]
pub struct CharDecoder {
    vocab: Arc<Vocabulary>,
    space_symbol: Option<String>,
}

impl CharDecoder {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self {
            vocab,
            space_symbol: None,
        }
    }

    pub fn with_space_symbol(vocab: Arc<Vocabulary>, space_symbol: char) -> Self {
        Self {
            vocab,
            space_symbol: Some(space_symbol.to_string()),
        }
    }
}

impl LabelDecoder for CharDecoder {
    fn decode(&self, indices: &[LabelIndex], max_len: usize) -> Result<String> {
        let mut text = String::with_capacity(max_len);
        for &idx in &indices[..max_len.min(indices.len())] {
            let token = self.vocab.resolve(idx)?;
            if self.space_symbol.as_deref() == Some(token) {
                text.push(' ');
            } else {
                text.push_str(token);
            }
        }
        Ok(text)
    }
}
