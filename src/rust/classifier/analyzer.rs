use std::fmt::Debug;
use std::path::Path;

use log::{error, info};
use tokenizers::Tokenizer;

use super::error::ClassifierError;

/// Turns free text into an ordered sequence of normalized terms.
///
/// Implementations are the only place tokenization happens; the encoder only
/// counts what comes back.
pub trait Analyzer: Debug + Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<String>, ClassifierError>;
}

/// Lower-cases and splits on whitespace. Nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceAnalyzer;

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>, ClassifierError> {
        Ok(text.split_whitespace().map(str::to_lowercase).collect())
    }
}

/// Analyzer backed by a HuggingFace `tokenizer.json`.
///
/// Terms are the token strings produced by the tokenizer, special tokens
/// excluded.
#[derive(Debug)]
pub struct TokenizerAnalyzer {
    tokenizer: Tokenizer,
}

impl TokenizerAnalyzer {
    /// Loads the tokenizer definition at `path`.
    ///
    /// # Errors
    /// - `Analyzer` if the file does not exist or cannot be parsed
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::Analyzer(format!("Tokenizer file not found: {:?}", path)));
        }
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::Analyzer(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("Tokenizer loaded from {:?}", path);
        Ok(Self { tokenizer })
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl Analyzer for TokenizerAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| ClassifierError::Analyzer(e.to_string()))?;
        let terms = encoding
            .get_tokens()
            .iter()
            .zip(encoding.get_special_tokens_mask())
            .filter(|(_, special)| **special == 0)
            .map(|(token, _)| token.clone())
            .collect();
        Ok(terms)
    }
}
