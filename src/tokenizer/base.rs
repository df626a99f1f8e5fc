use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer: {0}")]
    Load(String),
    #[error("Failed to encode text: {0}")]
    Encode(String),
    #[error("Failed to decode tokens: {0}")]
    Decode(String),
    #[error("Tokenizer used before being loaded")]
    NotLoaded,
}

pub trait Tokenizer {
    /// Load the tokenizer vocabulary from the provided path.
    fn load(&mut self, path: &Path) -> Result<(), TokenizerError>;

    /// Number of entries in the vocabulary, including added tokens.
    fn vocab_size(&self) -> usize;
}
