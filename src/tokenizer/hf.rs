use std::path::Path;

use super::{Tokenizer, TokenizerError};

/// HuggingFace `tokenizer.json` tokenizer, empty until [`Tokenizer::load`] is called.
#[derive(Default, Clone)]
pub struct HfTokenizer {
    tokenizer: Option<tokenizers::Tokenizer>,
}

impl HfTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let mut tokenizer = Self::new();
        tokenizer.load(path)?;
        Ok(tokenizer)
    }

    pub fn is_loaded(&self) -> bool {
        self.tokenizer.is_some()
    }

    pub fn encode(
        &self,
        text: &str,
        add_special_tokens: bool,
    ) -> Result<Vec<u32>, TokenizerError> {
        self.inner()?
            .encode(text, add_special_tokens)
            .map(|encoding| encoding.get_ids().to_vec())
            .map_err(|e| TokenizerError::Encode(e.to_string()))
    }

    pub fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        self.inner()?
            .decode(tokens, true)
            .map_err(|e| TokenizerError::Decode(e.to_string()))
    }

    fn inner(&self) -> Result<&tokenizers::Tokenizer, TokenizerError> {
        self.tokenizer.as_ref().ok_or(TokenizerError::NotLoaded)
    }
}

impl Tokenizer for HfTokenizer {
    fn load(&mut self, path: &Path) -> Result<(), TokenizerError> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| TokenizerError::Load(e.to_string()))?;
        self.tokenizer = Some(tokenizer);
        Ok(())
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer
            .as_ref()
            .map_or(0, |tokenizer| tokenizer.get_vocab_size(true))
    }
}
