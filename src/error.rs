use std::path::PathBuf;

use thiserror::Error;

use crate::tokenizer::TokenizerError;

/// Failure while assembling a model from a checkpoint directory.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("no checkpoint files found in {}", .0.display())]
    NoCheckpointFound(PathBuf),

    #[error(
        "checkpoint weights do not match model parameters (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    WeightLoadMismatch {
        /// Model parameters absent from the checkpoint.
        missing: Vec<String>,
        /// Checkpoint tensors with no matching model parameter.
        unexpected: Vec<String>,
    },

    #[error("failed to load weights: {0}")]
    WeightLoad(String),

    #[error("failed to read checkpoint: {0}")]
    Checkpoint(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid params file: {0}")]
    Params(#[from] serde_json::Error),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Failure while parsing or evaluating a math expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("symbol '{0}' has no numeric value")]
    UnknownIdentifier(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },

    #[error("expression does not evaluate to a finite number")]
    NonFinite,

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("expression has more than {0} tokens")]
    TooLong(usize),
}
