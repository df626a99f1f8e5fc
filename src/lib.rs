//! Math tutoring environment and checkpoint-driven model builder for Burn.
//!
//! The crate bundles two independent utilities:
//! - [`ProblemEnvironment`] tracks a single active math problem and answers
//!   verification, hint and expression-evaluation queries about it.
//! - [`ModelBuilderConfig`] assembles a Burn model from a checkpoint directory,
//!   a tokenizer and an optional encoder.
//!
//! # Example
//!
//! ```ignore
//! use tutor_burn::{HfTokenizer, ModelBuilderConfig};
//!
//! let bundle = ModelBuilderConfig::new("llama-2-7b".into(), "tokenizer.json".into())
//!     .build::<B, MyLlama<B>, _>(MyLlamaConfig::new(), HfTokenizer::new(), &device)?;
//! ```

mod builder;
mod checkpoint;
mod environment;
mod error;
mod expression;
mod precision;
mod problem;
pub mod tokenizer;

pub use builder::*;
pub use checkpoint::*;
pub use environment::*;
pub use error::*;
pub use expression::*;
pub use precision::*;
pub use problem::*;
pub use tokenizer::{HfTokenizer, Tokenizer, TokenizerError};

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray<f32>;
}
