pub mod base;
pub use base::*;

pub mod hf;
pub use hf::*;
