//! Shared data model, error taxonomy and diagnostics settings for kernelscope.

pub mod error;
pub mod model;
pub mod verbosity;

pub use error::*;
pub use model::*;
pub use verbosity::*;
