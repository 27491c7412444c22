//! Rule library: historical shape → kernel-sequence observations.

pub mod builder;
pub mod entry;
pub mod store;

pub use builder::*;
pub use entry::*;
pub use store::*;
