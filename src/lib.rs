//! kernelscope: predict the GPU kernels an inference operator will launch by
//! matching its shape signature against a library of profiled captures, and
//! measure how well those predictions hold up.
//!
//! The workspace crates are re-exported here:
//!
//! * [`core`]: records, errors, verbosity
//! * [`trace`]: runtime trace parsing and operator/kernel pairing
//! * [`metrics`]: hardware profiler tables joined onto kernels
//! * [`library`]: the rule library and its builder
//! * [`matcher`]: per-operator-type matching strategies
//! * [`evaluator`]: parameter, sequence and cross-library accuracy

pub use kernelscope_core as core;
pub use kernelscope_evaluator as evaluator;
pub use kernelscope_library as library;
pub use kernelscope_matcher as matcher;
pub use kernelscope_metrics as metrics;
pub use kernelscope_trace as trace;

pub use kernelscope_core::{KernelScopeError, Result, Verbosity};
