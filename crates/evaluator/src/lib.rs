//! Accuracy of library predictions against measured captures.
//!
//! Two evaluators share one driver: [`ParameterEvaluator`] compares launch
//! parameters and profiler metrics per operator, [`SequenceEvaluator`]
//! compares the kernel sequences themselves. [`accuracy_matrix`] repeats the
//! sequence evaluation for every library and target combination.

pub mod accuracy;
pub mod driver;
pub mod matrix;
pub mod params;
pub mod report;
pub mod sequence;

pub use accuracy::{mean, ratio_accuracy};
pub use driver::{predict_operators, EvaluationOptions, OperatorPrediction};
pub use matrix::{accuracy_matrix, AccuracyMatrix, MatrixCell, NamedLibrary, NamedTarget};
pub use params::{OperatorScores, ParameterAxis, ParameterEvaluator, ParameterReport};
pub use report::{unix_time_ms, JsonReport};
pub use sequence::{classify, MatchClass, SequenceEvaluator, SequenceOutcome, SequenceReport};
