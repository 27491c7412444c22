//! Shape matching: predict an operator's kernel sequence from the closest
//! historical observation of the same operator type.

pub mod matcher;
pub mod query;
pub mod registry;
pub mod score;
pub mod strategies;
pub mod strategy;

pub use matcher::{MatcherConfig, ShapeMatcher};
pub use query::{MatchQuery, MatchResult, Prediction};
pub use registry::StrategyRegistry;
pub use score::{full_score, similarity, ScoreWeights};
pub use strategies::*;
pub use strategy::{best_candidate, DynMatchStrategy, MatchStrategy, Slot};
