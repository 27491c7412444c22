//! Library lookup front end.

use crate::query::{MatchQuery, MatchResult};
use crate::registry::StrategyRegistry;
use crate::score::ScoreWeights;
use kernelscope_core::{NoMatchReason, Verbosity};
use kernelscope_library::RuleLibrary;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub weights: ScoreWeights,
    pub verbosity: Verbosity,
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.weights.validate()
    }
}

/// Predicts kernel sequences by dispatching each query to the strategy
/// registered for its operator type.
#[derive(Debug, Clone)]
pub struct ShapeMatcher {
    registry: StrategyRegistry,
    config: MatcherConfig,
}

impl Default for ShapeMatcher {
    fn default() -> Self {
        Self::new(StrategyRegistry::with_default_strategies(), MatcherConfig::default())
    }
}

impl ShapeMatcher {
    pub fn new(registry: StrategyRegistry, config: MatcherConfig) -> Self {
        Self { registry, config }
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        Self::new(StrategyRegistry::with_default_strategies(), config)
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    pub fn find_best_match(&self, library: &RuleLibrary, query: &MatchQuery) -> MatchResult {
        let verbosity = self.config.verbosity;
        let Some(strategy) = self.registry.find(&query.op_type) else {
            if verbosity.warnings() {
                warn!(op_type = %query.op_type, node = %query.node_name, "operator type not registered");
            }
            return MatchResult::no_match(NoMatchReason::UnregisteredType);
        };

        let candidates = library.entries(&query.op_type).unwrap_or(&[]);
        if verbosity.debug() {
            debug!(
                op_type = %query.op_type,
                node = %query.node_name,
                strategy = strategy.name(),
                candidates = candidates.len(),
                "matching operator"
            );
        }

        let result = strategy.find(candidates, query, &self.config.weights);
        match &result {
            MatchResult::Predicted(prediction) if prediction.is_exact() => {
                if verbosity.debug() {
                    debug!(node = %query.node_name, source = %prediction.node_name, "exact match");
                }
            }
            MatchResult::Predicted(prediction) => {
                if verbosity.info() {
                    info!(
                        node = %query.node_name,
                        source_model = %prediction.model,
                        source = %prediction.node_name,
                        score = prediction.score,
                        full_score = prediction.full_score,
                        "inexact match"
                    );
                }
            }
            MatchResult::OffDevice => {
                if verbosity.debug() {
                    debug!(node = %query.node_name, "no device kernel expected");
                }
            }
            MatchResult::NoMatch { reason } => {
                if verbosity.warnings() {
                    warn!(op_type = %query.op_type, node = %query.node_name, %reason, "no prediction");
                }
            }
        }
        result
    }
}
