//! Walks a capture's operators and asks the matcher for each one.

use kernelscope_core::{LookupWarning, NoMatchReason, OperatorKernelPair, Verbosity};
use kernelscope_library::RuleLibrary;
use kernelscope_matcher::{MatchQuery, MatchResult, ShapeMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Only evaluate these operator types. `None` evaluates every type.
    pub op_filter: Option<BTreeSet<String>>,
    pub verbosity: Verbosity,
}

impl EvaluationOptions {
    pub fn with_op_filter<I, S>(mut self, op_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.op_filter = Some(op_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Memory-copy operators are never evaluated.
    pub fn includes(&self, pair: &OperatorKernelPair) -> bool {
        if pair.operator.is_memcpy() {
            return false;
        }
        self.op_filter
            .as_ref()
            .map_or(true, |filter| filter.contains(&pair.operator.op_type))
    }
}

/// One evaluated operator: the measured pair and what the matcher predicted for it.
#[derive(Debug, Clone)]
pub struct OperatorPrediction<'a> {
    pub pair: &'a OperatorKernelPair,
    pub result: MatchResult,
}

impl OperatorPrediction<'_> {
    pub fn warning(&self) -> Option<LookupWarning> {
        let reason = self.result.no_match_reason()?;
        let op_type = self.pair.operator.op_type.clone();
        Some(match reason {
            NoMatchReason::UnregisteredType => LookupWarning::UnregisteredOperator { op_type },
            reason => LookupWarning::NoPrediction {
                op_type,
                node_name: self.pair.operator.name.clone(),
                reason,
            },
        })
    }
}

pub fn predict_operators<'a>(
    pairs: &'a [OperatorKernelPair],
    library: &RuleLibrary,
    matcher: &ShapeMatcher,
    options: &EvaluationOptions,
) -> Vec<OperatorPrediction<'a>> {
    pairs
        .iter()
        .filter(|pair| options.includes(pair))
        .map(|pair| {
            if options.verbosity.debug() {
                debug!(
                    op_type = %pair.operator.op_type,
                    node = %pair.operator.name,
                    index = pair.operator.index,
                    "predicting operator"
                );
            }
            let query = MatchQuery::from_operator(&pair.operator);
            OperatorPrediction {
                pair,
                result: matcher.find_best_match(library, &query),
            }
        })
        .collect()
}
