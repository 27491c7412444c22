//! Prediction requests and their outcomes.

use kernelscope_core::{KernelRecord, NoMatchReason, OperatorRecord, Shape};
use serde::{Deserialize, Serialize};

/// Shape signature of one operator, submitted for prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub op_type: String,
    pub node_name: String,
    pub inputs: Vec<Shape>,
    pub outputs: Vec<Shape>,
}

impl MatchQuery {
    pub fn new(
        op_type: impl Into<String>,
        node_name: impl Into<String>,
        inputs: Vec<Shape>,
        outputs: Vec<Shape>,
    ) -> Self {
        Self {
            op_type: op_type.into(),
            node_name: node_name.into(),
            inputs,
            outputs,
        }
    }

    pub fn from_operator(operator: &OperatorRecord) -> Self {
        Self {
            op_type: operator.op_type.clone(),
            node_name: operator.name.clone(),
            inputs: operator.input_dims(),
            outputs: operator.output_dims(),
        }
    }

    pub fn input(&self, idx: usize) -> Option<&Shape> {
        self.inputs.get(idx)
    }

    pub fn output(&self, idx: usize) -> Option<&Shape> {
        self.outputs.get(idx)
    }
}

/// The best candidate a strategy found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub kernels: Vec<KernelRecord>,
    pub score: f64,
    pub full_score: f64,
    pub model: String,
    pub node_name: String,
}

impl Prediction {
    pub fn is_exact(&self) -> bool {
        self.score >= self.full_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchResult {
    Predicted(Prediction),
    /// The operator is expected to launch no device kernel.
    OffDevice,
    NoMatch { reason: NoMatchReason },
}

impl MatchResult {
    pub fn no_match(reason: NoMatchReason) -> Self {
        Self::NoMatch { reason }
    }

    /// Predicted kernel list; empty for off-device operators, `None` on no match.
    pub fn kernels(&self) -> Option<&[KernelRecord]> {
        match self {
            Self::Predicted(prediction) => Some(&prediction.kernels),
            Self::OffDevice => Some(&[][..]),
            Self::NoMatch { .. } => None,
        }
    }

    pub fn no_match_reason(&self) -> Option<NoMatchReason> {
        match self {
            Self::NoMatch { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Predicted(p) if p.is_exact())
    }
}
