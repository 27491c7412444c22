//! Error taxonomy and recoverable lookup warnings.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = KernelScopeError> = std::result::Result<T, E>;

/// Fatal failures. Any of these aborts a run before an aggregate is reported.
#[derive(Debug, Error)]
pub enum KernelScopeError {
    #[error("failed to parse {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    #[error(
        "kernel count mismatch: trace max kernel index {trace_max_index:?}, \
         metric table max index {metric_max_index:?}"
    )]
    Consistency {
        trace_max_index: Option<u32>,
        metric_max_index: Option<u32>,
    },

    #[error("rule library {path} is missing required field `{field}`")]
    Schema { path: PathBuf, field: &'static str },

    #[error("no operators were evaluated")]
    NoOperatorsEvaluated,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl KernelScopeError {
    pub fn parse(source_name: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Why a query produced no prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    /// No strategy is registered for the operator type.
    UnregisteredType,
    /// The operator type is deliberately outside the modeled set.
    Unsupported,
    /// The library holds no entries of the operator type.
    NoCandidates,
    /// Entries exist but every one was rejected by the strategy's gate.
    NoViableCandidate,
    /// The query itself does not have the arity or rank the strategy needs.
    InvalidQuery,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnregisteredType => "operator type not registered",
            Self::Unsupported => "operator type unsupported",
            Self::NoCandidates => "no library entries for operator type",
            Self::NoViableCandidate => "no viable candidate",
            Self::InvalidQuery => "query shape signature not usable",
        };
        f.write_str(text)
    }
}

/// Recoverable problems. They downgrade a single prediction or metric and the run continues.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupWarning {
    MissingMetric { kernel_index: u32, metric: String },
    AmbiguousMetric { kernel_index: u32, metric: String, rows: usize },
    UnparsableMetricValue { kernel_index: u32, metric: String, value: String },
    UnregisteredOperator { op_type: String },
    NoPrediction {
        op_type: String,
        node_name: String,
        reason: NoMatchReason,
    },
}

impl fmt::Display for LookupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMetric {
                kernel_index,
                metric,
            } => write!(f, "kernel {kernel_index}: no row for metric `{metric}`"),
            Self::AmbiguousMetric {
                kernel_index,
                metric,
                rows,
            } => write!(
                f,
                "kernel {kernel_index}: {rows} rows for metric `{metric}`, skipped"
            ),
            Self::UnparsableMetricValue {
                kernel_index,
                metric,
                value,
            } => write!(
                f,
                "kernel {kernel_index}: value `{value}` of metric `{metric}` is not numeric"
            ),
            Self::UnregisteredOperator { op_type } => {
                write!(f, "operator type `{op_type}` is not registered")
            }
            Self::NoPrediction {
                op_type,
                node_name,
                reason,
            } => write!(f, "{op_type} {node_name}: {reason}"),
        }
    }
}
