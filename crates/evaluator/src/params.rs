//! Launch-parameter and execution-metric accuracy.

use crate::accuracy::{mean, ratio_accuracy};
use crate::driver::{predict_operators, EvaluationOptions};
use crate::report::{unix_time_ms, JsonReport};
use kernelscope_core::{KernelRecord, KernelScopeError, LookupWarning, OperatorKernelPair, Result};
use kernelscope_library::RuleLibrary;
use kernelscope_matcher::{MatchResult, ShapeMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

const REGISTERS_PER_THREAD: &str = "Registers Per Thread";
const COMPUTE_THROUGHPUT: &str = "Compute (SM) Throughput";
const MEMORY_THROUGHPUT: &str = "Memory Throughput";
const SM_ACTIVE_CYCLES: &str = "SM Active Cycles";

/// A per-operator quantity derived from its kernel list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterAxis {
    GridSize,
    BlockSize,
    RegistersPerThread,
    RegistersPerThreadMean,
    ComputeThroughput,
    MemoryThroughput,
    SmActiveCycles,
}

enum Aggregation {
    Sum,
    Mean,
}

impl ParameterAxis {
    /// Grid, block and register usage.
    pub fn launch() -> Vec<Self> {
        vec![Self::GridSize, Self::BlockSize, Self::RegistersPerThread]
    }

    /// Speed-of-light throughputs and active cycles.
    pub fn execution() -> Vec<Self> {
        vec![Self::ComputeThroughput, Self::MemoryThroughput, Self::SmActiveCycles]
    }

    pub fn all() -> Vec<Self> {
        let mut axes = Self::launch();
        axes.push(Self::RegistersPerThreadMean);
        axes.extend(Self::execution());
        axes
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GridSize => "grid_size",
            Self::BlockSize => "block_size",
            Self::RegistersPerThread => "registers_per_thread",
            Self::RegistersPerThreadMean => "registers_per_thread_mean",
            Self::ComputeThroughput => "compute_throughput",
            Self::MemoryThroughput => "memory_throughput",
            Self::SmActiveCycles => "sm_active_cycles",
        }
    }

    fn per_kernel(self, kernel: &KernelRecord) -> f64 {
        let metric = |name| kernel.metric(name).unwrap_or(0.0);
        match self {
            Self::GridSize => kernel.grid_size() as f64,
            Self::BlockSize => kernel.block_size() as f64,
            Self::RegistersPerThread | Self::RegistersPerThreadMean => metric(REGISTERS_PER_THREAD),
            Self::ComputeThroughput => metric(COMPUTE_THROUGHPUT),
            Self::MemoryThroughput => metric(MEMORY_THROUGHPUT),
            Self::SmActiveCycles => metric(SM_ACTIVE_CYCLES),
        }
    }

    fn aggregation(self) -> Aggregation {
        match self {
            Self::GridSize | Self::BlockSize | Self::RegistersPerThread | Self::SmActiveCycles => {
                Aggregation::Sum
            }
            Self::RegistersPerThreadMean | Self::ComputeThroughput | Self::MemoryThroughput => {
                Aggregation::Mean
            }
        }
    }

    /// Operator-level value. Memory-copy launches are ignored, as is a
    /// metric the profiler did not report for a kernel.
    pub fn aggregate(self, kernels: &[KernelRecord]) -> f64 {
        let values = kernels
            .iter()
            .filter(|kernel| !kernel.is_memcpy())
            .map(|kernel| self.per_kernel(kernel));
        match self.aggregation() {
            Aggregation::Sum => values.sum(),
            Aggregation::Mean => mean(values).unwrap_or(0.0),
        }
    }
}

impl fmt::Display for ParameterAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorScores {
    pub node_name: String,
    pub op_type: String,
    pub result: MatchResult,
    pub scores: BTreeMap<ParameterAxis, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterReport {
    pub generated_at_unix_ms: u128,
    pub library_gpu: String,
    pub evaluated: usize,
    /// Mean accuracy per axis over every evaluated operator.
    pub aggregate: BTreeMap<ParameterAxis, f64>,
    pub operators: Vec<OperatorScores>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<LookupWarning>,
}

impl ParameterReport {
    pub fn accuracy(&self, axis: ParameterAxis) -> Option<f64> {
        self.aggregate.get(&axis).copied()
    }
}

impl JsonReport for ParameterReport {}

/// Scores predicted kernel lists against measured ones on a set of axes.
#[derive(Debug, Clone)]
pub struct ParameterEvaluator {
    matcher: ShapeMatcher,
    axes: Vec<ParameterAxis>,
    options: EvaluationOptions,
}

impl ParameterEvaluator {
    pub fn new(matcher: ShapeMatcher, axes: Vec<ParameterAxis>) -> Self {
        Self {
            matcher,
            axes,
            options: EvaluationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    /// Evaluate every included operator of `pairs` against `library`.
    ///
    /// An operator without a prediction scores 0 on every axis and adds a
    /// warning. A capture that leaves nothing to evaluate is an error.
    pub fn evaluate(&self, pairs: &[OperatorKernelPair], library: &RuleLibrary) -> Result<ParameterReport> {
        let predictions = predict_operators(pairs, library, &self.matcher, &self.options);
        if predictions.is_empty() {
            return Err(KernelScopeError::NoOperatorsEvaluated);
        }

        let mut operators = Vec::with_capacity(predictions.len());
        let mut warnings = Vec::new();
        for prediction in predictions {
            let real = &prediction.pair.kernels;
            let scores: BTreeMap<ParameterAxis, f64> = match prediction.result.kernels() {
                Some(predicted) => self
                    .axes
                    .iter()
                    .map(|&axis| (axis, ratio_accuracy(axis.aggregate(predicted), axis.aggregate(real))))
                    .collect(),
                None => self.axes.iter().map(|&axis| (axis, 0.0)).collect(),
            };

            if let Some(warning) = prediction.warning() {
                if self.options.verbosity.warnings() {
                    warn!(%warning, "operator scored as zero");
                }
                warnings.push(warning);
            }

            operators.push(OperatorScores {
                node_name: prediction.pair.operator.name.clone(),
                op_type: prediction.pair.operator.op_type.clone(),
                result: prediction.result,
                scores,
            });
        }

        let aggregate: BTreeMap<ParameterAxis, f64> = self
            .axes
            .iter()
            .map(|&axis| {
                let value = mean(operators.iter().map(|op| op.scores[&axis])).unwrap_or(0.0);
                (axis, value)
            })
            .collect();

        if self.options.verbosity.info() {
            for (axis, value) in &aggregate {
                info!(axis = %axis, accuracy = value, operators = operators.len(), "parameter accuracy");
            }
        }

        Ok(ParameterReport {
            generated_at_unix_ms: unix_time_ms(),
            library_gpu: library.metadata().gpu.clone(),
            evaluated: operators.len(),
            aggregate,
            operators,
            warnings,
        })
    }
}
