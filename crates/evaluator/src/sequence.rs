//! Kernel-sequence agreement between predictions and a measured capture.

use crate::driver::{predict_operators, EvaluationOptions};
use crate::report::{unix_time_ms, JsonReport};
use kernelscope_core::{KernelRecord, LookupWarning, OperatorKernelPair};
use kernelscope_library::RuleLibrary;
use kernelscope_matcher::ShapeMatcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchClass {
    NoMatch,
    /// Same kernel names in the same order, some launch dimension differs.
    SequenceMatch,
    ExactMatch,
}

/// Classify a predicted kernel list against the measured one.
///
/// Launch dimensions of memory copies are not compared.
pub fn classify(predicted: Option<&[KernelRecord]>, real: &[KernelRecord]) -> MatchClass {
    let Some(predicted) = predicted else {
        return MatchClass::NoMatch;
    };
    if predicted.len() != real.len() || predicted.iter().zip(real).any(|(p, r)| p.name != r.name) {
        return MatchClass::NoMatch;
    }

    let same_launches = predicted
        .iter()
        .zip(real)
        .filter(|(p, _)| !p.is_memcpy())
        .all(|(p, r)| p.same_launch(r));
    if same_launches {
        MatchClass::ExactMatch
    } else {
        MatchClass::SequenceMatch
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOutcome {
    pub node_name: String,
    pub op_type: String,
    pub class: MatchClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub generated_at_unix_ms: u128,
    pub library_gpu: String,
    pub exact: usize,
    /// Operators whose kernel names matched, exact matches included.
    pub sequence: usize,
    pub total: usize,
    pub operators: Vec<SequenceOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<LookupWarning>,
}

impl SequenceReport {
    pub fn exact_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.exact as f64 / self.total as f64)
    }

    pub fn sequence_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.sequence as f64 / self.total as f64)
    }
}

impl JsonReport for SequenceReport {}

#[derive(Debug, Clone)]
pub struct SequenceEvaluator {
    matcher: ShapeMatcher,
    options: EvaluationOptions,
}

impl SequenceEvaluator {
    pub fn new(matcher: ShapeMatcher) -> Self {
        Self {
            matcher,
            options: EvaluationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn evaluate(&self, pairs: &[OperatorKernelPair], library: &RuleLibrary) -> SequenceReport {
        let verbosity = self.options.verbosity;
        let mut report = SequenceReport {
            generated_at_unix_ms: unix_time_ms(),
            library_gpu: library.metadata().gpu.clone(),
            exact: 0,
            sequence: 0,
            total: 0,
            operators: Vec::new(),
            warnings: Vec::new(),
        };

        for prediction in predict_operators(pairs, library, &self.matcher, &self.options) {
            let operator = &prediction.pair.operator;
            let class = classify(prediction.result.kernels(), &prediction.pair.kernels);
            report.total += 1;
            match class {
                MatchClass::ExactMatch => {
                    report.exact += 1;
                    report.sequence += 1;
                }
                MatchClass::SequenceMatch => report.sequence += 1,
                MatchClass::NoMatch => {}
            }

            if let Some(warning) = prediction.warning() {
                report.warnings.push(warning);
            } else if class == MatchClass::NoMatch && verbosity.warnings() {
                let predicted = prediction.result.kernels().unwrap_or_default();
                warn!(
                    node = %operator.name,
                    predicted = ?predicted.iter().map(|k| k.name.as_str()).collect::<Vec<_>>(),
                    real = ?prediction.pair.kernel_names(),
                    "predicted kernel sequence differs"
                );
            } else if verbosity.debug() {
                debug!(node = %operator.name, ?class, "sequence compared");
            }

            report.operators.push(SequenceOutcome {
                node_name: operator.name.clone(),
                op_type: operator.op_type.clone(),
                class,
            });
        }

        if verbosity.info() {
            info!(
                exact = report.exact,
                sequence = report.sequence,
                total = report.total,
                "kernel sequence accuracy"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelscope_core::{Dim3, OperatorRecord, TensorShape, Verbosity};
    use kernelscope_library::{LibraryMetadata, RuleLibraryEntry};
    use kernelscope_matcher::MatcherConfig;
    use std::collections::BTreeMap;

    fn kernel(name: &str, grid: u32) -> KernelRecord {
        KernelRecord::new(name, Dim3::new(grid, 1, 1), Dim3::new(128, 1, 1))
    }

    #[test]
    fn classification() {
        let real = vec![kernel("gemm", 8), kernel("Memcpy DtoD", 1)];
        assert_eq!(classify(None, &real), MatchClass::NoMatch);
        assert_eq!(classify(Some(&real[..1]), &real), MatchClass::NoMatch);
        assert_eq!(
            classify(Some(&[kernel("winograd", 8), kernel("Memcpy DtoD", 1)][..]), &real),
            MatchClass::NoMatch
        );
        assert_eq!(
            classify(Some(&[kernel("gemm", 8), kernel("Memcpy DtoD", 99)][..]), &real),
            MatchClass::ExactMatch
        );
        assert_eq!(
            classify(Some(&[kernel("gemm", 4), kernel("Memcpy DtoD", 1)][..]), &real),
            MatchClass::SequenceMatch
        );
        assert_eq!(classify(Some(&[][..]), &[]), MatchClass::ExactMatch);
    }

    fn pair(name: &str, op_type: &str, shape: Vec<i64>, kernels: Vec<KernelRecord>) -> OperatorKernelPair {
        OperatorKernelPair {
            operator: OperatorRecord {
                name: name.into(),
                op_type: op_type.into(),
                provider: "CUDAExecutionProvider".into(),
                inputs: vec![TensorShape::new("float", shape.clone())],
                outputs: vec![TensorShape::new("float", shape)],
                parameter_size: 0,
                activation_size: 0,
                output_size: 0,
                duration_us: 0,
                index: 0,
            },
            kernels,
        }
    }

    fn silent(options: EvaluationOptions) -> SequenceEvaluator {
        let matcher = ShapeMatcher::with_config(MatcherConfig {
            verbosity: Verbosity::Silent,
            ..MatcherConfig::default()
        });
        SequenceEvaluator::new(matcher).with_options(options.with_verbosity(Verbosity::Silent))
    }

    fn library() -> RuleLibrary {
        let mut data = BTreeMap::new();
        data.insert(
            "Sigmoid".to_string(),
            vec![RuleLibraryEntry::new(vec![kernel("sigmoid", 10)], vec![vec![1, 8]], vec![vec![1, 8]])],
        );
        RuleLibrary::new(LibraryMetadata::new("V100", "sequence test"), data)
    }

    #[test]
    fn counts_exact_within_sequence() {
        let pairs = vec![
            pair("a", "Sigmoid", vec![1, 8], vec![kernel("sigmoid", 10)]),
            pair("b", "Sigmoid", vec![1, 16], vec![kernel("sigmoid", 20)]),
            pair("c", "Reshape", vec![1, 16], Vec::new()),
            pair("d", "Softmax", vec![1, 16], vec![kernel("softmax", 1)]),
            pair("e", "MemcpyFromHost", vec![1, 16], vec![kernel("Memcpy HtoD", 1)]),
        ];
        let report = silent(EvaluationOptions::default()).evaluate(&pairs, &library());
        assert_eq!(report.total, 4);
        assert_eq!(report.exact, 2);
        assert_eq!(report.sequence, 3);
        assert_eq!(report.exact_rate(), Some(0.5));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn op_filter_limits_evaluation() {
        let pairs = vec![
            pair("a", "Sigmoid", vec![1, 8], vec![kernel("sigmoid", 10)]),
            pair("c", "Reshape", vec![1, 16], Vec::new()),
        ];
        let report = silent(EvaluationOptions::default().with_op_filter(["Reshape"])).evaluate(&pairs, &library());
        assert_eq!(report.total, 1);
        assert_eq!(report.operators[0].node_name, "c");

        let report = silent(EvaluationOptions::default().with_op_filter(["Conv"])).evaluate(&pairs, &library());
        assert_eq!(report.total, 0);
        assert_eq!(report.exact_rate(), None);
    }
}
