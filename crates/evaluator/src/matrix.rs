//! Cross-library generalization: every library against every target capture.

use crate::report::{unix_time_ms, JsonReport};
use crate::sequence::SequenceEvaluator;
use kernelscope_core::OperatorKernelPair;
use kernelscope_library::RuleLibrary;
use serde::{Deserialize, Serialize};

/// A labelled rule library, e.g. one built from a single model variant.
pub struct NamedLibrary<'a> {
    pub name: &'a str,
    pub library: &'a RuleLibrary,
}

/// A labelled capture whose operators are predicted.
pub struct NamedTarget<'a> {
    pub name: &'a str,
    pub pairs: &'a [OperatorKernelPair],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub library: String,
    pub target: String,
    pub exact: usize,
    pub sequence: usize,
    pub total: usize,
    pub exact_rate: Option<f64>,
    pub sequence_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMatrix {
    pub generated_at_unix_ms: u128,
    /// Row-major: all targets of the first library, then the next library.
    pub cells: Vec<MatrixCell>,
}

impl AccuracyMatrix {
    pub fn cell(&self, library: &str, target: &str) -> Option<&MatrixCell> {
        self.cells
            .iter()
            .find(|cell| cell.library == library && cell.target == target)
    }
}

impl JsonReport for AccuracyMatrix {}

pub fn accuracy_matrix(
    evaluator: &SequenceEvaluator,
    libraries: &[NamedLibrary<'_>],
    targets: &[NamedTarget<'_>],
) -> AccuracyMatrix {
    let mut cells = Vec::with_capacity(libraries.len() * targets.len());
    for library in libraries {
        for target in targets {
            let report = evaluator.evaluate(target.pairs, library.library);
            cells.push(MatrixCell {
                library: library.name.to_string(),
                target: target.name.to_string(),
                exact: report.exact,
                sequence: report.sequence,
                total: report.total,
                exact_rate: report.exact_rate(),
                sequence_rate: report.sequence_rate(),
            });
        }
    }
    AccuracyMatrix {
        generated_at_unix_ms: unix_time_ms(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::EvaluationOptions;
    use kernelscope_core::{Dim3, KernelRecord, OperatorRecord, TensorShape, Verbosity};
    use kernelscope_library::{LibraryMetadata, RuleLibraryBuilder};
    use kernelscope_matcher::{MatcherConfig, ShapeMatcher};

    fn capture(grid: u32, width: i64) -> Vec<OperatorKernelPair> {
        vec![OperatorKernelPair {
            operator: OperatorRecord {
                name: "/act/Sigmoid".into(),
                op_type: "Sigmoid".into(),
                provider: "CUDAExecutionProvider".into(),
                inputs: vec![TensorShape::new("float", vec![1, width])],
                outputs: vec![TensorShape::new("float", vec![1, width])],
                parameter_size: 0,
                activation_size: 0,
                output_size: 0,
                duration_us: 0,
                index: 0,
            },
            kernels: vec![KernelRecord::new("sigmoid", Dim3::new(grid, 1, 1), Dim3::new(256, 1, 1))],
        }]
    }

    fn library_from(pairs: &[OperatorKernelPair], model: &str) -> RuleLibrary {
        let mut builder = RuleLibraryBuilder::new();
        builder.add_pairs(pairs, model, 1);
        builder.finish(LibraryMetadata::new("V100", model))
    }

    #[test]
    fn every_library_meets_every_target() {
        let small = capture(4, 1024);
        let large = capture(16, 4096);
        let small_lib = library_from(&small, "n");
        let large_lib = library_from(&large, "x");

        let matcher = ShapeMatcher::with_config(MatcherConfig {
            verbosity: Verbosity::Silent,
            ..MatcherConfig::default()
        });
        let evaluator = SequenceEvaluator::new(matcher)
            .with_options(EvaluationOptions::default().with_verbosity(Verbosity::Silent));

        let matrix = accuracy_matrix(
            &evaluator,
            &[
                NamedLibrary { name: "n", library: &small_lib },
                NamedLibrary { name: "x", library: &large_lib },
            ],
            &[
                NamedTarget { name: "n", pairs: &small },
                NamedTarget { name: "x", pairs: &large },
            ],
        );

        assert_eq!(matrix.cells.len(), 4);
        assert_eq!(matrix.cell("n", "n").unwrap().exact_rate, Some(1.0));
        let cross = matrix.cell("n", "x").unwrap();
        assert_eq!(cross.exact, 0);
        assert_eq!(cross.sequence_rate, Some(1.0));
    }
}
