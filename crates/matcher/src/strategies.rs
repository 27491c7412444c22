//! Built-in matching strategies.

use crate::query::{MatchQuery, MatchResult};
use crate::score::{full_score, similarity, ScoreWeights};
use crate::strategy::{best_candidate, query_full_score, slot_score, MatchStrategy, Slot};
use kernelscope_core::{NoMatchReason, Shape};
use kernelscope_library::RuleLibraryEntry;
use std::borrow::Cow;

fn all_same(shapes: &[Shape]) -> bool {
    shapes.windows(2).all(|pair| pair[0] == pair[1])
}

/// Homogeneous shapes run as one fused launch (or none); mixed shapes go
/// through a multi-launch staging sequence.
fn passes_homogeneity_gate(homogeneous: bool, candidate: &RuleLibraryEntry) -> bool {
    let launches = candidate.kernels().len();
    if homogeneous {
        launches <= 1
    } else {
        launches != 1
    }
}

fn scan_slots(
    candidates: &[RuleLibraryEntry],
    query: &MatchQuery,
    slots: &[Slot],
    weights: &ScoreWeights,
    mut gate: impl FnMut(&RuleLibraryEntry) -> bool,
) -> MatchResult {
    let Some(full) = query_full_score(query, slots, weights) else {
        return MatchResult::no_match(NoMatchReason::InvalidQuery);
    };
    best_candidate(candidates, full, |candidate| {
        if !gate(candidate) {
            return None;
        }
        slot_score(query, candidate, slots, weights)
    })
}

/// Input, weight, optional bias and output of a convolution.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConvStrategy;

impl MatchStrategy for ConvStrategy {
    fn name(&self) -> &str {
        "conv"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        if query.input(1).map(Vec::len) != Some(4) {
            return MatchResult::no_match(NoMatchReason::InvalidQuery);
        }

        let has_bias = query.inputs.len() > 2;
        let mut slots = vec![Slot::Input(0), Slot::Input(1)];
        if has_bias {
            slots.push(Slot::Input(2));
        }
        slots.push(Slot::Output(0));

        scan_slots(candidates, query, &slots, weights, |candidate| {
            (candidate.inputs().len() > 2) == has_bias
        })
    }
}

/// Variable number of inputs joined into output 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatStrategy;

impl MatchStrategy for ConcatStrategy {
    fn name(&self) -> &str {
        "concat"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        let arity = query.inputs.len();
        if arity == 0 {
            return MatchResult::no_match(NoMatchReason::InvalidQuery);
        }
        let homogeneous = all_same(&query.inputs);
        let slots: Vec<Slot> = Slot::inputs(0..arity).chain([Slot::Output(0)]).collect();

        scan_slots(candidates, query, &slots, weights, |candidate| {
            candidate.inputs().len() == arity && passes_homogeneity_gate(homogeneous, candidate)
        })
    }
}

/// Input 0 divided into a variable number of outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitStrategy;

impl MatchStrategy for SplitStrategy {
    fn name(&self) -> &str {
        "split"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        let arity = query.outputs.len();
        if arity == 0 {
            return MatchResult::no_match(NoMatchReason::InvalidQuery);
        }
        let homogeneous = all_same(&query.outputs);
        let slots: Vec<Slot> = Slot::outputs(0..arity).chain([Slot::Input(0)]).collect();

        scan_slots(candidates, query, &slots, weights, |candidate| {
            candidate.outputs().len() == arity && passes_homogeneity_gate(homogeneous, candidate)
        })
    }
}

/// Data, starts, ends and axes inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SliceStrategy;

impl MatchStrategy for SliceStrategy {
    fn name(&self) -> &str {
        "slice"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        if query.inputs.len() < 4 {
            return MatchResult::no_match(NoMatchReason::InvalidQuery);
        }
        let slots: Vec<Slot> = Slot::inputs(0..4).chain([Slot::Output(0)]).collect();
        scan_slots(candidates, query, &slots, weights, |_| true)
    }
}

/// Broadcasting elementwise operators with two inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryElementwiseStrategy;

/// Scalar constants are sometimes exported without a shape.
fn scalar_as_unit(shape: &Shape) -> Cow<'_, Shape> {
    if shape.is_empty() {
        Cow::Owned(vec![1])
    } else {
        Cow::Borrowed(shape)
    }
}

impl MatchStrategy for BinaryElementwiseStrategy {
    fn name(&self) -> &str {
        "binary-elementwise"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        let (Some(lhs), Some(rhs), Some(out)) = (query.input(0), query.input(1), query.output(0)) else {
            return MatchResult::no_match(NoMatchReason::InvalidQuery);
        };
        let lhs = scalar_as_unit(lhs);
        let rhs = scalar_as_unit(rhs);

        // Two single-element operands are computed on the host.
        if lhs.as_slice() == [1] && rhs.as_slice() == [1] {
            return MatchResult::OffDevice;
        }

        let full = full_score(&lhs, weights) + full_score(&rhs, weights) + full_score(out, weights);
        best_candidate(candidates, full, |candidate| {
            let their_lhs = scalar_as_unit(candidate.input(0)?);
            let their_rhs = scalar_as_unit(candidate.input(1)?);
            let their_out = candidate.output(0)?;
            Some(
                similarity(&lhs, &their_lhs, weights)
                    + similarity(&rhs, &their_rhs, weights)
                    + similarity(out, their_out, weights),
            )
        })
    }
}

/// One input and one output.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnaryElementwiseStrategy;

impl MatchStrategy for UnaryElementwiseStrategy {
    fn name(&self) -> &str {
        "unary-elementwise"
    }

    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult {
        scan_slots(candidates, query, &[Slot::Input(0), Slot::Output(0)], weights, |_| true)
    }
}

/// Operators that only rewrite tensor metadata and never reach the device.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKernelStrategy;

impl MatchStrategy for NoKernelStrategy {
    fn name(&self) -> &str {
        "no-kernel"
    }

    fn find(&self, _: &[RuleLibraryEntry], _: &MatchQuery, _: &ScoreWeights) -> MatchResult {
        MatchResult::OffDevice
    }
}

/// Host/device copies inserted by the runtime; they are not graph operators.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemcpyStrategy;

impl MatchStrategy for MemcpyStrategy {
    fn name(&self) -> &str {
        "memcpy"
    }

    fn find(&self, _: &[RuleLibraryEntry], _: &MatchQuery, _: &ScoreWeights) -> MatchResult {
        MatchResult::no_match(NoMatchReason::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernelscope_core::{Dim3, KernelRecord};

    fn kernels(names: &[&str]) -> Vec<KernelRecord> {
        names
            .iter()
            .map(|name| KernelRecord::new(*name, Dim3::new(8, 1, 1), Dim3::new(256, 1, 1)))
            .collect()
    }

    fn entry(names: &[&str], inputs: Vec<Shape>, outputs: Vec<Shape>) -> RuleLibraryEntry {
        RuleLibraryEntry::new(kernels(names), inputs, outputs).with_source("yolov8n", names.join("+"))
    }

    fn predicted_node(result: &MatchResult) -> &str {
        match result {
            MatchResult::Predicted(prediction) => &prediction.node_name,
            other => panic!("expected a prediction, got {other:?}"),
        }
    }

    #[test]
    fn conv_with_bias_never_matches_bias_free_entries() {
        let library = vec![entry(
            &["implicit_gemm"],
            vec![vec![1, 3, 640, 640], vec![16, 3, 3, 3]],
            vec![vec![1, 16, 320, 320]],
        )];
        let query = MatchQuery::new(
            "Conv",
            "/model.0/conv/Conv",
            vec![vec![1, 3, 640, 640], vec![16, 3, 3, 3], vec![16]],
            vec![vec![1, 16, 320, 320]],
        );
        let result = ConvStrategy.find(&library, &query, &ScoreWeights::default());
        assert_eq!(result.no_match_reason(), Some(NoMatchReason::NoViableCandidate));
    }

    #[test]
    fn conv_prefers_closest_entry() {
        let library = vec![
            entry(&["far"], vec![vec![1, 64, 20, 20], vec![64, 64, 3, 3], vec![64]], vec![vec![1, 64, 20, 20]]),
            entry(&["near"], vec![vec![1, 32, 80, 80], vec![32, 32, 3, 3], vec![32]], vec![vec![1, 32, 80, 80]]),
        ];
        let query = MatchQuery::new(
            "Conv",
            "q",
            vec![vec![1, 32, 40, 40], vec![32, 32, 3, 3], vec![32]],
            vec![vec![1, 32, 40, 40]],
        );
        let result = ConvStrategy.find(&library, &query, &ScoreWeights::default());
        assert_eq!(predicted_node(&result), "near");
        assert!(!result.is_exact());
    }

    #[test]
    fn conv_rejects_non_4d_weight() {
        let query = MatchQuery::new("Conv", "q", vec![vec![1, 3, 8], vec![4, 3, 3]], vec![vec![1, 4, 6]]);
        let result = ConvStrategy.find(&[], &query, &ScoreWeights::default());
        assert_eq!(result.no_match_reason(), Some(NoMatchReason::InvalidQuery));
    }

    #[test]
    fn concat_gate_follows_input_homogeneity() {
        let library = vec![
            entry(&["concat_fused"], vec![vec![1, 16, 80, 80], vec![1, 16, 80, 80]], vec![vec![1, 32, 80, 80]]),
            entry(
                &["copy_a", "copy_b"],
                vec![vec![1, 16, 80, 80], vec![1, 32, 80, 80]],
                vec![vec![1, 48, 80, 80]],
            ),
        ];
        let w = ScoreWeights::default();

        let same = MatchQuery::new("Concat", "s", vec![vec![1, 16, 80, 80]; 2], vec![vec![1, 32, 80, 80]]);
        assert_eq!(predicted_node(&ConcatStrategy.find(&library, &same, &w)), "concat_fused");

        let mixed = MatchQuery::new(
            "Concat",
            "m",
            vec![vec![1, 16, 80, 80], vec![1, 16, 40, 40]],
            vec![vec![1, 16, 80, 80]],
        );
        assert_eq!(predicted_node(&ConcatStrategy.find(&library, &mixed, &w)), "copy_a+copy_b");

        let three = MatchQuery::new("Concat", "t", vec![vec![1, 16, 80, 80]; 3], vec![vec![1, 48, 80, 80]]);
        assert_eq!(
            ConcatStrategy.find(&library, &three, &w).no_match_reason(),
            Some(NoMatchReason::NoViableCandidate)
        );
    }

    #[test]
    fn split_requires_same_output_count() {
        let library = vec![entry(
            &["split_kernel"],
            vec![vec![1, 64, 80, 80]],
            vec![vec![1, 32, 80, 80], vec![1, 32, 80, 80]],
        )];
        let w = ScoreWeights::default();
        let query = MatchQuery::new(
            "Split",
            "q",
            vec![vec![1, 64, 80, 80]],
            vec![vec![1, 32, 80, 80], vec![1, 32, 80, 80]],
        );
        let result = SplitStrategy.find(&library, &query, &w);
        assert!(result.is_exact());

        let three = MatchQuery::new("Split", "q", vec![vec![1, 96, 80, 80]], vec![vec![1, 32, 80, 80]; 3]);
        assert_eq!(
            SplitStrategy.find(&library, &three, &w).no_match_reason(),
            Some(NoMatchReason::NoViableCandidate)
        );
    }

    #[test]
    fn split_gate_follows_output_homogeneity() {
        let w = ScoreWeights::default();
        let single = vec![entry(&["split_kernel"], vec![vec![1, 48]], vec![vec![1, 16], vec![1, 32]])];
        let mixed = MatchQuery::new("Split", "m", vec![vec![1, 48]], vec![vec![1, 16], vec![1, 32]]);
        assert_eq!(
            SplitStrategy.find(&single, &mixed, &w).no_match_reason(),
            Some(NoMatchReason::NoViableCandidate)
        );

        let copies = vec![entry(&["copy_a", "copy_b"], vec![vec![1, 64]], vec![vec![1, 32], vec![1, 32]])];
        let same = MatchQuery::new("Split", "s", vec![vec![1, 64]], vec![vec![1, 32], vec![1, 32]]);
        assert_eq!(
            SplitStrategy.find(&copies, &same, &w).no_match_reason(),
            Some(NoMatchReason::NoViableCandidate)
        );
        assert_eq!(predicted_node(&SplitStrategy.find(&copies, &mixed, &w)), "copy_a+copy_b");
    }

    #[test]
    fn slice_matches_on_all_four_inputs() {
        let inputs = vec![vec![1, 64, 80, 80], vec![1], vec![1], vec![1]];
        let library = vec![entry(&["slice_kernel"], inputs.clone(), vec![vec![1, 32, 80, 80]])];
        let query = MatchQuery::new("Slice", "q", inputs, vec![vec![1, 32, 80, 80]]);
        let result = SliceStrategy.find(&library, &query, &ScoreWeights::default());
        assert_eq!(predicted_node(&result), "slice_kernel");
        assert!(result.is_exact());
    }

    #[test]
    fn slice_needs_four_inputs() {
        let query = MatchQuery::new("Slice", "q", vec![vec![1, 8], vec![1], vec![1]], vec![vec![1, 4]]);
        let result = SliceStrategy.find(&[], &query, &ScoreWeights::default());
        assert_eq!(result.no_match_reason(), Some(NoMatchReason::InvalidQuery));
    }

    #[test]
    fn binary_on_two_scalars_runs_off_device() {
        let library = vec![entry(&["mul"], vec![vec![1, 8], vec![1]], vec![vec![1, 8]])];
        let query = MatchQuery::new("Mul", "q", vec![vec![], vec![1]], vec![vec![1]]);
        let result = BinaryElementwiseStrategy.find(&library, &query, &ScoreWeights::default());
        assert_eq!(result, MatchResult::OffDevice);
    }

    #[test]
    fn binary_normalizes_empty_shapes_on_both_sides() {
        let library = vec![entry(&["div"], vec![vec![1, 8], vec![]], vec![vec![1, 8]])];
        let query = MatchQuery::new("Div", "q", vec![vec![1, 8], vec![1]], vec![vec![1, 8]]);
        let result = BinaryElementwiseStrategy.find(&library, &query, &ScoreWeights::default());
        assert!(result.is_exact());
        assert_eq!(library[0].input(1), Some(&Vec::new()));
    }

    #[test]
    fn unary_without_entries_has_no_candidates() {
        let query = MatchQuery::new("Sigmoid", "q", vec![vec![1, 8]], vec![vec![1, 8]]);
        let result = UnaryElementwiseStrategy.find(&[], &query, &ScoreWeights::default());
        assert_eq!(result.no_match_reason(), Some(NoMatchReason::NoCandidates));
    }

    #[test]
    fn fixed_outcome_strategies() {
        let query = MatchQuery::new("Reshape", "q", vec![vec![4]], vec![vec![2, 2]]);
        let w = ScoreWeights::default();
        assert_eq!(NoKernelStrategy.find(&[], &query, &w), MatchResult::OffDevice);
        assert_eq!(
            MemcpyStrategy.find(&[], &query, &w).no_match_reason(),
            Some(NoMatchReason::Unsupported)
        );
    }
}
