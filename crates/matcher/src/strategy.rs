//! The per-operator-type matching seam and the candidate scan shared by strategies.

use crate::query::{MatchQuery, MatchResult, Prediction};
use crate::score::{full_score, similarity, ScoreWeights};
use kernelscope_core::{NoMatchReason, Shape};
use kernelscope_library::RuleLibraryEntry;
use std::sync::Arc;

/// Picks the best historical kernel sequence for one family of operator types.
///
/// Implementations must be pure over their arguments; the library slice is
/// shared by every query of a run.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `candidates` holds every library entry of the query's operator type
    /// and is empty when the library never observed that type.
    fn find(
        &self,
        candidates: &[RuleLibraryEntry],
        query: &MatchQuery,
        weights: &ScoreWeights,
    ) -> MatchResult;
}

pub type DynMatchStrategy = Arc<dyn MatchStrategy>;

/// A shape position compared between query and candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Input(usize),
    Output(usize),
}

impl Slot {
    pub fn inputs(range: std::ops::Range<usize>) -> impl Iterator<Item = Slot> {
        range.map(Slot::Input)
    }

    pub fn outputs(range: std::ops::Range<usize>) -> impl Iterator<Item = Slot> {
        range.map(Slot::Output)
    }

    pub fn of_query(self, query: &MatchQuery) -> Option<&Shape> {
        match self {
            Slot::Input(idx) => query.input(idx),
            Slot::Output(idx) => query.output(idx),
        }
    }

    pub fn of_entry(self, entry: &RuleLibraryEntry) -> Option<&Shape> {
        match self {
            Slot::Input(idx) => entry.input(idx),
            Slot::Output(idx) => entry.output(idx),
        }
    }
}

/// Best achievable score over `slots`; `None` when the query lacks one of them.
pub fn query_full_score(query: &MatchQuery, slots: &[Slot], weights: &ScoreWeights) -> Option<f64> {
    slots
        .iter()
        .map(|slot| slot.of_query(query).map(|shape| full_score(shape, weights)))
        .sum()
}

/// Summed similarity over `slots`; `None` when the candidate lacks one of them.
pub fn slot_score(
    query: &MatchQuery,
    candidate: &RuleLibraryEntry,
    slots: &[Slot],
    weights: &ScoreWeights,
) -> Option<f64> {
    slots
        .iter()
        .map(|slot| {
            let ours = slot.of_query(query)?;
            let theirs = slot.of_entry(candidate)?;
            Some(similarity(ours, theirs, weights))
        })
        .sum()
}

/// Scan candidates in library order and keep the first highest scorer.
///
/// `score` returns `None` for candidates that are gated out or lack a compared
/// shape. The scan stops at the first candidate reaching `full`.
pub fn best_candidate<F>(candidates: &[RuleLibraryEntry], full: f64, mut score: F) -> MatchResult
where
    F: FnMut(&RuleLibraryEntry) -> Option<f64>,
{
    if candidates.is_empty() {
        return MatchResult::no_match(NoMatchReason::NoCandidates);
    }

    let mut best: Option<(&RuleLibraryEntry, f64)> = None;
    for candidate in candidates {
        let Some(value) = score(candidate) else {
            continue;
        };
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((candidate, value));
            if value >= full {
                break;
            }
        }
    }

    match best {
        Some((entry, value)) => MatchResult::Predicted(Prediction {
            kernels: entry.kernels().to_vec(),
            score: value,
            full_score: full,
            model: entry.model().to_string(),
            node_name: entry.node_name().to_string(),
        }),
        None => MatchResult::no_match(NoMatchReason::NoViableCandidate),
    }
}
