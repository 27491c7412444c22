//! Shape similarity scoring.

use serde::{Deserialize, Serialize};

/// Weights of the per-dimension and total-size terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Multiplier on the ratio of two differing dimensions. Must not exceed 1
    /// so a differing dimension never outscores an equal one.
    pub difference: f64,
    pub total_size: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            difference: 1.0,
            total_size: 2.0,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.difference > 0.0 && self.difference <= 1.0) {
            return Err(format!(
                "difference weight must be in (0, 1], got {}",
                self.difference
            ));
        }
        if !(self.total_size > 0.0) || !self.total_size.is_finite() {
            return Err(format!(
                "total size weight must be positive, got {}",
                self.total_size
            ));
        }
        Ok(())
    }
}

/// min/max ratio of two magnitudes. Equal values give 1; a zero or a sign
/// change on one side gives 0.
pub fn ratio(a: f64, b: f64) -> f64 {
    if a == b {
        return 1.0;
    }
    if a == 0.0 || b == 0.0 || a.signum() != b.signum() {
        return 0.0;
    }
    let (a, b) = (a.abs(), b.abs());
    a.min(b) / a.max(b)
}

fn volume(shape: &[i64]) -> f64 {
    shape.iter().map(|&d| d as f64).product()
}

/// Score `candidate` against `query`.
///
/// Equal-rank shapes earn 1 per equal dimension, `difference · ratio` per
/// differing one, and `total_size · ratio` on the element counts. Shapes of
/// different rank only earn the total-size term.
pub fn similarity(query: &[i64], candidate: &[i64], weights: &ScoreWeights) -> f64 {
    let size_term = weights.total_size * ratio(volume(query), volume(candidate));
    if query.len() != candidate.len() {
        return size_term;
    }

    let dims: f64 = query
        .iter()
        .zip(candidate)
        .map(|(&q, &c)| {
            if q == c {
                1.0
            } else {
                weights.difference * ratio(q as f64, c as f64)
            }
        })
        .sum();
    dims + size_term
}

/// Score a shape that matches itself exactly.
pub fn full_score(shape: &[i64], weights: &ScoreWeights) -> f64 {
    shape.len() as f64 + weights.total_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn reference_weights_are_valid() {
        assert!(ScoreWeights::default().validate().is_ok());
        let bad = ScoreWeights {
            difference: 1.5,
            ..ScoreWeights::default()
        };
        assert!(bad.validate().is_err());
        let bad = ScoreWeights {
            total_size: 0.0,
            ..ScoreWeights::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn differing_dimension_scores_its_ratio() {
        let w = ScoreWeights::default();
        // 3 equal dims, 1 dim at ratio 0.5, volume ratio 0.5
        let score = similarity(&[1, 16, 80, 80], &[1, 32, 80, 80], &w);
        assert_abs_diff_eq!(score, 3.0 + 0.5 + 2.0 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn rank_mismatch_keeps_only_size_term() {
        let w = ScoreWeights::default();
        let score = similarity(&[2, 8], &[16], &w);
        assert_abs_diff_eq!(score, 2.0);
    }

    #[test]
    fn zero_against_nonzero_is_zero_ratio() {
        assert_eq!(ratio(0.0, 4.0), 0.0);
        assert_eq!(ratio(4.0, 0.0), 0.0);
        assert_eq!(ratio(0.0, 0.0), 1.0);
        assert_eq!(ratio(-1.0, 4.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_equal_shapes_reach_full_score(
            shape in proptest::collection::vec(1i64..4096, 0..6),
            difference in 0.01f64..=1.0,
            total_size in 0.1f64..10.0,
        ) {
            let w = ScoreWeights { difference, total_size };
            prop_assert_eq!(similarity(&shape, &shape, &w), full_score(&shape, &w));
        }

        #[test]
        fn prop_score_never_exceeds_full(
            a in proptest::collection::vec(1i64..512, 1..5),
            b in proptest::collection::vec(1i64..512, 1..5),
        ) {
            let w = ScoreWeights::default();
            prop_assert!(similarity(&a, &b, &w) <= full_score(&a, &w) + 1e-9);
        }
    }
}
