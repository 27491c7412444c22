/// Agreement between a predicted and a measured quantity, in [0, 1].
///
/// Equal values score 1 (including two zeros). A zero on exactly one side
/// scores 0. Otherwise the smaller value over the larger.
pub fn ratio_accuracy(predicted: f64, real: f64) -> f64 {
    if predicted == real {
        return 1.0;
    }
    if predicted == 0.0 || real == 0.0 {
        return 0.0;
    }
    (predicted / real).min(real / predicted).clamp(0.0, 1.0)
}

/// Arithmetic mean; `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
