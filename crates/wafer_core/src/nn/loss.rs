use nalgebra::DMatrix;

/// Probability clip used by the cross-entropy
pub const PROB_EPSILON: f32 = 1e-7;

/// Row-wise softmax with max subtraction
pub fn softmax(logits: &DMatrix<f32>) -> DMatrix<f32> {
    let mut out = logits.clone();
    for mut row in out.row_iter_mut() {
        let max = row.max();
        row.apply(|v| *v = (*v - max).exp());
        let sum = row.sum();
        row.apply(|v| *v /= sum);
    }
    out
}

/// Mean categorical cross-entropy and its gradient w.r.t. the logits.
///
/// Returns `(loss, probabilities, d_logits)`.
pub fn softmax_cross_entropy(
    logits: &DMatrix<f32>,
    targets: &DMatrix<f32>,
) -> (f32, DMatrix<f32>, DMatrix<f32>) {
    let probs = softmax(logits);
    let n = logits.nrows().max(1) as f32;
    let loss = -probs
        .zip_map(targets, |p, t| t * p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON).ln())
        .sum()
        / n;
    let grad = (&probs - targets) / n;
    (loss, probs, grad)
}

/// Index of the largest entry per row
pub fn argmax_rows(m: &DMatrix<f32>) -> Vec<usize> {
    m.row_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        })
        .collect()
}
