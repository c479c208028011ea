//! Helpers for the sampling-variance test on joint clonotype counts.
use itertools::Itertools;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Offset of the Anscombe variance-stabilizing transform.
pub const ANSCOMBE_OFFSET: f64 = 3.0 / 8.0;

/// Anscombe transform of a read count, `sqrt(count + 3/8)`.
pub fn anscombe(count: u64) -> f64 {
    (count as f64 + ANSCOMBE_OFFSET).sqrt()
}

/// Upper tail `1 - CDF(g)` of a chi-squared distribution with `dof` degrees of
/// freedom. A distribution with zero degrees of freedom carries no evidence and
/// yields 1.
pub fn chi_squared_upper_tail(g: f64, dof: usize) -> f64 {
    match ChiSquared::new(dof as f64) {
        Ok(dist) if dof > 0 => 1.0 - dist.cdf(g.max(0.0)),
        _ => 1.0,
    }
}

/// Rank-based scaling of p-values, applied in place.
///
/// Values are ranked by decreasing p; the value at rank `r` (zero-based) is
/// multiplied by the integer quotient `n / (r + 1)`, then clamped to
/// `[floor, 1]`.
pub fn rank_scale_correction(p_values: &mut [f64], floor: f64) {
    let n = p_values.len();
    let order = (0..n)
        .sorted_by(|&a, &b| p_values[b].total_cmp(&p_values[a]))
        .collect::<Vec<_>>();
    for (rank, idx) in order.into_iter().enumerate() {
        let scale = (n / (rank + 1)) as f64;
        p_values[idx] = (p_values[idx] * scale).min(1.0).max(floor);
    }
}
