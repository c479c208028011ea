//! rep_stats
//!
//! Numeric constants and small statistical helpers shared by the repertoire crates.
#![deny(missing_docs)]

mod distributions;
mod sampling;
pub use distributions::{
    beta_binomial_cdf, beta_binomial_p_value_fast, beta_binomial_pdf, binomial_cdf,
    binomial_p_value, binomial_pdf, hypergeometric_cdf, hypergeometric_p_value, normal_cdf,
    BETA_BINOMIAL_P_FLOOR,
};
pub use sampling::{anscombe, chi_squared_upper_tail, rank_scale_correction, ANSCOMBE_OFFSET};

/// Precision floor of upstream frequency tables. Added to frequencies before taking
/// logarithms and used to impute the frequency of a clonotype absent from a sample.
pub const JITTER: f64 = 1e-9;

/// `log10(JITTER)`.
pub const JITTER_LOG10: f64 = -9.0;

/// Geometric mean of `values`, each shifted by [`JITTER`].
///
/// Returns 0 for an empty input.
///
/// # Example
/// ```rust
/// use rep_stats::jittered_geometric_mean;
/// let m = jittered_geometric_mean([0.1, 0.1].into_iter());
/// assert!((m - 0.1).abs() < 1e-8);
/// ```
pub fn jittered_geometric_mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut n = 0;
    let mut log_sum = 0.0;
    for v in values {
        log_sum += (v + JITTER).ln();
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        (log_sum / n as f64).exp()
    }
}

/// Jensen-Shannon divergence (base 2) between two histograms. Each histogram is
/// normalized to unit mass first. Returns `None` when the lengths differ.
pub fn jensen_shannon_divergence(p: &[f64], q: &[f64]) -> Option<f64> {
    if p.len() != q.len() {
        return None;
    }
    let p_sum: f64 = p.iter().sum();
    let q_sum: f64 = q.iter().sum();

    let mut jsd = 0.0;
    for (&pi, &qi) in p.iter().zip(q) {
        let (pi, qi) = (pi / p_sum, qi / q_sum);
        let m = (pi + qi) / 2.0;
        if pi > 0.0 {
            jsd += pi * (pi / m).ln();
        }
        if qi > 0.0 {
            jsd += qi * (qi / m).ln();
        }
    }
    Some(jsd / 2.0 / std::f64::consts::LN_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_log10() {
        assert!((JITTER.log10() - JITTER_LOG10).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean() {
        assert_eq!(jittered_geometric_mean(std::iter::empty()), 0.0);
        let m = jittered_geometric_mean([0.4, 0.1].into_iter());
        assert!((m - 0.2).abs() < 1e-8);
    }

    #[test]
    fn test_jsd() {
        assert_eq!(jensen_shannon_divergence(&[1.0], &[1.0, 2.0]), None);
        let same = jensen_shannon_divergence(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert!(same.abs() < 1e-12);
        let disjoint = jensen_shannon_divergence(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((disjoint - 1.0).abs() < 1e-12);
    }
}
