//! Discrete distributions used for abundance and overlap tests.
use statrs::function::beta::{beta_reg, ln_beta};
use statrs::function::erf::erfc;
use statrs::function::factorial::ln_binomial;
use statrs::function::gamma::ln_gamma;

/// Default lower bound for [`beta_binomial_p_value_fast`].
pub const BETA_BINOMIAL_P_FLOOR: f64 = 1e-10;

/// Probability of exactly `k` successes in `n` trials with success rate `p`.
pub fn binomial_pdf(k: u64, n: u64, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    (ln_binomial(n, k) + (n - k) as f64 * (1.0 - p).ln() + k as f64 * p.ln()).exp()
}

/// Probability of at most `k` successes in `n` trials with success rate `p`.
pub fn binomial_cdf(k: u64, n: u64, p: f64) -> f64 {
    if k >= n {
        return 1.0;
    }
    if p <= 0.0 {
        return 1.0;
    }
    if p >= 1.0 {
        return 0.0;
    }
    beta_reg((n - k) as f64, (k + 1) as f64, 1.0 - p)
}

/// Upper-tail mid-p value of observing `k` successes: `P(X > k) + P(X = k) / 2`.
pub fn binomial_p_value(k: u64, n: u64, p: f64) -> f64 {
    1.0 - binomial_cdf(k, n, p) + 0.5 * binomial_pdf(k, n, p)
}

/// Beta-binomial probability mass at `k` for `n` trials.
pub fn beta_binomial_pdf(k: u64, n: u64, alpha: f64, beta: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    let (kf, nf) = (k as f64, n as f64);
    ((ln_beta(kf + alpha, nf - kf + beta) - ln_beta(alpha, beta))
        + (ln_gamma(nf + 1.0) - ln_gamma(kf + 1.0) - ln_gamma(nf - kf + 1.0)))
    .exp()
}

/// Beta-binomial probability of strictly fewer than `k` successes, capped at 1.
pub fn beta_binomial_cdf(k: u64, n: u64, alpha: f64, beta: f64) -> f64 {
    let sum: f64 = (0..k).map(|i| beta_binomial_pdf(i, n, alpha, beta)).sum();
    sum.min(1.0)
}

/// Upper-tail mid-p value of the beta-binomial distribution. The summation stops
/// early once the remaining mass drops to `floor`, which is then returned.
pub fn beta_binomial_p_value_fast(k: u64, n: u64, alpha: f64, beta: f64, floor: f64) -> f64 {
    let mut sum = 1.0 + 0.5 * beta_binomial_pdf(k, n, alpha, beta);
    for i in 0..k {
        sum -= beta_binomial_pdf(i, n, alpha, beta);
        if sum <= floor {
            return floor;
        }
    }
    sum
}

/// Cumulative distribution function of the normal distribution.
pub fn normal_cdf(x: f64, mean: f64, sd: f64) -> f64 {
    let dev = x - mean;
    if dev.abs() > 40.0 * sd {
        return if dev < 0.0 { 0.0 } else { 1.0 };
    }
    0.5 * erfc(-dev / (sd * std::f64::consts::SQRT_2))
}

/// Mid-p cumulative probability of an overlap of `n12` elements between sets of
/// size `n1` and `n2` drawn from a universe of `total` elements.
///
/// Returns `None` when `n12` lies outside the support of the distribution.
pub fn hypergeometric_cdf(n12: u64, n1: u64, n2: u64, total: u64) -> Option<f64> {
    let lo = (n1 + n2).saturating_sub(total);
    let hi = n1.min(n2);
    if n12 < lo || n12 > hi {
        return None;
    }

    // terms are scaled by the probability at `lo`
    let mut p_prev = 1.0;
    let mut t = p_prev;
    let mut s = p_prev;
    for i in (lo + 1)..=hi {
        p_prev *= ((n1 - i + 1) as f64 * (n2 - i + 1) as f64)
            / i as f64
            / (total + i - n1 - n2) as f64;
        t += p_prev;
        if i == n12 {
            s = t - 0.5 * p_prev;
        }
    }
    Some(s / t)
}

/// Two-sided overlap p-value, `min(cdf, 1 - cdf)`.
pub fn hypergeometric_p_value(n12: u64, n1: u64, n2: u64, total: u64) -> Option<f64> {
    hypergeometric_cdf(n12, n1, n2, total).map(|p| p.min(1.0 - p))
}
