//! Log-domain helpers shared by the samplers and scores.

use special::Gamma as SpecialGamma;

/// `ln Γ(x)`
#[inline]
pub fn ln_gamma(x: f64) -> f64 {
    SpecialGamma::ln_gamma(x).0
}

/// `ln(exp(log_a) + exp(log_b))` without overflow.
#[inline]
pub fn log_sum(log_a: f64, log_b: f64) -> f64 {
    let (hi, lo) = if log_a < log_b {
        (log_b, log_a)
    } else {
        (log_a, log_b)
    };
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Sample an index from unnormalized log-probabilities by inverse CDF.
///
/// * `log_pr` - unnormalized log weights
/// * `u` - a draw from Uniform(0,1)
///
/// Weights are shifted by their maximum before exponentiating. If no
/// weight is finite the draw falls back to a uniform index.
pub fn sample_from_log_pr(log_pr: &[f64], u: f64) -> usize {
    debug_assert!(!log_pr.is_empty());
    let n = log_pr.len();

    let max = log_pr.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return ((u * n as f64) as usize).min(n - 1);
    }

    let total: f64 = log_pr.iter().map(|lp| (lp - max).exp()).sum();
    let mut cum = 0.0;
    for (k, lp) in log_pr.iter().enumerate() {
        cum += (lp - max).exp() / total;
        if u < cum {
            return k;
        }
    }
    n - 1
}
