use super::AnalysisError;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f64 = 1e-12;

/// A BAR free energy estimate in reduced units (multiples of kT).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarEstimate {
    pub delta_f: f64,
    pub uncertainty: f64,
}

/// `ln(1 + e^x)` without overflow.
fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

fn log_sum_exp(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Log of the Fermi function `1 / (1 + e^x)`.
fn log_fermi(x: f64) -> f64 {
    -softplus(x)
}

/// Difference of the two sides of the self-consistent BAR equation at `delta_f`;
/// monotonically increasing in `delta_f`.
fn imbalance(w_f: &[f64], w_r: &[f64], m: f64, delta_f: f64) -> f64 {
    let numerator = log_sum_exp(w_f.iter().map(|w| log_fermi(m + w - delta_f)));
    let denominator = log_sum_exp(w_r.iter().map(|w| log_fermi(-m + w + delta_f)));
    numerator - denominator
}

/// Bennett acceptance ratio estimate from forward and reverse work values, both
/// in units of kT.
///
/// `w_f` holds `beta * (U_1 - U_0)` sampled in state 0 and `w_r` holds
/// `beta * (U_0 - U_1)` sampled in state 1.
pub fn bar(w_f: &[f64], w_r: &[f64]) -> Result<BarEstimate, AnalysisError> {
    if w_f.is_empty() {
        return Err(AnalysisError::EmptySamples("forward"));
    }
    if w_r.is_empty() {
        return Err(AnalysisError::EmptySamples("reverse"));
    }
    if !w_f.iter().chain(w_r).all(|w| w.is_finite()) {
        return Err(AnalysisError::NonFiniteSamples);
    }

    let t_f = w_f.len() as f64;
    let t_r = w_r.len() as f64;
    let m = (t_f / t_r).ln();

    let lo_seed = w_f
        .iter()
        .copied()
        .chain(w_r.iter().map(|w| -w))
        .fold(f64::INFINITY, f64::min);
    let hi_seed = w_f
        .iter()
        .copied()
        .chain(w_r.iter().map(|w| -w))
        .fold(f64::NEG_INFINITY, f64::max);
    let (mut lo, mut hi) = (lo_seed - 1.0, hi_seed + 1.0);

    let mut iterations = 0;
    while imbalance(w_f, w_r, m, lo) > 0.0 {
        lo -= (hi - lo).max(1.0);
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(AnalysisError::Convergence { iterations });
        }
    }
    while imbalance(w_f, w_r, m, hi) < 0.0 {
        hi += (hi - lo).max(1.0);
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(AnalysisError::Convergence { iterations });
        }
    }

    let mut delta_f = 0.5 * (lo + hi);
    for _ in 0..MAX_ITERATIONS {
        delta_f = 0.5 * (lo + hi);
        if hi - lo < TOLERANCE {
            break;
        }
        if imbalance(w_f, w_r, m, delta_f) < 0.0 {
            lo = delta_f;
        } else {
            hi = delta_f;
        }
    }

    Ok(BarEstimate {
        delta_f,
        uncertainty: bennett_uncertainty(w_f, w_r, m, delta_f),
    })
}

/// Asymptotic standard deviation of the BAR estimate (Bennett 1976, eq. 10a with
/// the corrected second denominator).
fn bennett_uncertainty(w_f: &[f64], w_r: &[f64], m: f64, delta_f: f64) -> f64 {
    let relative_second_moment = |log_f: Vec<f64>| -> f64 {
        let n = (log_f.len() as f64).ln();
        let log_mean = log_sum_exp(log_f.iter().copied()) - n;
        let log_mean_sq = log_sum_exp(log_f.iter().map(|l| 2.0 * l)) - n;
        (log_mean_sq - 2.0 * log_mean).exp()
    };

    let t_f = w_f.len() as f64;
    let t_r = w_r.len() as f64;
    let ratio_f = relative_second_moment(w_f.iter().map(|w| log_fermi(m + w - delta_f)).collect());
    let ratio_r = relative_second_moment(w_r.iter().map(|w| log_fermi(-m + w + delta_f)).collect());

    let variance = ratio_f / t_f + ratio_r / t_r - (1.0 / t_f + 1.0 / t_r);
    variance.max(0.0).sqrt()
}
