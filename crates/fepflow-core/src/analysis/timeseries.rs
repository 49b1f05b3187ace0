/// Shortest lag always included in the autocorrelation sum, even when the
/// correlation function has already turned negative.
const MIN_CORRELATION_TIME: usize = 3;

/// Statistical inefficiency `g = 1 + 2 tau` of a time series.
///
/// The normalized autocorrelation function is summed lag by lag until it first
/// drops to zero or below (after [`MIN_CORRELATION_TIME`] lags). Series that are
/// too short or have zero variance report `g = 1`.
pub fn statistical_inefficiency(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 1.0;
    }

    let mean = series.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = series.iter().map(|x| x - mean).collect();
    let variance = centered.iter().map(|d| d * d).sum::<f64>() / n as f64;
    if variance <= 0.0 {
        return 1.0;
    }

    let mut g = 1.0;
    let mut t = 1;
    while t < n - 1 {
        let lagged: f64 = centered[..n - t]
            .iter()
            .zip(&centered[t..])
            .map(|(a, b)| a * b)
            .sum();
        let correlation = lagged / ((n - t) as f64 * variance);
        if correlation <= 0.0 && t > MIN_CORRELATION_TIME {
            break;
        }
        g += 2.0 * correlation * (1.0 - t as f64 / n as f64);
        t += 1;
    }

    g.max(1.0)
}

/// Indices of approximately uncorrelated samples, spaced `g` apart.
pub fn subsample_indices(len: usize, g: f64) -> Vec<usize> {
    let g = if g.is_finite() && g >= 1.0 { g } else { 1.0 };
    let mut indices: Vec<usize> = Vec::new();
    let mut n = 0usize;
    loop {
        let t = (n as f64 * g).round_ties_even() as usize;
        if t >= len {
            break;
        }
        if indices.last() != Some(&t) {
            indices.push(t);
        }
        n += 1;
    }
    indices
}

/// Subsamples `series` by its own statistical inefficiency.
///
/// Returns the retained samples and the inefficiency used.
pub fn decorrelate(series: &[f64]) -> (Vec<f64>, f64) {
    let g = statistical_inefficiency(series);
    let samples = subsample_indices(series.len(), g)
        .into_iter()
        .map(|i| series[i])
        .collect();
    (samples, g)
}
