//! Moments and percentiles

/// Arithmetic mean, 0 for an empty slice
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n - 1 denominator), 0 below two observations
pub fn variance(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64
}

/// Sample standard deviation
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Root-mean-square of shortfalls below `threshold`, over all observations
pub fn downside_deviation(data: &[f64], threshold: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = data
        .iter()
        .map(|x| (x - threshold).min(0.0).powi(2))
        .sum();
    (sum_sq / data.len() as f64).sqrt()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in `[0, 100]`. Returns `None` for empty input.
pub fn percentile(data: &[f64], pct: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Population skewness, 0 when variance vanishes
pub fn skewness(data: &[f64]) -> f64 {
    if data.len() < 3 {
        return 0.0;
    }
    let n = data.len() as f64;
    let m = mean(data);
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    let m3 = data.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    m3 / m2.powf(1.5)
}

/// Excess kurtosis (normal = 0), 0 when variance vanishes
pub fn kurtosis(data: &[f64]) -> f64 {
    if data.len() < 4 {
        return 0.0;
    }
    let n = data.len() as f64;
    let m = mean(data);
    let m2 = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    if m2 <= f64::EPSILON {
        return 0.0;
    }
    let m4 = data.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n;
    m4 / (m2 * m2) - 3.0
}

/// Period-over-period simple returns of a level series.
/// A zero level yields a zero return for the following period.
pub fn simple_returns(levels: &[f64]) -> Vec<f64> {
    levels
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}
