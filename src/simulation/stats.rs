//! Interval and significance helpers for simulation results.

/// z-score for a two-sided 95% interval.
pub const Z_95: f64 = 1.96;
/// z-score used for every other confidence level (90%).
pub const Z_90: f64 = 1.645;

/// Absorbs float noise so exact thousandths are not pushed a step outward.
const ROUNDING_EPSILON: f64 = 1e-9;

/// Round half away from zero to 3 decimals.
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn floor3(x: f64) -> f64 {
    (x * 1000.0 + ROUNDING_EPSILON).floor() / 1000.0
}

fn ceil3(x: f64) -> f64 {
    (x * 1000.0 - ROUNDING_EPSILON).ceil() / 1000.0
}

/// Wald (normal approximation) interval for a proportion `p` observed in
/// `n` samples, clamped to `[0, 1]`.
///
/// The lower bound is rounded down and the upper bound up to 3 decimals, so
/// the interval always contains `p` and never narrows as `n` shrinks.
/// `n == 0` yields `(0, 0)`.
pub fn confidence_interval(p: f64, n: usize, confidence_level: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let z = if (confidence_level - 0.95).abs() < 1e-9 {
        Z_95
    } else {
        Z_90
    };
    let margin = z * (p * (1.0 - p) / n as f64).sqrt();
    let lower = (p - margin).max(0.0);
    let upper = (p + margin).min(1.0);
    (floor3(lower), ceil3(upper))
}

/// Heuristic significance: `min(1, n / 1000) * (max share - min share)`,
/// or 0 for empty distributions and samples under 30.
pub fn statistical_significance<I>(shares: I, n: usize) -> f64
where
    I: IntoIterator<Item = f64>,
{
    if n < 30 {
        return 0.0;
    }
    let mut iter = shares.into_iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (min, max) = iter.fold((first, first), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let size_factor = (n as f64 / 1000.0).min(1.0);
    round3(size_factor * (max - min))
}
