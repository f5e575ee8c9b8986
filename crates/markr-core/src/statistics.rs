//! Descriptive statistics over percentage scores.
//!
//! Scores are normalised against the highest `marks_available` seen for the
//! test, so scans marked out of different totals stay comparable.

use serde::{Deserialize, Serialize};

/// Summary statistics for one test, in percent, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatistics {
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    /// Number of stored results the figures were computed from.
    pub count: usize,
}

impl AggregatedStatistics {
    /// All-zero statistics over `count` results.
    pub fn zeroed(count: usize) -> Self {
        Self {
            mean: 0.0,
            stddev: 0.0,
            min: 0.0,
            max: 0.0,
            p25: 0.0,
            p50: 0.0,
            p75: 0.0,
            count,
        }
    }
}

/// Compute statistics from `(obtained, available)` pairs.
///
/// Returns `None` for an empty input. If every `available` is zero, all
/// figures are zero and only `count` is meaningful.
pub fn summarize(marks: &[(u32, u32)]) -> Option<AggregatedStatistics> {
    if marks.is_empty() {
        return None;
    }

    let overall_available = marks.iter().map(|&(_, available)| available).max()?;
    if overall_available == 0 {
        return Some(AggregatedStatistics::zeroed(marks.len()));
    }

    let mut scores: Vec<f64> = marks
        .iter()
        .map(|&(obtained, _)| percentage(obtained, overall_available))
        .collect();
    scores.sort_by(f64::total_cmp);

    let mean = mean(&scores);
    Some(AggregatedStatistics {
        mean: round1(mean),
        stddev: round1(population_stddev(&scores, mean)),
        min: round1(scores[0]),
        max: round1(scores[scores.len() - 1]),
        p25: round1(percentile(&scores, 25.0)),
        p50: round1(percentile(&scores, 50.0)),
        p75: round1(percentile(&scores, 75.0)),
        count: scores.len(),
    })
}

/// `obtained / available * 100`.
pub fn percentage(obtained: u32, available: u32) -> f64 {
    f64::from(obtained) / f64::from(available) * 100.0
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation around `mean`; 0 for an empty slice.
pub fn population_stddev(data: &[f64], mean: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Linear-interpolation percentile over ascending `sorted` data.
///
/// Rank is `pct / 100 * (n - 1)`; a fractional rank blends the two bracketing
/// values. Returns 0 for an empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                return sorted[lower];
            }
            let weight = rank - lower as f64;
            sorted[lower] * (1.0 - weight) + sorted[upper] * weight
        }
    }
}

/// Round half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_of_values() {
        assert_eq!(mean(&[]), 0.0);
        assert!(close(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0));
        assert!(close(mean(&[1.5, 2.5, 3.5]), 2.5));
    }

    #[test]
    fn population_stddev_divides_by_n() {
        assert_eq!(population_stddev(&[], 0.0), 0.0);
        assert!((population_stddev(&[1.0, 2.0, 3.0, 4.0, 5.0], 3.0) - 1.414).abs() < 1e-3);
        assert!((population_stddev(&[1.0, 2.0, 3.0], 2.0) - 0.816).abs() < 1e-3);
    }

    #[test]
    fn percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(close(percentile(&data, 25.0), 2.0));
        assert!(close(percentile(&data, 50.0), 3.0));
        assert!(close(percentile(&data, 75.0), 4.0));
        assert!(close(percentile(&[1.5, 2.5, 3.5], 50.0), 2.5));
        assert!(close(percentile(&[10.0, 20.0], 25.0), 12.5));
    }

    #[test]
    fn percentile_single_value() {
        for pct in [25.0, 50.0, 75.0] {
            assert_eq!(percentile(&[7.0], pct), 7.0);
        }
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn summarize_three_results() {
        let stats = summarize(&[(8, 10), (9, 10), (7, 10)]).unwrap();
        assert_eq!(
            stats,
            AggregatedStatistics {
                mean: 80.0,
                stddev: 8.2,
                min: 70.0,
                max: 90.0,
                p25: 75.0,
                p50: 80.0,
                p75: 85.0,
                count: 3,
            }
        );
    }

    #[test]
    fn summarize_single_result() {
        let stats = summarize(&[(13, 20)]).unwrap();
        assert_eq!(stats.count, 1);
        for v in [stats.mean, stats.min, stats.max, stats.p25, stats.p50, stats.p75] {
            assert_eq!(v, 65.0);
        }
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn summarize_uses_test_wide_maximum() {
        // 10/20 and 20/40 both normalise against 40.
        let stats = summarize(&[(10, 20), (20, 40)]).unwrap();
        assert_eq!(stats.min, 25.0);
        assert_eq!(stats.max, 50.0);
    }

    #[test]
    fn summarize_zero_available() {
        assert_eq!(
            summarize(&[(0, 0), (3, 0), (1, 0)]).unwrap(),
            AggregatedStatistics::zeroed(3)
        );
    }

    #[test]
    fn summarize_empty() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn summarize_is_order_independent() {
        let a = summarize(&[(3, 10), (9, 12), (5, 12), (0, 7)]).unwrap();
        let b = summarize(&[(0, 7), (5, 12), (3, 10), (9, 12)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rounding_to_one_decimal() {
        assert_eq!(round1(66.666_666), 66.7);
        assert_eq!(round1(33.333_333), 33.3);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn serializes_with_flat_keys() {
        let json = serde_json::to_value(summarize(&[(13, 20)]).unwrap()).unwrap();
        let keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        for key in ["mean", "stddev", "min", "max", "p25", "p50", "p75", "count"] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(json["count"], 1);
    }
}
