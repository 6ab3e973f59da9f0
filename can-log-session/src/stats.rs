//! Summary statistics

use serde::Serialize;
use std::fmt;

/// Count, extremes, mean and sample standard deviation of a column
///
/// NaN values are ignored. With no finite samples every statistic except
/// `count` is NaN; with one sample `std` is NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Self {
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let count = present.len();
        if count == 0 {
            return Self {
                count,
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                std: f64::NAN,
            };
        }

        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = present.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let squares: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        } else {
            f64::NAN
        };

        Self {
            count,
            min,
            max,
            mean,
            std,
        }
    }

    /// `max - min`
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "count  {}", self.count)?;
        writeln!(f, "mean   {:.6}", self.mean)?;
        writeln!(f, "std    {:.6}", self.std)?;
        writeln!(f, "min    {:.6}", self.min)?;
        write!(f, "max    {:.6}", self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_speed_stats() {
        let stats = SummaryStats::from_values(&[600.0, 650.0, 700.0, 1000.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 600.0);
        assert_eq!(stats.max, 1000.0);
        assert_eq!(stats.mean, 737.5);
        assert_eq!(stats.spread(), 400.0);
        assert!((stats.std - (96875.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_nan_is_ignored() {
        let stats = SummaryStats::from_values(&[f64::NAN, 2.0, 4.0]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 3.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty = SummaryStats::from_values(&[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());
        assert!(empty.spread().is_nan());

        let single = SummaryStats::from_values(&[5.0]);
        assert_eq!(single.spread(), 0.0);
        assert!(single.std.is_nan());
    }

    #[test]
    fn test_display() {
        let text = SummaryStats::from_values(&[1.0, 3.0]).to_string();
        assert!(text.starts_with("count  2"));
        assert!(text.contains("mean   2.000000"));
    }
}
