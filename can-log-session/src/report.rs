//! Reporting hooks run on summary statistics
//!
//! The pipeline computes statistics for a column and hands them to a
//! [`ReportHook`]. Hooks decide whether the result is worth reporting and may
//! produce side effects such as writing a plot.

use crate::plot::render_line_plot;
use crate::stats::SummaryStats;
use crate::table::Table;
use crate::types::Result;
use std::path::PathBuf;

/// What a hook did with a set of statistics
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Nothing to report
    Quiet,
    /// Condition met; `plot` is the written image, if any
    Alert { message: String, plot: Option<PathBuf> },
}

impl ReportOutcome {
    pub fn is_alert(&self) -> bool {
        matches!(self, ReportOutcome::Alert { .. })
    }
}

pub trait ReportHook {
    fn on_stats(&mut self, table: &Table, column: &str, stats: &SummaryStats) -> Result<ReportOutcome>;
}

/// Alerts and plots when a column's range (`max - min`) exceeds a threshold
#[derive(Debug, Clone)]
pub struct SpreadAlert {
    pub threshold: f64,
    pub output_dir: PathBuf,
}

impl SpreadAlert {
    pub fn new(threshold: f64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            threshold,
            output_dir: output_dir.into(),
        }
    }

    /// `signal_<column>.png` inside the output directory
    pub fn plot_path(&self, column: &str) -> PathBuf {
        self.output_dir.join(format!("signal_{}.png", column))
    }
}

impl ReportHook for SpreadAlert {
    fn on_stats(&mut self, table: &Table, column: &str, stats: &SummaryStats) -> Result<ReportOutcome> {
        let spread = stats.spread();
        if spread.is_nan() || spread <= self.threshold {
            log::debug!(
                "{}: spread {} within threshold {}",
                column,
                spread,
                self.threshold
            );
            return Ok(ReportOutcome::Quiet);
        }

        let path = self.plot_path(column);
        render_line_plot(table, column, &path)?;

        Ok(ReportOutcome::Alert {
            message: format!(
                "Filtered {} max difference of {} is above {}",
                column, spread, self.threshold
            ),
            plot: Some(path),
        })
    }
}
