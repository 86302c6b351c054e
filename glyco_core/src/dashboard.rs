//! Dashboard snapshot: every metric the front end displays, computed in one
//! pass over a freshly loaded entry list.

use crate::config::DashboardConfig;
use crate::stats::{
    self, CategoryAverages, DailyAverage, MinMax, TimeWindowAverages, Trend, ZoneDistribution,
};
use crate::Entry;
use chrono::NaiveDate;
use serde::Serialize;

/// A windowed average together with the window it covers
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WindowAverage {
    pub days: u32,
    pub average: Option<f64>,
}

/// Spread of readings over one window
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WindowSpread {
    pub days: u32,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
}

/// Everything shown on the statistics screen
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub today: NaiveDate,
    pub total_entries: usize,
    pub averages: Vec<WindowAverage>,
    pub by_time_window: TimeWindowAverages,
    pub by_category: CategoryAverages,
    pub spreads: Vec<WindowSpread>,
    /// Zone shares over the 30-day score window
    pub distribution: ZoneDistribution,
    pub trend: Trend,
    pub glyco_score: u8,
    pub estimated_a1c: Option<f64>,
    /// Short-window daily series for charting
    pub daily: Vec<DailyAverage>,
}

impl DashboardSummary {
    pub fn compute(entries: &[Entry], today: NaiveDate, config: &DashboardConfig) -> Self {
        let average = |days| WindowAverage {
            days,
            average: stats::average_over_last_n_days(entries, days, today),
        };
        let spread = |days| {
            let MinMax { min, max } = stats::min_max_over_last_n_days(entries, days, today);
            WindowSpread {
                days,
                min,
                max,
                std_dev: stats::std_dev_over_last_n_days(entries, days, today),
            }
        };

        let long_average = average(config.long_window_days);

        let summary = Self {
            today,
            total_entries: entries.len(),
            averages: vec![
                average(config.short_window_days),
                average(config.medium_window_days),
                long_average,
            ],
            by_time_window: stats::average_by_time_window(entries),
            by_category: stats::average_by_category(entries),
            spreads: vec![spread(config.short_window_days), spread(config.long_window_days)],
            distribution: stats::distribution(entries, Some(stats::SCORE_WINDOW_DAYS), today),
            trend: stats::trend_from_last_n(entries, config.trend_points),
            glyco_score: stats::glyco_score(entries, today),
            estimated_a1c: stats::estimate_a1c(long_average.average),
            daily: stats::daily_averages(entries, config.short_window_days, today),
        };

        tracing::debug!(
            "Computed dashboard over {} entries (score {})",
            summary.total_entries,
            summary.glyco_score
        );
        summary
    }
}
