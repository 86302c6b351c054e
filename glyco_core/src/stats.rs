//! Statistics engine over journal entries.
//!
//! Every function here is pure: it reads a snapshot of entries, never mutates
//! it, and returns a fresh result. Day-windowed functions take `today`
//! explicitly so callers decide what "now" is. Missing data is reported as
//! `None` (or a documented neutral value), never as `NaN` or a panic.
//!
//! Rounding is applied only to the values handed back to callers; composite
//! metrics such as [`glyco_score`] work on unrounded intermediates.

use crate::{Category, Entry};
use chrono::{Days, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Below this reading (g/L) a value counts as hypoglycemia
pub const HYPO_THRESHOLD: f64 = 0.70;
/// Above this reading (g/L) a value counts as hyperglycemia
pub const HYPER_THRESHOLD: f64 = 1.80;
/// Slope magnitude (g/L per reading) beyond which a trend is not flat
pub const TREND_SLOPE_THRESHOLD: f64 = 0.05;
/// Number of recent readings used for the trend by default
pub const DEFAULT_TREND_POINTS: usize = 10;
/// Longest series [`daily_averages`] builds, about ten years of days
pub const MAX_DAILY_POINTS: u32 = 3660;
/// Day window used by the glyco score
pub const SCORE_WINDOW_DAYS: u32 = 30;

// ============================================================================
// Result types
// ============================================================================

/// Mean reading per hour-of-day window
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimeWindowAverages {
    /// 00:00 to 10:59
    pub morning: Option<f64>,
    /// 11:00 to 14:59
    pub midday: Option<f64>,
    /// 15:00 to 20:59
    pub evening: Option<f64>,
    /// 21:00 to 23:59
    pub night: Option<f64>,
}

/// Mean reading per entry category
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CategoryAverages {
    pub morning: Option<f64>,
    pub midday: Option<f64>,
    pub evening: Option<f64>,
    pub other: Option<f64>,
    /// Labels outside the fixed set, each averaged on its own
    pub unknown: BTreeMap<String, Option<f64>>,
}

impl CategoryAverages {
    /// Average for one category; `None` if it has no readings
    pub fn get(&self, category: &Category) -> Option<f64> {
        match category {
            Category::Morning => self.morning,
            Category::Midday => self.midday,
            Category::Evening => self.evening,
            Category::Other => self.other,
            Category::Unknown(label) => self.unknown.get(label).copied().flatten(),
        }
    }
}

/// Lowest and highest reading in a window
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MinMax {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Glycemic zone a reading falls into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Hypo,
    Target,
    Hyper,
}

impl Zone {
    /// Classify a reading; the target zone includes both thresholds
    pub fn classify(glycemia: f64) -> Self {
        if glycemia < HYPO_THRESHOLD {
            Zone::Hypo
        } else if glycemia > HYPER_THRESHOLD {
            Zone::Hyper
        } else {
            Zone::Target
        }
    }
}

/// Whole-percent share of readings per zone
///
/// Each share is rounded on its own, so the three may add up to 99 or 101.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ZoneDistribution {
    pub hypo: u32,
    pub target: u32,
    pub hyper: u32,
}

/// Direction of the recent trend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > TREND_SLOPE_THRESHOLD {
            TrendDirection::Up
        } else if slope < -TREND_SLOPE_THRESHOLD {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }

    /// Arrow glyph for display
    pub fn symbol(self) -> &'static str {
        match self {
            TrendDirection::Up => "↗",
            TrendDirection::Down => "↘",
            TrendDirection::Flat => "→",
        }
    }
}

/// Least-squares slope over the most recent readings
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Trend {
    /// g/L per reading, rounded to 4 decimals
    pub slope: f64,
    pub direction: TrendDirection,
}

impl Trend {
    pub fn flat() -> Self {
        Self {
            slope: 0.0,
            direction: TrendDirection::Flat,
        }
    }
}

/// Mean reading for one calendar day
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub average: Option<f64>,
}

// ============================================================================
// Basic aggregates
// ============================================================================

/// Arithmetic mean of the present, finite values
///
/// Accepts plain `f64` or `Option<f64>` items. Returns `None` when nothing
/// qualifies, never zero.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: Into<Option<f64>>,
{
    let (sum, count) = finite(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Population standard deviation (divides by `n`, not `n - 1`)
///
/// Needs at least two qualifying values.
pub fn std_dev<I>(values: I) -> Option<f64>
where
    I: IntoIterator,
    I::Item: Into<Option<f64>>,
{
    let nums: Vec<f64> = finite(values).collect();
    if nums.len() < 2 {
        return None;
    }
    let m = mean(nums.iter().copied())?;
    let variance = nums.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nums.len() as f64;
    Some(variance.sqrt())
}

fn finite<I>(values: I) -> impl Iterator<Item = f64>
where
    I: IntoIterator,
    I::Item: Into<Option<f64>>,
{
    values
        .into_iter()
        .filter_map(|v| -> Option<f64> { v.into() })
        .filter(|v| v.is_finite())
}

/// Round to a fixed number of decimals for presentation
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round2(value: Option<f64>) -> Option<f64> {
    value.map(|v| round_to(v, 2))
}

// ============================================================================
// Day windows
// ============================================================================

/// First day of the `n`-day window ending on `today`
///
/// `None` for `n == 0`. Windows reaching past the earliest representable
/// date start at [`NaiveDate::MIN`].
pub fn window_start(today: NaiveDate, n: u32) -> Option<NaiveDate> {
    let back = n.checked_sub(1)?;
    Some(
        today
            .checked_sub_days(Days::new(u64::from(back)))
            .unwrap_or(NaiveDate::MIN),
    )
}

/// Entries with a reading whose date lies in `[today - (n - 1), today]`
///
/// Calendar-day granularity: the time of day plays no part. `n == 0` selects
/// nothing.
pub fn filter_last_n_days(entries: &[Entry], n: u32, today: NaiveDate) -> Vec<&Entry> {
    let Some(cutoff) = window_start(today, n) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|e| e.date >= cutoff && e.date <= today && e.reading().is_some())
        .collect()
}

fn readings_last_n_days(entries: &[Entry], n: u32, today: NaiveDate) -> Vec<f64> {
    filter_last_n_days(entries, n, today)
        .into_iter()
        .filter_map(Entry::reading)
        .collect()
}

/// Mean reading over the last `n` days, rounded to 2 decimals
pub fn average_over_last_n_days(entries: &[Entry], n: u32, today: NaiveDate) -> Option<f64> {
    round2(mean(readings_last_n_days(entries, n, today)))
}

/// Lowest and highest reading over the last `n` days
pub fn min_max_over_last_n_days(entries: &[Entry], n: u32, today: NaiveDate) -> MinMax {
    let readings = readings_last_n_days(entries, n, today);
    MinMax {
        min: readings.iter().copied().reduce(f64::min),
        max: readings.iter().copied().reduce(f64::max),
    }
}

/// Standard deviation over the last `n` days, rounded to 2 decimals
pub fn std_dev_over_last_n_days(entries: &[Entry], n: u32, today: NaiveDate) -> Option<f64> {
    round2(std_dev(readings_last_n_days(entries, n, today)))
}

/// One mean per calendar day of the window, oldest day first
///
/// Days without readings are kept with `average: None` so the series always
/// has `days` points, up to [`MAX_DAILY_POINTS`].
pub fn daily_averages(entries: &[Entry], days: u32, today: NaiveDate) -> Vec<DailyAverage> {
    let days = days.min(MAX_DAILY_POINTS);
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for entry in filter_last_n_days(entries, days, today) {
        if let Some(v) = entry.reading() {
            by_day.entry(entry.date).or_default().push(v);
        }
    }

    (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(u64::from(back))))
        .map(|date| {
            let average = by_day.get(&date).and_then(|vals| round2(mean(vals.iter().copied())));
            DailyAverage { date, average }
        })
        .collect()
}

// ============================================================================
// Grouped averages
// ============================================================================

/// Mean reading per hour-of-day window, each rounded to 2 decimals
///
/// Entries stored without a time were resolved to midnight on load and land
/// in the morning window.
pub fn average_by_time_window(entries: &[Entry]) -> TimeWindowAverages {
    let mut morning = Vec::new();
    let mut midday = Vec::new();
    let mut evening = Vec::new();
    let mut night = Vec::new();

    for entry in entries {
        let Some(v) = entry.reading() else { continue };
        match entry.time.hour() {
            0..=10 => morning.push(v),
            11..=14 => midday.push(v),
            15..=20 => evening.push(v),
            _ => night.push(v),
        }
    }

    TimeWindowAverages {
        morning: round2(mean(morning)),
        midday: round2(mean(midday)),
        evening: round2(mean(evening)),
        night: round2(mean(night)),
    }
}

/// Mean reading per category, each rounded to 2 decimals
pub fn average_by_category(entries: &[Entry]) -> CategoryAverages {
    let mut groups: BTreeMap<&Category, Vec<f64>> = BTreeMap::new();
    for entry in entries {
        if let Some(v) = entry.reading() {
            groups.entry(&entry.category).or_default().push(v);
        }
    }

    let mut averages = CategoryAverages::default();
    for (category, values) in groups {
        let avg = round2(mean(values));
        match category {
            Category::Morning => averages.morning = avg,
            Category::Midday => averages.midday = avg,
            Category::Evening => averages.evening = avg,
            Category::Other => averages.other = avg,
            Category::Unknown(label) => {
                averages.unknown.insert(label.clone(), avg);
            }
        }
    }
    averages
}

// ============================================================================
// Distribution, trend, score
// ============================================================================

/// Share of readings per glycemic zone
///
/// With `window_days` set only that many calendar days count; otherwise all
/// entries do. No readings at all reports 0 for every zone.
pub fn distribution(
    entries: &[Entry],
    window_days: Option<u32>,
    today: NaiveDate,
) -> ZoneDistribution {
    let readings: Vec<f64> = match window_days {
        Some(days) => readings_last_n_days(entries, days, today),
        None => entries.iter().filter_map(Entry::reading).collect(),
    };

    if readings.is_empty() {
        return ZoneDistribution::default();
    }

    let (mut hypo, mut target, mut hyper) = (0usize, 0usize, 0usize);
    for v in &readings {
        match Zone::classify(*v) {
            Zone::Hypo => hypo += 1,
            Zone::Target => target += 1,
            Zone::Hyper => hyper += 1,
        }
    }

    let total = readings.len() as f64;
    let pct = |count: usize| (count as f64 / total * 100.0).round() as u32;
    ZoneDistribution {
        hypo: pct(hypo),
        target: pct(target),
        hyper: pct(hyper),
    }
}

/// Linear trend over the `n` most recent readings
///
/// Readings are ordered by date then time (input order breaks ties) and
/// regressed against their position 1..=k. Fewer than three readings in the
/// whole input gives a flat trend.
pub fn trend_from_last_n(entries: &[Entry], n: usize) -> Trend {
    let mut points: Vec<_> = entries
        .iter()
        .filter_map(|e| e.reading().map(|v| (e.timestamp(), v)))
        .collect();
    if points.len() < 3 {
        return Trend::flat();
    }

    points.sort_by_key(|(at, _)| *at);
    let recent = &points[points.len().saturating_sub(n)..];
    if recent.is_empty() {
        return Trend::flat();
    }

    let k = recent.len() as f64;
    let x_mean = (k + 1.0) / 2.0;
    let y_mean = recent.iter().map(|(_, v)| v).sum::<f64>() / k;

    let (num, den) = recent
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, (_, y))| {
            let dx = (i + 1) as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    let slope = if den == 0.0 { 0.0 } else { num / den };
    Trend {
        slope: round_to(slope, 4),
        direction: TrendDirection::from_slope(slope),
    }
}

/// Composite 0 to 100 indicator over the last 30 days
///
/// `0.8 * target% - 10 * std_dev + 20`, clamped then rounded. The standard
/// deviation is used unrounded; without one it counts as 0.
pub fn glyco_score(entries: &[Entry], today: NaiveDate) -> u8 {
    let target = f64::from(distribution(entries, Some(SCORE_WINDOW_DAYS), today).target);
    let sd = std_dev(readings_last_n_days(entries, SCORE_WINDOW_DAYS, today)).unwrap_or(0.0);
    let score = 0.8 * target - 10.0 * sd + 20.0;
    score.clamp(0.0, 100.0).round() as u8
}

/// Estimated HbA1c (%) from an average reading in g/L
///
/// Uses the ADAG relation on mg/dL: `(avg * 100 + 46.7) / 28.7`. A missing or
/// zero average gives `None`.
pub fn estimate_a1c(average_g_per_l: Option<f64>) -> Option<f64> {
    let avg = average_g_per_l.filter(|v| v.is_finite() && *v != 0.0)?;
    let mg_per_dl = avg * 100.0;
    Some(round_to((mg_per_dl + 46.7) / 28.7, 2))
}
