use crate::domain::models::{weekday_name, CoverageRange, DAYS_PER_WEEK, MINUTES_PER_DAY};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayRanges {
    pub day: u8,
    pub day_name: String,
    /// `HH:MM-HH:MM` labels in start order.
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekSummary {
    pub block_count: usize,
    pub covered_minutes: u32,
    pub uncovered_minutes: u32,
    pub days: Vec<DayRanges>,
}

impl WeekSummary {
    pub fn from_coverage(coverage: &[CoverageRange]) -> Self {
        let covered_minutes: u32 = coverage.iter().map(CoverageRange::duration_minutes).sum();
        let week_minutes = u32::from(DAYS_PER_WEEK) * MINUTES_PER_DAY;

        let days = (0..DAYS_PER_WEEK)
            .filter_map(|day| {
                let mut ranges = coverage
                    .iter()
                    .filter(|range| range.day == day)
                    .collect::<Vec<_>>();
                if ranges.is_empty() {
                    return None;
                }
                ranges.sort_by_key(|range| range.start_minute);
                Some(DayRanges {
                    day,
                    day_name: weekday_name(day).unwrap_or("Unknown").to_string(),
                    ranges: ranges
                        .into_iter()
                        .map(|range| format!("{}-{}", range.start_time(), range.end_time()))
                        .collect(),
                })
            })
            .collect();

        Self {
            block_count: coverage.len(),
            covered_minutes,
            uncovered_minutes: week_minutes.saturating_sub(covered_minutes),
            days,
        }
    }

    pub fn covered_hours(&self) -> f64 {
        round_tenth(f64::from(self.covered_minutes) / 60.0)
    }

    pub fn uncovered_hours(&self) -> f64 {
        round_tenth(f64::from(self.uncovered_minutes) / 60.0)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
