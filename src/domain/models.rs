use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DAYS_PER_WEEK: u8 = 7;
pub const SLOTS_PER_DAY: u8 = 48;
pub const SLOT_MINUTES: u32 = 30;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Wire value for a range that runs to the end of the day. Ranges never roll into `24:00`.
pub const END_OF_DAY_LABEL: &str = "23:59";
pub const END_OF_DAY_MINUTES: u32 = 23 * 60 + 59;

const DAY_NAMES: [&str; DAYS_PER_WEEK as usize] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    Busy,
    Availability,
}

impl ScheduleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::Availability => "availability",
        }
    }

    pub fn covered_label(self) -> &'static str {
        match self {
            Self::Busy => "Busy",
            Self::Availability => "Available",
        }
    }

    pub fn uncovered_label(self) -> &'static str {
        match self {
            Self::Busy => "Free",
            Self::Availability => "Not available",
        }
    }

    /// Collection name of this mode's records on the remote store.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Busy => "busy-times",
            Self::Availability => "availabilities",
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "busy" => Ok(Self::Busy),
            "availability" | "available" => Ok(Self::Availability),
            other => Err(format!("unknown schedule mode: {other}")),
        }
    }
}

/// One half-hour cell of the week grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "TimeSlotFields")]
pub struct TimeSlot {
    pub day: u8,
    pub slot_index: u8,
}

#[derive(Deserialize)]
struct TimeSlotFields {
    day: u8,
    slot_index: u8,
}

impl TryFrom<TimeSlotFields> for TimeSlot {
    type Error = String;

    fn try_from(fields: TimeSlotFields) -> Result<Self, Self::Error> {
        Self::new(fields.day, fields.slot_index)
    }
}

impl TimeSlot {
    pub fn new(day: u8, slot_index: u8) -> Result<Self, String> {
        let slot = Self { day, slot_index };
        slot.validate()?;
        Ok(slot)
    }

    /// Fields are public, so a slot built by hand may lie outside the grid.
    pub fn validate(&self) -> Result<(), String> {
        if self.day >= DAYS_PER_WEEK {
            return Err(format!("slot.day must be 0-6, got {}", self.day));
        }
        if self.slot_index >= SLOTS_PER_DAY {
            return Err(format!("slot.slot_index must be 0-47, got {}", self.slot_index));
        }
        Ok(())
    }

    pub fn from_time(day: u8, time: &str) -> Result<Self, String> {
        let minutes = parse_hhmm(time).ok_or_else(|| format!("slot time must be HH:MM, got '{time}'"))?;
        if minutes % SLOT_MINUTES != 0 {
            return Err(format!("slot time must fall on a half hour, got '{time}'"));
        }
        Self::new(day, (minutes / SLOT_MINUTES) as u8)
    }

    pub fn start_minutes(self) -> u32 {
        u32::from(self.slot_index) * SLOT_MINUTES
    }

    pub fn time_label(self) -> String {
        format_hhmm(self.start_minutes())
    }

    pub fn day_name(self) -> &'static str {
        weekday_name(self.day).unwrap_or("Unknown")
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.day, self.time_label())
    }
}

/// Parses `DAY@HH:MM`, where `DAY` is an index (0 = Monday) or a weekday name.
impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((day, time)) = value.trim().split_once('@') else {
            return Err(format!("cell must be DAY@HH:MM, got '{value}'"));
        };
        let day = parse_day(day).ok_or_else(|| format!("unknown day '{day}'"))?;
        Self::from_time(day, time.trim())
    }
}

/// A contiguous run of slots within one day. `end_slot` is exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub day: u8,
    pub start_slot: u8,
    pub end_slot: u8,
}

impl TimeRange {
    pub fn new(day: u8, start_slot: u8, end_slot: u8) -> Result<Self, String> {
        let range = Self {
            day,
            start_slot,
            end_slot,
        };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.day >= DAYS_PER_WEEK {
            return Err(format!("range.day must be 0-6, got {}", self.day));
        }
        if self.start_slot >= self.end_slot {
            return Err("range.end_slot must be after range.start_slot".to_string());
        }
        if self.end_slot > SLOTS_PER_DAY {
            return Err(format!("range.end_slot must be <= {SLOTS_PER_DAY}"));
        }
        Ok(())
    }

    pub fn start_time(&self) -> String {
        format_hhmm(u32::from(self.start_slot) * SLOT_MINUTES)
    }

    pub fn end_time(&self) -> String {
        if self.end_slot >= SLOTS_PER_DAY {
            return END_OF_DAY_LABEL.to_string();
        }
        format_hhmm(u32::from(self.end_slot) * SLOT_MINUTES)
    }

    pub fn slot_count(&self) -> u8 {
        self.end_slot.saturating_sub(self.start_slot)
    }

    pub fn duration_minutes(&self) -> u32 {
        u32::from(self.slot_count()) * SLOT_MINUTES
    }
}

/// An existing record as seen by the grid, in minutes since midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageRange {
    pub day: u8,
    pub start_minute: u32,
    pub end_minute: u32,
}

impl CoverageRange {
    pub fn validate(&self) -> Result<(), String> {
        if self.day >= DAYS_PER_WEEK {
            return Err(format!("coverage.day must be 0-6, got {}", self.day));
        }
        if self.end_minute <= self.start_minute {
            return Err("coverage.end must be after coverage.start".to_string());
        }
        if self.end_minute > MINUTES_PER_DAY {
            return Err("coverage.end must not cross midnight".to_string());
        }
        Ok(())
    }

    /// Half-open containment on the slot's start instant.
    pub fn covers(&self, slot: TimeSlot) -> bool {
        let slot_start = slot.start_minutes();
        self.day == slot.day && self.start_minute <= slot_start && self.end_minute > slot_start
    }

    pub fn duration_minutes(&self) -> u32 {
        self.end_minute.saturating_sub(self.start_minute)
    }

    pub fn start_time(&self) -> String {
        format_hhmm(self.start_minute)
    }

    pub fn end_time(&self) -> String {
        format_hhmm(self.end_minute)
    }
}

impl From<TimeRange> for CoverageRange {
    fn from(range: TimeRange) -> Self {
        let end_minute = if range.end_slot >= SLOTS_PER_DAY {
            END_OF_DAY_MINUTES
        } else {
            u32::from(range.end_slot) * SLOT_MINUTES
        };
        Self {
            day: range.day,
            start_minute: u32::from(range.start_slot) * SLOT_MINUTES,
            end_minute,
        }
    }
}

pub fn weekday_name(day: u8) -> Option<&'static str> {
    DAY_NAMES.get(usize::from(day)).copied()
}

/// Accepts `0`-`6` or an English weekday name; three-letter prefixes are enough.
pub fn parse_day(value: &str) -> Option<u8> {
    let value = value.trim();
    if let Ok(index) = value.parse::<u8>() {
        return (index < DAYS_PER_WEEK).then_some(index);
    }
    if value.len() < 3 {
        return None;
    }
    let lowered = value.to_ascii_lowercase();
    DAY_NAMES
        .iter()
        .position(|name| name.to_ascii_lowercase().starts_with(&lowered))
        .map(|index| index as u8)
}

/// Minutes since midnight for `HH:MM` or `HH:MM:SS`.
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let mut split = value.trim().split(':');
    let hour = split.next()?.parse::<u32>().ok()?;
    let minute = split.next()?.parse::<u32>().ok()?;
    if let Some(second) = split.next() {
        if second.parse::<u32>().ok()? > 59 {
            return None;
        }
    }
    if split.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

/// Normalises `HH:MM[:SS]` to the 5-character `HH:MM` form.
pub fn normalize_hhmm(value: &str) -> Option<String> {
    parse_hhmm(value).map(format_hhmm)
}

pub fn format_hhmm(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn time_slot_rejects_out_of_grid_indices() {
        assert!(TimeSlot::new(7, 0).is_err());
        assert!(TimeSlot::new(0, 48).is_err());
        assert!(TimeSlot::new(6, 47).is_ok());
    }

    #[test]
    fn time_slot_from_time_requires_half_hour_boundary() {
        assert_eq!(
            TimeSlot::from_time(0, "09:30"),
            Ok(TimeSlot {
                day: 0,
                slot_index: 19
            })
        );
        assert!(TimeSlot::from_time(0, "09:15").is_err());
        assert!(TimeSlot::from_time(0, "24:00").is_err());
    }

    #[test]
    fn time_slot_parses_cell_notation() {
        let by_index: TimeSlot = "2@14:00".parse().expect("index notation");
        let by_name: TimeSlot = "wed@14:00".parse().expect("name notation");
        assert_eq!(by_index, by_name);
        assert_eq!(by_index.day_name(), "Wednesday");
        assert_eq!(by_index.to_string(), "2@14:00");
        assert!("14:00".parse::<TimeSlot>().is_err());
        assert!("mo@14:00".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn time_range_end_is_clamped_at_end_of_day() {
        let range = TimeRange::new(3, 46, 48).expect("valid range");
        assert_eq!(range.start_time(), "23:00");
        assert_eq!(range.end_time(), END_OF_DAY_LABEL);
        assert_eq!(range.duration_minutes(), 60);
    }

    #[test]
    fn time_range_validate_rejects_empty_and_overflowing_ranges() {
        assert!(TimeRange::new(0, 10, 10).is_err());
        assert!(TimeRange::new(0, 10, 49).is_err());
        assert!(TimeRange::new(7, 0, 1).is_err());
    }

    #[test]
    fn coverage_uses_half_open_containment() {
        let coverage = CoverageRange {
            day: 1,
            start_minute: 9 * 60,
            end_minute: 10 * 60,
        };
        let at = |time: &str| TimeSlot::from_time(1, time).expect("valid slot");
        assert!(coverage.covers(at("09:00")));
        assert!(coverage.covers(at("09:30")));
        assert!(!coverage.covers(at("10:00")));
        assert!(!coverage.covers(at("08:30")));
        assert!(!coverage.covers(TimeSlot::from_time(2, "09:00").expect("valid slot")));
    }

    #[test]
    fn end_of_day_coverage_still_covers_last_slot() {
        let coverage = CoverageRange::from(TimeRange::new(4, 47, 48).expect("valid range"));
        assert_eq!(coverage.end_time(), "23:59");
        assert!(coverage.covers(TimeSlot::new(4, 47).expect("valid slot")));
    }

    #[test]
    fn deserialized_slot_is_bounds_checked() {
        let slot: TimeSlot =
            serde_json::from_str(r#"{"day": 6, "slot_index": 47}"#).expect("valid slot");
        assert_eq!(slot, TimeSlot::new(6, 47).expect("valid slot"));
        assert!(serde_json::from_str::<TimeSlot>(r#"{"day": 9, "slot_index": 50}"#).is_err());
        assert!(TimeSlot { day: 0, slot_index: 48 }.validate().is_err());
    }

    #[test]
    fn hhmm_helpers_normalise_seconds() {
        assert_eq!(normalize_hhmm("09:00:00").as_deref(), Some("09:00"));
        assert_eq!(normalize_hhmm("23:59").as_deref(), Some("23:59"));
        assert_eq!(parse_hhmm("7:05"), Some(425));
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("10:00:61").is_none());
        assert!(parse_hhmm("10").is_none());
    }

    #[test]
    fn schedule_mode_parses_and_labels() {
        assert_eq!("busy".parse::<ScheduleMode>(), Ok(ScheduleMode::Busy));
        assert_eq!(
            "Available".parse::<ScheduleMode>(),
            Ok(ScheduleMode::Availability)
        );
        assert!("free".parse::<ScheduleMode>().is_err());
        assert_eq!(ScheduleMode::Busy.uncovered_label(), "Free");
        assert_eq!(ScheduleMode::Availability.collection(), "availabilities");
    }

    proptest! {
        #[test]
        fn slot_time_label_roundtrips(day in 0u8..7, slot_index in 0u8..48) {
            let slot = TimeSlot::new(day, slot_index).expect("valid slot");
            let parsed = TimeSlot::from_time(day, &slot.time_label()).expect("label parses");
            prop_assert_eq!(parsed, slot);
        }
    }
}
