use crate::domain::models::{ScheduleMode, TimeRange, TimeSlot};
use std::collections::BTreeMap;
use thiserror::Error;

/// Largest busy-time selection accepted in one submission.
pub const BUSY_SELECTION_CAP: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsolidationError {
    #[error(
        "Selection too large: {requested} time slots selected, please select fewer than {cap} time slots at once"
    )]
    SelectionTooLarge { requested: usize, cap: usize },
    #[error("Invalid time slot: {0}")]
    InvalidSlot(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationPolicy {
    pub max_slots: Option<usize>,
}

impl ConsolidationPolicy {
    /// Busy-time selections are capped; availability selections are not.
    pub fn for_mode(mode: ScheduleMode) -> Self {
        match mode {
            ScheduleMode::Busy => Self {
                max_slots: Some(BUSY_SELECTION_CAP),
            },
            ScheduleMode::Availability => Self { max_slots: None },
        }
    }

    pub fn check(&self, requested: usize) -> Result<(), ConsolidationError> {
        match self.max_slots {
            Some(cap) if requested > cap => {
                Err(ConsolidationError::SelectionTooLarge { requested, cap })
            }
            _ => Ok(()),
        }
    }
}

/// Turns raw selected cells into the minimal set of per-day ranges.
#[derive(Debug, Clone, Copy)]
pub struct BlockConsolidator {
    policy: ConsolidationPolicy,
}

impl BlockConsolidator {
    pub fn new(policy: ConsolidationPolicy) -> Self {
        Self { policy }
    }

    pub fn for_mode(mode: ScheduleMode) -> Self {
        Self::new(ConsolidationPolicy::for_mode(mode))
    }

    pub fn policy(&self) -> ConsolidationPolicy {
        self.policy
    }

    /// Ranges come out ordered by day, then by start time. Empty input yields no ranges.
    /// A slot outside the 7 x 48 grid rejects the whole selection.
    pub fn consolidate(&self, slots: &[TimeSlot]) -> Result<Vec<TimeRange>, ConsolidationError> {
        self.policy.check(slots.len())?;

        let mut by_day: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
        for slot in slots {
            slot.validate().map_err(ConsolidationError::InvalidSlot)?;
            by_day.entry(slot.day).or_default().push(slot.slot_index);
        }

        let mut ranges = Vec::new();
        for (day, mut indices) in by_day {
            indices.sort_unstable();
            indices.dedup();
            ranges.extend(merge_day(day, &indices));
        }
        Ok(ranges)
    }
}

/// `indices` must be sorted and free of duplicates.
fn merge_day(day: u8, indices: &[u8]) -> Vec<TimeRange> {
    let Some((&first, rest)) = indices.split_first() else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut block_start = first;
    let mut previous = first;
    for &current in rest {
        if current != previous + 1 {
            blocks.push(TimeRange {
                day,
                start_slot: block_start,
                end_slot: previous + 1,
            });
            block_start = current;
        }
        previous = current;
    }
    blocks.push(TimeRange {
        day,
        start_slot: block_start,
        end_slot: previous + 1,
    });
    blocks
}
