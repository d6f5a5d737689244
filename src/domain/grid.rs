use crate::domain::models::{
    format_hhmm, weekday_name, CoverageRange, ScheduleMode, TimeSlot, DAYS_PER_WEEK,
    SLOTS_PER_DAY, SLOT_MINUTES,
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Idle,
    Selecting,
}

/// Input events of the selection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    PointerDown(TimeSlot),
    PointerEnter(TimeSlot),
    /// A release anywhere on the surface ends the gesture, on the grid or off it.
    PointerUp { over_grid: bool },
    KeyActivate(TimeSlot),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selecting: bool,
    cells: BTreeSet<TimeSlot>,
}

impl SelectionState {
    pub fn phase(&self) -> GesturePhase {
        if self.selecting {
            GesturePhase::Selecting
        } else {
            GesturePhase::Idle
        }
    }

    pub fn cells(&self) -> &BTreeSet<TimeSlot> {
        &self.cells
    }

    pub fn contains(&self, slot: TimeSlot) -> bool {
        self.cells.contains(&slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedSelection {
    pub slots: Vec<TimeSlot>,
}

/// Pure transition function of the gesture state machine.
///
/// Returns the next state and, when the event completes a gesture with at least
/// one cell, the committed selection. In read-only mode every event is ignored.
pub fn transition(
    mut state: SelectionState,
    event: GridEvent,
    read_only: bool,
) -> (SelectionState, Option<CommittedSelection>) {
    if read_only {
        return (state, None);
    }

    match event {
        GridEvent::PointerDown(slot) => {
            // pressing the only selected cell again deselects it
            let repeated = state.cells.len() == 1 && state.cells.contains(&slot);
            state.cells.clear();
            if !repeated {
                state.cells.insert(slot);
            }
            state.selecting = true;
            (state, None)
        }
        GridEvent::PointerEnter(slot) => {
            if state.selecting {
                state.cells.insert(slot);
            }
            (state, None)
        }
        GridEvent::PointerUp { .. } => {
            if !state.selecting {
                return (state, None);
            }
            state.selecting = false;
            let cells = std::mem::take(&mut state.cells);
            let committed = (!cells.is_empty()).then(|| CommittedSelection {
                slots: cells.into_iter().collect(),
            });
            (state, committed)
        }
        GridEvent::KeyActivate(slot) => (state, Some(CommittedSelection { slots: vec![slot] })),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityThresholds {
    pub warning: usize,
    pub alert: usize,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            warning: 50,
            alert: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSeverity {
    Normal,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    pub cell_count: usize,
    pub minutes: u32,
    pub severity: SelectionSeverity,
    pub label: String,
}

impl SelectionSummary {
    pub fn from_count(cell_count: usize, thresholds: SeverityThresholds) -> Option<Self> {
        if cell_count == 0 {
            return None;
        }
        let minutes = cell_count as u32 * SLOT_MINUTES;
        let severity = if cell_count > thresholds.alert {
            SelectionSeverity::Alert
        } else if cell_count > thresholds.warning {
            SelectionSeverity::Warning
        } else {
            SelectionSeverity::Normal
        };
        let plural = if cell_count == 1 { "" } else { "s" };
        Some(Self {
            cell_count,
            minutes,
            severity,
            label: format!(
                "{cell_count} slot{plural} selected ({})",
                format_duration(minutes)
            ),
        })
    }
}

fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, rest) => format!("{rest}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, rest) => format!("{hours}h {rest}m"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Covered,
    Selected,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellView {
    pub day: u8,
    pub time: String,
    pub state: CellState,
    pub read_only: bool,
    pub aria_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridRow {
    pub time: String,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridView {
    pub mode: ScheduleMode,
    pub rows: Vec<GridRow>,
}

impl GridView {
    /// Plain-text rendering: `#` covered, `*` selected, `.` empty.
    pub fn render_text(&self) -> String {
        let mut output = String::from("      ");
        for day in 0..DAYS_PER_WEEK {
            let name = weekday_name(day).map(|name| &name[..3]).unwrap_or("?");
            output.push_str(&format!(" {name:<3}"));
        }
        output.push('\n');
        for row in &self.rows {
            output.push_str(&row.time);
            output.push(' ');
            for cell in &row.cells {
                let marker = match cell.state {
                    CellState::Covered => '#',
                    CellState::Selected => '*',
                    CellState::Empty => '.',
                };
                output.push_str(&format!("  {marker} "));
            }
            output.push('\n');
        }
        output
    }
}

/// Interactive selection over the fixed 7 x 48 grid.
#[derive(Debug, Clone, Default)]
pub struct GridSelectionModel {
    read_only: bool,
    state: SelectionState,
}

impl GridSelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            state: SelectionState::default(),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn phase(&self) -> GesturePhase {
        self.state.phase()
    }

    pub fn apply(&mut self, event: GridEvent) -> Option<CommittedSelection> {
        let current = std::mem::take(&mut self.state);
        let (next, committed) = transition(current, event, self.read_only);
        self.state = next;
        committed
    }

    pub fn begin_selection(&mut self, slot: TimeSlot) {
        self.apply(GridEvent::PointerDown(slot));
    }

    pub fn extend_selection(&mut self, slot: TimeSlot) {
        self.apply(GridEvent::PointerEnter(slot));
    }

    pub fn commit_selection(&mut self) -> Option<CommittedSelection> {
        self.apply(GridEvent::PointerUp { over_grid: true })
    }

    pub fn release_pointer(&mut self, over_grid: bool) -> Option<CommittedSelection> {
        self.apply(GridEvent::PointerUp { over_grid })
    }

    pub fn toggle_single_cell(&mut self, slot: TimeSlot) -> Option<CommittedSelection> {
        self.apply(GridEvent::KeyActivate(slot))
    }

    pub fn is_covered(slot: TimeSlot, coverage: &[CoverageRange]) -> bool {
        coverage.iter().any(|range| range.covers(slot))
    }

    pub fn is_selected(&self, slot: TimeSlot) -> bool {
        self.state.contains(slot)
    }

    pub fn summary(&self, thresholds: SeverityThresholds) -> Option<SelectionSummary> {
        SelectionSummary::from_count(self.state.cells.len(), thresholds)
    }

    /// The in-progress selection takes precedence over coverage for the visual state;
    /// the accessible label always reports coverage.
    pub fn cell_view(&self, slot: TimeSlot, coverage: &[CoverageRange], mode: ScheduleMode) -> CellView {
        let covered = Self::is_covered(slot, coverage);
        let state = if self.is_selected(slot) {
            CellState::Selected
        } else if covered {
            CellState::Covered
        } else {
            CellState::Empty
        };
        let coverage_label = if covered {
            mode.covered_label()
        } else {
            mode.uncovered_label()
        };
        CellView {
            day: slot.day,
            time: slot.time_label(),
            state,
            read_only: self.read_only,
            aria_label: format!(
                "{coverage_label} time slot: {} at {}",
                slot.day_name(),
                slot.time_label()
            ),
        }
    }

    pub fn grid_view(&self, coverage: &[CoverageRange], mode: ScheduleMode) -> GridView {
        let rows = (0..SLOTS_PER_DAY)
            .map(|slot_index| GridRow {
                time: format_hhmm(u32::from(slot_index) * SLOT_MINUTES),
                cells: (0..DAYS_PER_WEEK)
                    .map(|day| self.cell_view(TimeSlot { day, slot_index }, coverage, mode))
                    .collect(),
            })
            .collect();
        GridView { mode, rows }
    }
}
