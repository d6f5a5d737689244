pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use domain::consolidation::{BlockConsolidator, ConsolidationError, ConsolidationPolicy};
pub use domain::grid::{GridEvent, GridSelectionModel, SelectionState};
pub use domain::models::{CoverageRange, ScheduleMode, TimeRange, TimeSlot};
pub use infrastructure::error::InfraError;

use tracing_subscriber::EnvFilter;

/// Installs the stderr fmt subscriber; `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
