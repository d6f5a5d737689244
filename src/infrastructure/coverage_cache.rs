use crate::domain::models::{CoverageRange, ScheduleMode};
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Last coverage fetched from the store, per mode.
pub trait CoverageRepository: Send + Sync {
    fn replace(&self, mode: ScheduleMode, ranges: Vec<CoverageRange>) -> Result<(), InfraError>;
    fn list(&self, mode: ScheduleMode) -> Result<Vec<CoverageRange>, InfraError>;
    fn clear(&self, mode: ScheduleMode) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCoverageRepository {
    ranges: Mutex<HashMap<ScheduleMode, Vec<CoverageRange>>>,
}

impl InMemoryCoverageRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ScheduleMode, Vec<CoverageRange>>>, InfraError> {
        self.ranges
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("coverage cache lock poisoned: {error}")))
    }
}

impl CoverageRepository for InMemoryCoverageRepository {
    fn replace(&self, mode: ScheduleMode, mut ranges: Vec<CoverageRange>) -> Result<(), InfraError> {
        ranges.sort_by_key(|range| (range.day, range.start_minute, range.end_minute));
        self.lock()?.insert(mode, ranges);
        Ok(())
    }

    fn list(&self, mode: ScheduleMode) -> Result<Vec<CoverageRange>, InfraError> {
        Ok(self.lock()?.get(&mode).cloned().unwrap_or_default())
    }

    fn clear(&self, mode: ScheduleMode) -> Result<(), InfraError> {
        self.lock()?.remove(&mode);
        Ok(())
    }
}
