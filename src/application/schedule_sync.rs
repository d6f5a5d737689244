use crate::domain::consolidation::BlockConsolidator;
use crate::domain::models::{weekday_name, CoverageRange, ScheduleMode, TimeSlot};
use crate::infrastructure::config::GridConfig;
use crate::infrastructure::coverage_cache::CoverageRepository;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::range_mapper::{decode_records, encode_range, RangeRecord};
use crate::infrastructure::schedule_client::ScheduleClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration as TokioDuration};

/// Upper bound the store accepts for one busy-time batch.
pub const BUSY_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Busy {
        created_count: usize,
        total_requested: Option<usize>,
        errors: Vec<String>,
    },
    Availability {
        created_count: usize,
        errors: Vec<String>,
    },
}

impl SubmissionOutcome {
    pub fn created_count(&self) -> usize {
        match self {
            Self::Busy { created_count, .. } | Self::Availability { created_count, .. } => {
                *created_count
            }
        }
    }

    pub fn errors(&self) -> &[String] {
        match self {
            Self::Busy { errors, .. } | Self::Availability { errors, .. } => errors,
        }
    }

    pub fn message(&self) -> String {
        let mut message = match self {
            Self::Busy {
                created_count,
                total_requested,
                ..
            } => {
                let mut text = format!("Busy times updated! Created {created_count}");
                if let Some(total) = total_requested {
                    text.push_str(&format!(" of {total} requested"));
                }
                text.push_str(" time blocks.");
                text
            }
            Self::Availability { created_count, .. } => {
                format!("Availability updated! Created {created_count} time blocks.")
            }
        };
        let error_count = self.errors().len();
        if error_count > 0 {
            message.push_str(&format!(" ({error_count} errors occurred)"));
        }
        message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared(ScheduleMode),
    Cancelled,
}

impl ClearOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Cleared(ScheduleMode::Busy) => "All busy times cleared.".to_string(),
            Self::Cleared(ScheduleMode::Availability) => "All availability cleared.".to_string(),
            Self::Cancelled => "Clear cancelled; nothing was deleted.".to_string(),
        }
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, InfraError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InfraError::SubmissionInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ScheduleSyncService<C, R>
where
    C: ScheduleClient,
    R: CoverageRepository,
{
    schedule_client: Arc<C>,
    coverage_repository: Arc<R>,
    grid_config: GridConfig,
    retry_policy: RetryPolicy,
    in_flight: AtomicBool,
}

impl<C, R> ScheduleSyncService<C, R>
where
    C: ScheduleClient,
    R: CoverageRepository,
{
    pub fn new(schedule_client: Arc<C>, coverage_repository: Arc<R>) -> Self {
        Self {
            schedule_client,
            coverage_repository,
            grid_config: GridConfig::default(),
            retry_policy: RetryPolicy::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_grid_config(mut self, grid_config: GridConfig) -> Self {
        self.grid_config = grid_config;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn grid_config(&self) -> &GridConfig {
        &self.grid_config
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn cached_coverage(&self, mode: ScheduleMode) -> Result<Vec<CoverageRange>, InfraError> {
        self.coverage_repository.list(mode)
    }

    /// Loads the mode's ranges from the store and replaces the cached copy.
    /// On failure the cache is left as it was.
    pub async fn fetch_coverage(
        &self,
        access_token: &str,
        mode: ScheduleMode,
    ) -> Result<Vec<CoverageRange>, InfraError> {
        let records = self
            .list_ranges_with_retry(access_token, mode)
            .await
            .map_err(|error| match error {
                InfraError::Network(message) => InfraError::Fetch(message),
                other => other,
            })?;
        let coverage = decode_records(&records);
        self.coverage_repository.replace(mode, coverage)?;
        self.coverage_repository.list(mode)
    }

    /// Consolidates `slots` and writes the ranges to the store.
    ///
    /// Returns `Ok(None)` when there is nothing to submit. Oversized
    /// selections are rejected before any request is made.
    pub async fn submit_selection(
        &self,
        access_token: &str,
        mode: ScheduleMode,
        slots: &[TimeSlot],
    ) -> Result<Option<SubmissionOutcome>, InfraError> {
        if slots.is_empty() {
            return Ok(None);
        }

        let consolidator = BlockConsolidator::new(self.grid_config.policy(mode));
        let ranges = consolidator.consolidate(slots).inspect_err(|error| {
            tracing::warn!(%mode, requested = slots.len(), %error, "rejected selection");
        })?;
        if ranges.is_empty() {
            return Ok(None);
        }
        let records: Vec<RangeRecord> = ranges.iter().map(encode_range).collect();

        let guard = InFlightGuard::acquire(&self.in_flight)?;
        let outcome = match mode {
            ScheduleMode::Busy => self.submit_busy(access_token, &records).await?,
            ScheduleMode::Availability => self.submit_availability(access_token, &records).await?,
        };
        drop(guard);

        tracing::info!(
            %mode,
            ranges = records.len(),
            created = outcome.created_count(),
            errors = outcome.errors().len(),
            "submitted selection"
        );
        self.refresh_after_write(access_token, mode).await;
        Ok(Some(outcome))
    }

    pub async fn clear_all(
        &self,
        access_token: &str,
        mode: ScheduleMode,
        confirmed: bool,
    ) -> Result<ClearOutcome, InfraError> {
        if !confirmed {
            return Ok(ClearOutcome::Cancelled);
        }

        let guard = InFlightGuard::acquire(&self.in_flight)?;
        self.schedule_client
            .clear_all(access_token, mode)
            .await
            .map_err(Self::as_submission_error)?;
        drop(guard);

        self.coverage_repository.clear(mode)?;
        self.refresh_after_write(access_token, mode).await;
        Ok(ClearOutcome::Cleared(mode))
    }

    async fn submit_busy(
        &self,
        access_token: &str,
        records: &[RangeRecord],
    ) -> Result<SubmissionOutcome, InfraError> {
        let mut created_count = 0;
        let mut requested = 0;
        let mut total_known = false;
        let mut errors = Vec::new();
        let mut failed_batches = 0;
        let batches = records.chunks(BUSY_BATCH_LIMIT);
        let batch_count = batches.len();

        for batch in batches {
            match self
                .schedule_client
                .batch_create_busy(access_token, batch)
                .await
            {
                Ok(response) => {
                    created_count += response.created_count;
                    requested += response.total_requested.unwrap_or(batch.len());
                    total_known |= response.total_requested.is_some();
                    errors.extend(response.errors);
                }
                Err(error) => {
                    // a rejected batch still counts toward what was requested
                    requested += batch.len();
                    total_known = true;
                    failed_batches += 1;
                    let error = Self::as_submission_error(error);
                    if failed_batches == batch_count {
                        return Err(error);
                    }
                    errors.push(error.to_string());
                }
            }
        }

        Ok(SubmissionOutcome::Busy {
            created_count,
            total_requested: total_known.then_some(requested),
            errors,
        })
    }

    /// One request per consolidated range, in ascending day order. The store
    /// accepts one availability record per day, but a day with two separate
    /// runs is sent as two records here rather than one merged span, so the
    /// gap between them is not marked available.
    async fn submit_availability(
        &self,
        access_token: &str,
        records: &[RangeRecord],
    ) -> Result<SubmissionOutcome, InfraError> {
        let mut created_count = 0;
        let mut errors = Vec::new();

        for record in records {
            match self
                .schedule_client
                .create_availability(access_token, record)
                .await
            {
                Ok(()) => created_count += 1,
                Err(error) => errors.push(format!(
                    "{} {}-{}: {}",
                    weekday_name(record.day_of_week).unwrap_or("Unknown day"),
                    record.start_time,
                    record.end_time,
                    Self::as_submission_error(error)
                )),
            }
        }

        if created_count == 0 {
            return Err(InfraError::Submission(errors.join("; ")));
        }
        Ok(SubmissionOutcome::Availability {
            created_count,
            errors,
        })
    }

    async fn refresh_after_write(&self, access_token: &str, mode: ScheduleMode) {
        if let Err(error) = self.fetch_coverage(access_token, mode).await {
            tracing::warn!(%mode, %error, "coverage refresh after write failed; keeping cached coverage");
        }
    }

    async fn list_ranges_with_retry(
        &self,
        access_token: &str,
        mode: ScheduleMode,
    ) -> Result<Vec<RangeRecord>, InfraError> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match self.schedule_client.list_ranges(access_token, mode).await {
                Ok(records) => return Ok(records),
                Err(error) if self.should_retry(&error) && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    tracing::debug!(%mode, attempt, delay_ms = delay, %error, "retrying coverage fetch");
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn should_retry(&self, error: &InfraError) -> bool {
        matches!(error, InfraError::Network(_))
    }

    fn as_submission_error(error: InfraError) -> InfraError {
        match error {
            InfraError::Network(message) => InfraError::Submission(message),
            other => other,
        }
    }
}
