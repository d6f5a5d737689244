use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::schedule_sync::ScheduleSyncService;
use crate::domain::grid::{GesturePhase, GridSelectionModel, GridView, SelectionSummary};
use crate::domain::models::{ScheduleMode, TimeSlot};
use crate::domain::summary::WeekSummary;
use crate::infrastructure::config::{resolve_api_base_url, GridConfig};
use crate::infrastructure::coverage_cache::InMemoryCoverageRepository;
use crate::infrastructure::credential_store::{
    resolve_access_token, CredentialStore, KeyringCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::range_mapper::RangeRecord;
use crate::infrastructure::schedule_client::{ReqwestScheduleClient, ScheduleClient};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct AppState<C: ScheduleClient = ReqwestScheduleClient> {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    sync_service: ScheduleSyncService<C, InMemoryCoverageRepository>,
    credential_store: Arc<dyn CredentialStore>,
    env_lookup: EnvLookup,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let env_lookup: EnvLookup = Arc::new(|key: &str| std::env::var(key).ok());
        let base_url = resolve_api_base_url(&bootstrap.configs.app, |key| (env_lookup)(key))?;
        let client = ReqwestScheduleClient::with_timeout(
            base_url,
            Duration::from_secs(bootstrap.configs.app.request_timeout_seconds),
        )?;

        Ok(Self::assemble(
            bootstrap,
            Arc::new(client),
            Arc::new(KeyringCredentialStore::default()),
            env_lookup,
        ))
    }
}

impl<C: ScheduleClient> AppState<C> {
    pub fn with_client(
        workspace_root: PathBuf,
        schedule_client: Arc<C>,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self::assemble(
            bootstrap,
            schedule_client,
            credential_store,
            Arc::new(|key: &str| std::env::var(key).ok()),
        ))
    }

    fn assemble(
        bootstrap: BootstrapResult,
        schedule_client: Arc<C>,
        credential_store: Arc<dyn CredentialStore>,
        env_lookup: EnvLookup,
    ) -> Self {
        let sync_service =
            ScheduleSyncService::new(schedule_client, Arc::new(InMemoryCoverageRepository::default()))
                .with_grid_config(bootstrap.configs.grid);

        Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            sync_service,
            credential_store,
            env_lookup,
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        }
    }

    pub fn with_env_lookup(mut self, env_lookup: EnvLookup) -> Self {
        self.env_lookup = env_lookup;
        self
    }

    /// Grids built after this call ignore every pointer and keyboard event.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.runtime = Mutex::new(RuntimeState {
            read_only,
            models: HashMap::new(),
        });
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn grid_config(&self) -> &GridConfig {
        self.sync_service.grid_config()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn access_token(&self) -> Result<String, InfraError> {
        resolve_access_token(self.credential_store.as_ref(), |key| (self.env_lookup)(key))
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    read_only: bool,
    models: HashMap<ScheduleMode, GridSelectionModel>,
}

impl RuntimeState {
    fn model_mut(&mut self, mode: ScheduleMode) -> &mut GridSelectionModel {
        let read_only = self.read_only;
        self.models.entry(mode).or_insert_with(|| {
            if read_only {
                GridSelectionModel::read_only()
            } else {
                GridSelectionModel::new()
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectionResponse {
    pub mode: ScheduleMode,
    pub phase: GesturePhase,
    pub selected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SelectionSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub mode: ScheduleMode,
    pub message: String,
    pub created_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CoverageResponse {
    pub mode: ScheduleMode,
    pub ranges: Vec<RangeRecord>,
    pub summary: WeekSummary,
}

fn lock_runtime<C: ScheduleClient>(
    state: &AppState<C>,
) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn parse_slot(raw: &str) -> Result<TimeSlot, InfraError> {
    raw.parse::<TimeSlot>().map_err(InfraError::InvalidInput)
}

fn to_selection_response(
    mode: ScheduleMode,
    model: &GridSelectionModel,
    grid_config: &GridConfig,
) -> SelectionResponse {
    SelectionResponse {
        mode,
        phase: model.phase(),
        selected: model
            .state()
            .cells()
            .iter()
            .map(|slot| format!("{} {}", slot.day_name(), slot.time_label()))
            .collect(),
        summary: model.summary(grid_config.thresholds()),
    }
}

pub fn begin_selection_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    cell: &str,
) -> Result<SelectionResponse, InfraError> {
    let slot = parse_slot(cell)?;
    let mut runtime = lock_runtime(state)?;
    let model = runtime.model_mut(mode);
    model.begin_selection(slot);
    Ok(to_selection_response(mode, model, state.grid_config()))
}

pub fn extend_selection_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    cell: &str,
) -> Result<SelectionResponse, InfraError> {
    let slot = parse_slot(cell)?;
    let mut runtime = lock_runtime(state)?;
    let model = runtime.model_mut(mode);
    model.extend_selection(slot);
    Ok(to_selection_response(mode, model, state.grid_config()))
}

pub fn selection_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
) -> Result<SelectionResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let model = runtime.model_mut(mode);
    Ok(to_selection_response(mode, model, state.grid_config()))
}

/// Ends the gesture wherever the pointer was released and submits what was selected.
pub async fn release_pointer_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    over_grid: bool,
) -> Result<Option<SubmitResponse>, InfraError> {
    let committed = {
        let mut runtime = lock_runtime(state)?;
        runtime.model_mut(mode).release_pointer(over_grid)
    };
    match committed {
        Some(selection) => submit_slots_impl(state, mode, &selection.slots).await,
        None => Ok(None),
    }
}

pub async fn toggle_cell_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    cell: &str,
) -> Result<Option<SubmitResponse>, InfraError> {
    let slot = parse_slot(cell)?;
    let committed = {
        let mut runtime = lock_runtime(state)?;
        runtime.model_mut(mode).toggle_single_cell(slot)
    };
    match committed {
        Some(selection) => submit_slots_impl(state, mode, &selection.slots).await,
        None => Ok(None),
    }
}

/// Drives one drag gesture: press on the first cell, sweep over the rest, release.
pub async fn select_cells_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    cells: &[String],
    over_grid: bool,
) -> Result<Option<SubmitResponse>, InfraError> {
    let slots = cells
        .iter()
        .map(|cell| parse_slot(cell))
        .collect::<Result<Vec<_>, _>>()?;
    let Some((first, rest)) = slots.split_first() else {
        return Err(InfraError::InvalidInput("at least one cell is required".to_string()));
    };

    {
        let mut runtime = lock_runtime(state)?;
        let model = runtime.model_mut(mode);
        model.begin_selection(*first);
        for slot in rest {
            model.extend_selection(*slot);
        }
    }
    release_pointer_impl(state, mode, over_grid).await
}

pub async fn submit_slots_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    slots: &[TimeSlot],
) -> Result<Option<SubmitResponse>, InfraError> {
    if slots.is_empty() {
        return Ok(None);
    }
    let access_token = state.access_token()?;
    let Some(outcome) = state
        .sync_service
        .submit_selection(&access_token, mode, slots)
        .await?
    else {
        return Ok(None);
    };

    let message = outcome.message();
    state.log_info("submit_slots", &format!("mode={mode} {message}"));
    Ok(Some(SubmitResponse {
        mode,
        message,
        created_count: outcome.created_count(),
        errors: outcome.errors().to_vec(),
    }))
}

pub async fn fetch_coverage_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
) -> Result<CoverageResponse, InfraError> {
    let access_token = state.access_token()?;
    let coverage = state.sync_service.fetch_coverage(&access_token, mode).await?;

    state.log_info(
        "fetch_coverage",
        &format!("mode={mode} ranges={}", coverage.len()),
    );
    Ok(CoverageResponse {
        mode,
        ranges: coverage
            .iter()
            .map(|range| RangeRecord {
                day_of_week: range.day,
                start_time: range.start_time(),
                end_time: range.end_time(),
            })
            .collect(),
        summary: WeekSummary::from_coverage(&coverage),
    })
}

pub fn grid_view_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
) -> Result<GridView, InfraError> {
    let coverage = state.sync_service.cached_coverage(mode)?;
    let mut runtime = lock_runtime(state)?;
    Ok(runtime.model_mut(mode).grid_view(&coverage, mode))
}

pub fn week_summary_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
) -> Result<WeekSummary, InfraError> {
    let coverage = state.sync_service.cached_coverage(mode)?;
    Ok(WeekSummary::from_coverage(&coverage))
}

pub async fn clear_all_impl<C: ScheduleClient>(
    state: &AppState<C>,
    mode: ScheduleMode,
    confirmed: bool,
) -> Result<String, InfraError> {
    // an unconfirmed request never reaches the store, so it needs no token
    let access_token = if confirmed {
        state.access_token()?
    } else {
        String::new()
    };
    let outcome = state
        .sync_service
        .clear_all(&access_token, mode, confirmed)
        .await?;
    let message = outcome.message();
    state.log_info("clear_all", &format!("mode={mode} {message}"));
    Ok(message)
}

pub fn set_token_impl<C: ScheduleClient>(state: &AppState<C>, token: &str) -> Result<(), InfraError> {
    state.credential_store.save_token(token)?;
    state.log_info("set_token", "stored access token");
    Ok(())
}

pub fn clear_token_impl<C: ScheduleClient>(state: &AppState<C>) -> Result<(), InfraError> {
    state.credential_store.delete_token()?;
    state.log_info("clear_token", "removed stored access token");
    Ok(())
}
