use crate::domain::consolidation::{ConsolidationPolicy, BUSY_SELECTION_CAP};
use crate::domain::grid::SeverityThresholds;
use crate::domain::models::ScheduleMode;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const GRID_JSON: &str = "grid.json";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const API_BASE_URL_ENV: &str = "WEEKGRID_API_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub schema: u8,
    pub busy_max_slots: Option<usize>,
    pub availability_max_slots: Option<usize>,
    pub warning_threshold: usize,
    pub alert_threshold: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        let thresholds = SeverityThresholds::default();
        Self {
            schema: 1,
            busy_max_slots: Some(BUSY_SELECTION_CAP),
            availability_max_slots: None,
            warning_threshold: thresholds.warning,
            alert_threshold: thresholds.alert,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.warning_threshold >= self.alert_threshold {
            return Err("grid.warningThreshold must be below grid.alertThreshold".to_string());
        }
        if self.busy_max_slots == Some(0) || self.availability_max_slots == Some(0) {
            return Err("grid max slot caps must be > 0 when set".to_string());
        }
        Ok(())
    }

    pub fn policy(&self, mode: ScheduleMode) -> ConsolidationPolicy {
        let max_slots = match mode {
            ScheduleMode::Busy => self.busy_max_slots,
            ScheduleMode::Availability => self.availability_max_slots,
        };
        ConsolidationPolicy { max_slots }
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        SeverityThresholds {
            warning: self.warning_threshold,
            alert: self.alert_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub app: AppConfig,
    pub grid: GridConfig,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "apiBaseUrl": DEFAULT_API_BASE_URL,
                "requestTimeoutSeconds": DEFAULT_REQUEST_TIMEOUT_SECONDS
            }),
        ),
        (
            GRID_JSON,
            serde_json::json!({
                "schema": 1,
                "busyMaxSlots": BUSY_SELECTION_CAP,
                "availabilityMaxSlots": null,
                "warningThreshold": 50,
                "alertThreshold": 100
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    let app: AppConfig = serde_json::from_value(read_config(&config_dir.join(APP_JSON))?)?;
    let grid: GridConfig = serde_json::from_value(read_config(&config_dir.join(GRID_JSON))?)?;
    grid.validate().map_err(InfraError::InvalidConfig)?;
    Ok(ConfigBundle { app, grid })
}

/// Resolves the remote store's base URL; the environment wins over `app.json`.
pub fn resolve_api_base_url<F>(app: &AppConfig, lookup: F) -> Result<Url, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(API_BASE_URL_ENV)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| app.api_base_url.trim().to_string());

    let mut url = Url::parse(&raw)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid apiBaseUrl '{raw}': {error}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(InfraError::InvalidConfig(format!(
            "apiBaseUrl must be an http(s) URL, got '{raw}'"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "weekgrid-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn sample_app() -> AppConfig {
        AppConfig {
            schema: 1,
            api_base_url: "https://schedule.example.com/api".to_string(),
            request_timeout_seconds: 30,
        }
    }

    #[test]
    fn defaults_are_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let bundle = load_configs(&dir.path).expect("load configs");

        assert_eq!(bundle.app.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(bundle.grid, GridConfig::default());
        assert_eq!(
            bundle.grid.policy(ScheduleMode::Busy).max_slots,
            Some(BUSY_SELECTION_CAP)
        );
        assert_eq!(bundle.grid.policy(ScheduleMode::Availability).max_slots, None);
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = TempConfigDir::new();
        let custom = serde_json::json!({
            "schema": 1,
            "busyMaxSlots": 60,
            "availabilityMaxSlots": 200,
            "warningThreshold": 20,
            "alertThreshold": 40
        });
        fs::write(dir.path.join(GRID_JSON), custom.to_string()).expect("write custom grid");
        ensure_default_configs(&dir.path).expect("write defaults");

        let bundle = load_configs(&dir.path).expect("load configs");
        assert_eq!(bundle.grid.busy_max_slots, Some(60));
        assert_eq!(bundle.grid.thresholds().alert, 40);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema": 2, "apiBaseUrl": "http://localhost/"}"#,
        )
        .expect("overwrite app config");

        match load_configs(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema 2")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let grid = GridConfig {
            warning_threshold: 100,
            alert_threshold: 50,
            ..GridConfig::default()
        };
        assert!(grid.validate().is_err());
    }

    #[test]
    fn base_url_gets_trailing_slash_and_env_override() {
        let from_file = resolve_api_base_url(&sample_app(), |_| None).expect("resolve url");
        assert_eq!(from_file.as_str(), "https://schedule.example.com/api/");

        let from_env = resolve_api_base_url(&sample_app(), |key| match key {
            API_BASE_URL_ENV => Some("http://127.0.0.1:9000/v2/".to_string()),
            _ => None,
        })
        .expect("resolve url");
        assert_eq!(from_env.as_str(), "http://127.0.0.1:9000/v2/");
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut app = sample_app();
        app.api_base_url = "mailto:someone@example.com".to_string();
        assert!(matches!(
            resolve_api_base_url(&app, |_| None),
            Err(InfraError::InvalidConfig(_))
        ));
    }
}
