use crate::domain::consolidation::ConsolidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("no access token: set WEEKGRID_ACCESS_TOKEN or store one with `weekgrid token set`")]
    MissingAccessToken,
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),
    #[error("network error: {0}")]
    Network(String),
    #[error("Error loading schedule: {0}")]
    Fetch(String),
    #[error("Error updating schedule: {0}")]
    Submission(String),
    #[error("a submission is already in progress")]
    SubmissionInProgress,
}
