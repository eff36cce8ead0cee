//! Error taxonomy for the dashboard.
//!
//! Every section of the page recovers from these locally; none of them is
//! allowed to abort a whole interaction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Malformed embedded chart specification or malformed JSON.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),
    /// Missing or unreadable file where a path was expected.
    #[error("IO_ERROR: {0}")]
    Io(String),
    /// Invalid user input, e.g. a date range whose start is after its end.
    #[error("VALIDATION_ERROR: {0}")]
    Validation(String),
    /// The answering collaborator failed or returned an unusable shape.
    #[error("UPSTREAM_ERROR: {0}")]
    Upstream(String),
    /// The relational store is unavailable or rejected a query.
    #[error("STORE_ERROR: {0}")]
    Store(String),
}

impl DashboardError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for DashboardError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(value: reqwest::Error) -> Self {
        Self::Upstream(value.to_string())
    }
}

pub type DashResult<T> = Result<T, DashboardError>;
