//! Interaction-scoped session state.
//!
//! Replaces the implicit per-user state of a hosted dashboard: it is loaded
//! before an interaction, passed in explicitly, and written back afterwards.

use crate::agent::prompts::EXAMPLE_QUESTIONS;
use crate::error::{DashResult, DashboardError};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub selected_question: Option<usize>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl SessionState {
    /// Load from `path`; a missing file is a fresh session.
    pub fn load(path: &Path) -> DashResult<Self> {
        if !path.exists() {
            debug!("No session file at {}, starting fresh", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> DashResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Session saved to {}", path.display());
        Ok(())
    }

    /// Select one of the canned questions (zero-based) as the query.
    pub fn select_example(&mut self, index: usize) -> DashResult<&str> {
        let question = EXAMPLE_QUESTIONS.get(index).copied().ok_or_else(|| {
            DashboardError::Validation(format!(
                "example question {} does not exist (1-{})",
                index + 1,
                EXAMPLE_QUESTIONS.len()
            ))
        })?;
        self.query = question.to_string();
        self.selected_question = Some(index);
        Ok(question)
    }

    /// Set a free-text query. The example highlight only survives when the
    /// text still matches it.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.selected_question = EXAMPLE_QUESTIONS.iter().position(|q| *q == query);
    }

    /// Remember a date range. Inverted ranges are not stored.
    pub fn set_range(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        if start > end {
            return false;
        }
        self.start_date = Some(start);
        self.end_date = Some(end);
        true
    }

    /// The stored range, or the last `window_days` days ending `today`.
    pub fn range_or_default(&self, today: NaiveDate, window_days: i64) -> (NaiveDate, NaiveDate) {
        let end = self.end_date.unwrap_or(today);
        let start = self
            .start_date
            .unwrap_or_else(|| today - Duration::days(window_days));
        (start, end)
    }
}
