//! Relational store access.
//!
//! The dashboard only needs two things from the store: scalar aggregates
//! for the KPIs and the wide alert view as a table snapshot.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::{DashResult, DashboardError};
use crate::models::Table;
use chrono::NaiveDateTime;
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

/// Wide join view over alerts and their related entities.
pub const ALERT_VIEW_SQL: &str = "
    SELECT a.*,
           p.name AS provider_name, p.type AS provider_type,
           pt.name AS patient_name, pt.age AS patient_age,
           pr.code AS procedure_code, pr.name AS procedure_name,
           m.code AS material_code, m.name AS material_name,
           md.code AS medication_code, md.name AS medication_name,
           hs.admission_date, hs.discharge_date, hs.department,
           ptc.name AS protocol_name, r.score AS recommendation_score
    FROM alerts a
    LEFT JOIN providers p ON a.provider_id = p.provider_id
    LEFT JOIN patients pt ON a.patient_id = pt.patient_id
    LEFT JOIN procedures pr ON a.procedure_id = pr.procedure_id
    LEFT JOIN materials m ON a.material_id = m.material_id
    LEFT JOIN medications md ON a.medication_id = md.medication_id
    LEFT JOIN hospitalizations hs ON a.hospitalization_id = hs.hospitalization_id
    LEFT JOIN protocols ptc ON pr.protocol_id = ptc.protocol_id
    LEFT JOIN recommendations r ON a.patient_id = r.patient_id
                                AND a.provider_id = r.provider_id
                                AND a.hospital_id = r.hospital_id
";

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Timestamp(NaiveDateTime),
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Text(value) => value.to_sql(),
            SqlParam::Timestamp(value) => Ok(ToSqlOutput::from(format_timestamp(value))),
        }
    }
}

/// Timestamps are stored as `YYYY-MM-DD HH:MM:SS[.ffffff]` text and compared
/// lexicographically by `BETWEEN`.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// The relational store as seen by the dashboard.
pub trait DataStore {
    /// Run an aggregate query and return its first column of the first row.
    ///
    /// `Ok(None)` is a NULL aggregate; failures are errors and must never be
    /// confused with NULL.
    fn query_scalar(&self, sql: &str, params: &[SqlParam]) -> DashResult<Option<f64>>;

    /// Run a query and return the full result set.
    fn query_table(&self, sql: &str) -> DashResult<Table>;
}

/// Stand-in for a store that could not be opened.
///
/// Every call fails with the original reason so that each dashboard section
/// reports it independently.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl DataStore for UnavailableStore {
    fn query_scalar(&self, _sql: &str, _params: &[SqlParam]) -> DashResult<Option<f64>> {
        Err(DashboardError::Store(self.reason.clone()))
    }

    fn query_table(&self, _sql: &str) -> DashResult<Table> {
        Err(DashboardError::Store(self.reason.clone()))
    }
}
