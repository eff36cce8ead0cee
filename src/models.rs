//! Data models for the alert dashboard.
//!
//! This module contains the values that flow through one interaction:
//! answers from the query engine, tables, chart figures, period windows
//! and KPI metrics.

use crate::error::{DashResult, DashboardError};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Tabular result: ordered columns plus rows of JSON scalar cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from an array of JSON records.
    ///
    /// Columns follow first-seen order across all records. Returns `None`
    /// when any element is not an object.
    pub fn from_records(records: &[Value]) -> Option<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let object = record.as_object()?;
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .filter_map(Value::as_object)
            .map(|object| {
                columns
                    .iter()
                    .map(|c| object.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Some(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the values of one column.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Project and rename columns: each pair is `(source, label)`.
    pub fn select(&self, columns: &[(&str, &str)]) -> DashResult<Table> {
        let indices = columns
            .iter()
            .map(|(source, _)| {
                self.column_index(source)
                    .ok_or_else(|| DashboardError::Parse(format!("missing column: {}", source)))
            })
            .collect::<DashResult<Vec<_>>>()?;

        Ok(Table {
            columns: columns.iter().map(|(_, label)| label.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(object)
            })
            .collect()
    }
}

/// An interactive chart: Plotly-style `data` traces plus `layout`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl Figure {
    /// Build a figure from a parsed chart specification.
    ///
    /// Missing `data` means no traces and missing `layout` means an empty
    /// layout; present fields of the wrong shape are a parse error.
    pub fn from_value(value: &Value) -> DashResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DashboardError::Parse("chart spec is not a JSON object".to_string()))?;

        let data = match object.get("data") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(traces)) => traces.clone(),
            Some(_) => {
                return Err(DashboardError::Parse(
                    "chart spec `data` must be an array".to_string(),
                ))
            }
        };

        let layout = match object.get("layout") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(layout)) => layout.clone(),
            Some(_) => {
                return Err(DashboardError::Parse(
                    "chart spec `layout` must be an object".to_string(),
                ))
            }
        };

        let config = match object.get("config") {
            Some(Value::Object(config)) => config.clone(),
            _ => Map::new(),
        };

        Ok(Self {
            data,
            layout,
            config,
        })
    }

    /// Title text from the layout, if any.
    pub fn title(&self) -> Option<&str> {
        match self.layout.get("title")? {
            Value::String(s) => Some(s),
            Value::Object(o) => o.get("text").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// A value returned by the natural-language query engine.
///
/// Exactly one variant is active; the classifier maps every variant to a
/// rendering path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    Table(Table),
    ImageBytes(Vec<u8>),
    ImagePath(PathBuf),
    DataUri(String),
    EmbeddedChartMarkup(String),
    HtmlDocument(String),
    JsonChartSpec(Value),
    PlainText(String),
    NativeChartObject(Figure),
}

impl ResultValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ResultValue::Table(_) => "table",
            ResultValue::ImageBytes(_) => "image_bytes",
            ResultValue::ImagePath(_) => "image_path",
            ResultValue::DataUri(_) => "data_uri",
            ResultValue::EmbeddedChartMarkup(_) => "embedded_chart_markup",
            ResultValue::HtmlDocument(_) => "html_document",
            ResultValue::JsonChartSpec(_) => "json_chart_spec",
            ResultValue::PlainText(_) => "plain_text",
            ResultValue::NativeChartObject(_) => "native_chart_object",
        }
    }
}

/// Time interval used for current-vs-previous comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PeriodWindow {
    /// Create a window without validating it; see [`PeriodWindow::validate`].
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Window covering whole calendar days, from the first instant of
    /// `start` to the last microsecond of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        let start_dt = start.and_time(NaiveTime::MIN);
        let end_dt = end
            .and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::days(1) - Duration::microseconds(1))
            .unwrap_or(NaiveDateTime::MAX);
        Self::new(start_dt, end_dt)
    }

    pub fn validate(&self) -> DashResult<()> {
        if self.start > self.end {
            return Err(DashboardError::Validation(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end.signed_duration_since(self.start)
    }

    /// The immediately preceding window of identical duration.
    ///
    /// Fails with a validation error when that window would start before
    /// the earliest representable date.
    pub fn previous(&self) -> DashResult<PeriodWindow> {
        let start = self
            .start
            .checked_sub_signed(self.duration())
            .ok_or_else(|| {
                DashboardError::Validation(format!(
                    "the period before {} is out of the supported date range",
                    self
                ))
            })?;
        Ok(PeriodWindow {
            start,
            end: self.start,
        })
    }
}

impl fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }
}

/// Whether a decrease or an increase of a metric is good news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendPolarity {
    LowerIsBetter,
    HigherIsBetter,
}

/// Framing of a delta once polarity is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Positive,
    Negative,
}

impl Trend {
    pub fn emoji(&self) -> &'static str {
        match self {
            Trend::Positive => "🟢",
            Trend::Negative => "🔴",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Trend::Positive => "positive",
            Trend::Negative => "negative",
        }
    }
}

/// The KPIs shown at the top of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiKind {
    ActiveAlerts,
    ConfirmationRate,
    TotalRisk,
}

impl KpiKind {
    pub const ALL: [KpiKind; 3] = [
        KpiKind::ActiveAlerts,
        KpiKind::ConfirmationRate,
        KpiKind::TotalRisk,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            KpiKind::ActiveAlerts => "Alertas Ativos",
            KpiKind::ConfirmationRate => "Taxa de Confirmação",
            KpiKind::TotalRisk => "Risco Total",
        }
    }

    pub fn polarity(&self) -> TrendPolarity {
        match self {
            KpiKind::ActiveAlerts | KpiKind::TotalRisk => TrendPolarity::LowerIsBetter,
            KpiKind::ConfirmationRate => TrendPolarity::HigherIsBetter,
        }
    }
}

impl fmt::Display for KpiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One KPI with its current and previous period values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMetric {
    pub kind: KpiKind,
    pub label: String,
    pub current_value: f64,
    pub previous_value: f64,
    pub delta: f64,
    pub trend_polarity: TrendPolarity,
}

impl KpiMetric {
    pub fn new(kind: KpiKind, current_value: f64, previous_value: f64) -> Self {
        let delta = match kind {
            KpiKind::ActiveAlerts => current_value - previous_value,
            KpiKind::ConfirmationRate | KpiKind::TotalRisk => {
                round_to(current_value - previous_value, 2)
            }
        };
        Self {
            kind,
            label: kind.label().to_string(),
            current_value,
            previous_value,
            delta,
            trend_polarity: kind.polarity(),
        }
    }

    /// Positive only when the delta strictly improves the metric.
    pub fn trend(&self) -> Trend {
        let improved = match self.trend_polarity {
            TrendPolarity::LowerIsBetter => self.delta < 0.0,
            TrendPolarity::HigherIsBetter => self.delta > 0.0,
        };
        if improved {
            Trend::Positive
        } else {
            Trend::Negative
        }
    }

    pub fn display_value(&self) -> String {
        match self.kind {
            KpiKind::ActiveAlerts => format!("{}", self.current_value.round() as i64),
            KpiKind::ConfirmationRate => format!("{}%", trim_number(self.current_value)),
            KpiKind::TotalRisk => {
                format!("R$ {}", crate::metrics::format_brl(self.current_value))
            }
        }
    }

    pub fn display_delta(&self) -> String {
        let sign = if self.delta < 0.0 { "-" } else { "+" };
        let magnitude = trim_number(self.delta.abs());
        match self.kind {
            KpiKind::ConfirmationRate => format!("{}{}% vs período anterior", sign, magnitude),
            _ => format!("{}{} vs período anterior", sign, magnitude),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// At most two decimals, without trailing zeros.
fn trim_number(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
