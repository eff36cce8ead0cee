//! Alert-type distribution chart and its memoization.

use crate::error::{DashResult, DashboardError};
use crate::models::{round_to, Figure, Table};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::debug;

/// Primary colour for every chart on the dashboard.
pub const BRAND_COLOR: &str = "#009C6E";

/// Default number of memoized charts.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Build a bar chart with the percentage of alerts per `alert_type`.
pub fn build_distribution_chart(snapshot: &Table) -> DashResult<Figure> {
    let started = Instant::now();

    let column = snapshot
        .column("alert_type")
        .ok_or_else(|| DashboardError::Parse("missing column: alert_type".to_string()))?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in column {
        let key = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        *counts.entry(key).or_default() += 1;
    }

    if counts.is_empty() {
        return Err(DashboardError::Parse("no alert types to chart".to_string()));
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total: usize = counts.iter().map(|(_, count)| count).sum();
    let labels: Vec<&str> = counts.iter().map(|(label, _)| label.as_str()).collect();
    let percentages: Vec<f64> = counts
        .iter()
        .map(|(_, count)| round_to(*count as f64 / total as f64 * 100.0, 1))
        .collect();
    let max = percentages.iter().cloned().fold(0.0, f64::max);

    let trace = json!({
        "type": "bar",
        "x": labels,
        "y": percentages,
        "marker": { "color": BRAND_COLOR },
        "text": percentages.iter().map(|p| format!("{}%", p)).collect::<Vec<_>>(),
        "textposition": "auto",
    });

    let layout = object(json!({
        "title": "Distribuição de Alertas por Tipo (%)",
        "paper_bgcolor": "rgba(0,0,0,0)",
        "plot_bgcolor": "rgba(0,0,0,0)",
        "height": 400,
        "margin": { "l": 20, "r": 20, "t": 40, "b": 20 },
        "hovermode": "closest",
        "xaxis": { "tickangle": -45, "title": { "text": "Tipo de Alerta" } },
        "yaxis": { "range": [0.0, max * 1.1], "title": { "text": "Porcentagem (%)" } },
    }));

    let config = object(json!({
        "staticPlot": true,
        "displayModeBar": false,
        "responsive": true,
    }));

    debug!(
        "Tempo para gerar gráfico: {:.2} segundos",
        started.elapsed().as_secs_f64()
    );

    Ok(Figure {
        data: vec![trace],
        layout,
        config,
    })
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

type SnapshotKey = [u8; 32];

/// Bounded least-recently-used cache of distribution charts, keyed by a
/// content hash of the serialized snapshot.
#[derive(Debug)]
pub struct ChartCache {
    capacity: usize,
    entries: HashMap<SnapshotKey, Figure>,
    order: VecDeque<SnapshotKey>,
    hits: u64,
    misses: u64,
}

impl Default for ChartCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ChartCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn snapshot_key(snapshot: &Table) -> DashResult<SnapshotKey> {
        let bytes = serde_json::to_vec(snapshot)?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }

    /// Return the memoized chart for `snapshot`, building it on a miss.
    /// Failed builds are not cached.
    pub fn get_or_build(&mut self, snapshot: &Table) -> DashResult<Figure> {
        let key = Self::snapshot_key(snapshot)?;

        if let Some(figure) = self.entries.get(&key).cloned() {
            self.hits += 1;
            self.touch(key);
            debug!("Chart cache hit ({} entries)", self.entries.len());
            return Ok(figure);
        }

        self.misses += 1;
        let figure = build_distribution_chart(snapshot)?;
        self.insert(key, figure.clone());
        Ok(figure)
    }

    fn touch(&mut self, key: SnapshotKey) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }

    fn insert(&mut self, key: SnapshotKey, figure: Figure) {
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                debug!("Evicted least recently used chart");
            }
        }
        self.entries.insert(key, figure);
        self.order.push_back(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
