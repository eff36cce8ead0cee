//! One dashboard interaction.
//!
//! Sections are drawn in page order and each one recovers from its own
//! failures: a broken KPI query never hides the alerts table, an
//! unreachable model never hides the KPIs.

pub mod session;

pub use session::SessionState;

use crate::agent::prompts::{augment_question, CHART_FALLBACK_QUERY, INSIGHTS_QUERY};
use crate::agent::Answerer;
use crate::error::{DashResult, DashboardError};
use crate::metrics::{compute_kpis, ChartCache};
use crate::models::{PeriodWindow, ResultValue, Table};
use crate::render::{render, Page, RenderSurface};
use crate::store::{DataStore, ALERT_VIEW_SQL};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PAGE_TITLE: &str = "Dashboard";

pub const INVALID_RANGE_MESSAGE: &str = "A data inicial não pode ser maior que a data final.";

pub const OFFLINE_MESSAGE: &str =
    "Modelo de linguagem indisponível. Configure o Ollama em [model] ou remova --offline.";

/// Alert view columns shown in the alerts table, with their labels.
pub const ALERT_TABLE_COLUMNS: [(&str, &str); 3] = [
    ("alert_type", "Nome"),
    ("description", "Descrição"),
    ("risk_value", "Valor em risco"),
];

/// Settings for one dashboard.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// `alert_status` value counted by the KPIs.
    pub active_status: String,
    /// Ask the model for insights on every interaction.
    pub insights: bool,
    /// Show a spinner while waiting on the model.
    pub show_progress: bool,
    pub html_height: u32,
    pub chart_cache_capacity: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            active_status: "Ativo".to_string(),
            insights: true,
            show_progress: false,
            html_height: 400,
            chart_cache_capacity: crate::metrics::distribution::DEFAULT_CACHE_CAPACITY,
        }
    }
}

pub struct Dashboard<'a, S: DataStore + ?Sized, A: Answerer> {
    store: &'a S,
    answerer: Option<&'a A>,
    options: DashboardOptions,
    cache: ChartCache,
}

impl<'a, S: DataStore + ?Sized, A: Answerer> Dashboard<'a, S, A> {
    pub fn new(store: &'a S, answerer: Option<&'a A>, options: DashboardOptions) -> Self {
        let cache = ChartCache::new(options.chart_cache_capacity);
        Self {
            store,
            answerer,
            options,
            cache,
        }
    }

    pub fn cache(&self) -> &ChartCache {
        &self.cache
    }

    /// Run one interaction and return the drawn page.
    pub async fn run(&mut self, question: Option<&str>, window: &PeriodWindow) -> Page {
        let started = Instant::now();
        let mut page = Page::new(PAGE_TITLE).with_html_height(self.options.html_height);
        page.subtitle = Some(format!("Período: {}", window));

        let snapshot = self.store.query_table(ALERT_VIEW_SQL);
        match &snapshot {
            Ok(table) => debug!("Loaded alert snapshot with {} rows", table.len()),
            Err(e) => warn!("Alert snapshot unavailable: {}", e),
        }

        if let Some(question) = question.map(str::trim).filter(|q| !q.is_empty()) {
            page.begin_section("answer", "Resposta da IA");
            self.answer_section(&mut page, question, &snapshot).await;
        }

        page.begin_section("kpis", "Indicadores");
        self.kpi_section(&mut page, window);

        if self.options.insights && self.answerer.is_some() {
            page.begin_section("insights", "Insights");
            self.insights_section(&mut page, &snapshot).await;
        }

        page.begin_section("distribution", "Distribuição de Alertas por Tipo");
        self.distribution_section(&mut page, &snapshot).await;

        page.begin_section("alerts", "Alertas em Tempo Real");
        self.alerts_section(&mut page, &snapshot);

        info!(
            "Interaction finished in {:.2}s ({} sections, {} with errors)",
            started.elapsed().as_secs_f64(),
            page.sections.len(),
            page.error_count()
        );
        page
    }

    async fn answer_section(&self, page: &mut Page, question: &str, snapshot: &DashResult<Table>) {
        if self.answerer.is_none() {
            page.error(OFFLINE_MESSAGE);
            return;
        }

        let table = match snapshot {
            Ok(table) => table,
            Err(e) => {
                page.error(&format!("Erro ao processar a pergunta: {}", e));
                return;
            }
        };

        info!("Question: {}", question);
        match self.ask(&augment_question(question), table, "Gerando resposta...").await {
            Ok(value) => {
                let outcome = render(&value, page);
                debug!("Answer rendered as {:?}", outcome.path);
            }
            Err(e) => page.error(&format!("Erro ao processar a pergunta: {}", e)),
        }
    }

    fn kpi_section(&self, page: &mut Page, window: &PeriodWindow) {
        match compute_kpis(self.store, window, &self.options.active_status) {
            Ok(metrics) => page.kpis(&metrics),
            Err(e) if e.is_validation() && window.start > window.end => {
                page.error(INVALID_RANGE_MESSAGE)
            }
            Err(e) if e.is_validation() => page.error(&format!("Período inválido: {}", e)),
            Err(e) => {
                warn!("KPI computation failed: {}", e);
                page.error(&format!("Erro ao calcular indicadores: {}", e));
            }
        }
    }

    async fn insights_section(&self, page: &mut Page, snapshot: &DashResult<Table>) {
        let result = match snapshot {
            Ok(table) => self.ask(INSIGHTS_QUERY, table, "Gerando insights...").await,
            Err(e) => {
                page.error(&format!("Erro ao gerar insights: {}", e));
                return;
            }
        };

        match result {
            Ok(value) => {
                render(&value, page);
            }
            Err(e) => page.error(&format!("Erro ao gerar insights: {}", e)),
        }
    }

    async fn distribution_section(&mut self, page: &mut Page, snapshot: &DashResult<Table>) {
        let table = match snapshot {
            Ok(table) => table,
            Err(e) => {
                page.error(&format!("Erro ao gerar gráfico: {}", e));
                return;
            }
        };

        let error = match self.cache.get_or_build(table) {
            Ok(figure) => {
                debug!("Chart cache holds {} entries", self.cache.len());
                render(&ResultValue::NativeChartObject(figure), page);
                return;
            }
            Err(e) => e,
        };

        warn!("Distribution chart failed: {}", error);
        page.error(&format!("Erro ao gerar gráfico: {}", error));

        if self.answerer.is_none() {
            return;
        }
        match self.ask(CHART_FALLBACK_QUERY, table, "Gerando gráfico...").await {
            Ok(value) => {
                render(&value, page);
            }
            Err(e) => page.error(&format!("Erro ao gerar gráfico alternativo: {}", e)),
        }
    }

    fn alerts_section(&self, page: &mut Page, snapshot: &DashResult<Table>) {
        let alerts = match snapshot {
            Ok(table) => table.select(&ALERT_TABLE_COLUMNS),
            Err(e) => {
                page.error(&format!("Erro ao carregar alertas: {}", e));
                return;
            }
        };

        match alerts {
            Ok(table) => {
                render(&ResultValue::Table(table), page);
            }
            Err(e) => page.error(&format!("Erro ao carregar alertas: {}", e)),
        }
    }

    async fn ask(
        &self,
        instruction: &str,
        table: &Table,
        message: &'static str,
    ) -> DashResult<ResultValue> {
        let Some(answerer) = self.answerer else {
            return Err(DashboardError::Upstream(OFFLINE_MESSAGE.to_string()));
        };

        let spinner = self.spinner(message);
        let result = answerer.answer(instruction, table).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result
    }

    fn spinner(&self, message: &'static str) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}
