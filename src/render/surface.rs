//! Rendering surface abstraction and the recorded page.
//!
//! The classifier only talks to [`RenderSurface`]. [`Page`] is the surface
//! used by the binary: it records every draw call in sections so that the
//! report module can turn it into Markdown, HTML or JSON.

use crate::models::{Figure, KpiMetric, Table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Draw calls understood by a rendering surface.
pub trait RenderSurface {
    /// Sortable, filterable table.
    fn table(&mut self, table: &Table);
    /// Image from a `data:` URI or a URL.
    fn image(&mut self, src: &str);
    /// Interactive chart.
    fn chart(&mut self, figure: &Figure);
    /// Embedded HTML markup.
    fn html(&mut self, markup: &str);
    /// Plain (markdown) text.
    fn text(&mut self, text: &str);
    /// Generic structured pretty-print.
    fn pretty(&mut self, value: &Value);
    /// Visible inline error annotation.
    fn error(&mut self, message: &str);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Table { table: Table },
    Image { src: String },
    Chart { figure: Figure },
    Html { markup: String, height: u32 },
    Text { text: String },
    Pretty { value: Value },
    Error { message: String },
    Kpis { metrics: Vec<KpiMetric> },
}

impl Element {
    pub fn is_error(&self) -> bool {
        matches!(self, Element::Error { .. })
    }
}

/// A titled part of the page that succeeds or fails on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub elements: Vec<Element>,
}

impl Section {
    pub fn has_error(&self) -> bool {
        self.elements.iter().any(Element::is_error)
    }
}

/// The whole page produced by one interaction.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    pub subtitle: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
    #[serde(skip)]
    html_height: u32,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            generated_at: Utc::now(),
            sections: Vec::new(),
            html_height: 400,
        }
    }

    pub fn with_html_height(mut self, height: u32) -> Self {
        self.html_height = height;
        self
    }

    /// Start a new section; subsequent draw calls land in it.
    pub fn begin_section(&mut self, id: &str, title: &str) {
        self.sections.push(Section {
            id: id.to_string(),
            title: title.to_string(),
            elements: Vec::new(),
        });
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Draw the KPI cards.
    pub fn kpis(&mut self, metrics: &[KpiMetric]) {
        self.push(Element::Kpis {
            metrics: metrics.to_vec(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.sections.iter().filter(|s| s.has_error()).count()
    }

    fn push(&mut self, element: Element) {
        if self.sections.is_empty() {
            self.begin_section("main", "");
        }
        if let Some(section) = self.sections.last_mut() {
            section.elements.push(element);
        }
    }
}

impl RenderSurface for Page {
    fn table(&mut self, table: &Table) {
        self.push(Element::Table {
            table: table.clone(),
        });
    }

    fn image(&mut self, src: &str) {
        self.push(Element::Image {
            src: src.to_string(),
        });
    }

    fn chart(&mut self, figure: &Figure) {
        self.push(Element::Chart {
            figure: figure.clone(),
        });
    }

    fn html(&mut self, markup: &str) {
        let height = self.html_height;
        self.push(Element::Html {
            markup: markup.to_string(),
            height,
        });
    }

    fn text(&mut self, text: &str) {
        self.push(Element::Text {
            text: text.to_string(),
        });
    }

    fn pretty(&mut self, value: &Value) {
        self.push(Element::Pretty {
            value: value.clone(),
        });
    }

    fn error(&mut self, message: &str) {
        self.push(Element::Error {
            message: message.to_string(),
        });
    }
}
