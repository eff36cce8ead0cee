//! Self-contained HTML page.
//!
//! Charts are drawn client-side with Plotly.js; tables get a filter box and
//! click-to-sort headers. Embedded HTML answers are isolated in an iframe.

use super::generator::cell_text;
use crate::models::{Figure, KpiMetric, Table};
use crate::render::{Element, Page, Section};
use serde_json::Value;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
:root {
    --primary-color: #009C6E;
    --text-color: #2c3e50;
    --light-gray: #e9ecef;
    --dark-gray: #495057;
    --danger-color: #dc3545;
    --success-color: #28a745;
    --border-radius: 15px;
    --box-shadow: 0 2px 8px rgba(0,0,0,0.08);
}
body {
    background-color: #f5f7fa;
    color: var(--text-color);
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif;
    margin: 0 auto;
    max-width: 1200px;
    padding: 24px;
}
h1 {
    font-size: 24px;
    font-weight: 600;
    letter-spacing: -0.5px;
    border-bottom: 2px solid var(--primary-color);
    padding-bottom: 10px;
}
.subtitle { color: var(--dark-gray); font-size: 13px; }
.section { margin-top: 25px; }
.section-header {
    background-color: white;
    padding: 12px;
    border-radius: 6px;
    box-shadow: var(--box-shadow);
    margin-bottom: 15px;
    font-size: 16px;
    font-weight: 600;
    border-left: 3px solid var(--primary-color);
}
.kpi-row { display: flex; gap: 20px; flex-wrap: wrap; }
.kpi-card {
    flex: 1;
    min-width: 220px;
    background-color: white;
    border-radius: var(--border-radius);
    padding: 20px;
    box-shadow: var(--box-shadow);
    border-top: 3px solid var(--primary-color);
}
.kpi-title {
    font-size: 13px;
    color: var(--dark-gray);
    text-transform: uppercase;
    font-weight: 600;
    letter-spacing: 0.5px;
    margin-bottom: 8px;
}
.kpi-value { font-size: 28px; font-weight: 700; margin-bottom: 8px; }
.kpi-trend { font-size: 12px; color: var(--dark-gray); }
.kpi-trend.positive { color: var(--success-color); }
.kpi-trend.negative { color: var(--danger-color); }
.error {
    background-color: #f8d7da;
    color: #721c24;
    border-radius: 6px;
    padding: 12px;
    margin-bottom: 12px;
}
.text-block { background: white; border-radius: 6px; padding: 12px; white-space: pre-wrap; }
pre { background: white; border-radius: 6px; padding: 12px; overflow-x: auto; }
.table-filter { margin-bottom: 8px; padding: 6px; width: 280px; }
table.data-table { border-collapse: collapse; width: 100%; background: white; }
table.data-table th, table.data-table td { padding: 6px 10px; border-bottom: 1px solid var(--light-gray); text-align: left; }
table.data-table th { cursor: pointer; user-select: none; }
table.data-table th:hover { color: var(--primary-color); }
iframe.embedded { width: 100%; border: none; background: white; }
img.answer-image { max-width: 100%; }
"#;

const TABLE_SCRIPT: &str = r#"
document.querySelectorAll('table.data-table').forEach(function (table) {
    var body = table.tBodies[0];
    table.querySelectorAll('th').forEach(function (th, index) {
        th.addEventListener('click', function () {
            var asc = th.dataset.order !== 'asc';
            th.dataset.order = asc ? 'asc' : 'desc';
            var rows = Array.prototype.slice.call(body.rows);
            rows.sort(function (a, b) {
                var x = a.cells[index].textContent, y = b.cells[index].textContent;
                var nx = parseFloat(x), ny = parseFloat(y);
                var cmp = (!isNaN(nx) && !isNaN(ny)) ? nx - ny : x.localeCompare(y, 'pt-BR');
                return asc ? cmp : -cmp;
            });
            rows.forEach(function (row) { body.appendChild(row); });
        });
    });
});
document.querySelectorAll('input.table-filter').forEach(function (input) {
    var table = document.getElementById(input.dataset.table);
    input.addEventListener('input', function () {
        var needle = input.value.toLowerCase();
        Array.prototype.forEach.call(table.tBodies[0].rows, function (row) {
            row.style.display = row.textContent.toLowerCase().indexOf(needle) >= 0 ? '' : 'none';
        });
    });
});
"#;

/// Generate the page as a standalone HTML document.
pub fn generate_html_report(page: &Page) -> String {
    let mut ids = IdGen::default();
    let mut body = String::new();

    for section in &page.sections {
        body.push_str(&render_section(section, &mut ids));
    }

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(&page.title)));
    if ids.charts > 0 {
        html.push_str(&format!("<script src=\"{}\"></script>\n", PLOTLY_CDN));
    }
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&page.title)));
    if let Some(ref subtitle) = page.subtitle {
        html.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape_html(subtitle)));
    }
    html.push_str(&body);
    html.push_str(&format!(
        "<p class=\"subtitle\">Gerado em {}</p>\n",
        page.generated_at.format("%d/%m/%Y %H:%M:%S UTC")
    ));
    if ids.tables > 0 {
        html.push_str(&format!("<script>{}</script>\n", TABLE_SCRIPT));
    }
    html.push_str("</body>\n</html>\n");

    html
}

#[derive(Default)]
struct IdGen {
    charts: usize,
    tables: usize,
}

fn render_section(section: &Section, ids: &mut IdGen) -> String {
    let mut output = format!(
        "<div class=\"section\" id=\"{}\">\n",
        escape_html(&section.id)
    );
    if !section.title.is_empty() {
        output.push_str(&format!(
            "<div class=\"section-header\">{}</div>\n",
            escape_html(&section.title)
        ));
    }
    for element in &section.elements {
        output.push_str(&render_element(element, ids));
    }
    output.push_str("</div>\n");
    output
}

fn render_element(element: &Element, ids: &mut IdGen) -> String {
    match element {
        Element::Table { table } => {
            ids.tables += 1;
            render_table(table, &format!("table-{}", ids.tables))
        }
        Element::Image { src } => format!(
            "<img class=\"answer-image\" src=\"{}\" alt=\"imagem\">\n",
            escape_html(src)
        ),
        Element::Chart { figure } => {
            ids.charts += 1;
            render_chart(figure, &format!("chart-{}", ids.charts))
        }
        Element::Html { markup, height } => format!(
            "<iframe class=\"embedded\" height=\"{}\" sandbox=\"allow-scripts\" srcdoc=\"{}\"></iframe>\n",
            height,
            escape_html(markup)
        ),
        Element::Text { text } => {
            format!("<div class=\"text-block\">{}</div>\n", escape_html(text))
        }
        Element::Pretty { value } => format!(
            "<pre>{}</pre>\n",
            escape_html(&serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
        ),
        Element::Error { message } => {
            format!("<div class=\"error\">❌ {}</div>\n", escape_html(message))
        }
        Element::Kpis { metrics } => render_kpis(metrics),
    }
}

fn render_kpis(metrics: &[KpiMetric]) -> String {
    let mut output = String::from("<div class=\"kpi-row\">\n");
    for metric in metrics {
        output.push_str(&format!(
            "<div class=\"kpi-card\">\n<div class=\"kpi-title\">{}</div>\n\
             <div class=\"kpi-value\">{}</div>\n\
             <div class=\"kpi-trend {}\">{}</div>\n</div>\n",
            escape_html(&metric.label),
            escape_html(&metric.display_value()),
            metric.trend().css_class(),
            escape_html(&metric.display_delta())
        ));
    }
    output.push_str("</div>\n");
    output
}

fn render_chart(figure: &Figure, id: &str) -> String {
    let config = if figure.config.is_empty() {
        serde_json::json!({ "responsive": true })
    } else {
        Value::Object(figure.config.clone())
    };
    format!(
        "<div id=\"{id}\"></div>\n<script>Plotly.newPlot('{id}', {}, {}, {});</script>\n",
        script_json(&Value::Array(figure.data.clone())),
        script_json(&Value::Object(figure.layout.clone())),
        script_json(&config),
        id = id
    )
}

fn render_table(table: &Table, id: &str) -> String {
    let mut output = format!(
        "<input class=\"table-filter\" data-table=\"{id}\" placeholder=\"Filtrar...\">\n\
         <table class=\"data-table\" id=\"{id}\">\n<thead><tr>",
        id = id
    );
    for column in &table.columns {
        output.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    output.push_str("</tr></thead>\n<tbody>\n");
    for row in &table.rows {
        output.push_str("<tr>");
        for cell in row {
            output.push_str(&format!("<td>{}</td>", escape_html(&cell_text(cell))));
        }
        output.push_str("</tr>\n");
    }
    output.push_str("</tbody>\n</table>\n");
    output
}

/// JSON safe to inline inside a `<script>` element.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
