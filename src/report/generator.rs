//! Markdown and JSON page generation.

use crate::models::{Figure, KpiMetric, Table};
use crate::render::{Element, Page, Section};
use anyhow::Result;
use serde_json::Value;

/// Generate a complete Markdown page.
pub fn generate_markdown_report(page: &Page) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", page.title));
    output.push_str(&generate_metadata_section(page));
    output.push_str(&generate_table_of_contents(page));

    for section in &page.sections {
        output.push_str(&generate_section(section));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(page: &Page) -> String {
    let mut section = String::new();

    if let Some(ref subtitle) = page.subtitle {
        section.push_str(&format!("- **{}**\n", subtitle));
    }
    section.push_str(&format!(
        "- **Gerado em:** {}\n",
        page.generated_at.format("%d/%m/%Y %H:%M:%S UTC")
    ));
    let failed = page.error_count();
    if failed > 0 {
        section.push_str(&format!("- **Seções com erro:** {}\n", failed));
    }
    section.push('\n');

    section
}

fn generate_table_of_contents(page: &Page) -> String {
    if page.sections.len() < 2 {
        return String::new();
    }

    let mut toc = String::new();
    toc.push_str("## Sumário\n\n");
    for section in &page.sections {
        let marker = if section.has_error() { " ⚠️" } else { "" };
        toc.push_str(&format!(
            "- [{}](#{}){}\n",
            section.title,
            heading_anchor(&section.title),
            marker
        ));
    }
    toc.push('\n');

    toc
}

/// Anchor GitHub generates for a heading: lowercased, punctuation dropped,
/// spaces turned into hyphens.
fn heading_anchor(title: &str) -> String {
    title
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

fn generate_section(section: &Section) -> String {
    let mut output = String::new();

    if !section.title.is_empty() {
        output.push_str(&format!("## {}\n\n", section.title));
    }
    for element in &section.elements {
        output.push_str(&generate_element(element));
    }

    output
}

fn generate_element(element: &Element) -> String {
    match element {
        Element::Table { table } => markdown_table(table),
        Element::Image { src } => format!("![imagem]({})\n\n", src),
        Element::Chart { figure } => chart_block(figure),
        Element::Html { markup, .. } => format!(
            "<details>\n<summary>Conteúdo HTML</summary>\n\n```html\n{}\n```\n</details>\n\n",
            markup
        ),
        Element::Text { text } => format!("{}\n\n", text.trim_end()),
        Element::Pretty { value } => format!(
            "```json\n{}\n```\n\n",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        ),
        Element::Error { message } => format!("> ❌ **Erro:** {}\n\n", message),
        Element::Kpis { metrics } => kpi_table(metrics),
    }
}

fn kpi_table(metrics: &[KpiMetric]) -> String {
    let mut output = String::new();

    output.push_str("| Indicador | Valor | Variação |\n");
    output.push_str("|:---|---:|:---|\n");
    for metric in metrics {
        output.push_str(&format!(
            "| {} | {} | {} {} |\n",
            metric.label,
            metric.display_value(),
            metric.trend().emoji(),
            metric.display_delta()
        ));
    }
    output.push('\n');

    output
}

fn chart_block(figure: &Figure) -> String {
    let mut output = String::new();

    if let Some(title) = figure.title() {
        output.push_str(&format!("📊 **{}**\n\n", title));
    }
    let spec = serde_json::json!({ "data": figure.data, "layout": figure.layout });
    output.push_str("```json\n");
    output.push_str(&serde_json::to_string_pretty(&spec).unwrap_or_else(|_| spec.to_string()));
    output.push_str("\n```\n\n");

    output
}

fn markdown_table(table: &Table) -> String {
    if table.columns.is_empty() {
        return "*Tabela vazia*\n\n".to_string();
    }

    let mut output = String::new();
    let header: Vec<String> = table.columns.iter().map(|c| escape_cell(c)).collect();
    output.push_str(&format!("| {} |\n", header.join(" | ")));
    output.push_str(&format!("|{}\n", ":---|".repeat(table.columns.len())));

    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|v| escape_cell(&cell_text(v))).collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    output.push_str(&format!("\n*{} linha(s)*\n\n", table.len()));

    output
}

/// Display text of a table cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn generate_footer() -> String {
    "---\n\n*Gerado por alertdash*\n".to_string()
}

/// Generate the page as JSON.
pub fn generate_json_report(page: &Page) -> Result<String> {
    serde_json::to_string_pretty(page).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiKind;
    use crate::render::RenderSurface;
    use serde_json::json;

    fn create_test_page() -> Page {
        let mut page = Page::new("Dashboard");
        page.subtitle = Some("Período: 08/03/2024 → 14/03/2024".to_string());

        page.begin_section("kpis", "Indicadores");
        page.kpis(&[
            KpiMetric::new(KpiKind::ActiveAlerts, 10.0, 14.0),
            KpiMetric::new(KpiKind::TotalRisk, 1234.5, 1000.0),
        ]);

        page.begin_section("alerts", "Alertas em Tempo Real");
        page.table(
            &Table::from_records(&[json!({ "Nome": "Fraude | grave", "Valor em risco": 10.5 })])
                .unwrap(),
        );
        page.error("Erro ao gerar gráfico: sem dados");
        page
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_page());

        assert!(markdown.starts_with("# Dashboard\n"));
        assert!(markdown.contains("- **Período: 08/03/2024 → 14/03/2024**"));
        assert!(markdown.contains("- **Seções com erro:** 1"));
        assert!(markdown.contains("- [Alertas em Tempo Real](#alertas-em-tempo-real) ⚠️"));
        assert!(markdown.contains("\n## Alertas em Tempo Real\n"));
        assert!(!markdown.contains("{#"));
        assert!(markdown.contains("| Alertas Ativos | 10 | 🟢 -4 vs período anterior |"));
        assert!(markdown.contains("| Risco Total | R$ 1.234,50 | 🔴 +234.5 vs período anterior |"));
        assert!(markdown.contains("| Fraude \\| grave | 10.5 |"));
        assert!(markdown.contains("> ❌ **Erro:** Erro ao gerar gráfico: sem dados"));
    }

    #[test]
    fn test_heading_anchor_matches_github_slugs() {
        assert_eq!(
            heading_anchor("Distribuição de Alertas por Tipo"),
            "distribuição-de-alertas-por-tipo"
        );
        assert_eq!(heading_anchor("Resposta da IA"), "resposta-da-ia");
        assert_eq!(heading_anchor("Insights (modelo): v2"), "insights-modelo-v2");
    }

    #[test]
    fn test_chart_and_pretty_blocks() {
        let figure =
            Figure::from_value(&json!({ "data": [], "layout": { "title": "Top 5" } })).unwrap();
        let block = generate_element(&Element::Chart { figure });
        assert!(block.starts_with("📊 **Top 5**"));
        assert!(block.contains("```json"));

        let pretty = generate_element(&Element::Pretty {
            value: json!({ "total": 3 }),
        });
        assert!(pretty.contains("\"total\": 3"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_page()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["title"], json!("Dashboard"));
        assert_eq!(value["sections"][0]["elements"][0]["type"], json!("kpis"));
        assert_eq!(value["sections"][1]["elements"][1]["type"], json!("error"));
        assert!(value.get("html_height").is_none());
    }
}
