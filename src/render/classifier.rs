//! Result classification and rendering.
//!
//! Answers from the query engine are untrusted in format: the engine is told
//! to wrap charts in `<plotly></plotly>`, but it also returns raw JSON, HTML
//! artifacts, image references or plain prose. [`classify`] maps every
//! [`ResultValue`] to exactly one [`RenderPlan`]; [`render`] issues the
//! matching draw call. Parse and I/O failures never escape: they become a
//! visible error annotation followed by a textual fallback.
//!
//! Priority for text answers:
//! 1. `data:image...` URI → image
//! 2. `<plotly>{...}</plotly>` → chart (parse failure → error + raw text)
//! 3. `*.html` or `temp_chart` → embedded HTML, from file when it exists
//! 4. whole-string JSON object with `data` and `layout` → chart
//! 5. image file or image URL → image
//! 6. plain text

use super::surface::RenderSurface;
use crate::error::DashboardError;
use crate::models::{Figure, ResultValue, Table};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

static PLOTLY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<plotly>(.*?)</plotly>").expect("valid plotly block pattern")
});

const DATA_URI_IMAGE_PREFIX: &str = "data:image";
const HTML_SUFFIX: &str = ".html";
const TEMP_CHART_MARKER: &str = "temp_chart";
const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".bmp"];

/// Longest string still probed as a file path or URL.
const MAX_REFERENCE_LEN: usize = 4096;

/// Which presentation path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPath {
    Table,
    Image,
    Chart,
    Html,
    Text,
    Pretty,
}

/// What to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    Table(Table),
    /// `src` for an image element: a `data:` URI or a URL.
    Image(String),
    Chart(Figure),
    Html(String),
    Text(String),
    Pretty(Value),
}

impl RenderPlan {
    pub fn path(&self) -> RenderPath {
        match self {
            RenderPlan::Table(_) => RenderPath::Table,
            RenderPlan::Image(_) => RenderPath::Image,
            RenderPlan::Chart(_) => RenderPath::Chart,
            RenderPlan::Html(_) => RenderPath::Html,
            RenderPlan::Text(_) => RenderPath::Text,
            RenderPlan::Pretty(_) => RenderPath::Pretty,
        }
    }
}

/// A render plan plus the error recovered on the way to it, if any.
#[derive(Debug)]
pub struct Classification {
    pub plan: RenderPlan,
    pub recovered: Option<DashboardError>,
}

impl Classification {
    fn ok(plan: RenderPlan) -> Self {
        Self {
            plan,
            recovered: None,
        }
    }

    fn fallback(plan: RenderPlan, error: DashboardError) -> Self {
        Self {
            plan,
            recovered: Some(error),
        }
    }
}

/// Result of a render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutcome {
    pub path: RenderPath,
    pub fell_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decide how to present a value. Total: every input yields a plan.
pub fn classify(value: &ResultValue) -> Classification {
    match value {
        ResultValue::Table(table) => Classification::ok(RenderPlan::Table(table.clone())),
        ResultValue::ImageBytes(bytes) => classify_image_bytes(bytes),
        ResultValue::ImagePath(path) => classify_image_path(path),
        ResultValue::DataUri(text)
        | ResultValue::EmbeddedChartMarkup(text)
        | ResultValue::HtmlDocument(text)
        | ResultValue::PlainText(text) => classify_text(text),
        ResultValue::JsonChartSpec(Value::String(text)) => classify_text(text),
        ResultValue::JsonChartSpec(spec) => classify_json(spec),
        ResultValue::NativeChartObject(figure) => {
            Classification::ok(RenderPlan::Chart(figure.clone()))
        }
    }
}

/// Decide how to present a free-form text answer.
pub fn classify_text(text: &str) -> Classification {
    if text.starts_with(DATA_URI_IMAGE_PREFIX) {
        return Classification::ok(RenderPlan::Image(text.to_string()));
    }

    if let Some(captures) = PLOTLY_BLOCK.captures(text) {
        let inner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        return match parse_chart_spec(inner) {
            Ok(figure) => Classification::ok(RenderPlan::Chart(figure)),
            Err(e) => Classification::fallback(RenderPlan::Text(text.to_string()), e),
        };
    }

    if text.ends_with(HTML_SUFFIX) || text.contains(TEMP_CHART_MARKER) {
        return classify_html(text);
    }

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) {
        if object.contains_key("data") && object.contains_key("layout") {
            if let Ok(figure) = Figure::from_value(&Value::Object(object)) {
                return Classification::ok(RenderPlan::Chart(figure));
            }
        }
    }

    match image_reference(text) {
        Some(src) => Classification::ok(RenderPlan::Image(src)),
        None => Classification::ok(RenderPlan::Text(text.to_string())),
    }
}

/// Classify and issue the draw calls: an error annotation when a fallback
/// happened, then exactly one content call.
pub fn render<S: RenderSurface + ?Sized>(value: &ResultValue, surface: &mut S) -> RenderOutcome {
    let Classification { plan, recovered } = classify(value);
    let path = plan.path();
    debug!("Rendering {} as {:?}", value.kind(), path);

    let error = recovered.map(|e| {
        warn!("Recovered while rendering {}: {}", value.kind(), e);
        let message = annotation(&e);
        surface.error(&message);
        message
    });

    match &plan {
        RenderPlan::Table(table) => surface.table(table),
        RenderPlan::Image(src) => surface.image(src),
        RenderPlan::Chart(figure) => surface.chart(figure),
        RenderPlan::Html(markup) => surface.html(markup),
        RenderPlan::Text(text) => surface.text(text),
        RenderPlan::Pretty(value) => surface.pretty(value),
    }

    RenderOutcome {
        path,
        fell_back: error.is_some(),
        error,
    }
}

fn annotation(error: &DashboardError) -> String {
    match error {
        DashboardError::Parse(m) => format!("Erro ao interpretar o gráfico: {}", m),
        DashboardError::Io(m) => format!("Erro ao ler o arquivo: {}", m),
        other => format!("Erro ao exibir o resultado: {}", other),
    }
}

fn parse_chart_spec(text: &str) -> Result<Figure, DashboardError> {
    let spec: Value = serde_json::from_str(text.trim())?;
    Figure::from_value(&spec)
}

fn classify_html(text: &str) -> Classification {
    let path = Path::new(text);
    if is_probable_path(text) && path.exists() {
        return match fs::read_to_string(path) {
            Ok(markup) => Classification::ok(RenderPlan::Html(markup)),
            Err(e) => Classification::fallback(
                RenderPlan::Text(text.to_string()),
                DashboardError::Io(format!("{}: {}", path.display(), e)),
            ),
        };
    }
    Classification::ok(RenderPlan::Html(text.to_string()))
}

fn classify_json(spec: &Value) -> Classification {
    let is_chart = spec
        .as_object()
        .map(|o| o.contains_key("data") && o.contains_key("layout"))
        .unwrap_or(false);

    if !is_chart {
        return Classification::ok(RenderPlan::Pretty(spec.clone()));
    }

    match Figure::from_value(spec) {
        Ok(figure) => Classification::ok(RenderPlan::Chart(figure)),
        Err(e) => Classification::fallback(RenderPlan::Pretty(spec.clone()), e),
    }
}

fn classify_image_bytes(bytes: &[u8]) -> Classification {
    match sniff_image_mime(bytes) {
        Some(mime) => Classification::ok(RenderPlan::Image(data_uri(mime, bytes))),
        None => Classification::fallback(
            RenderPlan::Text(format!("<{} bytes de dados binários>", bytes.len())),
            DashboardError::Parse("bytes are not a recognised image format".to_string()),
        ),
    }
}

fn classify_image_path(path: &Path) -> Classification {
    let raw = path.display().to_string();
    match fs::read(path) {
        Ok(bytes) => match sniff_image_mime(&bytes) {
            Some(mime) => Classification::ok(RenderPlan::Image(data_uri(mime, &bytes))),
            None => Classification::fallback(
                RenderPlan::Text(raw.clone()),
                DashboardError::Parse(format!("{} is not a recognised image", raw)),
            ),
        },
        Err(e) => Classification::fallback(
            RenderPlan::Text(raw.clone()),
            DashboardError::Io(format!("{}: {}", raw, e)),
        ),
    }
}

/// Resolve a string to an image `src`: an image URL, or an existing file
/// whose contents sniff as an image.
fn image_reference(text: &str) -> Option<String> {
    let candidate = text.trim();
    if !is_probable_path(candidate) {
        return None;
    }

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        let path_part = candidate.split(['?', '#']).next().unwrap_or(candidate);
        let lower = path_part.to_lowercase();
        return IMAGE_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(ext))
            .then(|| candidate.to_string());
    }

    let path = Path::new(candidate);
    if !path.is_file() {
        return None;
    }
    let bytes = fs::read(path).ok()?;
    let mime = sniff_image_mime(&bytes)?;
    Some(data_uri(mime, &bytes))
}

fn is_probable_path(text: &str) -> bool {
    !text.is_empty() && text.len() <= MAX_REFERENCE_LEN && !text.contains('\n')
}

/// Detect an image format from its leading bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    if bytes.starts_with(PNG) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") && bytes.len() > 14 {
        Some("image/bmp")
    } else if is_svg(bytes) {
        Some("image/svg+xml")
    } else {
        None
    }
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{Element, Page};
    use serde_json::json;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn render_to_page(value: &ResultValue) -> (RenderOutcome, Vec<Element>) {
        let mut page = Page::new("test");
        page.begin_section("s", "S");
        let outcome = render(value, &mut page);
        (outcome, page.sections[0].elements.clone())
    }

    fn content_calls(elements: &[Element]) -> usize {
        elements.iter().filter(|e| !e.is_error()).count()
    }

    #[test]
    fn test_delimited_empty_chart_renders_chart() {
        let value = ResultValue::PlainText(r#"<plotly>{"data":[],"layout":{}}</plotly>"#.to_string());
        let (outcome, elements) = render_to_page(&value);

        assert_eq!(outcome.path, RenderPath::Chart);
        assert!(!outcome.fell_back);
        assert_eq!(elements.len(), 1);
        match &elements[0] {
            Element::Chart { figure } => {
                assert!(figure.data.is_empty());
                assert!(figure.layout.is_empty());
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_delimited_chart_inside_prose_keeps_keys() {
        let text = "Aqui está o gráfico:\n<plotly>\n{\"data\": [{\"type\": \"bar\", \"x\": [\"a\"], \"y\": [1]}],\n \"layout\": {\"title\": \"Top 5\"}}\n</plotly>\nFim.";
        let c = classify_text(text);
        match c.plan {
            RenderPlan::Chart(figure) => {
                assert_eq!(figure.data[0]["type"], json!("bar"));
                assert_eq!(figure.title(), Some("Top 5"));
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_delimited_chart_falls_back_to_raw_text() {
        let text = "<plotly>{not json}</plotly>";
        let (outcome, elements) = render_to_page(&ResultValue::EmbeddedChartMarkup(text.to_string()));

        assert_eq!(outcome.path, RenderPath::Text);
        assert!(outcome.fell_back);
        assert!(elements[0].is_error());
        assert_eq!(
            elements[1],
            Element::Text {
                text: text.to_string()
            }
        );
    }

    #[test]
    fn test_delimited_chart_with_wrong_shape_falls_back() {
        let c = classify_text(r#"<plotly>{"data": {}, "layout": {}}</plotly>"#);
        assert_eq!(c.plan.path(), RenderPath::Text);
        assert!(matches!(c.recovered, Some(DashboardError::Parse(_))));
    }

    #[test]
    fn test_plain_text_scenario() {
        let (outcome, elements) = render_to_page(&ResultValue::PlainText("not json at all".to_string()));
        assert_eq!(outcome.path, RenderPath::Text);
        assert!(!outcome.fell_back);
        assert_eq!(
            elements,
            vec![Element::Text {
                text: "not json at all".to_string()
            }]
        );
    }

    #[test]
    fn test_data_uri_is_image() {
        let uri = "data:image/png;base64,iVBORw0KGgo=";
        let c = classify(&ResultValue::DataUri(uri.to_string()));
        assert_eq!(c.plan, RenderPlan::Image(uri.to_string()));
    }

    #[test]
    fn test_data_uri_wins_over_plotly_markers() {
        let text = "data:image/png;base64,AAAA<plotly>{}</plotly>";
        assert_eq!(classify_text(text).plan.path(), RenderPath::Image);
    }

    #[test]
    fn test_html_file_is_read_and_embedded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp_chart.html");
        std::fs::write(&path, "<div id='chart'>ok</div>").unwrap();

        let c = classify(&ResultValue::HtmlDocument(path.display().to_string()));
        assert_eq!(c.plan, RenderPlan::Html("<div id='chart'>ok</div>".to_string()));
        assert!(c.recovered.is_none());
    }

    #[test]
    fn test_missing_html_path_is_embedded_as_markup() {
        let c = classify_text("exports/charts/temp_chart.html");
        assert_eq!(
            c.plan,
            RenderPlan::Html("exports/charts/temp_chart.html".to_string())
        );
    }

    #[test]
    fn test_temp_chart_file_without_html_suffix_is_embedded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp_chart_42.htm");
        std::fs::write(&path, "<div id='grafico'>ok</div>").unwrap();

        let c = classify_text(&path.display().to_string());
        assert_eq!(c.plan, RenderPlan::Html("<div id='grafico'>ok</div>".to_string()));
        assert!(c.recovered.is_none());
    }

    #[test]
    fn test_temp_chart_markup_is_embedded_as_is() {
        let text = "<div class=\"temp_chart\"><b>Fraudes</b></div>";
        let c = classify(&ResultValue::PlainText(text.to_string()));
        assert_eq!(c.plan, RenderPlan::Html(text.to_string()));
        assert!(c.recovered.is_none());
    }

    #[test]
    fn test_unreadable_html_path_falls_back_with_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("folder.html");
        std::fs::create_dir(&path).unwrap();

        let text = path.display().to_string();
        let (outcome, elements) = render_to_page(&ResultValue::PlainText(text.clone()));
        assert_eq!(outcome.path, RenderPath::Text);
        assert!(outcome.fell_back);
        assert_eq!(elements[1], Element::Text { text });
    }

    #[test]
    fn test_whole_string_json_chart() {
        let c = classify_text(r#"{"data": [{"type": "pie"}], "layout": {"height": 300}}"#);
        match c.plan {
            RenderPlan::Chart(figure) => assert_eq!(figure.layout["height"], json!(300)),
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_json_without_layout_is_text() {
        let c = classify_text(r#"{"data": []}"#);
        assert_eq!(c.plan.path(), RenderPath::Text);
        assert!(c.recovered.is_none());
    }

    #[test]
    fn test_image_url_and_image_file() {
        let c = classify_text("https://example.com/chart.PNG?v=2");
        assert_eq!(
            c.plan,
            RenderPlan::Image("https://example.com/chart.PNG?v=2".to_string())
        );

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grafico.png");
        std::fs::write(&path, PNG_BYTES).unwrap();
        let c = classify_text(&path.display().to_string());
        match c.plan {
            RenderPlan::Image(src) => assert!(src.starts_with("data:image/png;base64,")),
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_non_image_file_is_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just notes").unwrap();
        let c = classify_text(&path.display().to_string());
        assert_eq!(c.plan.path(), RenderPath::Text);
    }

    #[test]
    fn test_image_bytes() {
        let c = classify(&ResultValue::ImageBytes(PNG_BYTES.to_vec()));
        assert_eq!(c.plan.path(), RenderPath::Image);

        let (outcome, elements) = render_to_page(&ResultValue::ImageBytes(vec![1, 2, 3]));
        assert_eq!(outcome.path, RenderPath::Text);
        assert!(outcome.fell_back);
        assert_eq!(content_calls(&elements), 1);
    }

    #[test]
    fn test_image_path_missing_shows_error_and_raw_path() {
        let (outcome, elements) =
            render_to_page(&ResultValue::ImagePath("/nonexistent/plot.png".into()));
        assert_eq!(outcome.path, RenderPath::Text);
        assert!(outcome.error.unwrap().contains("/nonexistent/plot.png"));
        assert_eq!(
            elements[1],
            Element::Text {
                text: "/nonexistent/plot.png".to_string()
            }
        );
    }

    #[test]
    fn test_json_chart_spec_variants() {
        let chart = classify(&ResultValue::JsonChartSpec(json!({"data": [], "layout": {}})));
        assert_eq!(chart.plan.path(), RenderPath::Chart);

        let other = classify(&ResultValue::JsonChartSpec(json!({"total": 3})));
        assert_eq!(other.plan, RenderPlan::Pretty(json!({"total": 3})));

        let bad = classify(&ResultValue::JsonChartSpec(json!({"data": 1, "layout": {}})));
        assert_eq!(bad.plan.path(), RenderPath::Pretty);
        assert!(bad.recovered.is_some());
    }

    #[test]
    fn test_native_chart_and_table() {
        let figure = Figure::from_value(&json!({"data": [{"type": "bar"}], "layout": {}})).unwrap();
        let c = classify(&ResultValue::NativeChartObject(figure.clone()));
        assert_eq!(c.plan, RenderPlan::Chart(figure));

        let table = Table::from_records(&[json!({"Nome": "Fraude"})]).unwrap();
        let (outcome, elements) = render_to_page(&ResultValue::Table(table.clone()));
        assert_eq!(outcome.path, RenderPath::Table);
        assert_eq!(elements, vec![Element::Table { table }]);
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(PNG_BYTES), Some("image/png"));
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_image_mime(b"  <svg xmlns='x'/>"), Some("image/svg+xml"));
        assert_eq!(sniff_image_mime(b"hello"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_wrapped_chart_specs_select_chart(
                title in "[a-zA-Z0-9 ]{0,20}",
                ys in proptest::collection::vec(0i32..1000, 0..8),
                prefix in "[a-zA-Z ]{0,20}",
            ) {
                let spec = json!({
                    "data": [{ "type": "bar", "y": ys }],
                    "layout": { "title": title },
                });
                let text = format!("{}<plotly>{}</plotly>", prefix, spec);

                match classify_text(&text).plan {
                    RenderPlan::Chart(figure) => {
                        prop_assert_eq!(figure.data, spec["data"].as_array().unwrap().clone());
                        prop_assert_eq!(
                            Value::Object(figure.layout),
                            spec["layout"].clone()
                        );
                    }
                    other => prop_assert!(false, "expected chart, got {:?}", other),
                }
            }

            #[test]
            fn prop_prose_falls_back_to_text(text in "[a-zA-Z ,.!?]{1,80}") {
                prop_assume!(serde_json::from_str::<Value>(&text).is_err());
                prop_assume!(!text.ends_with(HTML_SUFFIX));
                prop_assume!(!Path::new(text.trim()).exists());

                let c = classify_text(&text);
                prop_assert_eq!(c.plan, RenderPlan::Text(text.clone()));
                prop_assert!(c.recovered.is_none());
            }
        }
    }
}
