//! Prompt text sent to the query engine.

use crate::metrics::BRAND_COLOR;
use crate::models::Table;

/// System message for every question.
pub const SYSTEM_PROMPT: &str = "Você é um assistente de análise de dados médicos. \
Responda SEMPRE em português brasileiro, em tom profissional mas acessível. \
Não use termos em inglês a menos que sejam termos técnicos sem tradução adequada. \
Dê respostas concisas e diretas, focadas nos dados. \
Quando for solicitado a criar gráficos, SEMPRE use a biblioteca Plotly e não matplotlib. \
Para todos os gráficos, use a cor #009C6E como cor principal. \
Sempre retorne o código do gráfico Plotly dentro de tags <plotly></plotly> para que ele seja renderizado corretamente. \
Quando a resposta for uma tabela, retorne apenas um array JSON de objetos.";

/// Canned questions offered on the page.
pub const EXAMPLE_QUESTIONS: [&str; 3] = [
    "Me mostre onde eu estou perdendo mais receita",
    "Liste os usuários que geram fraudes de maior valor",
    "Faça um gráfico com os 5 provedores com mais fraudes",
];

pub const INSIGHTS_QUERY: &str = "Liste os principais insights dos dados de alertas médicos, \
em portugues e em markdown, nao utilie graficos";

pub const CHART_FALLBACK_QUERY: &str = "Crie um gráfico de barras simples usando Plotly \
mostrando a distribuição em porcentagem dos tipos de alertas. Use a cor #009C6E para as barras. \
Coloque os elementos do gráfico em português e use background transparente. \
Retorne o código do gráfico dentro de tags <plotly></plotly>";

const CHART_WORDS: [&str; 4] = ["gráfico", "grafico", "visualização", "visualizacao"];

/// Prepare a user question for the engine: chart-flavoured questions get
/// the Plotly directive, every question gets the language prefix.
pub fn augment_question(question: &str) -> String {
    let lower = question.to_lowercase();
    let mut query = question.trim().to_string();

    if CHART_WORDS.iter().any(|w| lower.contains(w)) {
        query.push_str(&format!(
            " Use Plotly para criar o gráfico com a cor {} como cor principal \
             e retorne o código dentro de tags <plotly></plotly>",
            BRAND_COLOR
        ));
    }

    format!("Responda em portugues: {}", query)
}

/// Describe the table for the engine: its columns and the first `rows` rows
/// as one JSON object per line.
pub fn data_context(table: &Table, rows: usize) -> String {
    let mut context = String::new();
    context.push_str(&format!("Colunas: {}\n", table.columns.join(", ")));

    let head = table.head(rows);
    context.push_str(&format!(
        "Primeiras {} de {} linhas (um objeto JSON por linha):\n",
        head.len(),
        table.len()
    ));
    for record in head.to_records() {
        context.push_str(&record.to_string());
        context.push('\n');
    }

    context
}

/// Full user message: data context followed by the instruction.
pub fn user_message(instruction: &str, table: &Table, rows: usize) -> String {
    format!(
        "=== DADOS ===\n{}=== FIM DOS DADOS ===\n\n{}",
        data_context(table, rows),
        instruction
    )
}
