//! Ollama-backed answerer.
//!
//! One non-streaming `/api/chat` call per question: a fixed system prompt,
//! then the table snapshot and the instruction as the user message.

use crate::agent::prompts::{user_message, SYSTEM_PROMPT};
use crate::agent::Answerer;
use crate::error::{DashResult, DashboardError};
use crate::models::{ResultValue, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Connection and prompt settings for the Ollama adapter.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Rows of the snapshot included in each prompt.
    pub prompt_rows: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.0,
            timeout_seconds: 120,
            prompt_rows: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

pub struct OllamaAnswerer {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaAnswerer {
    pub fn new(config: OllamaConfig) -> DashResult<Self> {
        info!(
            "Initializing answerer with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DashboardError::Upstream(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn send_chat(&self, instruction: &str, table: &Table) -> DashResult<String> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage::new("system", SYSTEM_PROMPT),
                ChatMessage::new(
                    "user",
                    user_message(instruction, table, self.config.prompt_rows),
                ),
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request to {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DashboardError::Upstream(format!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    DashboardError::Upstream(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    ))
                } else {
                    DashboardError::Upstream(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Upstream(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            DashboardError::Upstream(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(chat_response.message.content)
    }
}

impl Answerer for OllamaAnswerer {
    async fn answer(&self, instruction: &str, table: &Table) -> DashResult<ResultValue> {
        let content = self.send_chat(instruction, table).await?;
        let value = tag_response(&content);
        info!("Answer received ({})", value.kind());
        Ok(value)
    }
}

/// Tag raw engine output: a JSON array of objects becomes a table,
/// everything else is plain text for the classifier to interpret.
pub fn tag_response(content: &str) -> ResultValue {
    let body = strip_code_fence(content.trim());

    if let Ok(Value::Array(records)) = serde_json::from_str::<Value>(body) {
        if !records.is_empty() {
            if let Some(table) = Table::from_records(&records) {
                return ResultValue::Table(table);
            }
        }
    }

    ResultValue::PlainText(content.to_string())
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}
