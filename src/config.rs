//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.alertdash.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = ".alertdash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Session file carrying query and date range between interactions.
    #[serde(default)]
    pub session_file: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
            session_file: None,
        }
    }
}

fn default_output() -> String {
    "dashboard.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Ask the model at all. When false the dashboard runs offline.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            enabled: true,
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// `alert_status` value counted as active.
    #[serde(default = "default_active_status")]
    pub active_status: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            active_status: default_active_status(),
        }
    }
}

fn default_db_path() -> String {
    "medical_data.db".to_string()
}

fn default_active_status() -> String {
    "Ativo".to_string()
}

/// Page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Length of the default period, ending today.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Memoized distribution charts.
    #[serde(default = "default_cache_capacity")]
    pub chart_cache_capacity: usize,

    /// Height of embedded HTML answers, in pixels.
    #[serde(default = "default_html_height")]
    pub html_height: u32,

    /// Snapshot rows sent to the model with each question.
    #[serde(default = "default_prompt_rows")]
    pub prompt_rows: usize,

    /// Ask the model for insights on every interaction.
    #[serde(default = "default_true")]
    pub insights: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            chart_cache_capacity: default_cache_capacity(),
            html_height: default_html_height(),
            prompt_rows: default_prompt_rows(),
            insights: true,
        }
    }
}

fn default_window_days() -> i64 {
    7
}

fn default_cache_capacity() -> usize {
    10
}

fn default_html_height() -> u32 {
    400
}

fn default_prompt_rows() -> usize {
    50
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if args.offline {
            self.model.enabled = false;
        }

        if let Some(ref db) = args.db {
            self.database.path = db.display().to_string();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref session) = args.session {
            self.general.session_file = Some(session.display().to_string());
        }

        if args.no_insights {
            self.dashboard.insights = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Where the page is written. Without an explicit `--output` the
    /// extension follows the configured format.
    pub fn output_path(&self, args: &crate::cli::Args) -> PathBuf {
        let path = PathBuf::from(&self.general.output);
        if args.output.is_none() {
            path.with_extension(self.general.format.extension())
        } else {
            path
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.database.path, "medical_data.db");
        assert_eq!(config.database.active_status, "Ativo");
        assert_eq!(config.dashboard.window_days, 7);
        assert_eq!(config.dashboard.chart_cache_capacity, 10);
        assert!(config.model.enabled);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "painel.html"
format = "html"
verbose = true

[model]
name = "qwen2.5:7b"
temperature = 0.2

[database]
path = "/data/alerts.db"

[dashboard]
window_days = 30
insights = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "painel.html");
        assert_eq!(config.general.format, OutputFormat::Html);
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "qwen2.5:7b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.ollama_url, "http://localhost:11434");
        assert_eq!(config.database.path, "/data/alerts.db");
        assert_eq!(config.database.active_status, "Ativo");
        assert_eq!(config.dashboard.window_days, 30);
        assert!(!config.dashboard.insights);
        assert_eq!(config.dashboard.html_height, 400);
    }

    #[test]
    fn test_merge_only_overrides_explicit_args() {
        let mut config: Config = toml::from_str("[model]\nname = \"from-file\"\n").unwrap();
        let mut args = make_args();
        config.merge_with_args(&args);
        assert_eq!(config.model.name, "from-file");
        assert!(config.model.enabled);

        args.model = Some("from-cli".to_string());
        args.db = Some(PathBuf::from("other.db"));
        args.format = Some(OutputFormat::Json);
        args.offline = true;
        args.no_insights = true;
        config.merge_with_args(&args);
        assert_eq!(config.model.name, "from-cli");
        assert_eq!(config.database.path, "other.db");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(!config.model.enabled);
        assert!(!config.dashboard.insights);
    }

    #[test]
    fn test_output_extension_follows_configured_format() {
        let config: Config = toml::from_str("[general]\nformat = \"html\"\n").unwrap();
        let mut args = make_args();
        assert_eq!(config.output_path(&args), PathBuf::from("dashboard.html"));

        args.output = Some(PathBuf::from("painel.txt"));
        let mut config = config;
        config.merge_with_args(&args);
        assert_eq!(config.output_path(&args), PathBuf::from("painel.txt"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[dashboard]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.dashboard.prompt_rows, 50);
    }
}
