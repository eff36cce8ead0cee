//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// AlertDash - medical-alert analytics dashboard
///
/// Renders KPIs for a period against the previous one, the alert
/// distribution and the live alert table, and answers free-text questions
/// about the data with a local LLM. Markdown/HTML/JSON output.
///
/// Examples:
///   alertdash --start 2024-03-08 --end 2024-03-14
///   alertdash --question "Quais provedores concentram o risco?" --format html -o painel.html
///   alertdash --example 3 --model qwen2.5:7b
///   alertdash --offline --db ./medical_data.db
///   alertdash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question for the model about the alert data
    #[arg(short = 'Q', long, value_name = "TEXT", conflicts_with = "example")]
    pub question: Option<String>,

    /// Ask one of the example questions (1-3)
    #[arg(short, long, value_name = "N")]
    pub example: Option<usize>,

    /// First day of the period (YYYY-MM-DD)
    ///
    /// Defaults to the session value, or seven days before today.
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,

    /// Last day of the period (YYYY-MM-DD), inclusive
    #[arg(long, value_name = "DATE")]
    pub end: Option<NaiveDate>,

    /// SQLite database with the alert tables
    #[arg(long, value_name = "FILE", env = "ALERTDASH_DB")]
    pub db: Option<PathBuf>,

    /// Output file path for the page
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, html, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Ollama model used to answer questions
    ///
    /// Can also be set via ALERTDASH_MODEL env var or .alertdash.toml config.
    #[arg(short, long, env = "ALERTDASH_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .alertdash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session file keeping the query and period between runs
    #[arg(long, value_name = "FILE")]
    pub session: Option<PathBuf>,

    /// Do not contact the model; questions and insights are skipped
    #[arg(long)]
    pub offline: bool,

    /// Skip the insights section
    #[arg(long)]
    pub no_insights: bool,

    /// Exit with code 2 when any section of the page failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .alertdash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the page.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// Standalone HTML page
    Html,
    /// JSON page model
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    ///
    /// Date order is not checked here: an inverted period is reported on
    /// the page itself.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref question) = self.question {
            if question.trim().is_empty() {
                return Err("Question must not be empty".to_string());
            }
        }

        if let Some(example) = self.example {
            if !(1..=3).contains(&example) {
                return Err("Example must be between 1 and 3".to_string());
            }
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if (self.question.is_some() || self.example.is_some()) && self.offline {
            return Err("Cannot ask a question with --offline".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a verbose configuration file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
