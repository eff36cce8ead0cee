//! AlertDash - medical-alert analytics dashboard
//!
//! A CLI tool that renders one dashboard interaction (KPIs, insights,
//! alert distribution, live alerts and an optional question answered by a
//! local Ollama model) into a Markdown, HTML or JSON page.
//!
//! Exit codes:
//!   0 - Success (or sections failed without --fail-on-error)
//!   1 - Runtime error (config, output file, invalid arguments, etc.)
//!   2 - At least one section failed and --fail-on-error was set

mod agent;
mod cli;
mod config;
mod dashboard;
mod error;
mod metrics;
mod models;
mod render;
mod report;
mod store;

use agent::{OllamaAnswerer, OllamaConfig};
use anyhow::{Context, Result};
use chrono::Local;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use dashboard::{Dashboard, DashboardOptions, SessionState};
use models::PeriodWindow;
use render::{Element, Page};
use std::path::{Path, PathBuf};
use std::time::Instant;
use store::{DataStore, SqliteStore, UnavailableStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load and merge configuration
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("AlertDash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run_dashboard(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .alertdash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the database, model and dashboard.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one interaction. Returns exit code (0 or 2).
async fn run_dashboard(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Session state and the period
    let session_path = config.general.session_file.as_ref().map(PathBuf::from);
    let mut session = match session_path {
        Some(ref path) => SessionState::load(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable session {}: {}", path.display(), e);
            SessionState::default()
        }),
        None => SessionState::default(),
    };

    let question = if let Some(example) = args.example {
        Some(session.select_example(example - 1)?.to_string())
    } else if let Some(ref question) = args.question {
        session.set_query(question);
        Some(question.clone())
    } else {
        None
    };

    let today = Local::now().date_naive();
    let (default_start, default_end) =
        session.range_or_default(today, config.dashboard.window_days);
    let start = args.start.unwrap_or(default_start);
    let end = args.end.unwrap_or(default_end);
    if !session.set_range(start, end) {
        warn!("Period {} → {} is inverted; keeping the previous one", start, end);
    }
    let window = PeriodWindow::from_dates(start, end);

    // Step 2: Collaborators
    let db_path = PathBuf::from(&config.database.path);
    println!("🗄️  Database: {}", db_path.display());
    let store: Box<dyn DataStore> = match SqliteStore::open(&db_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("Database unavailable: {}", e);
            Box::new(UnavailableStore::new(e.to_string()))
        }
    };

    let answerer = if config.model.enabled {
        println!("🤖 Model: {} ({})", config.model.name, config.model.ollama_url);
        let answerer_config = OllamaConfig {
            ollama_url: config.model.ollama_url.clone(),
            model_name: config.model.name.clone(),
            temperature: config.model.temperature,
            timeout_seconds: config.model.timeout_seconds,
            prompt_rows: config.dashboard.prompt_rows,
        };
        match OllamaAnswerer::new(answerer_config) {
            Ok(answerer) => Some(answerer),
            Err(e) => {
                warn!("Model unavailable: {}", e);
                None
            }
        }
    } else {
        println!("🤖 Model: offline");
        None
    };

    let options = DashboardOptions {
        active_status: config.database.active_status.clone(),
        insights: config.dashboard.insights,
        show_progress: !args.quiet,
        html_height: config.dashboard.html_height,
        chart_cache_capacity: config.dashboard.chart_cache_capacity,
    };

    // Step 3: Draw the page
    println!("\n📊 Building dashboard for {}...", window);
    let mut dashboard = Dashboard::new(store.as_ref(), answerer.as_ref(), options);
    let page = dashboard.run(question.as_deref(), &window).await;
    debug!(
        "Chart cache: {} hits, {} misses",
        dashboard.cache().hits(),
        dashboard.cache().misses()
    );

    // Step 4: Write it out
    let format = config.general.format;
    let output_path = config.output_path(&args);
    let output = match format {
        OutputFormat::Markdown => report::generate_markdown_report(&page),
        OutputFormat::Html => report::generate_html_report(&page),
        OutputFormat::Json => report::generate_json_report(&page)?,
    };
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write page to {}", output_path.display()))?;

    if let Some(ref path) = session_path {
        if let Err(e) = session.save(path) {
            warn!("Failed to save session: {}", e);
        }
    }

    print_summary(&page);
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!("\n✅ Dashboard saved to: {}", output_path.display());

    let failed = page.error_count();
    if args.fail_on_error && failed > 0 {
        eprintln!(
            "\n⛔ {} section(s) failed. Failing (exit code 2).",
            failed
        );
        return Ok(2);
    }

    Ok(0)
}

fn print_summary(page: &Page) {
    println!("\n📊 Dashboard Summary:");
    for section in &page.sections {
        let status = if section.has_error() { "❌" } else { "✅" };
        println!("   {} {}", status, section.title);
    }

    let metrics = page.section("kpis").and_then(|s| {
        s.elements.iter().find_map(|e| match e {
            Element::Kpis { metrics } => Some(metrics),
            _ => None,
        })
    });
    if let Some(metrics) = metrics {
        for metric in metrics {
            println!(
                "   - {}: {} ({} {})",
                metric.label,
                metric.display_value(),
                metric.trend().emoji(),
                metric.display_delta()
            );
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
