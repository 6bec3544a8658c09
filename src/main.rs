//! moodlog - per-day emotion reports for mood tracking
//!
//! A CLI that records emotion observations into one report per user per
//! day and reviews the resulting history.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime or storage error
//!   2 - Invalid input (unknown emotion, confidence out of range, no user)
//!   3 - Report not found

mod aggregator;
mod analysis;
mod capture;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod report;

use aggregator::MoodAggregator;
use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use db::Database;
use error::{MoodError, MoodResult};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle commands that need neither config nor store
    match args.command {
        Command::InitConfig => return handle_init_config(),
        Command::Recommend { ref emotion } => return handle_recommend(&args, emotion),
        _ => {}
    }

    // Load configuration
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, &config);

    info!("moodlog v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args, &config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Handle init-config: generate a default .moodlog.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Handle recommend: print the fixed recommendation for a label.
fn handle_recommend(args: &Args, emotion: &str) -> Result<()> {
    let recommendation = analysis::recommend_for_label(emotion);
    let output = match args.format {
        OutputFormat::Json => report::generate_json(&recommendation)?,
        OutputFormat::Markdown => report::generate_markdown_recommendations(&[recommendation]),
    };
    write_output(args, &output)
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so rendered output on stdout stays clean.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
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
            eprintln!("Warning: failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}

/// Run a subcommand against the report store.
async fn run(args: &Args, config: &Config) -> MoodResult<()> {
    let user = config.user().ok_or(MoodError::MissingUser)?;

    let db = Database::open(config.storage.database_path.clone())
        .context("failed to open report store")?;
    if let Some(path) = db.path() {
        debug!("Using report store at {}", path.display());
    }
    let aggregator = MoodAggregator::new(db, config.storage.day_boundary);

    match &args.command {
        Command::Record {
            emotion,
            confidence,
            at,
        } => {
            let recorded = aggregator
                .record_observation(user, emotion, *confidence, *at)
                .await?;
            emit_report(args, &recorded)?;
        }
        Command::Reports { limit } => {
            let limit = limit.unwrap_or(config.reports.default_limit);
            let reports = aggregator.list_reports(user, limit).await?;
            match args.format {
                OutputFormat::Json => write_output(args, &report::generate_json(&reports)?)?,
                OutputFormat::Markdown => {
                    write_output(args, &report::generate_markdown_history(&reports, None, &[]))?
                }
            }
        }
        Command::Show { report_id } => {
            let found = aggregator.get_report(user, report_id).await?;
            emit_report(args, &found)?;
        }
        Command::Insights { limit } => {
            let limit = limit.unwrap_or(config.reports.default_limit);
            let reports = aggregator.list_reports(user, limit).await?;
            let insights = analysis::summarize_across_reports(&reports);
            let recommendations = insights
                .as_deref()
                .map(analysis::recommend)
                .unwrap_or_default();

            match args.format {
                OutputFormat::Json => {
                    #[derive(Serialize)]
                    struct InsightsOutput<'a> {
                        reports: usize,
                        insights: Option<&'a [models::EmotionShare]>,
                        recommendations: &'a [models::Recommendation],
                    }
                    let output = InsightsOutput {
                        reports: reports.len(),
                        insights: insights.as_deref(),
                        recommendations: &recommendations,
                    };
                    write_output(args, &report::generate_json(&output)?)?;
                }
                OutputFormat::Markdown => write_output(
                    args,
                    &report::generate_markdown_history(
                        &reports,
                        insights.as_deref(),
                        &recommendations,
                    ),
                )?,
            }
        }
        Command::Note { report_id, text } => {
            let updated = aggregator.set_notes(user, report_id, text.clone()).await?;
            emit_report(args, &updated)?;
        }
        Command::Ingest { file } => {
            let frames = capture::load_frames(file)?;
            if frames.is_empty() {
                warn!("No frames found in {}", file.display());
            }
            let summary = capture::ingest_frames(&aggregator, user, &frames, !args.quiet).await?;
            match args.format {
                OutputFormat::Json => write_output(args, &report::generate_json(&summary)?)?,
                OutputFormat::Markdown => {
                    let text = format!(
                        "Ingested {} frames: {} recorded, {} skipped, {} rejected ({} reports updated)\n",
                        frames.len(),
                        summary.recorded,
                        summary.skipped,
                        summary.rejected,
                        summary.report_ids.len()
                    );
                    write_output(args, &text)?;
                }
            }
        }
        Command::InitConfig | Command::Recommend { .. } => {
            debug!("Command does not use the report store");
        }
    }

    Ok(())
}

/// Render a single report in the requested format.
fn emit_report(args: &Args, mood_report: &models::Report) -> Result<()> {
    let output = match args.format {
        OutputFormat::Json => report::generate_json(mood_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(mood_report),
    };
    write_output(args, &output)
}

/// Write rendered output to `--output` or stdout.
fn write_output(args: &Args, content: &str) -> Result<()> {
    match args.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output saved to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
