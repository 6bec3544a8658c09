//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::aggregator::DayBoundary;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// moodlog - per-day emotion reports for mood tracking
///
/// Records emotion observations from an expression classifier into one
/// report per user per day, and reviews the history with insights and
/// recommendations.
///
/// Examples:
///   moodlog --user alice record happy 0.92
///   moodlog --user alice reports --limit 5
///   moodlog --user alice show 6f1c0b9e-...
///   moodlog --user alice insights --format json
///   moodlog --user alice ingest session.jsonl
///   moodlog recommend sad
///   moodlog init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// User id to act as
    ///
    /// Identity is trusted as given; authentication happens upstream.
    #[arg(short, long, global = true, env = "MOODLOG_USER")]
    pub user: Option<String>,

    /// Path to the SQLite database file
    #[arg(long, global = true, value_name = "FILE", env = "MOODLOG_DB")]
    pub db: Option<PathBuf>,

    /// Which midnight starts a new daily report
    #[arg(long, global = true, value_name = "BOUNDARY")]
    pub day_boundary: Option<DayBoundary>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .moodlog.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Record one emotion observation
    Record {
        /// Emotion label (happy, sad, angry, fearful, disgusted, surprised, neutral)
        emotion: String,

        /// Classifier confidence between 0 and 1
        #[arg(allow_negative_numbers = true)]
        confidence: f64,

        /// Observation time (RFC 3339); defaults to now
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,
    },

    /// List the most recent reports
    Reports {
        /// Number of reports to show
        #[arg(short, long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Show a single report
    Show {
        /// Report id
        report_id: String,
    },

    /// Summarize recent reports and suggest activities
    Insights {
        /// Number of recent reports to include
        #[arg(short, long, value_name = "COUNT")]
        limit: Option<usize>,
    },

    /// Set or clear the notes on a report
    Note {
        /// Report id
        report_id: String,

        /// Note text; omit to clear
        text: Option<String>,
    },

    /// Record every frame of a capture session (JSON Lines)
    Ingest {
        /// Capture file
        file: PathBuf,
    },

    /// Show the recommended activities for an emotion
    Recommend {
        /// Emotion label; unrecognized labels get general advice
        emotion: String,
    },

    /// Generate a default .moodlog.toml configuration file
    InitConfig,
}

/// Output format for rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref user) = self.user {
            if user.trim().is_empty() {
                return Err("User id must not be empty".to_string());
            }
        }

        match self.command {
            Command::Ingest { ref file } => {
                if !file.is_file() {
                    return Err(format!("Capture file does not exist: {}", file.display()));
                }
            }
            Command::Note { ref text, .. } => {
                if text.as_deref().map_or(false, |t| t.len() > 4096) {
                    return Err("Notes must be at most 4096 bytes".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
