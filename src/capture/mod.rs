//! Ingestion of expression-classifier capture sessions.
//!
//! A capture session is a JSON Lines file with one classifier frame per
//! line:
//!
//! ```text
//! {"timestamp": "2026-03-14T09:00:00Z", "expressions": {"happy": 0.91, "neutral": 0.07, "sad": 0.02}}
//! ```
//!
//! Each frame is reduced to its strongest expression and recorded as one
//! observation. Frames without a detected face carry no expressions and
//! are skipped.

use crate::aggregator::MoodAggregator;
use crate::error::{MoodError, MoodResult};
use crate::models::EmotionLabel;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info, warn};

/// One classifier output for one video frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpressionFrame {
    /// Capture time; the ingestion time is used when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Label → probability.
    #[serde(default)]
    pub expressions: BTreeMap<String, f64>,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Frames recorded as observations.
    pub recorded: usize,
    /// Frames with no detected face.
    pub skipped: usize,
    /// Frames that failed validation.
    pub rejected: usize,
    /// Reports touched by the run.
    pub report_ids: BTreeSet<String>,
}

/// The label with the highest probability in `frame`.
///
/// Equal probabilities go to the label earlier in enumeration order.
/// Returns `Ok(None)` for a frame without expressions.
pub fn strongest_expression(frame: &ExpressionFrame) -> MoodResult<Option<(EmotionLabel, f64)>> {
    let mut best: Option<(EmotionLabel, f64)> = None;

    for (name, &score) in &frame.expressions {
        let label: EmotionLabel = name.parse()?;
        best = match best {
            Some((current, current_score))
                if current_score > score || (current_score == score && current < label) =>
            {
                Some((current, current_score))
            }
            _ => Some((label, score)),
        };
    }

    Ok(best)
}

/// Parse a JSON Lines capture session. Blank lines are ignored.
pub fn parse_frames<R: BufRead>(reader: R) -> Result<Vec<ExpressionFrame>> {
    let mut frames = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: ExpressionFrame = serde_json::from_str(&line)
            .with_context(|| format!("invalid frame on line {}", index + 1))?;
        frames.push(frame);
    }

    Ok(frames)
}

/// Load a capture session from disk.
pub fn load_frames(path: &Path) -> Result<Vec<ExpressionFrame>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open capture file: {}", path.display()))?;
    let frames = parse_frames(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse capture file: {}", path.display()))?;

    debug!("Loaded {} frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// Record every frame of a capture session for `user_id`.
///
/// Validation failures are counted and logged; storage failures abort the
/// run.
pub async fn ingest_frames(
    aggregator: &MoodAggregator,
    user_id: &str,
    frames: &[ExpressionFrame],
    show_progress: bool,
) -> MoodResult<IngestSummary> {
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(frames.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut summary = IngestSummary::default();

    for (index, frame) in frames.iter().enumerate() {
        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }

        let (emotion, confidence) = match strongest_expression(frame) {
            Ok(Some(strongest)) => strongest,
            Ok(None) => {
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!("Frame {}: {}", index + 1, e);
                summary.rejected += 1;
                continue;
            }
        };

        match aggregator
            .record(user_id, emotion, confidence, frame.timestamp)
            .await
        {
            Ok(report) => {
                summary.recorded += 1;
                summary.report_ids.insert(report.id);
            }
            Err(e) if e.is_invalid_input() && !matches!(e, MoodError::MissingUser) => {
                warn!("Frame {}: {}", index + 1, e);
                summary.rejected += 1;
            }
            Err(e) => {
                if let Some(ref pb) = progress_bar {
                    pb.abandon();
                }
                return Err(e);
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    info!(
        "Ingested {} frames: {} recorded, {} skipped, {} rejected",
        frames.len(),
        summary.recorded,
        summary.skipped,
        summary.rejected
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DayBoundary;
    use crate::db::Database;

    fn frame(pairs: &[(&str, f64)]) -> ExpressionFrame {
        ExpressionFrame {
            timestamp: None,
            expressions: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_strongest_expression() {
        let f = frame(&[("neutral", 0.2), ("happy", 0.7), ("sad", 0.1)]);
        assert_eq!(strongest_expression(&f).unwrap(), Some((EmotionLabel::Happy, 0.7)));
    }

    #[test]
    fn test_strongest_expression_tie_goes_to_enumeration_order() {
        let f = frame(&[("neutral", 0.5), ("angry", 0.5)]);
        assert_eq!(strongest_expression(&f).unwrap(), Some((EmotionLabel::Angry, 0.5)));
    }

    #[test]
    fn test_empty_frame_has_no_expression() {
        assert_eq!(strongest_expression(&ExpressionFrame::default()).unwrap(), None);
    }

    #[test]
    fn test_unknown_label_in_frame() {
        let f = frame(&[("happy", 0.5), ("contempt", 0.4)]);
        assert!(matches!(
            strongest_expression(&f),
            Err(MoodError::InvalidEmotionLabel(_))
        ));
    }

    #[test]
    fn test_parse_frames() {
        let input = r#"{"timestamp": "2026-03-14T09:00:00Z", "expressions": {"happy": 0.9}}

{"expressions": {}}
"#;
        let frames = parse_frames(input.as_bytes()).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].timestamp.is_some());
        assert!(frames[1].expressions.is_empty());

        let err = parse_frames("not json\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_ingest_counts_outcomes() {
        let agg = MoodAggregator::new(Database::in_memory().unwrap(), DayBoundary::Utc);
        let input = r#"{"timestamp": "2026-03-14T09:00:00Z", "expressions": {"happy": 0.9, "sad": 0.1}}
{"timestamp": "2026-03-14T09:00:01Z", "expressions": {}}
{"timestamp": "2026-03-14T09:00:02Z", "expressions": {"happy": 1.4}}
{"timestamp": "2026-03-14T09:00:03Z", "expressions": {"bored": 0.8}}
{"timestamp": "2026-03-14T09:00:04Z", "expressions": {"sad": 0.6, "neutral": 0.3}}
"#;
        let frames = parse_frames(input.as_bytes()).unwrap();
        let summary = ingest_frames(&agg, "u1", &frames, false).await.unwrap();

        assert_eq!(summary.recorded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.report_ids.len(), 1);

        let reports = agg.list_reports("u1", 10).await.unwrap();
        assert_eq!(reports[0].expressions.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_without_user_fails() {
        let agg = MoodAggregator::new(Database::in_memory().unwrap(), DayBoundary::Utc);
        let frames = vec![frame(&[("happy", 0.9)])];
        let err = ingest_frames(&agg, "", &frames, false).await.unwrap_err();
        assert!(matches!(err, MoodError::MissingUser));
    }
}
