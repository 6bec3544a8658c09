//! Markdown and JSON rendering of mood reports.
//!
//! This module turns stored reports and the insights derived from them
//! into readable history documents.

use crate::models::{EmotionShare, Recommendation, Report};
use anyhow::Result;
use serde::Serialize;

/// Generate a Markdown history document for a set of reports.
pub fn generate_markdown_history(
    reports: &[Report],
    insights: Option<&[EmotionShare]>,
    recommendations: &[Recommendation],
) -> String {
    let mut output = String::new();

    output.push_str("# Emotion Reports\n\n");

    if reports.is_empty() {
        output.push_str(
            "No reports available yet. Complete a mood check to see your results!\n\n",
        );
        output.push_str(&generate_footer());
        return output;
    }

    if let Some(shares) = insights {
        output.push_str(&generate_insights_section(shares));
    }
    output.push_str(&generate_recommendations_section(recommendations));

    for report in reports {
        output.push_str(&generate_report_section(report, "##"));
    }

    output.push_str(&generate_footer());
    output
}

/// Generate a Markdown document for a single report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Emotion Report\n\n");
    output.push_str(&generate_report_section(report, "##"));
    output.push_str(&generate_footer());

    output
}

/// Generate a Markdown document listing recommendations.
pub fn generate_markdown_recommendations(recommendations: &[Recommendation]) -> String {
    let mut output = generate_recommendations_section(recommendations);
    output.push_str(&generate_footer());
    output
}

/// Generate the emotional summary section.
fn generate_insights_section(shares: &[EmotionShare]) -> String {
    let mut section = String::new();

    section.push_str("## Your Emotional Pattern\n\n");
    section.push_str("| Emotion | Share |\n");
    section.push_str("|:---|:---:|\n");

    for share in shares {
        section.push_str(&format!(
            "| {} {} | {:.1}% |\n",
            share.emotion.emoji(),
            share.emotion,
            share.percentage
        ));
    }
    section.push('\n');

    section
}

/// Generate the recommendations section.
fn generate_recommendations_section(recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Personalized Recommendations\n\n");
    for rec in recommendations {
        section.push_str(&format!("### {}\n\n", rec.title));
        for activity in rec.activities {
            section.push_str(&format!("- {}\n", activity));
        }
        section.push('\n');
    }

    section
}

/// Generate the section for one report; `level` is the heading prefix.
fn generate_report_section(report: &Report, level: &str) -> String {
    let mut section = String::new();
    let summary = &report.summary;

    section.push_str(&format!(
        "{} Report from {}\n\n",
        level,
        report.day.format("%Y-%m-%d")
    ));
    section.push_str(&format!("- **Report ID:** `{}`\n", report.id));
    section.push_str(&format!(
        "- **Dominant Emotion:** {} {}\n",
        summary.dominant_emotion.emoji(),
        summary.dominant_emotion
    ));
    section.push_str(&format!(
        "- **Period:** {} to {} UTC\n",
        summary.start_time.format("%H:%M:%S"),
        summary.end_time.format("%H:%M:%S")
    ));
    section.push_str(&format!(
        "- **Observations:** {}\n",
        summary.emotion_frequency.total()
    ));
    if let Some(avg) = report.average_confidence() {
        section.push_str(&format!("- **Average Confidence:** {:.0}%\n", avg * 100.0));
    }
    section.push('\n');

    if let Some(ref notes) = report.notes {
        for line in notes.lines() {
            section.push_str(&format!("> {}\n", line));
        }
        section.push('\n');
    }

    // Frequency table
    section.push_str("| Emotion | Count |\n");
    section.push_str("|:---|:---:|\n");
    for (label, count) in summary.emotion_frequency.iter() {
        section.push_str(&format!("| {} {} | {} |\n", label.emoji(), label, count));
    }
    section.push('\n');

    // Timeline
    if !report.expressions.is_empty() {
        section.push_str("<details>\n<summary>Emotion Timeline</summary>\n\n");
        for observation in &report.expressions {
            section.push_str(&format!(
                "- {} {} (Confidence: {:.0}%)\n",
                observation.timestamp.format("%H:%M:%S"),
                observation.emotion,
                observation.confidence * 100.0
            ));
        }
        section.push_str("\n</details>\n\n");
    }

    section.push_str("---\n\n");
    section
}

/// Generate the document footer.
fn generate_footer() -> String {
    "*Generated by moodlog*\n".to_string()
}

/// Generate pretty-printed JSON for any serializable value.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
