//! Data models for mood tracking.
//!
//! This module contains the core data structures used throughout
//! the application: emotion labels, observations, and the per-day
//! reports that aggregate them.

use crate::error::{MoodError, MoodResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the seven fixed mood categories.
///
/// Declaration order is the enumeration order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    Neutral,
}

impl EmotionLabel {
    /// All labels in enumeration order.
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Fearful,
        EmotionLabel::Disgusted,
        EmotionLabel::Surprised,
        EmotionLabel::Neutral,
    ];

    /// Returns the wire name of the label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Fearful => "fearful",
            EmotionLabel::Disgusted => "disgusted",
            EmotionLabel::Surprised => "surprised",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Returns an emoji representation of the label.
    pub fn emoji(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "😊",
            EmotionLabel::Sad => "😢",
            EmotionLabel::Angry => "😠",
            EmotionLabel::Fearful => "😨",
            EmotionLabel::Disgusted => "🤢",
            EmotionLabel::Surprised => "😲",
            EmotionLabel::Neutral => "😐",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = MoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(EmotionLabel::Happy),
            "sad" => Ok(EmotionLabel::Sad),
            "angry" => Ok(EmotionLabel::Angry),
            "fearful" => Ok(EmotionLabel::Fearful),
            "disgusted" => Ok(EmotionLabel::Disgusted),
            "surprised" => Ok(EmotionLabel::Surprised),
            "neutral" => Ok(EmotionLabel::Neutral),
            _ => Err(MoodError::InvalidEmotionLabel(s.to_string())),
        }
    }
}

/// Reject confidences outside [0, 1]. NaN is rejected as well.
pub fn validate_confidence(confidence: f64) -> MoodResult<f64> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(MoodError::InvalidConfidence(confidence))
    }
}

/// A single emotion reading from the expression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Detected emotion.
    pub emotion: EmotionLabel,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
}

impl Observation {
    /// Creates an observation, validating the confidence.
    pub fn new(emotion: EmotionLabel, confidence: f64, timestamp: DateTime<Utc>) -> MoodResult<Self> {
        Ok(Self {
            timestamp,
            emotion,
            confidence: validate_confidence(confidence)?,
        })
    }
}

/// Per-label observation counts, kept in enumeration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FrequencyFields", into = "FrequencyFields")]
pub struct EmotionFrequency {
    counts: [u32; 7],
}

impl EmotionFrequency {
    /// Builds a histogram from counts given in enumeration order.
    pub fn from_counts(counts: [u32; 7]) -> Self {
        Self { counts }
    }

    pub fn get(&self, label: EmotionLabel) -> u32 {
        self.counts[label.index()]
    }

    pub fn increment(&mut self, label: EmotionLabel) {
        self.counts[label.index()] += 1;
    }

    /// Total number of counted observations.
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Iterates `(label, count)` pairs in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, u32)> + '_ {
        EmotionLabel::ALL
            .iter()
            .map(move |&label| (label, self.get(label)))
    }

    /// The label with the highest count.
    ///
    /// Ties go to the label that comes first in enumeration order.
    pub fn dominant(&self) -> EmotionLabel {
        let mut best = EmotionLabel::Happy;
        let mut best_count = self.get(best);

        for (label, count) in self.iter().skip(1) {
            if count > best_count {
                best = label;
                best_count = count;
            }
        }

        best
    }
}

/// Serialized form of [`EmotionFrequency`]: all seven keys, in order.
#[derive(Serialize, Deserialize)]
struct FrequencyFields {
    #[serde(default)]
    happy: u32,
    #[serde(default)]
    sad: u32,
    #[serde(default)]
    angry: u32,
    #[serde(default)]
    fearful: u32,
    #[serde(default)]
    disgusted: u32,
    #[serde(default)]
    surprised: u32,
    #[serde(default)]
    neutral: u32,
}

impl From<FrequencyFields> for EmotionFrequency {
    fn from(f: FrequencyFields) -> Self {
        Self::from_counts([
            f.happy,
            f.sad,
            f.angry,
            f.fearful,
            f.disgusted,
            f.surprised,
            f.neutral,
        ])
    }
}

impl From<EmotionFrequency> for FrequencyFields {
    fn from(freq: EmotionFrequency) -> Self {
        let [happy, sad, angry, fearful, disgusted, surprised, neutral] = freq.counts;
        Self {
            happy,
            sad,
            angry,
            fearful,
            disgusted,
            surprised,
            neutral,
        }
    }
}

/// Derived summary of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Highest-frequency label.
    pub dominant_emotion: EmotionLabel,
    /// Histogram over all seven labels.
    pub emotion_frequency: EmotionFrequency,
    /// Earliest time covered by the report.
    pub start_time: DateTime<Utc>,
    /// Latest observation time.
    pub end_time: DateTime<Utc>,
}

/// Aggregate of one user's observations over one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Report identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Calendar day the report covers.
    pub day: NaiveDate,
    /// Observations in arrival order.
    pub expressions: Vec<Observation>,
    /// Derived summary.
    pub summary: ReportSummary,
    /// Free-text annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Opens a new report for `day`, seeded with its first observation.
    pub fn open(user_id: &str, day: NaiveDate, first: Observation) -> Self {
        let created_at = first.timestamp;
        let mut report = Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            day,
            expressions: Vec::new(),
            summary: ReportSummary {
                dominant_emotion: EmotionLabel::Happy,
                emotion_frequency: EmotionFrequency::default(),
                start_time: created_at,
                end_time: created_at,
            },
            notes: None,
            created_at,
        };
        report.append(first);
        report
    }

    /// Appends an observation and recomputes the summary.
    pub fn append(&mut self, observation: Observation) {
        let summary = &mut self.summary;
        summary.emotion_frequency.increment(observation.emotion);
        if observation.timestamp > summary.end_time {
            summary.end_time = observation.timestamp;
        }
        if observation.timestamp < summary.start_time {
            summary.start_time = observation.timestamp;
        }
        summary.dominant_emotion = summary.emotion_frequency.dominant();
        self.expressions.push(observation);
    }

    /// Mean classifier confidence across the report's observations.
    pub fn average_confidence(&self) -> Option<f64> {
        if self.expressions.is_empty() {
            return None;
        }
        let sum: f64 = self.expressions.iter().map(|e| e.confidence).sum();
        Some(sum / self.expressions.len() as f64)
    }
}

/// Share of one label across a set of reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionShare {
    pub emotion: EmotionLabel,
    /// Percentage in [0, 100].
    pub percentage: f64,
}

/// A suggested set of activities for a dominant mood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub title: &'static str,
    pub activities: &'static [&'static str],
}
