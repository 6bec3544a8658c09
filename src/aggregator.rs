//! Mood aggregation service.
//!
//! Validates incoming observations, assigns them to a calendar day and
//! hands them to the store, which keeps exactly one report per user per
//! day.

use crate::db::Database;
use crate::error::{MoodError, MoodResult};
use crate::models::{validate_confidence, EmotionLabel, Observation, Report};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default number of reports returned by [`MoodAggregator::list_reports`].
pub const DEFAULT_REPORT_LIMIT: usize = 10;

/// Which midnight starts a new report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    /// Server-local midnight
    #[default]
    Local,
    /// UTC midnight
    Utc,
}

impl DayBoundary {
    /// Calendar day that `timestamp` falls on.
    pub fn day_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => timestamp.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => timestamp.date_naive(),
        }
    }
}

/// Entry point for recording and reading mood reports.
#[derive(Clone)]
pub struct MoodAggregator {
    db: Database,
    day_boundary: DayBoundary,
}

impl MoodAggregator {
    pub fn new(db: Database, day_boundary: DayBoundary) -> Self {
        Self { db, day_boundary }
    }

    /// Record an observation given as raw label text.
    ///
    /// The label and confidence are validated before anything is written.
    /// `timestamp` defaults to now.
    pub async fn record_observation(
        &self,
        user_id: &str,
        emotion: &str,
        confidence: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> MoodResult<Report> {
        let emotion: EmotionLabel = emotion.parse()?;
        self.record(user_id, emotion, confidence, timestamp).await
    }

    /// Record an already-typed observation.
    pub async fn record(
        &self,
        user_id: &str,
        emotion: EmotionLabel,
        confidence: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> MoodResult<Report> {
        let user_id = require_user(user_id)?;
        validate_confidence(confidence)?;

        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let day = self.day_boundary.day_of(timestamp);
        let observation = Observation::new(emotion, confidence, timestamp)?;

        let report = self
            .db
            .record_observation(user_id.to_string(), day, observation)
            .await
            .map_err(|e| MoodError::Storage(e.context("failed to record observation")))?;

        info!(
            "Recorded {} ({:.2}) for {} in report {} [{} observations, dominant {}]",
            emotion,
            confidence,
            user_id,
            report.id,
            report.expressions.len(),
            report.summary.dominant_emotion
        );

        Ok(report)
    }

    /// The user's `limit` most recent reports, newest first.
    pub async fn list_reports(&self, user_id: &str, limit: usize) -> MoodResult<Vec<Report>> {
        let user_id = require_user(user_id)?;
        let reports = self
            .db
            .list_reports(user_id, limit)
            .await
            .map_err(|e| MoodError::Storage(e.context("failed to list reports")))?;

        debug!("Loaded {} reports for {}", reports.len(), user_id);
        Ok(reports)
    }

    /// A single report owned by `user_id`.
    ///
    /// Missing and foreign-owned reports both yield [`MoodError::NotFound`].
    pub async fn get_report(&self, user_id: &str, report_id: &str) -> MoodResult<Report> {
        let user_id = require_user(user_id)?;
        self.db
            .get_report(user_id, report_id)
            .await
            .map_err(|e| MoodError::Storage(e.context("failed to load report")))?
            .ok_or_else(|| MoodError::NotFound(report_id.to_string()))
    }

    /// Set (or clear, with `None`) the notes on a report owned by `user_id`.
    pub async fn set_notes(
        &self,
        user_id: &str,
        report_id: &str,
        notes: Option<String>,
    ) -> MoodResult<Report> {
        let user_id = require_user(user_id)?;
        let notes = notes.filter(|n| !n.trim().is_empty());
        let report = self
            .db
            .set_report_notes(user_id, report_id, notes)
            .await
            .map_err(|e| MoodError::Storage(e.context("failed to update notes")))?
            .ok_or_else(|| MoodError::NotFound(report_id.to_string()))?;

        info!("Updated notes on report {}", report.id);
        Ok(report)
    }
}

fn require_user(user_id: &str) -> MoodResult<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        Err(MoodError::MissingUser)
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use futures::future::join_all;

    fn aggregator() -> MoodAggregator {
        MoodAggregator::new(Database::in_memory().unwrap(), DayBoundary::Utc)
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_single_observation_each_label() {
        for label in EmotionLabel::ALL {
            let agg = aggregator();
            let report = agg
                .record_observation("u1", label.as_str(), 0.7, None)
                .await
                .unwrap();

            for (other, count) in report.summary.emotion_frequency.iter() {
                assert_eq!(count, u32::from(other == label));
            }
            assert_eq!(report.summary.dominant_emotion, label);
        }
    }

    #[tokio::test]
    async fn test_example_day() {
        let agg = aggregator();
        agg.record_observation("U", "happy", 0.9, Some(at(14, 9, 0))).await.unwrap();
        agg.record_observation("U", "happy", 0.8, Some(at(14, 9, 5))).await.unwrap();
        let report = agg
            .record_observation("U", "sad", 0.7, Some(at(14, 9, 10)))
            .await
            .unwrap();

        let freq = report.summary.emotion_frequency;
        assert_eq!(freq.get(EmotionLabel::Happy), 2);
        assert_eq!(freq.get(EmotionLabel::Sad), 1);
        for label in [
            EmotionLabel::Angry,
            EmotionLabel::Fearful,
            EmotionLabel::Disgusted,
            EmotionLabel::Surprised,
            EmotionLabel::Neutral,
        ] {
            assert_eq!(freq.get(label), 0);
        }
        assert_eq!(report.summary.dominant_emotion, EmotionLabel::Happy);
        assert_eq!(report.expressions.len(), 3);
        assert_eq!(report.summary.end_time, at(14, 9, 10));
    }

    #[tokio::test]
    async fn test_counts_match_observations() {
        let agg = aggregator();
        let labels = ["neutral", "sad", "sad", "surprised", "happy", "disgusted", "sad"];
        let mut last = None;
        for (i, label) in labels.iter().enumerate() {
            let ts = at(14, 10, 0) + Duration::minutes(i as i64);
            last = Some(agg.record_observation("u1", label, 0.5, Some(ts)).await.unwrap());
        }

        let report = last.unwrap();
        assert_eq!(report.summary.emotion_frequency.total() as usize, labels.len());
        assert_eq!(report.expressions.len(), labels.len());
        assert_eq!(report.summary.dominant_emotion, EmotionLabel::Sad);
        assert_eq!(agg.list_reports("u1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_without_writes() {
        let agg = aggregator();

        let err = agg.record_observation("u1", "ecstatic", 0.9, None).await.unwrap_err();
        assert!(matches!(err, MoodError::InvalidEmotionLabel(_)));

        let err = agg.record_observation("u1", "happy", 1.5, None).await.unwrap_err();
        assert!(matches!(err, MoodError::InvalidConfidence(_)));

        let err = agg.record_observation("  ", "happy", 0.5, None).await.unwrap_err();
        assert!(matches!(err, MoodError::MissingUser));

        assert!(agg.list_reports("u1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_day_boundary_opens_new_report() {
        let agg = aggregator();
        let before = agg
            .record_observation("u1", "sad", 0.6, Some(at(14, 23, 59)))
            .await
            .unwrap();
        let after = agg
            .record_observation("u1", "sad", 0.6, Some(at(15, 0, 0)))
            .await
            .unwrap();

        assert_ne!(before.id, after.id);
        assert_eq!(after.expressions.len(), 1);

        let reports = agg.list_reports("u1", 10).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].id, after.id);
    }

    #[tokio::test]
    async fn test_reads_are_idempotent() {
        let agg = aggregator();
        let report = agg
            .record_observation("u1", "angry", 0.4, Some(at(14, 8, 0)))
            .await
            .unwrap();

        assert_eq!(
            agg.list_reports("u1", 10).await.unwrap(),
            agg.list_reports("u1", 10).await.unwrap()
        );
        assert_eq!(
            agg.get_report("u1", &report.id).await.unwrap(),
            agg.get_report("u1", &report.id).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_report_foreign_owner_is_not_found() {
        let agg = aggregator();
        let theirs = agg.record_observation("userB", "happy", 0.9, None).await.unwrap();

        let err = agg.get_report("userA", &theirs.id).await.unwrap_err();
        assert!(matches!(err, MoodError::NotFound(id) if id == theirs.id));

        let err = agg.get_report("userA", "does-not-exist").await.unwrap_err();
        assert!(matches!(err, MoodError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_notes_ownership() {
        let agg = aggregator();
        let report = agg.record_observation("u1", "neutral", 0.5, None).await.unwrap();

        let err = agg
            .set_notes("u2", &report.id, Some("not mine".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MoodError::NotFound(_)));

        let unchanged = agg.get_report("u1", &report.id).await.unwrap();
        assert!(unchanged.notes.is_none());

        let updated = agg
            .set_notes("u1", &report.id, Some("long day".into()))
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("long day"));

        let cleared = agg.set_notes("u1", &report.id, Some("   ".into())).await.unwrap();
        assert!(cleared.notes.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_records_share_one_report() {
        let agg = aggregator();
        let n = 32;

        let tasks = (0..n).map(|i| {
            let agg = agg.clone();
            tokio::spawn(async move {
                let ts = at(14, 12, 0) + Duration::seconds(i);
                agg.record_observation("u1", "happy", 0.9, Some(ts)).await
            })
        });

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let reports = agg.list_reports("u1", 10).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].expressions.len(), n as usize);
        assert_eq!(reports[0].summary.emotion_frequency.total(), n as u32);
    }

    #[tokio::test]
    async fn test_local_midnight_opens_new_report() {
        let agg = MoodAggregator::new(Database::in_memory().unwrap(), DayBoundary::Local);
        let local = |day, hour, minute, second| {
            Local
                .with_ymd_and_hms(2026, 3, day, hour, minute, second)
                .single()
                .unwrap()
                .with_timezone(&Utc)
        };

        let morning = agg
            .record_observation("u1", "happy", 0.8, Some(local(14, 8, 0, 0)))
            .await
            .unwrap();
        let late = agg
            .record_observation("u1", "sad", 0.6, Some(local(14, 23, 59, 0)))
            .await
            .unwrap();
        let after_midnight = agg
            .record_observation("u1", "sad", 0.6, Some(local(15, 0, 0, 1)))
            .await
            .unwrap();

        assert_eq!(morning.id, late.id);
        assert_eq!(late.expressions.len(), 2);
        assert_eq!(late.day, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());

        assert_ne!(late.id, after_midnight.id);
        assert_eq!(after_midnight.expressions.len(), 1);
        assert_eq!(after_midnight.day, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(agg.list_reports("u1", 10).await.unwrap().len(), 2);
    }

    #[test]
    fn test_day_boundary_utc() {
        let late = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_ne!(DayBoundary::Utc.day_of(late), DayBoundary::Utc.day_of(early));
        assert_eq!(
            DayBoundary::Local.day_of(late),
            late.with_timezone(&Local).date_naive()
        );
    }
}
