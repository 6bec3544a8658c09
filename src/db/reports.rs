use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Params, Row, TransactionBehavior};
use tracing::debug;

use super::{format_datetime, parse_datetime, Database};
use crate::models::{EmotionFrequency, EmotionLabel, Observation, Report, ReportSummary};

const REPORT_COLUMNS: &str = "id, user_id, day, dominant_emotion, \
     happy, sad, angry, fearful, disgusted, surprised, neutral, \
     start_time, end_time, notes, created_at";

const DAY_FORMAT: &str = "%Y-%m-%d";

fn day_key(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

fn row_to_report(row: &Row) -> Result<Report> {
    let mut counts = [0u32; 7];
    for (slot, label) in counts.iter_mut().zip(EmotionLabel::ALL) {
        *slot = row.get(label.as_str())?;
    }

    let day: String = row.get("day")?;
    let dominant: String = row.get("dominant_emotion")?;
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let created_at: String = row.get("created_at")?;

    Ok(Report {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        day: NaiveDate::parse_from_str(&day, DAY_FORMAT)
            .with_context(|| format!("failed to parse day '{day}'"))?,
        expressions: Vec::new(),
        summary: ReportSummary {
            dominant_emotion: dominant.parse()?,
            emotion_frequency: EmotionFrequency::from_counts(counts),
            start_time: parse_datetime(&start_time, "start_time")?,
            end_time: parse_datetime(&end_time, "end_time")?,
        },
        notes: row.get("notes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn load_expressions(conn: &Connection, report_id: &str) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, emotion, confidence
         FROM expressions
         WHERE report_id = ?1
         ORDER BY seq ASC",
    )?;

    let mut rows = stmt.query(params![report_id])?;
    let mut expressions = Vec::new();
    while let Some(row) = rows.next()? {
        let timestamp: String = row.get(0)?;
        let emotion: String = row.get(1)?;
        expressions.push(Observation {
            timestamp: parse_datetime(&timestamp, "expression timestamp")?,
            emotion: emotion.parse()?,
            confidence: row.get(2)?,
        });
    }

    Ok(expressions)
}

/// Loads the first report matching `clause`, with its expressions.
fn find_report<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Option<Report>> {
    let mut report = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE {clause} LIMIT 1"
        ))?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => row_to_report(row)?,
            None => return Ok(None),
        }
    };

    report.expressions = load_expressions(conn, &report.id)?;
    Ok(Some(report))
}

fn upsert_report(conn: &Connection, report: &Report) -> Result<()> {
    let freq = &report.summary.emotion_frequency;
    conn.execute(
        "INSERT INTO reports (id, user_id, day, dominant_emotion,
                              happy, sad, angry, fearful, disgusted, surprised, neutral,
                              start_time, end_time, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
             dominant_emotion = excluded.dominant_emotion,
             happy = excluded.happy,
             sad = excluded.sad,
             angry = excluded.angry,
             fearful = excluded.fearful,
             disgusted = excluded.disgusted,
             surprised = excluded.surprised,
             neutral = excluded.neutral,
             start_time = excluded.start_time,
             end_time = excluded.end_time",
        params![
            report.id,
            report.user_id,
            day_key(report.day),
            report.summary.dominant_emotion.as_str(),
            freq.get(EmotionLabel::Happy),
            freq.get(EmotionLabel::Sad),
            freq.get(EmotionLabel::Angry),
            freq.get(EmotionLabel::Fearful),
            freq.get(EmotionLabel::Disgusted),
            freq.get(EmotionLabel::Surprised),
            freq.get(EmotionLabel::Neutral),
            format_datetime(&report.summary.start_time),
            format_datetime(&report.summary.end_time),
            report.notes,
            format_datetime(&report.created_at),
        ],
    )
    .context("failed to upsert report")?;
    Ok(())
}

fn insert_expression(conn: &Connection, report_id: &str, seq: usize, observation: &Observation) -> Result<()> {
    let seq = i64::try_from(seq).context("expression sequence exceeds SQLite INTEGER range")?;
    conn.execute(
        "INSERT INTO expressions (report_id, seq, timestamp, emotion, confidence)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            report_id,
            seq,
            format_datetime(&observation.timestamp),
            observation.emotion.as_str(),
            observation.confidence,
        ],
    )
    .context("failed to insert expression")?;
    Ok(())
}

impl Database {
    /// Appends `observation` to the user's report for `day`, creating the
    /// report if this is the first observation of the day.
    ///
    /// Runs in a single immediate transaction: the append and the summary
    /// update commit together or not at all.
    pub async fn record_observation(
        &self,
        user_id: String,
        day: NaiveDate,
        observation: Observation,
    ) -> Result<Report> {
        self.execute(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("failed to begin report transaction")?;

            let existing = find_report(
                &tx,
                "user_id = ?1 AND day = ?2",
                params![user_id, day_key(day)],
            )?;

            let report = match existing {
                Some(mut report) => {
                    report.append(observation);
                    report
                }
                None => {
                    debug!("Opening new report for user {} on {}", user_id, day);
                    Report::open(&user_id, day, observation)
                }
            };

            let seq = report.expressions.len() - 1;
            upsert_report(&tx, &report)?;
            insert_expression(&tx, &report.id, seq, &report.expressions[seq])?;

            tx.commit().context("failed to commit observation")?;
            Ok(report)
        })
        .await
    }

    /// The user's most recent reports, newest first.
    pub async fn list_reports(&self, user_id: &str, limit: usize) -> Result<Vec<Report>> {
        let user_id = user_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut reports = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {REPORT_COLUMNS}
                     FROM reports
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2"
                ))?;

                let mut rows = stmt.query(params![user_id, limit])?;
                let mut reports = Vec::new();
                while let Some(row) = rows.next()? {
                    reports.push(row_to_report(row)?);
                }
                reports
            };

            for report in &mut reports {
                report.expressions = load_expressions(conn, &report.id)?;
            }

            Ok(reports)
        })
        .await
    }

    /// A single report, only if `user_id` owns it.
    pub async fn get_report(&self, user_id: &str, report_id: &str) -> Result<Option<Report>> {
        let user_id = user_id.to_string();
        let report_id = report_id.to_string();
        self.execute(move |conn| {
            find_report(conn, "id = ?1 AND user_id = ?2", params![report_id, user_id])
        })
        .await
    }

    /// Sets or clears the notes on a report owned by `user_id`.
    ///
    /// Returns `None` without writing anything when no such report exists.
    pub async fn set_report_notes(
        &self,
        user_id: &str,
        report_id: &str,
        notes: Option<String>,
    ) -> Result<Option<Report>> {
        let user_id = user_id.to_string();
        let report_id = report_id.to_string();
        self.execute(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE reports SET notes = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![notes, report_id, user_id],
                )
                .context("failed to update report notes")?;

            if changed == 0 {
                return Ok(None);
            }

            find_report(conn, "id = ?1", params![report_id])
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn obs(emotion: EmotionLabel, confidence: f64, ts: DateTime<Utc>) -> Observation {
        Observation::new(emotion, confidence, ts).unwrap()
    }

    async fn record(db: &Database, user: &str, emotion: EmotionLabel, ts: DateTime<Utc>) -> Report {
        db.record_observation(user.to_string(), ts.date_naive(), obs(emotion, 0.8, ts))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_persists_and_reloads() {
        let db = Database::in_memory().unwrap();
        record(&db, "u1", EmotionLabel::Happy, at(14, 9, 0)).await;
        record(&db, "u1", EmotionLabel::Happy, at(14, 9, 5)).await;
        let written = record(&db, "u1", EmotionLabel::Sad, at(14, 9, 10)).await;

        let loaded = db.get_report("u1", &written.id).await.unwrap().unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.expressions.len(), 3);
        assert_eq!(loaded.summary.emotion_frequency.get(EmotionLabel::Happy), 2);
        assert_eq!(loaded.summary.dominant_emotion, EmotionLabel::Happy);
    }

    #[tokio::test]
    async fn test_recorded_report_matches_reload_at_nanosecond_precision() {
        let db = Database::in_memory().unwrap();
        let first = at(14, 9, 0) + chrono::Duration::nanoseconds(123_456_789);
        record(&db, "u1", EmotionLabel::Happy, first).await;
        let written = record(
            &db,
            "u1",
            EmotionLabel::Sad,
            first + chrono::Duration::nanoseconds(1),
        )
        .await;

        let loaded = db.get_report("u1", &written.id).await.unwrap().unwrap();
        assert_eq!(loaded, written);
        assert_eq!(loaded.created_at, first);
        assert_eq!(loaded.expressions[1].timestamp, first + chrono::Duration::nanoseconds(1));
    }

    #[tokio::test]
    async fn test_new_day_opens_new_report() {
        let db = Database::in_memory().unwrap();
        let first = record(&db, "u1", EmotionLabel::Angry, at(14, 23, 59)).await;
        let second = record(&db, "u1", EmotionLabel::Angry, at(15, 0, 1)).await;

        assert_ne!(first.id, second.id);
        assert_eq!(second.expressions.len(), 1);
    }

    #[tokio::test]
    async fn test_list_reports_newest_first_with_limit() {
        let db = Database::in_memory().unwrap();
        for day in 1..=4 {
            record(&db, "u1", EmotionLabel::Neutral, at(day, 12, 0)).await;
        }
        record(&db, "u2", EmotionLabel::Sad, at(5, 12, 0)).await;

        let reports = db.list_reports("u1", 3).await.unwrap();
        let days: Vec<u32> = reports.iter().map(|r| chrono::Datelike::day(&r.day)).collect();
        assert_eq!(days, vec![4, 3, 2]);
        assert!(reports.iter().all(|r| r.user_id == "u1"));

        assert!(db.list_reports("nobody", 10).await.unwrap().is_empty());
        assert!(db.list_reports("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_report_checks_owner() {
        let db = Database::in_memory().unwrap();
        let report = record(&db, "owner", EmotionLabel::Fearful, at(14, 8, 0)).await;

        assert!(db.get_report("intruder", &report.id).await.unwrap().is_none());
        assert!(db.get_report("owner", "missing-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_notes() {
        let db = Database::in_memory().unwrap();
        let report = record(&db, "u1", EmotionLabel::Happy, at(14, 8, 0)).await;

        let updated = db
            .set_report_notes("u1", &report.id, Some("slept well".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("slept well"));

        assert!(db
            .set_report_notes("u2", &report.id, Some("hijack".into()))
            .await
            .unwrap()
            .is_none());

        let after = record(&db, "u1", EmotionLabel::Sad, at(14, 9, 0)).await;
        assert_eq!(after.notes.as_deref(), Some("slept well"));

        let cleared = db.set_report_notes("u1", &report.id, None).await.unwrap().unwrap();
        assert!(cleared.notes.is_none());
    }
}
