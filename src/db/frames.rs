use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;

use crate::db::{parse_datetime, Database};

/// Per-frame detection record, persisted independently of the live session
/// buffer (the buffer is bounded; this stream is the ground truth).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub confidence: f64,
    pub scores: HashMap<String, f64>,
    pub stress_score: u8,
}

impl Database {
    pub async fn insert_frame_record(&self, record: &FrameRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO frame_records (id, session_id, user_id, timestamp, label,
                                            confidence, scores, stress_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.session_id,
                    record.user_id,
                    record.timestamp.to_rfc3339(),
                    record.label,
                    record.confidence,
                    serde_json::to_string(&record.scores)?,
                    i64::from(record.stress_score),
                ],
            )
            .with_context(|| "failed to insert frame record")?;
            Ok(())
        })
        .await
    }

    pub async fn get_frame_records_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<FrameRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, user_id, timestamp, label, confidence, scores,
                        stress_score
                 FROM frame_records
                 WHERE session_id = ?1
                 ORDER BY timestamp ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp: String = row.get("timestamp")?;
                let scores_raw: String = row.get("scores")?;
                let stress: i64 = row.get("stress_score")?;
                records.push(FrameRecord {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    user_id: row.get("user_id")?,
                    timestamp: parse_datetime(&timestamp)?,
                    label: row.get("label")?,
                    confidence: row.get("confidence")?,
                    scores: serde_json::from_str(&scores_raw)
                        .with_context(|| "failed to parse frame scores")?,
                    stress_score: u8::try_from(stress)
                        .with_context(|| "stress score out of range")?,
                });
            }
            Ok(records)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn frame_records_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());

        let base = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for i in 0..3i64 {
            let record = FrameRecord {
                id: format!("f{i}"),
                session_id: "s1".into(),
                user_id: "u1".into(),
                timestamp: base + chrono::Duration::seconds(i),
                label: "Neutral".into(),
                confidence: 0.8,
                scores: HashMap::from([("Neutral".to_string(), 0.8)]),
                stress_score: 4,
            };
            db.insert_frame_record(&record).await.unwrap();
        }

        let records = db.get_frame_records_for_session("s1").await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "f0");
        assert_eq!(records[2].timestamp, base + chrono::Duration::seconds(2));
        assert_eq!(records[0].scores["Neutral"], 0.8);

        let other = db.get_frame_records_for_session("s2").await.unwrap();
        assert!(other.is_empty());
    }
}
