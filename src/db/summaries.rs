use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::Database;
use crate::session::SessionSummary;

impl Database {
    pub async fn insert_session_summary(&self, summary: &SessionSummary) -> Result<()> {
        let summary = summary.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO session_summaries
                     (session_id, user_id, started_at, ended_at, duration_minutes,
                      entry_count, emotion_distribution, dominant_emotion,
                      average_stress, min_stress, max_stress, stress_level,
                      average_confidence, quality_score, recommendations, warning)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    summary.session_id,
                    summary.user_id,
                    summary.started_at.to_rfc3339(),
                    summary.ended_at.to_rfc3339(),
                    summary.duration_minutes,
                    summary.entry_count as i64,
                    serde_json::to_string(&summary.emotion_distribution)?,
                    summary.dominant_emotion,
                    summary.average_stress,
                    i64::from(summary.min_stress),
                    i64::from(summary.max_stress),
                    summary.stress_level,
                    summary.average_confidence,
                    summary.quality_score,
                    serde_json::to_string(&summary.recommendations)?,
                    summary.warning,
                ],
            )
            .with_context(|| "failed to insert session summary")?;
            Ok(())
        })
        .await
    }

    pub async fn count_session_summaries_for_user(&self, user_id: &str) -> Result<i64> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM session_summaries WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    #[tokio::test]
    async fn summary_insert_is_idempotent_per_session() {
        let db = Database::open_in_memory().unwrap();
        let started = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let summary = SessionSummary {
            session_id: "s1".into(),
            user_id: "u1".into(),
            started_at: started,
            ended_at: started + Duration::minutes(30),
            duration_minutes: 30.0,
            entry_count: 42,
            emotion_distribution: HashMap::from([("Neutral".to_string(), 42)]),
            dominant_emotion: Some("Neutral".into()),
            average_stress: 4.0,
            min_stress: 3,
            max_stress: 5,
            stress_level: "Moderate".into(),
            average_confidence: 0.81,
            quality_score: 90.0,
            recommendations: vec!["Take regular short breaks".into()],
            warning: None,
        };

        db.insert_session_summary(&summary).await.unwrap();
        db.insert_session_summary(&summary).await.unwrap();

        assert_eq!(db.count_session_summaries_for_user("u1").await.unwrap(), 1);
        assert_eq!(db.count_session_summaries_for_user("u2").await.unwrap(), 0);
    }
}
