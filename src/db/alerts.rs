use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::alerts::{Alert, Severity};
use crate::db::{parse_datetime, Database};

/// Result of the combined cooldown/quota/insert task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertInsertOutcome {
    Inserted,
    CooldownActive,
    DailyLimitReached,
}

fn row_to_alert(row: &Row) -> Result<Alert> {
    let severity_raw: String = row.get("severity")?;
    let severity = Severity::parse(&severity_raw)
        .ok_or_else(|| anyhow!("unknown alert severity '{severity_raw}'"))?;
    let metadata_raw: String = row.get("metadata")?;
    let metadata = serde_json::from_str(&metadata_raw)
        .with_context(|| "failed to parse alert metadata")?;
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;
    let acknowledged_at: Option<String> = row.get("acknowledged_at")?;
    let acknowledged: i64 = row.get("acknowledged")?;

    Ok(Alert {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        alert_type: row.get("alert_type")?,
        severity,
        message: row.get("message")?,
        metadata,
        acknowledged: acknowledged != 0,
        acknowledged_at: acknowledged_at
            .map(|value| parse_datetime(&value))
            .transpose()?,
        created_at: parse_datetime(&created_at)?,
        expires_at: parse_datetime(&expires_at)?,
    })
}

fn insert_alert_row(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "INSERT INTO alerts (id, user_id, alert_type, severity, message, metadata,
                             acknowledged, acknowledged_at, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            alert.id,
            alert.user_id,
            alert.alert_type,
            alert.severity.as_str(),
            alert.message,
            serde_json::to_string(&alert.metadata)?,
            alert.acknowledged as i64,
            alert.acknowledged_at.map(|dt| dt.to_rfc3339()),
            alert.created_at.to_rfc3339(),
            alert.expires_at.to_rfc3339(),
        ],
    )
    .with_context(|| "failed to insert alert")?;
    Ok(())
}

impl Database {
    /// Cooldown check, daily-quota count, and insert in one task on the
    /// worker thread; two concurrent callers cannot both pass the checks.
    pub async fn try_insert_alert(
        &self,
        alert: Alert,
        cooldown_since: DateTime<Utc>,
        day_start: DateTime<Utc>,
        daily_limit: i64,
    ) -> Result<AlertInsertOutcome> {
        self.execute(move |conn| {
            let recent: Option<String> = conn
                .query_row(
                    "SELECT id FROM alerts
                     WHERE user_id = ?1 AND alert_type = ?2 AND created_at >= ?3
                     ORDER BY created_at DESC
                     LIMIT 1",
                    params![
                        alert.user_id,
                        alert.alert_type,
                        cooldown_since.to_rfc3339()
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            if recent.is_some() {
                return Ok(AlertInsertOutcome::CooldownActive);
            }

            let today_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM alerts WHERE user_id = ?1 AND created_at >= ?2",
                params![alert.user_id, day_start.to_rfc3339()],
                |row| row.get(0),
            )?;
            if today_count >= daily_limit {
                return Ok(AlertInsertOutcome::DailyLimitReached);
            }

            insert_alert_row(conn, &alert)?;
            Ok(AlertInsertOutcome::Inserted)
        })
        .await
    }

    pub async fn find_recent_alert(
        &self,
        user_id: &str,
        alert_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Alert>> {
        let user_id = user_id.to_string();
        let alert_type = alert_type.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, alert_type, severity, message, metadata,
                        acknowledged, acknowledged_at, created_at, expires_at
                 FROM alerts
                 WHERE user_id = ?1 AND alert_type = ?2 AND created_at >= ?3
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![user_id, alert_type, since.to_rfc3339()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_alert(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn count_alerts_since(
        &self,
        user_id: &str,
        alert_type: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let user_id = user_id.to_string();
        let alert_type = alert_type.map(str::to_string);
        self.execute(move |conn| {
            let count = match alert_type {
                Some(alert_type) => conn.query_row(
                    "SELECT COUNT(*) FROM alerts
                     WHERE user_id = ?1 AND alert_type = ?2 AND created_at >= ?3",
                    params![user_id, alert_type, since.to_rfc3339()],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM alerts WHERE user_id = ?1 AND created_at >= ?2",
                    params![user_id, since.to_rfc3339()],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })
        .await
    }

    pub async fn list_alerts_for_user(
        &self,
        user_id: &str,
        limit: i64,
        acknowledged: Option<bool>,
    ) -> Result<Vec<Alert>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut alerts = Vec::new();
            match acknowledged {
                Some(flag) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, user_id, alert_type, severity, message, metadata,
                                acknowledged, acknowledged_at, created_at, expires_at
                         FROM alerts
                         WHERE user_id = ?1 AND acknowledged = ?2
                         ORDER BY created_at DESC
                         LIMIT ?3",
                    )?;
                    let mut rows = stmt.query(params![user_id, flag as i64, limit])?;
                    while let Some(row) = rows.next()? {
                        alerts.push(row_to_alert(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, user_id, alert_type, severity, message, metadata,
                                acknowledged, acknowledged_at, created_at, expires_at
                         FROM alerts
                         WHERE user_id = ?1
                         ORDER BY created_at DESC
                         LIMIT ?2",
                    )?;
                    let mut rows = stmt.query(params![user_id, limit])?;
                    while let Some(row) = rows.next()? {
                        alerts.push(row_to_alert(row)?);
                    }
                }
            }
            Ok(alerts)
        })
        .await
    }

    /// Returns false when the alert id is unknown.
    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<bool> {
        let alert_id = alert_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE alerts
                 SET acknowledged = 1,
                     acknowledged_at = ?1
                 WHERE id = ?2",
                params![acknowledged_at.to_rfc3339(), alert_id],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    /// Remove acknowledged alerts created before the cutoff; returns the
    /// number deleted.
    pub async fn delete_old_alerts(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM alerts WHERE acknowledged = 1 AND created_at < ?1",
                params![cutoff.to_rfc3339()],
            )?;
            Ok(deleted)
        })
        .await
    }
}
