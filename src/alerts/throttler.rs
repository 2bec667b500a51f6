use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

use crate::alerts::{Alert, AlertDecision, Severity, ThrottleReason};
use crate::config::EngineConfig;
use crate::db::{AlertInsertOutcome, Database};
use crate::error::{EngineError, EngineResult};

/// Cooldown and daily-quota gate in front of alert creation.
///
/// The check and the insert run as one task on the store's worker thread,
/// so concurrent requests for the same (user, type) pair cannot both pass.
#[derive(Clone)]
pub struct AlertThrottler {
    db: Database,
    cooldown: Duration,
    daily_limit: i64,
}

impl AlertThrottler {
    pub fn new(db: Database, config: &EngineConfig) -> Self {
        Self {
            db,
            cooldown: Duration::minutes(config.alert_cooldown_minutes),
            daily_limit: config.max_daily_alerts,
        }
    }

    /// Create an alert unless the cooldown or the daily quota blocks it.
    /// A rejection is a successful decision, not an error.
    pub async fn check_and_create(
        &self,
        user_id: &str,
        alert_type: &str,
        severity: &str,
        message: &str,
        metadata: Value,
        now: DateTime<Utc>,
    ) -> EngineResult<AlertDecision> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "user_id must not be empty".into(),
            ));
        }
        if alert_type.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "alert_type must not be empty".into(),
            ));
        }
        let severity = Severity::parse(severity).ok_or_else(|| {
            EngineError::InvalidArgument(format!("unknown severity '{severity}'"))
        })?;

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            alert_type: alert_type.to_string(),
            severity,
            message: message.to_string(),
            metadata,
            acknowledged: false,
            acknowledged_at: None,
            created_at: now,
            expires_at: now + severity.expiry(),
        };

        let cooldown_since = now - self.cooldown;
        let day_start = day_start_utc(now);

        let outcome = self
            .db
            .try_insert_alert(alert.clone(), cooldown_since, day_start, self.daily_limit)
            .await?;

        match outcome {
            AlertInsertOutcome::Inserted => {
                info!(
                    "Alert {} created for user {} (type {}, severity {})",
                    alert.id,
                    alert.user_id,
                    alert.alert_type,
                    severity.as_str()
                );
                Ok(AlertDecision::created(alert))
            }
            AlertInsertOutcome::CooldownActive => {
                debug!(
                    "Alert suppressed for user {} (type {}): cooldown active",
                    user_id, alert_type
                );
                Ok(AlertDecision::rejected(ThrottleReason::CooldownActive))
            }
            AlertInsertOutcome::DailyLimitReached => {
                debug!(
                    "Alert suppressed for user {}: daily limit reached",
                    user_id
                );
                Ok(AlertDecision::rejected(ThrottleReason::DailyLimitReached))
            }
        }
    }

    pub async fn get_user_alerts(
        &self,
        user_id: &str,
        limit: i64,
        acknowledged: Option<bool>,
    ) -> EngineResult<Vec<Alert>> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "user_id must not be empty".into(),
            ));
        }
        let limit = limit.clamp(1, 200);
        Ok(self.db.list_alerts_for_user(user_id, limit, acknowledged).await?)
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let updated = self.db.acknowledge_alert(alert_id, now).await?;
        if !updated {
            return Err(EngineError::NotFound(format!(
                "alert '{alert_id}' does not exist"
            )));
        }
        Ok(())
    }

    /// Purge acknowledged alerts older than the given number of days.
    pub async fn delete_old_alerts(&self, days: i64, now: DateTime<Utc>) -> EngineResult<usize> {
        if days < 1 {
            return Err(EngineError::InvalidArgument(
                "retention must be at least one day".into(),
            ));
        }
        let cutoff = now - Duration::days(days);
        let deleted = self.db.delete_old_alerts(cutoff).await?;
        if deleted > 0 {
            info!("Deleted {deleted} old acknowledged alerts");
        }
        Ok(deleted)
    }
}

/// Midnight UTC of the day containing `now`; the daily quota resets here.
fn day_start_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn throttler() -> AlertThrottler {
        let db = Database::open_in_memory().unwrap();
        AlertThrottler::new(db, &EngineConfig::default())
    }

    fn t(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn second_alert_within_cooldown_is_rejected() {
        let throttler = throttler();

        let first = throttler
            .check_and_create("u1", "high_stress", "medium", "sustained stress", Value::Null, t(10, 0))
            .await
            .unwrap();
        assert!(first.created);

        let second = throttler
            .check_and_create("u1", "high_stress", "medium", "sustained stress", Value::Null, t(10, 10))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.reason, Some(ThrottleReason::CooldownActive));

        let third = throttler
            .check_and_create("u1", "high_stress", "medium", "sustained stress", Value::Null, t(10, 16))
            .await
            .unwrap();
        assert!(third.created);
    }

    #[tokio::test]
    async fn cooldown_is_scoped_to_alert_type() {
        let throttler = throttler();

        throttler
            .check_and_create("u1", "high_stress", "medium", "m", Value::Null, t(10, 0))
            .await
            .unwrap();
        let other_type = throttler
            .check_and_create("u1", "session_quality", "low", "m", Value::Null, t(10, 1))
            .await
            .unwrap();
        assert!(other_type.created);
    }

    #[tokio::test]
    async fn daily_quota_counts_across_types() {
        let throttler = throttler();

        for i in 0..5u32 {
            let decision = throttler
                .check_and_create(
                    "u1",
                    &format!("type_{i}"),
                    "medium",
                    "m",
                    Value::Null,
                    t(9, i),
                )
                .await
                .unwrap();
            assert!(decision.created);
        }

        let sixth = throttler
            .check_and_create("u1", "type_6", "medium", "m", Value::Null, t(9, 30))
            .await
            .unwrap();
        assert!(!sixth.created);
        assert_eq!(sixth.reason, Some(ThrottleReason::DailyLimitReached));
    }

    #[tokio::test]
    async fn quota_does_not_leak_across_users() {
        let throttler = throttler();

        for i in 0..5u32 {
            throttler
                .check_and_create("u1", &format!("type_{i}"), "medium", "m", Value::Null, t(9, i))
                .await
                .unwrap();
        }
        let other_user = throttler
            .check_and_create("u2", "type_0", "medium", "m", Value::Null, t(9, 30))
            .await
            .unwrap();
        assert!(other_user.created);
    }

    #[tokio::test]
    async fn invalid_severity_is_an_argument_error() {
        let throttler = throttler();
        let err = throttler
            .check_and_create("u1", "high_stress", "urgent", "m", Value::Null, t(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn acknowledge_unknown_alert_is_not_found() {
        let throttler = throttler();
        let err = throttler
            .acknowledge_alert("missing", t(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn acknowledged_alerts_can_be_purged() {
        let throttler = throttler();
        let decision = throttler
            .check_and_create("u1", "high_stress", "medium", "m", Value::Null, t(9, 0))
            .await
            .unwrap();
        let alert = decision.alert.unwrap();

        throttler.acknowledge_alert(&alert.id, t(9, 5)).await.unwrap();

        let later = t(9, 0) + Duration::days(40);
        let deleted = throttler.delete_old_alerts(30, later).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = throttler.get_user_alerts("u1", 10, None).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn expiry_follows_severity() {
        let throttler = throttler();
        let decision = throttler
            .check_and_create("u1", "high_stress", "critical", "m", Value::Null, t(9, 0))
            .await
            .unwrap();
        let alert = decision.alert.unwrap();
        assert_eq!(alert.expires_at - alert.created_at, Duration::hours(168));
    }
}
