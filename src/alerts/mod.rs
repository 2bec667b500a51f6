pub mod throttler;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use throttler::AlertThrottler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// How long an alert of this severity stays live before expiring.
    pub fn expiry(&self) -> Duration {
        match self {
            Severity::Low => Duration::hours(24),
            Severity::Medium => Duration::hours(48),
            Severity::High => Duration::hours(72),
            Severity::Critical => Duration::hours(168),
        }
    }
}

/// A persisted alert. Mutated only by acknowledgement after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub metadata: serde_json::Value,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Why a throttler turned an alert request down. Rejections are successful
/// decisions, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleReason {
    CooldownActive,
    DailyLimitReached,
}

/// Outcome of `check_and_create`. Callers must inspect `created` rather
/// than assuming success implies an alert exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDecision {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ThrottleReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

impl AlertDecision {
    pub fn created(alert: Alert) -> Self {
        Self {
            created: true,
            reason: None,
            alert: Some(alert),
        }
    }

    pub fn rejected(reason: ThrottleReason) -> Self {
        Self {
            created: false,
            reason: Some(reason),
            alert: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_round_trips_through_strings() {
        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(Severity::parse(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::parse("urgent"), None);
    }

    #[test]
    fn expiry_grows_with_severity() {
        assert_eq!(Severity::Low.expiry(), Duration::hours(24));
        assert_eq!(Severity::Medium.expiry(), Duration::hours(48));
        assert_eq!(Severity::High.expiry(), Duration::hours(72));
        assert_eq!(Severity::Critical.expiry(), Duration::hours(168));
    }
}
