//! Caller-facing facade over the session manager and alert throttler.
//!
//! Every method returns an `ApiResponse` envelope; nothing here panics
//! across the boundary. High-stress frames additionally run through the
//! throttler, and the (possibly rejected) alert decision rides along on
//! the frame response.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::warn;
use serde::Serialize;
use serde_json::json;

use crate::aggregation::{analyze_batch, AggregationResult, AggregationStrategy};
use crate::alerts::{Alert, AlertDecision, AlertThrottler};
use crate::classifier::{Classifier, FramePayload};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{ApiResponse, EngineResult};
use crate::session::{
    FrameAnalysis, SessionManager, SessionStatistics, SessionStatusView, SessionSummary,
    StartedSession,
};

/// Alert type used for threshold-crossing alerts raised by the engine.
const HIGH_STRESS_ALERT: &str = "high_stress";

/// Frame response with the threshold-alert decision, when one was made.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFrame {
    #[serde(flatten)]
    pub analysis: FrameAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertDecision>,
}

pub struct EmotionEngine {
    sessions: SessionManager,
    throttler: AlertThrottler,
    classifier: Arc<dyn Classifier>,
    config: EngineConfig,
}

impl EmotionEngine {
    pub fn new(classifier: Arc<dyn Classifier>, db: Database, config: EngineConfig) -> Self {
        Self {
            sessions: SessionManager::new(classifier.clone(), db.clone(), config.clone()),
            throttler: AlertThrottler::new(db, &config),
            classifier,
            config,
        }
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        duration_minutes: u32,
        metadata: HashMap<String, serde_json::Value>,
    ) -> ApiResponse<StartedSession> {
        ApiResponse::from_result(
            self.sessions
                .start(user_id, duration_minutes, metadata, Utc::now())
                .await,
        )
    }

    pub async fn process_frame(
        &self,
        session_id: &str,
        user_id: &str,
        payload: &FramePayload,
    ) -> ApiResponse<ProcessedFrame> {
        ApiResponse::from_result(self.process_frame_inner(session_id, user_id, payload).await)
    }

    async fn process_frame_inner(
        &self,
        session_id: &str,
        user_id: &str,
        payload: &FramePayload,
    ) -> EngineResult<ProcessedFrame> {
        let now = Utc::now();
        let analysis = self
            .sessions
            .process_frame(session_id, user_id, payload, now)
            .await?;

        let alert = if analysis.stress_score >= self.config.high_stress_threshold {
            let severity = if analysis.stress_score >= self.config.critical_stress_threshold {
                "high"
            } else {
                "medium"
            };
            let message = format!(
                "Stress level {} detected ({})",
                analysis.stress_score, analysis.stress_level
            );
            let metadata = json!({
                "sessionId": session_id,
                "stressScore": analysis.stress_score,
                "emotion": analysis.raw.label,
            });
            match self
                .throttler
                .check_and_create(user_id, HIGH_STRESS_ALERT, severity, &message, metadata, now)
                .await
            {
                Ok(decision) => Some(decision),
                // The frame result stands even if the alert path fails.
                Err(err) => {
                    warn!("Threshold alert check failed for user {user_id}: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(ProcessedFrame { analysis, alert })
    }

    pub async fn pause_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResponse<SessionStatusView> {
        ApiResponse::from_result(self.sessions.pause(session_id, user_id, Utc::now()).await)
    }

    pub async fn resume_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResponse<SessionStatusView> {
        ApiResponse::from_result(self.sessions.resume(session_id, user_id, Utc::now()).await)
    }

    pub async fn complete_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResponse<SessionSummary> {
        ApiResponse::from_result(self.sessions.complete(session_id, user_id, Utc::now()).await)
    }

    pub async fn get_session_status(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResponse<SessionStatusView> {
        ApiResponse::from_result(
            self.sessions
                .get_status(session_id, user_id, Utc::now())
                .await,
        )
    }

    pub async fn get_session_statistics(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> ApiResponse<SessionStatistics> {
        ApiResponse::from_result(self.sessions.get_statistics(session_id, user_id).await)
    }

    /// Sessionless batch analysis over a finite set of frames.
    pub fn analyze_frames(
        &self,
        frames: &[FramePayload],
        strategy: AggregationStrategy,
    ) -> ApiResponse<AggregationResult> {
        ApiResponse::from_result(analyze_batch(self.classifier.as_ref(), frames, strategy))
    }

    pub async fn check_and_create_alert(
        &self,
        user_id: &str,
        alert_type: &str,
        severity: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> ApiResponse<AlertDecision> {
        ApiResponse::from_result(
            self.throttler
                .check_and_create(user_id, alert_type, severity, message, metadata, Utc::now())
                .await,
        )
    }

    pub async fn get_user_alerts(
        &self,
        user_id: &str,
        limit: i64,
        acknowledged: Option<bool>,
    ) -> ApiResponse<Vec<Alert>> {
        ApiResponse::from_result(self.throttler.get_user_alerts(user_id, limit, acknowledged).await)
    }

    pub async fn acknowledge_alert(&self, alert_id: &str) -> ApiResponse<()> {
        ApiResponse::from_result(self.throttler.acknowledge_alert(alert_id, Utc::now()).await)
    }

    pub async fn delete_old_alerts(&self, days: i64) -> ApiResponse<usize> {
        ApiResponse::from_result(self.throttler.delete_old_alerts(days, Utc::now()).await)
    }
}
