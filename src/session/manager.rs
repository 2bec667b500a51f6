//! Session registry and per-frame pipeline.
//!
//! Sessions live in memory behind a registry mutex; each session has its
//! own lock so frame processing for one session never blocks another.
//! Classification runs with no locks held, and the session state is
//! re-checked afterwards before the result is recorded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::classifier::{Classification, Classifier, FramePayload};
use crate::config::{EngineConfig, MAX_SESSION_MINUTES, MIN_SESSION_MINUTES};
use crate::db::{Database, FrameRecord};
use crate::error::{EngineError, EngineResult};
use crate::session::state::{
    FrameEntry, Session, SessionState, SessionStatistics, SessionStatusView, SessionSummary,
};
use crate::smoothing::SmoothedResult;
use crate::stress::{map_stress, stress_level};

/// Response to a successful `start`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub expected_end: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// Per-frame result: the raw classification, its smoothed counterpart, and
/// the stress reading derived from the raw result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub raw: Classification,
    pub smoothed: SmoothedResult,
    pub stress_score: u8,
    pub stress_level: String,
    pub entry_count: usize,
}

pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    classifier: Arc<dyn Classifier>,
    db: Database,
    config: EngineConfig,
}

impl SessionManager {
    pub fn new(classifier: Arc<dyn Classifier>, db: Database, config: EngineConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            classifier,
            db,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a new session. Expired sessions are swept first, so an
    /// abandoned session never blocks a user indefinitely.
    pub async fn start(
        &self,
        user_id: &str,
        duration_minutes: u32,
        metadata: HashMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> EngineResult<StartedSession> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "user_id must not be empty".into(),
            ));
        }
        if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&duration_minutes) {
            return Err(EngineError::InvalidArgument(format!(
                "duration must be between {MIN_SESSION_MINUTES} and {MAX_SESSION_MINUTES} minutes"
            )));
        }

        self.sweep_expired(now).await;

        let id = Uuid::new_v4().to_string();
        let session = Session::new(
            id.clone(),
            user_id.to_string(),
            duration_minutes,
            metadata,
            &self.config,
            now,
        );
        let started = StartedSession {
            session_id: id.clone(),
            user_id: user_id.to_string(),
            started_at: session.created_at,
            expected_end: session.expected_end,
            duration_minutes,
        };

        self.sessions
            .lock()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        info!("Session {id} started for user {user_id} ({duration_minutes} min)");

        Ok(started)
    }

    /// Classify one frame against an active session.
    ///
    /// Classification happens outside both locks; if the session was paused
    /// or completed in the meantime the result is discarded.
    pub async fn process_frame(
        &self,
        session_id: &str,
        user_id: &str,
        payload: &FramePayload,
        now: DateTime<Utc>,
    ) -> EngineResult<FrameAnalysis> {
        let session = self.get_owned(session_id, user_id).await?;

        {
            let guard = session.lock().await;
            if guard.state != SessionState::Active {
                return Err(EngineError::InvalidState(
                    "session is paused; resume it before sending frames".into(),
                ));
            }
        }

        let prepared = payload.prepare()?;
        let raw = self.classifier.classify(&prepared)?;
        let stress_score = map_stress(&raw.label, raw.confidence);

        let mut guard = session.lock().await;
        match guard.state {
            SessionState::Active => {}
            SessionState::Paused => {
                return Err(EngineError::InvalidState(
                    "session was paused while the frame was being classified".into(),
                ))
            }
            SessionState::Completed => {
                return Err(EngineError::NotFound(format!(
                    "session '{session_id}' was completed while the frame was being classified"
                )))
            }
        }

        let entry = FrameEntry {
            timestamp: now,
            label: raw.label.clone(),
            confidence: raw.confidence,
            scores: raw.scores.clone(),
            stress_score,
        };
        guard.record(entry);
        let smoothed = guard.smoother.observe(&raw);
        let entry_count = guard.entry_count();

        let record = FrameRecord {
            id: Uuid::new_v4().to_string(),
            session_id: guard.id.clone(),
            user_id: guard.user_id.clone(),
            timestamp: now,
            label: raw.label.clone(),
            confidence: raw.confidence,
            scores: raw.scores.clone(),
            stress_score,
        };
        drop(guard);

        // Persistence is off the frame path; a failed write loses one
        // record, never the frame response.
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(err) = db.insert_frame_record(&record).await {
                error!("Failed to persist frame record: {err:#}");
            }
        });

        Ok(FrameAnalysis {
            session_id: session_id.to_string(),
            timestamp: now,
            raw,
            smoothed,
            stress_score,
            stress_level: stress_level(stress_score).to_string(),
            entry_count,
        })
    }

    pub async fn pause(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionStatusView> {
        let session = self.get_owned(session_id, user_id).await?;
        let mut guard = session.lock().await;
        match guard.state {
            SessionState::Active => {}
            SessionState::Paused => {
                return Err(EngineError::InvalidState("session is already paused".into()))
            }
            SessionState::Completed => {
                return Err(EngineError::NotFound(format!(
                    "session '{session_id}' does not exist"
                )))
            }
        }
        guard.pause(now);
        info!("Session {session_id} paused");
        Ok(guard.status(now))
    }

    pub async fn resume(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionStatusView> {
        let session = self.get_owned(session_id, user_id).await?;
        let mut guard = session.lock().await;
        match guard.state {
            SessionState::Paused => {}
            SessionState::Active => {
                return Err(EngineError::InvalidState("session is not paused".into()))
            }
            SessionState::Completed => {
                return Err(EngineError::NotFound(format!(
                    "session '{session_id}' does not exist"
                )))
            }
        }
        guard.resume(now);
        info!("Session {session_id} resumed");
        Ok(guard.status(now))
    }

    pub async fn get_status(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionStatusView> {
        let session = self.get_owned(session_id, user_id).await?;
        let guard = session.lock().await;
        Ok(guard.status(now))
    }

    pub async fn get_statistics(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> EngineResult<SessionStatistics> {
        let session = self.get_owned(session_id, user_id).await?;
        let guard = session.lock().await;
        Ok(guard.statistics())
    }

    /// Complete a session: remove it from the registry, build the summary
    /// and persist it. A second completion of the same id is `NotFound`.
    pub async fn complete(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SessionSummary> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            let entry = sessions.get(session_id).ok_or_else(|| {
                EngineError::NotFound(format!("session '{session_id}' does not exist"))
            })?;
            // Ownership is checked before removal so a wrong-user request
            // leaves the session in place.
            {
                let guard = entry.lock().await;
                if guard.user_id != user_id {
                    return Err(EngineError::Forbidden(
                        "session belongs to another user".into(),
                    ));
                }
            }
            sessions.remove(session_id).ok_or_else(|| {
                EngineError::NotFound(format!("session '{session_id}' does not exist"))
            })?
        };

        let mut guard = session.lock().await;
        // Terminal marker: a frame classified concurrently still holds a
        // handle to this session and must not be recorded into it.
        guard.state = SessionState::Completed;
        let summary = guard.summarize(now, &self.config);
        drop(guard);

        if let Err(err) = self.db.insert_session_summary(&summary).await {
            warn!("Failed to persist summary for session {session_id}: {err:#}");
        }
        info!(
            "Session {session_id} completed ({} entries, avg stress {:.2})",
            summary.entry_count, summary.average_stress
        );

        Ok(summary)
    }

    /// Drop every session older than the configured timeout. Returns the
    /// number removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        let mut expired = Vec::new();
        for (id, session) in sessions.iter() {
            let guard = session.lock().await;
            if guard.is_expired(now, self.config.session_timeout) {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            sessions.remove(id);
            info!("Session {id} expired and was removed");
        }
        expired.len()
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn get_owned(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> EngineResult<Arc<Mutex<Session>>> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::NotFound(format!("session '{session_id}' does not exist"))
            })?;
        drop(sessions);

        let guard = session.lock().await;
        if guard.user_id != user_id {
            return Err(EngineError::Forbidden(
                "session belongs to another user".into(),
            ));
        }
        if guard.state == SessionState::Completed {
            return Err(EngineError::NotFound(format!(
                "session '{session_id}' does not exist"
            )));
        }
        drop(guard);

        Ok(session)
    }
}
