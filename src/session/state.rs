use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::smoothing::TemporalSmoother;
use crate::stress::{recommendations_for, stress_level_for_average};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Active,
    Paused,
    /// Terminal. Set during completion so a frame still in flight against
    /// the removed session is rejected instead of recorded.
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
        }
    }
}

/// One accepted detection result. Immutable once created.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEntry {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub confidence: f64,
    pub scores: HashMap<String, f64>,
    pub stress_score: u8,
}

/// Live state for one monitoring interval. The entry buffer holds recent
/// frames for intra-session statistics only; the full per-frame record
/// stream is persisted independently.
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub expected_end: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub state: SessionState,
    pub metadata: HashMap<String, serde_json::Value>,
    pub smoother: TemporalSmoother,
    entries: VecDeque<FrameEntry>,
    capacity: usize,
    emotion_counts: HashMap<String, u64>,
    stress_scores: Vec<u8>,
    last_label: Option<String>,
    last_confidence: f64,
}

impl Session {
    pub fn new(
        id: String,
        user_id: String,
        duration_minutes: u32,
        metadata: HashMap<String, serde_json::Value>,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            created_at: now,
            duration_minutes,
            expected_end: now + Duration::minutes(i64::from(duration_minutes)),
            paused_at: None,
            state: SessionState::Active,
            metadata,
            smoother: TemporalSmoother::new(
                config.smoothing_window,
                config.calibration_temperature,
            ),
            entries: VecDeque::with_capacity(config.buffer_capacity),
            capacity: config.buffer_capacity.max(1),
            emotion_counts: HashMap::new(),
            stress_scores: Vec::new(),
            last_label: None,
            last_confidence: 0.0,
        }
    }

    /// Append an entry, evicting the oldest when the buffer is full, and
    /// fold it into the running aggregates.
    pub fn record(&mut self, entry: FrameEntry) {
        *self
            .emotion_counts
            .entry(entry.label.clone())
            .or_insert(0) += 1;
        self.stress_scores.push(entry.stress_score);
        self.last_label = Some(entry.label.clone());
        self.last_confidence = entry.confidence;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FrameEntry> {
        self.entries.iter()
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::Paused;
        self.paused_at = Some(now);
    }

    /// Resume and shift `expected_end` forward by the measured pause
    /// duration so remaining time is preserved.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.expected_end += now - paused_at;
        }
        self.state = SessionState::Active;
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        (now - self.created_at).num_seconds() >= timeout.as_secs() as i64
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 60_000.0
    }

    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> f64 {
        ((self.expected_end - now).num_milliseconds() as f64 / 60_000.0).max(0.0)
    }

    pub fn progress_percent(&self, now: DateTime<Utc>) -> f64 {
        let progress =
            self.elapsed_minutes(now) / f64::from(self.duration_minutes) * 100.0;
        progress.min(100.0)
    }

    /// Buffer-derived emotion distribution (running counts, so evicted
    /// entries still count).
    pub fn emotion_distribution(&self) -> HashMap<String, u64> {
        self.emotion_counts.clone()
    }

    /// Cumulative average over every recorded stress score.
    pub fn average_stress(&self) -> f64 {
        if self.stress_scores.is_empty() {
            return 0.0;
        }
        self.stress_scores.iter().map(|s| f64::from(*s)).sum::<f64>()
            / self.stress_scores.len() as f64
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatusView {
        SessionStatusView {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            state: self.state,
            started_at: self.created_at,
            elapsed_minutes: self.elapsed_minutes(now),
            remaining_minutes: self.remaining_minutes(now),
            progress_percent: self.progress_percent(now),
            entry_count: self.entries.len(),
            emotion_distribution: self.emotion_distribution(),
            average_stress: self.average_stress(),
        }
    }

    pub fn statistics(&self) -> SessionStatistics {
        let (min_stress, max_stress) = self
            .entries
            .iter()
            .fold((None::<u8>, None::<u8>), |(min, max), entry| {
                (
                    Some(min.map_or(entry.stress_score, |m| m.min(entry.stress_score))),
                    Some(max.map_or(entry.stress_score, |m| m.max(entry.stress_score))),
                )
            });

        let average_confidence = if self.entries.is_empty() {
            0.0
        } else {
            self.entries.iter().map(|e| e.confidence).sum::<f64>() / self.entries.len() as f64
        };

        let average_stress = self.average_stress();

        SessionStatistics {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            entry_count: self.entries.len(),
            emotion_distribution: self.emotion_distribution(),
            average_stress,
            min_stress: min_stress.unwrap_or(0),
            max_stress: max_stress.unwrap_or(0),
            stress_level: stress_level_for_average(average_stress).to_string(),
            average_confidence,
        }
    }

    /// Most frequent label among buffered entries. Ties resolve to the
    /// label that appears first in buffer order.
    pub fn dominant_emotion(&self) -> Option<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();

        for entry in &self.entries {
            if !counts.contains_key(entry.label.as_str()) {
                order.push(entry.label.as_str());
            }
            *counts.entry(entry.label.as_str()).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for label in order {
            let count = counts[label];
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }

        best.map(|(label, _)| label.to_string())
    }

    /// Build the completion summary. An empty buffer is not an error; the
    /// summary is flagged with a `no_entries` warning instead.
    pub fn summarize(&self, now: DateTime<Utc>, config: &EngineConfig) -> SessionSummary {
        if self.entries.is_empty() {
            return SessionSummary {
                session_id: self.id.clone(),
                user_id: self.user_id.clone(),
                started_at: self.created_at,
                ended_at: now,
                duration_minutes: self.elapsed_minutes(now),
                entry_count: 0,
                emotion_distribution: HashMap::new(),
                dominant_emotion: None,
                average_stress: 0.0,
                min_stress: 0,
                max_stress: 0,
                stress_level: stress_level_for_average(0.0).to_string(),
                average_confidence: 0.0,
                quality_score: 0.0,
                recommendations: Vec::new(),
                warning: Some("no_entries".to_string()),
            };
        }

        let stats = self.statistics();
        let dominant = self.dominant_emotion();

        let expected_entries =
            f64::from(self.duration_minutes * config.expected_frames_per_minute);
        let entry_count = self.entries.len() as f64;

        let volume_score = (entry_count / expected_entries * 40.0).min(40.0);
        let confidence_score = stats.average_confidence * 40.0;
        let coverage_bonus = if entry_count >= 0.8 * expected_entries {
            20.0
        } else if entry_count >= 0.5 * expected_entries {
            10.0
        } else {
            0.0
        };
        let quality_score = volume_score + confidence_score + coverage_bonus;

        let rounded_stress = stats.average_stress.round().clamp(0.0, 10.0) as u8;
        let recommendations = recommendations_for(
            rounded_stress,
            dominant.as_deref().unwrap_or("Neutral"),
        );

        SessionSummary {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            started_at: self.created_at,
            ended_at: now,
            duration_minutes: self.elapsed_minutes(now),
            entry_count: self.entries.len(),
            emotion_distribution: stats.emotion_distribution,
            dominant_emotion: dominant,
            average_stress: stats.average_stress,
            min_stress: stats.min_stress,
            max_stress: stats.max_stress,
            stress_level: stats.stress_level,
            average_confidence: stats.average_confidence,
            quality_score,
            recommendations,
            warning: None,
        }
    }
}

/// Point-in-time view of a live session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusView {
    pub session_id: String,
    pub user_id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub elapsed_minutes: f64,
    pub remaining_minutes: f64,
    pub progress_percent: f64,
    pub entry_count: usize,
    pub emotion_distribution: HashMap<String, u64>,
    pub average_stress: f64,
}

/// Live-buffer statistics for an in-flight session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    pub session_id: String,
    pub user_id: String,
    pub entry_count: usize,
    pub emotion_distribution: HashMap<String, u64>,
    pub average_stress: f64,
    pub min_stress: u8,
    pub max_stress: u8,
    pub stress_level: String,
    pub average_confidence: f64,
}

/// Result of completing a session; this is what gets persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub entry_count: usize,
    pub emotion_distribution: HashMap<String, u64>,
    pub dominant_emotion: Option<String>,
    pub average_stress: f64,
    pub min_stress: u8,
    pub max_stress: u8,
    pub stress_level: String,
    pub average_confidence: f64,
    pub quality_score: f64,
    pub recommendations: Vec<String>,
    pub warning: Option<String>,
}
