//! Real-time emotion session engine.
//!
//! Ingests per-frame emotion classifications during bounded monitoring
//! sessions, smooths them over a sliding window, maps emotions to stress
//! scores, and raises throttled alerts when stress crosses the configured
//! thresholds. Per-frame records and completion summaries are persisted to
//! SQLite behind a dedicated worker thread.

pub mod aggregation;
pub mod alerts;
pub mod classifier;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod session;
pub mod smoothing;
pub mod stress;

pub use aggregation::{AggregationResult, AggregationStrategy, FrameObservation};
pub use alerts::{Alert, AlertDecision, AlertThrottler, Severity, ThrottleReason};
pub use classifier::{Classification, Classifier, FramePayload, MockClassifier, PreparedFrame};
pub use config::EngineConfig;
pub use db::Database;
pub use engine::{EmotionEngine, ProcessedFrame};
pub use error::{ApiResponse, EngineError, EngineResult};
pub use session::{SessionManager, SessionStatistics, SessionStatusView, SessionSummary};
pub use smoothing::{SmoothedResult, TemporalSmoother};

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
