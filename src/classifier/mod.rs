pub mod frame;
pub mod mock;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

pub use frame::{FramePayload, PreparedFrame};
pub use mock::MockClassifier;

/// The fixed emotion vocabulary, in the order the underlying model emits
/// its probability vector.
pub const EMOTION_LABELS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Happy", "Sad", "Surprise", "Neutral",
];

/// One classification result for a single preprocessed frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
    /// Full per-label probability distribution.
    pub scores: HashMap<String, f64>,
}

/// Opaque face/emotion classifier. The engine treats failures as
/// `UpstreamUnavailable` and never retries; the caller may submit another
/// frame against the still-active session.
pub trait Classifier: Send + Sync {
    fn classify(&self, frame: &PreparedFrame) -> EngineResult<Classification>;
}
