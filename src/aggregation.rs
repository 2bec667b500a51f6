//! Aggregation of finite batches of per-frame results into one consensus
//! result. Used for session summaries and offline multi-frame analysis;
//! the live ring buffer is smoothed separately.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, FramePayload};
use crate::error::{EngineError, EngineResult};
use crate::stress::map_stress;

/// Strategy for combining a batch of frames, selected explicitly by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationStrategy {
    /// Per-label sum of confidences; dominant = arg-max.
    ConfidenceWeighted,
    /// Most frequent label; confidence averaged over matching frames only.
    MajorityVote,
    /// Confidence-weighted with each frame additionally scaled by
    /// `(index + 1) / batch_size` so later frames matter more.
    TemporalDecay,
}

/// One successfully classified frame in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameObservation {
    pub label: String,
    pub confidence: f64,
    pub stress_score: u8,
}

/// Consensus over a batch of frames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub dominant_label: String,
    pub confidence: f64,
    /// Unweighted arithmetic mean of per-frame stress scores, regardless of
    /// the strategy's weighting.
    pub average_stress: f64,
    pub weights: HashMap<String, f64>,
    pub counts: HashMap<String, usize>,
    pub frames_total: usize,
    pub frames_successful: usize,
    pub frames_failed: usize,
}

/// Aggregate already-classified observations with the given strategy.
pub fn aggregate_observations(
    observations: &[FrameObservation],
    strategy: AggregationStrategy,
) -> EngineResult<AggregationResult> {
    aggregate_with_failures(observations, strategy, 0)
}

fn aggregate_with_failures(
    observations: &[FrameObservation],
    strategy: AggregationStrategy,
    failed: usize,
) -> EngineResult<AggregationResult> {
    if observations.is_empty() {
        return Err(EngineError::NoData(
            "no successfully classified frames in batch".into(),
        ));
    }

    let batch_size = observations.len() as f64;
    let mut weights: HashMap<String, f64> = HashMap::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    // First-seen order makes arg-max ties deterministic.
    let mut order: Vec<String> = Vec::new();

    for (index, obs) in observations.iter().enumerate() {
        let weight = match strategy {
            AggregationStrategy::ConfidenceWeighted | AggregationStrategy::MajorityVote => {
                obs.confidence
            }
            AggregationStrategy::TemporalDecay => {
                obs.confidence * ((index + 1) as f64 / batch_size)
            }
        };
        if !weights.contains_key(&obs.label) {
            order.push(obs.label.clone());
        }
        *weights.entry(obs.label.clone()).or_insert(0.0) += weight;
        *counts.entry(obs.label.clone()).or_insert(0) += 1;
    }

    let dominant_label = match strategy {
        AggregationStrategy::MajorityVote => {
            let mut best = order[0].clone();
            let mut best_count = 0usize;
            for label in &order {
                if counts[label.as_str()] > best_count {
                    best_count = counts[label.as_str()];
                    best = label.clone();
                }
            }
            best
        }
        _ => {
            let mut best = order[0].clone();
            let mut best_weight = f64::MIN;
            for label in &order {
                if weights[label] > best_weight {
                    best_weight = weights[label];
                    best = label.clone();
                }
            }
            best
        }
    };

    let confidence = match strategy {
        AggregationStrategy::MajorityVote => {
            let matching: Vec<f64> = observations
                .iter()
                .filter(|obs| obs.label == dominant_label)
                .map(|obs| obs.confidence)
                .collect();
            matching.iter().sum::<f64>() / matching.len() as f64
        }
        _ => {
            let total: f64 = weights.values().sum();
            if total > 0.0 {
                (weights[&dominant_label] / total).min(1.0)
            } else {
                0.0
            }
        }
    };

    let average_stress = observations
        .iter()
        .map(|obs| f64::from(obs.stress_score))
        .sum::<f64>()
        / batch_size;

    Ok(AggregationResult {
        dominant_label,
        confidence,
        average_stress,
        weights,
        counts,
        frames_total: observations.len() + failed,
        frames_successful: observations.len(),
        frames_failed: failed,
    })
}

/// Classify a batch of raw payloads and aggregate the successes. Individual
/// classification failures are counted, not propagated; a batch where every
/// frame fails yields `NoData`.
pub fn analyze_batch(
    classifier: &dyn Classifier,
    frames: &[FramePayload],
    strategy: AggregationStrategy,
) -> EngineResult<AggregationResult> {
    if frames.is_empty() {
        return Err(EngineError::NoData("empty frame batch".into()));
    }

    let mut observations = Vec::with_capacity(frames.len());
    let mut failed = 0usize;

    for payload in frames {
        let outcome = payload
            .prepare()
            .and_then(|prepared| classifier.classify(&prepared));
        match outcome {
            Ok(classification) => observations.push(FrameObservation {
                stress_score: map_stress(&classification.label, classification.confidence),
                label: classification.label,
                confidence: classification.confidence,
            }),
            Err(err) => {
                log::warn!("Frame in batch failed to classify: {err}");
                failed += 1;
            }
        }
    }

    aggregate_with_failures(&observations, strategy, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(label: &str, confidence: f64) -> FrameObservation {
        FrameObservation {
            label: label.to_string(),
            confidence,
            stress_score: map_stress(label, confidence),
        }
    }

    #[test]
    fn confidence_weighted_reference_scenario() {
        let batch = [obs("Happy", 0.9), obs("Happy", 0.8), obs("Sad", 0.6)];
        let result =
            aggregate_observations(&batch, AggregationStrategy::ConfidenceWeighted).unwrap();

        assert_eq!(result.dominant_label, "Happy");
        assert!((result.confidence - 1.7 / 2.3).abs() < 1e-9);
        assert_eq!(result.counts["Happy"], 2);
        assert_eq!(result.counts["Sad"], 1);
    }

    #[test]
    fn majority_vote_averages_only_matching_frames() {
        let batch = [obs("Happy", 0.9), obs("Happy", 0.7), obs("Sad", 0.99)];
        let result = aggregate_observations(&batch, AggregationStrategy::MajorityVote).unwrap();

        assert_eq!(result.dominant_label, "Happy");
        assert!((result.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn temporal_decay_lets_later_frames_win() {
        // Equal confidences: two early Sad frames vs two late Happy frames.
        let batch = [
            obs("Sad", 0.8),
            obs("Sad", 0.8),
            obs("Happy", 0.8),
            obs("Happy", 0.8),
        ];
        let result = aggregate_observations(&batch, AggregationStrategy::TemporalDecay).unwrap();
        assert_eq!(result.dominant_label, "Happy");

        // Under plain confidence weighting the tie resolves to first-seen.
        let tied =
            aggregate_observations(&batch, AggregationStrategy::ConfidenceWeighted).unwrap();
        assert_eq!(tied.dominant_label, "Sad");
    }

    #[test]
    fn average_stress_is_unweighted() {
        let batch = [obs("Happy", 0.9), obs("Angry", 0.9)];
        let result =
            aggregate_observations(&batch, AggregationStrategy::ConfidenceWeighted).unwrap();

        let expected = (f64::from(map_stress("Happy", 0.9)) + f64::from(map_stress("Angry", 0.9)))
            / 2.0;
        assert!((result.average_stress - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_is_no_data() {
        let err =
            aggregate_observations(&[], AggregationStrategy::ConfidenceWeighted).unwrap_err();
        assert_eq!(err.kind(), "no_data");
    }
}
