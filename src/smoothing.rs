//! Temporal smoothing of per-frame classifications.
//!
//! A fixed-size sliding window of recent raw results is re-tallied on every
//! frame with weights that favor both recency and classifier confidence,
//! which suppresses frame-to-frame label flicker without a full
//! probabilistic filter.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::classifier::Classification;

#[derive(Debug, Clone)]
struct WindowSample {
    label: String,
    confidence: f64,
}

/// Smoothed (label, confidence) pair plus the per-label weight tally it was
/// derived from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmoothedResult {
    pub label: String,
    pub confidence: f64,
    pub weights: HashMap<String, f64>,
}

/// Per-session sliding window over raw classifications.
pub struct TemporalSmoother {
    window: VecDeque<WindowSample>,
    capacity: usize,
    temperature: f64,
}

impl TemporalSmoother {
    pub fn new(capacity: usize, temperature: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            temperature,
        }
    }

    /// Append a raw result and return the smoothed view of the window.
    ///
    /// With fewer than 2 samples smoothing is a no-op and the raw result is
    /// returned unchanged.
    pub fn observe(&mut self, raw: &Classification) -> SmoothedResult {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(WindowSample {
            label: raw.label.clone(),
            confidence: self.calibrate(raw.confidence),
        });

        if self.window.len() < 2 {
            return SmoothedResult {
                label: raw.label.clone(),
                confidence: raw.confidence,
                weights: HashMap::from([(raw.label.clone(), raw.confidence)]),
            };
        }

        let window_len = self.window.len() as f64;
        let mut weights: HashMap<String, f64> = HashMap::new();
        // Tracks first-seen order so arg-max ties resolve deterministically.
        let mut order: Vec<String> = Vec::new();

        for (index, sample) in self.window.iter().enumerate() {
            let recency = (index + 1) as f64 / window_len;
            let weight = recency * sample.confidence;
            if !weights.contains_key(&sample.label) {
                order.push(sample.label.clone());
            }
            *weights.entry(sample.label.clone()).or_insert(0.0) += weight;
        }

        let total: f64 = weights.values().sum();
        let mut best_label = raw.label.clone();
        let mut best_weight = f64::MIN;
        for label in &order {
            let weight = weights[label];
            if weight > best_weight {
                best_weight = weight;
                best_label = label.clone();
            }
        }

        let confidence = if total > 0.0 {
            (best_weight / total).min(1.0)
        } else {
            0.0
        };

        SmoothedResult {
            label: best_label,
            confidence,
            weights,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    fn calibrate(&self, confidence: f64) -> f64 {
        if (self.temperature - 1.0).abs() < f64::EPSILON || self.temperature <= 0.0 {
            confidence
        } else {
            confidence.clamp(0.0, 1.0).powf(1.0 / self.temperature)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(label: &str, confidence: f64) -> Classification {
        Classification {
            label: label.to_string(),
            confidence,
            scores: HashMap::new(),
        }
    }

    #[test]
    fn first_sample_passes_through_unchanged() {
        let mut smoother = TemporalSmoother::new(5, 1.0);
        let result = smoother.observe(&raw("Happy", 0.92));
        assert_eq!(result.label, "Happy");
        assert!((result.confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn recency_weighting_favors_recent_frames() {
        let mut smoother = TemporalSmoother::new(5, 1.0);
        smoother.observe(&raw("Sad", 0.9));
        smoother.observe(&raw("Sad", 0.9));
        smoother.observe(&raw("Happy", 0.9));
        smoother.observe(&raw("Happy", 0.9));
        let result = smoother.observe(&raw("Happy", 0.9));

        // Three recent Happy frames outweigh two older Sad frames.
        assert_eq!(result.label, "Happy");
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn single_flicker_does_not_flip_the_label() {
        let mut smoother = TemporalSmoother::new(5, 1.0);
        for _ in 0..4 {
            smoother.observe(&raw("Neutral", 0.8));
        }
        let result = smoother.observe(&raw("Angry", 0.6));
        assert_eq!(result.label, "Neutral");
    }

    #[test]
    fn window_is_bounded() {
        let mut smoother = TemporalSmoother::new(3, 1.0);
        for _ in 0..10 {
            smoother.observe(&raw("Happy", 0.9));
        }
        assert_eq!(smoother.len(), 3);
    }

    #[test]
    fn confidence_is_capped_at_one() {
        let mut smoother = TemporalSmoother::new(5, 1.0);
        smoother.observe(&raw("Happy", 1.0));
        let result = smoother.observe(&raw("Happy", 1.0));
        assert!(result.confidence <= 1.0);
    }

    #[test]
    fn weighted_tally_matches_hand_computation() {
        let mut smoother = TemporalSmoother::new(5, 1.0);
        smoother.observe(&raw("Sad", 0.6));
        let result = smoother.observe(&raw("Happy", 0.9));

        // Weights: Sad = (1/2) * 0.6 = 0.3, Happy = (2/2) * 0.9 = 0.9.
        assert_eq!(result.label, "Happy");
        let expected = 0.9 / (0.9 + 0.3);
        assert!((result.confidence - expected).abs() < 1e-9);
    }
}
