use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::classifier::{Classification, Classifier, PreparedFrame, EMOTION_LABELS};
use crate::error::EngineResult;

/// Stand-in classifier for environments without the real model: picks a
/// random dominant label with confidence in [0.7, 1.0] and low scores for
/// the rest. Useful for demos and wiring tests.
pub struct MockClassifier;

impl Classifier for MockClassifier {
    fn classify(&self, _frame: &PreparedFrame) -> EngineResult<Classification> {
        let mut rng = rand::thread_rng();

        let mut scores: HashMap<String, f64> = EMOTION_LABELS
            .iter()
            .map(|label| (label.to_string(), rng.gen::<f64>() * 0.3))
            .collect();

        let dominant = *EMOTION_LABELS.choose(&mut rng).unwrap_or(&"Neutral");
        let confidence = 0.7 + rng.gen::<f64>() * 0.3;
        scores.insert(dominant.to_string(), confidence);

        Ok(Classification {
            label: dominant.to_string(),
            confidence,
            scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_emits_known_label_with_dominant_confidence() {
        let frame = PreparedFrame {
            pixels: vec![0.0; 64 * 64],
            width: 64,
            height: 64,
        };

        for _ in 0..20 {
            let result = MockClassifier.classify(&frame).unwrap();
            assert!(EMOTION_LABELS.contains(&result.label.as_str()));
            assert!(result.confidence >= 0.7);
            assert_eq!(result.scores.len(), EMOTION_LABELS.len());
        }
    }
}
