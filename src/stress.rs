//! Deterministic emotion-to-stress mapping and stress level classification.

/// Emotions that indicate stress; only these get confidence-adjusted.
pub const STRESS_EMOTIONS: [&str; 4] = ["Sad", "Fear", "Disgust", "Angry"];

/// Map an emotion label and classifier confidence to a stress score in
/// [0, 10].
///
/// Negative labels are adjusted by `(confidence - 0.5) * 2` so a
/// low-confidence negative detection is discounted toward the base score
/// and a high-confidence one amplified. Rounding happens before clamping
/// to avoid truncation bias.
pub fn map_stress(label: &str, confidence: f64) -> u8 {
    let base: f64 = match label {
        "Happy" => 1.0,
        "Surprise" => 3.0,
        "Neutral" => 4.0,
        "Sad" => 6.0,
        "Fear" => 7.0,
        "Disgust" => 8.0,
        "Angry" => 8.0,
        _ => 5.0,
    };

    let adjusted = if STRESS_EMOTIONS.contains(&label) {
        base + (confidence - 0.5) * 2.0
    } else {
        base
    };

    adjusted.round().clamp(0.0, 10.0) as u8
}

/// Human-readable stress level for a score.
pub fn stress_level(score: u8) -> &'static str {
    match score {
        0..=2 => "Low",
        3..=5 => "Moderate",
        6..=7 => "High",
        _ => "Very High",
    }
}

/// Average stress expressed on the same level scale; used for session
/// summaries where the mean is fractional.
pub fn stress_level_for_average(average: f64) -> &'static str {
    stress_level(average.round().clamp(0.0, 10.0) as u8)
}

/// Stress-management recommendations for a score/emotion pair, most urgent
/// first.
pub fn recommendations_for(score: u8, dominant_emotion: &str) -> Vec<String> {
    let mut recommendations: Vec<String> = if score >= 8 {
        vec![
            "URGENT: Take an immediate break from current tasks".into(),
            "Practice the 4-7-8 breathing technique for 5 minutes".into(),
            "Speak with your manager or HR".into(),
            "Consider professional counseling support".into(),
        ]
    } else if score >= 6 {
        vec![
            "Take a 10-15 minute break".into(),
            "Go for a short walk outside if possible".into(),
            "Practice mindfulness meditation".into(),
            "Write down your concerns to clear your mind".into(),
        ]
    } else if score >= 4 {
        vec![
            "Take regular short breaks".into(),
            "Listen to calming music".into(),
            "Limit screen time during breaks".into(),
            "Do light stretching exercises".into(),
        ]
    } else {
        vec![
            "Maintain current stress management practices".into(),
            "Continue with positive habits".into(),
            "Keep tracking your wellness".into(),
        ]
    };

    match dominant_emotion {
        "Angry" | "Disgust" => {
            recommendations.push("Channel energy into physical activity".into())
        }
        "Fear" => recommendations.push("Talk to a trusted colleague or friend".into()),
        "Sad" => recommendations.push("Get some sunlight and fresh air".into()),
        _ => {}
    }

    recommendations
}
