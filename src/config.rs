use std::time::Duration;

/// Engine configuration with tunable thresholds.
///
/// Defaults mirror the deployed constants; the calibration temperature and
/// the stress thresholds are knobs rather than load-bearing requirements.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock age after which an abandoned session is swept (lazy,
    /// checked on `start`, not via a background timer).
    pub session_timeout: Duration,

    /// Capacity of the per-session frame ring buffer.
    pub buffer_capacity: usize,

    /// Sliding-window length for the temporal smoother.
    pub smoothing_window: usize,

    /// Frames per minute assumed when deriving `expected_entries` for the
    /// completion quality score.
    pub expected_frames_per_minute: u32,

    /// Stress score at or above which a session is considered moderately
    /// stressed.
    pub moderate_stress_threshold: u8,

    /// Stress score at or above which a high-stress alert is considered.
    pub high_stress_threshold: u8,

    /// Stress score at or above which severity escalates to `high`.
    pub critical_stress_threshold: u8,

    /// Minimum gap between two alerts of the same (user, type).
    pub alert_cooldown_minutes: i64,

    /// Maximum accepted alerts per user per UTC day, across all types.
    pub max_daily_alerts: i64,

    /// Temperature applied to classifier confidences before smoothing.
    /// 1.0 leaves confidences untouched.
    pub calibration_temperature: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(1800),
            buffer_capacity: 100,
            smoothing_window: 5,
            expected_frames_per_minute: 3,
            moderate_stress_threshold: 3,
            high_stress_threshold: 7,
            critical_stress_threshold: 8,
            alert_cooldown_minutes: 15,
            max_daily_alerts: 5,
            calibration_temperature: 1.0,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_env::<u64>("EMOSENSE_SESSION_TIMEOUT_SECS") {
            config.session_timeout = Duration::from_secs(secs);
        }
        if let Some(capacity) = read_env::<usize>("EMOSENSE_BUFFER_CAPACITY") {
            config.buffer_capacity = capacity;
        }
        if let Some(window) = read_env::<usize>("EMOSENSE_SMOOTHING_WINDOW") {
            config.smoothing_window = window;
        }
        if let Some(rate) = read_env::<u32>("EMOSENSE_EXPECTED_FRAMES_PER_MINUTE") {
            config.expected_frames_per_minute = rate;
        }
        if let Some(threshold) = read_env::<u8>("EMOSENSE_MODERATE_STRESS_THRESHOLD") {
            config.moderate_stress_threshold = threshold;
        }
        if let Some(threshold) = read_env::<u8>("EMOSENSE_HIGH_STRESS_THRESHOLD") {
            config.high_stress_threshold = threshold;
        }
        if let Some(threshold) = read_env::<u8>("EMOSENSE_CRITICAL_STRESS_THRESHOLD") {
            config.critical_stress_threshold = threshold;
        }
        if let Some(minutes) = read_env::<i64>("EMOSENSE_ALERT_COOLDOWN_MINUTES") {
            config.alert_cooldown_minutes = minutes;
        }
        if let Some(limit) = read_env::<i64>("EMOSENSE_MAX_DAILY_ALERTS") {
            config.max_daily_alerts = limit;
        }
        if let Some(temperature) = read_env::<f64>("EMOSENSE_CALIBRATION_TEMPERATURE") {
            config.calibration_temperature = temperature;
        }

        config
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Bounds on the caller-supplied session duration, in minutes.
pub const MIN_SESSION_MINUTES: u32 = 1;
pub const MAX_SESSION_MINUTES: u32 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_cover_every_knob() {
        std::env::set_var("EMOSENSE_BUFFER_CAPACITY", "50");
        std::env::set_var("EMOSENSE_SMOOTHING_WINDOW", "7");
        std::env::set_var("EMOSENSE_EXPECTED_FRAMES_PER_MINUTE", "6");
        std::env::set_var("EMOSENSE_CALIBRATION_TEMPERATURE", "1.5");
        std::env::set_var("EMOSENSE_MODERATE_STRESS_THRESHOLD", "2");
        std::env::set_var("EMOSENSE_CRITICAL_STRESS_THRESHOLD", "9");
        // Unparseable values fall back to the default.
        std::env::set_var("EMOSENSE_MAX_DAILY_ALERTS", "many");

        let config = EngineConfig::from_env();
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.smoothing_window, 7);
        assert_eq!(config.expected_frames_per_minute, 6);
        assert!((config.calibration_temperature - 1.5).abs() < 1e-9);
        assert_eq!(config.moderate_stress_threshold, 2);
        assert_eq!(config.critical_stress_threshold, 9);
        assert_eq!(config.max_daily_alerts, 5);

        for key in [
            "EMOSENSE_BUFFER_CAPACITY",
            "EMOSENSE_SMOOTHING_WINDOW",
            "EMOSENSE_EXPECTED_FRAMES_PER_MINUTE",
            "EMOSENSE_CALIBRATION_TEMPERATURE",
            "EMOSENSE_MODERATE_STRESS_THRESHOLD",
            "EMOSENSE_CRITICAL_STRESS_THRESHOLD",
            "EMOSENSE_MAX_DAILY_ALERTS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_deployed_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.session_timeout.as_secs(), 1800);
        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.smoothing_window, 5);
        assert_eq!(config.alert_cooldown_minutes, 15);
        assert_eq!(config.max_daily_alerts, 5);
    }
}
