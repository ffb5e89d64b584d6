//! Optional fault injection for exercising the gateway's failure handling.

use std::time::Duration;

use rand::Rng;

/// Probabilities are in `[0, 1]`; zero disables the fault.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaultConfig {
    /// Chance that a request is answered with 503.
    pub failure_rate: f64,
    /// Chance that a response is held back by `delay`.
    pub delay_rate: f64,
    pub delay: Duration,
}

impl FaultConfig {
    /// No faults.
    pub fn none() -> Self {
        Self::default()
    }

    /// Reads `<PREFIX>_FAILURE_RATE`, `<PREFIX>_DELAY_RATE` and `<PREFIX>_DELAY_MS`.
    pub fn from_env(prefix: &str) -> Self {
        let rate = |name: &str| {
            std::env::var(format!("{prefix}_{name}"))
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .map_or(0.0, |v| v.clamp(0.0, 1.0))
        };
        let delay_ms = std::env::var(format!("{prefix}_DELAY_MS"))
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Self {
            failure_rate: rate("FAILURE_RATE"),
            delay_rate: rate("DELAY_RATE"),
            delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn should_fail(&self) -> bool {
        roll(self.failure_rate)
    }

    /// Sleeps for `delay` with probability `delay_rate`.
    pub async fn maybe_delay(&self) {
        if !self.delay.is_zero() && roll(self.delay_rate) {
            tracing::warn!(delay = ?self.delay, "injected delay");
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn roll(probability: f64) -> bool {
    probability > 0.0 && rand::thread_rng().gen_bool(probability.min(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_faults_never_fire() {
        let faults = FaultConfig::none();
        assert!((0..1000).all(|_| !faults.should_fail()));
    }

    #[test]
    fn test_certain_failure_always_fires() {
        let faults = FaultConfig {
            failure_rate: 1.0,
            ..FaultConfig::none()
        };
        assert!((0..100).all(|_| faults.should_fail()));
    }

    #[test]
    fn test_from_env_defaults_to_off() {
        let faults = FaultConfig::from_env("COLLABORATORS_TEST_UNSET");
        assert_eq!(faults, FaultConfig::none());
    }
}
