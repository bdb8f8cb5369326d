#![forbid(unsafe_code)]

//! Tunables shared by every model of a class.
//!
//! `ModelClass::builder` starts from [`ModelConfig::from_env`], so
//! `LIVESTATE_MAX_DRAIN_ROUNDS` applies to every class that does not pass
//! its own configuration.

/// Environment variable read by [`ModelConfig::from_env`].
pub const MAX_DRAIN_ROUNDS_ENV: &str = "LIVESTATE_MAX_DRAIN_ROUNDS";

/// Per-class model configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Upper bound on drain rounds in one transaction. A round runs every
    /// trigger queued so far; handlers that keep re-queueing each other would
    /// otherwise never reach a fixed point. When exceeded, the remaining
    /// queue is dropped with a warning. Default: 10 000.
    pub max_drain_rounds: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_drain_rounds: 10_000,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain round limit (at least 1).
    #[must_use]
    pub fn with_max_drain_rounds(mut self, rounds: usize) -> Self {
        self.max_drain_rounds = rounds.max(1);
        self
    }

    /// Defaults, overridden by `LIVESTATE_MAX_DRAIN_ROUNDS` when it parses.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get_env: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::default();
        match get_env(MAX_DRAIN_ROUNDS_ENV).and_then(|v| v.trim().parse::<usize>().ok()) {
            Some(rounds) => config.with_max_drain_rounds(rounds),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(ModelConfig::default().max_drain_rounds, 10_000);
    }

    #[test]
    fn zero_rounds_clamps_to_one() {
        assert_eq!(ModelConfig::new().with_max_drain_rounds(0).max_drain_rounds, 1);
    }

    #[test]
    fn env_override_parses() {
        let config = ModelConfig::from_lookup(|key| {
            (key == MAX_DRAIN_ROUNDS_ENV).then(|| " 25 ".to_string())
        });
        assert_eq!(config.max_drain_rounds, 25);
    }

    #[test]
    fn env_garbage_falls_back() {
        let config = ModelConfig::from_lookup(|_| Some("lots".to_string()));
        assert_eq!(config, ModelConfig::default());
    }
}
