//! Configuration for the claim form.
//!
//! Loads configuration from `CLAIM_*` environment variables with defaults
//! matching the demo: one second of latency and a 30% failure rate.

use crate::types::SubmissionMode;
use composable_forms_core::mutation::OverlapPolicy;
use composable_forms_core::request::MIN_IDENTIFIER_LEN;
use composable_forms_core::submission::{AlwaysFail, FaultInjector, NoFaults, RandomFaults};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Simulated email latency (`CLAIM_LATENCY_MS`)
pub const DEFAULT_LATENCY_MS: u64 = 1000;

/// Probability that a send fails (`CLAIM_FAILURE_RATE`)
pub const DEFAULT_FAILURE_RATE: f64 = 0.3;

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Failure rate outside `[0, 1]`
    #[error("failure rate must be between 0 and 1, got {0}")]
    FailureRateOutOfRange(f64),

    /// Minimum identifier length of zero
    #[error("minimum identifier length must be at least 1")]
    EmptyIdentifierAllowed,

    /// An env file could not be read or parsed
    #[error("cannot load {path}: {reason}")]
    EnvFile {
        /// File that was requested
        path: String,
        /// Underlying error
        reason: String,
    },
}

/// Claim form configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Simulated email latency in milliseconds
    pub latency_ms: u64,
    /// Probability in `[0, 1]` that a send fails
    pub failure_rate: f64,
    /// Seed for reproducible failures (`CLAIM_SEED`)
    pub seed: Option<u64>,
    /// Where pending entries are shown (`CLAIM_MODE`)
    pub mode: SubmissionMode,
    /// How overlapping submissions share the mutation flags (`CLAIM_OVERLAP`)
    pub overlap: OverlapPolicy,
    /// Minimum identifier length (`CLAIM_MIN_IDENTIFIER_LEN`)
    pub min_identifier_len: usize,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY_MS,
            failure_rate: DEFAULT_FAILURE_RATE,
            seed: None,
            mode: SubmissionMode::default(),
            overlap: OverlapPolicy::default(),
            min_identifier_len: MIN_IDENTIFIER_LEN,
        }
    }
}

fn parse<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

impl ClaimConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an env file, with process variables taking
    /// precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvFile`] if the file cannot be read or parsed,
    /// or another [`ConfigError`] if a value is invalid.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let env_file_error = |e: dotenvy::Error| ConfigError::EnvFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let file = dotenvy::from_path_iter(path)
            .map_err(env_file_error)?
            .collect::<Result<HashMap<String, String>, _>>()
            .map_err(env_file_error)?;

        Self::from_lookup(|key| env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let seed = match lookup("CLAIM_SEED") {
            None => None,
            Some(raw) => Some(parse("CLAIM_SEED", Some(raw), 0_u64)?),
        };

        let config = Self {
            latency_ms: parse("CLAIM_LATENCY_MS", lookup("CLAIM_LATENCY_MS"), defaults.latency_ms)?,
            failure_rate: parse(
                "CLAIM_FAILURE_RATE",
                lookup("CLAIM_FAILURE_RATE"),
                defaults.failure_rate,
            )?,
            seed,
            mode: parse("CLAIM_MODE", lookup("CLAIM_MODE"), defaults.mode)?,
            overlap: parse("CLAIM_OVERLAP", lookup("CLAIM_OVERLAP"), defaults.overlap)?,
            min_identifier_len: parse(
                "CLAIM_MIN_IDENTIFIER_LEN",
                lookup("CLAIM_MIN_IDENTIFIER_LEN"),
                defaults.min_identifier_len,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an out-of-range failure rate or a zero
    /// minimum identifier length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::FailureRateOutOfRange(self.failure_rate));
        }
        if self.min_identifier_len == 0 {
            return Err(ConfigError::EmptyIdentifierAllowed);
        }
        Ok(())
    }

    /// Simulated latency as a [`Duration`]
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// Fault injector matching the configured failure rate
    #[must_use]
    pub fn fault_injector(&self) -> Arc<dyn FaultInjector> {
        if self.failure_rate <= 0.0 {
            Arc::new(NoFaults)
        } else if self.failure_rate >= 1.0 {
            Arc::new(AlwaysFail)
        } else if let Some(seed) = self.seed {
            Arc::new(RandomFaults::seeded(self.failure_rate, seed))
        } else {
            Arc::new(RandomFaults::new(self.failure_rate))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClaimConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClaimConfig::default());
        assert_eq!(config.latency(), Duration::from_secs(1));
        assert_eq!(config.mode, SubmissionMode::Optimistic);
        assert_eq!(config.overlap, OverlapPolicy::Isolated);
    }

    #[test]
    fn reads_every_variable() {
        let config = ClaimConfig::from_lookup(lookup(&[
            ("CLAIM_LATENCY_MS", "250"),
            ("CLAIM_FAILURE_RATE", "0.5"),
            ("CLAIM_SEED", "42"),
            ("CLAIM_MODE", "direct"),
            ("CLAIM_OVERLAP", "shared"),
            ("CLAIM_MIN_IDENTIFIER_LEN", "5"),
        ]))
        .unwrap();

        assert_eq!(config.latency_ms, 250);
        assert!((config.failure_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.mode, SubmissionMode::Direct);
        assert_eq!(config.overlap, OverlapPolicy::Shared);
        assert_eq!(config.min_identifier_len, 5);
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let error = ClaimConfig::from_lookup(lookup(&[("CLAIM_LATENCY_MS", "soon")])).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { key: "CLAIM_LATENCY_MS", .. }));
        assert!(error.to_string().contains("soon"));
    }

    #[test]
    fn failure_rate_must_be_a_probability() {
        let error = ClaimConfig::from_lookup(lookup(&[("CLAIM_FAILURE_RATE", "1.5")])).unwrap_err();
        assert_eq!(error, ConfigError::FailureRateOutOfRange(1.5));
    }

    #[test]
    fn fault_injector_follows_rate_extremes() {
        use composable_forms_core::request::{IdentifierValidator, SubmissionId, Validator};
        use composable_forms_core::submission::SubmitPayload;

        let payload = SubmitPayload::new(
            SubmissionId::new(),
            IdentifierValidator::new().validate("alice").unwrap(),
        );

        let never = ClaimConfig {
            failure_rate: 0.0,
            ..ClaimConfig::default()
        };
        let always = ClaimConfig {
            failure_rate: 1.0,
            ..ClaimConfig::default()
        };
        assert!(!never.fault_injector().should_fail(&payload));
        assert!(always.fault_injector().should_fail(&payload));
    }

    fn env_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("claim-form-{}-{name}.env", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn env_file_supplies_unset_variables() {
        let path = env_file(
            "values",
            "# demo settings\nCLAIM_MIN_IDENTIFIER_LEN=4\nCLAIM_MODE=direct\n",
        );

        let config = ClaimConfig::from_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.min_identifier_len, 4);
        assert_eq!(config.mode, SubmissionMode::Direct);
    }

    #[test]
    fn env_file_values_are_validated() {
        let path = env_file("invalid", "CLAIM_FAILURE_RATE=2\n");

        let error = ClaimConfig::from_env_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(error, ConfigError::FailureRateOutOfRange(2.0));
    }

    #[test]
    fn missing_env_file_names_the_path() {
        let path = env::temp_dir().join("claim-form-does-not-exist.env");

        let error = ClaimConfig::from_env_file(&path).unwrap_err();

        assert!(matches!(error, ConfigError::EnvFile { .. }));
        assert!(error.to_string().contains("claim-form-does-not-exist.env"));
    }
}
