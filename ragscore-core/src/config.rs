// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration for the metric engine
//!
//! Covers provider call limits (concurrency, timeout, retry/backoff) and the
//! per-metric knobs. Values come from defaults, an optional TOML file and
//! `RAGSCORE_*` environment variables, in increasing priority.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub response_relevancy: ResponseRelevancySettings,
    #[serde(default)]
    pub faithfulness: FaithfulnessSettings,
}

/// Limits applied to every judge and embedding call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Maximum provider calls in flight across all metrics of one engine
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Timeout for a single provider call in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Attempts per call, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Relative jitter applied to each backoff delay
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EvaluationSettings {
    /// Samples evaluated at the same time by batch evaluation
    #[serde(default = "default_max_concurrent_samples")]
    pub max_concurrent_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResponseRelevancySettings {
    /// Questions generated from each response
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FaithfulnessSettings {
    #[serde(default)]
    pub zero_claims: ZeroClaimsPolicy,
}

/// What faithfulness reports when the response contains no claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroClaimsPolicy {
    /// Nothing unsupported was said: score 1.0
    #[default]
    VacuouslyFaithful,
    /// Report a degenerate-input failure
    Fail,
}

impl FromStr for ZeroClaimsPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vacuously_faithful" | "one" | "1.0" => Ok(ZeroClaimsPolicy::VacuouslyFaithful),
            "fail" | "error" => Ok(ZeroClaimsPolicy::Fail),
            other => bail!("invalid zero-claims policy: {other}"),
        }
    }
}

fn default_max_concurrent_calls() -> usize {
    8
}

fn default_call_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

fn default_max_concurrent_samples() -> usize {
    4
}

fn default_num_questions() -> usize {
    3
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            max_concurrent_calls: default_max_concurrent_calls(),
            call_timeout_secs: default_call_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            max_concurrent_samples: default_max_concurrent_samples(),
        }
    }
}

impl Default for ResponseRelevancySettings {
    fn default() -> Self {
        Self {
            num_questions: default_num_questions(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - RAGSCORE_MAX_CONCURRENT_CALLS: provider calls in flight (default: 8)
    /// - RAGSCORE_CALL_TIMEOUT_SECS: per-call timeout (default: 30)
    /// - RAGSCORE_MAX_ATTEMPTS: attempts per call incl. the first (default: 2)
    /// - RAGSCORE_INITIAL_BACKOFF_MS: first retry delay (default: 200)
    /// - RAGSCORE_MAX_BACKOFF_MS: retry delay cap (default: 5000)
    /// - RAGSCORE_MAX_CONCURRENT_SAMPLES: batch parallelism (default: 4)
    /// - RAGSCORE_NUM_QUESTIONS: questions per response (default: 3)
    /// - RAGSCORE_ZERO_CLAIMS: "vacuously_faithful" or "fail"
    pub fn from_env() -> Self {
        Self::default().merge_with_env()
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        let config = config.merge_with_env();
        config.validate()?;
        Ok(config)
    }

    /// Override fields whose environment variable is set and parses
    fn merge_with_env(mut self) -> Self {
        if let Some(v) = env_parse("RAGSCORE_MAX_CONCURRENT_CALLS") {
            self.provider.max_concurrent_calls = v;
        }
        if let Some(v) = env_parse("RAGSCORE_CALL_TIMEOUT_SECS") {
            self.provider.call_timeout_secs = v;
        }
        if let Some(v) = env_parse("RAGSCORE_MAX_ATTEMPTS") {
            self.provider.max_attempts = v;
        }
        if let Some(v) = env_parse("RAGSCORE_INITIAL_BACKOFF_MS") {
            self.provider.initial_backoff_ms = v;
        }
        if let Some(v) = env_parse("RAGSCORE_MAX_BACKOFF_MS") {
            self.provider.max_backoff_ms = v;
        }
        if let Some(v) = env_parse("RAGSCORE_MAX_CONCURRENT_SAMPLES") {
            self.evaluation.max_concurrent_samples = v;
        }
        if let Some(v) = env_parse("RAGSCORE_NUM_QUESTIONS") {
            self.response_relevancy.num_questions = v;
        }
        if let Some(v) = env_parse("RAGSCORE_ZERO_CLAIMS") {
            self.faithfulness.zero_claims = v;
        }
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.provider.max_concurrent_calls == 0 {
            bail!("provider.max_concurrent_calls must be at least 1");
        }
        if self.provider.call_timeout_secs == 0 {
            bail!("provider.call_timeout_secs must be at least 1");
        }
        if self.provider.max_attempts == 0 {
            bail!("provider.max_attempts must be at least 1");
        }
        if self.provider.backoff_multiplier < 1.0 {
            bail!("provider.backoff_multiplier must be >= 1.0");
        }
        if !(0.0..=1.0).contains(&self.provider.jitter) {
            bail!("provider.jitter must be within [0, 1]");
        }
        if self.evaluation.max_concurrent_samples == 0 {
            bail!("evaluation.max_concurrent_samples must be at least 1");
        }
        if self.response_relevancy.num_questions == 0 {
            bail!("response_relevancy.num_questions must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.provider.max_concurrent_calls, 8);
        assert_eq!(config.provider.call_timeout_secs, 30);
        assert_eq!(config.provider.max_attempts, 2);
        assert_eq!(config.response_relevancy.num_questions, 3);
        assert_eq!(config.faithfulness.zero_claims, ZeroClaimsPolicy::VacuouslyFaithful);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [provider]
            max_concurrent_calls = 2
            call_timeout_secs = 5

            [faithfulness]
            zero_claims = "fail"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.max_concurrent_calls, 2);
        assert_eq!(config.provider.call_timeout_secs, 5);
        assert_eq!(config.provider.max_attempts, 2);
        assert_eq!(config.response_relevancy.num_questions, 3);
        assert_eq!(config.faithfulness.zero_claims, ZeroClaimsPolicy::Fail);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = EngineConfig::default();
        config.provider.max_concurrent_calls = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.response_relevancy.num_questions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_claims_policy_from_str() {
        assert_eq!(
            "FAIL".parse::<ZeroClaimsPolicy>().unwrap(),
            ZeroClaimsPolicy::Fail
        );
        assert_eq!(
            "vacuously_faithful".parse::<ZeroClaimsPolicy>().unwrap(),
            ZeroClaimsPolicy::VacuouslyFaithful
        );
        assert!("sometimes".parse::<ZeroClaimsPolicy>().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            EngineConfig::load(Some(PathBuf::from("/nonexistent/ragscore.toml"))).unwrap();
        assert_eq!(config.response_relevancy.num_questions, default_num_questions());
    }
}
