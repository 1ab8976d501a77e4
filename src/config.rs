use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("invalid rank rebalancing configuration: {}", .0.join("; "))]
    InvalidRanking(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub cors_origin: String,
    pub jwt_secret: String,
    pub request_timeout_ms: u64,
    pub ranking: RankingConfig,
}

/// Tuning for gap detection and column renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RankingConfig {
    /// Adjacent ranks closer than this trigger a rebalance.
    pub min_gap: f64,
    /// Distance between consecutive ranks after a rebalance.
    pub spacing: f64,
    pub max_attempts: u32,
    /// Backoff before retry `n` is `retry_base_delay_ms * n`.
    pub retry_base_delay_ms: u64,
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.min_gap.is_nan() || self.min_gap <= 0.0 {
            errors.push(format!("MinGap must be > 0. Found: {}", self.min_gap));
        }

        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            errors.push(format!("Spacing must be > 0. Found: {}", self.spacing));
        }

        if self.min_gap.is_nan() || self.spacing.is_nan() || self.min_gap >= self.spacing {
            errors.push(format!(
                "MinGap must be less than Spacing. Found MinGap: {}, Spacing: {}",
                self.min_gap, self.spacing
            ));
        }

        if self.max_attempts == 0 {
            errors.push(format!(
                "MaxAttempts must be > 0. Found: {}",
                self.max_attempts
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidRanking(errors))
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_gap: 1e-6,
            spacing: 1000.0,
            max_attempts: 3,
            retry_base_delay_ms: 50,
        }
    }
}

impl Config {
    /// Reads the environment. Values that are present but unparseable are
    /// errors rather than silently replaced by defaults, and `JWT_SECRET` has
    /// no default at all.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let ranking = RankingConfig {
            min_gap: parse_or(&lookup, "RANK_MIN_GAP", defaults.ranking.min_gap)?,
            spacing: parse_or(&lookup, "RANK_SPACING", defaults.ranking.spacing)?,
            max_attempts: parse_or(&lookup, "RANK_MAX_ATTEMPTS", defaults.ranking.max_attempts)?,
            retry_base_delay_ms: parse_or(
                &lookup,
                "RANK_RETRY_BASE_DELAY_MS",
                defaults.ranking.retry_base_delay_ms,
            )?,
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing { key: "JWT_SECRET" })?;

        Ok(Self {
            port: parse_or(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            jwt_secret,
            request_timeout_ms: parse_or(&lookup, "REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            ranking,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Missing { key: "JWT_SECRET" });
        }
        self.ranking.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 21547,
            database_url: "sqlite:kanban.db".into(),
            cors_origin: "http://localhost:21548,http://127.0.0.1:21548".into(),
            jwt_secret: String::new(),
            request_timeout_ms: 10_000,
            ranking: RankingConfig::default(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}
