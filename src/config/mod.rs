//! Configuration loading for the bonus ranking service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `BONUSHUB_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::scorer::{HeuristicVariant, ObservedVariant, ScoringStrategy};

const ENV_PREFIX: &str = "BONUSHUB_";

/// Application configuration derived from `BONUSHUB_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Allowed CORS origins; empty means any origin.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_origins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub sports: SportsConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// Public API rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RateLimitConfig {
    /// Maximum requests per client within one window (default: 60)
    ///
    /// Environment variable: `BONUSHUB_RATE_LIMIT_REQUESTS`
    #[serde(default = "default_rate_limit_requests")]
    pub requests: u32,

    /// Sliding window length in seconds (default: 60)
    ///
    /// Environment variable: `BONUSHUB_RATE_LIMIT_WINDOW_SECONDS`
    #[serde(default = "default_rate_limit_window_seconds")]
    pub window_seconds: u64,

    /// Path prefixes that bypass the limiter entirely
    ///
    /// Environment variable: `BONUSHUB_RATE_LIMIT_EXEMPT_PREFIXES` (comma-separated)
    #[serde(default = "default_rate_limit_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,

    /// How often idle client entries are evicted (default: 300)
    ///
    /// Environment variable: `BONUSHUB_RATE_LIMIT_SWEEP_INTERVAL_SECONDS`
    #[serde(default = "default_rate_limit_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

/// Upstream sports scores provider and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SportsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_api_key: Option<String>,
    #[serde(default = "default_odds_api_base")]
    pub odds_api_base: String,
    /// Sport keys queried on every refresh, in priority order.
    #[serde(default = "default_odds_sports")]
    pub sports: Vec<String>,
    /// Number of leading sport keys used for the upcoming-fixtures fallback.
    #[serde(default = "default_odds_fallback_sports")]
    pub fallback_sports: usize,
    #[serde(default = "default_odds_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_odds_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_scores_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_scores_display_limit")]
    pub display_limit: usize,
}

/// Ranking scheduler and scoring strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RankingConfig {
    #[serde(default = "default_ranking_scheduler_enabled")]
    pub scheduler_enabled: bool,
    #[serde(default = "default_ranking_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    #[serde(default)]
    pub heuristic: HeuristicVariant,
    #[serde(default)]
    pub observed: ObservedVariant,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            cors_origins: Vec::new(),
            git_commit: None,
            rate_limit: RateLimitConfig::default(),
            sports: SportsConfig::default(),
            ranking: RankingConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_limit_requests(),
            window_seconds: default_rate_limit_window_seconds(),
            exempt_prefixes: default_rate_limit_exempt_prefixes(),
            sweep_interval_seconds: default_rate_limit_sweep_interval_seconds(),
        }
    }
}

impl Default for SportsConfig {
    fn default() -> Self {
        Self {
            odds_api_key: None,
            odds_api_base: default_odds_api_base(),
            sports: default_odds_sports(),
            fallback_sports: default_odds_fallback_sports(),
            timeout_seconds: default_odds_timeout_seconds(),
            max_attempts: default_odds_max_attempts(),
            cache_ttl_seconds: default_scores_cache_ttl_seconds(),
            display_limit: default_scores_display_limit(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: default_ranking_scheduler_enabled(),
            tick_interval_seconds: default_ranking_tick_interval_seconds(),
            heuristic: HeuristicVariant::default(),
            observed: ObservedVariant::default(),
        }
    }
}

impl RateLimitConfig {
    /// Validate limiter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requests == 0 {
            return Err(ConfigError::InvalidRateLimitRequests {
                value: self.requests,
            });
        }
        if self.window_seconds == 0 {
            return Err(ConfigError::InvalidRateLimitWindow {
                value: self.window_seconds,
            });
        }
        if self.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidRateLimitSweepInterval {
                value: self.sweep_interval_seconds,
            });
        }
        if let Some(prefix) = self.exempt_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidExemptPrefix {
                prefix: prefix.clone(),
            });
        }
        Ok(())
    }
}

impl SportsConfig {
    /// Validate provider and cache bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.odds_api_base).is_err() {
            return Err(ConfigError::InvalidOddsApiBase {
                value: self.odds_api_base.clone(),
            });
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > 60 {
            return Err(ConfigError::InvalidOddsTimeout {
                value: self.timeout_seconds,
            });
        }
        if self.max_attempts == 0 || self.max_attempts > 5 {
            return Err(ConfigError::InvalidOddsMaxAttempts {
                value: self.max_attempts,
            });
        }
        if self.cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidCacheTtl {
                value: self.cache_ttl_seconds,
            });
        }
        if self.display_limit == 0 || self.display_limit > 100 {
            return Err(ConfigError::InvalidDisplayLimit {
                value: self.display_limit,
            });
        }
        Ok(())
    }

    /// Whether an API key is present for the upstream provider.
    pub fn is_configured(&self) -> bool {
        self.odds_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl RankingConfig {
    /// Validate scheduler bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_seconds < 10 || self.tick_interval_seconds > 86_400 {
            return Err(ConfigError::InvalidRankingTickInterval {
                value: self.tick_interval_seconds,
            });
        }
        Ok(())
    }

    /// Scoring formulas selected for this deployment.
    pub fn strategy(&self) -> ScoringStrategy {
        ScoringStrategy::new(self.heuristic, self.observed)
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.sports.odds_api_key.is_some() {
            config.sports.odds_api_key = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates every configuration section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }
        self.rate_limit.validate()?;
        self.sports.validate()?;
        self.ranking.validate()?;
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/bonushub".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_rate_limit_requests() -> u32 {
    60
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_rate_limit_exempt_prefixes() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/api/track".to_string(),
        "/api/go".to_string(),
    ]
}

fn default_rate_limit_sweep_interval_seconds() -> u64 {
    300 // 5 minutes
}

fn default_odds_api_base() -> String {
    "https://api.the-odds-api.com".to_string()
}

fn default_odds_sports() -> Vec<String> {
    [
        "soccer_turkey_super_league",
        "soccer_epl",
        "soccer_spain_la_liga",
        "soccer_italy_serie_a",
        "soccer_germany_bundesliga",
        "soccer_uefa_champs_league",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_odds_fallback_sports() -> usize {
    2
}

fn default_odds_timeout_seconds() -> u64 {
    10
}

fn default_odds_max_attempts() -> u32 {
    2
}

fn default_scores_cache_ttl_seconds() -> u64 {
    120
}

fn default_scores_display_limit() -> usize {
    10
}

fn default_ranking_scheduler_enabled() -> bool {
    true
}

fn default_ranking_tick_interval_seconds() -> u64 {
    900 // 15 minutes
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("rate limit request cap must be positive, got {value}")]
    InvalidRateLimitRequests { value: u32 },
    #[error("rate limit window must be positive, got {value}")]
    InvalidRateLimitWindow { value: u64 },
    #[error("rate limit sweep interval must be positive, got {value}")]
    InvalidRateLimitSweepInterval { value: u64 },
    #[error("rate limit exempt prefix must start with '/': {prefix}")]
    InvalidExemptPrefix { prefix: String },
    #[error("odds API base is not a valid URL: {value}")]
    InvalidOddsApiBase { value: String },
    #[error("odds API timeout must be between 1 and 60 seconds, got {value}")]
    InvalidOddsTimeout { value: u64 },
    #[error("odds API max attempts must be between 1 and 5, got {value}")]
    InvalidOddsMaxAttempts { value: u32 },
    #[error("scores cache TTL must be positive, got {value}")]
    InvalidCacheTtl { value: u64 },
    #[error("scores display limit must be between 1 and 100, got {value}")]
    InvalidDisplayLimit { value: usize },
    #[error("ranking tick interval must be between 10 and 86400 seconds, got {value}")]
    InvalidRankingTickInterval { value: u64 },
    #[error("unknown {field} scoring variant '{value}'")]
    InvalidScoringVariant { field: &'static str, value: String },
}

/// Loads configuration using layered `.env` files and `BONUSHUB_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`,
    /// then the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let cors_origins = layered
            .remove("CORS_ORIGINS")
            .map(|origins| split_list(&origins))
            .unwrap_or_default();
        let git_commit = layered
            .remove("GIT_COMMIT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let rate_limit = RateLimitConfig {
            requests: layered
                .remove("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_requests),
            window_seconds: layered
                .remove("RATE_LIMIT_WINDOW_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_window_seconds),
            exempt_prefixes: layered
                .remove("RATE_LIMIT_EXEMPT_PREFIXES")
                .map(|prefixes| split_list(&prefixes))
                .unwrap_or_else(default_rate_limit_exempt_prefixes),
            sweep_interval_seconds: layered
                .remove("RATE_LIMIT_SWEEP_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_rate_limit_sweep_interval_seconds),
        };

        let sports = SportsConfig {
            odds_api_key: layered
                .remove("ODDS_API_KEY")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            odds_api_base: layered
                .remove("ODDS_API_BASE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default_odds_api_base),
            sports: layered
                .remove("ODDS_SPORTS")
                .map(|sports| split_list(&sports))
                .filter(|sports| !sports.is_empty())
                .unwrap_or_else(default_odds_sports),
            fallback_sports: layered
                .remove("ODDS_FALLBACK_SPORTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_odds_fallback_sports),
            timeout_seconds: layered
                .remove("ODDS_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_odds_timeout_seconds),
            max_attempts: layered
                .remove("ODDS_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_odds_max_attempts),
            cache_ttl_seconds: layered
                .remove("SCORES_CACHE_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scores_cache_ttl_seconds),
            display_limit: layered
                .remove("SCORES_DISPLAY_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_scores_display_limit),
        };

        // Unknown variant names are rejected rather than silently defaulted.
        let heuristic = match layered.remove("SCORING_HEURISTIC") {
            Some(value) if !value.trim().is_empty() => {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidScoringVariant {
                        field: "heuristic",
                        value,
                    })?
            }
            _ => HeuristicVariant::default(),
        };
        let observed = match layered.remove("SCORING_OBSERVED") {
            Some(value) if !value.trim().is_empty() => {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidScoringVariant {
                        field: "observed",
                        value,
                    })?
            }
            _ => ObservedVariant::default(),
        };

        let ranking = RankingConfig {
            scheduler_enabled: layered
                .remove("RANKING_SCHEDULER_ENABLED")
                .and_then(|v| parse_bool(&v))
                .unwrap_or_else(default_ranking_scheduler_enabled),
            tick_interval_seconds: layered
                .remove("RANKING_TICK_INTERVAL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_ranking_tick_interval_seconds),
            heuristic,
            observed,
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            cors_origins,
            git_commit,
            rate_limit,
            sports,
            ranking,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit.requests, 60);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.sports.cache_ttl_seconds, 120);
        assert_eq!(config.sports.display_limit, 10);
        assert_eq!(config.sports.max_attempts, 2);
    }

    #[test]
    fn rate_limit_rejects_zero_cap_and_relative_prefix() {
        let config = RateLimitConfig {
            requests: 0,
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRateLimitRequests { value: 0 })
        ));

        let config = RateLimitConfig {
            exempt_prefixes: vec!["api/track".to_string()],
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExemptPrefix { .. })
        ));
    }

    #[test]
    fn sports_config_bounds() {
        let config = SportsConfig {
            display_limit: 0,
            ..SportsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDisplayLimit { value: 0 })
        ));

        let config = SportsConfig {
            max_attempts: 6,
            ..SportsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOddsMaxAttempts { value: 6 })
        ));

        let config = SportsConfig {
            odds_api_base: "not a url".to_string(),
            ..SportsConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_api_key_is_not_configured() {
        let mut config = SportsConfig::default();
        assert!(!config.is_configured());
        config.odds_api_key = Some("   ".to_string());
        assert!(!config.is_configured());
        config.odds_api_key = Some("abc".to_string());
        assert!(config.is_configured());
    }

    #[test]
    fn redacted_json_hides_odds_key() {
        let mut config = AppConfig::default();
        config.sports.odds_api_key = Some("super-secret".to_string());
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn ranking_tick_bounds() {
        let config = RankingConfig {
            tick_interval_seconds: 5,
            ..RankingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRankingTickInterval { value: 5 })
        ));
    }
}
