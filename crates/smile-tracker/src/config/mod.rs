use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::smiles::{AnalysisConfig, CalendarPolicy};

const MINUTES_PER_DAY: i32 = 24 * 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let utc_offset_minutes = env::var("APP_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|minutes| minutes.abs() < MINUTES_PER_DAY)
            .ok_or(ConfigError::InvalidUtcOffset)?;

        let vision_timeout_ms = env::var("VISION_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|millis| *millis > 0)
            .ok_or(ConfigError::InvalidVisionTimeout)?;

        let squint_bonus = parse_flag("SCORING_SQUINT_BONUS", true)?;
        let confidence_adjustment = parse_flag("SCORING_CONFIDENCE_ADJUSTMENT", true)?;

        let ranking_limit = env::var("RANKING_LIMIT")
            .unwrap_or_else(|_| "100".to_string())
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::InvalidRankingLimit)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring: ScoringConfig {
                utc_offset_minutes,
                vision_timeout: Duration::from_millis(vision_timeout_ms),
                squint_bonus,
                confidence_adjustment,
                ranking_limit,
            },
        })
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag { key }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the scoring pipeline, the calendar boundary and leaderboards.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub utc_offset_minutes: i32,
    pub vision_timeout: Duration,
    pub squint_bonus: bool,
    pub confidence_adjustment: bool,
    pub ranking_limit: usize,
}

impl ScoringConfig {
    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            squint_bonus: self.squint_bonus,
            confidence_adjustment: self.confidence_adjustment,
        }
    }

    pub fn calendar(&self) -> CalendarPolicy {
        // Range is checked in `AppConfig::load`; fall back to UTC for hand-built configs.
        CalendarPolicy::from_offset_minutes(self.utc_offset_minutes).unwrap_or_default()
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            vision_timeout: Duration::from_millis(5000),
            squint_bonus: true,
            confidence_adjustment: true,
            ranking_limit: 100,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidUtcOffset,
    InvalidVisionTimeout,
    InvalidRankingLimit,
    InvalidFlag { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUtcOffset => write!(
                f,
                "APP_UTC_OFFSET_MINUTES must be an integer strictly between -1440 and 1440"
            ),
            ConfigError::InvalidVisionTimeout => {
                write!(f, "VISION_TIMEOUT_MS must be a positive integer")
            }
            ConfigError::InvalidRankingLimit => {
                write!(f, "RANKING_LIMIT must be a positive integer")
            }
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
