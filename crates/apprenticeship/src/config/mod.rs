use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::notify::message::DEFAULT_REPORT_PORTAL_URL;
use crate::notify::telegram::DEFAULT_TELEGRAM_API_BASE;
use crate::notify::RetryPolicy;

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
    pub registry: RegistryConfig,
    pub telegram: TelegramConfig,
    pub delivery: DeliveryConfig,
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

        let seed_path = non_empty_var("APP_SEED_PATH").map(PathBuf::from);
        let report_portal_url = non_empty_var("APP_REPORT_PORTAL_URL")
            .unwrap_or_else(|| DEFAULT_REPORT_PORTAL_URL.to_string());

        let bot_token = non_empty_var("TELEGRAM_BOT_TOKEN");
        let api_base = non_empty_var("TELEGRAM_API_BASE")
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string());

        let delivery = DeliveryConfig {
            max_attempts: parse_var("DELIVERY_MAX_ATTEMPTS", 5)?,
            base_delay_ms: parse_var("DELIVERY_BASE_DELAY_MS", 500)?,
            max_delay_ms: parse_var("DELIVERY_MAX_DELAY_MS", 60_000)?,
            poll_interval_ms: parse_var("DELIVERY_POLL_INTERVAL_MS", 1_000)?,
            batch_size: parse_var("DELIVERY_BATCH_SIZE", 16)?,
        };
        delivery.validate()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            registry: RegistryConfig {
                seed_path,
                report_portal_url,
            },
            telegram: TelegramConfig {
                api_base,
                bot_token,
            },
            delivery,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(default),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Reference data and message content.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub seed_path: Option<PathBuf>,
    pub report_portal_url: String,
}

/// Telegram Bot API access. Without a token notifications are only logged.
#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: Option<String>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Outbox drain cadence and retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub batch_size: usize,
}

impl DeliveryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidDelivery(
                "DELIVERY_MAX_ATTEMPTS must be at least 1",
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidDelivery(
                "DELIVERY_BASE_DELAY_MS must not exceed DELIVERY_MAX_DELAY_MS",
            ));
        }
        if self.poll_interval_ms == 0 || self.batch_size == 0 {
            return Err(ConfigError::InvalidDelivery(
                "DELIVERY_POLL_INTERVAL_MS and DELIVERY_BATCH_SIZE must be positive",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidDelivery(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidDelivery(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidDelivery(_) => None,
        }
    }
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_SEED_PATH",
            "APP_REPORT_PORTAL_URL",
            "TELEGRAM_BOT_TOKEN",
            "TELEGRAM_API_BASE",
            "DELIVERY_MAX_ATTEMPTS",
            "DELIVERY_BASE_DELAY_MS",
            "DELIVERY_MAX_DELAY_MS",
            "DELIVERY_POLL_INTERVAL_MS",
            "DELIVERY_BATCH_SIZE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.registry.report_portal_url, DEFAULT_REPORT_PORTAL_URL);
        assert!(config.registry.seed_path.is_none());
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.delivery.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_invalid_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PORT", "not-a-port");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPort)));
        reset_env();
    }

    #[test]
    fn rejects_inverted_retry_delays() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DELIVERY_BASE_DELAY_MS", "5000");
        env::set_var("DELIVERY_MAX_DELAY_MS", "100");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidDelivery(_))
        ));
        reset_env();
    }

    #[test]
    fn telegram_token_is_redacted_in_debug_output() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TELEGRAM_BOT_TOKEN", "123:secret");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:secret"));
        assert!(!format!("{:?}", config.telegram).contains("secret"));
        reset_env();
    }
}
