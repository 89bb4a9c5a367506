//! Connector configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CONNECTOR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `COMMERCE_CONNECTOR_API_URL` - Base URL of the commerce backend connector API
//! - `COMMERCE_SYSTEM_API_URL` - Base URL of the commerce system API (reported by verification)
//! - `COMMERCE_API_TOKEN` - Bearer token for outbound calls (high entropy)
//!
//! ## Optional
//! - `CONNECTOR_HOST` - Bind address (default: 127.0.0.1)
//! - `CONNECTOR_PORT` - Listen port (default: 8080)
//! - `CONNECTOR_SETTINGS_PATH` - YAML settings file (default: config/connector.yaml)
//! - `COMMERCE_API_TIMEOUT_SECS` - Outbound request timeout (default: 30)
//! - `QUEUE_POLL_INTERVAL_SECS` - Promotion queue poll interval (default: 30)
//! - `QUEUE_BATCH_SIZE` - Items claimed per queue per run (default: 50)
//! - `QUEUE_MAX_ATTEMPTS` - Deliveries before an item is marked failed (default: 5)
//! - `QUEUE_LEASE_SECS` - How long a claimed item stays invisible (default: 300)
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Connector application configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Path of the YAML settings file
    pub settings_path: PathBuf,
    /// Outbound commerce backend configuration
    pub commerce: CommerceApiConfig,
    /// Promotion queue runner configuration
    pub queue: QueueConfig,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Commerce backend API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CommerceApiConfig {
    /// Connector API base URL (outbound calls go here)
    pub connector_api_url: Url,
    /// System API base URL (reported, not called)
    pub system_api_url: Url,
    /// Bearer token for outbound calls
    pub api_token: SecretString,
    /// Outbound request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CommerceApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceApiConfig")
            .field("connector_api_url", &self.connector_api_url.as_str())
            .field("system_api_url", &self.system_api_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Promotion queue runner configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_attempts: u32,
    pub lease: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            batch_size: 50,
            max_attempts: 5,
            lease: Duration::from_secs(300),
        }
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CONNECTOR_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("CONNECTOR_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("CONNECTOR_PORT", "8080")?;
        let settings_path =
            PathBuf::from(get_env_or_default("CONNECTOR_SETTINGS_PATH", "config/connector.yaml"));

        let commerce = CommerceApiConfig::from_env()?;
        let queue = QueueConfig::from_env()?;

        let json_logs = get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            database_url,
            host,
            port,
            settings_path,
            commerce,
            queue,
            json_logs,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Load only the database URL, for commands that never call the
    /// commerce backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither
    /// `CONNECTOR_DATABASE_URL` nor `DATABASE_URL` is set.
    pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
        let _ = dotenvy::dotenv();
        get_database_url("CONNECTOR_DATABASE_URL")
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CommerceApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            connector_api_url: get_base_url("COMMERCE_CONNECTOR_API_URL")?,
            system_api_url: get_base_url("COMMERCE_SYSTEM_API_URL")?,
            api_token: get_validated_secret("COMMERCE_API_TOKEN")?,
            timeout: Duration::from_secs(get_parsed_or_default("COMMERCE_API_TIMEOUT_SECS", "30")?),
        })
    }
}

impl QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_attempts: u32 = get_parsed_or_default("QUEUE_MAX_ATTEMPTS", "5")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "QUEUE_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            poll_interval: Duration::from_secs(get_parsed_or_default(
                "QUEUE_POLL_INTERVAL_SECS",
                "30",
            )?),
            batch_size: get_parsed_or_default("QUEUE_BATCH_SIZE", "50")?,
            max_attempts,
            lease: Duration::from_secs(get_parsed_or_default("QUEUE_LEASE_SECS", "300")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL and make sure it ends with `/` so relative joins keep
/// the path prefix.
fn get_base_url(key: &str) -> Result<Url, ConfigError> {
    parse_base_url(&get_required_env(key)?)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e))
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("https://commerce.test/api").unwrap();
        assert_eq!(url.as_str(), "https://commerce.test/api/");
        assert_eq!(
            url.join("v1/store/x/config").unwrap().as_str(),
            "https://commerce.test/api/v1/store/x/config"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://commerce.test").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ConnectorConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            settings_path: PathBuf::from("config/connector.yaml"),
            commerce: CommerceApiConfig {
                connector_api_url: parse_base_url("http://localhost:9000").unwrap(),
                system_api_url: parse_base_url("http://localhost:9001").unwrap(),
                api_token: SecretString::from("token"),
                timeout: Duration::from_secs(30),
            },
            queue: QueueConfig::default(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_commerce_config_debug_redacts_token() {
        let config = CommerceApiConfig {
            connector_api_url: parse_base_url("http://localhost:9000").unwrap(),
            system_api_url: parse_base_url("http://localhost:9001").unwrap(),
            api_token: SecretString::from("super_secret_token_value"),
            timeout: Duration::from_secs(5),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("localhost:9000"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token_value"));
    }
}
