//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `INSIGHTSHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `INSIGHTSHOP_BASE_URL` - Public URL for the storefront
//! - `INSIGHTSHOP_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `INSIGHTSHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `INSIGHTSHOP_PORT` - Listen port (default: 5000)
//! - `INSIGHTSHOP_STATIC_DIR` - Prebuilt frontend directory (default: frontend/dist)
//! - `INSIGHTSHOP_TAX_RATE` - Sales tax rate as a fraction (default: 0.08)
//! - `INSIGHTSHOP_FREE_SHIPPING_THRESHOLD` - Subtotal for free standard shipping (default: 50.00)
//! - `INSIGHTSHOP_CRON_TOKEN` - Shared secret for the sale automation endpoint
//! - `INSIGHTSHOP_LOG_JSON` - Emit JSON logs when set
//! - `CLAUDE_API_KEY` / `CLAUDE_MODEL` - Enables the conversational assistant
//! - `OPENAI_API_KEY` / `EMBEDDING_API_URL` - Enables semantic product search
//! - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USERNAME` / `SMTP_PASSWORD` / `SMTP_FROM` - Enables email
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` / `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_EMBEDDING_API_URL: &str = "https://api.openai.com/v1/embeddings";

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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Directory holding the prebuilt single-page frontend
    pub static_dir: PathBuf,
    /// Pricing rules applied at checkout
    pub commerce: CommerceConfig,
    /// Shared secret accepted in `X-Cron-Token` for sale automation
    pub cron_token: Option<SecretString>,
    /// Claude configuration (assistant replies and tool use)
    pub claude: Option<ClaudeConfig>,
    /// Embedding API configuration (semantic product search)
    pub embeddings: Option<EmbeddingConfig>,
    /// SMTP configuration (transactional email)
    pub email: Option<EmailConfig>,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Tax and shipping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommerceConfig {
    /// Tax rate as a fraction of the discounted subtotal.
    pub tax_rate: Decimal,
    /// Discounted subtotal at which standard shipping becomes free.
    pub free_shipping_threshold: Decimal,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::new(50, 0),
        }
    }
}

/// Claude AI API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ClaudeConfig {
    /// Anthropic API key
    pub api_key: SecretString,
    /// Model ID
    pub model: String,
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// OpenAI-compatible embeddings API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct EmbeddingConfig {
    /// API key sent as a bearer token
    pub api_key: SecretString,
    /// Embeddings endpoint URL
    pub api_url: String,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("INSIGHTSHOP_DATABASE_URL")?;
        let host = get_env_or_default("INSIGHTSHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("INSIGHTSHOP_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("INSIGHTSHOP_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("INSIGHTSHOP_PORT".to_string(), e.to_string())
            })?;
        let base_url = parse_base_url(&get_required_env("INSIGHTSHOP_BASE_URL")?)?;
        let session_secret = get_validated_secret("INSIGHTSHOP_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "INSIGHTSHOP_SESSION_SECRET")?;
        let static_dir = PathBuf::from(get_env_or_default("INSIGHTSHOP_STATIC_DIR", "frontend/dist"));

        let commerce = CommerceConfig::from_env()?;
        let cron_token = get_optional_env("INSIGHTSHOP_CRON_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "INSIGHTSHOP_CRON_TOKEN")?;
                Ok(SecretString::from(token))
            })
            .transpose()?;
        let claude = ClaudeConfig::from_env()?;
        let embeddings = EmbeddingConfig::from_env();
        let email = EmailConfig::from_env()?;
        let log_json = get_optional_env("INSIGHTSHOP_LOG_JSON").is_some();

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            static_dir,
            commerce,
            cron_token,
            claude,
            embeddings,
            email,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Constant-time check of a presented cron token.
    #[must_use]
    pub fn cron_token_matches(&self, presented: &str) -> bool {
        self.cron_token.as_ref().is_some_and(|expected| {
            constant_time_eq(expected.expose_secret().as_bytes(), presented.as_bytes())
        })
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            tax_rate: get_decimal_env("INSIGHTSHOP_TAX_RATE", defaults.tax_rate)?,
            free_shipping_threshold: get_decimal_env(
                "INSIGHTSHOP_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
        })
    }
}

impl ClaudeConfig {
    /// Returns `None` if `CLAUDE_API_KEY` is not set (template replies only).
    fn from_env() -> Result<Option<Self>, ConfigError> {
        if get_optional_env("CLAUDE_API_KEY").is_none() {
            return Ok(None);
        }
        Ok(Some(Self {
            api_key: get_validated_secret("CLAUDE_API_KEY")?,
            model: get_env_or_default("CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
        }))
    }
}

impl EmbeddingConfig {
    /// Returns `None` if `OPENAI_API_KEY` is not set (semantic search disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        get_optional_env("OPENAI_API_KEY").map(|key| {
            if let Err(e) = validate_secret_strength(&key, "OPENAI_API_KEY") {
                tracing::warn!("OPENAI_API_KEY validation warning: {e}");
            }
            Self {
                api_key: SecretString::from(key),
                api_url: get_env_or_default("EMBEDDING_API_URL", DEFAULT_EMBEDDING_API_URL),
            }
        })
    }
}

impl EmailConfig {
    /// Returns `None` unless `SMTP_HOST` is set; the other SMTP variables are
    /// then required.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Absolute http(s) URL, without a trailing slash.
fn parse_base_url(value: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("INSIGHTSHOP_BASE_URL".to_owned(), reason);
    let url = url::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid("must be an http or https URL".to_owned()));
    }
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

/// Database URL alone, for tools that don't need the server settings.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("INSIGHTSHOP_DATABASE_URL")
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a non-negative decimal environment variable.
fn get_decimal_env(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    parse_non_negative_decimal(&raw)
        .map_err(|reason| ConfigError::InvalidEnvVar(key.to_string(), reason))
}

fn parse_non_negative_decimal(raw: &str) -> Result<Decimal, String> {
    let value: Decimal = raw.trim().parse().map_err(|e| format!("{e}"))?;
    if value.is_sign_negative() {
        return Err("must not be negative".to_string());
    }
    Ok(value)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            static_dir: PathBuf::from("frontend/dist"),
            commerce: CommerceConfig::default(),
            cron_token: Some(SecretString::from("q7Zk2mW9xR4tB8nV")),
            claude: None,
            embeddings: None,
            email: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_parse_base_url() {
        assert_eq!(
            parse_base_url("https://shop.example.com/").unwrap(),
            "https://shop.example.com"
        );
        assert_eq!(parse_base_url("http://localhost:5000").unwrap(), "http://localhost:5000");
        assert!(parse_base_url("shop.example.com").is_err());
        assert!(parse_base_url("ftp://shop.example.com").is_err());
    }

    #[test]
    fn test_commerce_defaults() {
        let commerce = CommerceConfig::default();
        assert_eq!(commerce.tax_rate, Decimal::new(8, 2));
        assert_eq!(commerce.free_shipping_threshold, Decimal::new(50, 0));
    }

    #[test]
    fn test_parse_non_negative_decimal() {
        assert_eq!(parse_non_negative_decimal(" 0.0725 ").unwrap(), Decimal::new(725, 4));
        assert!(parse_non_negative_decimal("-1").is_err());
        assert!(parse_non_negative_decimal("abc").is_err());
    }

    #[test]
    fn test_cron_token_matches() {
        let cfg = config();
        assert!(cfg.cron_token_matches("q7Zk2mW9xR4tB8nV"));
        assert!(!cfg.cron_token_matches("q7Zk2mW9xR4tB8nW"));
        assert!(!cfg.cron_token_matches(""));

        let no_token = StorefrontConfig {
            cron_token: None,
            ..config()
        };
        assert!(!no_token.cron_token_matches("anything"));
    }

    #[test]
    fn test_is_https() {
        assert!(!config().is_https());
        let cfg = StorefrontConfig {
            base_url: "https://shop.example.com".to_string(),
            ..config()
        };
        assert!(cfg.is_https());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let claude = ClaudeConfig {
            api_key: SecretString::from("sk-ant-super-sensitive"),
            model: DEFAULT_CLAUDE_MODEL.to_string(),
        };
        let output = format!("{claude:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("super-sensitive"));

        let email = EmailConfig {
            smtp_host: "smtp.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("hunter2-sensitive"),
            from_address: "shop@test".to_string(),
        };
        let output = format!("{email:?}");
        assert!(output.contains("smtp.test"));
        assert!(!output.contains("hunter2-sensitive"));
    }
}
