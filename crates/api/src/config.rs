//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PASAL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PASAL_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PASAL_HOST` - Bind address (default: 127.0.0.1)
//! - `PASAL_PORT` - Listen port (default: 5000)
//! - `PASAL_FRONTEND_URL` - Storefront origin, used for CORS and payment
//!   redirects (default: <http://localhost:3000>)
//! - `PASAL_JWT_TTL_HOURS` - Token lifetime in hours (default: 168)
//! - `PASAL_RUN_MIGRATIONS` - Apply migrations at boot (default: true)
//! - `PASAL_LOG_FORMAT` - `json` for JSON logs, anything else for text
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking
//!
//! ## Payments (a provider is enabled when its keys are set)
//! - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_CURRENCY` (default: usd)
//! - `ESEWA_MERCHANT_CODE`, `ESEWA_SECRET_KEY`, `ESEWA_FORM_URL`
//! - `KHALTI_SECRET_KEY`, `KHALTI_BASE_URL`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_ESEWA_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";
const DEFAULT_KHALTI_BASE_URL: &str = "https://dev.khalti.com/api/v2";

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

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Storefront origin for CORS and payment return URLs
    pub frontend_url: Url,
    /// Bearer token settings
    pub jwt: JwtConfig,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
    /// Emit JSON-formatted logs
    pub json_logs: bool,
    /// Payment provider credentials
    pub payments: PaymentsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Bearer token configuration.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Token lifetime in hours
    pub ttl_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

/// Credentials for every payment provider. `None` disables the provider.
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    pub stripe: Option<StripeConfig>,
    pub esewa: Option<EsewaConfig>,
    pub khalti: Option<KhaltiConfig>,
}

/// Stripe Checkout configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// ISO 4217 currency, lower-case
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish()
    }
}

/// eSewa ePay v2 configuration.
#[derive(Clone)]
pub struct EsewaConfig {
    /// Merchant (product) code, `EPAYTEST` in the sandbox
    pub merchant_code: String,
    /// HMAC signing key
    pub secret_key: SecretString,
    /// Form POST endpoint the browser submits to
    pub form_url: String,
}

impl std::fmt::Debug for EsewaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsewaConfig")
            .field("merchant_code", &self.merchant_code)
            .field("secret_key", &"[REDACTED]")
            .field("form_url", &self.form_url)
            .finish()
    }
}

/// Khalti ePayment configuration.
#[derive(Clone)]
pub struct KhaltiConfig {
    /// Live or test secret key
    pub secret_key: SecretString,
    /// API base, without trailing slash
    pub base_url: String,
}

impl std::fmt::Debug for KhaltiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KhaltiConfig")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("PASAL_DATABASE_URL")?;
        let host = parse_env("PASAL_HOST", "127.0.0.1")?;
        let port = parse_env("PASAL_PORT", "5000")?;
        let frontend_url = get_env_or_default("PASAL_FRONTEND_URL", "http://localhost:3000");
        let frontend_url = Url::parse(&frontend_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PASAL_FRONTEND_URL".to_string(), e.to_string())
        })?;

        let jwt_secret = get_validated_secret("PASAL_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "PASAL_JWT_SECRET")?;
        let ttl_hours: i64 = parse_env("PASAL_JWT_TTL_HOURS", "168")?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PASAL_JWT_TTL_HOURS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let run_migrations = parse_env("PASAL_RUN_MIGRATIONS", "true")?;
        let json_logs = get_optional_env("PASAL_LOG_FORMAT").is_some_and(|f| f == "json");

        Ok(Self {
            database_url,
            host,
            port,
            frontend_url,
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl_hours,
            },
            run_migrations,
            json_logs,
            payments: PaymentsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Build an absolute storefront URL for a path such as `/payment/success`.
    #[must_use]
    pub fn frontend_link(&self, path: &str) -> String {
        self.frontend_url
            .join(path)
            .map_or_else(|_| format!("{}{path}", self.frontend_url), String::from)
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stripe = match get_optional_env("STRIPE_SECRET_KEY") {
            Some(key) => Some(StripeConfig {
                secret_key: SecretString::from(key),
                webhook_secret: get_required_secret("STRIPE_WEBHOOK_SECRET")?,
                currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
            }),
            None => None,
        };

        let esewa = match get_optional_env("ESEWA_SECRET_KEY") {
            Some(key) => Some(EsewaConfig {
                merchant_code: get_required_env("ESEWA_MERCHANT_CODE")?,
                secret_key: SecretString::from(key),
                form_url: get_env_or_default("ESEWA_FORM_URL", DEFAULT_ESEWA_FORM_URL),
            }),
            None => None,
        };

        let khalti = get_optional_env("KHALTI_SECRET_KEY").map(|key| KhaltiConfig {
            secret_key: SecretString::from(key),
            base_url: get_env_or_default("KHALTI_BASE_URL", DEFAULT_KHALTI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        });

        Ok(Self {
            stripe,
            esewa,
            khalti,
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

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
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

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable with a default value.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that the signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Configuration suitable for unit tests (no environment access).
    pub(crate) fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/pasal_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            frontend_url: Url::parse("http://localhost:3000").unwrap(),
            jwt: JwtConfig {
                secret: SecretString::from("kQ9#vL2!pX7@mZ4$wR8^tY1&nB6*cF3%"),
                ttl_hours: 24,
            },
            run_migrations: false,
            json_logs: false,
            payments: PaymentsConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
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
        let result = validate_secret_strength("changeme-jwt-key", "PASAL_JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "PASAL_JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("kQ9#vL2!pX7@mZ4$wR8^tY1&nB6*cF3%", "PASAL_JWT_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_jwt_secret_too_short() {
        let secret = SecretString::from("aB3$xY9!");
        assert!(validate_jwt_secret(&secret, "PASAL_JWT_SECRET").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_frontend_link() {
        let config = test_config();
        assert_eq!(
            config.frontend_link("/payment/success"),
            "http://localhost:3000/payment/success"
        );
    }

    #[test]
    fn test_payment_configs_redact_secrets() {
        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_test_super_private"),
            webhook_secret: SecretString::from("whsec_super_private"),
            currency: "usd".to_string(),
        };
        let khalti = KhaltiConfig {
            secret_key: SecretString::from("live_secret_key_abc"),
            base_url: DEFAULT_KHALTI_BASE_URL.to_string(),
        };

        let debug_output = format!("{stripe:?} {khalti:?} {:?}", test_config().jwt);

        assert!(debug_output.contains("usd"));
        assert!(debug_output.contains("dev.khalti.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private"));
        assert!(!debug_output.contains("live_secret_key_abc"));
        assert!(!debug_output.contains("kQ9#"));
    }
}
