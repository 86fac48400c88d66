//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MANGAVERSE_API_URL` - Base URL of the shop API (e.g. `http://localhost:3000`)
//!
//! ## Optional
//! - `MANGAVERSE_TOKEN_PATH` - Where the session token is persisted (default: `.mangaverse/token`)
//! - `MANGAVERSE_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `MANGAVERSE_CATALOG_CACHE_TTL_SECS` - Product list cache lifetime (default: 60)
//! - `MANGAVERSE_METRICS_INTERVAL_SECS` - Admin metrics refresh period (default: 10)
//! - `STRIPE_PUBLISHABLE_KEY` - Publishable key for card payments (required by checkout)
//! - `STRIPE_API_BASE` - Payment API base URL (default: `https://api.stripe.com`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_TOKEN_PATH: &str = ".mangaverse/token";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const PUBLISHABLE_KEY_PREFIX: &str = "pk_";
const MIN_PUBLISHABLE_KEY_LENGTH: usize = 20;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
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

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL of the shop API
    pub api_url: Url,
    /// File holding the persisted session token
    pub token_path: PathBuf,
    /// Timeout applied to every API request
    pub request_timeout: Duration,
    /// How long the product list stays cached
    pub catalog_cache_ttl: Duration,
    /// Admin dashboard refresh period
    pub metrics_interval: Duration,
    /// Hosted payment configuration
    pub payments: PaymentsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted payment service configuration.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Publishable key; checkout is unavailable without one
    pub publishable_key: Option<SecretString>,
    /// Payment API base URL
    pub api_base: Url,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field(
                "publishable_key",
                &self.publishable_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base.as_str())
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
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the publishable key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_url = env.url("MANGAVERSE_API_URL", None)?;
        let token_path = PathBuf::from(env.or_default("MANGAVERSE_TOKEN_PATH", DEFAULT_TOKEN_PATH));
        let request_timeout = env.seconds("MANGAVERSE_REQUEST_TIMEOUT_SECS", 15)?;
        let catalog_cache_ttl = env.seconds("MANGAVERSE_CATALOG_CACHE_TTL_SECS", 60)?;
        let metrics_interval = env.seconds("MANGAVERSE_METRICS_INTERVAL_SECS", 10)?;

        if metrics_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "MANGAVERSE_METRICS_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let publishable_key = env
            .optional("STRIPE_PUBLISHABLE_KEY")
            .map(|key| validate_publishable_key(&key, "STRIPE_PUBLISHABLE_KEY").map(|()| key))
            .transpose()?
            .map(SecretString::from);
        let payments = PaymentsConfig {
            publishable_key,
            api_base: env.url("STRIPE_API_BASE", Some(DEFAULT_STRIPE_API_BASE))?,
        };

        Ok(Self {
            api_url,
            token_path,
            request_timeout,
            catalog_cache_ttl,
            metrics_interval,
            payments,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `api_url` with every optional value
    /// defaulted. Used by tests and embedders.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `api_url` is not an http(s) URL.
    pub fn for_api(api_url: &Url) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| (key == "MANGAVERSE_API_URL").then(|| api_url.to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn url(&self, key: &str, default: Option<&str>) -> Result<Url, ConfigError> {
        let raw = match (self.optional(key), default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => return Err(ConfigError::MissingEnvVar(key.to_string())),
        };
        let url = Url::parse(raw.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url)
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.optional(key)
            .map_or(Ok(default), |raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .map(Duration::from_secs)
    }
}

/// Reject keys that are obviously not real publishable keys.
fn validate_publishable_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if !key.starts_with(PUBLISHABLE_KEY_PREFIX) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must start with '{PUBLISHABLE_KEY_PREFIX}' (never use a secret key here)"),
        ));
    }

    let lower = key.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    if key.len() < MIN_PUBLISHABLE_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_PUBLISHABLE_KEY_LENGTH} characters (got {})",
                key.len()
            ),
        ));
    }

    Ok(())
}

impl PaymentsConfig {
    /// The publishable key, if checkout is configured.
    #[must_use]
    pub fn publishable_key(&self) -> Option<&str> {
        self.publishable_key.as_ref().map(ExposeSecret::expose_secret)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "pk_test_51Hh2kLmN8qRsT4uVwX9yZ";

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MANGAVERSE_API_URL", "http://localhost:3000")]).unwrap();

        assert_eq!(config.api_url.as_str(), "http://localhost:3000/");
        assert_eq!(config.token_path, PathBuf::from(".mangaverse/token"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.metrics_interval, Duration::from_secs(10));
        assert_eq!(config.payments.api_base.as_str(), "https://api.stripe.com/");
        assert!(config.payments.publishable_key().is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "MANGAVERSE_API_URL"));
    }

    #[test]
    fn test_invalid_api_url() {
        let err = load(&[("MANGAVERSE_API_URL", "ftp://files.example")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = load(&[("MANGAVERSE_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_invalid_interval() {
        let err = load(&[
            ("MANGAVERSE_API_URL", "http://localhost:3000"),
            ("MANGAVERSE_METRICS_INTERVAL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));

        let err = load(&[
            ("MANGAVERSE_API_URL", "http://localhost:3000"),
            ("MANGAVERSE_REQUEST_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_publishable_key_validation() {
        let config = load(&[
            ("MANGAVERSE_API_URL", "http://localhost:3000"),
            ("STRIPE_PUBLISHABLE_KEY", KEY),
        ])
        .unwrap();
        assert_eq!(config.payments.publishable_key(), Some(KEY));

        for bad in ["sk_live_51Hh2kLmN8qRsT4uVwX9yZ", "pk_test_your_key_here_please", "pk_short"] {
            let err = load(&[
                ("MANGAVERSE_API_URL", "http://localhost:3000"),
                ("STRIPE_PUBLISHABLE_KEY", bad),
            ])
            .unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret(_, _)), "{bad}");
        }
    }

    #[test]
    fn test_payments_debug_redacts_key() {
        let config = load(&[
            ("MANGAVERSE_API_URL", "http://localhost:3000"),
            ("STRIPE_PUBLISHABLE_KEY", KEY),
        ])
        .unwrap();

        let debug_output = format!("{:?}", config.payments);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("api.stripe.com"));
        assert!(!debug_output.contains(KEY));
    }
}
