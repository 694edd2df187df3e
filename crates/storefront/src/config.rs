//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VELOUR_BACKEND_URL` - Base URL of the hosted backend project
//! - `VELOUR_BACKEND_ANON_KEY` - Public (anon) API key for the backend
//!
//! ## Optional
//! - `VELOUR_REQUEST_TIMEOUT_SECS` - Per-request timeout for backend calls (default: 10)
//! - `VELOUR_STATE_DIR` - Directory for locally persisted session state (default: .velour)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_DIR: &str = ".velour";
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

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend project.
    pub backend_url: Url,
    /// Anon API key sent with every request. Row-level security on the
    /// backend decides what it may touch; it is still kept out of logs.
    pub anon_key: SecretString,
    /// Timeout applied to each backend call.
    pub request_timeout: Duration,
    /// Directory holding the persisted session snapshot.
    pub state_dir: PathBuf,
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the anon key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend_url = parse_backend_url("VELOUR_BACKEND_URL", &get_required_env("VELOUR_BACKEND_URL")?)?;
        let anon_key = get_validated_secret("VELOUR_BACKEND_ANON_KEY")?;
        let request_timeout = parse_timeout_secs(
            "VELOUR_REQUEST_TIMEOUT_SECS",
            &get_env_or_default(
                "VELOUR_REQUEST_TIMEOUT_SECS",
                &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
            ),
        )?;
        let state_dir = PathBuf::from(get_env_or_default("VELOUR_STATE_DIR", DEFAULT_STATE_DIR));

        Ok(Self {
            backend_url,
            anon_key,
            request_timeout,
            state_dir,
        })
    }

    /// Build a config directly, for tests and embedders that do not use the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `backend_url` does not parse as an absolute URL.
    pub fn new(
        backend_url: &str,
        anon_key: SecretString,
        request_timeout: Duration,
        state_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            backend_url: parse_backend_url("backend_url", backend_url)?,
            anon_key,
            request_timeout,
            state_dir,
        })
    }

    /// Path of the persisted session snapshot file.
    #[must_use]
    pub fn session_state_path(&self) -> PathBuf {
        self.state_dir.join("velour-session.json")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and normalize the backend base URL (trailing slash stripped).
fn parse_backend_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let trimmed = value.trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a timeout in whole seconds.
fn parse_timeout_secs(var_name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real anon keys are JWTs with high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the backend project."
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
