use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::money::Currency;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com";
const DEFAULT_PAYMENT_CURRENCY: &str = "INR";
const DEFAULT_SESSION_COOKIE: &str = "coursepay_session";
const RAZORPAY_TEST_KEY_PREFIX: &str = "rzp_test_";
const DEV_DEFAULT_SESSION_SECRET: &str =
    "development_only_session_secret_do_not_ship_7f3a9c1e5b2d4086";

/// A secret that never shows up in `Debug` output or logs.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials (session cookies)
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// HS256 key for session tokens
    #[validate(custom = "validate_session_secret")]
    pub session_secret: String,

    /// Expected `iss` claim
    #[serde(default = "default_session_issuer")]
    pub session_issuer: String,

    /// Expected `aud` claim
    #[serde(default = "default_session_audience")]
    pub session_audience: String,

    /// Cookie consulted when no bearer token is present
    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,

    /// Public key id, returned to the browser checkout widget
    #[validate(length(min = 1, message = "razorpay_key_id must not be empty"))]
    pub razorpay_key_id: String,

    /// Shared secret for the orders API and payment signatures
    pub razorpay_key_secret: SecretString,

    #[serde(default = "default_razorpay_api_base")]
    pub razorpay_api_base: String,

    /// ISO-4217 code every order is created in
    #[serde(default = "default_payment_currency")]
    #[validate(custom = "validate_payment_currency")]
    pub payment_currency: String,

    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// Permit `rzp_test_` keys outside development
    #[serde(default)]
    pub allow_test_keys: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the
    /// connection, session and gateway credentials.
    pub fn new(
        database_url: String,
        session_secret: String,
        razorpay_key_id: String,
        razorpay_key_secret: String,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            host: "127.0.0.1".to_string(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            session_secret,
            session_issuer: default_session_issuer(),
            session_audience: default_session_audience(),
            session_cookie_name: default_session_cookie_name(),
            razorpay_key_id,
            razorpay_key_secret: SecretString::new(razorpay_key_secret),
            razorpay_api_base: default_razorpay_api_base(),
            payment_currency: default_payment_currency(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            allow_test_keys: false,
            max_body_size: default_max_body_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Currency all orders are created in.
    pub fn currency(&self) -> Result<Currency, ValidationError> {
        validate_payment_currency(&self.payment_currency)?;
        Currency::from_code(&self.payment_currency).ok_or_else(|| {
            let mut err = ValidationError::new("payment_currency");
            err.message = Some("Unsupported payment currency".into());
            err
        })
    }

    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway_timeout_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.session_secret.trim() == DEV_DEFAULT_SESSION_SECRET {
            let mut err = ValidationError::new("session_secret_default_dev");
            err.message = Some(
                "The bundled development session secret must not be used outside development. Set APP__SESSION_SECRET."
                    .into(),
            );
            errors.add("session_secret", err);
        }

        if self.razorpay_key_secret.expose().trim().is_empty() {
            let mut err = ValidationError::new("razorpay_key_secret");
            err.message = Some("razorpay_key_secret must not be empty".into());
            errors.add("razorpay_key_secret", err);
        }

        if !self.is_development()
            && !self.allow_test_keys
            && self.razorpay_key_id.starts_with(RAZORPAY_TEST_KEY_PREFIX)
        {
            let mut err = ValidationError::new("razorpay_test_key");
            err.message = Some(
                "Razorpay test keys are only accepted in development unless APP__ALLOW_TEST_KEYS=true"
                    .into(),
            );
            errors.add("razorpay_key_id", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_session_issuer() -> String {
    "coursepay".to_string()
}

fn default_session_audience() -> String {
    "coursepay-web".to_string()
}

fn default_session_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_razorpay_api_base() -> String {
    DEFAULT_RAZORPAY_API_BASE.to_string()
}

fn default_payment_currency() -> String {
    DEFAULT_PAYMENT_CURRENCY.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    15
}

fn default_max_body_size() -> usize {
    64 * 1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_session_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 32 {
        let mut err = ValidationError::new("session_secret");
        err.message = Some("Session secret must be at least 32 characters".into());
        return Err(err);
    }

    const DISALLOWED: [&str; 3] = ["CHANGE_THIS_SECRET_IN_PRODUCTION", "your-secret-key", "secret"];
    if DISALLOWED
        .iter()
        .any(|&bad| trimmed.eq_ignore_ascii_case(bad))
    {
        let mut err = ValidationError::new("session_secret");
        err.message = Some("Session secret must be overridden with a random value".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("session_secret");
            err.message = Some("Session secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    Ok(())
}

fn validate_payment_currency(code: &str) -> Result<(), ValidationError> {
    let well_formed = code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase());
    if well_formed && Currency::from_code(code).is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("payment_currency");
        err.message = Some("Must be a three-letter uppercase ISO-4217 code".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("coursepay_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let base = tracing_subscriber::registry().with(EnvFilter::new(filter_directive));
    if json {
        let _ = base.with(fmt::layer().json()).try_init();
    } else {
        let _ = base.with(fmt::layer()).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Docker config (config/docker.toml) if DOCKER env var is set
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    // session_secret and the Razorpay credentials have no defaults.
    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://coursepay.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false));

    if env::var("DOCKER").is_ok() {
        info!("Docker environment detected");
        builder = builder.add_source(File::from(config_dir.join("docker")).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    for key in ["session_secret", "razorpay_key_id", "razorpay_key_secret"] {
        if config.get_string(key).is_err() {
            error!(
                "{} is not configured. Set APP__{} or add it to {}/{}.toml",
                key,
                key.to_ascii_uppercase(),
                config_dir.display(),
                run_env
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(key.into())));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
