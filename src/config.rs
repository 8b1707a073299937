use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env as std_env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10000;
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://app.midtrans.com/snap/v1";
const DEFAULT_PLATFORM_API_VERSION: &str = "2024-07";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REDIRECT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_REDIRECT_CACHE_TTL_SECS: u64 = 86_400;

/// Bare environment variables accepted on top of the `APP__*` namespace.
const LEGACY_ENV_KEYS: [(&str, &str); 5] = [
    ("CREDENTIAL", "gateway_server_key"),
    ("PLATFORM_URL", "platform_url"),
    ("PLATFORM_TOKEN", "platform_token"),
    ("STOREFRONT_URL", "storefront_url"),
    ("PORT", "port"),
];

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Shared secret used to authenticate against the payment gateway
    #[validate(length(min = 1))]
    pub gateway_server_key: String,

    /// Base URL of the gateway's transaction API
    #[serde(default = "default_gateway_base_url")]
    #[validate(url)]
    pub gateway_base_url: String,

    /// Commerce platform shop URL or bare domain (e.g. `my-store.myshopify.com`)
    #[serde(default)]
    pub platform_url: Option<String>,

    /// Commerce platform admin access token
    #[serde(default)]
    pub platform_token: Option<String>,

    #[serde(default = "default_platform_api_version")]
    pub platform_api_version: String,

    /// Public storefront URL, used for product links and the finish callback
    #[serde(default)]
    pub storefront_url: Option<String>,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Outbound HTTP request timeout (seconds)
    #[serde(default = "default_http_timeout_secs")]
    #[validate(custom = "validate_non_zero_secs")]
    pub http_timeout_secs: u64,

    /// Maximum number of payment links kept in memory
    #[serde(default = "default_redirect_cache_capacity")]
    #[validate(custom = "validate_cache_capacity")]
    pub redirect_cache_capacity: usize,

    /// Lifetime of a cached payment link (seconds)
    #[serde(default = "default_redirect_cache_ttl_secs")]
    #[validate(custom = "validate_non_zero_secs")]
    pub redirect_cache_ttl_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the gateway key.
    pub fn new(gateway_server_key: impl Into<String>) -> Self {
        Self {
            environment: default_environment(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            gateway_server_key: gateway_server_key.into(),
            gateway_base_url: default_gateway_base_url(),
            platform_url: None,
            platform_token: None,
            platform_api_version: default_platform_api_version(),
            storefront_url: None,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            http_timeout_secs: default_http_timeout_secs(),
            redirect_cache_capacity: default_redirect_cache_capacity(),
            redirect_cache_ttl_secs: default_redirect_cache_ttl_secs(),
        }
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

    /// Platform base URL with a scheme, without a trailing slash.
    pub fn platform_base_url(&self) -> Option<String> {
        self.platform_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(with_https_scheme)
    }

    pub fn storefront_base_url(&self) -> Option<String> {
        self.storefront_url
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(with_https_scheme)
    }

    /// Platform relay is enabled only when both URL and token are present.
    pub fn platform_enabled(&self) -> bool {
        self.platform_base_url().is_some()
            && self
                .platform_token
                .as_deref()
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn redirect_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.redirect_cache_ttl_secs)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
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

        let has_url = self.platform_base_url().is_some();
        let has_token = self
            .platform_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if has_url != has_token {
            let mut err = ValidationError::new("platform_credentials_incomplete");
            err.message =
                Some("PLATFORM_URL and PLATFORM_TOKEN must be provided together".into());
            errors.add(
                if has_url {
                    "platform_token"
                } else {
                    "platform_url"
                },
                err,
            );
        }

        if let Some(base) = self.platform_base_url() {
            if url::Url::parse(&base).is_err() {
                let mut err = ValidationError::new("platform_url");
                err.message = Some("PLATFORM_URL is not a valid URL or domain".into());
                errors.add("platform_url", err);
            }
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

fn with_https_scheme(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}

fn default_platform_api_version() -> String {
    DEFAULT_PLATFORM_API_VERSION.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_redirect_cache_capacity() -> usize {
    DEFAULT_REDIRECT_CACHE_CAPACITY
}

fn default_redirect_cache_ttl_secs() -> u64 {
    DEFAULT_REDIRECT_CACHE_TTL_SECS
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

fn validate_non_zero_secs(secs: u64) -> Result<(), ValidationError> {
    if secs == 0 {
        let mut err = ValidationError::new("duration_secs");
        err.message = Some("Durations must be at least one second".into());
        return Err(err);
    }
    Ok(())
}

fn validate_cache_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("redirect_cache_capacity");
        err.message = Some("redirect_cache_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("payment_bridge={},tower_http=debug", level);
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
/// 4. Bare variables: CREDENTIAL, PLATFORM_URL, PLATFORM_TOKEN, STOREFRONT_URL, PORT
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let _ = dotenvy::dotenv();
    let base_dir = std_env::var("CONFIG_ROOT").unwrap_or_else(|_| ".".to_string());
    load_config_from(Path::new(&base_dir))
}

/// Same as [`load_config`] but reads the `config/` directory under `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = std_env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);
    let config_dir = base_dir.join(CONFIG_DIR);

    let mut builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    for (var, key) in LEGACY_ENV_KEYS {
        if let Ok(value) = std_env::var(var) {
            if !value.trim().is_empty() {
                builder = builder.set_override(key, value)?;
            }
        }
    }

    let config = builder.build()?;

    if config.get_string("gateway_server_key").is_err() {
        error!("Gateway credential is not configured. Set CREDENTIAL or APP__GATEWAY_SERVER_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "gateway_server_key is required but not configured".into(),
        )));
    }

    let cfg: AppConfig = config.try_deserialize()?;

    cfg.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    cfg.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        environment = %cfg.environment,
        platform_enabled = cfg.platform_enabled(),
        "Configuration loaded"
    );

    Ok(cfg)
}
