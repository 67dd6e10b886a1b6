use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SHIPROCKET_BASE_URL: &str = "https://apiv2.shiprocket.in";
const DEFAULT_SMTP_HOST: &str = "smtp.zoho.in";
const DEFAULT_SMTP_PRIMARY_PORT: u16 = 465;
const DEFAULT_SMTP_FALLBACK_PORT: u16 = 587;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
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

    /// CORS: allow credentials
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

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Symbol used when amounts appear in customer-facing messages
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Store name printed on receipts and used as the mail sender name
    #[serde(default = "default_store_name")]
    pub store_name: String,

    // ========== Shipping (Shiprocket) ==========
    /// Register shipments with the carrier after an order commits
    #[serde(default)]
    pub shipping_enabled: bool,

    #[serde(default = "default_shiprocket_base_url")]
    pub shiprocket_base_url: String,

    #[serde(default)]
    pub shiprocket_email: Option<String>,

    #[serde(default)]
    pub shiprocket_password: Option<String>,

    #[serde(default = "default_pickup_location")]
    pub shiprocket_pickup_location: String,

    /// Package dimensions in centimetres
    #[serde(default = "default_package_length_cm")]
    pub package_length_cm: f64,
    #[serde(default = "default_package_breadth_cm")]
    pub package_breadth_cm: f64,
    #[serde(default = "default_package_height_cm")]
    pub package_height_cm: f64,

    /// Weight in kilograms used for variants without a recorded weight
    #[serde(default = "default_item_weight_kg")]
    #[validate(custom = "validate_positive_weight")]
    pub default_item_weight_kg: f64,

    /// Request timeout for carrier calls (seconds)
    #[serde(default = "default_shipping_timeout_secs")]
    pub shipping_timeout_secs: u64,

    // ========== Mail (SMTP) ==========
    /// Send receipts after an order commits
    #[serde(default)]
    pub mail_enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    /// Implicit TLS port tried first
    #[serde(default = "default_smtp_primary_port")]
    pub smtp_primary_port: u16,

    /// STARTTLS port tried once when the primary port fails
    #[serde(default = "default_smtp_fallback_port")]
    pub smtp_fallback_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    #[serde(default = "default_smtp_timeout_secs")]
    pub smtp_timeout_secs: u64,

    #[serde(default)]
    pub mail_from: Option<String>,

    /// Admin address copied (BCC) on every receipt
    #[serde(default)]
    pub mail_admin_bcc: Option<String>,

    // ========== Payments (Razorpay) ==========
    /// Key secret used to verify checkout signatures
    #[serde(default)]
    pub razorpay_key_secret: Option<String>,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything except the
    /// connection and listener settings.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
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
            event_channel_capacity: default_event_channel_capacity(),
            currency_symbol: default_currency_symbol(),
            store_name: default_store_name(),
            shipping_enabled: false,
            shiprocket_base_url: default_shiprocket_base_url(),
            shiprocket_email: None,
            shiprocket_password: None,
            shiprocket_pickup_location: default_pickup_location(),
            package_length_cm: default_package_length_cm(),
            package_breadth_cm: default_package_breadth_cm(),
            package_height_cm: default_package_height_cm(),
            default_item_weight_kg: default_item_weight_kg(),
            shipping_timeout_secs: default_shipping_timeout_secs(),
            mail_enabled: false,
            smtp_host: default_smtp_host(),
            smtp_primary_port: default_smtp_primary_port(),
            smtp_fallback_port: default_smtp_fallback_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_timeout_secs: default_smtp_timeout_secs(),
            mail_from: None,
            mail_admin_bcc: None,
            razorpay_key_secret: None,
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
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

    /// Carrier credentials, present only when shipping is switched on and both
    /// halves are configured.
    pub fn shiprocket_credentials(&self) -> Option<(String, String)> {
        if !self.shipping_enabled {
            return None;
        }
        match (&self.shiprocket_email, &self.shiprocket_password) {
            (Some(email), Some(password)) if !email.trim().is_empty() => {
                Some((email.clone(), password.clone()))
            }
            _ => None,
        }
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

        if self.shipping_enabled && self.shiprocket_credentials().is_none() {
            let mut err = ValidationError::new("shiprocket_credentials_required");
            err.message = Some(
                "Shipping is enabled but APP__SHIPROCKET_EMAIL / APP__SHIPROCKET_PASSWORD are missing"
                    .into(),
            );
            errors.add("shiprocket_email", err);
        }

        if self.mail_enabled {
            if self.smtp_username.is_none() || self.smtp_password.is_none() {
                let mut err = ValidationError::new("smtp_credentials_required");
                err.message =
                    Some("Mail is enabled but APP__SMTP_USERNAME / APP__SMTP_PASSWORD are missing".into());
                errors.add("smtp_username", err);
            }
            if self.mail_from.is_none() {
                let mut err = ValidationError::new("mail_from_required");
                err.message = Some("Mail is enabled but APP__MAIL_FROM is missing".into());
                errors.add("mail_from", err);
            }
        }

        if self.is_production() && self.razorpay_key_secret.is_none() {
            let mut err = ValidationError::new("razorpay_key_secret_required");
            err.message = Some("Set APP__RAZORPAY_KEY_SECRET in production".into());
            errors.add("razorpay_key_secret", err);
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

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

fn default_store_name() -> String {
    "U&I Naturals".to_string()
}

fn default_shiprocket_base_url() -> String {
    DEFAULT_SHIPROCKET_BASE_URL.to_string()
}

fn default_pickup_location() -> String {
    "Primary".to_string()
}

fn default_package_length_cm() -> f64 {
    15.0
}
fn default_package_breadth_cm() -> f64 {
    10.0
}
fn default_package_height_cm() -> f64 {
    10.0
}

fn default_item_weight_kg() -> f64 {
    0.5
}

fn default_shipping_timeout_secs() -> u64 {
    15
}

fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}
fn default_smtp_primary_port() -> u16 {
    DEFAULT_SMTP_PRIMARY_PORT
}
fn default_smtp_fallback_port() -> u16 {
    DEFAULT_SMTP_FALLBACK_PORT
}
fn default_smtp_timeout_secs() -> u64 {
    20
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

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive_weight(weight: f64) -> Result<(), ValidationError> {
    if !weight.is_finite() || weight <= 0.0 {
        let mut err = ValidationError::new("default_item_weight_kg");
        err.message = Some("default_item_weight_kg must be a positive number".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("uni_naturals_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "mysql://root@localhost:3306/uni_naturals")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration consistency validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
