//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The collaborator base URLs are optional:
//! when one is absent the binary wires the matching in-memory adapter instead,
//! which is the local development mode.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,

    // --- External collaborator endpoints (None => in-memory adapter) ---
    pub identity_api_url: Option<String>,
    pub document_api_url: Option<String>,
    pub storage_api_url: Option<String>,
    pub functions_api_url: Option<String>,
    pub checkout_session_url: Option<String>,
    /// Base of the hosted payment page the browser is redirected to.
    pub checkout_redirect_base: String,

    // --- Policy ---
    /// Email addresses allowed into the admin fulfillment workflow.
    pub admin_emails: Vec<String>,
    /// Ordered candidate names for the processing-complete notification.
    pub processing_notification_functions: Vec<String>,

    // --- Limits ---
    /// Object-storage size ceiling; processed uploads are compressed under it.
    pub storage_max_object_bytes: usize,
    /// Per-session byte budget for the persisted wizard state.
    pub wizard_cache_quota_bytes: usize,

    /// Development-only CORS workaround endpoint.
    pub enable_upload_proxy: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Collaborator Endpoints (all optional) ---
        let identity_api_url = std::env::var("IDENTITY_API_URL").ok();
        let document_api_url = std::env::var("DOCUMENT_API_URL").ok();
        let storage_api_url = std::env::var("STORAGE_API_URL").ok();
        let functions_api_url = std::env::var("FUNCTIONS_API_URL").ok();
        let checkout_session_url = std::env::var("CHECKOUT_SESSION_URL").ok();
        let checkout_redirect_base = std::env::var("CHECKOUT_REDIRECT_BASE")
            .unwrap_or_else(|_| "https://checkout.example.com/pay".to_string());

        // --- Load Policy Settings ---
        let admin_emails = parse_list(std::env::var("ADMIN_EMAILS").ok());
        let mut processing_notification_functions =
            parse_list(std::env::var("PROCESSING_NOTIFICATION_FUNCTIONS").ok());
        if processing_notification_functions.is_empty() {
            processing_notification_functions = vec![
                "sendProcessingCompleteNotification".to_string(),
                "sendProcessedNotification".to_string(),
            ];
        }

        // --- Load Limits ---
        let storage_max_object_bytes = parse_usize("STORAGE_MAX_OBJECT_BYTES", 5 * 1024 * 1024)?;
        let wizard_cache_quota_bytes = parse_usize("WIZARD_CACHE_QUOTA_BYTES", 256 * 1024)?;

        let enable_upload_proxy = std::env::var("ENABLE_UPLOAD_PROXY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            bind_address,
            log_level,
            identity_api_url,
            document_api_url,
            storage_api_url,
            functions_api_url,
            checkout_session_url,
            checkout_redirect_base,
            admin_emails,
            processing_notification_functions,
            storage_max_object_bytes,
            wizard_cache_quota_bytes,
            enable_upload_proxy,
        })
    }
}

fn parse_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_usize(var: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
