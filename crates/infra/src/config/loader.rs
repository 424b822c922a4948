//! Configuration loader
//!
//! Loads the identity-provider configuration from environment variables or
//! files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load a single provider from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FLOWERY_OIDC_PROVIDER_KEY`: Provider key (required)
//! - `FLOWERY_OIDC_AUTHORITY`: Issuer base URL (required)
//! - `FLOWERY_OIDC_CLIENT_ID`: OAuth client id (required)
//! - `FLOWERY_OIDC_CLIENT_SECRET`: Client secret for confidential clients
//! - `FLOWERY_OIDC_SCOPE`: Requested scopes
//! - `FLOWERY_OIDC_REDIRECT_URI`: Registered redirect URI
//! - `FLOWERY_OIDC_LOOPBACK_PORT`: Loopback callback port (`0` = ephemeral)
//! - `FLOWERY_OIDC_BROWSER_TIMEOUT`: Loopback wait timeout in seconds
//! - `FLOWERY_OIDC_DISPLAY_NAME`: Name shown to users
//! - `FLOWERY_OIDC_LOAD_TOKEN`: Restore a persisted session (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./flowery.{toml,json}` or `./config.{toml,json}` (current working
//!    directory)
//! 2. The same names in the parent and grandparent directories
//! 3. Relative to executable location

use std::path::{Path, PathBuf};

use flowery_domain::{Config, FloweryError, OidcProviderConfig, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["flowery.toml", "flowery.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FloweryError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A configured provider is missing a required field
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load a single-provider configuration from environment variables
///
/// # Errors
/// Returns `FloweryError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let provider_key = env_var("FLOWERY_OIDC_PROVIDER_KEY")?;
    let authority = env_var("FLOWERY_OIDC_AUTHORITY")?;
    let client_id = env_var("FLOWERY_OIDC_CLIENT_ID")?;

    let mut provider = OidcProviderConfig::new(provider_key, authority, client_id);
    provider.client_secret = env_opt("FLOWERY_OIDC_CLIENT_SECRET");
    provider.redirect_uri = env_opt("FLOWERY_OIDC_REDIRECT_URI");
    if let Some(scope) = env_opt("FLOWERY_OIDC_SCOPE") {
        provider.scope = scope;
    }
    if let Some(name) = env_opt("FLOWERY_OIDC_DISPLAY_NAME") {
        provider.display_name = name;
    }
    if let Some(port) = env_opt("FLOWERY_OIDC_LOOPBACK_PORT") {
        provider.loopback_port = port
            .parse::<u16>()
            .map_err(|e| FloweryError::Config(format!("Invalid loopback port: {}", e)))?;
    }
    if let Some(timeout) = env_opt("FLOWERY_OIDC_BROWSER_TIMEOUT") {
        let secs = timeout
            .parse::<u64>()
            .map_err(|e| FloweryError::Config(format!("Invalid browser timeout: {}", e)))?;
        provider.browser_timeout_seconds = Some(secs);
    }
    provider.load_token_from_storage = env_bool("FLOWERY_OIDC_LOAD_TOKEN", true);

    provider.validate()?;

    Ok(Config { providers: vec![provider], ..Config::default() })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `FloweryError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A provider entry fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FloweryError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            FloweryError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FloweryError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    for provider in &config.providers {
        provider.validate()?;
    }
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FloweryError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FloweryError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(FloweryError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(base: &Path) -> Vec<PathBuf> {
    ["", "..", "../.."]
        .iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| base.join(dir).join(name)))
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `FloweryError::Config` if the variable is not set or blank.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        FloweryError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Optional environment variable; blank values count as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
