//! Configuration management and environment variable loading

use crate::{RelayError, Result};
use std::env;
use std::path::Path;

/// Default location of the ADK server
pub const DEFAULT_ADK_BASE_URL: &str = "http://localhost:8000";

/// Default address the relay listens on (and the terminal client talks to)
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";

/// Load environment variables from .env file
///
/// Safe to call multiple times; a missing file is not an error.
///
/// # Example
///
/// ```no_run
/// use relay_core::load_env;
///
/// load_env().ok();
/// let base = std::env::var("ADK_BASE_URL").unwrap_or_default();
/// ```
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(RelayError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::debug!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(RelayError::config(format!(
            "Failed to load .env file: {}",
            e
        ))),
    }
}

/// Load environment variables from a specific file
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::info!("Loaded environment from: {}", path.as_ref().display());
            Ok(())
        }
        Err(e) => Err(RelayError::config(format!(
            "Failed to load {} environment file: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Get a comma separated environment variable as a list, skipping blanks
pub fn get_env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Settings shared by the relay server and the terminal client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Base URL of the external ADK server
    pub adk_base_url: String,
    /// Host the proxy binds to
    pub host: String,
    /// Port the proxy binds to
    pub port: u16,
    /// Plain auth tokens accepted by the proxy; empty means guest mode
    pub auth_tokens: Vec<String>,
    /// Expose the scrubbed log stream at `/logs`
    pub logs_enabled: bool,
    /// Where the terminal client reaches the proxy
    pub proxy_url: String,
    /// Token the terminal client presents to the proxy
    pub client_token: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            adk_base_url: DEFAULT_ADK_BASE_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            auth_tokens: Vec::new(),
            logs_enabled: false,
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            client_token: None,
        }
    }
}

impl RelayConfig {
    /// Build from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            adk_base_url: get_env_or("ADK_BASE_URL", &defaults.adk_base_url),
            host: get_env_or("RELAY_HOST", &defaults.host),
            port: get_env_int("RELAY_PORT", defaults.port),
            auth_tokens: get_env_list("RELAY_AUTH_TOKENS"),
            logs_enabled: get_env_bool("RELAY_LOGS_ENABLED", defaults.logs_enabled),
            proxy_url: get_env_or("RELAY_PROXY_URL", &defaults.proxy_url),
            client_token: env::var("RELAY_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    /// Reject values that would make every request fail later
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("ADK_BASE_URL", &self.adk_base_url), ("RELAY_PROXY_URL", &self.proxy_url)] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(RelayError::config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_get_env_or() {
        env::set_var("RELAY_TEST_STRING", "hello");
        assert_eq!(get_env_or("RELAY_TEST_STRING", "default"), "hello");
        assert_eq!(get_env_or("RELAY_TEST_NONEXISTENT", "default"), "default");
        env::remove_var("RELAY_TEST_STRING");
    }

    #[test]
    fn test_get_env_int() {
        env::set_var("RELAY_TEST_INT", "4100");
        assert_eq!(get_env_int("RELAY_TEST_INT", 0u16), 4100);
        assert_eq!(get_env_int("RELAY_TEST_INT_MISSING", 99u16), 99);
        env::remove_var("RELAY_TEST_INT");
    }

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.adk_base_url, "http://localhost:8000");
        assert!(config.auth_tokens.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = RelayConfig {
            adk_base_url: "localhost:8000".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
