//! Configuration management for the playlist snapshot CLI.
//!
//! This module loads configuration values from environment variables and a
//! `.env` file in the local data directory, and turns them into a typed
//! [`Settings`] value. Nothing else in the crate reads the environment.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use reqwest::Url;

use crate::{error::ConfigError, types::AuthStrategy};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/callback";
pub const DEFAULT_SCOPE: &str = "playlist-read-private";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_CALLBACK_PORT: u16 = 8000;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_PAGES: usize = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the directory if it doesn't exist and loads variables from
/// `spotsnap/.env` under the platform-specific local data directory:
/// - Linux: `~/.local/share/spotsnap/.env`
/// - macOS: `~/Library/Application Support/spotsnap/.env`
/// - Windows: `%LOCALAPPDATA%/spotsnap/.env`
///
/// Variables already present in the process environment take precedence.
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or the `.env`
/// file exists but cannot be parsed. A missing file is not an error, since
/// everything may as well come from the process environment.
pub async fn load_env() -> Result<(), String> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

/// Location of the `.env` file read by [`load_env`].
pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotsnap/.env");
    path
}

/// Everything the authorization flow needs.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    /// Loopback port the callback listener binds.
    pub callback_port: u16,
    /// Path the callback listener serves, taken from the redirect URI.
    pub callback_path: String,
    /// How long to wait for the redirect before giving up.
    pub timeout: Duration,
    pub strategy: AuthStrategy,
}

/// Runtime configuration for the whole application.
#[derive(Debug, Clone)]
pub struct Settings {
    pub auth: AuthSettings,
    /// Base URL of the Web API, e.g. `https://api.spotify.com/v1`.
    pub api_url: String,
    /// Upper bound on pages fetched by a single pagination walk.
    pub max_pages: usize,
    /// Number of playlists whose tracks are fetched at the same time.
    pub concurrency: usize,
    /// `tracing` filter directive for diagnostic output.
    pub log_filter: String,
}

impl Settings {
    /// Builds settings from the process environment.
    ///
    /// Call [`load_env`] first so values from the `.env` file are visible.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `SPOTIFY_CLIENT_ID` or
    /// `SPOTIFY_CLIENT_SECRET` is not set, and [`ConfigError::Invalid`] when a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_ID"))?;
        let client_secret =
            get("SPOTIFY_CLIENT_SECRET").ok_or(ConfigError::Missing("SPOTIFY_CLIENT_SECRET"))?;
        let redirect_uri =
            get("SPOTIFY_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        let redirect = Url::parse(&redirect_uri).map_err(|e| ConfigError::Invalid {
            key: "SPOTIFY_REDIRECT_URI",
            value: redirect_uri.clone(),
            reason: e.to_string(),
        })?;

        let callback_port = match get("SPOTSNAP_CALLBACK_PORT") {
            Some(value) => parse_value("SPOTSNAP_CALLBACK_PORT", value)?,
            None => redirect.port().unwrap_or(DEFAULT_CALLBACK_PORT),
        };

        let callback_path = match redirect.path() {
            "" | "/" => "/callback".to_string(),
            path => path.to_string(),
        };

        let timeout_secs: u64 = match get("SPOTSNAP_AUTH_TIMEOUT_SECS") {
            Some(value) => parse_value("SPOTSNAP_AUTH_TIMEOUT_SECS", value)?,
            None => DEFAULT_AUTH_TIMEOUT_SECS,
        };

        let strategy = match get("SPOTSNAP_AUTH_STRATEGY") {
            Some(value) => {
                value
                    .parse::<AuthStrategy>()
                    .map_err(|reason| ConfigError::Invalid {
                        key: "SPOTSNAP_AUTH_STRATEGY",
                        value,
                        reason,
                    })?
            }
            None => AuthStrategy::default(),
        };

        let max_pages: usize = match get("SPOTSNAP_MAX_PAGES") {
            Some(value) => parse_positive("SPOTSNAP_MAX_PAGES", value)?,
            None => DEFAULT_MAX_PAGES,
        };

        let concurrency: usize = match get("SPOTSNAP_CONCURRENCY") {
            Some(value) => parse_positive("SPOTSNAP_CONCURRENCY", value)?,
            None => DEFAULT_CONCURRENCY,
        };

        Ok(Settings {
            auth: AuthSettings {
                client_id,
                client_secret,
                redirect_uri,
                scope: get("SPOTIFY_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
                auth_url: get("SPOTIFY_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
                token_url: get("SPOTIFY_TOKEN_URL")
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                callback_port,
                callback_path,
                timeout: Duration::from_secs(timeout_secs),
                strategy,
            },
            api_url: get("SPOTIFY_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_pages,
            concurrency,
            log_filter: get("SPOTSNAP_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn parse_value<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_positive(key: &'static str, value: String) -> Result<usize, ConfigError> {
    let parsed: usize = parse_value(key, value.clone())?;
    if parsed == 0 {
        return Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_credentials() {
        let settings = Settings::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(settings.auth.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(settings.auth.callback_port, 8000);
        assert_eq!(settings.auth.callback_path, "/callback");
        assert_eq!(settings.auth.timeout, Duration::from_secs(120));
        assert_eq!(settings.auth.strategy, AuthStrategy::Automatic);
        assert_eq!(settings.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_port_and_path_follow_redirect_uri() {
        let settings = Settings::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_REDIRECT_URI", "http://localhost:8888/auth/done"),
        ]))
        .unwrap();

        assert_eq!(settings.auth.callback_port, 8888);
        assert_eq!(settings.auth.callback_path, "/auth/done");
    }

    #[test]
    fn test_explicit_port_overrides_redirect_uri() {
        let settings = Settings::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTSNAP_CALLBACK_PORT", "9090"),
            ("SPOTSNAP_AUTH_STRATEGY", "manual"),
        ]))
        .unwrap();

        assert_eq!(settings.auth.callback_port, 9090);
        assert_eq!(settings.auth.strategy, AuthStrategy::Manual);
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let err = Settings::from_lookup(lookup(&[("SPOTIFY_CLIENT_ID", "id")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SPOTIFY_CLIENT_SECRET")));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Settings::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTSNAP_MAX_PAGES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "SPOTSNAP_MAX_PAGES",
                ..
            }
        ));

        let err = Settings::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTSNAP_AUTH_STRATEGY", "telepathy"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "SPOTSNAP_AUTH_STRATEGY",
                ..
            }
        ));
    }
}
