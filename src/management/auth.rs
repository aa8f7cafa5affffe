use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::Mutex;

use crate::{error::AuthError, spotify::auth::TokenEndpoint, types::Token, warning};

struct TokenSlot {
    token: Token,
    /// Number of refresh attempts completed so far.
    epoch: u64,
    /// Outcome of the latest refresh if it failed.
    failure: Option<String>,
}

/// Owns the token bundle of an authenticated session and refreshes it on
/// demand.
///
/// Refreshing is single-flight: callers queue on one lock, the first caller
/// that finds the token expired performs the refresh, and every caller that
/// was already waiting observes that refresh's outcome instead of starting
/// another one.
pub struct TokenManager {
    endpoint: Arc<dyn TokenEndpoint>,
    slot: Mutex<TokenSlot>,
    epoch: AtomicU64,
    path: Option<PathBuf>,
}

impl TokenManager {
    pub fn new(token: Token, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        TokenManager {
            endpoint,
            slot: Mutex::new(TokenSlot {
                token,
                epoch: 0,
                failure: None,
            }),
            epoch: AtomicU64::new(0),
            path: None,
        }
    }

    /// Persists the token to `path` whenever it is refreshed.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Loads the token cached by a previous run.
    pub async fn load(endpoint: Arc<dyn TokenEndpoint>) -> Result<Self, String> {
        Self::load_from(Self::token_path(), endpoint).await
    }

    pub async fn load_from(
        path: impl Into<PathBuf>,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Result<Self, String> {
        let path = path.into();
        let content = async_fs::read_to_string(&path)
            .await
            .map_err(|e| e.to_string())?;
        let token: Token = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self::new(token, endpoint).with_cache_path(path))
    }

    /// Writes the current token to the cache path, if one is set.
    pub async fn persist(&self) -> Result<(), String> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let slot = self.slot.lock().await;
        write_token(path, &slot.token).await
    }

    /// Returns a token that is not expired, refreshing it first if needed.
    pub async fn ensure_fresh_token(&self) -> Result<Token, AuthError> {
        let seen_epoch = self.epoch.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if !slot.token.is_expired() {
            return Ok(slot.token.clone());
        }

        // A refresh finished while we were queued; share its failure rather
        // than hammering the endpoint again.
        if slot.epoch != seen_epoch {
            if let Some(reason) = &slot.failure {
                return Err(AuthError::TokenRefresh(reason.clone()));
            }
        }

        tracing::debug!("access token expired, refreshing");
        let result = self.endpoint.refresh(&slot.token.refresh_token).await;
        slot.epoch += 1;

        let outcome = match result {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_empty() {
                    fresh.refresh_token = slot.token.refresh_token.clone();
                }
                slot.token = fresh;
                slot.failure = None;
                if let Some(path) = &self.path {
                    if let Err(e) = write_token(path, &slot.token).await {
                        warning!("Failed to save refreshed token: {}", e);
                    }
                }
                Ok(slot.token.clone())
            }
            Err(e) => {
                let reason = match e {
                    AuthError::TokenRefresh(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(%reason, "token refresh failed");
                slot.failure = Some(reason.clone());
                Err(AuthError::TokenRefresh(reason))
            }
        };

        self.epoch.store(slot.epoch, Ordering::Release);
        outcome
    }

    /// Marks the token as expired after the service rejected it before its
    /// stated expiry, so the next caller refreshes it.
    ///
    /// Only the rejected token is expired. When several requests fail with the
    /// same stale token, the first refresh replaces it and later calls leave
    /// the refreshed token alone, so they all share that one refresh.
    ///
    /// # Arguments
    ///
    /// * `rejected_access_token` - The access token the failed request carried
    ///
    /// # Returns
    ///
    /// `true` if the current token was the rejected one and is now expired.
    ///
    /// # Example
    ///
    /// ```rust
    /// let token = tokens.ensure_fresh_token().await?;
    /// // ... request answered with 401 Unauthorized
    /// tokens.expire_if(&token.access_token).await;
    /// let token = tokens.ensure_fresh_token().await?;
    /// ```
    pub async fn expire_if(&self, rejected_access_token: &str) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.token.access_token != rejected_access_token {
            return false;
        }
        slot.token.expires_at = 0;
        true
    }

    /// Returns a copy of the current token without checking its expiry.
    ///
    /// Use [`TokenManager::ensure_fresh_token`] before making a request; this
    /// is for inspecting what is cached.
    pub async fn current_token(&self) -> Token {
        self.slot.lock().await.token.clone()
    }

    pub fn token_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("spotsnap/cache/token.json");
        path
    }
}

async fn write_token(path: &Path, token: &Token) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    let json = serde_json::to_string_pretty(token).map_err(|e| e.to_string())?;
    async_fs::write(path, json).await.map_err(|e| e.to_string())
}
