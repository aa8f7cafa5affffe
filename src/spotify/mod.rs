//! # Spotify Integration Module
//!
//! The integration layer between spotsnap and the Spotify Web API: the
//! authorization-code flow, the token lifecycle, the paginated playlist
//! endpoints and the snapshot aggregation built on top of them.
//!
//! ## Architecture
//!
//! ```text
//! CLI Layer
//!          ↓
//! Spotify Integration Layer
//!     ├── auth     (authorization-code flow, token endpoint)
//!     ├── client   (authenticated Web API client, retry policy)
//!     └── library  (playlist enumeration, snapshot building)
//!          ↓
//! Pagination (cursor walking with a page bound)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Authentication Strategy
//!
//! The application is a confidential client: the authorization code is
//! exchanged with the client id and secret sent as HTTP basic auth. A random
//! state nonce travels through the redirect and is compared before the code
//! is exchanged. The code reaches the application either through the
//! loopback [`crate::server::CallbackListener`] or by the user pasting the
//! redirected URL, see [`crate::types::AuthStrategy`].
//!
//! Tokens are cached in the local data directory and refreshed on demand by
//! [`crate::management::TokenManager`]; concurrent requests share a single
//! refresh.
//!
//! ## API Coverage
//!
//! - `GET /me` - Current user profile
//! - `GET /me/playlists` - Playlists of the current user
//! - `GET /users/{user_id}/playlists` - Public playlists of a user
//! - `GET /playlists/{playlist_id}/tracks` - Items of a playlist
//! - `POST /api/token` - Code exchange and token refresh
//!
//! ## Error Handling
//!
//! - 429 responses are retried after `Retry-After` (up to two minutes)
//! - 502/503 responses are retried with a short backoff
//! - 401 responses force a token refresh
//! - Attempts per request are bounded; the final failure is returned as
//!   [`crate::error::ServiceError`]

pub mod auth;
pub mod client;
pub mod library;

use std::sync::Arc;

use crate::{
    config::Settings,
    error::AuthError,
    info,
    management::TokenManager,
    spotify::{
        auth::{AuthCoordinator, SpotifyTokenEndpoint, TokenEndpoint},
        client::SpotifyClient,
    },
    success, warning,
};

/// Runs the authorization flow, caches the token and returns a client.
///
/// # Arguments
///
/// * `settings` - Application settings; `settings.auth` drives the flow
///
/// # Returns
///
/// A [`SpotifyClient`] holding the new token, or the [`AuthError`] that ended
/// the flow.
pub async fn authenticate(settings: &Settings) -> Result<SpotifyClient, AuthError> {
    authorize(settings, token_endpoint(settings)).await
}

/// Returns a client backed by the cached token, authorizing first when no
/// usable token is cached.
pub async fn connect(settings: &Settings) -> Result<SpotifyClient, AuthError> {
    let endpoint = token_endpoint(settings);

    match TokenManager::load(Arc::clone(&endpoint)).await {
        Ok(tokens) => {
            let client = SpotifyClient::new(settings.api_url.clone(), Arc::new(tokens));
            match client.tokens().ensure_fresh_token().await {
                Ok(_) => Ok(client),
                Err(e) => {
                    warning!("Cached token is no longer usable: {}", e);
                    authorize(settings, endpoint).await
                }
            }
        }
        Err(_) => {
            info!("No cached token found, starting authorization.");
            authorize(settings, endpoint).await
        }
    }
}

fn token_endpoint(settings: &Settings) -> Arc<dyn TokenEndpoint> {
    Arc::new(SpotifyTokenEndpoint::new(&settings.auth))
}

/// The code exchange and every later refresh go through the same endpoint.
async fn authorize(
    settings: &Settings,
    endpoint: Arc<dyn TokenEndpoint>,
) -> Result<SpotifyClient, AuthError> {
    let coordinator = AuthCoordinator::new(settings.auth.clone(), Arc::clone(&endpoint));
    let token = coordinator.authenticate().await?;

    let tokens = TokenManager::new(token, endpoint).with_cache_path(TokenManager::token_path());
    if let Err(e) = tokens.persist().await {
        warning!("Failed to save token to cache: {}", e);
    }
    success!("Authentication successful!");

    Ok(SpotifyClient::new(settings.api_url.clone(), Arc::new(tokens)))
}
