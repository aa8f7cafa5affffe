use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::{
    error::ServiceError,
    management::TokenManager,
    pagination::Page,
    types::{
        CollectionRef, GetPlaylistItemsResponse, GetUserPlaylistsResponse, MemberEntry,
        UserProfile,
    },
    warning,
};

/// Requests per call before giving up on 429/5xx responses.
const MAX_ATTEMPTS: u32 = 3;
/// Longest `Retry-After` we are willing to sleep through.
const MAX_RETRY_AFTER_SECS: u64 = 120;
const PLAYLISTS_PAGE_SIZE: u32 = 50;
const TRACKS_PAGE_SIZE: u32 = 100;

/// Whose playlists to enumerate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CollectionScope {
    /// Playlists owned or followed by the authenticated user.
    #[default]
    CurrentUser,
    /// Public playlists of another user.
    User(String),
}

/// Paginated endpoints of the remote library. Cursors are opaque strings.
#[async_trait]
pub trait LibraryService: Send + Sync {
    async fn playlists_page(
        &self,
        scope: &CollectionScope,
        cursor: Option<String>,
    ) -> Result<Page<CollectionRef, String>, ServiceError>;

    async fn tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<MemberEntry, String>, ServiceError>;
}

/// Authenticated Web API client. Cursors are the `next` URLs returned by
/// the API.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    api_url: String,
    tokens: Arc<TokenManager>,
}

impl SpotifyClient {
    /// Creates a client.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the Web API without a trailing slash,
    ///   e.g. `https://api.spotify.com/v1`
    /// * `tokens` - Token source shared by every request of this client and
    ///   its clones
    pub fn new(api_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub async fn current_user(&self) -> Result<UserProfile, ServiceError> {
        self.get_json(&format!("{}/me", self.api_url)).await
    }

    /// GETs `url` with a fresh bearer token and decodes the JSON body.
    ///
    /// Rate limiting (429) is retried after `Retry-After` when that is at
    /// most two minutes, 502/503 are retried with a short backoff and a 401
    /// forces a token refresh before the next attempt. Everything else is
    /// returned to the caller.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.tokens.ensure_fresh_token().await?;
            let response = self
                .http
                .get(url)
                .bearer_auth(&token.access_token)
                .timeout(Duration::from_secs(30))
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().await?;
                return Ok(serde_json::from_str(&body)?);
            }

            let retry_in = match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(1);
                    if retry_after > MAX_RETRY_AFTER_SECS {
                        warning!(
                            "Retry after has reached an abnormal high of {} seconds.",
                            retry_after
                        );
                        return Err(ServiceError::RateLimited(retry_after));
                    }
                    Some(Duration::from_secs(retry_after))
                }
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                    Some(Duration::from_secs(2u64.pow(attempt)))
                }
                StatusCode::UNAUTHORIZED => {
                    self.tokens.expire_if(&token.access_token).await;
                    Some(Duration::ZERO)
                }
                _ => None,
            };

            match retry_in {
                Some(delay) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(%status, attempt, ?delay, url, "retrying request");
                    sleep(delay).await;
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ServiceError::Status { status, body });
                }
            }
        }
    }
}

#[async_trait]
impl LibraryService for SpotifyClient {
    async fn playlists_page(
        &self,
        scope: &CollectionScope,
        cursor: Option<String>,
    ) -> Result<Page<CollectionRef, String>, ServiceError> {
        let url = cursor.unwrap_or_else(|| match scope {
            CollectionScope::CurrentUser => format!(
                "{uri}/me/playlists?limit={limit}",
                uri = self.api_url,
                limit = PLAYLISTS_PAGE_SIZE
            ),
            CollectionScope::User(user_id) => format!(
                "{uri}/users/{user}/playlists?limit={limit}",
                uri = self.api_url,
                user = user_id,
                limit = PLAYLISTS_PAGE_SIZE
            ),
        });

        let res: GetUserPlaylistsResponse = self.get_json(&url).await?;
        Ok(Page::new(
            res.items.into_iter().map(CollectionRef::from).collect(),
            res.next,
        ))
    }

    async fn tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<MemberEntry, String>, ServiceError> {
        let url = cursor.unwrap_or_else(|| {
            format!(
                "{uri}/playlists/{id}/tracks?limit={limit}",
                uri = self.api_url,
                id = playlist_id,
                limit = TRACKS_PAGE_SIZE
            )
        });

        let res: GetPlaylistItemsResponse = self.get_json(&url).await?;
        Ok(Page::new(
            res.items
                .into_iter()
                .filter_map(|item| item.track)
                .map(MemberEntry::from)
                .collect(),
            res.next,
        ))
    }
}
