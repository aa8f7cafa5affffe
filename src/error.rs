//! Error taxonomy for authentication, pagination, the remote library client
//! and snapshot lookups.
//!
//! Authentication errors are fatal to a run. Pagination errors are reported to
//! whoever drove the walk; the snapshot builder turns member-walk failures into
//! [`crate::types::CollectionFetchError`] records instead of propagating them.

use std::{io, time::Duration};

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error used as the source of a failed page fetch.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The loopback callback port could not be bound.
    #[error("cannot listen for the authorization callback on port {port}: {source}")]
    ListenerBind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("no authorization redirect received within {0:?}")]
    Timeout(Duration),

    /// The redirect echoed a different state nonce than the one issued.
    /// The code that came with it is discarded.
    #[error("authorization state mismatch, refusing to exchange the code")]
    StateMismatch,

    #[error("authorization was denied: {0}")]
    Denied(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("invalid redirect URL: {0}")]
    InvalidRedirect(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AuthError {
    /// Hint printed next to fatal authentication errors.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AuthError::ListenerBind { .. } => Some(
                "Free the port or set SPOTSNAP_CALLBACK_PORT (and the redirect URI) to another one.",
            ),
            AuthError::Timeout(_) => Some("Run the command again to retry the authorization."),
            AuthError::StateMismatch => {
                Some("The redirect did not originate from this authorization attempt.")
            }
            AuthError::TokenRefresh(_) => Some("Run spotsnap auth to authorize again."),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    /// The walker fetched `max_pages` pages and the service still returned a
    /// next cursor.
    #[error("gave up after {max_pages} pages ({items_accumulated} items read), the service kept returning a next cursor")]
    BoundExceeded {
        max_pages: usize,
        items_accumulated: usize,
    },

    #[error("page {page} failed after {items_accumulated} items: {source}")]
    Fetch {
        /// One-based number of the page that failed.
        page: usize,
        items_accumulated: usize,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("service responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no playlist named \"{0}\" in the snapshot")]
    NotFound(String),

    #[error("{} playlists are named \"{name}\": {}", .ids.len(), .ids.join(", "))]
    AmbiguousName { name: String, ids: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value \"{value}\": {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
