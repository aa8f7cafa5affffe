use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use tokio::time::Instant;

/// Seconds before the real expiry at which a token is treated as expired.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Access and refresh token pair returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: i64,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at - TOKEN_EXPIRY_MARGIN_SECS
    }
}

/// Wire format of the token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: i64,
}

impl TokenResponse {
    /// Converts the response into a [`Token`], stamping the expiry relative to
    /// `now`. A missing refresh token is left empty for the caller to fill in.
    pub fn into_token(self, now: i64) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token.unwrap_or_default(),
            scope: self.scope.unwrap_or_default(),
            expires_at: now + self.expires_in,
        }
    }
}

/// How the authorization code reaches the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Open the browser and capture the redirect on a loopback listener.
    #[default]
    Automatic,
    /// Print the URL and let the user paste the redirected URL back.
    Manual,
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "automatic" | "auto" => Ok(AuthStrategy::Automatic),
            "manual" => Ok(AuthStrategy::Manual),
            other => Err(format!(
                "unknown auth strategy '{other}', expected 'automatic' or 'manual'"
            )),
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Automatic => f.write_str("automatic"),
            AuthStrategy::Manual => f.write_str("manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Captured,
    TimedOut,
    Failed,
}

/// One authorization attempt. The code is recorded at most once and the
/// status never leaves a terminal state.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub deadline: Instant,
    status: SessionStatus,
    code: Option<String>,
}

impl AuthorizationSession {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        state: impl Into<String>,
        deadline: Instant,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            state: state.into(),
            deadline,
            status: SessionStatus::Pending,
            code: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Records the captured code. Returns `false` if the session already left
    /// `Pending`, in which case nothing changes.
    pub fn capture(&mut self, code: impl Into<String>) -> bool {
        if self.status != SessionStatus::Pending {
            return false;
        }
        self.code = Some(code.into());
        self.status = SessionStatus::Captured;
        true
    }

    pub fn time_out(&mut self) -> bool {
        self.finish(SessionStatus::TimedOut)
    }

    pub fn fail(&mut self) -> bool {
        self.finish(SessionStatus::Failed)
    }

    fn finish(&mut self, status: SessionStatus) -> bool {
        if self.status != SessionStatus::Pending {
            return false;
        }
        self.status = status;
        true
    }
}

/// A playlist as enumerated from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub uri: String,
}

/// A playlist item, reduced to what the snapshot needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
}

impl MemberEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            artists: Vec::new(),
        }
    }
}

/// A playlist whose members could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFetchError {
    pub collection_id: String,
    pub collection_name: String,
    pub cause: String,
}

#[derive(Tabled)]
pub struct PlaylistTableRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub uri: String,
    pub name: String,
    pub owner: String,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub name: String,
    pub artists: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistOwner {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    pub owner: PlaylistOwner,
}

impl From<Playlist> for CollectionRef {
    fn from(playlist: Playlist) -> Self {
        CollectionRef {
            id: playlist.id,
            name: playlist.name,
            owner: playlist
                .owner
                .display_name
                .unwrap_or(playlist.owner.id),
            uri: playlist.uri,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserPlaylistsResponse {
    pub items: Vec<Playlist>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackArtist {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<TrackArtist>,
}

impl From<Track> for MemberEntry {
    fn from(track: Track) -> Self {
        MemberEntry {
            name: track.name,
            id: track.id,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPlaylistItemsResponse {
    pub items: Vec<PlaylistItem>,
    pub next: Option<String>,
}
