//! # CLI Module
//!
//! The command-line layer of spotsnap. Each command loads what it needs,
//! delegates to the [`crate::spotify`] and [`crate::management`] modules and
//! turns the result into console output.
//!
//! ## Commands
//!
//! - [`auth`] - Runs the authorization flow and caches the token
//! - [`playlists`] - Lists the playlists of the current user or of another
//!   user, numbered in service order
//! - [`snapshot`] - Reads every playlist with its tracks, writes the snapshot
//!   and lists the playlists that could not be read
//! - [`tracks`] - Shows the tracks of one playlist from a fresh or cached
//!   snapshot
//!
//! ## Architecture Design
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! Spotify Layer (authorization, client, aggregation)
//!     ↓
//! Pagination / Management (walker, tokens, snapshot storage)
//!     ↓
//! Network Layer (HTTP Requests)
//! ```
//!
//! ## Error Handling
//!
//! Authorization failures and failures to enumerate playlists are fatal:
//! they are printed with a hint where one exists and the process exits with
//! status 1. Playlists whose tracks cannot be read are listed as warnings and
//! the command still completes.
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotsnap auth                          # Authorize and cache the token
//! spotsnap playlists                     # Your playlists
//! spotsnap playlists --user spotify      # Another user's public playlists
//! spotsnap snapshot --output lib.json    # Full snapshot to a file
//! spotsnap tracks "Road Trip" --cached   # Tracks from the last snapshot
//! ```

mod auth;
mod playlists;
mod snapshot;
mod tracks;

pub use auth::auth;
pub use playlists::playlists;
pub use snapshot::snapshot;
pub use tracks::tracks;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config::Settings, error, error::AuthError, spotify, spotify::client::SpotifyClient, warning,
};

/// Connects with the cached token or authorizes; exits on failure.
async fn connect(settings: &Settings) -> SpotifyClient {
    match spotify::connect(settings).await {
        Ok(client) => client,
        Err(e) => fail_auth(&e),
    }
}

fn fail_auth(e: &AuthError) -> ! {
    if let Some(hint) = e.hint() {
        warning!("{}", hint);
    }
    error!("Authorization failed: {}", e);
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
