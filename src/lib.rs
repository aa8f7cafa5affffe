//! Spotify Playlist Snapshot Library
//!
//! This library authorizes against the Spotify Web API with the
//! authorization-code flow, capturing the redirect on a short-lived loopback
//! listener, and then walks the paginated playlist endpoints to build a
//! snapshot of every playlist of a user with its tracks. Playlists whose
//! tracks cannot be read are reported instead of aborting the snapshot.
//!
//! # Modules
//!
//! - `api` - HTTP endpoint served by the callback listener
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error types
//! - `logging` - Diagnostic `tracing` setup
//! - `management` - Token lifecycle and snapshot storage
//! - `pagination` - Cursor-following page walker
//! - `server` - Loopback listener for the authorization redirect
//! - `spotify` - Spotify Web API client, authorization flow and aggregation
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use spotsnap::{config::Settings, spotify};
//!
//! #[tokio::main]
//! async fn main() -> spotsnap::Res<()> {
//!     spotsnap::config::load_env().await?;
//!     let settings = Settings::from_env()?;
//!     let client = spotify::connect(&settings).await?;
//!     // Walk playlists...
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod management;
pub mod pagination;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for glue code that may fail in several
/// unrelated ways.
///
/// # Example
///
/// ```
/// use spotsnap::Res;
///
/// async fn fetch_data() -> Res<String> {
///     Ok("data".to_string())
/// }
/// ```
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Starting authorization...");
/// info!("Found {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Snapshot written to {}", path.display());
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program
/// with status 1.
///
/// Only for fatal errors: code after this macro does not run.
///
/// # Example
///
/// ```
/// error!("Authorization failed: {}", e);
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable problems the user should still notice, such as a
/// playlist that could not be read.
///
/// # Example
///
/// ```
/// warning!("Failed to open browser");
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
