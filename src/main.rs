use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use spotsnap::{cli, config, error, logging, types::AuthStrategy, utils, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// How the authorization code is received: automatic (local callback
    /// server) or manual (paste the redirect URL)
    #[clap(long, global = true, value_parser = utils::parse_auth_strategy)]
    auth_strategy: Option<AuthStrategy>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth,

    /// List playlists
    Playlists(PlaylistsOptions),

    /// Read every playlist with its tracks
    Snapshot(SnapshotOptions),

    /// Show the tracks of a playlist
    Tracks(TracksOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistsOptions {
    /// List the public playlists of this user instead of your own
    #[clap(long)]
    pub user: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SnapshotOptions {
    /// Also write the snapshot to this file
    #[clap(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct TracksOptions {
    /// Playlist name, or id with --id
    pub name: String,

    /// Treat NAME as a playlist id
    #[clap(long)]
    pub id: bool,

    /// Use the last snapshot instead of reading from Spotify
    #[clap(long)]
    pub cached: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = config::load_env().await {
        warning!("Cannot load environment. Err: {}", e);
    }

    let mut settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => error!("Invalid configuration: {}", e),
    };
    if let Some(strategy) = cli.auth_strategy {
        settings.auth.strategy = strategy;
    }

    logging::init(&settings.log_filter);

    match cli.command {
        Command::Auth => cli::auth(&settings).await,
        Command::Playlists(opt) => cli::playlists(&settings, opt.user).await,
        Command::Snapshot(opt) => cli::snapshot(&settings, opt.output).await,
        Command::Tracks(opt) => cli::tracks(&settings, &opt.name, opt.id, opt.cached).await,
        Command::Completions(_) => {}
    }
}
