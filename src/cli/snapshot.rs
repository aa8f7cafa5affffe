use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli,
    config::Settings,
    error, info,
    management::LibrarySnapshot,
    pagination::PaginationWalker,
    spotify::{client::CollectionScope, library::SnapshotBuilder},
    success, warning,
};

/// Builds a fresh snapshot of the current user's playlists, caches it and
/// optionally writes it to `output`.
pub async fn snapshot(settings: &Settings, output: Option<PathBuf>) {
    let snapshot = build(settings).await;

    if let Err(e) = snapshot.persist().await {
        warning!("Cannot cache snapshot. Err: {}", e);
    }

    if let Some(path) = output {
        match snapshot.save_to(&path).await {
            Ok(_) => success!("Snapshot written to {}", path.display()),
            Err(e) => error!("Cannot write snapshot to {}: {}", path.display(), e),
        }
    }

    report(&snapshot);
}

/// Connects, walks every playlist and returns the snapshot. Exits if the
/// playlists themselves cannot be listed.
pub(crate) async fn build(settings: &Settings) -> LibrarySnapshot {
    let client = cli::connect(settings).await;

    if let Ok(user) = client.current_user().await {
        info!(
            "Reading playlists of {}",
            user.display_name.unwrap_or(user.id)
        );
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.blue} {pos}/{len} playlists read") {
        pb.set_style(style);
    }

    let builder = SnapshotBuilder::new(
        PaginationWalker::new(settings.max_pages),
        settings.concurrency,
    );
    let result = builder
        .build_with_progress(&client, &CollectionScope::CurrentUser, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .await;
    pb.finish_and_clear();

    match result {
        Ok(snapshot) => snapshot,
        Err(e) => error!("Failed to list playlists: {}", e),
    }
}

fn report(snapshot: &LibrarySnapshot) {
    success!(
        "Read {} tracks from {} playlists.",
        snapshot.count_members(),
        snapshot.count_collections()
    );

    if snapshot.is_complete() {
        return;
    }

    warning!(
        "{} playlists could not be read:",
        snapshot.errors().len()
    );
    for err in snapshot.errors() {
        warning!(
            "  {} ({}): {}",
            err.collection_name,
            err.collection_id,
            err.cause
        );
    }
}
