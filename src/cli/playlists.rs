use tabled::Table;

use crate::{
    cli, config::Settings, error, info,
    pagination::PaginationWalker,
    spotify::{client::CollectionScope, library},
    types::PlaylistTableRow,
};

/// Lists the playlists in `user`'s library, or the current user's when no
/// user is given.
pub async fn playlists(settings: &Settings, user: Option<String>) {
    let client = cli::connect(settings).await;
    let scope = user.map_or(CollectionScope::CurrentUser, CollectionScope::User);

    let pb = cli::spinner("Fetching playlists...");
    let result =
        library::list_collections(&client, &scope, PaginationWalker::new(settings.max_pages))
            .await;
    pb.finish_and_clear();

    let collections = match result {
        Ok(collections) => collections,
        Err(e) => error!("Failed to list playlists: {}", e),
    };

    if collections.is_empty() {
        info!("No playlists found.");
        return;
    }

    let rows: Vec<PlaylistTableRow> = collections
        .into_iter()
        .enumerate()
        .map(|(i, c)| PlaylistTableRow {
            index: i + 1,
            uri: c.uri,
            name: c.name,
            owner: c.owner,
        })
        .collect();

    println!("{}", Table::new(rows));
}
