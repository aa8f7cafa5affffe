use tabled::Table;

use crate::{
    cli::snapshot,
    config::Settings,
    error,
    error::LookupError,
    info,
    management::LibrarySnapshot,
    types::{MemberEntry, TrackTableRow},
    utils, warning,
};

/// Prints the tracks of the playlist called `name`, or with id `name` when
/// `by_id` is set.
///
/// With `cached` the last snapshot written by `spotsnap snapshot` is used and
/// no request is made.
pub async fn tracks(settings: &Settings, name: &str, by_id: bool, cached: bool) {
    let snapshot = if cached {
        match LibrarySnapshot::load().await {
            Ok(snapshot) => snapshot,
            Err(e) => error!(
                "Failed to load cached snapshot. Run spotsnap snapshot first.\n Error: {}",
                e
            ),
        }
    } else {
        let snapshot = snapshot::build(settings).await;
        if let Err(e) = snapshot.persist().await {
            warning!("Cannot cache snapshot. Err: {}", e);
        }
        snapshot
    };

    let members: &[MemberEntry] = if by_id {
        match snapshot.members_by_id(name) {
            Some(members) => members,
            None => error!("{}", LookupError::NotFound(name.to_string())),
        }
    } else {
        match snapshot.lookup_members(name) {
            Ok(members) => members,
            Err(e @ LookupError::AmbiguousName { .. }) => {
                error!("{}\nPass one of the ids with --id.", e)
            }
            Err(e) => {
                if let Some(failed) = snapshot
                    .errors()
                    .iter()
                    .find(|err| err.collection_name == name)
                {
                    warning!("Playlist {} could not be read: {}", name, failed.cause);
                }
                error!("{}", e)
            }
        }
    };

    if members.is_empty() {
        info!("Playlist {} has no tracks.", name);
        return;
    }

    let rows: Vec<TrackTableRow> = members
        .iter()
        .enumerate()
        .map(|(i, m)| TrackTableRow {
            index: i + 1,
            name: m.name.clone(),
            artists: utils::join_artists(&m.artists, 3),
        })
        .collect();

    println!("{}", Table::new(rows));
}
