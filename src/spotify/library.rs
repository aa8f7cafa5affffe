use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::{
    config::DEFAULT_CONCURRENCY,
    error::PaginationError,
    management::{LibrarySnapshot, SnapshotEntry},
    pagination::PaginationWalker,
    spotify::client::{CollectionScope, LibraryService},
    types::{CollectionFetchError, CollectionRef, MemberEntry},
};

/// Enumerates every playlist in `scope`, in the order the service returns
/// them.
///
/// # Arguments
///
/// * `service` - The library to read from
/// * `scope` - Whose playlists to list
/// * `walker` - Page bound for the walk
///
/// # Returns
///
/// All playlists in service order, or the [`PaginationError`] that stopped
/// the walk.
///
/// # Example
///
/// ```rust
/// let playlists =
///     list_collections(&client, &CollectionScope::CurrentUser, PaginationWalker::default())
///         .await?;
/// ```
pub async fn list_collections<S>(
    service: &S,
    scope: &CollectionScope,
    walker: PaginationWalker,
) -> Result<Vec<CollectionRef>, PaginationError>
where
    S: LibraryService + ?Sized,
{
    walker
        .collect(|cursor| service.playlists_page(scope, cursor))
        .await
}

/// Reads every track of one playlist, in playlist order.
///
/// Items without a track (removed or local content) are already dropped by
/// the service, so the result only holds real tracks.
pub async fn list_members<S>(
    service: &S,
    playlist_id: &str,
    walker: PaginationWalker,
) -> Result<Vec<MemberEntry>, PaginationError>
where
    S: LibraryService + ?Sized,
{
    walker
        .collect(|cursor| service.tracks_page(playlist_id, cursor))
        .await
}

/// Builds a [`LibrarySnapshot`] by walking the playlists and then each
/// playlist's tracks.
///
/// Track walks run concurrently, at most `concurrency` at a time. A playlist
/// whose tracks cannot be read is recorded as a [`CollectionFetchError`] and
/// the build carries on, so every enumerated playlist ends up either as an
/// entry or as an error.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuilder {
    walker: PaginationWalker,
    concurrency: usize,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self {
            walker: PaginationWalker::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SnapshotBuilder {
    /// Creates a builder.
    ///
    /// # Arguments
    ///
    /// * `walker` - Page bound applied to the playlist walk and to every
    ///   track walk
    /// * `concurrency` - How many playlists are read at the same time; zero
    ///   is raised to one
    ///
    /// # Example
    ///
    /// ```rust
    /// let snapshot = SnapshotBuilder::new(PaginationWalker::new(500), 4)
    ///     .build(&client, &CollectionScope::CurrentUser)
    ///     .await?;
    /// ```
    pub fn new(walker: PaginationWalker, concurrency: usize) -> Self {
        Self {
            walker,
            concurrency: concurrency.max(1),
        }
    }

    /// Builds a snapshot, reporting each finished playlist to `on_progress`
    /// with the number done so far and the total.
    ///
    /// # Errors
    ///
    /// Only a failure to enumerate the playlists themselves is returned.
    pub async fn build_with_progress<S, P>(
        &self,
        service: &S,
        scope: &CollectionScope,
        on_progress: P,
    ) -> Result<LibrarySnapshot, PaginationError>
    where
        S: LibraryService + ?Sized,
        P: Fn(usize, usize) + Sync,
    {
        let collections = list_collections(service, scope, self.walker).await?;
        let total = collections.len();
        tracing::debug!(total, "enumerated playlists");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let done = std::sync::atomic::AtomicUsize::new(0);

        let tasks = collections.into_iter().map(|collection| {
            let semaphore = Arc::clone(&semaphore);
            let done = &done;
            let on_progress = &on_progress;
            async move {
                // The semaphore is never closed, so acquiring cannot fail.
                let _permit = semaphore.acquire().await.ok();
                let result = list_members(service, &collection.id, self.walker).await;
                let finished = done.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                on_progress(finished, total);
                (collection, result)
            }
        });

        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for (collection, result) in join_all(tasks).await {
            match result {
                Ok(members) => entries.push(SnapshotEntry {
                    collection,
                    members,
                }),
                Err(e) => {
                    tracing::warn!(
                        playlist = %collection.id,
                        error = %e,
                        "failed to read playlist tracks"
                    );
                    errors.push(CollectionFetchError {
                        collection_id: collection.id,
                        collection_name: collection.name,
                        cause: e.to_string(),
                    });
                }
            }
        }

        Ok(LibrarySnapshot::new(entries, errors))
    }

    pub async fn build<S>(
        &self,
        service: &S,
        scope: &CollectionScope,
    ) -> Result<LibrarySnapshot, PaginationError>
    where
        S: LibraryService + ?Sized,
    {
        self.build_with_progress(service, scope, |_, _| {}).await
    }
}
