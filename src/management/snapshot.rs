use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LookupError, SnapshotError},
    types::{CollectionFetchError, CollectionRef, MemberEntry},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub collection: CollectionRef,
    pub members: Vec<MemberEntry>,
}

/// Every playlist of a run with its tracks, plus the playlists that could not
/// be read.
///
/// Entries are keyed by playlist id; the name is only a lookup alias since
/// playlist names are not unique. Entries keep the order in which the
/// playlists were enumerated and members keep the service's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    /// Unix timestamp (seconds) of when the snapshot was built.
    pub taken_at: i64,
    entries: Vec<SnapshotEntry>,
    errors: Vec<CollectionFetchError>,
}

impl LibrarySnapshot {
    pub fn new(entries: Vec<SnapshotEntry>, errors: Vec<CollectionFetchError>) -> Self {
        Self {
            taken_at: Utc::now().timestamp(),
            entries,
            errors,
        }
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn errors(&self) -> &[CollectionFetchError] {
        &self.errors
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count_collections(&self) -> usize {
        self.entries.len()
    }

    pub fn count_members(&self) -> usize {
        self.entries.iter().map(|e| e.members.len()).sum()
    }

    /// Returns the tracks of the playlist with the given id.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - The service's playlist id
    ///
    /// # Returns
    ///
    /// The tracks in playlist order, or `None` if the playlist is not in the
    /// snapshot. A playlist that failed to load is only in
    /// [`LibrarySnapshot::errors`].
    ///
    /// # Example
    ///
    /// ```rust
    /// if let Some(tracks) = snapshot.members_by_id("37i9dQZF1DXcBWIGoYBM5M") {
    ///     println!("{} tracks", tracks.len());
    /// }
    /// ```
    pub fn members_by_id(&self, collection_id: &str) -> Option<&[MemberEntry]> {
        self.entries
            .iter()
            .find(|e| e.collection.id == collection_id)
            .map(|e| e.members.as_slice())
    }

    /// Resolves a playlist by its display name.
    ///
    /// # Errors
    ///
    /// - [`LookupError::NotFound`] if no readable playlist has that name.
    /// - [`LookupError::AmbiguousName`] if several do; use
    ///   [`LibrarySnapshot::members_by_id`] with one of the reported ids.
    pub fn lookup_members(&self, name: &str) -> Result<&[MemberEntry], LookupError> {
        let matches: Vec<&SnapshotEntry> = self
            .entries
            .iter()
            .filter(|e| e.collection.name == name)
            .collect();

        match matches.as_slice() {
            [] => Err(LookupError::NotFound(name.to_string())),
            [entry] => Ok(entry.members.as_slice()),
            many => Err(LookupError::AmbiguousName {
                name: name.to_string(),
                ids: many.iter().map(|e| e.collection.id.clone()).collect(),
            }),
        }
    }

    pub async fn load() -> Result<Self, SnapshotError> {
        Self::load_from(&Self::cache_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, SnapshotError> {
        let content = async_fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn persist(&self) -> Result<(), SnapshotError> {
        self.save_to(&Self::cache_path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                async_fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    pub fn cache_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("spotsnap/cache/snapshot.json");
        path
    }
}
