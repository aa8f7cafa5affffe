mod auth;
mod snapshot;

pub use auth::TokenManager;
pub use snapshot::LibrarySnapshot;
pub use snapshot::SnapshotEntry;
