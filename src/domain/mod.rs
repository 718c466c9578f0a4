pub mod track;
pub mod album_group;
pub mod scored_release;
pub mod cached_result;
pub mod pending;
pub mod change_log;
pub mod album_type;
pub mod validators;

pub use album_group::{group_tracks_by_album, AlbumGroup};
pub use album_type::{detect_album_type, is_soundtrack, is_various_artists, AlbumType, YearHandlingStrategy};
pub use cached_result::{AlbumCacheEntry, CachedApiResult};
pub use change_log::{ChangeLogEntry, ChangeType};
pub use pending::{PendingAlbumEntry, VerificationReason};
pub use scored_release::ScoredRelease;
pub use track::{Track, TrackStatus};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Name field cannot be an empty string.")]
    NameIsEmptyString,

    #[error("Track id cannot be an empty string.")]
    IdIsEmptyString,
}
