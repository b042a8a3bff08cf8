use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Artist index could not be fetched: {0}")]
    IndexFetch(String),

    #[error("Sync stalled with work outstanding: {0}")]
    Stalled(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
