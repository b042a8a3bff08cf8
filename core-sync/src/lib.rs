//! # Catalog Sync Module
//!
//! Mirrors a Subsonic server's catalog into the local store.
//!
//! ## Overview
//!
//! The remote catalog is a three-level hierarchy walked as a cascade of
//! queues. Each level hands its results to the next through an inbox:
//!
//! ```text
//! getIndexes ──> [artists] ──getMusicDirectory──> [albums] ──getMusicDirectory──> [songs] ──> store
//! ```
//!
//! ## Components
//!
//! - **Sync Queue** (`queue`): FIFO queue with processing/refreshing state,
//!   inbox handles and scheduler activation
//! - **Stages** (`stages`): what each level does with one item
//! - **Sync Coordinator** (`coordinator`): owns the queues, seeds the
//!   pipeline and runs the idle-tick scheduler

pub mod coordinator;
pub mod error;
pub mod queue;
pub mod stages;

pub use coordinator::{SyncCoordinator, SyncStats};
pub use error::{Result, SyncError};
pub use queue::{Activation, InboxHandle, Stage, StageMessage, StageOutcome, SyncQueue};
pub use stages::{AlbumStage, ArtistStage, DirectoryItem, DirectoryStage, SongStage, SyncCounters};
