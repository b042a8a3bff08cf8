//! # Repository Pattern Implementation
//!
//! Traits define the data-access interface; SQLite implementations back them
//! with sqlx. All operations return [`crate::Result`].
//!
//! ## Available Repositories
//!
//! - `EntryRepository` - songs synchronized from the remote server

pub mod entry;

pub use entry::{EntryRepository, SqliteEntryRepository};
