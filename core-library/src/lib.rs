//! # Local Catalog Store
//!
//! Durable side of the sync engine: the SQLite database that receives songs
//! discovered on the remote server.
//!
//! ## Overview
//!
//! - [`models::Locator`] - globally unique, stable key `subsonic://host/id`
//! - [`models::LocalEntry`] - one stored song and its metadata fields
//! - [`repositories::EntryRepository`] - lookup and whole-entry upsert
//! - [`db`] - pool creation and schema migrations
//!
//! The sync pipeline only ever looks entries up by locator and commits whole
//! entries. It never deletes or iterates during a sync.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{EntryField, LocalEntry, Locator};
pub use repositories::{EntryRepository, SqliteEntryRepository};
