//! # Core Runtime Module
//!
//! Foundational infrastructure shared by every crate in the sync engine:
//! - Logging and tracing setup, including credential redaction
//! - Configuration (server endpoint, sync tuning, injected bridges)
//! - Event bus for sync progress and library changes

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
