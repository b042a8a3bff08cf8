//! Workspace entry crate.
//!
//! Re-exports the `core-service` façade so a host can depend on
//! `subsonic-sync-workspace` alone and toggle `desktop-shims` here instead of
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
