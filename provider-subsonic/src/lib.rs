//! # Subsonic Provider
//!
//! Client for the Subsonic REST API (protocol 1.10.1 and later).
//!
//! ## Overview
//!
//! This module provides:
//! - Authenticated URL construction for the catalog operations
//! - Typed decoding of the `subsonic-response` JSON envelope
//! - A blocking and a callback-based async variant of every call
//!
//! The client owns no transport. It builds URLs and hands them to the
//! injected [`AsyncFetchPort`](bridge_traits::fetch::AsyncFetchPort) /
//! [`BlockingFetchPort`](bridge_traits::fetch::BlockingFetchPort), so it is
//! stateless per call and can be shared freely between sync stages.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Operation, Params, SubsonicClient};
pub use error::{Result, SubsonicError};
pub use types::{
    ApiFailure, Artist, Child, Decode, DirectoryResponse, Envelope, Genre, GenresResponse, IndexesResponse,
    LicenseResponse, MusicFolder, MusicFoldersResponse, PingResponse,
};
