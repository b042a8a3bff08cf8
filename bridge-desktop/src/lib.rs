//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `AsyncFetchPort` / `BlockingFetchPort` using the HTTP client plus a Tokio
//!   runtime handle
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HttpFetcher, ReqwestHttpClient};
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let fetcher = HttpFetcher::from_current(http, Duration::from_secs(30))?;
//!     // Hand `fetcher` to the catalog client
//!     Ok(())
//! }
//! ```

mod fetch;
mod http;

pub use fetch::HttpFetcher;
pub use http::ReqwestHttpClient;
