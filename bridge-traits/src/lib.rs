//! # Host Bridge Traits
//!
//! Capability traits the sync core depends on but does not implement.
//!
//! ## Overview
//!
//! The catalog engine needs three things from its host: a way to fetch JSON
//! documents from the remote server, a time source, and somewhere to send
//! logs. Each is a trait here so the core can run against `bridge-desktop`
//! in production and against scripted fakes in tests.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with per-request timeouts
//! - [`AsyncFetchPort`](fetch::AsyncFetchPort) - Callback-based JSON fetch used by the sync pipeline
//! - [`BlockingFetchPort`](fetch::BlockingFetchPort) - Blocking JSON fetch for one-shot calls
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform-specific failures into it with an actionable
//! message. Timeouts are reported as [`BridgeError::Timeout`] so callers can
//! tell a slow server from a refused connection.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. Fetch completions may run on any
//! thread the implementation chooses.

pub mod error;
pub mod fetch;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use fetch::{AsyncFetchPort, BlockingFetchPort, FetchCallback, FetchResult};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
