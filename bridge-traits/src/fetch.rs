//! JSON Fetch Ports
//!
//! The catalog client never talks to an HTTP stack directly. It asks a fetch
//! port for the decoded JSON document behind a URL, either blocking the
//! calling thread ([`BlockingFetchPort`]) or handing over a completion that is
//! invoked later ([`AsyncFetchPort`]).
//!
//! # Completion contract
//!
//! For every call to [`AsyncFetchPort::fetch`] the implementation must invoke
//! `on_complete` **exactly once**, and **never** before `fetch` has returned.
//! Transport failures and undecodable bodies are reported through the
//! completion as `Err`; they are never swallowed.

use serde_json::Value;

use crate::error::Result;

/// Outcome delivered to a fetch completion.
pub type FetchResult = Result<Value>;

/// One-shot completion handed to [`AsyncFetchPort::fetch`].
pub type FetchCallback = Box<dyn FnOnce(FetchResult) + Send + 'static>;

/// Fetches a URL and decodes the body as JSON, blocking the caller.
pub trait BlockingFetchPort: Send + Sync {
    fn fetch_blocking(&self, url: &str) -> FetchResult;
}

/// Fetches a URL without blocking and reports the decoded body later.
///
/// # Example
///
/// ```ignore
/// port.fetch(url, Box::new(|result| match result {
///     Ok(document) => println!("{}", document),
///     Err(e) => eprintln!("fetch failed: {}", e),
/// }));
/// ```
pub trait AsyncFetchPort: Send + Sync {
    fn fetch(&self, url: String, on_complete: FetchCallback);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Port that defers every completion until `flush` is called.
    #[derive(Default)]
    struct DeferredPort {
        pending: Mutex<Vec<(String, FetchCallback)>>,
    }

    impl DeferredPort {
        fn flush(&self, document: Value) {
            let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
            for (_, callback) in pending {
                callback(Ok(document.clone()));
            }
        }
    }

    impl AsyncFetchPort for DeferredPort {
        fn fetch(&self, url: String, on_complete: FetchCallback) {
            self.pending.lock().unwrap().push((url, on_complete));
        }
    }

    #[test]
    fn test_completion_runs_after_fetch_returns() {
        let port = DeferredPort::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        port.fetch(
            "https://example.com/rest/ping.view".to_string(),
            Box::new(move |result| sink.lock().unwrap().push(result.is_ok())),
        );
        assert!(seen.lock().unwrap().is_empty());

        port.flush(serde_json::json!({}));
        assert_eq!(*seen.lock().unwrap(), vec![true]);

        port.flush(serde_json::json!({}));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
