//! JSON fetch ports backed by an [`HttpClient`] and a Tokio runtime handle.

use bridge_traits::{
    error::{BridgeError, Result},
    fetch::{AsyncFetchPort, BlockingFetchPort, FetchCallback, FetchResult},
    http::{HttpClient, HttpRequest},
};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Fetches JSON documents over HTTP.
///
/// Async fetches are spawned on the captured runtime handle, so the
/// completion always runs on a runtime worker after [`AsyncFetchPort::fetch`]
/// has returned. Every request carries `timeout`, which bounds how long a
/// completion can stay outstanding.
#[derive(Clone)]
pub struct HttpFetcher {
    http: Arc<dyn HttpClient>,
    handle: Handle,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(http: Arc<dyn HttpClient>, handle: Handle, timeout: Duration) -> Self {
        Self {
            http,
            handle,
            timeout,
        }
    }

    /// Build a fetcher bound to the runtime the caller is running on.
    pub fn from_current(http: Arc<dyn HttpClient>, timeout: Duration) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| {
            BridgeError::NotAvailable("HttpFetcher requires a Tokio runtime".to_string())
        })?;
        Ok(Self::new(http, handle, timeout))
    }

    async fn get_json(http: Arc<dyn HttpClient>, url: String, timeout: Duration) -> FetchResult {
        let response = http.execute(HttpRequest::get(url).timeout(timeout)).await?;

        if !response.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} from server",
                response.status
            )));
        }

        response.json()
    }
}

impl AsyncFetchPort for HttpFetcher {
    fn fetch(&self, url: String, on_complete: FetchCallback) {
        let http = Arc::clone(&self.http);
        let timeout = self.timeout;

        self.handle.spawn(async move {
            let result = Self::get_json(http, url, timeout).await;
            debug!(ok = result.is_ok(), "Async fetch finished");
            on_complete(result);
        });
    }
}

impl BlockingFetchPort for HttpFetcher {
    /// Blocks the calling thread until the document arrives.
    ///
    /// Returns `NotAvailable` when called from inside a Tokio runtime, where
    /// blocking would stall the very workers that must drive the request.
    fn fetch_blocking(&self, url: &str) -> FetchResult {
        if Handle::try_current().is_ok() {
            return Err(BridgeError::NotAvailable(
                "blocking fetch called from within an async context".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel();
        self.fetch(
            url.to_string(),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        rx.recv().map_err(|_| {
            BridgeError::OperationFailed("fetch task ended without a result".to_string())
        })?
    }
}
