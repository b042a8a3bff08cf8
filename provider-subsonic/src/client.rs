//! Subsonic REST client
//!
//! Builds authenticated request URLs and decodes the responses delivered by
//! the injected fetch ports. Each operation has a blocking variant and an
//! `_async` variant that reports through a one-shot completion.

use std::fmt;
use std::sync::Arc;

use bridge_traits::fetch::{AsyncFetchPort, BlockingFetchPort};
use core_runtime::config::{CoreConfig, ServerConfig};
use core_runtime::logging::redact_url_credentials;
use tracing::{debug, instrument};

use crate::error::{Result, SubsonicError};
use crate::types::{
    Decode, DirectoryResponse, GenresResponse, IndexesResponse, LicenseResponse,
    MusicFoldersResponse, PingResponse,
};

/// Response format requested from the server (`f`).
const RESPONSE_FORMAT: &str = "json";

/// Query parameters of one request, in send order.
pub type Params = Vec<(&'static str, String)>;

/// Remote operations used by the catalog sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetIndexes,
    GetLicense,
    GetGenres,
    GetMusicDirectory,
    GetMusicFolders,
    Ping,
}

impl Operation {
    /// Path segment of the operation (`/rest/{name}.view`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetIndexes => "getIndexes",
            Operation::GetLicense => "getLicense",
            Operation::GetGenres => "getGenres",
            Operation::GetMusicDirectory => "getMusicDirectory",
            Operation::GetMusicFolders => "getMusicFolders",
            Operation::Ping => "ping",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsonic API client
///
/// Stateless per call: cloning is cheap and every clone shares the same
/// fetch ports.
///
/// # Example
///
/// ```ignore
/// use provider_subsonic::SubsonicClient;
///
/// let client = SubsonicClient::from_config(&config, fetcher);
/// client.get_music_directory_async("42", |result| match result {
///     Ok(directory) => println!("{} children", directory.children.len()),
///     Err(e) => eprintln!("fetch failed: {}", e),
/// });
/// ```
#[derive(Clone)]
pub struct SubsonicClient {
    server: ServerConfig,
    client_name: String,
    protocol_version: String,
    async_port: Arc<dyn AsyncFetchPort>,
    blocking_port: Arc<dyn BlockingFetchPort>,
}

impl fmt::Debug for SubsonicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsonicClient")
            .field("server", &self.server)
            .field("client_name", &self.client_name)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl SubsonicClient {
    /// Create a client over a port that offers both fetch styles.
    pub fn new<P>(
        server: ServerConfig,
        client_name: impl Into<String>,
        protocol_version: impl Into<String>,
        port: Arc<P>,
    ) -> Self
    where
        P: AsyncFetchPort + BlockingFetchPort + 'static,
    {
        let async_port: Arc<dyn AsyncFetchPort> = port.clone();
        Self::with_ports(server, client_name, protocol_version, async_port, port)
    }

    /// Create a client over separate async and blocking ports.
    pub fn with_ports(
        server: ServerConfig,
        client_name: impl Into<String>,
        protocol_version: impl Into<String>,
        async_port: Arc<dyn AsyncFetchPort>,
        blocking_port: Arc<dyn BlockingFetchPort>,
    ) -> Self {
        Self {
            server,
            client_name: client_name.into(),
            protocol_version: protocol_version.into(),
            async_port,
            blocking_port,
        }
    }

    /// Create a client from the server, client name and protocol version of
    /// a validated [`CoreConfig`].
    pub fn from_config<P>(config: &CoreConfig, port: Arc<P>) -> Self
    where
        P: AsyncFetchPort + BlockingFetchPort + 'static,
    {
        Self::new(
            config.server.clone(),
            config.client_name.clone(),
            config.protocol_version.clone(),
            port,
        )
    }

    pub fn address(&self) -> &str {
        &self.server.address
    }

    /// Address without its scheme; the host part of entry locators.
    pub fn host(&self) -> &str {
        self.server.host()
    }

    /// Build the request URL for `operation`.
    ///
    /// Operation parameters come first, followed by `c`, `f`, `v`, `u` and
    /// `p`. Every value is percent-encoded.
    pub fn build_url(&self, operation: Operation, params: &[(&str, String)]) -> String {
        let fixed = [
            ("c", self.client_name.as_str()),
            ("f", RESPONSE_FORMAT),
            ("v", self.protocol_version.as_str()),
            ("u", self.server.username.as_str()),
            ("p", self.server.password.as_str()),
        ];

        let query = params
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .chain(fixed)
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}/rest/{}.view?{}",
            self.server.address,
            operation.as_str(),
            query
        )
    }

    /// Perform `operation` on the calling thread and decode the response.
    pub fn call<T: Decode>(&self, operation: Operation, params: Params) -> Result<T> {
        let url = self.build_url(operation, &params);
        debug!(
            operation = %operation,
            url = %redact_url_credentials(&url),
            "Blocking Subsonic request"
        );

        let document = self.blocking_port.fetch_blocking(&url)?;
        T::decode(document)
    }

    /// Issue `operation` and return immediately; `on_complete` receives the
    /// decoded response, or the transport error unchanged.
    pub fn call_async<T, F>(&self, operation: Operation, params: Params, on_complete: F)
    where
        T: Decode + 'static,
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let url = self.build_url(operation, &params);
        debug!(
            operation = %operation,
            url = %redact_url_credentials(&url),
            "Async Subsonic request"
        );

        self.async_port.fetch(
            url,
            Box::new(move |result| {
                on_complete(result.map_err(SubsonicError::from).and_then(T::decode));
            }),
        );
    }

    // ========================================================================
    // Operations
    // ========================================================================

    #[instrument(skip(self))]
    pub fn get_indexes(
        &self,
        music_folder_id: Option<&str>,
        if_modified_since: Option<i64>,
    ) -> Result<IndexesResponse> {
        self.call(
            Operation::GetIndexes,
            indexes_params(music_folder_id, if_modified_since),
        )
    }

    pub fn get_indexes_async<F>(
        &self,
        music_folder_id: Option<&str>,
        if_modified_since: Option<i64>,
        on_complete: F,
    ) where
        F: FnOnce(Result<IndexesResponse>) + Send + 'static,
    {
        self.call_async(
            Operation::GetIndexes,
            indexes_params(music_folder_id, if_modified_since),
            on_complete,
        )
    }

    pub fn get_license(&self) -> Result<LicenseResponse> {
        self.call(Operation::GetLicense, Params::new())
    }

    pub fn get_license_async<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<LicenseResponse>) + Send + 'static,
    {
        self.call_async(Operation::GetLicense, Params::new(), on_complete)
    }

    pub fn get_genres(&self) -> Result<GenresResponse> {
        self.call(Operation::GetGenres, Params::new())
    }

    pub fn get_genres_async<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<GenresResponse>) + Send + 'static,
    {
        self.call_async(Operation::GetGenres, Params::new(), on_complete)
    }

    #[instrument(skip(self))]
    pub fn get_music_directory(&self, id: &str) -> Result<DirectoryResponse> {
        self.call(Operation::GetMusicDirectory, vec![("id", id.to_string())])
    }

    pub fn get_music_directory_async<F>(&self, id: &str, on_complete: F)
    where
        F: FnOnce(Result<DirectoryResponse>) + Send + 'static,
    {
        self.call_async(
            Operation::GetMusicDirectory,
            vec![("id", id.to_string())],
            on_complete,
        )
    }

    pub fn get_music_folders(&self) -> Result<MusicFoldersResponse> {
        self.call(Operation::GetMusicFolders, Params::new())
    }

    pub fn get_music_folders_async<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<MusicFoldersResponse>) + Send + 'static,
    {
        self.call_async(Operation::GetMusicFolders, Params::new(), on_complete)
    }

    pub fn ping(&self) -> Result<PingResponse> {
        self.call(Operation::Ping, Params::new())
    }

    pub fn ping_async<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<PingResponse>) + Send + 'static,
    {
        self.call_async(Operation::Ping, Params::new(), on_complete)
    }
}

fn indexes_params(music_folder_id: Option<&str>, if_modified_since: Option<i64>) -> Params {
    let mut params = Params::new();
    if let Some(id) = music_folder_id {
        params.push(("musicFolderId", id.to_string()));
    }
    if let Some(since) = if_modified_since {
        params.push(("ifModifiedSince", since.to_string()));
    }
    params
}
