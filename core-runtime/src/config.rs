//! # Core Configuration Module
//!
//! Configuration for the catalog sync engine.
//!
//! ## Overview
//!
//! A `CoreConfig` is assembled with [`CoreConfig::builder`] and validated
//! before it is returned, so a misconfigured server or a missing bridge is
//! reported at startup instead of on the first sync.
//!
//! ## Required settings
//!
//! - [`ServerConfig`] - address and credentials of the music server
//! - `database_path` - where the local catalog lives
//!
//! ## Optional settings (with defaults)
//!
//! - `HttpClient` - desktop default: reqwest (`desktop-shims` feature)
//! - `client_name` - `c` parameter sent with every request
//! - `protocol_version` - `v` parameter, defaults to `1.10.1`
//! - [`SyncSettings`] - in-flight cap per stage, fetch timeout, progress cadence
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ServerConfig};
//!
//! let config = CoreConfig::builder()
//!     .server(ServerConfig::new("https://music.example.com", "alice", "s3cret"))
//!     .database_path("/var/lib/subsonic-sync/catalog.db")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Protocol version sent as `v` unless overridden.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.10.1";

/// Client identifier sent as `c` unless overridden.
pub const DEFAULT_CLIENT_NAME: &str = "subsonic-sync";

pub const ENV_ADDRESS: &str = "SUBSONIC_ADDRESS";
pub const ENV_USERNAME: &str = "SUBSONIC_USERNAME";
pub const ENV_PASSWORD: &str = "SUBSONIC_PASSWORD";

// ============================================================================
// Server
// ============================================================================

/// Address and credentials of a remote music server.
///
/// Read once when the remote client is constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://music.example.com`. A trailing `/` is trimmed.
    pub address: String,
    pub username: String,
    pub password: String,
}

impl ServerConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let address: String = address.into();
        Self {
            address: address.trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load server settings from `SUBSONIC_ADDRESS`, `SUBSONIC_USERNAME`
    /// and `SUBSONIC_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .map_err(|_| Error::Config(format!("Environment variable {} is not set", key)))
        };

        let config = Self::new(read(ENV_ADDRESS)?, read(ENV_USERNAME)?, read(ENV_PASSWORD)?);
        config.validate()?;
        Ok(config)
    }

    /// Host portion of the address, used in entry locators.
    ///
    /// `https://music.example.com:4040/sub` yields `music.example.com:4040/sub`.
    pub fn host(&self) -> &str {
        self.address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.address)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(Error::Config("Server address cannot be empty".to_string()));
        }

        if !(self.address.starts_with("http://") || self.address.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Server address must start with http:// or https://, got '{}'",
                self.address
            )));
        }

        if self.username.is_empty() {
            return Err(Error::Config("Server username cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Sync tuning
// ============================================================================

/// Tuning knobs for the sync pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Maximum directory fetches a single stage may have outstanding.
    /// A stage at its cap reports itself as processing.
    pub max_in_flight: usize,

    /// Upper bound on a single fetch. Guarantees every completion fires.
    pub fetch_timeout: Duration,

    /// Emit a progress event every this many scheduler ticks.
    pub progress_every_ticks: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            fetch_timeout: Duration::from_secs(30),
            progress_every_ticks: 50,
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(Error::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }

        if self.max_in_flight > 64 {
            return Err(Error::Config(format!(
                "max_in_flight of {} exceeds the limit of 64",
                self.max_in_flight
            )));
        }

        if self.fetch_timeout.is_zero() {
            return Err(Error::Config(
                "fetch_timeout must be greater than zero".to_string(),
            ));
        }

        if self.progress_every_ticks == 0 {
            return Err(Error::Config(
                "progress_every_ticks must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// CoreConfig
// ============================================================================

/// Core configuration for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub server: ServerConfig,

    /// Path to the SQLite catalog database
    pub database_path: PathBuf,

    /// Sent as the `c` request parameter
    pub client_name: String,

    /// Sent as the `v` request parameter
    pub protocol_version: String,

    pub sync: SyncSettings,

    /// HTTP client used by the fetch ports
    pub http_client: Arc<dyn HttpClient>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("server", &self.server)
            .field("database_path", &self.database_path)
            .field("client_name", &self.client_name)
            .field("protocol_version", &self.protocol_version)
            .field("sync", &self.sync)
            .field("http_client", &"HttpClient { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.sync.validate()?;

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.client_name.trim().is_empty() {
            return Err(Error::Config("Client name cannot be empty".to_string()));
        }

        if self.protocol_version.split('.').count() != 3
            || self
                .protocol_version
                .split('.')
                .any(|part| part.parse::<u32>().is_err())
        {
            return Err(Error::Config(format!(
                "Protocol version must look like MAJOR.MINOR.PATCH, got '{}'",
                self.protocol_version
            )));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Other hosts: inject an implementation with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    server: Option<ServerConfig>,
    database_path: Option<PathBuf>,
    client_name: Option<String>,
    protocol_version: Option<String>,
    sync: Option<SyncSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl CoreConfigBuilder {
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    /// Inject a custom HTTP client (otherwise the desktop default is used).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configuration, filling defaults and validating.
    pub fn build(self) -> Result<CoreConfig> {
        let server = self.server.ok_or_else(|| {
            Error::Config("Server settings are required. Use .server() to set them.".to_string())
        })?;

        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let sync = self.sync.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(sync.fetch_timeout)?,
        };

        let config = CoreConfig {
            server,
            database_path,
            client_name: self
                .client_name
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
            protocol_version: self
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            sync,
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}
