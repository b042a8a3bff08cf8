//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into a running sync engine:
//! the remote client, fetch ports, SQLite catalog, event bus and
//! coordinator. Desktop hosts enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`) and call [`SyncService::new`]; other hosts
//! bring their own fetch port through [`SyncService::with_fetcher`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::fetch::{AsyncFetchPort, BlockingFetchPort};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{EntryRepository, LocalEntry, SqliteEntryRepository};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver, DEFAULT_EVENT_BUFFER_SIZE};
use core_sync::{SyncCoordinator, SyncStats};
use provider_subsonic::{LicenseResponse, PingResponse, SubsonicClient};
use tokio::sync::{oneshot, Mutex};
use tracing::info;

pub use core_runtime::config::{ServerConfig, SyncSettings};

/// Primary façade exposed to host applications.
pub struct SyncService {
    client: SubsonicClient,
    repository: Arc<dyn EntryRepository>,
    event_bus: EventBus,
    coordinator: Mutex<SyncCoordinator>,
}

impl SyncService {
    /// Build the service on the current tokio runtime with the configured
    /// HTTP client.
    ///
    /// Opens (and migrates) the catalog at `config.database_path`.
    #[cfg(feature = "desktop-shims")]
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let fetcher = bridge_desktop::HttpFetcher::from_current(
            Arc::clone(&config.http_client),
            config.sync.fetch_timeout,
        )?;
        Self::with_fetcher(config, Arc::new(fetcher)).await
    }

    /// Build the service over a host-provided fetch port.
    pub async fn with_fetcher<P>(config: CoreConfig, fetcher: Arc<P>) -> Result<Self>
    where
        P: AsyncFetchPort + BlockingFetchPort + 'static,
    {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let repository: Arc<dyn EntryRepository> = Arc::new(SqliteEntryRepository::new(pool));

        Ok(Self::from_parts(config, fetcher, repository))
    }

    /// Assemble the service from already-constructed parts.
    pub fn from_parts<P>(
        config: CoreConfig,
        fetcher: Arc<P>,
        repository: Arc<dyn EntryRepository>,
    ) -> Self
    where
        P: AsyncFetchPort + BlockingFetchPort + 'static,
    {
        let client = SubsonicClient::from_config(&config, fetcher);
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);
        let coordinator =
            SyncCoordinator::new(client.clone(), Arc::clone(&repository), config.sync.clone())
                .with_event_bus(event_bus.clone());

        info!(
            server = %client.host(),
            client_name = %config.client_name,
            protocol_version = %config.protocol_version,
            "Sync service ready"
        );

        Self {
            client,
            repository,
            event_bus,
            coordinator: Mutex::new(coordinator),
        }
    }

    /// Ping the server; fails on transport errors and bad credentials.
    pub async fn verify_connection(&self) -> Result<PingResponse> {
        let (tx, rx) = oneshot::channel();
        self.client.ping_async(move |result| {
            let _ = tx.send(result);
        });
        let response = rx
            .await
            .map_err(|_| CoreError::InitializationFailed("ping completion dropped".to_string()))??;
        response.envelope.error_for_status()?;

        info!(version = %response.envelope.version, "Server reachable");
        Ok(response)
    }

    pub async fn license(&self) -> Result<LicenseResponse> {
        let (tx, rx) = oneshot::channel();
        self.client.get_license_async(move |result| {
            let _ = tx.send(result);
        });
        Ok(rx
            .await
            .map_err(|_| CoreError::InitializationFailed("license completion dropped".to_string()))??)
    }

    /// Run one full sync to quiescence.
    ///
    /// Concurrent callers are serialized.
    pub async fn sync_now(&self) -> Result<SyncStats> {
        let mut coordinator = self.coordinator.lock().await;
        coordinator.update();
        Ok(coordinator.run().await?)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn client(&self) -> &SubsonicClient {
        &self.client
    }

    /// Every stored entry, ordered by locator.
    pub async fn entries(&self) -> Result<Vec<LocalEntry>> {
        Ok(self.repository.find_all().await?)
    }

    pub async fn entry_count(&self) -> Result<i64> {
        Ok(self.repository.count().await?)
    }
}
