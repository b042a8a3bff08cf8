//! # Sync Coordinator
//!
//! Owns the artist → album → song cascade for one server and the
//! cooperative scheduler that drives it.
//!
//! ## Workflow
//!
//! 1. [`SyncCoordinator::update`] marks the artist queue refreshing and
//!    requests the artist index
//! 2. The index completion posts the artists to the artist queue
//! 3. Every [`tick`](SyncCoordinator::tick) visits artist, album and song
//!    queue in that order, handling at most one item per queue
//! 4. Directory completions post albums and songs downstream
//! 5. Once every queue is empty, idle and has no producer outstanding, the
//!    tick reports no more work and the scheduler deactivates
//!
//! Hosts with an idle loop call `tick` whenever they are idle and stop once
//! it returns `false`. Everyone else awaits [`run`](SyncCoordinator::run).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//!
//! let mut coordinator = SyncCoordinator::new(client, repository, settings)
//!     .with_event_bus(event_bus);
//! coordinator.update();
//! let stats = coordinator.run().await?;
//! println!("{} songs stored", stats.songs_committed);
//! ```

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bridge_traits::time::Clock;
use core_library::EntryRepository;
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use provider_subsonic::SubsonicClient;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::queue::{Activation, Stage, SyncQueue};
use crate::stages::{AlbumStage, ArtistStage, SongStage, SyncCounters};

/// Summary of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub run_id: Option<Uuid>,
    pub directories_fetched: u64,
    pub fetch_failures: u64,
    pub songs_committed: u64,
    pub songs_skipped: u64,
    pub ticks: u64,
    pub duration: Duration,
    /// Set when the artist index itself could not be fetched.
    pub index_error: Option<String>,
}

struct RunState {
    id: Uuid,
    started: Instant,
    ticks: u64,
}

/// Scheduler and owner of the three sync queues of one server.
pub struct SyncCoordinator {
    client: SubsonicClient,
    settings: SyncSettings,
    activation: Activation,
    artists: SyncQueue<ArtistStage>,
    albums: SyncQueue<AlbumStage>,
    songs: SyncQueue<SongStage>,
    counters: Arc<SyncCounters>,
    event_bus: Option<EventBus>,
    active: bool,
    progressed: bool,
    run: Option<RunState>,
    index_failure: Arc<Mutex<Option<String>>>,
    last_stats: Option<SyncStats>,
}

impl SyncCoordinator {
    pub fn new(
        client: SubsonicClient,
        repository: Arc<dyn EntryRepository>,
        settings: SyncSettings,
    ) -> Self {
        let activation = Activation::new();
        let counters = Arc::new(SyncCounters::default());

        let songs = SyncQueue::new(
            "songs",
            SongStage::new(repository, client.host(), Arc::clone(&counters)),
            activation.clone(),
        );
        let albums = SyncQueue::new(
            "albums",
            AlbumStage::new(
                "albums",
                client.clone(),
                songs.inbox(),
                settings.max_in_flight,
                Arc::clone(&counters),
            ),
            activation.clone(),
        );
        let artists = SyncQueue::new(
            "artists",
            ArtistStage::new(
                "artists",
                client.clone(),
                albums.inbox(),
                settings.max_in_flight,
                Arc::clone(&counters),
            ),
            activation.clone(),
        );

        Self {
            client,
            settings,
            activation,
            artists,
            albums,
            songs,
            counters,
            event_bus: None,
            active: false,
            progressed: false,
            run: None,
            index_failure: Arc::new(Mutex::new(None)),
            last_stats: None,
        }
    }

    /// Publish run and catalog events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.songs.stage_mut().set_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    /// Timestamp source for stored entries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.songs.stage_mut().set_clock(clock);
        self
    }

    /// Request the artist index and (re)start the scheduler.
    ///
    /// Calling it during a run feeds the index into the same run.
    #[instrument(skip(self), fields(server = %self.client.host()))]
    pub fn update(&mut self) {
        if self.run.is_none() {
            let run = RunState {
                id: Uuid::new_v4(),
                started: Instant::now(),
                ticks: 0,
            };
            info!(run_id = %run.id, "Sync started");
            self.emit(SyncEvent::Started {
                run_id: run.id.to_string(),
                server: self.client.host().to_string(),
            });
            self.run = Some(run);
        }

        let inbox = self.artists.inbox();
        let counters = Arc::clone(&self.counters);
        let failure = Arc::clone(&self.index_failure);

        inbox.refreshing();
        self.client
            .get_indexes_async(None, None, move |result| match result {
                Ok(indexes) => {
                    debug!(artists = indexes.artists.len(), "Artist index fetched");
                    inbox.extend(indexes.artists);
                }
                Err(e) => {
                    SyncCounters::bump(&counters.fetch_failures);
                    warn!(error = %e, "Artist index fetch failed");
                    if let Ok(mut slot) = failure.lock() {
                        *slot = Some(e.to_string());
                    }
                    inbox.refreshed();
                }
            });

        self.ensure_active();
    }

    /// Activate the scheduler unless it already is.
    ///
    /// Returns `true` if this call activated it.
    pub fn ensure_active(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        debug!("Scheduler activated");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True when a queue asked for the scheduler since the last tick.
    pub fn activation_requested(&self) -> bool {
        self.activation.is_requested()
    }

    /// One scheduler pass over artist, album and song queue.
    ///
    /// Returns `true` while work remains. Returns `false` once every queue
    /// is quiescent, after which the scheduler is inactive until a queue
    /// requests activation again. An error fails the run and empties every
    /// queue.
    pub async fn tick(&mut self) -> Result<bool> {
        if self.activation.take_request() {
            self.ensure_active();
        }
        if !self.active {
            return Ok(false);
        }

        let mut incomplete = Vec::with_capacity(3);
        let progressed = match self.visit_queues(&mut incomplete).await {
            Ok(progressed) => progressed,
            Err(e) => {
                self.abort(&e);
                return Err(e);
            }
        };
        self.progressed = progressed;

        let ticks = match self.run.as_mut() {
            Some(run) => {
                run.ticks += 1;
                run.ticks
            }
            None => 0,
        };
        if ticks > 0 && ticks % self.settings.progress_every_ticks.max(1) == 0 {
            self.emit_progress();
        }

        if incomplete.is_empty() {
            self.active = false;
            self.finish_run();
            return Ok(false);
        }

        trace!(?incomplete, progressed, "Work remains");
        Ok(true)
    }

    /// Drive the scheduler until every queue is quiescent.
    ///
    /// Between ticks without progress the loop sleeps until a fetch
    /// completion requests activation. If none arrives within twice the
    /// fetch timeout the run fails with [`SyncError::Stalled`].
    pub async fn run(&mut self) -> Result<SyncStats> {
        self.ensure_active();
        let stall_after = self.settings.fetch_timeout.saturating_mul(2);

        loop {
            if !self.tick().await? {
                break;
            }

            if !self.progressed
                && tokio::time::timeout(stall_after, self.activation.wait())
                    .await
                    .is_err()
            {
                let e = SyncError::Stalled(self.describe_pending());
                self.abort(&e);
                return Err(e);
            }
        }

        let stats = self.last_stats.clone().unwrap_or_default();
        match &stats.index_error {
            Some(message) => Err(SyncError::IndexFetch(message.clone())),
            None => Ok(stats),
        }
    }

    /// Stats of the most recently finished run.
    pub fn last_stats(&self) -> Option<&SyncStats> {
        self.last_stats.as_ref()
    }

    /// Items queued at the artist, album and song level.
    pub fn queue_depths(&self) -> (usize, usize, usize) {
        (self.artists.len(), self.albums.len(), self.songs.len())
    }

    pub fn is_quiescent(&self) -> bool {
        self.artists.is_quiescent() && self.albums.is_quiescent() && self.songs.is_quiescent()
    }

    // ========================================================================
    // Run bookkeeping
    // ========================================================================

    async fn visit_queues(&mut self, incomplete: &mut Vec<&'static str>) -> Result<bool> {
        let mut progressed = visit(&mut self.artists, incomplete).await?;
        progressed |= visit(&mut self.albums, incomplete).await?;
        progressed |= visit(&mut self.songs, incomplete).await?;
        Ok(progressed)
    }

    fn finish_run(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        let index_error = self.index_failure.lock().ok().and_then(|mut slot| slot.take());
        let stats = SyncStats {
            run_id: Some(run.id),
            directories_fetched: self.counters.directories_fetched.load(Ordering::SeqCst),
            fetch_failures: self.counters.fetch_failures.load(Ordering::SeqCst),
            songs_committed: self.counters.songs_committed.load(Ordering::SeqCst),
            songs_skipped: self.counters.songs_skipped.load(Ordering::SeqCst),
            ticks: run.ticks,
            duration: run.started.elapsed(),
            index_error,
        };

        match &stats.index_error {
            Some(message) => {
                warn!(run_id = %run.id, error = %message, "Sync failed");
                self.emit(SyncEvent::Failed {
                    run_id: run.id.to_string(),
                    message: message.clone(),
                });
            }
            None => {
                info!(
                    run_id = %run.id,
                    songs_committed = stats.songs_committed,
                    songs_skipped = stats.songs_skipped,
                    fetch_failures = stats.fetch_failures,
                    ticks = stats.ticks,
                    duration_ms = stats.duration.as_millis() as u64,
                    "Sync completed"
                );
                self.emit(SyncEvent::Completed {
                    run_id: run.id.to_string(),
                    songs_committed: stats.songs_committed,
                    songs_skipped: stats.songs_skipped,
                    fetch_failures: stats.fetch_failures,
                    duration_secs: stats.duration.as_secs(),
                });
            }
        }

        self.counters.reset();
        self.last_stats = Some(stats);
    }

    fn abort(&mut self, error: &SyncError) {
        self.active = false;
        if let Some(run) = self.run.take() {
            warn!(run_id = %run.id, error = %error, "Sync aborted");
            self.emit(SyncEvent::Failed {
                run_id: run.id.to_string(),
                message: error.to_string(),
            });
        }
        self.reset_pipeline();
    }

    /// Empty every queue and detach completions still outstanding, so the
    /// next `update()` starts from a clean cascade.
    fn reset_pipeline(&mut self) {
        self.counters = Arc::new(SyncCounters::default());
        self.index_failure = Arc::new(Mutex::new(None));
        self.progressed = false;

        self.songs.reset();
        self.songs.stage_mut().set_counters(Arc::clone(&self.counters));

        self.albums.reset();
        let songs = self.songs.inbox();
        self.albums
            .stage_mut()
            .reattach(songs, Arc::clone(&self.counters));

        self.artists.reset();
        let albums = self.albums.inbox();
        self.artists
            .stage_mut()
            .reattach(albums, Arc::clone(&self.counters));

        debug!("Pipeline reset");
    }

    fn emit_progress(&self) {
        let Some(run) = &self.run else {
            return;
        };
        let (artists, albums, songs) = self.queue_depths();
        debug!(artists, albums, songs, "Sync progress");
        self.emit(SyncEvent::Progress {
            run_id: run.id.to_string(),
            artists_pending: artists as u64,
            albums_pending: albums as u64,
            songs_pending: songs as u64,
            songs_committed: self.counters.songs_committed.load(Ordering::SeqCst),
        });
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    fn describe_pending(&self) -> String {
        [
            format!("{:?}", self.artists),
            format!("{:?}", self.albums),
            format!("{:?}", self.songs),
        ]
        .join(", ")
    }
}

/// Visit one queue: apply its inbox, then handle one item unless it is busy.
///
/// Pushes the queue's name onto `incomplete` if it still has work and
/// returns whether anything changed.
async fn visit<S: Stage>(
    queue: &mut SyncQueue<S>,
    incomplete: &mut Vec<&'static str>,
) -> Result<bool> {
    let mut progressed = queue.drain_inbox() > 0;

    if queue.is_processing() {
        incomplete.push(queue.name());
        return Ok(progressed);
    }

    let drained = queue.process(1).await?;
    progressed |= !drained;

    if queue.is_refreshing() || queue.is_processing() || !queue.is_empty() {
        incomplete.push(queue.name());
    }
    Ok(progressed)
}
