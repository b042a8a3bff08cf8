//! # Pipeline Stages
//!
//! - [`ArtistStage`]: fetches an artist's directory and feeds its albums
//!   into the album queue
//! - [`AlbumStage`]: fetches an album's directory and feeds its songs into
//!   the song queue
//! - [`SongStage`]: upserts one song into the local store
//!
//! The two directory stages return as soon as the request is issued. The
//! downstream queue is marked refreshing first and receives exactly one
//! delivery when the fetch completes, whether it succeeded or not.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_library::{EntryField, EntryRepository, LibraryError, LocalEntry, Locator};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use provider_subsonic::{Artist, Child, SubsonicClient};
use tracing::{debug, warn};

use crate::error::Result;
use crate::queue::{InboxHandle, Stage, StageOutcome};

// ============================================================================
// Run counters
// ============================================================================

/// Counters shared by the stages and their fetch completions.
#[derive(Debug, Default)]
pub struct SyncCounters {
    pub directories_fetched: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub songs_committed: AtomicU64,
    pub songs_skipped: AtomicU64,
}

impl SyncCounters {
    pub fn reset(&self) {
        self.directories_fetched.store(0, Ordering::SeqCst);
        self.fetch_failures.store(0, Ordering::SeqCst);
        self.songs_committed.store(0, Ordering::SeqCst);
        self.songs_skipped.store(0, Ordering::SeqCst);
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Directory stages
// ============================================================================

/// Item whose children are listed by `getMusicDirectory`.
pub trait DirectoryItem: Send + 'static {
    fn directory_id(&self) -> &str;
}

impl DirectoryItem for Artist {
    fn directory_id(&self) -> &str {
        &self.id
    }
}

impl DirectoryItem for Child {
    fn directory_id(&self) -> &str {
        &self.id
    }
}

/// Expands an item into its directory children on the next queue.
pub struct DirectoryStage<I> {
    name: &'static str,
    client: SubsonicClient,
    next: InboxHandle<Child>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
    counters: Arc<SyncCounters>,
    _item: PhantomData<fn(I)>,
}

/// Artist → albums.
pub type ArtistStage = DirectoryStage<Artist>;

/// Album → songs.
pub type AlbumStage = DirectoryStage<Child>;

impl<I: DirectoryItem> DirectoryStage<I> {
    pub fn new(
        name: &'static str,
        client: SubsonicClient,
        next: InboxHandle<Child>,
        max_in_flight: usize,
        counters: Arc<SyncCounters>,
    ) -> Self {
        Self {
            name,
            client,
            next,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: max_in_flight.max(1),
            counters,
            _item: PhantomData,
        }
    }

    /// Fetches issued and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Point the stage at a fresh downstream inbox and counters.
    ///
    /// Completions of fetches issued before this call keep updating the
    /// previous inbox, in-flight count and counters only.
    pub fn reattach(&mut self, next: InboxHandle<Child>, counters: Arc<SyncCounters>) {
        self.next = next;
        self.counters = counters;
        self.in_flight = Arc::new(AtomicUsize::new(0));
    }
}

#[async_trait]
impl<I: DirectoryItem> Stage for DirectoryStage<I> {
    type Item = I;

    async fn process_one(&mut self, item: I) -> Result<StageOutcome> {
        let id = item.directory_id().to_string();
        let stage = self.name;

        self.next.refreshing();
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let next = self.next.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let counters = Arc::clone(&self.counters);

        debug!(stage, id = %id, "Fetching directory");
        let fetch_id = id.clone();
        self.client
            .get_music_directory_async(&fetch_id, move |result| {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                match result {
                    Ok(directory) => {
                        SyncCounters::bump(&counters.directories_fetched);
                        debug!(
                            stage,
                            id = %directory.id,
                            children = directory.children.len(),
                            "Directory fetched"
                        );
                        next.extend(directory.children);
                    }
                    Err(e) => {
                        SyncCounters::bump(&counters.fetch_failures);
                        warn!(stage, id = %id, error = %e, "Directory fetch failed");
                        next.refreshed();
                    }
                }
            });

        Ok(StageOutcome::Dispatched)
    }

    fn saturated(&self) -> bool {
        self.in_flight() >= self.max_in_flight
    }
}

impl<I> fmt::Debug for DirectoryStage<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryStage")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

// ============================================================================
// Song stage
// ============================================================================

/// Writes songs into the local store, keyed by locator.
pub struct SongStage {
    repository: Arc<dyn EntryRepository>,
    host: String,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    counters: Arc<SyncCounters>,
}

impl SongStage {
    /// `host` is the server address without scheme.
    pub fn new(
        repository: Arc<dyn EntryRepository>,
        host: impl Into<String>,
        counters: Arc<SyncCounters>,
    ) -> Self {
        Self {
            repository,
            host: host.into(),
            clock: Arc::new(SystemClock),
            event_bus: None,
            counters,
        }
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn set_event_bus(&mut self, event_bus: EventBus) {
        self.event_bus = Some(event_bus);
    }

    pub fn set_counters(&mut self, counters: Arc<SyncCounters>) {
        self.counters = counters;
    }

    fn skip(&self, song: &Child, reason: String) -> StageOutcome {
        SyncCounters::bump(&self.counters.songs_skipped);
        debug!(id = %song.id, reason = %reason, "Song skipped");
        StageOutcome::Skipped(reason)
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Library(event)).ok();
        }
    }
}

/// Album, artist, title and year, or the name of the first one missing.
fn mandatory_fields(song: &Child) -> std::result::Result<[EntryField; 4], &'static str> {
    fn required<T: Clone>(value: &Option<T>, name: &'static str) -> std::result::Result<T, &'static str> {
        value.clone().ok_or(name)
    }

    Ok([
        EntryField::Album(required(&song.album, "album")?),
        EntryField::Artist(required(&song.artist, "artist")?),
        EntryField::Title(required(&song.title, "title")?),
        EntryField::Year(required(&song.year, "year")?),
    ])
}

/// Duration, size, genre and track, each only when present and sane.
fn optional_fields(song: &Child) -> Vec<EntryField> {
    let mut fields = Vec::new();
    if let Some(duration) = song.duration.filter(|d| *d >= 0) {
        fields.push(EntryField::Duration(duration));
    }
    if let Some(size) = song.size.filter(|s| *s >= 0) {
        fields.push(EntryField::FileSize(size));
    }
    if let Some(genre) = &song.genre {
        fields.push(EntryField::Genre(genre.clone()));
    }
    if let Some(track) = song.track.filter(|t| *t > 0) {
        fields.push(EntryField::TrackNumber(track));
    }
    fields
}

#[async_trait]
impl Stage for SongStage {
    type Item = Child;

    async fn process_one(&mut self, song: Child) -> Result<StageOutcome> {
        let mandatory = match mandatory_fields(&song) {
            Ok(fields) => fields,
            Err(missing) => return Ok(self.skip(&song, format!("missing {}", missing))),
        };

        let locator = Locator::new(&self.host, &song.id);
        let now = self.clock.unix_timestamp();

        let (mut entry, is_new) = match self.repository.find_by_locator(&locator).await? {
            Some(mut existing) => {
                existing.touch(now.max(existing.created_at));
                (existing, false)
            }
            None => (LocalEntry::new(locator, now), true),
        };

        for field in mandatory.into_iter().chain(optional_fields(&song)) {
            entry.set(field);
        }

        match self.repository.commit(&entry).await {
            Ok(()) => {}
            Err(LibraryError::InvalidInput { message, .. }) => {
                return Ok(self.skip(&song, message));
            }
            Err(e) => return Err(e.into()),
        }

        SyncCounters::bump(&self.counters.songs_committed);
        debug!(locator = %entry.locator, is_new, "Song committed");

        if is_new {
            self.emit(LibraryEvent::EntryAdded {
                locator: entry.locator.to_string(),
                title: entry.title.clone().unwrap_or_default(),
            });
        } else {
            self.emit(LibraryEvent::EntryUpdated {
                locator: entry.locator.to_string(),
            });
        }

        Ok(StageOutcome::Committed)
    }
}

impl fmt::Debug for SongStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SongStage")
            .field("host", &self.host)
            .field("events", &self.event_bus.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Activation, SyncQueue};
    use bridge_traits::error::BridgeError;
    use bridge_traits::fetch::{AsyncFetchPort, BlockingFetchPort, FetchCallback, FetchResult};
    use bridge_traits::time::FixedClock;
    use core_library::db::create_test_pool;
    use core_library::SqliteEntryRepository;
    use core_runtime::config::ServerConfig;
    use std::sync::Mutex;

    /// Holds completions until the test fails them.
    #[derive(Default)]
    struct HeldPort {
        pending: Mutex<Vec<(String, FetchCallback)>>,
    }

    impl HeldPort {
        fn fail_all(&self) -> Vec<String> {
            let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
            let mut urls = Vec::new();
            for (url, callback) in pending {
                callback(Err(BridgeError::OperationFailed("HTTP 503".to_string())));
                urls.push(url);
            }
            urls
        }
    }

    impl AsyncFetchPort for HeldPort {
        fn fetch(&self, url: String, on_complete: FetchCallback) {
            self.pending.lock().unwrap().push((url, on_complete));
        }
    }

    impl BlockingFetchPort for HeldPort {
        fn fetch_blocking(&self, _url: &str) -> FetchResult {
            Err(BridgeError::NotAvailable("blocking".to_string()))
        }
    }

    fn song(id: &str) -> Child {
        Child {
            id: id.to_string(),
            title: Some("Harder, Better, Faster, Stronger".to_string()),
            album: Some("Discovery".to_string()),
            artist: Some("Daft Punk".to_string()),
            year: Some(2001),
            track: Some(4),
            duration: Some(224),
            ..Child::default()
        }
    }

    async fn stage() -> (SongStage, Arc<SqliteEntryRepository>, Arc<SyncCounters>) {
        let repository = Arc::new(SqliteEntryRepository::new(create_test_pool().await.unwrap()));
        let counters = Arc::new(SyncCounters::default());
        let mut stage = SongStage::new(repository.clone(), "music.example.com", counters.clone());
        stage.set_clock(Arc::new(FixedClock::at_unix(1_000)));
        (stage, repository, counters)
    }

    #[tokio::test]
    async fn test_directory_failure_releases_next_queue() {
        let port = Arc::new(HeldPort::default());
        let client = SubsonicClient::new(
            ServerConfig::new("https://music.example.com", "u", "p"),
            "X",
            "1.10.1",
            port.clone(),
        );
        let (song_stage, _, _) = stage().await;
        let mut songs = SyncQueue::new("songs", song_stage, Activation::new());
        let counters = Arc::new(SyncCounters::default());
        let mut albums: AlbumStage =
            DirectoryStage::new("albums", client, songs.inbox(), 1, counters.clone());

        let album = Child {
            id: "al-7".to_string(),
            is_dir: true,
            ..Child::default()
        };
        let outcome = albums.process_one(album).await.unwrap();
        assert_eq!(outcome, StageOutcome::Dispatched);
        assert!(albums.saturated());
        assert!(songs.is_refreshing());

        let urls = port.fail_all();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("getMusicDirectory.view?id=al-7&"));

        assert_eq!(albums.in_flight(), 0);
        assert!(!albums.saturated());
        assert_eq!(songs.drain_inbox(), 1);
        assert!(songs.is_quiescent());
        assert_eq!(counters.fetch_failures.load(Ordering::SeqCst), 1);
        assert_eq!(counters.directories_fetched.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mandatory_fields_report_first_missing() {
        let mut incomplete = song("1");
        incomplete.artist = None;
        incomplete.year = None;

        assert_eq!(mandatory_fields(&incomplete).unwrap_err(), "artist");
        assert!(mandatory_fields(&song("1")).is_ok());
    }

    #[test]
    fn test_optional_fields_skip_missing_and_nonsense() {
        let mut partial = song("1");
        partial.genre = None;
        partial.size = Some(-1);
        partial.track = Some(0);

        assert_eq!(optional_fields(&partial), vec![EntryField::Duration(224)]);
    }

    #[tokio::test]
    async fn test_song_commit_uses_locator() {
        let (mut stage, repository, counters) = stage().await;

        let outcome = stage.process_one(song("so-9")).await.unwrap();
        assert_eq!(outcome, StageOutcome::Committed);

        let locator = Locator::new("music.example.com", "so-9");
        let stored = repository.find_by_locator(&locator).await.unwrap().unwrap();
        assert_eq!(stored.locator.as_str(), "subsonic://music.example.com/so-9");
        assert_eq!(stored.year, Some(2001));
        assert_eq!(stored.track_number, Some(4));
        assert_eq!(stored.genre, None);
        assert_eq!(stored.created_at, 1_000);
        assert_eq!(counters.songs_committed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_song_missing_year_is_skipped() {
        let (mut stage, repository, counters) = stage().await;
        let mut song = song("so-1");
        song.year = None;

        let outcome = stage.process_one(song).await.unwrap();
        assert_eq!(outcome, StageOutcome::Skipped("missing year".to_string()));
        assert_eq!(repository.count().await.unwrap(), 0);
        assert_eq!(counters.songs_skipped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_song_events() {
        let (mut stage, _, _) = stage().await;
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        stage.set_event_bus(bus);

        stage.process_one(song("so-1")).await.unwrap();
        stage.process_one(song("so-1")).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::EntryAdded { .. })
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::EntryUpdated {
                locator: "subsonic://music.example.com/so-1".to_string()
            })
        );
    }
}
