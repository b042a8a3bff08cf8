//! Integration tests for the Subsonic client
//!
//! A routing fetch port serves canned documents shaped like real server
//! output, so the tests cover URL building, decoding and both call styles
//! end to end without a network.

use bridge_traits::error::BridgeError;
use bridge_traits::fetch::{AsyncFetchPort, BlockingFetchPort, FetchCallback, FetchResult};
use core_runtime::config::ServerConfig;
use provider_subsonic::{Operation, SubsonicClient, SubsonicError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Implementations
// ============================================================================

/// Serves documents keyed by `{operation}` or `{operation}:{id}`.
#[derive(Default)]
struct RoutingPort {
    routes: HashMap<String, Value>,
    pending: Mutex<Vec<(String, FetchCallback)>>,
}

impl RoutingPort {
    fn route(mut self, key: &str, payload: Value) -> Self {
        let mut body = json!({ "status": "ok", "version": "1.16.1" });
        if let (Value::Object(body), Value::Object(extra)) = (&mut body, payload) {
            body.extend(extra);
        }
        self.routes
            .insert(key.to_string(), json!({ "subsonic-response": body }));
        self
    }

    fn resolve(&self, url: &str) -> FetchResult {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let operation = path
            .rsplit('/')
            .next()
            .and_then(|s| s.strip_suffix(".view"))
            .unwrap_or_default();
        let id = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("id="));

        let key = match id {
            Some(id) => format!("{}:{}", operation, id),
            None => operation.to_string(),
        };

        self.routes
            .get(&key)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("HTTP 404 for {}", key)))
    }

    fn flush(&self) -> usize {
        let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let count = pending.len();
        for (url, callback) in pending {
            callback(self.resolve(&url));
        }
        count
    }
}

impl BlockingFetchPort for RoutingPort {
    fn fetch_blocking(&self, url: &str) -> FetchResult {
        self.resolve(url)
    }
}

impl AsyncFetchPort for RoutingPort {
    fn fetch(&self, url: String, on_complete: FetchCallback) {
        self.pending.lock().unwrap().push((url, on_complete));
    }
}

fn library() -> RoutingPort {
    RoutingPort::default()
        .route("ping", json!({}))
        .route(
            "getLicense",
            json!({ "license": { "valid": true, "email": "admin@example.com", "date": "2024-01-31T08:15:00" } }),
        )
        .route(
            "getMusicFolders",
            json!({ "musicFolders": { "musicFolder": [ { "id": 0, "name": "Music" }, { "id": 1, "name": "Podcasts" } ] } }),
        )
        .route(
            "getGenres",
            json!({ "genres": { "genre": { "value": "Electronic", "songCount": 2, "albumCount": 1 } } }),
        )
        .route(
            "getIndexes",
            json!({ "indexes": {
                "ignoredArticles": "The Los",
                "lastModified": 1_706_688_900_000_i64,
                "index": { "name": "D", "artist": { "id": "ar-1", "name": "Daft Punk" } }
            } }),
        )
        .route(
            "getMusicDirectory:ar-1",
            json!({ "directory": {
                "id": "ar-1", "name": "Daft Punk",
                "child": { "id": "al-1", "parent": "ar-1", "isDir": true, "title": "Discovery" }
            } }),
        )
        .route(
            "getMusicDirectory:al-1",
            json!({ "directory": {
                "id": "al-1", "name": "Discovery",
                "child": [
                    { "id": "so-1", "parent": "al-1", "isDir": false, "title": "One More Time",
                      "album": "Discovery", "artist": "Daft Punk", "year": 2001, "track": 1,
                      "genre": "Electronic", "size": 7_680_000, "duration": 320 },
                    { "id": "so-2", "parent": "al-1", "isDir": false, "title": "Aerodynamic",
                      "album": "Discovery", "artist": "Daft Punk", "year": 2001, "track": 2,
                      "duration": 212 }
                ]
            } }),
        )
}

fn client(port: Arc<RoutingPort>) -> SubsonicClient {
    SubsonicClient::new(
        ServerConfig::new("https://music.example.com", "admin", "secret"),
        "integration",
        "1.10.1",
        port,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_blocking_walk_of_hierarchy() {
    let client = client(Arc::new(library()));

    let indexes = client.get_indexes(None, None).unwrap();
    assert_eq!(indexes.ignored_articles, vec!["The", "Los"]);
    assert_eq!(indexes.artists.len(), 1);

    let artist = client.get_music_directory(&indexes.artists[0].id).unwrap();
    assert_eq!(artist.children.len(), 1);
    assert!(artist.children[0].is_dir);

    let album = client.get_music_directory(&artist.children[0].id).unwrap();
    let titles: Vec<_> = album
        .children
        .iter()
        .filter_map(|c| c.title.as_deref())
        .collect();
    assert_eq!(titles, vec!["One More Time", "Aerodynamic"]);
    assert_eq!(album.children[1].genre, None);
    assert_eq!(album.children[1].duration, Some(212));
}

#[test]
fn test_server_metadata_operations() {
    let client = client(Arc::new(library()));

    assert!(client.ping().unwrap().envelope.status);

    let license = client.get_license().unwrap();
    assert!(license.valid);
    assert_eq!(license.date.to_string(), "2024-01-31 08:15:00");

    let folders = client.get_music_folders().unwrap();
    assert_eq!(folders.folders[1].name.as_deref(), Some("Podcasts"));

    let genres = client.get_genres().unwrap();
    assert_eq!(genres.genres.len(), 1);
    assert_eq!(genres.genres[0].album_count, Some(1));
}

#[test]
fn test_async_calls_complete_on_flush() {
    let port = Arc::new(library());
    let client = client(port.clone());
    let log = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&log);
    client.ping_async(move |result| sink.lock().unwrap().push(format!("ping:{}", result.is_ok())));
    let sink = Arc::clone(&log);
    client.get_music_directory_async("missing", move |result| {
        let transport = matches!(result, Err(ref e) if e.is_transport());
        sink.lock().unwrap().push(format!("dir:{}", transport));
    });

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(port.flush(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["ping:true", "dir:true"]);
}

#[test]
fn test_unknown_directory_is_transport_error() {
    let client = client(Arc::new(library()));

    let result = client.get_music_directory("nope");
    assert!(matches!(result, Err(SubsonicError::BridgeError(_))));
}

#[test]
fn test_every_operation_has_a_view_path() {
    let client = client(Arc::new(RoutingPort::default()));

    for operation in [
        Operation::GetIndexes,
        Operation::GetLicense,
        Operation::GetGenres,
        Operation::GetMusicDirectory,
        Operation::GetMusicFolders,
        Operation::Ping,
    ] {
        let url = client.build_url(operation, &[]);
        assert!(url.starts_with(&format!(
            "https://music.example.com/rest/{}.view?c=integration&f=json&v=1.10.1",
            operation
        )));
    }
}
