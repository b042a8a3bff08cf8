//! Subsonic API response types
//!
//! Every response arrives wrapped in a `subsonic-response` object carrying
//! `status` and `version`, plus one payload key named after the operation.
//! The JSON rendering of the protocol is loose in a few places these types
//! absorb at the boundary:
//!
//! - ids may be strings or numbers (normalized to `String`)
//! - a repeated element with a single occurrence is sent as an object, not
//!   a one-element list, and with zero occurrences the key is omitted
//! - numeric metadata is occasionally sent as a string
//!
//! See: http://www.subsonic.org/pages/api.jsp

use chrono::{DateTime, NaiveDateTime};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SubsonicError};

/// Root key of every response document.
pub const ROOT_KEY: &str = "subsonic-response";

/// Date format of `license.date`.
pub const LICENSE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Decoding of a complete response document into a typed response.
pub trait Decode: Sized {
    fn decode(document: Value) -> Result<Self>;
}

// ============================================================================
// Envelope
// ============================================================================

/// Fields common to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// `status == "ok"`
    pub status: bool,
    pub version: String,
    /// The `error` element of a failed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiFailure>,
}

impl Envelope {
    /// Turn a failed status into [`SubsonicError::ApiError`].
    pub fn error_for_status(&self) -> Result<()> {
        if self.status {
            return Ok(());
        }
        let (code, message) = match &self.error {
            Some(failure) => (failure.code, failure.message.clone()),
            None => (0, "request failed without an error element".to_string()),
        };
        Err(SubsonicError::ApiError { code, message })
    }
}

/// Error element of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Envelope plus the remaining payload keys of one document.
struct Document {
    envelope: Envelope,
    payload: Map<String, Value>,
}

impl Document {
    /// Split a document into envelope and payload, whatever its status.
    fn read(document: Value) -> Result<Self> {
        let Value::Object(mut root) = document else {
            return Err(SubsonicError::ParseError(
                "response is not a JSON object".to_string(),
            ));
        };

        let Some(Value::Object(mut payload)) = root.remove(ROOT_KEY) else {
            return Err(SubsonicError::ParseError(format!(
                "response has no '{}' object",
                ROOT_KEY
            )));
        };

        let status = payload.remove("status").and_then(|v| v.as_str().map(str::to_owned));
        let version = payload
            .remove("version")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let error = payload
            .remove("error")
            .map(serde_json::from_value::<ApiFailure>)
            .transpose()?;

        Ok(Self {
            envelope: Envelope {
                status: status.as_deref() == Some("ok"),
                version,
                error,
            },
            payload,
        })
    }

    /// Like [`read`](Self::read), but a failed status is an error.
    fn parse(document: Value) -> Result<Self> {
        let document = Self::read(document)?;
        document.envelope.error_for_status()?;
        Ok(document)
    }

    fn take<T: DeserializeOwned>(&mut self, key: &'static str) -> Result<T> {
        let value = self
            .payload
            .remove(key)
            .ok_or(SubsonicError::MissingPayload(key))?;
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Artist entry of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
}

/// Entry of a music directory: an album (directory) or a song (file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent: Option<String>,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub track: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub genre: Option<String>,
    /// Bytes
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub size: Option<i64>,
    /// Seconds
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicFolder {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    /// Genre name (the protocol calls it `value`)
    #[serde(rename = "value", default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub song_count: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub album_count: Option<i64>,
}

// ============================================================================
// Typed responses
// ============================================================================

/// `ping`: envelope only.
///
/// A failed status decodes to `envelope.status == false` with the server's
/// error element, so callers can tell bad credentials from a dead server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub envelope: Envelope,
}

impl Decode for PingResponse {
    fn decode(document: Value) -> Result<Self> {
        let document = Document::read(document)?;
        Ok(Self {
            envelope: document.envelope,
        })
    }
}

/// `getLicense`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseResponse {
    pub envelope: Envelope,
    pub valid: bool,
    pub email: Option<String>,
    pub key: Option<String>,
    pub date: NaiveDateTime,
}

#[derive(Deserialize)]
struct RawLicense {
    #[serde(default)]
    valid: bool,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Parse `license.date`.
///
/// The canonical form is `%Y-%m-%dT%H:%M:%S`; servers that append
/// fractional seconds and a zone (`2017-04-05T10:42:34.000Z`) are accepted
/// as RFC 3339 and converted to naive UTC.
pub fn parse_license_date(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, LICENSE_DATE_FORMAT)
        .or_else(|first| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.naive_utc())
                .map_err(|_| first)
        })
        .map_err(|e| SubsonicError::InvalidDate {
            value: value.to_string(),
            message: e.to_string(),
        })
}

impl Decode for LicenseResponse {
    fn decode(document: Value) -> Result<Self> {
        let mut document = Document::parse(document)?;
        let raw: RawLicense = document.take("license")?;

        let date = raw.date.ok_or_else(|| SubsonicError::InvalidDate {
            value: String::new(),
            message: "license has no date".to_string(),
        })?;

        Ok(Self {
            envelope: document.envelope,
            valid: raw.valid,
            email: raw.email,
            key: raw.key,
            date: parse_license_date(&date)?,
        })
    }
}

/// `getIndexes`: the alphabetical artist index, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexesResponse {
    pub envelope: Envelope,
    /// Articles the server ignores when sorting, e.g. `["The", "El", "La"]`
    pub ignored_articles: Vec<String>,
    /// Server-side modification time in milliseconds, for `ifModifiedSince`
    pub last_modified: Option<i64>,
    /// Every artist of every heading, in server order
    pub artists: Vec<Artist>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIndexes {
    #[serde(default)]
    ignored_articles: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    last_modified: Option<i64>,
    #[serde(default, deserialize_with = "de_one_or_many")]
    index: Vec<RawIndex>,
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(default, deserialize_with = "de_one_or_many")]
    artist: Vec<Artist>,
}

impl Decode for IndexesResponse {
    fn decode(document: Value) -> Result<Self> {
        let mut document = Document::parse(document)?;
        let raw: RawIndexes = document.take("indexes")?;

        Ok(Self {
            envelope: document.envelope,
            ignored_articles: raw
                .ignored_articles
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            last_modified: raw.last_modified,
            artists: raw.index.into_iter().flat_map(|i| i.artist).collect(),
        })
    }
}

/// `getMusicDirectory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResponse {
    pub envelope: Envelope,
    pub id: String,
    pub name: Option<String>,
    pub parent: Option<String>,
    /// Absent `child` decodes to empty, a single object to one element.
    pub children: Vec<Child>,
}

#[derive(Deserialize)]
struct RawDirectory {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    parent: Option<String>,
    #[serde(default, deserialize_with = "de_one_or_many")]
    child: Vec<Child>,
}

impl Decode for DirectoryResponse {
    fn decode(document: Value) -> Result<Self> {
        let mut document = Document::parse(document)?;
        let raw: RawDirectory = document.take("directory")?;

        Ok(Self {
            envelope: document.envelope,
            id: raw.id,
            name: raw.name,
            parent: raw.parent,
            children: raw.child,
        })
    }
}

/// `getMusicFolders`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicFoldersResponse {
    pub envelope: Envelope,
    pub folders: Vec<MusicFolder>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMusicFolders {
    #[serde(default, deserialize_with = "de_one_or_many")]
    music_folder: Vec<MusicFolder>,
}

impl Decode for MusicFoldersResponse {
    fn decode(document: Value) -> Result<Self> {
        let mut document = Document::parse(document)?;
        let raw: RawMusicFolders = document.take("musicFolders")?;

        Ok(Self {
            envelope: document.envelope,
            folders: raw.music_folder,
        })
    }
}

/// `getGenres`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenresResponse {
    pub envelope: Envelope,
    pub genres: Vec<Genre>,
}

#[derive(Deserialize)]
struct RawGenres {
    #[serde(default, deserialize_with = "de_one_or_many")]
    genre: Vec<Genre>,
}

impl Decode for GenresResponse {
    fn decode(document: Value) -> Result<Self> {
        let mut document = Document::parse(document)?;
        let raw: RawGenres = document.take("genres")?;

        Ok(Self {
            envelope: document.envelope,
            genres: raw.genre,
        })
    }
}

// ============================================================================
// Lenient field decoders
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn de_one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

fn de_opt_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        // Titles like 1999 come through as numbers
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn de_opt_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_f64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Integral floats only; fractions, NaN and out-of-range values are absent.
fn whole_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(payload: Value) -> Value {
        let mut body = json!({ "status": "ok", "version": "1.16.1" });
        if let (Value::Object(body), Value::Object(extra)) = (&mut body, payload) {
            body.extend(extra);
        }
        json!({ ROOT_KEY: body })
    }

    #[test]
    fn test_ping_envelope() {
        let response = PingResponse::decode(ok(json!({}))).unwrap();
        assert!(response.envelope.status);
        assert_eq!(response.envelope.version, "1.16.1");
    }

    #[test]
    fn test_failed_ping_decodes_to_false_status() {
        let document = json!({
            ROOT_KEY: {
                "status": "failed",
                "version": "1.16.1",
                "error": { "code": 40, "message": "Wrong username or password" }
            }
        });

        let response = PingResponse::decode(document).unwrap();
        assert!(!response.envelope.status);
        assert_eq!(response.envelope.version, "1.16.1");
        assert_eq!(
            response.envelope.error,
            Some(ApiFailure {
                code: 40,
                message: "Wrong username or password".to_string()
            })
        );

        match response.envelope.error_for_status() {
            Err(SubsonicError::ApiError { code, message }) => {
                assert_eq!(code, 40);
                assert_eq!(message, "Wrong username or password");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_status_fails_payload_response() {
        let document = json!({
            ROOT_KEY: { "status": "failed", "version": "1.16.1" }
        });

        match DirectoryResponse::decode(document) {
            Err(SubsonicError::ApiError { code, .. }) => assert_eq!(code, 0),
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_root_is_parse_error() {
        let result = PingResponse::decode(json!({ "status": "ok" }));
        assert!(matches!(result, Err(SubsonicError::ParseError(_))));
    }

    #[test]
    fn test_directory_children_absent() {
        let response =
            DirectoryResponse::decode(ok(json!({ "directory": { "id": "10", "name": "Empty" } })))
                .unwrap();

        assert_eq!(response.id, "10");
        assert!(response.children.is_empty());
    }

    #[test]
    fn test_directory_children_single_object() {
        let response = DirectoryResponse::decode(ok(json!({
            "directory": {
                "id": 10,
                "name": "Discovery",
                "child": { "id": 11, "parent": 10, "isDir": false, "title": "One More Time" }
            }
        })))
        .unwrap();

        assert_eq!(response.id, "10");
        assert_eq!(response.children.len(), 1);
        assert_eq!(response.children[0].id, "11");
        assert_eq!(response.children[0].parent.as_deref(), Some("10"));
        assert_eq!(response.children[0].title.as_deref(), Some("One More Time"));
    }

    #[test]
    fn test_directory_children_list() {
        let response = DirectoryResponse::decode(ok(json!({
            "directory": {
                "id": "1",
                "name": "Daft Punk",
                "child": [
                    { "id": "2", "isDir": true, "title": "Discovery" },
                    { "id": "3", "isDir": true, "title": "Homework" }
                ]
            }
        })))
        .unwrap();

        let ids: Vec<_> = response.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert!(response.children.iter().all(|c| c.is_dir));
    }

    #[test]
    fn test_child_lenient_numbers() {
        let response = DirectoryResponse::decode(ok(json!({
            "directory": {
                "id": "2",
                "child": {
                    "id": "7",
                    "title": 1999,
                    "year": "1982",
                    "track": 1,
                    "size": 8_421_000,
                    "duration": 379
                }
            }
        })))
        .unwrap();

        let song = &response.children[0];
        assert_eq!(song.title.as_deref(), Some("1999"));
        assert_eq!(song.year, Some(1982));
        assert_eq!(song.size, Some(8_421_000));
        assert_eq!(song.genre, None);
    }

    #[test]
    fn test_child_fractional_numbers_are_absent() {
        let response = DirectoryResponse::decode(ok(json!({
            "directory": {
                "id": "2",
                "child": [
                    { "id": "7", "duration": 379.0, "track": 2.5, "size": 1e300 },
                    { "id": "8", "year": -1.75 }
                ]
            }
        })))
        .unwrap();

        assert_eq!(response.children[0].duration, Some(379));
        assert_eq!(response.children[0].track, None);
        assert_eq!(response.children[0].size, None);
        assert_eq!(response.children[1].year, None);
    }

    #[test]
    fn test_directory_without_id_fails() {
        let result = DirectoryResponse::decode(ok(json!({ "directory": { "name": "x" } })));
        assert!(matches!(result, Err(SubsonicError::ParseError(_))));
    }

    #[test]
    fn test_indexes_flatten_in_order() {
        let response = IndexesResponse::decode(ok(json!({
            "indexes": {
                "lastModified": 1_700_000_000_000_i64,
                "ignoredArticles": "The El La Los Las Le Les",
                "index": [
                    { "name": "A", "artist": [ { "id": "1", "name": "ABBA" }, { "id": "2", "name": "Air" } ] },
                    { "name": "B", "artist": { "id": 3, "name": "Beck" } }
                ]
            }
        })))
        .unwrap();

        let ids: Vec<_> = response.artists.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(response.ignored_articles[0], "The");
        assert_eq!(response.ignored_articles.len(), 7);
        assert_eq!(response.last_modified, Some(1_700_000_000_000));
    }

    #[test]
    fn test_indexes_without_headings() {
        let response =
            IndexesResponse::decode(ok(json!({ "indexes": { "ignoredArticles": "" } }))).unwrap();
        assert!(response.artists.is_empty());
        assert!(response.ignored_articles.is_empty());
    }

    #[test]
    fn test_missing_payload() {
        let result = IndexesResponse::decode(ok(json!({})));
        assert!(matches!(result, Err(SubsonicError::MissingPayload("indexes"))));
    }

    #[test]
    fn test_license_date_parse() {
        let response = LicenseResponse::decode(ok(json!({
            "license": {
                "valid": true,
                "email": "owner@example.com",
                "key": "a1b2c3",
                "date": "2019-09-03T14:46:43"
            }
        })))
        .unwrap();

        assert!(response.valid);
        assert_eq!(response.email.as_deref(), Some("owner@example.com"));
        assert_eq!(
            response.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2019-09-03 14:46:43"
        );
    }

    #[test]
    fn test_license_date_with_zone() {
        let date = parse_license_date("2017-04-05T10:42:34.000Z").unwrap();
        assert_eq!(date.format("%H:%M:%S").to_string(), "10:42:34");
    }

    #[test]
    fn test_license_date_missing_or_malformed() {
        let missing = LicenseResponse::decode(ok(json!({ "license": { "valid": true } })));
        assert!(matches!(missing, Err(SubsonicError::InvalidDate { .. })));

        let malformed =
            LicenseResponse::decode(ok(json!({ "license": { "valid": true, "date": "03/09/2019" } })));
        assert!(matches!(malformed, Err(SubsonicError::InvalidDate { .. })));
    }

    #[test]
    fn test_music_folders_and_genres() {
        let folders = MusicFoldersResponse::decode(ok(json!({
            "musicFolders": { "musicFolder": { "id": 0, "name": "Music" } }
        })))
        .unwrap();
        assert_eq!(folders.folders.len(), 1);
        assert_eq!(folders.folders[0].id, "0");

        let genres = GenresResponse::decode(ok(json!({
            "genres": { "genre": [
                { "value": "Electronic", "songCount": 120, "albumCount": 9 },
                { "value": "Jazz", "songCount": 4, "albumCount": 1 }
            ] }
        })))
        .unwrap();
        assert_eq!(genres.genres[0].name, "Electronic");
        assert_eq!(genres.genres[1].song_count, Some(4));
    }
}
