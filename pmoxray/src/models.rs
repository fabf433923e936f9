//! Data models for the X-Ray event stream
//!
//! The `/xray` endpoint forwards the Spotify "currently playing" object,
//! merged with the X-Ray annotation (`meaning` and `facts`). This module
//! holds both the wire structures and the flattened [`Snapshot`] the rest of
//! the crate works with.

use crate::error::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Wire Models
// ============================================================================

/// Raw payload of a `message` event, as sent by the server
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SnapshotPayload {
    /// Whether the player is currently playing
    #[serde(default)]
    pub is_playing: bool,
    /// Currently loaded item (absent when nothing is playing)
    #[serde(default)]
    pub item: Option<TrackItem>,
    /// Interpretive annotation of the song
    #[serde(default)]
    pub meaning: Option<String>,
    /// Short facts about the song
    #[serde(default)]
    pub facts: Option<Vec<String>>,
}

/// A track as described by the Spotify API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrackItem {
    /// Track identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Track title
    pub name: String,
    /// Album the track belongs to
    #[serde(default)]
    pub album: Option<AlbumRef>,
    /// Performing artists, in credit order
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    /// Track duration (milliseconds)
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Album reference embedded in a track
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub name: Option<String>,
    /// Cover images, largest first
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Cover image
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Artist reference embedded in a track
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistRef {
    pub name: String,
}

/// Structured payload of an `error` event
///
/// The server sends `{"error": "...", "status_code": 401}` when the access
/// token is missing. Free-text error events do not decode into this type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorPayload {
    pub status_code: u16,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorPayload {
    /// Decode an error event body, `None` if it is not structured
    pub fn from_json(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }

    /// Check if the server reported missing or rejected credentials
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }
}

// ============================================================================
// Domain Models
// ============================================================================

/// Ordered list of facts shown by the carousel
///
/// Equality is element-wise and order-sensitive: `["a", "b"]` and
/// `["b", "a"]` are different lists. An absent list and an empty list are
/// the same value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FactList(Vec<String>);

impl FactList {
    /// Create a fact list
    pub fn new(facts: Vec<String>) -> Self {
        Self(facts)
    }

    /// The empty list
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fact at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for FactList {
    fn from(facts: Vec<String>) -> Self {
        Self(facts)
    }
}

impl From<Option<Vec<String>>> for FactList {
    fn from(facts: Option<Vec<String>>) -> Self {
        Self(facts.unwrap_or_default())
    }
}

impl<S: Into<String>> FromIterator<S> for FactList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Track currently playing, flattened for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    /// Largest album cover, when the API provides one
    pub album_art_url: Option<String>,
    pub artists: Vec<String>,
}

impl Track {
    /// Artists joined for display ("A, B, C")
    pub fn artists_display(&self) -> String {
        self.artists.join(", ")
    }
}

impl From<TrackItem> for Track {
    fn from(item: TrackItem) -> Self {
        let album_art_url = item
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);

        Self {
            name: item.name,
            album_art_url,
            artists: item.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

/// One decoded message of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub is_playing: bool,
    /// Present only while playing
    pub track: Option<Track>,
    pub meaning: Option<String>,
    pub facts: FactList,
}

impl Snapshot {
    /// Decode a `message` event body
    pub fn from_json(data: &str) -> Result<Self> {
        let payload: SnapshotPayload = serde_json::from_str(data)?;
        Ok(payload.into())
    }
}

impl From<SnapshotPayload> for Snapshot {
    fn from(payload: SnapshotPayload) -> Self {
        let track = if payload.is_playing {
            payload.item.map(Track::from)
        } else {
            None
        };

        Self {
            is_playing: payload.is_playing,
            track,
            meaning: payload.meaning,
            facts: payload.facts.into(),
        }
    }
}
