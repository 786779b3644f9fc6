//! Shared payloads exchanged between the playback engine and UI components.
//!
//! This module defines library entities, engine notifications, queue requests
//! and the user-facing notices published on the notice bus.

use std::fmt;

use serde::Deserialize;

/// A catalog-sourced playable entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CatalogResource")]
pub struct MediaItem {
    /// Stable catalog or library identifier.
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub album_name: String,
    pub duration_ms: u64,
    /// Content rating flag; `true` when the catalog marks the item explicit.
    pub explicit: bool,
    /// Opaque artwork reference as delivered by the catalog.
    pub artwork: Option<String>,
    /// Whether the item is already part of the user's library.
    pub in_library: bool,
}

impl MediaItem {
    /// Parses a single catalog resource document.
    pub fn from_catalog_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parses a catalog `data` array into items, preserving order.
    pub fn list_from_catalog_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            data: Vec<MediaItem>,
        }
        serde_json::from_str::<Envelope>(json).map(|envelope| envelope.data)
    }
}

#[derive(Deserialize)]
struct CatalogResource {
    id: String,
    #[serde(default)]
    attributes: CatalogAttributes,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
    #[serde(default)]
    duration_in_millis: u64,
    #[serde(default)]
    content_rating: Option<String>,
    #[serde(default)]
    artwork: Option<CatalogArtwork>,
    #[serde(default)]
    play_params: Option<CatalogPlayParams>,
}

#[derive(Deserialize)]
struct CatalogArtwork {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogPlayParams {
    #[serde(default)]
    is_library: bool,
}

impl From<CatalogResource> for MediaItem {
    fn from(resource: CatalogResource) -> Self {
        let attributes = resource.attributes;
        Self {
            id: resource.id,
            name: attributes.name,
            artist_name: attributes.artist_name,
            album_name: attributes.album_name,
            duration_ms: attributes.duration_in_millis,
            explicit: attributes.content_rating.as_deref() == Some("explicit"),
            artwork: attributes.artwork.map(|artwork| artwork.url),
            in_library: attributes
                .play_params
                .map(|params| params.is_library)
                .unwrap_or(false),
        }
    }
}

/// Engine-reported playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    None,
    Playing,
    Paused,
    Stopped,
    Ended,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

/// Notification kinds a listener can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineEventKind {
    MediaItemDidChange,
    PlaybackStateDidChange,
    QueueItemsDidChange,
}

impl fmt::Display for EngineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineEventKind::MediaItemDidChange => "mediaItemDidChange",
            EngineEventKind::PlaybackStateDidChange => "playbackStateDidChange",
            EngineEventKind::QueueItemsDidChange => "queueItemsDidChange",
        };
        f.write_str(name)
    }
}

/// Engine notification with its event-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MediaItemDidChange {
        item: Option<MediaItem>,
    },
    PlaybackStateDidChange {
        state: PlaybackState,
        previous: PlaybackState,
    },
    QueueItemsDidChange {
        items: Vec<MediaItem>,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> EngineEventKind {
        match self {
            EngineEvent::MediaItemDidChange { .. } => EngineEventKind::MediaItemDidChange,
            EngineEvent::PlaybackStateDidChange { .. } => EngineEventKind::PlaybackStateDidChange,
            EngineEvent::QueueItemsDidChange { .. } => EngineEventKind::QueueItemsDidChange,
        }
    }
}

/// Full queue replacement request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub start_position: usize,
    pub items: Vec<MediaItem>,
}

/// Read-only view of the engine queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    pub items: Vec<MediaItem>,
    /// Index of the current item, if any.
    pub position: Option<usize>,
}

impl QueueSnapshot {
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
}

/// Non-fatal message surfaced to the user, e.g. after a rejected command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            message: message.into(),
        }
    }
}
