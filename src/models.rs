//! Core data models for the media catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CatalogError;

/// Catalog entry identifier
pub type EntryId = u32;

/// Id of the catalog root
pub const ROOT_ID: EntryId = 0;

/// Offset added to a class discriminant to get its folder id
pub const CLASS_FOLDER_BASE: EntryId = 10;

/// First id handed out by the allocator, above the class folder range
pub const FIRST_DYNAMIC_ID: EntryId = CLASS_FOLDER_BASE + 6;

/// Media class of a catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    /// Recognized extension without a more specific class
    Unknown,
    /// Image files (jpg, png, etc.)
    Image,
    /// Audio files (mp3, flac, etc.)
    Audio,
    /// Audio/video files (mp4, mkv, etc.)
    Av,
    /// Playlists and other collections
    Collection,
}

impl MediaClass {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaClass::Unknown => "unknown",
            MediaClass::Image => "image",
            MediaClass::Audio => "audio",
            MediaClass::Av => "av",
            MediaClass::Collection => "collection",
        }
    }
}

impl std::fmt::Display for MediaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known top-level container grouping items by class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VirtualFolder {
    Others = 0,
    Image = 1,
    Music = 2,
    Video = 3,
    /// Parent of the literal directory trees
    Folders = 5,
}

impl VirtualFolder {
    /// Folders in the order they are listed on status pages
    pub const ALL: [VirtualFolder; 5] = [
        VirtualFolder::Image,
        VirtualFolder::Music,
        VirtualFolder::Video,
        VirtualFolder::Others,
        VirtualFolder::Folders,
    ];

    /// Folder an item of the given class is filed under.
    /// Collections share the music folder.
    pub fn for_class(class: MediaClass) -> Self {
        match class {
            MediaClass::Unknown => VirtualFolder::Others,
            MediaClass::Image => VirtualFolder::Image,
            MediaClass::Audio | MediaClass::Collection => VirtualFolder::Music,
            MediaClass::Av => VirtualFolder::Video,
        }
    }

    /// Stable id of the folder
    pub fn id(&self) -> EntryId {
        *self as EntryId + CLASS_FOLDER_BASE
    }

    /// Display name of the folder
    pub fn name(&self) -> &'static str {
        match self {
            VirtualFolder::Others => "others",
            VirtualFolder::Image => "image",
            VirtualFolder::Music => "music",
            VirtualFolder::Video => "video",
            VirtualFolder::Folders => "folders",
        }
    }

    pub fn from_id(id: EntryId) -> Option<Self> {
        Self::ALL.into_iter().find(|folder| folder.id() == id)
    }
}

/// A classified media file, shared by every catalog entry that lists it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Media class from the MIME table
    pub class: MediaClass,
    /// Transport protocol descriptor, e.g. `http-get:*:audio/mpeg:*`
    pub protocol: String,
    /// MIME type
    pub mime: String,
}

impl MediaItem {
    pub fn new(
        path: PathBuf,
        size: u64,
        class: MediaClass,
        protocol: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            path,
            size,
            class,
            protocol: protocol.into(),
            mime: mime.into(),
        }
    }
}

/// Container or item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum EntryKind {
    Container {
        /// Set for root-level class folders
        #[serde(skip_serializing_if = "Option::is_none")]
        folder: Option<VirtualFolder>,
    },
    Item(Arc<MediaItem>),
}

/// A node of the catalog tree
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: EntryId,
    /// Display title
    pub title: String,
    /// Filesystem path, absent for root and class folders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullpath: Option<PathBuf>,
    #[serde(flatten)]
    pub kind: EntryKind,
    /// Resource URL, items only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Size in bytes, `None` when unknown
    pub size: Option<u64>,
    /// Parent id, `None` for the root only
    pub parent: Option<EntryId>,
    /// Child ids in insertion order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntryId>,
    /// Number of children actually attached
    pub child_count: u32,
}

impl CatalogEntry {
    pub fn is_container(&self) -> bool {
        matches!(self.kind, EntryKind::Container { .. })
    }

    pub fn is_item(&self) -> bool {
        !self.is_container()
    }

    /// Underlying media item, if any
    pub fn item(&self) -> Option<&Arc<MediaItem>> {
        match &self.kind {
            EntryKind::Item(item) => Some(item),
            EntryKind::Container { .. } => None,
        }
    }

    /// Media class of an item
    pub fn media_class(&self) -> Option<MediaClass> {
        self.item().map(|item| item.class)
    }

    pub fn protocol(&self) -> Option<&str> {
        self.item().map(|item| item.protocol.as_str())
    }

    pub fn virtual_folder(&self) -> Option<VirtualFolder> {
        match self.kind {
            EntryKind::Container { folder } => folder,
            EntryKind::Item(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.fullpath.as_deref()
    }
}

/// Result of a catalog build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    /// Generation number of the built catalog
    pub generation: u64,
    /// Content directories scanned
    pub content_dirs: Vec<PathBuf>,
    /// Number of literal directory containers created
    pub containers: u64,
    /// Number of files catalogued (counted once per file)
    pub items: u64,
    /// Files skipped because the MIME table does not know them
    pub unclassified: u64,
    /// Entries skipped because their name could not become a title
    pub rejected: u64,
    /// Errors encountered while scanning
    #[serde(skip)]
    pub errors: Vec<CatalogError>,
    /// Number of scan errors
    pub error_count: usize,
    /// Build start time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
    /// Total build duration in milliseconds
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the build completed without scan errors
    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }
}
