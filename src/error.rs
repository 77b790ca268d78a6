//! Error types for the media catalog

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while building or serving the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Name could not be turned into a display title
    InvalidName,
    /// No entry with the requested id
    UnknownEntry,
    /// Attaching the entry would break the tree shape
    InvalidHierarchy,
    /// The entry id space is used up
    IdsExhausted,
    /// Seek target outside the stream bounds
    OutOfRange,
    /// Logical resource unknown or its generator failed
    ResourceUnavailable,
    /// No content directory configured
    NoContent,
    /// Stream already closed
    Closed,
}

/// Represents an error raised by the catalog or a content stream
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct CatalogError {
    /// The kind of error
    pub kind: CatalogErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

/// Result alias used across the crate
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    /// Create a new catalog error
    pub fn new(kind: CatalogErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            CatalogErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::IoError, path, message)
    }

    /// Create an error for a name that has no valid display title
    pub fn invalid_name(path: PathBuf) -> Self {
        Self::new(
            CatalogErrorKind::InvalidName,
            Some(path.clone()),
            format!("Cannot convert name to a title: {:?}", path),
        )
    }

    pub fn unknown_entry(id: u32) -> Self {
        Self::new(
            CatalogErrorKind::UnknownEntry,
            None,
            format!("No catalog entry with id {}", id),
        )
    }

    pub fn invalid_hierarchy(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::InvalidHierarchy, None, message)
    }

    pub fn ids_exhausted(id: u32) -> Self {
        Self::new(
            CatalogErrorKind::IdsExhausted,
            None,
            format!("No entry id left after {}", id),
        )
    }

    /// Create a seek range error
    pub fn out_of_range(position: i128, len: u64) -> Self {
        Self::new(
            CatalogErrorKind::OutOfRange,
            None,
            format!("Position {} outside [0, {}]", position, len),
        )
    }

    /// Create a resource unavailable error
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::ResourceUnavailable, None, name)
    }

    pub fn no_content() -> Self {
        Self::new(
            CatalogErrorKind::NoContent,
            None,
            "No content directory to be shared",
        )
    }

    pub fn closed() -> Self {
        Self::new(CatalogErrorKind::Closed, None, "Stream is closed")
    }

    /// Attach the path the error happened on
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Whether the build skips the offending entry and carries on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            CatalogErrorKind::PermissionDenied
                | CatalogErrorKind::NotFound
                | CatalogErrorKind::IoError
                | CatalogErrorKind::InvalidName
        )
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => CatalogErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => CatalogErrorKind::NotFound,
            _ => CatalogErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<walkdir::Error> for CatalogError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => CatalogErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => CatalogErrorKind::NotFound,
            _ => CatalogErrorKind::IoError,
        };
        Self::new(kind, path, err.to_string())
    }
}

impl From<CatalogError> for std::io::Error {
    fn from(err: CatalogError) -> Self {
        let kind = match err.kind {
            CatalogErrorKind::PermissionDenied => std::io::ErrorKind::PermissionDenied,
            CatalogErrorKind::NotFound | CatalogErrorKind::ResourceUnavailable => {
                std::io::ErrorKind::NotFound
            }
            CatalogErrorKind::OutOfRange => std::io::ErrorKind::InvalidInput,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
