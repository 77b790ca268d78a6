//! Media content catalog
//!
//! This library indexes local content directories into a tree of
//! containers and items, files every item under a class folder, and
//! serves catalog files and generated pages through one byte stream
//! contract.

pub mod catalog;
pub mod config;
pub mod error;
pub mod mime;
pub mod models;
pub mod pages;
pub mod scanner;
pub mod server;
pub mod stream;

pub use catalog::{Catalog, CatalogHandle};
pub use config::CatalogConfig;
pub use error::{CatalogError, CatalogErrorKind, CatalogResult};
pub use mime::{Classification, MimeClassifier, MimeEntry, MimeTable};
pub use models::{
    BuildReport, CatalogEntry, EntryId, EntryKind, MediaClass, MediaItem, VirtualFolder, ROOT_ID,
};
pub use pages::{GeneratedPage, PageGenerator, PageRegistry, PresentationAction, PresentationPage};
pub use scanner::{DirectoryScanner, ScanEntry};
pub use server::{MediaServer, ServerState};
pub use stream::{ContentStream, FileStream, MemoryStream};
