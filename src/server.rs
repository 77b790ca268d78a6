//! Serving context - owns the configuration, the catalog and the pages

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogHandle};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::mime::{MimeClassifier, MimeTable};
use crate::models::{BuildReport, EntryId};
use crate::pages::{PageGenerator, PageRegistry, PresentationAction, PresentationPage};
use crate::stream::{ContentStream, FileStream};

/// State shared between the server and its page generators
pub struct ServerState {
    config: RwLock<CatalogConfig>,
    catalog: CatalogHandle,
    update_lock: Mutex<()>,
}

impl ServerState {
    pub fn new(config: CatalogConfig, classifier: Arc<dyn MimeClassifier>) -> Self {
        Self {
            catalog: CatalogHandle::new(&config, classifier),
            config: RwLock::new(config),
            update_lock: Mutex::new(()),
        }
    }

    /// Current configuration
    pub fn config(&self) -> CatalogConfig {
        self.config.read().clone()
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Rebuild the catalog from the current configuration
    pub fn rebuild(&self) -> CatalogResult<BuildReport> {
        let _guard = self.update_lock.lock();
        let config = self.config();
        self.catalog.rebuild(&config)
    }

    /// Switch to a new configuration.
    ///
    /// The new configuration is only kept if the catalog rebuild for it
    /// succeeds.
    pub fn reconfigure(&self, config: CatalogConfig) -> CatalogResult<BuildReport> {
        let _guard = self.update_lock.lock();
        self.apply(config)
    }

    /// Edit the content directory list and rebuild
    pub fn update_content_dirs<F>(&self, edit: F) -> CatalogResult<BuildReport>
    where
        F: FnOnce(&mut Vec<PathBuf>) -> CatalogResult<()>,
    {
        let _guard = self.update_lock.lock();
        let mut config = self.config();
        edit(&mut config.content_dirs)?;
        self.apply(config)
    }

    fn apply(&self, config: CatalogConfig) -> CatalogResult<BuildReport> {
        let report = self.catalog.rebuild(&config)?;
        *self.config.write() = config;
        Ok(report)
    }
}

/// The context object the serving layer talks to.
///
/// Resolves request paths to byte streams: `/{mount}/{id}` opens the file
/// behind a catalog item, registered page names open a generated page.
pub struct MediaServer {
    state: Arc<ServerState>,
    pages: PageRegistry,
}

impl MediaServer {
    /// Create a server with the given classifier; nothing is scanned yet
    pub fn new(config: CatalogConfig, classifier: Arc<dyn MimeClassifier>) -> Self {
        let use_presentation = config.use_presentation;
        let page_name = config.presentation_page.clone();
        let cgi_name = config.cgi_page.clone();
        let state = Arc::new(ServerState::new(config, classifier));

        let mut pages = PageRegistry::new();
        if use_presentation {
            let page = Arc::new(PresentationPage::new(state.clone()));
            pages.register(cgi_name, Arc::new(PresentationAction::new(page.clone())));
            pages.register(page_name, page);
        }

        Self { state, pages }
    }

    /// Create a server using the built-in MIME table
    pub fn with_default_mime(config: CatalogConfig) -> Self {
        Self::new(config, Arc::new(MimeTable::default()))
    }

    /// Build the first catalog generation
    pub fn start(&self) -> CatalogResult<BuildReport> {
        let config = self.state.config();
        log::info!(
            "Starting {} with {} content directories",
            config.server_name,
            config.content_dirs.len()
        );
        self.state.rebuild()
    }

    /// Apply a reloaded configuration
    pub fn reload(&self, config: CatalogConfig) -> CatalogResult<BuildReport> {
        log::info!("Reloading configuration ...");
        self.state.reconfigure(config)
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// The published catalog generation
    pub fn catalog(&self) -> Arc<Catalog> {
        self.state.catalog().current()
    }

    pub fn pages(&self) -> &PageRegistry {
        &self.pages
    }

    /// Register an extra generated page
    pub fn register_page(&mut self, name: impl Into<String>, generator: Arc<dyn PageGenerator>) {
        self.pages.register(name, generator);
    }

    /// Open the stream behind a request path
    pub fn open(&self, path: &str) -> CatalogResult<Box<dyn ContentStream>> {
        log::debug!("open: {}", path);
        let config = self.state.config();

        if let Some(id) = config.item_id_from_path(path) {
            return self.open_item(id).map(|s| Box::new(s) as Box<dyn ContentStream>);
        }
        if config.use_presentation {
            return self
                .pages
                .open(path)
                .map(|s| Box::new(s) as Box<dyn ContentStream>);
        }
        Err(CatalogError::unavailable(path))
    }

    /// Open the file behind a catalog item
    pub fn open_item(&self, id: EntryId) -> CatalogResult<FileStream> {
        let catalog = self.catalog();
        let item = catalog
            .find_by_id(id)
            .and_then(|entry| entry.item())
            .ok_or_else(|| CatalogError::unavailable(format!("No item with id {}", id)))?;
        FileStream::open(&item.path, item.mime.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogErrorKind;
    use crate::models::VirtualFolder;
    use std::fs;
    use tempfile::TempDir;

    fn server_for(dir: &TempDir) -> MediaServer {
        let config = CatalogConfig::builder()
            .add_content_dir(dir.path().to_path_buf())
            .build();
        MediaServer::with_default_mime(config)
    }

    #[test]
    fn test_open_item_reads_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("song.mp3"), b"ID3-data").unwrap();
        let server = server_for(&dir);
        server.start().unwrap();

        let catalog = server.catalog();
        let entry = catalog.children(VirtualFolder::Music.id()).next().unwrap();
        let url = entry.url.clone().unwrap();
        let path = url.splitn(4, '/').nth(3).unwrap();

        let mut stream = server.open(&format!("/{}", path)).unwrap();
        assert_eq!(stream.content_type(), "audio/mpeg");
        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ID3-data");
    }

    #[test]
    fn test_open_container_or_unknown_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        let server = server_for(&dir);
        server.start().unwrap();

        let err = server.open(&format!("/web/{}", VirtualFolder::Music.id())).err().unwrap();
        assert_eq!(err.kind, CatalogErrorKind::ResourceUnavailable);
        assert!(server.open("/web/99999").is_err());
        assert!(server.open("/nothing-here.html").is_err());
    }

    #[test]
    fn test_reload_keeps_config_on_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        let server = server_for(&dir);
        server.start().unwrap();

        assert!(server.reload(CatalogConfig::default()).is_err());
        assert_eq!(server.state().config().content_dirs.len(), 1);
        assert_eq!(server.catalog().items().count(), 2);
    }

    #[test]
    fn test_presentation_disabled() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig::builder()
            .add_content_dir(dir.path().to_path_buf())
            .use_presentation(false)
            .build();
        let server = MediaServer::with_default_mime(config);
        assert!(server.pages().is_empty());
        assert!(server.open("/index.html").is_err());
    }
}
