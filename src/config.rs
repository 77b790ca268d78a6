//! Configuration for the media catalog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::EntryId;

/// Default name advertised on the status page
pub const DEFAULT_SERVER_NAME: &str = "Media Catalog";

/// Default mount path for item URLs
pub const DEFAULT_MOUNT_PATH: &str = "web";

/// Default logical name of the presentation page
pub const DEFAULT_PRESENTATION_PAGE: &str = "index.html";

/// Default logical name of the presentation action endpoint
pub const DEFAULT_CGI_PAGE: &str = "action.cgi";

/// Default port used in item URLs
pub const DEFAULT_PORT: u16 = 49200;

/// Default max depth below a content directory
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for the catalog and its serving context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Content directories to share
    pub content_dirs: Vec<PathBuf>,

    /// Name shown on the presentation page
    pub server_name: String,

    /// Advertised host used in item URLs
    pub host: String,

    /// Advertised port used in item URLs
    pub port: u16,

    /// Mount path used in item URLs, without slashes
    pub mount_path: String,

    /// Replace invalid UTF-8 in names instead of rejecting the entry
    pub lossy_titles: bool,

    /// Maximum depth below a content directory
    pub max_depth: usize,

    /// Whether the presentation pages are served
    pub use_presentation: bool,

    /// Logical name of the presentation page
    pub presentation_page: String,

    /// Logical name of the presentation action endpoint
    pub cgi_page: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            content_dirs: Vec::new(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            lossy_titles: false,
            max_depth: DEFAULT_MAX_DEPTH,
            use_presentation: true,
            presentation_page: DEFAULT_PRESENTATION_PAGE.to_string(),
            cgi_page: DEFAULT_CGI_PAGE.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Create a new config with the given content directories
    pub fn new(content_dirs: Vec<PathBuf>) -> Self {
        Self {
            content_dirs,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::new()
    }

    /// Whether at least one content directory is configured
    pub fn has_content(&self) -> bool {
        !self.content_dirs.is_empty()
    }

    /// URL of the item with the given id
    pub fn item_url(&self, id: EntryId) -> String {
        if self.mount_path.is_empty() {
            return format!("http://{}:{}/{}", self.host, self.port, id);
        }
        format!("http://{}:{}/{}/{}", self.host, self.port, self.mount_path, id)
    }

    /// Parse the item id out of a request path like `/web/42`, or `/42`
    /// when the mount path is empty
    pub fn item_id_from_path(&self, path: &str) -> Option<EntryId> {
        let rest = path.trim_start_matches('/');
        if self.mount_path.is_empty() {
            return rest.parse().ok();
        }
        rest.strip_prefix(&self.mount_path)?
            .strip_prefix('/')?
            .parse()
            .ok()
    }
}

/// Builder for CatalogConfig
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content directories
    pub fn content_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.config.content_dirs = dirs;
        self
    }

    /// Add a content directory
    pub fn add_content_dir(mut self, dir: PathBuf) -> Self {
        self.config.content_dirs.push(dir);
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = name.into();
        self
    }

    /// Set the advertised host and port
    pub fn address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.host = host.into();
        self.config.port = port;
        self
    }

    pub fn mount_path(mut self, mount: impl Into<String>) -> Self {
        self.config.mount_path = mount.into().trim_matches('/').to_string();
        self
    }

    pub fn lossy_titles(mut self, enabled: bool) -> Self {
        self.config.lossy_titles = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Enable or disable the presentation pages
    pub fn use_presentation(mut self, enabled: bool) -> Self {
        self.config.use_presentation = enabled;
        self
    }

    pub fn presentation_page(mut self, name: impl Into<String>) -> Self {
        self.config.presentation_page = name.into();
        self
    }

    pub fn cgi_page(mut self, name: impl Into<String>) -> Self {
        self.config.cgi_page = name.into();
        self
    }

    /// Build the config
    pub fn build(self) -> CatalogConfig {
        self.config
    }
}
