//! Generated pages served through memory streams
//!
//! A page is registered under a logical name together with a generator.
//! Opening the name runs the generator and hands out a [`MemoryStream`]
//! over the bytes it produced. Each open gets its own snapshot, so a
//! later regeneration never shows up in a stream that is already open.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult};
use crate::server::ServerState;
use crate::stream::MemoryStream;

/// Content type of the presentation pages
pub const PRESENTATION_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Output of a page generator
#[derive(Debug, Clone)]
pub struct GeneratedPage {
    pub body: Bytes,
    pub content_type: String,
}

impl GeneratedPage {
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}

/// Produces the bytes of a logical resource on demand
pub trait PageGenerator: Send + Sync {
    /// Generate the page; `query` is the text after `?` in the request
    fn generate(&self, query: Option<&str>) -> CatalogResult<GeneratedPage>;
}

/// Logical name to generator table
#[derive(Default)]
pub struct PageRegistry {
    pages: HashMap<String, Arc<dyn PageGenerator>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator, replacing any previous one for the name
    pub fn register(&mut self, name: impl Into<String>, generator: Arc<dyn PageGenerator>) {
        let name = name.into();
        log::debug!("Registered page {}", name);
        self.pages.insert(name, generator);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.pages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Open a stream for a request path such as `/index.html` or
    /// `/action.cgi?refresh`. The last path segment picks the page.
    pub fn open(&self, request: &str) -> CatalogResult<MemoryStream> {
        let (path, query) = match request.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request, None),
        };
        let name = path.rsplit('/').next().unwrap_or(path);

        let generator = self
            .pages
            .get(name)
            .ok_or_else(|| CatalogError::unavailable(format!("Unknown page {}", request)))?;

        let page = generator.generate(query).map_err(|e| {
            log::warn!("Cannot generate {}: {}", name, e);
            CatalogError::unavailable(format!("Cannot generate {}: {}", name, e.message))
        })?;

        Ok(MemoryStream::open(name, page.body, page.content_type))
    }
}

/// Status page listing the content directories and the catalog state
pub struct PresentationPage {
    state: Arc<ServerState>,
    buffer: Mutex<Bytes>,
}

impl PresentationPage {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            buffer: Mutex::new(Bytes::new()),
        }
    }

    /// The last rendered page
    pub fn current(&self) -> Bytes {
        self.buffer.lock().clone()
    }

    /// Render the page and make it the current buffer
    pub fn render(&self) -> Bytes {
        let html = self.to_html();
        let body = Bytes::from(html);
        *self.buffer.lock() = body.clone();
        body
    }

    /// Run the actions carried by a query string.
    ///
    /// `refresh` rebuilds the catalog, `add=<dir>` and `remove=<index>`
    /// edit the content directory list and rebuild.
    pub fn apply(&self, query: &str) -> CatalogResult<()> {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "refresh" => {
                    self.state.rebuild()?;
                }
                "add" => {
                    let dir = PathBuf::from(value.as_ref());
                    self.state.update_content_dirs(|dirs| {
                        if !dirs.contains(&dir) {
                            dirs.push(dir);
                        }
                        Ok(())
                    })?;
                }
                "remove" => {
                    let index: usize = value.parse().map_err(|_| {
                        CatalogError::unavailable(format!("Bad content index {:?}", value))
                    })?;
                    self.state.update_content_dirs(|dirs| {
                        if index >= dirs.len() {
                            return Err(CatalogError::unavailable(format!(
                                "No content directory at index {}",
                                index
                            )));
                        }
                        dirs.remove(index);
                        Ok(())
                    })?;
                }
                other => log::debug!("Ignoring presentation action {}", other),
            }
        }
        Ok(())
    }

    fn to_html(&self) -> String {
        let config = self.state.config();
        let catalog = self.state.catalog().current();
        let report = self.state.catalog().last_report();
        let name = escape_html(&config.server_name);
        let cgi = escape_html(&config.cgi_page);

        let mut html = String::new();
        // writing into a String cannot fail
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{name}</title>\n</head>\n<body>\n<h1>{name}</h1>\n"
        );

        html.push_str("<h2>Content directories</h2>\n<ul>\n");
        for (index, dir) in config.content_dirs.iter().enumerate() {
            let _ = writeln!(
                html,
                "<li>{} <a href=\"{cgi}?remove={index}\">remove</a></li>",
                escape_html(&dir.to_string_lossy())
            );
        }
        html.push_str("</ul>\n");
        let _ = writeln!(
            html,
            "<form method=\"get\" action=\"{cgi}\">\
             <input type=\"text\" name=\"add\"><input type=\"submit\" value=\"Add\"></form>"
        );
        let _ = writeln!(html, "<p><a href=\"{cgi}?refresh\">Refresh catalog</a></p>");

        let _ = writeln!(
            html,
            "<h2>Catalog</h2>\n<p>Generation {}, {} entries</p>\n<table>",
            catalog.generation(),
            catalog.len()
        );
        for (folder, count) in catalog.class_counts() {
            let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", folder.name(), count);
        }
        html.push_str("</table>\n");

        if let Some(report) = report {
            let built = report
                .built_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            let _ = writeln!(
                html,
                "<p>Last build: {} items, {} directories, {} skipped, {} errors, {} ms ({})</p>",
                report.items,
                report.containers,
                report.unclassified + report.rejected,
                report.error_count,
                report.duration_ms,
                built
            );
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

impl PageGenerator for PresentationPage {
    fn generate(&self, _query: Option<&str>) -> CatalogResult<GeneratedPage> {
        Ok(GeneratedPage::new(self.render(), PRESENTATION_CONTENT_TYPE))
    }
}

/// Action endpoint of the presentation page: applies the query, then
/// renders the page again
pub struct PresentationAction {
    page: Arc<PresentationPage>,
}

impl PresentationAction {
    pub fn new(page: Arc<PresentationPage>) -> Self {
        Self { page }
    }
}

impl PageGenerator for PresentationAction {
    fn generate(&self, query: Option<&str>) -> CatalogResult<GeneratedPage> {
        if let Some(query) = query {
            self.page.apply(query)?;
        }
        self.page.generate(None)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
