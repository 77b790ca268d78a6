//! Catalog module - the tree of containers and items
//!
//! A [`Catalog`] is one generation of the content tree. It is built from
//! the configured content directories, then published through a
//! [`CatalogHandle`] and never modified again. A reload builds a fresh
//! generation and swaps it in, readers holding the previous one keep it
//! alive until they let go.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::mime::MimeClassifier;
use crate::models::{
    BuildReport, CatalogEntry, EntryId, EntryKind, MediaItem, VirtualFolder, FIRST_DYNAMIC_ID,
    ROOT_ID,
};
use crate::scanner::DirectoryScanner;

/// One generation of the catalog tree
#[derive(Debug)]
pub struct Catalog {
    generation: u64,
    config: CatalogConfig,
    entries: Vec<CatalogEntry>,
    index: HashMap<EntryId, usize>,
    next_id: EntryId,
}

impl Catalog {
    /// Create a catalog holding only the root container
    pub fn new(config: CatalogConfig, generation: u64) -> Self {
        let root = CatalogEntry {
            id: ROOT_ID,
            title: "root".to_string(),
            fullpath: None,
            kind: EntryKind::Container { folder: None },
            url: None,
            size: Some(0),
            parent: None,
            children: Vec::new(),
            child_count: 0,
        };

        Self {
            generation,
            config,
            entries: vec![root],
            index: HashMap::from([(ROOT_ID, 0)]),
            next_id: FIRST_DYNAMIC_ID,
        }
    }

    /// Build a catalog from the configured content directories.
    ///
    /// Every classified file gets two entries: one under its directory
    /// (below the `folders` class folder) and one under its class folder.
    /// Unreadable paths, unknown extensions and names that cannot become
    /// a title are skipped and reported, they never fail the build.
    pub fn build(
        config: &CatalogConfig,
        classifier: &dyn MimeClassifier,
        generation: u64,
    ) -> CatalogResult<(Catalog, BuildReport)> {
        if !config.has_content() {
            return Err(CatalogError::no_content());
        }

        log::info!("Building catalog generation {} ...", generation);
        let start = Instant::now();
        let mut report = BuildReport {
            generation,
            content_dirs: config.content_dirs.clone(),
            built_at: Some(chrono::Utc::now()),
            ..BuildReport::new()
        };

        let mut catalog = Catalog::new(config.clone(), generation);
        let folders = VirtualFolder::Folders;
        let folders_id = catalog.add_container(folders.name(), folders.id(), ROOT_ID)?;

        let mut scanner =
            DirectoryScanner::new(config.content_dirs.clone()).with_max_depth(config.max_depth);
        // parents[d - 1] is the container for entries at depth d
        let mut parents: Vec<EntryId> = vec![folders_id];

        while let Some(entry) = scanner.next() {
            parents.truncate(entry.depth);
            let Some(&parent) = parents.get(entry.depth.saturating_sub(1)) else {
                continue;
            };

            if entry.is_container {
                match catalog.add_directory(&entry.name, entry.path.clone(), parent) {
                    Ok(id) => {
                        parents.push(id);
                        report.containers += 1;
                    }
                    Err(e) if e.is_recoverable() => {
                        log::warn!("Skipping directory {:?}: {}", entry.path, e.message);
                        scanner.skip_current_dir();
                        report.rejected += 1;
                        report.errors.push(e);
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            let filename = entry.name.to_string_lossy();
            let Some(class) = classifier.classify(&filename) else {
                log::debug!("Unclassified file {:?}", entry.path);
                report.unclassified += 1;
                continue;
            };

            let item = Arc::new(MediaItem::new(
                entry.path.clone(),
                entry.size,
                class.class,
                class.protocol,
                class.mime,
            ));
            match catalog.add_item(&entry.name, item, parent) {
                Ok(_) => report.items += 1,
                Err(e) if e.is_recoverable() => {
                    log::warn!("Skipping file {:?}: {}", entry.path, e.message);
                    report.rejected += 1;
                    report.errors.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        report.errors.extend(scanner.take_errors());
        report.error_count = report.errors.len();
        report.duration_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Catalog generation {} built: {} containers, {} items, {} skipped, {} errors in {}ms",
            generation,
            report.containers,
            report.items,
            report.unclassified + report.rejected,
            report.error_count,
            report.duration_ms
        );

        Ok((catalog, report))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Number of entries, root included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds nothing but the root
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn root(&self) -> &CatalogEntry {
        &self.entries[0]
    }

    /// All entries in creation order
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// All item entries in creation order
    pub fn items(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|entry| entry.is_item())
    }

    /// Look up an entry by id
    pub fn find_by_id(&self, id: EntryId) -> Option<&CatalogEntry> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }

    /// Depth-first search for `id` in the subtree rooted at `root`
    pub fn find_in(&self, root: EntryId, id: EntryId) -> Option<&CatalogEntry> {
        let mut stack = vec![self.find_by_id(root)?];
        while let Some(entry) = stack.pop() {
            if entry.id == id {
                return Some(entry);
            }
            stack.extend(entry.children.iter().rev().filter_map(|c| self.find_by_id(*c)));
        }
        None
    }

    /// Children of a container in insertion order
    pub fn children(&self, id: EntryId) -> impl Iterator<Item = &CatalogEntry> {
        self.find_by_id(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |child| self.find_by_id(*child))
    }

    pub fn parent(&self, id: EntryId) -> Option<&CatalogEntry> {
        self.find_by_id(id)?.parent.and_then(|p| self.find_by_id(p))
    }

    /// Ids from the entry up to the root, both included
    pub fn path_to_root(&self, id: EntryId) -> Vec<EntryId> {
        let mut chain = Vec::new();
        let mut current = self.find_by_id(id);
        while let Some(entry) = current {
            chain.push(entry.id);
            current = entry.parent.and_then(|p| self.find_by_id(p));
        }
        chain
    }

    /// Number of entries filed under each class folder present
    pub fn class_counts(&self) -> Vec<(VirtualFolder, u32)> {
        VirtualFolder::ALL
            .into_iter()
            .filter(|folder| *folder != VirtualFolder::Folders)
            .filter_map(|folder| {
                self.find_by_id(folder.id())
                    .map(|entry| (folder, entry.child_count))
            })
            .collect()
    }

    /// Add a container under `parent_id`.
    ///
    /// A `requested_id` of 0 allocates a fresh id. If an entry with the
    /// requested id already exists it is reused and its id returned. The
    /// last id of the id space cannot be requested, the allocator has to
    /// move past it.
    pub fn add_container(
        &mut self,
        name: impl AsRef<OsStr>,
        requested_id: EntryId,
        parent_id: EntryId,
    ) -> CatalogResult<EntryId> {
        if requested_id != 0 {
            if let Some(existing) = self.find_by_id(requested_id) {
                if existing.is_container() {
                    return Ok(requested_id);
                }
                return Err(CatalogError::invalid_hierarchy(format!(
                    "Entry {} exists and is not a container",
                    requested_id
                )));
            }
        }

        let folder = VirtualFolder::from_id(requested_id);
        let size = if folder.is_some() { Some(0) } else { None };
        let title = self.title(name.as_ref(), false)?;
        self.insert(
            requested_id,
            title,
            None,
            parent_id,
            size,
            EntryKind::Container { folder },
        )
    }

    /// Create an entry with a fresh id and attach it under `parent_id`.
    ///
    /// Item titles lose their final extension. A name that cannot become a
    /// title is logged and rejected with `InvalidName`, nothing is inserted.
    pub fn new_entry(
        &mut self,
        name: impl AsRef<OsStr>,
        fullpath: Option<PathBuf>,
        parent_id: EntryId,
        size: Option<u64>,
        kind: EntryKind,
    ) -> CatalogResult<EntryId> {
        let strip_extension = matches!(kind, EntryKind::Item(_));
        let title = match self.title(name.as_ref(), strip_extension) {
            Ok(title) => title,
            Err(e) => {
                let e = match fullpath {
                    Some(path) => e.with_path(path),
                    None => e,
                };
                log::debug!("Rejected entry {:?}: {}", e.path, e.message);
                return Err(e);
            }
        };
        self.insert(0, title, fullpath, parent_id, size, kind)
    }

    /// Add a container for a literal directory
    pub fn add_directory(
        &mut self,
        name: impl AsRef<OsStr>,
        path: PathBuf,
        parent_id: EntryId,
    ) -> CatalogResult<EntryId> {
        self.new_entry(
            name,
            Some(path),
            parent_id,
            None,
            EntryKind::Container { folder: None },
        )
    }

    /// Add an item entry for `item` under `parent_id`
    pub fn add_resource(
        &mut self,
        name: impl AsRef<OsStr>,
        item: Arc<MediaItem>,
        parent_id: EntryId,
    ) -> CatalogResult<EntryId> {
        let fullpath = Some(item.path.clone());
        let size = Some(item.size);
        self.new_entry(name, fullpath, parent_id, size, EntryKind::Item(item))
    }

    /// File an item under its directory container and under its class
    /// folder, creating the class folder on first use.
    ///
    /// Returns the ids of the literal entry and the class folder entry.
    pub fn add_item(
        &mut self,
        name: impl AsRef<OsStr>,
        item: Arc<MediaItem>,
        parent_id: EntryId,
    ) -> CatalogResult<(EntryId, EntryId)> {
        let name = name.as_ref();
        self.container(parent_id)?;
        // fail before touching the class folder
        self.title(name, true)
            .map_err(|e| e.with_path(item.path.clone()))?;

        let folder = VirtualFolder::for_class(item.class);
        let folder_id = self.add_container(folder.name(), folder.id(), ROOT_ID)?;
        let class_entry = self.add_resource(name, item.clone(), folder_id)?;
        let literal_entry = self.add_resource(name, item, parent_id)?;
        Ok((literal_entry, class_entry))
    }

    /// Append `child` to the children of `parent`.
    ///
    /// Attaching a child that is already present is a no-op and returns
    /// `false`. A child can only be attached to the parent it was created
    /// under, which keeps the tree acyclic.
    pub fn attach_child(&mut self, parent: EntryId, child: EntryId) -> CatalogResult<bool> {
        let child_parent = self
            .find_by_id(child)
            .ok_or_else(|| CatalogError::unknown_entry(child))?
            .parent;
        if child_parent != Some(parent) {
            return Err(CatalogError::invalid_hierarchy(format!(
                "Entry {} does not belong to container {}",
                child, parent
            )));
        }

        let slot = self.container(parent)?;
        let entry = &mut self.entries[slot];
        if entry.children.contains(&child) {
            return Ok(false);
        }
        entry.children.push(child);
        entry.child_count += 1;
        Ok(true)
    }

    /// Slot of a container entry
    fn container(&self, id: EntryId) -> CatalogResult<usize> {
        let slot = *self
            .index
            .get(&id)
            .ok_or_else(|| CatalogError::unknown_entry(id))?;
        if !self.entries[slot].is_container() {
            return Err(CatalogError::invalid_hierarchy(format!(
                "Entry {} is not a container",
                id
            )));
        }
        Ok(slot)
    }

    fn allocate_id(&mut self) -> CatalogResult<EntryId> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| CatalogError::ids_exhausted(id))?;
        Ok(id)
    }

    fn insert(
        &mut self,
        requested_id: EntryId,
        title: String,
        fullpath: Option<PathBuf>,
        parent_id: EntryId,
        size: Option<u64>,
        kind: EntryKind,
    ) -> CatalogResult<EntryId> {
        self.container(parent_id)?;

        let id = if requested_id == ROOT_ID {
            self.allocate_id()?
        } else {
            if self.index.contains_key(&requested_id) {
                return Err(CatalogError::invalid_hierarchy(format!(
                    "Entry {} already exists",
                    requested_id
                )));
            }
            if requested_id >= self.next_id {
                self.next_id = requested_id
                    .checked_add(1)
                    .ok_or_else(|| CatalogError::ids_exhausted(requested_id))?;
            }
            requested_id
        };
        let url = match kind {
            EntryKind::Item(_) => Some(self.config.item_url(id)),
            EntryKind::Container { .. } => None,
        };

        self.index.insert(id, self.entries.len());
        self.entries.push(CatalogEntry {
            id,
            title,
            fullpath,
            kind,
            url,
            size,
            parent: Some(parent_id),
            children: Vec::new(),
            child_count: 0,
        });
        self.attach_child(parent_id, id)?;
        Ok(id)
    }

    /// Display title for a name, optionally without its final extension
    fn title(&self, name: &OsStr, strip_extension: bool) -> CatalogResult<String> {
        let mut title = match name.to_str() {
            Some(s) => s.to_string(),
            None if self.config.lossy_titles => name.to_string_lossy().into_owned(),
            None => return Err(CatalogError::invalid_name(PathBuf::from(name))),
        };
        if strip_extension {
            if let Some(pos) = title.rfind('.') {
                title.truncate(pos);
            }
        }
        if title.is_empty() {
            return Err(CatalogError::invalid_name(PathBuf::from(name)));
        }
        Ok(title)
    }
}

/// Publishes catalog generations to concurrent readers.
///
/// Readers take an `Arc` of the current generation and keep it for the
/// duration of their request. Rebuilds are serialized, run without
/// blocking readers, and only replace the published generation once the
/// new one is complete. A failed rebuild leaves the old generation in
/// place.
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
    last_report: RwLock<Option<BuildReport>>,
    classifier: Arc<dyn MimeClassifier>,
    rebuild_lock: Mutex<()>,
    generation: AtomicU64,
}

impl CatalogHandle {
    /// Create a handle publishing an empty catalog
    pub fn new(config: &CatalogConfig, classifier: Arc<dyn MimeClassifier>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Catalog::new(config.clone(), 0))),
            last_report: RwLock::new(None),
            classifier,
            rebuild_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// The published generation
    pub fn current(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Look up an entry in the published generation
    pub fn find_by_id(&self, id: EntryId) -> Option<CatalogEntry> {
        self.current().find_by_id(id).cloned()
    }

    pub fn classifier(&self) -> &dyn MimeClassifier {
        self.classifier.as_ref()
    }

    /// Report of the last successful build
    pub fn last_report(&self) -> Option<BuildReport> {
        self.last_report.read().clone()
    }

    /// Build a catalog for `config` and publish it
    pub fn build(&self, config: &CatalogConfig) -> CatalogResult<BuildReport> {
        let _guard = self.rebuild_lock.lock();
        // only published generations consume a number
        let generation = self.generation.load(Ordering::SeqCst) + 1;

        let (catalog, report) = match Catalog::build(config, self.classifier.as_ref(), generation) {
            Ok(built) => built,
            Err(e) => {
                log::error!(
                    "Catalog build failed, keeping generation {}: {}",
                    self.current().generation(),
                    e
                );
                return Err(e);
            }
        };

        self.publish(catalog);
        *self.last_report.write() = Some(report.clone());
        Ok(report)
    }

    /// Replace the catalog after a configuration change
    pub fn rebuild(&self, config: &CatalogConfig) -> CatalogResult<BuildReport> {
        log::info!("Rebuilding catalog ...");
        self.build(config)
    }

    /// Publish an empty catalog
    pub fn remove_all(&self) {
        let _guard = self.rebuild_lock.lock();
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        let config = self.current().config().clone();
        self.publish(Catalog::new(config, generation));
        *self.last_report.write() = None;
    }

    fn publish(&self, catalog: Catalog) {
        let generation = catalog.generation();
        self.generation.store(generation, Ordering::SeqCst);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(catalog));
        log::debug!(
            "Published catalog generation {} (retiring {}, {} readers left)",
            generation,
            previous.generation(),
            Arc::strong_count(&previous) - 1
        );
    }
}

impl std::fmt::Debug for CatalogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogHandle")
            .field("generation", &self.current().generation())
            .finish()
    }
}
