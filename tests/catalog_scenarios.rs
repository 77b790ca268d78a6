//! End-to-end catalog scenarios
//!
//! Builds catalogs from real directory fixtures and checks the tree
//! shape, the class folders and the page streams.

use bytes::Bytes;
use media_catalog::models::FIRST_DYNAMIC_ID;
use media_catalog::{
    Catalog, CatalogConfig, CatalogHandle, CatalogResult, ContentStream, GeneratedPage,
    MediaClass, MediaItem, MediaServer, MemoryStream, MimeTable, PageGenerator, PageRegistry,
    VirtualFolder, ROOT_ID,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn config_for(dirs: &[&TempDir]) -> CatalogConfig {
    CatalogConfig::builder()
        .content_dirs(dirs.iter().map(|d| d.path().to_path_buf()).collect())
        .build()
}

fn build(dirs: &[&TempDir]) -> Catalog {
    let (catalog, _) = Catalog::build(&config_for(dirs), &MimeTable::default(), 1).unwrap();
    catalog
}

fn read_all(stream: &mut dyn ContentStream) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 16];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn test_mixed_directory_scenario() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.jpg"), b"jpeg").unwrap();
    fs::write(dir.path().join("b.mp3"), b"mpeg").unwrap();
    fs::write(dir.path().join(".hidden"), b"secret").unwrap();
    fs::write(dir.path().join("readme.txt"), b"text").unwrap();

    let (catalog, report) =
        Catalog::build(&config_for(&[&dir]), &MimeTable::default(), 1).unwrap();
    assert_eq!(report.items, 2);
    assert_eq!(report.unclassified, 1);

    let literal: Vec<_> = catalog.children(VirtualFolder::Folders.id()).collect();
    assert_eq!(literal.len(), 2);
    assert_eq!(literal[0].title, "a");
    assert_eq!(literal[0].media_class(), Some(MediaClass::Image));
    assert_eq!(literal[1].title, "b");
    assert_eq!(literal[1].media_class(), Some(MediaClass::Audio));

    let images: Vec<_> = catalog.children(VirtualFolder::Image.id()).collect();
    let music: Vec<_> = catalog.children(VirtualFolder::Music.id()).collect();
    assert_eq!(images.len(), 1);
    assert_eq!(music.len(), 1);
    assert!(catalog.find_by_id(VirtualFolder::Video.id()).is_none());
    assert!(catalog.find_by_id(VirtualFolder::Others.id()).is_none());

    assert_eq!(catalog.items().count(), 4);
    assert!(catalog
        .entries()
        .all(|e| !e.title.starts_with('.') && e.title != "readme"));
}

#[test]
fn test_multi_dot_audio_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("Live")).unwrap();
    fs::write(dir.path().join("Live/foo.bar.mp3"), b"mpeg").unwrap();

    let catalog = build(&[&dir]);
    let live = catalog.children(VirtualFolder::Folders.id()).next().unwrap();
    let literal = catalog.children(live.id).next().unwrap();
    let grouped = catalog.children(VirtualFolder::Music.id()).next().unwrap();

    for entry in [literal, grouped] {
        assert_eq!(entry.title, "foo.bar");
        assert_eq!(entry.media_class(), Some(MediaClass::Audio));
        assert!(entry.url.is_some());
        assert_eq!(entry.size, Some(4));
    }
    assert_ne!(literal.id, grouped.id);
    assert_ne!(literal.url, grouped.url);
    assert_eq!(literal.parent, Some(live.id));
    assert_eq!(grouped.parent, Some(VirtualFolder::Music.id()));
    assert!(Arc::ptr_eq(literal.item().unwrap(), grouped.item().unwrap()));
}

#[test]
fn test_files_without_known_extension_are_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Makefile"), b"all:").unwrap();
    fs::write(dir.path().join("notes.doc"), b"doc").unwrap();
    fs::write(dir.path().join("movie.MKV"), b"mkv").unwrap();

    let catalog = build(&[&dir]);
    let titles: Vec<_> = catalog
        .children(VirtualFolder::Folders.id())
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(titles, vec!["movie"]);
    assert_eq!(catalog.children(VirtualFolder::Video.id()).count(), 1);
}

#[test]
fn test_tree_shape_invariants() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::create_dir_all(first.path().join("x/y/z")).unwrap();
    fs::write(first.path().join("x/y/z/deep.png"), b"png").unwrap();
    fs::write(first.path().join("x/clip.mp4"), b"mp4").unwrap();
    fs::create_dir(first.path().join("empty")).unwrap();
    fs::write(second.path().join("list.m3u"), b"#EXTM3U").unwrap();
    fs::write(second.path().join("sub.srt"), b"1").unwrap();

    let catalog = build(&[&first, &second]);

    // exactly one root
    let roots: Vec<_> = catalog.entries().filter(|e| e.parent.is_none()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, ROOT_ID);

    // everything reachable from the root, each entry exactly once
    let mut seen = HashSet::new();
    let mut stack = vec![ROOT_ID];
    while let Some(id) = stack.pop() {
        assert!(seen.insert(id), "entry {} reached twice", id);
        stack.extend(catalog.find_by_id(id).unwrap().children.iter().copied());
    }
    assert_eq!(seen.len(), catalog.len());

    for entry in catalog.entries() {
        assert_eq!(entry.url.is_some(), entry.is_item());
        assert_eq!(entry.child_count as usize, entry.children.len());
        if let Some(parent) = entry.parent {
            assert!(catalog.find_by_id(parent).unwrap().children.contains(&entry.id));
        }
    }

    // dynamic ids grow in creation order
    let dynamic: Vec<_> = catalog
        .entries()
        .map(|e| e.id)
        .filter(|id| *id >= FIRST_DYNAMIC_ID)
        .collect();
    assert!(dynamic.windows(2).all(|w| w[0] < w[1]));

    // playlists go to music, subtitles to others
    assert_eq!(catalog.children(VirtualFolder::Music.id()).count(), 1);
    assert_eq!(catalog.children(VirtualFolder::Others.id()).count(), 1);
    assert!(catalog
        .class_counts()
        .contains(&(VirtualFolder::Image, 1)));
}

#[test]
fn test_rebuild_restarts_ids() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.mp3"), b"x").unwrap();

    let handle = CatalogHandle::new(&config_for(&[&dir]), Arc::new(MimeTable::default()));
    handle.build(&config_for(&[&dir])).unwrap();
    let before: Vec<_> = handle.current().entries().map(|e| e.id).collect();
    handle.rebuild(&config_for(&[&dir])).unwrap();
    let after: Vec<_> = handle.current().entries().map(|e| e.id).collect();

    assert_eq!(before, after);
}

#[test]
fn test_readers_during_rebuild_see_whole_generations() {
    let dir = TempDir::new().unwrap();
    for i in 0..20 {
        fs::write(dir.path().join(format!("track{:02}.mp3", i)), b"x").unwrap();
    }
    let config = config_for(&[&dir]);
    let handle = Arc::new(CatalogHandle::new(&config, Arc::new(MimeTable::default())));
    handle.build(&config).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let catalog = handle.current();
                    assert_eq!(catalog.children(VirtualFolder::Music.id()).count(), 20);
                    for entry in catalog.entries() {
                        for child in &entry.children {
                            assert!(catalog.find_by_id(*child).is_some());
                        }
                    }
                }
            })
        })
        .collect();

    for _ in 0..5 {
        handle.rebuild(&config).unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(handle.current().generation(), 6);
}

/// Generator that rewrites one shared buffer on every call
struct Rewriting {
    source: Mutex<Bytes>,
    version: Mutex<u8>,
}

impl PageGenerator for Rewriting {
    fn generate(&self, _query: Option<&str>) -> CatalogResult<GeneratedPage> {
        let mut version = self.version.lock();
        *version = version.wrapping_add(1);
        let body = Bytes::from(vec![b'a' + (*version % 26); 1024]);
        *self.source.lock() = body.clone();
        Ok(GeneratedPage::new(body, "text/plain"))
    }
}

#[test]
fn test_concurrent_opens_get_consistent_snapshots() {
    let mut registry = PageRegistry::new();
    registry.register(
        "status.html",
        Arc::new(Rewriting {
            source: Mutex::new(Bytes::new()),
            version: Mutex::new(0),
        }),
    );
    let registry = Arc::new(registry);

    // the second open rewrites the source while the first is still unread
    let mut first = registry.open("/status.html").unwrap();
    let mut second = registry.open("/status.html").unwrap();
    let first_bytes = read_all(&mut first);
    let second_bytes = read_all(&mut second);
    assert!(first_bytes.iter().all(|b| *b == b'b'));
    assert!(second_bytes.iter().all(|b| *b == b'c'));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let mut stream: MemoryStream = registry.open("/status.html").unwrap();
                    let bytes = read_all(&mut stream);
                    assert_eq!(bytes.len(), 1024);
                    assert!(bytes.iter().all(|b| *b == bytes[0]), "torn page");
                    stream.close();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn test_server_serves_page_and_items() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("photo.png"), b"\x89PNG").unwrap();
    let server = MediaServer::with_default_mime(config_for(&[&dir]));
    server.start().unwrap();

    let mut page = server.open("/index.html").unwrap();
    let html = String::from_utf8(read_all(page.as_mut())).unwrap();
    assert!(html.contains("<td>image</td><td>1</td>"));
    page.close();
    page.close();

    let id = server
        .catalog()
        .children(VirtualFolder::Image.id())
        .next()
        .unwrap()
        .id;
    let mut file = server.open(&format!("/web/{}", id)).unwrap();
    assert_eq!(file.len(), 4);
    assert_eq!(read_all(file.as_mut()), b"\x89PNG");
}

#[test]
fn test_page_seek_bounds() {
    let mut stream = MemoryStream::open("p", Bytes::from_static(b"hello"), "text/plain");
    stream.seek(std::io::SeekFrom::Start(2)).unwrap();
    assert!(ContentStream::seek(&mut stream, std::io::SeekFrom::Current(-3)).is_err());
    assert!(ContentStream::seek(&mut stream, std::io::SeekFrom::Start(6)).is_err());
    assert_eq!(stream.position(), 2);
}

fn song(name: &str) -> Arc<MediaItem> {
    Arc::new(MediaItem::new(
        PathBuf::from(format!("/music/{}", name)),
        1,
        MediaClass::Audio,
        "http-get:*:audio/mpeg:*",
        "audio/mpeg",
    ))
}

proptest! {
    #[test]
    fn prop_ids_unique_and_increasing(ops in prop::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 1..60)) {
        let mut catalog = Catalog::new(CatalogConfig::default(), 1);
        let mut containers = vec![ROOT_ID];
        let mut created = Vec::new();

        for (i, (is_container, pick)) in ops.into_iter().enumerate() {
            let parent = *pick.get(&containers);
            let name = format!("entry{}.mp3", i);
            let id = if is_container {
                let id = catalog.add_container(&name, 0, parent).unwrap();
                containers.push(id);
                id
            } else {
                catalog.add_resource(&name, song(&name), parent).unwrap()
            };
            created.push(id);
        }

        prop_assert!(created.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(catalog.len(), created.len() + 1);
        for id in created {
            let entry = catalog.find_by_id(id).unwrap();
            let parent = catalog.find_by_id(entry.parent.unwrap()).unwrap();
            prop_assert_eq!(parent.children.iter().filter(|c| **c == id).count(), 1);
            prop_assert!(catalog.path_to_root(id).ends_with(&[ROOT_ID]));
        }
    }
}
