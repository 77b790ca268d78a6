//! Extension based MIME classification
//!
//! Maps a file name to its media class and transport protocol descriptor.
//! Files the table does not know are left out of the catalog.

use serde::{Deserialize, Serialize};

use crate::models::MediaClass;

/// Outcome of a successful classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: MediaClass,
    /// Transport protocol descriptor, e.g. `http-get:*:audio/mpeg:*`
    pub protocol: String,
    /// MIME type
    pub mime: String,
}

/// Something that can classify file names
pub trait MimeClassifier: Send + Sync {
    /// Classify a file name, `None` when the name is not a known media file
    fn classify(&self, filename: &str) -> Option<Classification>;
}

/// One row of the MIME table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeEntry {
    /// Extension without the dot
    pub extension: String,
    pub class: MediaClass,
    /// Protocol name, e.g. `http-get`
    pub protocol: String,
    pub mime: String,
}

impl MimeEntry {
    pub fn new(extension: &str, class: MediaClass, mime: &str) -> Self {
        Self {
            extension: extension.to_string(),
            class,
            protocol: "http-get".to_string(),
            mime: mime.to_string(),
        }
    }

    /// Full protocol descriptor for this entry
    pub fn protocol_info(&self) -> String {
        format!("{}:*:{}:*", self.protocol, self.mime)
    }
}

/// Ordered extension table, first match wins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimeTable {
    entries: Vec<MimeEntry>,
}

/// Get the extension of a file name: the text after the last dot
pub fn extension(filename: &str) -> Option<&str> {
    filename
        .rfind('.')
        .map(|pos| &filename[pos + 1..])
        .filter(|ext| !ext.is_empty())
}

impl MimeTable {
    /// Create a table from ordered entries
    pub fn from_entries(entries: Vec<MimeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[MimeEntry] {
        &self.entries
    }

    /// Look up the entry for an extension
    pub fn lookup(&self, ext: &str) -> Option<&MimeEntry> {
        self.entries
            .iter()
            .find(|entry| entry.extension.eq_ignore_ascii_case(ext))
    }

    /// Default video extensions
    fn video_entries() -> Vec<MimeEntry> {
        [
            ("asf", "video/x-ms-asf"),
            ("avi", "video/x-msvideo"),
            ("divx", "video/x-msvideo"),
            ("flv", "video/x-flv"),
            ("m2ts", "video/mpeg"),
            ("m4v", "video/mp4"),
            ("mkv", "video/x-matroska"),
            ("mov", "video/quicktime"),
            ("mp4", "video/mp4"),
            ("mpeg", "video/mpeg"),
            ("mpg", "video/mpeg"),
            ("ogm", "video/mpeg"),
            ("rmvb", "video/mpeg"),
            ("ts", "video/mpeg"),
            ("vob", "video/mpeg"),
            ("webm", "video/webm"),
            ("wmv", "video/x-ms-wmv"),
        ]
        .iter()
        .map(|(ext, mime)| MimeEntry::new(ext, MediaClass::Av, mime))
        .collect()
    }

    /// Default audio extensions
    fn audio_entries() -> Vec<MimeEntry> {
        [
            ("aac", "audio/x-aac"),
            ("ac3", "audio/x-ac3"),
            ("aif", "audio/aiff"),
            ("aiff", "audio/aiff"),
            ("flac", "audio/x-flac"),
            ("m4a", "audio/mp4"),
            ("mp2", "audio/mpeg"),
            ("mp3", "audio/mpeg"),
            ("ogg", "audio/x-ogg"),
            ("wav", "audio/wav"),
            ("wma", "audio/x-ms-wma"),
        ]
        .iter()
        .map(|(ext, mime)| MimeEntry::new(ext, MediaClass::Audio, mime))
        .collect()
    }

    /// Default image extensions
    fn image_entries() -> Vec<MimeEntry> {
        [
            ("bmp", "image/bmp"),
            ("gif", "image/gif"),
            ("jpeg", "image/jpeg"),
            ("jpg", "image/jpeg"),
            ("png", "image/png"),
            ("tif", "image/tiff"),
            ("tiff", "image/tiff"),
            ("webp", "image/webp"),
        ]
        .iter()
        .map(|(ext, mime)| MimeEntry::new(ext, MediaClass::Image, mime))
        .collect()
    }

    /// Default playlist and subtitle extensions
    fn other_entries() -> Vec<MimeEntry> {
        vec![
            MimeEntry::new("m3u", MediaClass::Collection, "audio/x-mpegurl"),
            MimeEntry::new("pls", MediaClass::Collection, "audio/x-scpls"),
            MimeEntry::new("srt", MediaClass::Unknown, "text/srt"),
            MimeEntry::new("sub", MediaClass::Unknown, "text/sub"),
        ]
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        let mut entries = Self::video_entries();
        entries.extend(Self::audio_entries());
        entries.extend(Self::image_entries());
        entries.extend(Self::other_entries());
        Self::from_entries(entries)
    }
}

impl MimeClassifier for MimeTable {
    fn classify(&self, filename: &str) -> Option<Classification> {
        let entry = self.lookup(extension(filename)?)?;
        Some(Classification {
            class: entry.class,
            protocol: entry.protocol_info(),
            mime: entry.mime.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_uses_last_dot() {
        assert_eq!(extension("foo.bar.mp3"), Some("mp3"));
        assert_eq!(extension("movie.MKV"), Some("MKV"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_classify_known_extensions() {
        let table = MimeTable::default();

        let c = table.classify("song.mp3").unwrap();
        assert_eq!(c.class, MediaClass::Audio);
        assert_eq!(c.protocol, "http-get:*:audio/mpeg:*");

        assert_eq!(table.classify("photo.JPG").unwrap().class, MediaClass::Image);
        assert_eq!(table.classify("clip.mp4").unwrap().class, MediaClass::Av);
        assert_eq!(
            table.classify("list.m3u").unwrap().class,
            MediaClass::Collection
        );
    }

    #[test]
    fn test_classify_rejects_unknown() {
        let table = MimeTable::default();
        assert!(table.classify("readme.txt").is_none());
        assert!(table.classify("Makefile").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let table = MimeTable::from_entries(vec![
            MimeEntry::new("ogg", MediaClass::Av, "video/ogg"),
            MimeEntry::new("ogg", MediaClass::Audio, "audio/ogg"),
        ]);
        assert_eq!(table.classify("a.ogg").unwrap().class, MediaClass::Av);
    }
}
