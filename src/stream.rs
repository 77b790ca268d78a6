//! Byte streams handed to the serving layer
//!
//! Catalog items are served from disk through [`FileStream`], generated
//! pages through [`MemoryStream`]. Both implement [`ContentStream`] so the
//! serving side does not care where the bytes come from.

use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, CatalogResult};

/// Contract shared by every content source
pub trait ContentStream: Send {
    /// Logical name or path the stream was opened for
    fn name(&self) -> &str;

    /// MIME type of the content
    fn content_type(&self) -> &str;

    /// Logical length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor
    fn position(&self) -> u64;

    /// Read up to `buf.len()` bytes at the cursor, 0 at end of stream
    fn read(&mut self, buf: &mut [u8]) -> CatalogResult<usize>;

    /// Move the cursor, the target must lie within `[0, len]`
    fn seek(&mut self, pos: SeekFrom) -> CatalogResult<u64>;

    /// Drop the logical content, length and cursor become zero
    fn cleanup(&mut self);

    /// Release the backing resource, closing twice is a no-op
    fn close(&mut self);
}

/// Absolute target of a seek, validated against `[0, len]`
fn seek_target(pos: SeekFrom, current: u64, len: u64) -> CatalogResult<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(offset) => current as i128 + offset as i128,
        SeekFrom::End(offset) => len as i128 + offset as i128,
    };
    if target < 0 || target > len as i128 {
        return Err(CatalogError::out_of_range(target, len));
    }
    Ok(target as u64)
}

/// Stream over an in-memory snapshot.
///
/// The snapshot is a cheap clone of an immutable [`Bytes`] taken when the
/// stream is opened. Whoever produced it may publish new content at any
/// time, this stream keeps serving the bytes it was opened with.
#[derive(Debug)]
pub struct MemoryStream {
    name: String,
    content_type: String,
    contents: Option<Bytes>,
    pos: u64,
    len: u64,
}

impl MemoryStream {
    /// Open a stream over a snapshot of `contents`
    pub fn open(name: impl Into<String>, contents: Bytes, content_type: impl Into<String>) -> Self {
        let len = contents.len() as u64;
        Self {
            name: name.into(),
            content_type: content_type.into(),
            contents: Some(contents),
            pos: 0,
            len,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.contents.is_none()
    }

    /// The snapshot this stream serves
    pub fn snapshot(&self) -> Option<&Bytes> {
        self.contents.as_ref()
    }
}

impl ContentStream for MemoryStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> CatalogResult<usize> {
        let contents = self.contents.as_ref().ok_or_else(CatalogError::closed)?;
        let start = self.pos as usize;
        let count = buf.len().min(self.len.saturating_sub(self.pos) as usize);
        buf[..count].copy_from_slice(&contents[start..start + count]);
        self.pos += count as u64;
        log::trace!("Read {} bytes from {}", count, self.name);
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> CatalogResult<u64> {
        if self.contents.is_none() {
            return Err(CatalogError::closed());
        }
        match seek_target(pos, self.pos, self.len) {
            Ok(target) => {
                log::debug!("Seek {} from {} to {}", self.name, self.pos, target);
                self.pos = target;
                Ok(target)
            }
            Err(e) => {
                log::debug!("{}: cannot seek: {}", self.name, e.message);
                Err(e)
            }
        }
    }

    fn cleanup(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    fn close(&mut self) {
        if self.contents.take().is_some() {
            log::debug!("Closed {}", self.name);
        }
        self.len = 0;
        self.pos = 0;
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(ContentStream::read(self, buf)?)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Ok(ContentStream::seek(self, pos)?)
    }
}

/// Stream over a file on disk
#[derive(Debug)]
pub struct FileStream {
    name: String,
    path: PathBuf,
    content_type: String,
    file: Option<File>,
    pos: u64,
    len: u64,
}

impl FileStream {
    /// Open `path` for reading
    pub fn open(path: &Path, content_type: impl Into<String>) -> CatalogResult<Self> {
        let file = File::open(path).map_err(|e| CatalogError::from(e).with_path(path.to_path_buf()))?;
        let len = file
            .metadata()
            .map_err(|e| CatalogError::from(e).with_path(path.to_path_buf()))?
            .len();
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            path: path.to_path_buf(),
            content_type: content_type.into(),
            file: Some(file),
            pos: 0,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentStream for FileStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> CatalogResult<usize> {
        let file = self.file.as_mut().ok_or_else(CatalogError::closed)?;
        let want = buf.len().min(self.len.saturating_sub(self.pos) as usize);
        let count = file
            .read(&mut buf[..want])
            .map_err(|e| CatalogError::from(e).with_path(self.path.clone()))?;
        self.pos += count as u64;
        Ok(count)
    }

    fn seek(&mut self, pos: SeekFrom) -> CatalogResult<u64> {
        let file = self.file.as_mut().ok_or_else(CatalogError::closed)?;
        let target = seek_target(pos, self.pos, self.len)?;
        file.seek(SeekFrom::Start(target))
            .map_err(|e| CatalogError::from(e).with_path(self.path.clone()))?;
        self.pos = target;
        Ok(target)
    }

    fn cleanup(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            log::debug!("Closed {:?}", self.path);
        }
        self.len = 0;
        self.pos = 0;
    }
}
