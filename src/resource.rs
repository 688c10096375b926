//! Resource handles: remote URLs with a cache, or plain local files.
//!
//! [`Resource`] is the string-level entry point. Identifiers with an
//! `http`/`https` scheme get the caching [`UrlResource`] handle; `file:`
//! URLs and anything that does not parse as an absolute URL degrade to a
//! [`FileResource`] with the same capability surface.

use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::Options;
use crate::fetch::FetchError;
use crate::handle::UrlResource;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ReadError>;

/// Materialized resource content.
///
/// The variant records the handle's mode at materialization time; text is
/// lossy UTF-8 of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Binary(Bytes),
    Text(String),
}

impl Content {
    pub fn materialize(body: Bytes, binary: bool) -> Self {
        if binary {
            Content::Binary(body)
        } else {
            Content::Text(String::from_utf8_lossy(&body).into_owned())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Binary(b) => b.len(),
            Content::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Binary(b) => b,
            Content::Text(t) => t.as_bytes(),
        }
    }

    /// Text view; none for binary content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Binary(_) => None,
            Content::Text(t) => Some(t),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Content::Binary(b) => b,
            Content::Text(t) => Bytes::from(t),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Content::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
            Content::Text(t) => t,
        }
    }
}

/// A plain local file behind the handle capability surface.
///
/// No cache, no credentials, no links; reads and writes go straight to the
/// named path.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    binary: bool,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>, options: &Options) -> Self {
        Self {
            path: path.into(),
            binary: options.binary,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn stat(&self) -> Option<fs::Metadata> {
        fs::metadata(&self.path).ok()
    }

    pub fn set_binary(&mut self, binary: bool) {
        self.binary = binary;
    }

    pub fn read(&self) -> Result<Content> {
        let body = fs::read(&self.path)?;
        Ok(Content::materialize(Bytes::from(body), self.binary))
    }

    /// Bytes written; 0 is a logged no-op on failure.
    pub fn write(&mut self, data: &[u8]) -> usize {
        match fs::write(&self.path, data) {
            Ok(()) => data.len(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "local write failed");
                0
            }
        }
    }
}

/// A resource named by a string.
#[derive(Debug)]
pub enum Resource {
    Url(UrlResource),
    File(FileResource),
}

impl Resource {
    /// Build a handle from an identifier.
    ///
    /// The only failure is HTTP client construction; unparseable
    /// identifiers are not errors, they name local files.
    pub fn new(spec: &str, options: Options) -> crate::fetch::Result<Self> {
        match Url::parse(spec) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Ok(Resource::Url(UrlResource::from_url(url, options)?))
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .unwrap_or_else(|_| PathBuf::from(url.path()));
                Ok(Resource::File(FileResource::new(path, &options)))
            }
            Ok(_) | Err(_) => Ok(Resource::File(FileResource::new(spec, &options))),
        }
    }

    pub fn read(&mut self) -> Result<Content> {
        match self {
            Resource::Url(u) => u.read(),
            Resource::File(f) => f.read(),
        }
    }

    pub fn read_text(&mut self) -> Result<String> {
        match self {
            Resource::Url(u) => u.read_text(),
            Resource::File(f) => {
                f.set_binary(false);
                Ok(f.read()?.into_string())
            }
        }
    }

    pub fn read_bytes(&mut self) -> Result<Bytes> {
        match self {
            Resource::Url(u) => u.read_bytes(),
            Resource::File(f) => {
                f.set_binary(true);
                Ok(f.read()?.into_bytes())
            }
        }
    }

    pub fn write(&mut self, data: &[u8]) -> usize {
        match self {
            Resource::Url(u) => u.write(data, None),
            Resource::File(f) => f.write(data),
        }
    }

    pub fn write_text(&mut self, data: &str) -> usize {
        match self {
            Resource::Url(u) => u.write_text(data),
            Resource::File(f) => {
                f.set_binary(false);
                f.write(data.as_bytes())
            }
        }
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        match self {
            Resource::Url(u) => u.write_bytes(data),
            Resource::File(f) => {
                f.set_binary(true);
                f.write(data)
            }
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            Resource::Url(u) => u.exists(),
            Resource::File(f) => f.exists(),
        }
    }

    pub fn stat(&self) -> Option<fs::Metadata> {
        match self {
            Resource::Url(u) => u.stat(),
            Resource::File(f) => f.stat(),
        }
    }

    /// Drop the cached entry. A no-op for local files, which have no cache.
    pub fn clear(&mut self) {
        if let Resource::Url(u) = self {
            u.clear();
        }
    }

    /// Children discovered in a listing body; always empty for local files.
    pub fn links(&self) -> &[UrlResource] {
        match self {
            Resource::Url(u) => u.links(),
            Resource::File(_) => &[],
        }
    }

    pub fn as_url(&self) -> Option<&UrlResource> {
        match self {
            Resource::Url(u) => Some(u),
            Resource::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileResource> {
        match self {
            Resource::Url(_) => None,
            Resource::File(f) => Some(f),
        }
    }
}
