//! URL handles with transparent caching.
//!
//! A [`UrlResource`] behaves like a path: it can be read, written, and
//! cleared. Reads consult the resolved cache entry first and fall back to
//! retrieval; listing bodies are re-pointed at `index.html`, forced to
//! text, and mined for child handles that inherit the parent's cache and
//! credential policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{self, CacheRoots};
use crate::classify;
use crate::config::{self, CredentialPolicy, Options};
use crate::credentials::{self, CredentialSession, Credentials, EnvCredentials};
use crate::fetch::{Fetched, RetrievalEngine};
use crate::links;
use crate::resource::{Content, Result};

/// A URL that behaves like a local path backed by a cache.
#[derive(Debug, Clone)]
pub struct UrlResource {
    url: Url,
    binary: bool,
    cache_enabled: bool,
    policy: CredentialPolicy,
    roots: CacheRoots,
    ofile: Option<PathBuf>,
    index_rewrite: bool,
    content_type: Option<String>,
    read_path: Option<PathBuf>,
    write_path: Option<PathBuf>,
    readable: bool,
    writable: bool,
    children: Option<Vec<UrlResource>>,
    session: CredentialSession,
    engine: Arc<RetrievalEngine>,
}

impl UrlResource {
    /// Build a handle from a parsed URL.
    ///
    /// The identifier is normalized here: the fragment is dropped,
    /// trailing slashes leave the path, and userinfo moves out of the URL
    /// into the credential session, which then never consults the store.
    pub fn from_url(url: Url, options: Options) -> crate::fetch::Result<Self> {
        let engine = Arc::new(RetrievalEngine::new()?);
        Ok(Self::assemble(url, &options, engine))
    }

    fn assemble(mut url: Url, options: &Options, engine: Arc<RetrievalEngine>) -> Self {
        url.set_fragment(None);
        clean_path(&mut url);

        let store = options
            .credentials
            .clone()
            .unwrap_or_else(|| Arc::new(EnvCredentials));
        let session = match inline_credentials(&url) {
            Some(creds) => {
                // Userinfo seeds the session and then leaves the identifier,
                // keeping secrets out of logs and child URLs.
                let _ = url.set_username("");
                let _ = url.set_password(None);
                CredentialSession::seeded(store, creds)
            }
            None => CredentialSession::new(store),
        };
        let roots = CacheRoots::assemble(config::shared_cache_root(), &options.cache_roots);

        let mut handle = Self {
            url,
            binary: options.binary,
            cache_enabled: options.cache || options.ofile.is_some(),
            policy: options.credential_policy,
            roots,
            ofile: options.ofile.clone(),
            index_rewrite: false,
            content_type: None,
            read_path: None,
            write_path: None,
            readable: false,
            writable: false,
            children: None,
            session,
            engine,
        };
        handle.resolve_paths();
        handle
    }

    /// Child handle for a link target discovered in this listing.
    ///
    /// Children share the cache roots, credential session, and engine, and
    /// start in binary mode: listing entries default to payload data.
    fn child(&self, target: &str) -> Option<UrlResource> {
        let url = join_target(&self.url, target)?;
        let mut handle = Self {
            url,
            binary: true,
            cache_enabled: self.cache_enabled,
            policy: self.policy,
            roots: self.roots.clone(),
            ofile: None,
            index_rewrite: false,
            content_type: None,
            read_path: None,
            write_path: None,
            readable: false,
            writable: false,
            children: None,
            session: self.session.clone(),
            engine: Arc::clone(&self.engine),
        };
        handle.resolve_paths();
        Some(handle)
    }

    /// Read the resource: from the cache when possible, else by retrieval.
    ///
    /// Fetch failures propagate. Cache-save failures do not; the fetched
    /// content is still returned. Link extraction runs after any
    /// successful read of a listing, cache hits included.
    pub fn read(&mut self) -> Result<Content> {
        self.refresh();

        if let Some(content) = self.read_cached()? {
            self.collect_links(&content);
            return Ok(content);
        }

        debug!(url = %self.url, "retrieving");
        let Fetched { body, content_type } =
            self.engine.fetch(&self.url, self.policy, &mut self.session)?;
        self.apply_classification(content_type);
        let content = Content::materialize(body, self.binary);
        info!(url = %self.url, bytes = content.len(), "retrieved");

        self.save_fetched(&content);
        self.collect_links(&content);
        Ok(content)
    }

    /// Flip to text mode, then read.
    pub fn read_text(&mut self) -> Result<String> {
        self.set_binary(false);
        Ok(self.read()?.into_string())
    }

    /// Flip to binary mode, then read.
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        self.set_binary(true);
        Ok(self.read()?.into_bytes())
    }

    /// Write through to the cache target.
    ///
    /// Returns the bytes written; 0 is a logged no-op, either because no
    /// write target resolved or because the write failed. An explicit
    /// `dest` names the target for this call only and leaves the handle's
    /// resolved paths alone.
    pub fn write(&mut self, data: &[u8], dest: Option<&Path>) -> usize {
        if let Some(dest) = dest {
            return match cache::save(dest, data) {
                Ok(written) => written,
                Err(e) => {
                    warn!(path = ?dest, error = %e, "write failed");
                    0
                }
            };
        }

        self.refresh();
        if self.write_target_is_listing_dir() {
            self.binary = false;
            self.index_rewrite = true;
            self.resolve_paths();
        }

        let Some(path) = self.write_path.clone() else {
            debug!(url = %self.url, "write skipped, no cache target");
            return 0;
        };
        match cache::save(&path, data) {
            Ok(written) => {
                self.refresh_flags();
                written
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "write failed");
                0
            }
        }
    }

    pub fn write_text(&mut self, data: &str) -> usize {
        self.set_binary(false);
        self.write(data.as_bytes(), None)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> usize {
        self.set_binary(true);
        self.write(data, None)
    }

    /// Remove the cached entry. Best-effort and idempotent: missing
    /// entries and removal failures are swallowed.
    pub fn clear(&mut self) {
        if let Some(path) = self.read_path.clone() {
            cache::remove(&path);
        }
        if let Some(path) = self.write_path.clone() {
            if self.read_path.as_ref() != Some(&path) {
                cache::remove(&path);
            }
        }
        self.refresh();
    }

    /// Children discovered in this resource's listing body. Empty until a
    /// listing has been read.
    pub fn links(&self) -> &[UrlResource] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Drop the memoized children and re-extract from a fresh read.
    pub fn refresh_links(&mut self) -> Result<&[UrlResource]> {
        self.children = None;
        self.read()?;
        Ok(self.links())
    }

    /// Flip materialization mode. Cache paths are re-resolved since mode
    /// changes interact with listing handling.
    pub fn set_binary(&mut self, binary: bool) {
        if self.binary != binary {
            self.binary = binary;
            self.resolve_paths();
        }
    }

    /// Force credential re-resolution for this handle's authority.
    pub fn refresh_credentials(&mut self) -> bool {
        let authority = credentials::authority(&self.url);
        self.session.force(&authority).is_some()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn read_path(&self) -> Option<&Path> {
        self.read_path.as_deref()
    }

    pub fn write_path(&self) -> Option<&Path> {
        self.write_path.as_deref()
    }

    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn credential_policy(&self) -> CredentialPolicy {
        self.policy
    }

    /// Declared content type from the last retrieval, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether a cached entry currently exists on disk.
    pub fn exists(&self) -> bool {
        self.read_path.as_ref().is_some_and(|p| p.exists())
    }

    pub fn stat(&self) -> Option<fs::Metadata> {
        self.read_path.as_ref().and_then(|p| fs::metadata(p).ok())
    }

    /// Re-derive cache paths from current state.
    ///
    /// An explicit output file short-circuits root resolution; otherwise
    /// the relative entry path (plus the listing rewrite, when applied) is
    /// partitioned over the roots.
    fn resolve_paths(&mut self) {
        if let Some(ofile) = &self.ofile {
            let target = if self.index_rewrite {
                ofile.join(classify::INDEX_FILE)
            } else {
                ofile.clone()
            };
            self.read_path = Some(target.clone());
            self.write_path = Some(target);
        } else if self.cache_enabled && !self.roots.is_empty() {
            let resolved = cache::resolve(&self.roots, &self.effective_rel());
            if resolved.read.is_none() && resolved.write.is_none() {
                debug!(url = %self.url, "no usable cache root, operating uncached");
            }
            self.read_path = resolved.read;
            self.write_path = resolved.write;
        } else {
            self.read_path = None;
            self.write_path = None;
        }
        self.refresh_flags();
    }

    /// Relative cache entry path: the URL path minus its single leading
    /// slash, with the `index.html` rewrite applied when active.
    fn effective_rel(&self) -> String {
        let rel = rel_path(&self.url);
        if !self.index_rewrite {
            return rel;
        }
        if rel.is_empty() {
            classify::INDEX_FILE.to_string()
        } else {
            format!("{rel}/{}", classify::INDEX_FILE)
        }
    }

    /// Re-derive disk state: discover a listing already cached as
    /// `<dir>/index.html`, then recompute permission flags.
    fn refresh(&mut self) {
        if !self.index_rewrite {
            if let Some(dir) = self.cached_listing_dir() {
                self.binary = false;
                if !classify::has_html_suffix(&dir) {
                    debug!(path = ?dir, "cached listing found, using its index file");
                    self.index_rewrite = true;
                    self.resolve_paths();
                    return;
                }
            }
        }
        self.refresh_flags();
    }

    fn cached_listing_dir(&self) -> Option<PathBuf> {
        [self.read_path.as_ref(), self.write_path.as_ref()]
            .into_iter()
            .flatten()
            .find(|p| p.is_dir() && p.join(classify::INDEX_FILE).is_file())
            .cloned()
    }

    fn refresh_flags(&mut self) {
        self.readable = self.read_path.as_deref().is_some_and(cache::user_readable);
        self.writable = self.write_path.as_deref().is_some_and(cache::user_writable);
    }

    /// Cache hit requires all three: caching on, the read flag, and an
    /// existing regular file. The read path may legitimately point at a
    /// not-yet-written entry.
    fn read_cached(&mut self) -> Result<Option<Content>> {
        if !(self.cache_enabled && self.readable) {
            return Ok(None);
        }
        let Some(path) = self.read_path.clone() else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }

        debug!(path = ?path, "cache hit");
        let body = fs::read(&path)?;
        Ok(Some(Content::materialize(Bytes::from(body), self.binary)))
    }

    /// Fold a declared content type into handle state. Listings force
    /// text mode and move the cache entry to `<path>/index.html`.
    fn apply_classification(&mut self, declared: Option<String>) {
        if let Some(declared) = declared {
            debug!(url = %self.url, content_type = %declared, "declared content type");
            self.content_type = Some(declared);
        }
        let is_listing = self.content_type.as_deref().is_some_and(classify::is_listing);
        if !is_listing {
            return;
        }

        self.binary = false;
        if !self.index_rewrite && !classify::has_html_suffix(&self.cached_name()) {
            self.index_rewrite = true;
            self.resolve_paths();
        }
    }

    /// The name the entry is cached under, for the `.html` suffix guard.
    fn cached_name(&self) -> PathBuf {
        match &self.ofile {
            Some(ofile) => ofile.clone(),
            None => PathBuf::from(rel_path(&self.url)),
        }
    }

    fn write_target_is_listing_dir(&self) -> bool {
        if self.index_rewrite {
            return false;
        }
        self.content_type.as_deref().is_some_and(classify::is_listing)
            && self.write_path.as_ref().is_some_and(|p| p.is_dir())
            && !classify::has_html_suffix(&self.cached_name())
    }

    fn save_fetched(&mut self, content: &Content) {
        if !self.cache_enabled {
            return;
        }
        let Some(path) = self.write_path.clone() else {
            debug!(url = %self.url, "no cache write target");
            return;
        };
        match cache::save(&path, content.as_bytes()) {
            Ok(_) => self.refresh_flags(),
            Err(e) => warn!(path = ?path, error = %e, "cache save failed, continuing uncached"),
        }
    }

    /// Mine a listing body for child handles. Memoized: once extracted,
    /// later reads reuse the same children.
    fn collect_links(&mut self, content: &Content) {
        if self.children.is_some() {
            return;
        }
        let is_listing = self.content_type.as_deref().is_some_and(classify::is_listing);
        let looks_html = content.as_text().is_some_and(classify::looks_like_html);
        if !(is_listing || looks_html) {
            return;
        }
        let Some(body) = content.as_text() else {
            return;
        };

        let mut children = Vec::new();
        for target in links::extract_refs(body) {
            if let Some(child) = self.child(&target) {
                children.push(child);
            }
        }
        info!(url = %self.url, count = children.len(), "links discovered");
        self.children = Some(children);
    }
}

/// Strip trailing slashes from the path, keeping the root path intact.
fn clean_path(url: &mut Url) {
    let path = url.path();
    let trimmed = path.trim_end_matches('/');
    if trimmed.len() != path.len() {
        let replacement = if trimmed.is_empty() { "/" } else { trimmed };
        let replacement = replacement.to_string();
        url.set_path(&replacement);
    }
}

/// Relative cache entry path for a URL: the raw path component with its
/// single leading slash removed.
fn rel_path(url: &Url) -> String {
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    path.trim_end_matches('/').to_string()
}

/// Userinfo from the URL itself, when present.
fn inline_credentials(url: &Url) -> Option<Credentials> {
    if url.username().is_empty() {
        return None;
    }
    Some(Credentials::new(
        url.username(),
        url.password().unwrap_or(""),
    ))
}

/// Child identifier: string-level append and re-parse, so a target with an
/// embedded query keeps its meaning. A leading `/` replaces the parent
/// path, keeping scheme and authority. The parent's query never carries
/// over to children.
fn join_target(parent: &Url, target: &str) -> Option<Url> {
    let raw = if target.starts_with('/') {
        format!("{}{}", credentials::authority(parent), target)
    } else {
        let mut base = parent.clone();
        base.set_query(None);
        format!("{}/{}", base.as_str().trim_end_matches('/'), target)
    };
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!(target, error = %e, "skipping unparseable link target");
            None
        }
    }
}
