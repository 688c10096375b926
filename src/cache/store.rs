//! Cache entry I/O.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Write a cache entry atomically.
///
/// Content lands in a temporary sibling which is renamed over the final
/// path, so a reader never observes a partial entry. Missing parent
/// directories are created. Returns the number of bytes written.
pub fn save(path: &Path, data: &[u8]) -> io::Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    if let Err(e) = fs::write(&temp_path, data) {
        warn!(path = ?temp_path, error = %e, "failed to write cache entry");
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        warn!(from = ?temp_path, to = ?path, error = %e, "failed to move cache entry into place");
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    debug!(path = ?path, bytes = data.len(), "saved cache entry");
    Ok(data.len())
}

/// Remove a cache entry if present.
///
/// Missing files and removal errors are swallowed; clearing is best-effort
/// by contract.
pub fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = ?path, "removed cache entry"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = ?path, error = %e, "failed to remove cache entry"),
    }
}
