//! Cache path resolution over an ordered root list.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Ordered candidate cache roots.
///
/// Order is part of the contract: the shared environment root (if any)
/// first, then caller roots in caller order. Resolution scans in this order
/// every time, so outcomes are deterministic for a given filesystem state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRoots {
    roots: Vec<PathBuf>,
}

impl CacheRoots {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Shared root first, then explicit roots in caller order.
    pub fn assemble(shared: Option<PathBuf>, explicit: &[PathBuf]) -> Self {
        let mut roots = Vec::with_capacity(explicit.len() + 1);
        if let Some(shared) = shared {
            roots.push(shared);
        }
        roots.extend(explicit.iter().cloned());
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots.iter()
    }
}

/// One root's candidate path for a resource, with its permission axes.
///
/// Existence and permission are separate axes: `readable` and `writable`
/// require an existing candidate, while `parent_writable` asks whether the
/// nearest existing ancestor would let the candidate be created.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub readable: bool,
    pub writable: bool,
    pub parent_writable: bool,
}

impl Candidate {
    pub fn evaluate(root: &Path, rel: &str) -> Self {
        let joined = if rel.is_empty() {
            root.to_path_buf()
        } else {
            root.join(rel)
        };
        let path = std::path::absolute(&joined).unwrap_or(joined);
        Self {
            readable: user_readable(&path),
            writable: user_writable(&path),
            parent_writable: nearest_existing_ancestor_writable(&path),
            path,
        }
    }
}

/// Resolved cache paths: at most one read target and one write target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub read: Option<PathBuf>,
    pub write: Option<PathBuf>,
}

/// Partition the candidates for `rel` across the roots.
///
/// The write path is the first writable candidate, else the first candidate
/// whose nearest existing ancestor is writable. The read path is the first
/// readable candidate, else the write path, so a freshly written entry can
/// be re-read through the same handle. The read path may therefore name a
/// file that does not exist yet; cache hits check existence separately.
pub fn resolve(roots: &CacheRoots, rel: &str) -> ResolvedPaths {
    let candidates: Vec<Candidate> = roots
        .iter()
        .map(|root| Candidate::evaluate(root, rel))
        .collect();

    let write = candidates
        .iter()
        .find(|c| c.writable)
        .or_else(|| candidates.iter().find(|c| c.parent_writable))
        .map(|c| c.path.clone());
    let read = candidates
        .iter()
        .find(|c| c.readable)
        .map(|c| c.path.clone())
        .or_else(|| write.clone());

    if write.is_none() && !roots.is_empty() {
        debug!(rel, "no cache root is writable for this resource");
    }

    ResolvedPaths { read, write }
}

/// User-read permission bit on an existing path; false when missing.
#[cfg(unix)]
pub fn user_readable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o400 != 0)
        .unwrap_or(false)
}

/// User-write permission bit on an existing path; false when missing.
#[cfg(unix)]
pub fn user_writable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o200 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn user_readable(path: &Path) -> bool {
    path.exists()
}

#[cfg(not(unix))]
pub fn user_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

fn nearest_existing_ancestor_writable(path: &Path) -> bool {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if ancestor.exists() {
            return user_writable(ancestor);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_writable_root_wins_every_time() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let roots = CacheRoots::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        for _ in 0..3 {
            let resolved = resolve(&roots, "data/file.bin");
            assert_eq!(resolved.write, Some(first.path().join("data/file.bin")));
        }
    }

    #[test]
    fn test_missing_entry_write_via_parent() {
        let root = TempDir::new().unwrap();
        let roots = CacheRoots::new(vec![root.path().to_path_buf()]);

        let resolved = resolve(&roots, "deep/nested/file.bin");
        let expect = root.path().join("deep/nested/file.bin");
        assert_eq!(resolved.write, Some(expect.clone()));
        // Nothing readable exists, so reads fall back to the write target.
        assert_eq!(resolved.read, Some(expect));
    }

    #[test]
    fn test_existing_entry_outranks_earlier_creatable_root() {
        let empty = TempDir::new().unwrap();
        let stocked = TempDir::new().unwrap();
        std::fs::create_dir_all(stocked.path().join("data")).unwrap();
        std::fs::write(stocked.path().join("data/file.bin"), b"cached").unwrap();

        let roots = CacheRoots::new(vec![
            empty.path().to_path_buf(),
            stocked.path().to_path_buf(),
        ]);
        let resolved = resolve(&roots, "data/file.bin");

        // A candidate that is writable outright beats an earlier one that
        // would first have to be created.
        let entry = stocked.path().join("data/file.bin");
        assert_eq!(resolved.read, Some(entry.clone()));
        assert_eq!(resolved.write, Some(entry));
    }

    #[test]
    fn test_empty_rel_targets_root_itself() {
        let root = TempDir::new().unwrap();
        let roots = CacheRoots::new(vec![root.path().to_path_buf()]);

        let resolved = resolve(&roots, "");
        assert_eq!(resolved.write.as_deref(), Some(root.path()));
        assert_eq!(resolved.read.as_deref(), Some(root.path()));
    }

    #[test]
    fn test_no_roots_resolves_nothing() {
        let resolved = resolve(&CacheRoots::default(), "data/file.bin");
        assert_eq!(resolved, ResolvedPaths::default());
    }

    #[test]
    fn test_assemble_puts_shared_root_first() {
        let roots = CacheRoots::assemble(
            Some(PathBuf::from("/shared")),
            &[PathBuf::from("/a"), PathBuf::from("/b")],
        );
        let order: Vec<_> = roots.iter().cloned().collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/shared"),
                PathBuf::from("/a"),
                PathBuf::from("/b")
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_readonly_root_skipped_for_write() {
        use std::os::unix::fs::PermissionsExt;

        let frozen = TempDir::new().unwrap();
        let open = TempDir::new().unwrap();
        fs::set_permissions(frozen.path(), fs::Permissions::from_mode(0o555)).unwrap();

        let roots = CacheRoots::new(vec![
            frozen.path().to_path_buf(),
            open.path().to_path_buf(),
        ]);
        let resolved = resolve(&roots, "file.bin");
        assert_eq!(resolved.write, Some(open.path().join("file.bin")));

        fs::set_permissions(frozen.path(), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_shared_readonly_root_splits_read_and_write() {
        use std::os::unix::fs::PermissionsExt;

        let shared = TempDir::new().unwrap();
        let private = TempDir::new().unwrap();
        fs::create_dir_all(shared.path().join("data")).unwrap();
        fs::write(shared.path().join("data/file.bin"), b"published").unwrap();
        fs::set_permissions(
            shared.path().join("data/file.bin"),
            fs::Permissions::from_mode(0o444),
        )
        .unwrap();
        fs::set_permissions(shared.path().join("data"), fs::Permissions::from_mode(0o555))
            .unwrap();

        let roots = CacheRoots::new(vec![
            shared.path().to_path_buf(),
            private.path().to_path_buf(),
        ]);
        let resolved = resolve(&roots, "data/file.bin");

        // Reads come from the pre-populated root; writes land in the
        // private one behind it.
        assert_eq!(resolved.read, Some(shared.path().join("data/file.bin")));
        assert_eq!(resolved.write, Some(private.path().join("data/file.bin")));

        fs::set_permissions(shared.path().join("data"), fs::Permissions::from_mode(0o755))
            .unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_read_falls_back_to_write() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let entry = root.path().join("file.bin");
        fs::write(&entry, b"sealed").unwrap();
        fs::set_permissions(&entry, fs::Permissions::from_mode(0o200)).unwrap();

        let roots = CacheRoots::new(vec![root.path().to_path_buf()]);
        let resolved = resolve(&roots, "file.bin");

        // Write-only entry: not readable, but writable, and the read side
        // falls back onto the write path.
        assert_eq!(resolved.write, Some(entry.clone()));
        assert_eq!(resolved.read, Some(entry));
    }
}
