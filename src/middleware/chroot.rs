//! Sub-tree containment.
//!
//! [`ChrootBoundary`] is the pure resolution rule; [`Chroot`] is the
//! delegating wrapper that applies it to every operation of a wrapped store.

use crate::posix;
use crate::FsError;

use super::wrap::{PathMap, Wrap};

/// A normalized absolute base path that confines every resolved path.
///
/// Resolution joins the requested path under the base, collapses `.` and
/// `..` lexically, and refuses any result that is not the base itself or a
/// descendant of it.
///
/// # Example
///
/// ```rust
/// use vpath::ChrootBoundary;
///
/// let jail = ChrootBoundary::new("jail/");
/// assert_eq!(jail.base(), "/jail");
/// assert_eq!(jail.resolve("/a/../b").unwrap(), "/jail/b");
/// assert!(jail.resolve("../../etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChrootBoundary {
    base: String,
}

impl ChrootBoundary {
    /// Normalize `base` into an absolute boundary.
    pub fn new(base: &str) -> Self {
        Self {
            base: posix::normalize(base),
        }
    }

    /// The normalized base path.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Rewrite `path` into the wrapped store's namespace.
    ///
    /// # Errors
    ///
    /// - [`FsError::OutsideBoundary`] if the normalized result escapes the base
    pub fn resolve(&self, path: &str) -> Result<String, FsError> {
        let joined = format!("{}/{}", self.base, path.trim_start_matches('/'));
        let full = posix::normalize(&joined);
        if !posix::is_within(&full, &self.base) {
            tracing::debug!(path, boundary = %self.base, "chroot escape rejected");
            return Err(FsError::OutsideBoundary {
                path: path.to_string(),
                boundary: self.base.clone(),
            });
        }
        tracing::trace!(path, resolved = %full, "chroot rewrite");
        Ok(full)
    }
}

impl PathMap for ChrootBoundary {
    #[inline]
    fn map_path(&self, path: &str) -> Result<String, FsError> {
        self.resolve(path)
    }
}

/// A store confined to a sub-tree of another store.
///
/// Every operation resolves its path(s) through a [`ChrootBoundary`] first,
/// so an escaping path fails before anything reaches the wrapped store.
///
/// # Example
///
/// ```rust
/// use vpath::{Chroot, MemoryStore, MkdirOptions, Storage};
///
/// let store = MemoryStore::new();
/// let jail = Chroot::rooted(store.clone(), "/jail");
/// jail.mkdir("/inside", MkdirOptions::new().parents(true)).unwrap();
/// assert!(store.exists("/jail/inside").unwrap());
/// assert!(jail.mkdir("/../outside", MkdirOptions::new()).is_err());
/// ```
pub type Chroot<S> = Wrap<S, ChrootBoundary>;

impl<S> Chroot<S> {
    /// Confine `inner` to `base`.
    pub fn rooted(inner: S, base: &str) -> Self {
        Wrap::with_map(inner, ChrootBoundary::new(base))
    }

    /// The boundary every path is resolved against.
    pub fn boundary(&self) -> &ChrootBoundary {
        self.path_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, MkdirOptions, OpenMode, Storage};
    use std::io::Write;

    #[test]
    fn base_is_normalized() {
        assert_eq!(ChrootBoundary::new("").base(), "/");
        assert_eq!(ChrootBoundary::new("a/b/").base(), "/a/b");
        assert_eq!(ChrootBoundary::new("/a/./b/../c").base(), "/a/c");
    }

    #[test]
    fn resolve_stays_inside() {
        let jail = ChrootBoundary::new("/jail");
        assert_eq!(jail.resolve("/").unwrap(), "/jail");
        assert_eq!(jail.resolve("").unwrap(), "/jail");
        assert_eq!(jail.resolve("x/y").unwrap(), "/jail/x/y");
        assert_eq!(jail.resolve("/x/../y").unwrap(), "/jail/y");
    }

    #[test]
    fn resolve_rejects_escapes() {
        let jail = ChrootBoundary::new("/jail");
        for escape in ["..", "../etc", "/../../etc/passwd", "a/../../jailbreak"] {
            let err = jail.resolve(escape).unwrap_err();
            assert!(
                matches!(err, FsError::OutsideBoundary { ref boundary, .. } if boundary == "/jail"),
                "{escape:?} must be rejected"
            );
            assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
        }
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let jail = ChrootBoundary::new("/jail");
        assert!(jail.resolve("../jailbreak/x").is_err());
    }

    #[test]
    fn root_boundary_allows_everything() {
        let all = ChrootBoundary::new("/");
        assert_eq!(all.resolve("/../../etc").unwrap(), "/etc");
    }

    #[test]
    fn escapes_are_never_partially_applied() {
        let store = MemoryStore::new();
        let jail = Chroot::rooted(store.clone(), "/jail");

        assert!(jail.open("../../victim.txt", OpenMode::WRITE).is_err());
        assert!(!store.exists("/victim.txt").unwrap());
        assert!(!store.exists("/jail").unwrap());

        store.mkdir("/keep", MkdirOptions::new()).unwrap();
        let mut stream = jail.open("/a.txt", OpenMode::WRITE).unwrap();
        stream.write_all(b"a").unwrap();
        stream.close().unwrap();

        let err = jail.rename("/a.txt", "../keep/a.txt").unwrap_err();
        assert!(matches!(err, FsError::OutsideBoundary { .. }));
        assert!(store.exists("/jail/a.txt").unwrap());
        assert!(!store.exists("/keep/a.txt").unwrap());
    }

    #[test]
    fn operations_are_rewritten() {
        let store = MemoryStore::new();
        let jail = Chroot::rooted(store.clone(), "/jail");
        jail.mkdir("/d", MkdirOptions::new().parents(true)).unwrap();
        assert!(store.get_info("/jail/d").unwrap().is_dir());
        assert!(jail.exists("/d").unwrap());
        assert_eq!(jail.boundary().base(), "/jail");

        let names: Vec<_> = jail
            .list_dir("/")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(names, vec!["d"]);

        jail.unlink("/d").unwrap();
        assert!(!store.exists("/jail/d").unwrap());
    }
}
