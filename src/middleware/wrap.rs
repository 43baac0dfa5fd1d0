//! Delegating wrapper: the base every path-rewriting middleware is built on.

use crate::{ByteStream, EntryInfo, FsError, ListDir, MkdirOptions, OpenMode, Storage};

/// Rewrites a caller path into the path handed to the wrapped store.
///
/// A `PathMap` may reject a path, in which case the wrapped store is never
/// called.
pub trait PathMap: Send + Sync {
    /// Map `path`, or refuse it.
    fn map_path(&self, path: &str) -> Result<String, FsError>;
}

/// Leaves every path untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PathMap for Identity {
    #[inline]
    fn map_path(&self, path: &str) -> Result<String, FsError> {
        Ok(path.to_string())
    }
}

/// Forwards every operation to one wrapped store after mapping its path(s)
/// through `M`.
///
/// With the default [`Identity`] map this is a pure pass-through. New
/// middleware that only needs to rewrite paths supplies its own
/// [`PathMap`] and inherits correct delegation for every operation.
///
/// # Example
///
/// ```rust
/// use vpath::{MemoryStore, Storage, Wrap};
///
/// let wrapped = Wrap::new(MemoryStore::new());
/// assert!(wrapped.exists("/").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Wrap<S, M = Identity> {
    inner: S,
    map: M,
}

impl<S> Wrap<S> {
    /// Pass-through wrapper around `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            map: Identity,
        }
    }
}

impl<S, M: PathMap> Wrap<S, M> {
    /// Wrapper that rewrites paths with `map`.
    pub fn with_map(inner: S, map: M) -> Self {
        Self { inner, map }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The path map in use.
    pub fn path_map(&self) -> &M {
        &self.map
    }

    /// Unwrap, returning the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Storage, M: PathMap> Storage for Wrap<S, M> {
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
        self.inner.get_info(&self.map.map_path(path)?)
    }

    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
        self.inner.list_dir(&self.map.map_path(path)?)
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
        self.inner.open(&self.map.map_path(path)?, mode)
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        self.inner.exists(&self.map.map_path(path)?)
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        self.inner.unlink(&self.map.map_path(path)?)
    }

    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
        self.inner.mkdir(&self.map.map_path(path)?, options)
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let src = self.map.map_path(src)?;
        let dest = self.map.map_path(dest)?;
        self.inner.rename(&src, &dest)
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use async_trait::async_trait;

    use super::{PathMap, Wrap};
    use crate::{
        AsyncByteStream, AsyncStorage, EntryInfo, FsError, ListDirStream, MkdirOptions, OpenMode,
    };

    #[async_trait]
    impl<S: AsyncStorage, M: PathMap> AsyncStorage for Wrap<S, M> {
        async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
            let path = self.map.map_path(path)?;
            self.inner.get_info(&path).await
        }

        async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
            let path = self.map.map_path(path)?;
            self.inner.list_dir(&path).await
        }

        async fn open(
            &self,
            path: &str,
            mode: OpenMode,
        ) -> Result<Box<dyn AsyncByteStream>, FsError> {
            let path = self.map.map_path(path)?;
            self.inner.open(&path, mode).await
        }

        async fn exists(&self, path: &str) -> Result<bool, FsError> {
            let path = self.map.map_path(path)?;
            self.inner.exists(&path).await
        }

        async fn unlink(&self, path: &str) -> Result<(), FsError> {
            let path = self.map.map_path(path)?;
            self.inner.unlink(&path).await
        }

        async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
            let path = self.map.map_path(path)?;
            self.inner.mkdir(&path, options).await
        }

        async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
            let src = self.map.map_path(src)?;
            let dest = self.map.map_path(dest)?;
            self.inner.rename(&src, &dest).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::io::Write;

    struct Prefix(&'static str);

    impl PathMap for Prefix {
        fn map_path(&self, path: &str) -> Result<String, FsError> {
            Ok(format!("{}{}", self.0, crate::posix::normalize(path)))
        }
    }

    #[test]
    fn identity_forwards_verbatim() {
        let store = MemoryStore::new();
        let wrapped = Wrap::new(store.clone());
        wrapped.mkdir("/d", MkdirOptions::new()).unwrap();
        assert!(store.exists("/d").unwrap());
        assert_eq!(wrapped.get_info("/d").unwrap(), store.get_info("/d").unwrap());
        wrapped.rename("/d", "/e").unwrap();
        assert!(store.exists("/e").unwrap());
        wrapped.unlink("/e").unwrap();
        assert!(!store.exists("/e").unwrap());
    }

    #[test]
    fn custom_map_rewrites_every_operation() {
        let store = MemoryStore::new();
        let wrapped = Wrap::with_map(store.clone(), Prefix("/base"));
        let mut stream = wrapped.open("/f.txt", OpenMode::WRITE).unwrap();
        stream.write_all(b"x").unwrap();
        stream.close().unwrap();

        assert!(store.exists("/base/f.txt").unwrap());
        let names: Vec<_> = wrapped
            .list_dir("/")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(names, vec!["f.txt"]);
        assert_eq!(wrapped.into_inner().get_info("/base").unwrap().name, "base");
    }

    #[test]
    fn rejected_paths_never_reach_the_store() {
        struct Deny;
        impl PathMap for Deny {
            fn map_path(&self, path: &str) -> Result<String, FsError> {
                Err(FsError::PermissionDenied {
                    path: path.to_string(),
                    operation: "map",
                })
            }
        }

        let store = MemoryStore::new();
        let wrapped = Wrap::with_map(store.clone(), Deny);
        assert!(wrapped.mkdir("/d", MkdirOptions::new()).is_err());
        assert!(!store.exists("/d").unwrap());
    }
}
