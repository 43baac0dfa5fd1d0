//! Multi-root routing by first path segment.

use std::collections::BTreeMap;

use crate::{ByteStream, EntryInfo, FsError, ListDir, ListItem, MkdirOptions, OpenMode, Storage};

/// Where a path lands in a [`MountTable`].
#[derive(Debug)]
pub enum Route<'a, S> {
    /// The synthetic root that lists the mount names.
    Root,
    /// A path inside one mounted store.
    Mounted {
        /// Mount name (first path segment).
        name: &'a str,
        /// The store mounted under `name`.
        store: &'a S,
        /// Remainder of the path, absolute within `store`.
        path: String,
    },
}

/// Mapping from mount name to store.
///
/// Lookup is by exact name only, so insertion order never affects routing.
/// Names never contain `/`.
#[derive(Debug, Clone)]
pub struct MountTable<S> {
    mounts: BTreeMap<String, S>,
}

impl<S> Default for MountTable<S> {
    fn default() -> Self {
        Self {
            mounts: BTreeMap::new(),
        }
    }
}

impl<S> MountTable<S> {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `store` under `name`, returning whatever was mounted there
    /// before.
    ///
    /// Surrounding slashes are stripped from `name`.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if the name is empty or contains `/`
    pub fn insert(&mut self, name: &str, store: S) -> Result<Option<S>, FsError> {
        let trimmed = name.trim_matches('/');
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(FsError::InvalidPath {
                path: name.to_string(),
                reason: "mount names must be a single non-empty segment",
            });
        }
        Ok(self.mounts.insert(trimmed.to_string(), store))
    }

    /// The store mounted under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&S> {
        self.mounts.get(name)
    }

    /// Mount names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.mounts.keys().map(String::as_str)
    }

    /// Number of mounts.
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Returns `true` if nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Route `path` to a mounted store.
    ///
    /// Leading slashes are stripped; an empty remainder addresses the
    /// synthetic root. Otherwise the first segment picks the mount and the
    /// rest (defaulting to `/`) is the path inside it.
    ///
    /// # Errors
    ///
    /// - [`FsError::MountNotFound`] if the first segment names no mount
    pub fn resolve(&self, path: &str) -> Result<Route<'_, S>, FsError> {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Route::Root);
        }
        let (name, rest) = match trimmed.split_once('/') {
            Some((name, rest)) => (name, rest),
            None => (trimmed, ""),
        };
        let Some((name, store)) = self.mounts.get_key_value(name) else {
            return Err(FsError::MountNotFound {
                name: name.to_string(),
            });
        };
        let path = format!("/{rest}");
        tracing::debug!(mount = %name, path = %path, "mount route");
        Ok(Route::Mounted {
            name: name.as_str(),
            store,
            path,
        })
    }

    /// One synthetic directory entry per mount name.
    fn root_listing(&self) -> Vec<Result<ListItem, FsError>> {
        self.names()
            .map(|name| Ok((name.to_string(), Some(EntryInfo::mount_point(name)))))
            .collect()
    }
}

fn root_is_synthetic(operation: &'static str) -> FsError {
    tracing::debug!(operation, "operation on synthetic mount root");
    FsError::InvalidPath {
        path: "/".to_string(),
        reason: "the mount table root only lists mount points",
    }
}

fn root_info() -> EntryInfo {
    EntryInfo::mount_point("/")
}

/// A store that routes each path to one of several named stores.
///
/// `"/a/x.txt"` is `"/x.txt"` inside the store mounted as `a`. Listing `/`
/// yields one mount-point directory per name. Mount the stores before the
/// first traversal; `mount` takes `&mut self` so a shared `Mount` cannot
/// change under its readers.
///
/// To mount heterogeneous stores use `Mount<Arc<dyn Storage>>` or
/// `Mount<Box<dyn Storage>>`.
///
/// # Example
///
/// ```rust
/// use vpath::{MemoryStore, Mount, Storage};
///
/// let mut mount = Mount::new();
/// mount.mount("a", MemoryStore::new()).unwrap();
/// mount.mount("b", MemoryStore::new()).unwrap();
///
/// let names: Vec<String> = mount
///     .list_dir("/")
///     .unwrap()
///     .map(|item| item.unwrap().0)
///     .collect();
/// assert_eq!(names, ["a", "b"]);
/// assert!(mount.exists("/a").unwrap());
/// assert!(!mount.exists("/c/file").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Mount<S> {
    table: MountTable<S>,
}

impl<S> Default for Mount<S> {
    fn default() -> Self {
        Self {
            table: MountTable::new(),
        }
    }
}

impl<S> Mount<S> {
    /// A mount store with nothing mounted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `store` under `name`, replacing any previous mount of that name.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidPath`] if the name is empty or contains `/`
    pub fn mount(&mut self, name: &str, store: S) -> Result<(), FsError> {
        if self.table.insert(name, store)?.is_some() {
            tracing::debug!(mount = name, "replaced existing mount");
        }
        Ok(())
    }

    /// The routing table.
    pub fn table(&self) -> &MountTable<S> {
        &self.table
    }
}

impl<S: Storage> Storage for Mount<S> {
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
        match self.table.resolve(path)? {
            Route::Root => Ok(root_info()),
            Route::Mounted { store, path, .. } => store.get_info(&path),
        }
    }

    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
        match self.table.resolve(path)? {
            Route::Root => Ok(ListDir::from_vec(self.table.root_listing())),
            Route::Mounted { store, path, .. } => store.list_dir(&path),
        }
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
        match self.table.resolve(path)? {
            Route::Root => Err(FsError::NotAFile {
                path: "/".to_string(),
            }),
            Route::Mounted { store, path, .. } => store.open(&path, mode),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        match self.table.resolve(path) {
            Ok(Route::Root) => Ok(true),
            Ok(Route::Mounted { store, path, .. }) => store.exists(&path),
            Err(FsError::MountNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        match self.table.resolve(path)? {
            Route::Root => Err(root_is_synthetic("unlink")),
            Route::Mounted { store, path, .. } => store.unlink(&path),
        }
    }

    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
        match self.table.resolve(path)? {
            Route::Root => Err(root_is_synthetic("mkdir")),
            Route::Mounted { store, path, .. } => store.mkdir(&path, options),
        }
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let from = self.table.resolve(src)?;
        let to = self.table.resolve(dest)?;
        match (from, to) {
            (
                Route::Mounted {
                    name: src_mount,
                    store,
                    path: src_path,
                },
                Route::Mounted {
                    name: dest_mount,
                    path: dest_path,
                    ..
                },
            ) if src_mount == dest_mount => store.rename(&src_path, &dest_path),
            (Route::Mounted { .. }, Route::Mounted { .. }) => Err(FsError::CrossMount {
                src: src.to_string(),
                dest: dest.to_string(),
            }),
            _ => Err(root_is_synthetic("rename")),
        }
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use async_trait::async_trait;
    use futures::StreamExt;

    use super::{Mount, Route, root_info, root_is_synthetic};
    use crate::{
        AsyncByteStream, AsyncStorage, EntryInfo, FsError, ListDirStream, MkdirOptions, OpenMode,
    };

    #[async_trait]
    impl<S: AsyncStorage> AsyncStorage for Mount<S> {
        async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
            match self.table.resolve(path)? {
                Route::Root => Ok(root_info()),
                Route::Mounted { store, path, .. } => store.get_info(&path).await,
            }
        }

        async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
            match self.table.resolve(path)? {
                Route::Root => Ok(futures::stream::iter(self.table.root_listing()).boxed()),
                Route::Mounted { store, path, .. } => store.list_dir(&path).await,
            }
        }

        async fn open(
            &self,
            path: &str,
            mode: OpenMode,
        ) -> Result<Box<dyn AsyncByteStream>, FsError> {
            match self.table.resolve(path)? {
                Route::Root => Err(FsError::NotAFile {
                    path: "/".to_string(),
                }),
                Route::Mounted { store, path, .. } => store.open(&path, mode).await,
            }
        }

        async fn exists(&self, path: &str) -> Result<bool, FsError> {
            match self.table.resolve(path) {
                Ok(Route::Root) => Ok(true),
                Ok(Route::Mounted { store, path, .. }) => store.exists(&path).await,
                Err(FsError::MountNotFound { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }

        async fn unlink(&self, path: &str) -> Result<(), FsError> {
            match self.table.resolve(path)? {
                Route::Root => Err(root_is_synthetic("unlink")),
                Route::Mounted { store, path, .. } => store.unlink(&path).await,
            }
        }

        async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
            match self.table.resolve(path)? {
                Route::Root => Err(root_is_synthetic("mkdir")),
                Route::Mounted { store, path, .. } => store.mkdir(&path, options).await,
            }
        }

        async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
            let from = self.table.resolve(src)?;
            let to = self.table.resolve(dest)?;
            match (from, to) {
                (
                    Route::Mounted {
                        name: src_mount,
                        store,
                        path: src_path,
                    },
                    Route::Mounted {
                        name: dest_mount,
                        path: dest_path,
                        ..
                    },
                ) if src_mount == dest_mount => store.rename(&src_path, &dest_path).await,
                (Route::Mounted { .. }, Route::Mounted { .. }) => Err(FsError::CrossMount {
                    src: src.to_string(),
                    dest: dest.to_string(),
                }),
                _ => Err(root_is_synthetic("rename")),
            }
        }
    }
}
