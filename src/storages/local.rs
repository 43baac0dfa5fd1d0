//! Store rooted at a directory on the host filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use crate::posix;
use crate::{
    ByteStream, EntryInfo, FsError, ListDir, MkdirOptions, OpenMode, Storage, unix_mtime,
};

/// Store that maps store paths onto a host directory.
///
/// Paths are normalized lexically before they are joined to the root, so
/// `..` can never climb above it. Symlinks inside the root are followed by
/// the host as usual.
///
/// # Example
///
/// ```rust
/// use vpath::{LocalStore, Storage};
///
/// let dir = std::env::temp_dir();
/// let store = LocalStore::new(&dir);
/// assert!(store.exists("/").unwrap());
/// assert_eq!(store.host_path("/../a/b"), dir.join("a/b"));
/// ```
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The host directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path a store path resolves to.
    pub fn host_path(&self, path: &str) -> PathBuf {
        let normalized = posix::normalize(path);
        let relative = normalized.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn open_options(mode: OpenMode) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        options
            .read(mode.read)
            .write(mode.write && !mode.append)
            .append(mode.append)
            .truncate(mode.truncate)
            .create(mode.create && !mode.exclusive)
            .create_new(mode.exclusive);
        options
    }

    #[cfg(unix)]
    fn dir_builder(options: MkdirOptions) -> fs::DirBuilder {
        use std::os::unix::fs::DirBuilderExt;

        let mut builder = fs::DirBuilder::new();
        builder.recursive(options.parents).mode(options.mode);
        builder
    }

    #[cfg(not(unix))]
    fn dir_builder(options: MkdirOptions) -> fs::DirBuilder {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(options.parents);
        builder
    }
}

fn entry_name(path: &str) -> &str {
    match posix::file_name(path) {
        "" => "/",
        name => name,
    }
}

fn info_from(name: &str, metadata: &fs::Metadata) -> EntryInfo {
    let mtime = metadata.modified().map(unix_mtime).unwrap_or(0.0);
    if metadata.is_dir() {
        EntryInfo::dir(name, mtime)
    } else {
        EntryInfo::file(name, metadata.len(), mtime)
    }
}

fn decode_name(name: std::ffi::OsString, dir: &str) -> Result<String, FsError> {
    name.into_string().map_err(|raw| FsError::InvalidPath {
        path: format!("{dir}/{}", raw.to_string_lossy()),
        reason: "entry name is not valid UTF-8",
    })
}

impl Storage for LocalStore {
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
        let normalized = posix::normalize(path);
        let metadata = fs::metadata(self.host_path(&normalized))
            .map_err(|e| FsError::io("get_info", normalized.as_str(), e))?;
        Ok(info_from(entry_name(&normalized), &metadata))
    }

    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
        let normalized = posix::normalize(path);
        let host = self.host_path(&normalized);
        if host.is_file() {
            return Err(FsError::NotADirectory { path: normalized });
        }
        let entries =
            fs::read_dir(&host).map_err(|e| FsError::io("list_dir", normalized.as_str(), e))?;
        Ok(ListDir::new(entries.map(move |entry| {
            let entry = entry.map_err(|e| FsError::io("list_dir", normalized.as_str(), e))?;
            let name = decode_name(entry.file_name(), &normalized)?;
            let metadata = entry
                .metadata()
                .map_err(|e| FsError::io("list_dir", posix::join(&normalized, &name), e))?;
            let info = info_from(&name, &metadata);
            Ok((name, Some(info)))
        })))
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
        let normalized = posix::normalize(path);
        let host = self.host_path(&normalized);
        if host.is_dir() {
            return Err(FsError::NotAFile { path: normalized });
        }
        if mode.create {
            if let Some(parent) = host.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| FsError::io("open", normalized.as_str(), e))?;
            }
        }
        let file = Self::open_options(mode)
            .open(&host)
            .map_err(|e| FsError::io("open", normalized.as_str(), e))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        let normalized = posix::normalize(path);
        self.host_path(&normalized)
            .try_exists()
            .map_err(|e| FsError::io("exists", normalized, e))
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        let normalized = posix::normalize(path);
        if normalized == "/" {
            return Err(FsError::InvalidPath {
                path: normalized,
                reason: "cannot remove the store root",
            });
        }
        let host = self.host_path(&normalized);
        let metadata = fs::symlink_metadata(&host)
            .map_err(|e| FsError::io("unlink", normalized.as_str(), e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&host)
        } else {
            fs::remove_file(&host)
        };
        result.map_err(|e| FsError::io("unlink", normalized, e))
    }

    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
        let normalized = posix::normalize(path);
        let host = self.host_path(&normalized);
        if let Ok(metadata) = fs::metadata(&host) {
            if metadata.is_dir() && options.exist_ok {
                return Ok(());
            }
            return Err(FsError::AlreadyExists {
                path: normalized,
                operation: "mkdir",
            });
        }
        Self::dir_builder(options)
            .create(&host)
            .map_err(|e| FsError::io("mkdir", normalized, e))
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let src = posix::normalize(src);
        let dest = posix::normalize(dest);
        fs::rename(self.host_path(&src), self.host_path(&dest))
            .map_err(|e| FsError::io("rename", src, e))
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::fs;

    use super::{LocalStore, decode_name, entry_name, info_from};
    use crate::posix;
    use crate::{
        AsyncByteStream, AsyncStorage, EntryInfo, FsError, ListDirStream, MkdirOptions, OpenMode,
    };

    impl LocalStore {
        #[cfg(unix)]
        fn async_dir_builder(options: MkdirOptions) -> fs::DirBuilder {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(options.parents).mode(options.mode);
            builder
        }

        #[cfg(not(unix))]
        fn async_dir_builder(options: MkdirOptions) -> fs::DirBuilder {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(options.parents);
            builder
        }
    }

    #[async_trait]
    impl AsyncStorage for LocalStore {
        async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
            let normalized = posix::normalize(path);
            let metadata = fs::metadata(self.host_path(&normalized))
                .await
                .map_err(|e| FsError::io("get_info", normalized.as_str(), e))?;
            Ok(info_from(entry_name(&normalized), &metadata))
        }

        async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
            let normalized = posix::normalize(path);
            let host = self.host_path(&normalized);
            if fs::metadata(&host).await.is_ok_and(|m| m.is_file()) {
                return Err(FsError::NotADirectory { path: normalized });
            }
            let entries = fs::read_dir(&host)
                .await
                .map_err(|e| FsError::io("list_dir", normalized.as_str(), e))?;

            // The listing ends after the first error from the host iterator.
            let stream = futures::stream::unfold(Some(entries), move |state| {
                let dir = normalized.clone();
                async move {
                    let mut entries = state?;
                    match entries.next_entry().await {
                        Ok(Some(entry)) => {
                            let item = async {
                                let name = decode_name(entry.file_name(), &dir)?;
                                let metadata = entry.metadata().await.map_err(|e| {
                                    FsError::io("list_dir", posix::join(&dir, &name), e)
                                })?;
                                let info = info_from(&name, &metadata);
                                Ok::<_, FsError>((name, Some(info)))
                            }
                            .await;
                            Some((item, Some(entries)))
                        }
                        Ok(None) => None,
                        Err(e) => Some((Err(FsError::io("list_dir", dir, e)), None)),
                    }
                }
            });
            Ok(stream.boxed())
        }

        async fn open(
            &self,
            path: &str,
            mode: OpenMode,
        ) -> Result<Box<dyn AsyncByteStream>, FsError> {
            let normalized = posix::normalize(path);
            let host = self.host_path(&normalized);
            if fs::metadata(&host).await.is_ok_and(|m| m.is_dir()) {
                return Err(FsError::NotAFile { path: normalized });
            }
            if mode.create {
                if let Some(parent) = host.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| FsError::io("open", normalized.as_str(), e))?;
                }
            }
            let file = fs::OpenOptions::from(Self::open_options(mode))
                .open(&host)
                .await
                .map_err(|e| FsError::io("open", normalized.as_str(), e))?;
            Ok(Box::new(file))
        }

        async fn exists(&self, path: &str) -> Result<bool, FsError> {
            let normalized = posix::normalize(path);
            fs::try_exists(self.host_path(&normalized))
                .await
                .map_err(|e| FsError::io("exists", normalized, e))
        }

        async fn unlink(&self, path: &str) -> Result<(), FsError> {
            let normalized = posix::normalize(path);
            if normalized == "/" {
                return Err(FsError::InvalidPath {
                    path: normalized,
                    reason: "cannot remove the store root",
                });
            }
            let host = self.host_path(&normalized);
            let metadata = fs::symlink_metadata(&host)
                .await
                .map_err(|e| FsError::io("unlink", normalized.as_str(), e))?;
            let result = if metadata.is_dir() {
                fs::remove_dir_all(&host).await
            } else {
                fs::remove_file(&host).await
            };
            result.map_err(|e| FsError::io("unlink", normalized, e))
        }

        async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
            let normalized = posix::normalize(path);
            let host = self.host_path(&normalized);
            if let Ok(metadata) = fs::metadata(&host).await {
                if metadata.is_dir() && options.exist_ok {
                    return Ok(());
                }
                return Err(FsError::AlreadyExists {
                    path: normalized,
                    operation: "mkdir",
                });
            }
            Self::async_dir_builder(options)
                .create(&host)
                .await
                .map_err(|e| FsError::io("mkdir", normalized, e))
        }

        async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
            let src = posix::normalize(src);
            let dest = posix::normalize(dest);
            fs::rename(self.host_path(&src), self.host_path(&dest))
                .await
                .map_err(|e| FsError::io("rename", src, e))
        }
    }
}
