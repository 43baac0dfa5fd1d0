//! In-process store backed by a shared map.
//!
//! Every entry lives in one ordered map keyed by its normalized absolute
//! path, so a directory's children are a contiguous key range. Clones of a
//! [`MemoryStore`] share the same tree.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::posix;
use crate::{
    ByteStream, EntryInfo, FsError, ListDir, ListItem, MkdirOptions, OpenMode, Storage,
    unix_mtime,
};

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, mtime: f64 },
    Dir { mtime: f64 },
}

impl Entry {
    fn info(&self, path: &str) -> EntryInfo {
        let name = match posix::file_name(path) {
            "" => "/",
            name => name,
        };
        match self {
            Entry::File { data, mtime } => EntryInfo::file(name, data.len() as u64, *mtime),
            Entry::Dir { mtime } => EntryInfo::dir(name, *mtime),
        }
    }
}

type Tree = BTreeMap<String, Entry>;

fn now() -> f64 {
    unix_mtime(SystemTime::now())
}

/// Prefix shared by every descendant of `dir`.
fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}

/// Store that keeps everything in memory.
///
/// The root directory always exists. Write streams buffer their content and
/// publish it on [`flush`](Write::flush), [`close`](ByteStream::close) or drop.
///
/// # Example
///
/// ```rust
/// use vpath::{MemoryStore, MkdirOptions, Storage};
///
/// let store = MemoryStore::new();
/// store.mkdir("/a/b", MkdirOptions::new().parents(true)).unwrap();
/// assert!(store.exists("/a").unwrap());
/// assert!(store.get_info("/a/b").unwrap().is_dir());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: Arc<RwLock<Tree>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store containing only the root directory.
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert("/".to_string(), Entry::Dir { mtime: now() });
        Self {
            tree: Arc::new(RwLock::new(tree)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tree>, FsError> {
        self.tree
            .read()
            .map_err(|_| FsError::Backend("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tree>, FsError> {
        self.tree
            .write()
            .map_err(|_| FsError::Backend("memory store lock poisoned".into()))
    }

    /// Create every missing ancestor of `path` as a directory.
    fn ensure_parents(tree: &mut Tree, path: &str) -> Result<(), FsError> {
        let mut missing = Vec::new();
        let mut cursor = posix::parent(path);
        while let Some(dir) = cursor {
            match tree.get(dir) {
                Some(Entry::Dir { .. }) => break,
                Some(Entry::File { .. }) => {
                    return Err(FsError::NotADirectory {
                        path: dir.to_string(),
                    });
                }
                None => missing.push(dir.to_string()),
            }
            cursor = posix::parent(dir);
        }
        let mtime = now();
        for dir in missing.into_iter().rev() {
            tree.insert(dir, Entry::Dir { mtime });
        }
        Ok(())
    }

    fn require_parent_dir(tree: &Tree, path: &str) -> Result<(), FsError> {
        let Some(parent) = posix::parent(path) else {
            return Ok(());
        };
        match tree.get(parent) {
            Some(Entry::Dir { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(FsError::NotADirectory {
                path: parent.to_string(),
            }),
            None => Err(FsError::NotFound {
                path: parent.to_string(),
            }),
        }
    }

    fn subtree_keys(tree: &Tree, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        let mut keys = vec![path.to_string()];
        keys.extend(
            tree.range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .filter(|(key, _)| key.as_str() != path)
                .map(|(key, _)| key.clone()),
        );
        keys
    }

    fn children(&self, path: &str) -> Result<Vec<Result<ListItem, FsError>>, FsError> {
        let path = posix::normalize(path);
        let tree = self.read()?;
        match tree.get(&path) {
            Some(Entry::Dir { .. }) => {}
            Some(Entry::File { .. }) => return Err(FsError::NotADirectory { path }),
            None => return Err(FsError::NotFound { path }),
        }
        let prefix = child_prefix(&path);
        let items = tree
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| {
                let rest = &key[prefix.len()..];
                !rest.is_empty() && !rest.contains('/')
            })
            .map(|(key, entry)| {
                let name = key[prefix.len()..].to_string();
                Ok((name, Some(entry.info(key))))
            })
            .collect();
        Ok(items)
    }

    pub(crate) fn open_file(&self, path: &str, mode: OpenMode) -> Result<MemFile, FsError> {
        let path = posix::normalize(path);

        if !mode.is_write_like() {
            let tree = self.read()?;
            return match tree.get(&path) {
                Some(Entry::File { data, .. }) => Ok(MemFile::reader(data.clone())),
                Some(Entry::Dir { .. }) => Err(FsError::NotAFile { path }),
                None => Err(FsError::NotFound { path }),
            };
        }

        let mut tree = self.write()?;
        let existing = match tree.get(&path) {
            Some(Entry::Dir { .. }) => return Err(FsError::NotAFile { path }),
            Some(Entry::File { .. }) if mode.exclusive => {
                return Err(FsError::AlreadyExists {
                    path,
                    operation: "open",
                });
            }
            Some(Entry::File { data, .. }) => Some(data.clone()),
            None if !mode.create => return Err(FsError::NotFound { path }),
            None => None,
        };

        Self::ensure_parents(&mut tree, &path)?;
        let data = match existing {
            Some(data) if !mode.truncate => data,
            _ => Vec::new(),
        };
        tree.insert(
            path.clone(),
            Entry::File {
                data: data.clone(),
                mtime: now(),
            },
        );
        drop(tree);

        let mut file = MemFile::writer(data, mode, self.tree.clone(), path);
        if mode.append {
            file.cursor.seek(SeekFrom::End(0))?;
        }
        Ok(file)
    }
}

impl Storage for MemoryStore {
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
        let path = posix::normalize(path);
        let tree = self.read()?;
        match tree.get(&path) {
            Some(entry) => Ok(entry.info(&path)),
            None => Err(FsError::NotFound { path }),
        }
    }

    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
        Ok(ListDir::from_vec(self.children(path)?))
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
        Ok(Box::new(self.open_file(path, mode)?))
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        Ok(self.read()?.contains_key(&posix::normalize(path)))
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        let path = posix::normalize(path);
        if path == "/" {
            return Err(FsError::InvalidPath {
                path,
                reason: "cannot remove the root directory",
            });
        }
        let mut tree = self.write()?;
        if !tree.contains_key(&path) {
            return Err(FsError::NotFound { path });
        }
        for key in Self::subtree_keys(&tree, &path) {
            tree.remove(&key);
        }
        Ok(())
    }

    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
        let path = posix::normalize(path);
        let mut tree = self.write()?;
        match tree.get(&path) {
            Some(Entry::Dir { .. }) if options.exist_ok => return Ok(()),
            Some(_) => {
                return Err(FsError::AlreadyExists {
                    path,
                    operation: "mkdir",
                });
            }
            None => {}
        }
        if options.parents {
            Self::ensure_parents(&mut tree, &path)?;
        } else {
            Self::require_parent_dir(&tree, &path)?;
        }
        tree.insert(path, Entry::Dir { mtime: now() });
        Ok(())
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        let src = posix::normalize(src);
        let dest = posix::normalize(dest);
        if src == dest {
            return Ok(());
        }
        if src == "/" || posix::is_within(&dest, &src) {
            return Err(FsError::InvalidPath {
                path: dest,
                reason: "cannot move a directory into itself",
            });
        }

        let mut tree = self.write()?;
        let src_is_dir = match tree.get(&src) {
            Some(entry) => matches!(entry, Entry::Dir { .. }),
            None => return Err(FsError::NotFound { path: src }),
        };
        match tree.get(&dest) {
            Some(Entry::Dir { .. }) => {
                return Err(FsError::AlreadyExists {
                    path: dest,
                    operation: "rename",
                });
            }
            Some(Entry::File { .. }) if src_is_dir => {
                return Err(FsError::NotADirectory { path: dest });
            }
            _ => {}
        }
        Self::require_parent_dir(&tree, &dest)?;

        for key in Self::subtree_keys(&tree, &src) {
            if let Some(entry) = tree.remove(&key) {
                let moved = format!("{dest}{}", &key[src.len()..]);
                tree.insert(moved, entry);
            }
        }
        Ok(())
    }
}

/// Byte stream over a memory entry.
///
/// Streams opened for writing hold a private copy of the content and
/// publish it back to the store whenever they are flushed.
#[derive(Debug)]
pub struct MemFile {
    cursor: Cursor<Vec<u8>>,
    readable: bool,
    writable: bool,
    append: bool,
    dirty: bool,
    target: Option<(Arc<RwLock<Tree>>, String)>,
}

impl MemFile {
    fn reader(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
            readable: true,
            writable: false,
            append: false,
            dirty: false,
            target: None,
        }
    }

    fn writer(data: Vec<u8>, mode: OpenMode, tree: Arc<RwLock<Tree>>, path: String) -> Self {
        Self {
            cursor: Cursor::new(data),
            readable: mode.read,
            writable: true,
            append: mode.append,
            dirty: false,
            target: Some((tree, path)),
        }
    }

    fn check_readable(&self) -> io::Result<()> {
        if self.readable {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream not opened for reading",
            ))
        }
    }

    fn check_writable(&mut self) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream not opened for writing",
            ));
        }
        if self.append {
            self.cursor.seek(SeekFrom::End(0))?;
        }
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some((tree, path)) = &self.target else {
            return Ok(());
        };
        let mut tree = tree
            .write()
            .map_err(|_| io::Error::other("memory store lock poisoned"))?;
        // The entry or its parents may have been removed while the stream was open.
        if let Some(Entry::Dir { .. }) = tree.get(path) {
            return Err(io::Error::other(FsError::NotAFile { path: path.clone() }));
        }
        MemoryStore::ensure_parents(&mut tree, path).map_err(io::Error::other)?;
        tree.insert(
            path.clone(),
            Entry::File {
                data: self.cursor.get_ref().clone(),
                mtime: now(),
            },
        );
        self.dirty = false;
        Ok(())
    }

    fn resize(&mut self, size: Option<u64>) -> io::Result<u64> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream not opened for writing",
            ));
        }
        self.dirty = true;
        ByteStream::truncate(&mut self.cursor, size)
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_readable()?;
        self.cursor.read(buf)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_writable()?;
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl ByteStream for MemFile {
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        self.resize(size)
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        if let Err(error) = self.commit() {
            tracing::warn!(%error, "memory stream dropped without committing");
        }
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

    use super::{MemFile, MemoryStore};
    use crate::{
        AsyncByteStream, AsyncStorage, EntryInfo, FsError, ListDirStream, MkdirOptions, OpenMode,
        Storage,
    };

    impl AsyncRead for MemFile {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            this.check_readable()?;
            Pin::new(&mut this.cursor).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for MemFile {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.check_writable()?;
            Pin::new(&mut this.cursor).poll_write(cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(self.get_mut().commit())
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(self.get_mut().commit())
        }
    }

    impl AsyncSeek for MemFile {
        fn start_seek(self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
            Pin::new(&mut self.get_mut().cursor).start_seek(position)
        }

        fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Pin::new(&mut self.get_mut().cursor).poll_complete(cx)
        }
    }

    #[async_trait]
    impl AsyncByteStream for MemFile {
        async fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
            self.resize(size)
        }
    }

    // Memory operations never block, so the async face reuses the blocking one.
    #[async_trait]
    impl AsyncStorage for MemoryStore {
        async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
            Storage::get_info(self, path)
        }

        async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
            Ok(futures::stream::iter(self.children(path)?).boxed())
        }

        async fn open(
            &self,
            path: &str,
            mode: OpenMode,
        ) -> Result<Box<dyn AsyncByteStream>, FsError> {
            Ok(Box::new(self.open_file(path, mode)?))
        }

        async fn exists(&self, path: &str) -> Result<bool, FsError> {
            Storage::exists(self, path)
        }

        async fn unlink(&self, path: &str) -> Result<(), FsError> {
            Storage::unlink(self, path)
        }

        async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
            Storage::mkdir(self, path, options)
        }

        async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
            Storage::rename(self, src, dest)
        }
    }
}
