//! The suspending path handle.

use std::fmt;
use std::ops::Div;
use std::sync::{Arc, OnceLock};

use futures::stream::{BoxStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{
    AsyncByteStream, AsyncStorage, AsyncTextIo, Chroot, EntryInfo, FsError, MkdirOptions,
    OpenMode, TextOptions, posix,
};

/// A posix-style path bound to one [`AsyncStorage`].
///
/// The suspending twin of [`VPath`](crate::VPath): same path arithmetic,
/// same caching, with every store call awaited.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vpath::{AsyncVPath, MemoryStore, MkdirOptions};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let root = AsyncVPath::new(Arc::new(MemoryStore::new()), "/");
/// let log = &root / "var" / "log.txt";
/// log.write_text("booted\n").await?;
/// assert!((&root / "var").is_dir().await?);
/// assert_eq!(log.read_text().await?, "booted\n");
/// # Ok::<(), vpath::FsError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct AsyncVPath {
    path: String,
    storage: Option<Arc<dyn AsyncStorage>>,
    info: OnceLock<EntryInfo>,
}

/// What [`AsyncVPath::open`] returns: a text session unless the mode has `b`.
pub enum AsyncOpened {
    /// Decoded text session.
    Text(AsyncTextIo),
    /// Raw byte stream.
    Binary(Box<dyn AsyncByteStream>),
}

impl AsyncOpened {
    /// The text session, if the mode was textual.
    pub fn into_text(self) -> Option<AsyncTextIo> {
        match self {
            AsyncOpened::Text(io) => Some(io),
            AsyncOpened::Binary(_) => None,
        }
    }

    /// The byte stream, if the mode was binary.
    pub fn into_binary(self) -> Option<Box<dyn AsyncByteStream>> {
        match self {
            AsyncOpened::Text(_) => None,
            AsyncOpened::Binary(stream) => Some(stream),
        }
    }
}

impl fmt::Debug for AsyncOpened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncOpened::Text(io) => f.debug_tuple("Text").field(io).finish(),
            AsyncOpened::Binary(_) => f.debug_tuple("Binary").finish_non_exhaustive(),
        }
    }
}

impl AsyncVPath {
    /// Bind `path` to `storage`.
    pub fn new(storage: Arc<dyn AsyncStorage>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            storage: Some(storage),
            info: OnceLock::new(),
        }
    }

    /// A path with no store.
    pub fn detached(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            storage: None,
            info: OnceLock::new(),
        }
    }

    /// The same path bound to another store, with an empty stat cache.
    pub fn with_storage(&self, storage: Arc<dyn AsyncStorage>) -> Self {
        Self::new(storage, self.path.clone())
    }

    /// The bound store, or [`FsError::Detached`].
    pub fn storage(&self) -> Result<&Arc<dyn AsyncStorage>, FsError> {
        self.storage.as_ref().ok_or_else(|| FsError::Detached {
            path: self.path.clone(),
        })
    }

    /// Returns `true` if the handle has no store.
    pub fn is_detached(&self) -> bool {
        self.storage.is_none()
    }

    /// The path as given, `/`-separated.
    pub fn as_posix(&self) -> &str {
        &self.path
    }

    /// Final component, or `""` for a root.
    pub fn name(&self) -> &str {
        posix::file_name(&self.path)
    }

    /// The containing path on the same store, if there is one.
    pub fn parent(&self) -> Option<AsyncVPath> {
        posix::parent(&self.path).map(|parent| self.child_handle(parent.to_string()))
    }

    /// Append `child`; an absolute `child` replaces the path.
    pub fn join(&self, child: &str) -> AsyncVPath {
        self.child_handle(posix::join(&self.path, child))
    }

    fn child_handle(&self, path: String) -> AsyncVPath {
        Self {
            path,
            storage: self.storage.clone(),
            info: OnceLock::new(),
        }
    }

    /// Metadata, fetched once and cached on this handle.
    pub async fn stat(&self) -> Result<&EntryInfo, FsError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let info = self.storage()?.get_info(&self.path).await?;
        Ok(self.info.get_or_init(|| info))
    }

    /// Whether the path exists. Missing is `Ok(false)`, not an error.
    pub async fn exists(&self) -> Result<bool, FsError> {
        self.storage()?.exists(&self.path).await
    }

    /// Whether the path is a regular file. Missing is `Ok(false)`; other
    /// failures are returned.
    pub async fn is_file(&self) -> Result<bool, FsError> {
        self.kind_is(EntryInfo::is_file).await
    }

    /// Whether the path is a directory. Missing is `Ok(false)`.
    pub async fn is_dir(&self) -> Result<bool, FsError> {
        self.kind_is(EntryInfo::is_dir).await
    }

    async fn kind_is(&self, check: fn(&EntryInfo) -> bool) -> Result<bool, FsError> {
        match self.stat().await {
            Ok(info) => Ok(check(info)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Stream the children, each pre-seeded with the listing's metadata.
    pub async fn iterdir(&self) -> Result<BoxStream<'_, Result<AsyncVPath, FsError>>, FsError> {
        let listing = self.storage()?.list_dir(&self.path).await?;
        Ok(listing
            .map(move |item| {
                let (name, info) = item?;
                let child = self.join(&name);
                if let Some(info) = info {
                    let _ = child.info.set(info);
                }
                Ok(child)
            })
            .boxed())
    }

    /// Open with a mode string and default [`TextOptions`].
    pub async fn open(&self, mode: &str) -> Result<AsyncOpened, FsError> {
        self.open_with(mode, &TextOptions::default()).await
    }

    /// Open with explicit text options; they are ignored for binary modes.
    pub async fn open_with(
        &self,
        mode: &str,
        options: &TextOptions,
    ) -> Result<AsyncOpened, FsError> {
        let mode = OpenMode::parse(mode)?;
        if mode.is_text() {
            Ok(AsyncOpened::Text(self.text_session(mode, options).await?))
        } else {
            Ok(AsyncOpened::Binary(
                self.storage()?.open(&self.path, mode).await?,
            ))
        }
    }

    async fn text_session(
        &self,
        mode: OpenMode,
        options: &TextOptions,
    ) -> Result<AsyncTextIo, FsError> {
        let stream = self.storage()?.open(&self.path, mode).await?;
        Ok(AsyncTextIo::new(stream, mode, options).with_path(self.path.as_str()))
    }

    /// Read the whole file as UTF-8 text.
    pub async fn read_text(&self) -> Result<String, FsError> {
        self.read_text_with(&TextOptions::default()).await
    }

    /// Read the whole file with explicit text options.
    pub async fn read_text_with(&self, options: &TextOptions) -> Result<String, FsError> {
        let mut io = self.text_session(OpenMode::READ, options).await?;
        let text = io.read_to_string().await;
        let closed = io.close().await;
        let text = text?;
        closed?;
        Ok(text)
    }

    /// Replace the file's contents with `text` as UTF-8.
    pub async fn write_text(&self, text: &str) -> Result<usize, FsError> {
        self.write_text_with(text, &TextOptions::default()).await
    }

    /// Replace the file's contents with `text` using explicit text options.
    pub async fn write_text_with(
        &self,
        text: &str,
        options: &TextOptions,
    ) -> Result<usize, FsError> {
        let mut io = self.text_session(OpenMode::WRITE, options).await?;
        let written = io.write(text).await;
        let closed = io.close().await;
        let written = written?;
        closed?;
        Ok(written)
    }

    /// Read the whole file as bytes.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, FsError> {
        let mut stream = self
            .storage()?
            .open(&self.path, OpenMode::READ.binary())
            .await?;
        let mut data = Vec::new();
        let read = stream
            .read_to_end(&mut data)
            .await
            .map_err(|e| FsError::io("read", self.path.as_str(), e));
        let closed = stream
            .close()
            .await
            .map_err(|e| FsError::io("close", self.path.as_str(), e));
        read?;
        closed?;
        Ok(data)
    }

    /// Replace the file's contents with `data`.
    pub async fn write_bytes(&self, data: &[u8]) -> Result<(), FsError> {
        let mut stream = self
            .storage()?
            .open(&self.path, OpenMode::WRITE.binary())
            .await?;
        let written = stream
            .write_all(data)
            .await
            .map_err(|e| FsError::io("write", self.path.as_str(), e));
        let closed = stream
            .close()
            .await
            .map_err(|e| FsError::io("close", self.path.as_str(), e));
        written?;
        closed
    }

    /// A root handle on a new [`Chroot`] store confined to this path.
    pub fn chroot(&self) -> Result<AsyncVPath, FsError> {
        let inner = Arc::clone(self.storage()?);
        let jail: Arc<dyn AsyncStorage> = Arc::new(Chroot::rooted(inner, &self.path));
        Ok(AsyncVPath::new(jail, "/"))
    }

    /// Remove the file or directory (recursively).
    pub async fn unlink(&self) -> Result<(), FsError> {
        self.storage()?.unlink(&self.path).await
    }

    /// Create this directory.
    pub async fn mkdir(&self, options: MkdirOptions) -> Result<(), FsError> {
        self.storage()?.mkdir(&self.path, options).await
    }

    /// Move to `target` on the same store; a relative `target` is taken
    /// relative to the parent.
    pub async fn rename(&self, target: &str) -> Result<AsyncVPath, FsError> {
        let dest = match posix::parent(&self.path) {
            Some(parent) if !target.starts_with('/') => posix::join(parent, target),
            _ => target.to_string(),
        };
        self.storage()?.rename(&self.path, &dest).await?;
        Ok(self.child_handle(dest))
    }
}

impl Div<&str> for &AsyncVPath {
    type Output = AsyncVPath;

    fn div(self, child: &str) -> AsyncVPath {
        self.join(child)
    }
}

impl Div<&str> for AsyncVPath {
    type Output = AsyncVPath;

    fn div(self, child: &str) -> AsyncVPath {
        self.join(child)
    }
}

impl fmt::Display for AsyncVPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for AsyncVPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncVPath")
            .field("path", &self.path)
            .field("detached", &self.storage.is_none())
            .field("info", &self.info.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, Mount};
    use futures::TryStreamExt;

    fn mem_root() -> (MemoryStore, AsyncVPath) {
        let store = MemoryStore::new();
        let root = AsyncVPath::new(Arc::new(store.clone()), "/");
        (store, root)
    }

    #[tokio::test]
    async fn detached_handles_refuse_io() {
        let p = AsyncVPath::detached("/x");
        assert!(matches!(p.exists().await, Err(FsError::Detached { .. })));
        assert!(matches!(p.write_text("y").await, Err(FsError::Detached { .. })));
        assert!(matches!(p.is_dir().await, Err(FsError::Detached { .. })));
    }

    #[tokio::test]
    async fn iterdir_streams_seeded_children() {
        let (_, root) = mem_root();
        (&root / "b.txt").write_text("b").await.unwrap();
        (&root / "a").mkdir(MkdirOptions::new()).await.unwrap();

        let children: Vec<AsyncVPath> = root.iterdir().await.unwrap().try_collect().await.unwrap();
        let names: Vec<&str> = children.iter().map(AsyncVPath::name).collect();
        assert_eq!(names, ["a", "b.txt"]);
        assert!(children.iter().all(|c| c.info.get().is_some()));
        assert!(children[0].is_dir().await.unwrap());
    }

    #[tokio::test]
    async fn bytes_and_text() {
        let (_, root) = mem_root();
        let f = &root / "f";
        f.write_bytes(b"\xce\xbb").await.unwrap();
        assert_eq!(f.read_text().await.unwrap(), "λ");
        assert_eq!(f.stat().await.unwrap().size, 2);

        let opened = f.open("rb").await.unwrap();
        assert!(matches!(opened, AsyncOpened::Binary(_)));
    }

    #[tokio::test]
    async fn chroot_and_rename() {
        let (store, root) = mem_root();
        let home = &root / "home";
        home.mkdir(MkdirOptions::new()).await.unwrap();
        let jail = home.chroot().unwrap();

        let note = &jail / "note.txt";
        note.write_text("n").await.unwrap();
        let moved = note.rename("kept.txt").await.unwrap();
        assert_eq!(moved.as_posix(), "/kept.txt");
        assert!(crate::Storage::exists(&store, "/home/kept.txt").unwrap());

        let escape = &jail / "../../etc";
        assert!(matches!(
            escape.mkdir(MkdirOptions::new()).await,
            Err(FsError::OutsideBoundary { .. })
        ));
    }

    #[tokio::test]
    async fn handles_over_a_mount() {
        let mut mount = Mount::new();
        mount.mount("data", MemoryStore::new()).unwrap();
        mount.mount("cache", MemoryStore::new()).unwrap();
        let root = AsyncVPath::new(Arc::new(mount), "/");

        let names: Vec<String> = root
            .iterdir()
            .await
            .unwrap()
            .map_ok(|p| p.name().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, ["cache", "data"]);

        let f = &root / "data" / "x.txt";
        f.write_text("x").await.unwrap();
        let err = f.rename("/cache/x.txt").await.unwrap_err();
        assert!(matches!(err, FsError::CrossMount { .. }));
    }
}
