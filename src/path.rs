//! The blocking path handle.

use std::fmt;
use std::io::{Read, Write};
use std::ops::Div;
use std::sync::{Arc, OnceLock};

use crate::{
    ByteStream, Chroot, EntryInfo, FsError, MkdirOptions, OpenMode, Storage, TextIo, TextOptions,
    posix,
};

/// A posix-style path bound to one [`Storage`].
///
/// A `VPath` is an immutable value: joining produces a new handle sharing
/// the same store. Every filesystem operation delegates to that store. A
/// handle without a store is *detached*; its I/O methods fail with
/// [`FsError::Detached`].
///
/// [`stat`](Self::stat) is cached per handle and never refreshed, so it is
/// a snapshot. Handles produced by [`iterdir`](Self::iterdir) start with the
/// metadata the listing supplied.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vpath::{MemoryStore, MkdirOptions, VPath};
///
/// let root = VPath::new(Arc::new(MemoryStore::new()), "/");
/// let docs = &root / "docs";
/// docs.mkdir(MkdirOptions::new())?;
///
/// let readme = &docs / "README.md";
/// readme.write_text("# hi\n")?;
/// assert_eq!(readme.read_text()?, "# hi\n");
/// assert_eq!(readme.name(), "README.md");
///
/// let names: Vec<String> = docs
///     .iterdir()?
///     .map(|child| child.map(|c| c.name().to_string()))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(names, ["README.md"]);
/// # Ok::<(), vpath::FsError>(())
/// ```
#[derive(Clone)]
pub struct VPath {
    path: String,
    storage: Option<Arc<dyn Storage>>,
    info: OnceLock<EntryInfo>,
}

/// What [`VPath::open`] returns: a text session unless the mode has `b`.
pub enum Opened {
    /// Decoded text session.
    Text(TextIo),
    /// Raw byte stream.
    Binary(Box<dyn ByteStream>),
}

impl Opened {
    /// The text session, if the mode was textual.
    pub fn into_text(self) -> Option<TextIo> {
        match self {
            Opened::Text(io) => Some(io),
            Opened::Binary(_) => None,
        }
    }

    /// The byte stream, if the mode was binary.
    pub fn into_binary(self) -> Option<Box<dyn ByteStream>> {
        match self {
            Opened::Text(_) => None,
            Opened::Binary(stream) => Some(stream),
        }
    }
}

impl fmt::Debug for Opened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opened::Text(io) => f.debug_tuple("Text").field(io).finish(),
            Opened::Binary(_) => f.debug_tuple("Binary").finish_non_exhaustive(),
        }
    }
}

impl VPath {
    /// Bind `path` to `storage`.
    pub fn new(storage: Arc<dyn Storage>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            storage: Some(storage),
            info: OnceLock::new(),
        }
    }

    /// A path with no store; useful for path arithmetic only.
    pub fn detached(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            storage: None,
            info: OnceLock::new(),
        }
    }

    /// The same path bound to another store, with an empty stat cache.
    pub fn with_storage(&self, storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, self.path.clone())
    }

    /// The bound store.
    ///
    /// # Errors
    ///
    /// - [`FsError::Detached`] if the handle has no store
    pub fn storage(&self) -> Result<&Arc<dyn Storage>, FsError> {
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
    pub fn parent(&self) -> Option<VPath> {
        posix::parent(&self.path).map(|parent| self.child_handle(parent.to_string()))
    }

    /// Append `child`; an absolute `child` replaces the path. The store is
    /// carried over.
    pub fn join(&self, child: &str) -> VPath {
        self.child_handle(posix::join(&self.path, child))
    }

    fn child_handle(&self, path: String) -> VPath {
        Self {
            path,
            storage: self.storage.clone(),
            info: OnceLock::new(),
        }
    }

    /// Metadata, fetched once and cached on this handle.
    pub fn stat(&self) -> Result<&EntryInfo, FsError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let info = self.storage()?.get_info(&self.path)?;
        Ok(self.info.get_or_init(|| info))
    }

    /// Whether the path exists. Missing is `Ok(false)`, not an error.
    pub fn exists(&self) -> Result<bool, FsError> {
        self.storage()?.exists(&self.path)
    }

    /// Whether the path is a regular file.
    ///
    /// Missing is `Ok(false)`; any other failure, such as a detached handle
    /// or a chroot escape, is returned as an error.
    pub fn is_file(&self) -> Result<bool, FsError> {
        self.kind_is(EntryInfo::is_file)
    }

    /// Whether the path is a directory. Missing is `Ok(false)`.
    pub fn is_dir(&self) -> Result<bool, FsError> {
        self.kind_is(EntryInfo::is_dir)
    }

    fn kind_is(&self, check: fn(&EntryInfo) -> bool) -> Result<bool, FsError> {
        match self.stat() {
            Ok(info) => Ok(check(info)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lazily list the children, each pre-seeded with whatever metadata the
    /// store returned.
    pub fn iterdir(&self) -> Result<impl Iterator<Item = Result<VPath, FsError>> + '_, FsError> {
        let listing = self.storage()?.list_dir(&self.path)?;
        Ok(listing.map(move |item| {
            let (name, info) = item?;
            let child = self.join(&name);
            if let Some(info) = info {
                let _ = child.info.set(info);
            }
            Ok(child)
        }))
    }

    /// Open with a mode string (`r`, `w`, `a`, `x`, optional `+`, `b`, `t`)
    /// and default [`TextOptions`].
    pub fn open(&self, mode: &str) -> Result<Opened, FsError> {
        self.open_with(mode, &TextOptions::default())
    }

    /// Open with explicit text options; they are ignored for binary modes.
    pub fn open_with(&self, mode: &str, options: &TextOptions) -> Result<Opened, FsError> {
        let mode = OpenMode::parse(mode)?;
        let stream = self.storage()?.open(&self.path, mode)?;
        if mode.is_text() {
            Ok(Opened::Text(
                TextIo::new(stream, mode, options).with_path(self.path.as_str()),
            ))
        } else {
            Ok(Opened::Binary(stream))
        }
    }

    fn text_session(&self, mode: OpenMode, options: &TextOptions) -> Result<TextIo, FsError> {
        let stream = self.storage()?.open(&self.path, mode)?;
        Ok(TextIo::new(stream, mode, options).with_path(self.path.as_str()))
    }

    /// Read the whole file as UTF-8 text.
    pub fn read_text(&self) -> Result<String, FsError> {
        self.read_text_with(&TextOptions::default())
    }

    /// Read the whole file with explicit text options.
    pub fn read_text_with(&self, options: &TextOptions) -> Result<String, FsError> {
        let mut io = self.text_session(OpenMode::READ, options)?;
        let text = io.read_to_string();
        let closed = io.close();
        let text = text?;
        closed?;
        Ok(text)
    }

    /// Replace the file's contents with `text` as UTF-8. Returns the number
    /// of characters written.
    pub fn write_text(&self, text: &str) -> Result<usize, FsError> {
        self.write_text_with(text, &TextOptions::default())
    }

    /// Replace the file's contents with `text` using explicit text options.
    pub fn write_text_with(&self, text: &str, options: &TextOptions) -> Result<usize, FsError> {
        let mut io = self.text_session(OpenMode::WRITE, options)?;
        let written = io.write(text);
        let closed = io.close();
        let written = written?;
        closed?;
        Ok(written)
    }

    /// Read the whole file as bytes.
    pub fn read_bytes(&self) -> Result<Vec<u8>, FsError> {
        let mut stream = self.storage()?.open(&self.path, OpenMode::READ.binary())?;
        let mut data = Vec::new();
        let read = stream
            .read_to_end(&mut data)
            .map_err(|e| FsError::io("read", self.path.as_str(), e));
        let closed = stream
            .close()
            .map_err(|e| FsError::io("close", self.path.as_str(), e));
        read?;
        closed?;
        Ok(data)
    }

    /// Replace the file's contents with `data`.
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), FsError> {
        let mut stream = self.storage()?.open(&self.path, OpenMode::WRITE.binary())?;
        let written = stream
            .write_all(data)
            .map_err(|e| FsError::io("write", self.path.as_str(), e));
        let closed = stream
            .close()
            .map_err(|e| FsError::io("close", self.path.as_str(), e));
        written?;
        closed
    }

    /// A root handle on a new [`Chroot`] store confined to this path.
    ///
    /// Every operation through the returned handle stays below this path.
    pub fn chroot(&self) -> Result<VPath, FsError> {
        let inner = Arc::clone(self.storage()?);
        let jail: Arc<dyn Storage> = Arc::new(Chroot::rooted(inner, &self.path));
        Ok(VPath::new(jail, "/"))
    }

    /// Remove the file or directory (recursively).
    pub fn unlink(&self) -> Result<(), FsError> {
        self.storage()?.unlink(&self.path)
    }

    /// Create this directory.
    pub fn mkdir(&self, options: MkdirOptions) -> Result<(), FsError> {
        self.storage()?.mkdir(&self.path, options)
    }

    /// Move to `target` on the same store; returns the handle for the new
    /// location. A relative `target` is taken relative to the parent.
    pub fn rename(&self, target: &str) -> Result<VPath, FsError> {
        let dest = match posix::parent(&self.path) {
            Some(parent) if !target.starts_with('/') => posix::join(parent, target),
            _ => target.to_string(),
        };
        self.storage()?.rename(&self.path, &dest)?;
        Ok(self.child_handle(dest))
    }
}

impl Div<&str> for &VPath {
    type Output = VPath;

    fn div(self, child: &str) -> VPath {
        self.join(child)
    }
}

impl Div<&str> for VPath {
    type Output = VPath;

    fn div(self, child: &str) -> VPath {
        self.join(child)
    }
}

impl fmt::Display for VPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for VPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VPath")
            .field("path", &self.path)
            .field("detached", &self.storage.is_none())
            .field("info", &self.info.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, Overlay};
    use std::io::Write;

    fn mem_root() -> (MemoryStore, VPath) {
        let store = MemoryStore::new();
        let root = VPath::new(Arc::new(store.clone()), "/");
        (store, root)
    }

    #[test]
    fn path_arithmetic() {
        let p = VPath::detached("/a/b");
        assert_eq!((&p / "c").as_posix(), "/a/b/c");
        assert_eq!(p.join("/x").as_posix(), "/x");
        assert_eq!(p.name(), "b");
        assert_eq!(p.parent().unwrap().as_posix(), "/a");
        assert!(VPath::detached("/").parent().is_none());
        assert_eq!(VPath::detached("rel").join("x").to_string(), "rel/x");
    }

    #[test]
    fn detached_handles_refuse_io() {
        let p = VPath::detached("/file.txt");
        assert!(p.is_detached());
        assert!(matches!(p.exists(), Err(FsError::Detached { .. })));
        assert!(matches!(p.read_text(), Err(FsError::Detached { .. })));
        assert!(matches!(p.mkdir(MkdirOptions::new()), Err(FsError::Detached { .. })));
        assert!(matches!(p.chroot(), Err(FsError::Detached { .. })));
        assert!(matches!(p.is_file(), Err(FsError::Detached { .. })));
        assert!(matches!(p.is_dir(), Err(FsError::Detached { .. })));
        assert!((&p / "child").is_detached());
    }

    #[test]
    fn with_storage_binds_a_detached_path() {
        let (store, _) = mem_root();
        let p = VPath::detached("/f.txt").with_storage(Arc::new(store));
        p.write_text("bound").unwrap();
        assert_eq!(p.read_text().unwrap(), "bound");
    }

    #[test]
    fn stat_is_a_snapshot() {
        let (_, root) = mem_root();
        let f = &root / "f.txt";
        f.write_text("abc").unwrap();
        assert_eq!(f.stat().unwrap().size, 3);
        f.write_text("abcdef").unwrap();
        assert_eq!(f.stat().unwrap().size, 3);
        assert_eq!((&root / "f.txt").stat().unwrap().size, 6);
    }

    #[test]
    fn iterdir_seeds_child_metadata() {
        let (store, root) = mem_root();
        (&root / "a.txt").write_text("a").unwrap();
        (&root / "sub").mkdir(MkdirOptions::new()).unwrap();

        let children: Vec<VPath> = root.iterdir().unwrap().map(Result::unwrap).collect();
        assert_eq!(children.len(), 2);
        for child in &children {
            assert!(child.info.get().is_some(), "{child} should carry metadata");
        }

        // Seeded metadata is served without asking the store again.
        store.unlink("/a.txt").unwrap();
        let a = children.iter().find(|c| c.name() == "a.txt").unwrap();
        assert!(a.is_file().unwrap());
        assert!(!a.exists().unwrap());
    }

    #[test]
    fn open_dispatches_on_mode() {
        let (_, root) = mem_root();
        let f = &root / "data.bin";
        let mut raw = f.open("wb").unwrap().into_binary().unwrap();
        raw.write_all(&[0, 159, 146, 150]).unwrap();
        raw.close().unwrap();
        assert_eq!(f.read_bytes().unwrap(), vec![0, 159, 146, 150]);

        let text = f.open("r").unwrap();
        assert!(matches!(text, Opened::Text(_)));
        let mut text = text.into_text().unwrap();
        assert!(matches!(text.read_to_string(), Err(FsError::Decode { .. })));
        assert!(matches!(f.open("rw"), Err(FsError::InvalidMode { .. })));
    }

    #[test]
    fn text_options_per_call() {
        let (_, root) = mem_root();
        let f = &root / "latin.txt";
        let latin = TextOptions::new().with_encoding(crate::Encoding::Latin1);
        f.write_text_with("café", &latin).unwrap();
        assert_eq!(f.read_bytes().unwrap(), b"caf\xe9");
        assert_eq!(f.read_text_with(&latin).unwrap(), "café");
        assert!(f.read_text().is_err());
    }

    #[test]
    fn chroot_confines_the_new_handle() {
        let (store, root) = mem_root();
        let home = &root / "home";
        home.mkdir(MkdirOptions::new()).unwrap();
        (&root / "secret.txt").write_text("s").unwrap();

        let jail = home.chroot().unwrap();
        assert_eq!(jail.as_posix(), "/");
        (&jail / "mine.txt").write_text("m").unwrap();
        assert!(store.exists("/home/mine.txt").unwrap());

        let escape = &jail / "../secret.txt";
        assert!(matches!(escape.read_text(), Err(FsError::OutsideBoundary { .. })));
        assert!(matches!(escape.is_file(), Err(FsError::OutsideBoundary { .. })));
        assert!(matches!(escape.is_dir(), Err(FsError::OutsideBoundary { .. })));
        assert!(!(&jail / "absent.txt").is_file().unwrap());
    }

    #[test]
    fn rename_returns_the_new_handle() {
        let (store, root) = mem_root();
        let dir = &root / "d";
        dir.mkdir(MkdirOptions::new()).unwrap();
        let old = &dir / "old.txt";
        old.write_text("x").unwrap();

        let new = old.rename("new.txt").unwrap();
        assert_eq!(new.as_posix(), "/d/new.txt");
        assert!(!store.exists("/d/old.txt").unwrap());
        assert_eq!(new.read_text().unwrap(), "x");

        let moved = new.rename("/top.txt").unwrap();
        assert_eq!(moved.as_posix(), "/top.txt");
    }

    #[test]
    fn handles_over_middleware() {
        let lower = MemoryStore::new();
        let upper = MemoryStore::new();
        lower.mkdir("/etc", MkdirOptions::new()).unwrap();

        let mut overlay = Overlay::new();
        overlay.add_layer(lower.clone());
        overlay.add_layer(upper.clone());
        let root = VPath::new(Arc::new(overlay), "/");

        let conf = &root / "etc" / "app.conf";
        conf.write_text("k=v\n").unwrap();
        assert!(upper.exists("/etc/app.conf").unwrap());
        assert!(!lower.exists("/etc/app.conf").unwrap());
        assert!((&root / "etc").is_dir().unwrap());
    }
}
