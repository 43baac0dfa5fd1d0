//! The blocking storage capability.

use std::sync::Arc;

use crate::{ByteStream, EntryInfo, FsError, MkdirOptions, OpenMode};

/// One item of a directory listing: child name plus metadata if the store
/// had it at hand.
pub type ListItem = (String, Option<EntryInfo>);

/// The storage contract every leaf store and every middleware implements.
///
/// Paths are posix-style strings interpreted relative to the store's own
/// root; a leading `/` is optional.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Methods take `&self`; stores
/// that mutate state use interior mutability.
///
/// # Object Safety
///
/// This trait is object-safe. Path handles hold an `Arc<dyn Storage>`.
pub trait Storage: Send + Sync {
    /// Metadata for `path`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist in this store
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError>;

    /// List the children of a directory.
    ///
    /// The listing is lazy, finite and can be consumed once. Metadata may
    /// be omitted per entry; callers then fall back to
    /// [`get_info`](Self::get_info).
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the directory does not exist
    /// - [`FsError::NotADirectory`] if the path is a file
    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError>;

    /// Open a byte stream.
    ///
    /// Opening for write creates missing parent directories. The
    /// [`binary`](OpenMode::binary) flag is ignored here; text sessions
    /// are layered on top by the path handle.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] when reading a missing path
    /// - [`FsError::AlreadyExists`] for exclusive creation of an existing path
    /// - [`FsError::NotAFile`] if the path is a directory
    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError>;

    /// Check whether `path` exists.
    ///
    /// Returns `Ok(false)` for a missing path. Only returns an error for
    /// infrastructure failures.
    fn exists(&self, path: &str) -> Result<bool, FsError>;

    /// Remove a file, or a directory with everything below it.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if there is nothing to remove
    fn unlink(&self, path: &str) -> Result<(), FsError>;

    /// Create a directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::AlreadyExists`] unless [`MkdirOptions::exist_ok`] is set
    /// - [`FsError::NotFound`] for a missing parent unless
    ///   [`MkdirOptions::parents`] is set
    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError>;

    /// Move `src` to `dest` within this store.
    ///
    /// Moves between stores are outside this contract; copy then unlink.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `src` does not exist
    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError>;
}

macro_rules! forward_storage {
    ($($ptr:ident),*) => {$(
        impl<T: Storage + ?Sized> Storage for $ptr<T> {
            fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
                (**self).get_info(path)
            }

            fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
                (**self).list_dir(path)
            }

            fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
                (**self).open(path, mode)
            }

            fn exists(&self, path: &str) -> Result<bool, FsError> {
                (**self).exists(path)
            }

            fn unlink(&self, path: &str) -> Result<(), FsError> {
                (**self).unlink(path)
            }

            fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
                (**self).mkdir(path, options)
            }

            fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
                (**self).rename(src, dest)
            }
        }
    )*};
}

forward_storage!(Arc, Box);

/// Iterator over a directory listing.
///
/// Wraps a boxed iterator for flexibility across stores. The outer
/// `Result` from [`Storage::list_dir`] says whether the directory could be
/// opened; each item's `Result` says whether that entry could be read.
///
/// # Example
///
/// ```rust
/// use vpath::{FsError, MemoryStore, Storage};
///
/// fn names(store: &dyn Storage) -> Result<Vec<String>, FsError> {
///     let mut names = Vec::new();
///     for item in store.list_dir("/")? {
///         let (name, _info) = item?;
///         names.push(name);
///     }
///     Ok(names)
/// }
///
/// assert!(names(&MemoryStore::new()).unwrap().is_empty());
/// ```
pub struct ListDir<'a>(Box<dyn Iterator<Item = Result<ListItem, FsError>> + Send + 'a>);

impl<'a> ListDir<'a> {
    /// Create from any compatible iterator.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<ListItem, FsError>> + Send + 'a,
    {
        Self(Box::new(iter))
    }

    /// Create from a pre-collected vector.
    pub fn from_vec(entries: Vec<Result<ListItem, FsError>>) -> Self {
        Self(Box::new(entries.into_iter()))
    }

    /// Collect all entries, short-circuiting on the first error.
    pub fn collect_all(self) -> Result<Vec<ListItem>, FsError> {
        self.collect()
    }
}

impl Iterator for ListDir<'_> {
    type Item = Result<ListItem, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl std::fmt::Debug for ListDir<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListDir").finish_non_exhaustive()
    }
}
