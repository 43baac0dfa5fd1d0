//! # Storage Traits
//!
//! The capability contract every store implements, in both execution models.
//!
//! ## Overview
//!
//! | Trait | Model | Returned stream |
//! |-------|-------|-----------------|
//! | [`Storage`] | blocking | [`ByteStream`] |
//! | [`AsyncStorage`] | suspending (`async` feature) | [`AsyncByteStream`] |
//!
//! Both traits carry the same seven operations with identical semantics:
//! `get_info`, `list_dir`, `open`, `exists`, `unlink`, `mkdir`, `rename`.
//! Leaf stores touch real bytes; middleware rewrites or routes the path and
//! calls further down.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` and take `&self`. Middleware performs no
//! locking of its own, so callers serialize concurrent mutations of the same
//! entries themselves.
//!
//! ## Object Safety
//!
//! All traits are object-safe:
//!
//! ```rust
//! use vpath::Storage;
//!
//! fn reachable(store: &dyn Storage) -> bool {
//!     store.exists("/file.txt").unwrap_or(false)
//! }
//! ```

mod byte_stream;
mod storage;

#[cfg(feature = "async")]
mod async_storage;

pub use byte_stream::ByteStream;
pub use storage::{ListDir, ListItem, Storage};

#[cfg(feature = "async")]
pub use async_storage::{AsyncStorage, ListDirStream};
#[cfg(feature = "async")]
pub use byte_stream::AsyncByteStream;
