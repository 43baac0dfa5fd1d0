//! # vpath
//!
//! Path-like handles over **pluggable storage backends**, with middleware
//! that composes stores into virtual trees.
//!
//! A [`VPath`] is a posix path bound to a [`Storage`]. Stores are either
//! leaves that hold bytes ([`MemoryStore`], [`LocalStore`]) or middleware
//! that wraps other stores and adds virtual semantics ([`Mount`],
//! [`Overlay`], [`Chroot`]). Every store speaks the same seven-operation
//! contract, so a path handle never knows how deep the stack below it is.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use vpath::{MemoryStore, Mount, VPath};
//!
//! let mut mount = Mount::new();
//! mount.mount("data", MemoryStore::new())?;
//! mount.mount("logs", MemoryStore::new())?;
//!
//! let root = VPath::new(Arc::new(mount), "/");
//! let notes = &root / "data" / "notes.txt";
//! notes.write_text("first line\n")?;
//! assert_eq!(notes.read_text()?, "first line\n");
//!
//! let mut names: Vec<String> = root
//!     .iterdir()?
//!     .map(|child| child.map(|c| c.name().to_string()))
//!     .collect::<Result<_, _>>()?;
//! names.sort();
//! assert_eq!(names, ["data", "logs"]);
//! # Ok::<(), vpath::FsError>(())
//! ```
//!
//! Locations can also be opened by URL through a [`Registry`]:
//!
//! ```rust
//! use vpath::{Registry, Storage};
//!
//! let registry = Registry::<dyn Storage>::with_builtins();
//! let scratch = registry.open("mem://scratch.txt")?;
//! scratch.write_text("hello")?;
//! assert_eq!(scratch.read_text()?, "hello");
//! # Ok::<(), vpath::FsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Storage`] | Blocking storage contract: `get_info`, `list_dir`, `open`, `exists`, `unlink`, `mkdir`, `rename` |
//! | [`AsyncStorage`] | The same contract for async callers (`async` feature) |
//! | [`VPath`] / [`AsyncVPath`] | Path handle bound to a shared store |
//! | [`TextIo`] / [`AsyncTextIo`] | Chunked text session with incremental decoding |
//! | [`Registry`] | Scheme to store constructor table |
//! | [`FsError`] | Error type with context, classified by [`ErrorKind`] |
//! | [`EntryInfo`] | Name, kind, size and mtime of one entry |
//!
//! ---
//!
//! ## Middleware
//!
//! | Store | Behavior |
//! |-------|----------|
//! | [`Mount`] | Routes by first path segment; root lists the mount points |
//! | [`Overlay`] | Priority-ordered union; reads fall through, writes go to the primary layer |
//! | [`Chroot`] | Confines every path to a sub-tree; escapes fail with [`FsError::OutsideBoundary`] |
//! | [`Wrap`] | Pass-through, or path rewriting through any [`PathMap`] |
//!
//! Middleware is generic over its children, so stacks nest freely:
//!
//! ```rust
//! use vpath::{Chroot, MemoryStore, Overlay, Storage};
//!
//! let base = MemoryStore::new();
//! let mut overlay = Overlay::new();
//! overlay.add_layer(Chroot::rooted(base.clone(), "/defaults"));
//! overlay.add_layer(Chroot::rooted(base.clone(), "/user"));
//! assert!(overlay.exists("/").is_ok());
//! ```
//!
//! Use [`Layer`] / [`LayerExt`] to build the same stacks fluently.
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Errors include context:
//!
//! ```rust
//! use vpath::{ErrorKind, FsError};
//!
//! let err = FsError::CrossMount { src: "/a/x".into(), dest: "/b/x".into() };
//! assert_eq!(err.kind(), ErrorKind::PermissionDenied);
//!
//! let err = FsError::MountNotFound { name: "nope".into() };
//! assert_eq!(err.to_string(), "mount point not found: nope");
//! assert!(err.is_not_found());
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`. Methods take `&self`; stores use
//! interior mutability internally. Handles share their store through an
//! `Arc`, so cloning a [`VPath`] is cheap. Middleware does no locking of its
//! own: configure mounts and layers before sharing a stack.
//!
//! ---
//!
//! ## Logging
//!
//! The crate emits [`tracing`](https://docs.rs/tracing) events (mount
//! routing, overlay layer selection, chroot rewrites, text flushes) and
//! never installs a subscriber.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` (default) | [`AsyncStorage`], [`AsyncVPath`], [`AsyncTextIo`] on tokio I/O traits |
//! | `serde` | Serialization for [`EntryInfo`] and `StorageExtJson` |

// Private modules
mod error;
mod ext;
mod layer;
mod middleware;
mod path;
mod registry;
mod storages;
mod textio;
mod traits;
mod types;
mod uri;

#[cfg(feature = "async")]
mod async_path;

// Public modules
pub mod posix;

// Public re-exports - error types
pub use error::{ErrorKind, FsError, FsResult};

// Public re-exports - core types
pub use types::{EntryInfo, EntryKind, MkdirOptions, OpenMode, Params, unix_mtime};

// Public re-exports - storage contract
pub use traits::{ByteStream, ListDir, ListItem, Storage};

#[cfg(feature = "async")]
pub use traits::{AsyncByteStream, AsyncStorage, ListDirStream};

// Public re-exports - stores
pub use middleware::{
    Chroot, ChrootBoundary, Identity, LayerStack, Mount, MountTable, Overlay, PathMap, Route, Wrap,
};
pub use storages::{LocalStore, MemFile, MemoryStore};

// Public re-exports - text I/O
pub use textio::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_HISTORY_LIMIT, Encoding, IncrementalDecoder,
    Lines, TextIo, TextOptions,
};

#[cfg(feature = "async")]
pub use textio::AsyncTextIo;

// Public re-exports - path handles and locations
pub use path::{Opened, VPath};
pub use registry::{Constructor, Registry};
pub use uri::ParsedUrl;

#[cfg(feature = "async")]
pub use async_path::{AsyncOpened, AsyncVPath};

// Public re-exports - infrastructure
pub use ext::StorageExt;
pub use layer::{ChrootLayer, Layer, LayerExt, WrapLayer};

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::StorageExtJson;
