//! Error types for the vpath storage abstraction.

use std::fmt;

/// Coarse classification of an [`FsError`].
///
/// Middleware and callers branch on the kind rather than on individual
/// variants, so a leaf `NotFound` and a mount-table miss compare equal here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The addressed entry (or mount point) does not exist.
    NotFound,
    /// The entry exists and the operation does not allow that.
    AlreadyExists,
    /// Containment, routing or binding rules forbid the operation.
    PermissionDenied,
    /// The store stack or registry is not configured for the request.
    Configuration,
    /// The operation does not match how the stream was opened.
    Mode,
    /// The request itself is malformed.
    InvalidInput,
    /// Bytes could not be decoded or text could not be encoded.
    InvalidData,
    /// Host or backend failure unrelated to the caller's request.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Mode => "mode error",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::Io => "i/o error",
        };
        f.write_str(name)
    }
}

/// Storage error type with contextual variants.
///
/// All variants carry the path or operation that failed where one exists.
/// Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use vpath::{ErrorKind, FsError};
///
/// let err = FsError::NotFound { path: "/missing".into() };
/// assert_eq!(err.to_string(), "not found: /missing");
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Lookup errors
    /// Path does not exist in the store.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// The first path segment names no mounted store.
    #[error("mount point not found: {name}")]
    MountNotFound {
        /// The segment that matched no mount.
        name: String,
    },

    /// Path already exists when it shouldn't.
    #[error("{operation}: already exists: {path}")]
    AlreadyExists {
        /// The path that already exists.
        path: String,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Expected a directory but found something else.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The path that is not a directory.
        path: String,
    },

    /// Expected a file but found something else.
    #[error("not a file: {path}")]
    NotAFile {
        /// The path that is not a file.
        path: String,
    },

    /// The path cannot be used for this operation.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },

    // Permission errors
    /// Permission denied for operation.
    #[error("{operation}: permission denied: {path}")]
    PermissionDenied {
        /// The path where permission was denied.
        path: String,
        /// The operation that was denied.
        operation: &'static str,
    },

    /// A chrooted path normalized to somewhere outside its boundary.
    #[error("access denied: {path} is outside of {boundary}")]
    OutsideBoundary {
        /// The path as requested by the caller.
        path: String,
        /// The boundary the store is confined to.
        boundary: String,
    },

    /// Rename whose source and destination live on different mounts.
    #[error("rename across mount points is not allowed: {src} -> {dest}")]
    CrossMount {
        /// Source path.
        src: String,
        /// Destination path.
        dest: String,
    },

    /// I/O attempted through a path handle with no bound store.
    #[error("path is detached from any storage: {path}")]
    Detached {
        /// The detached path.
        path: String,
    },

    // Configuration errors
    /// An overlay was used before any layer was added.
    #[error("overlay has no layers")]
    NoLayers,

    /// No driver is registered for the URL scheme.
    #[error("no driver registered for scheme '{scheme}'")]
    UnknownScheme {
        /// The scheme that was requested.
        scheme: String,
    },

    /// The URL could not be parsed.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Parser diagnostics.
        reason: String,
    },

    // Mode errors
    /// The mode string contains unknown or conflicting tokens.
    #[error("invalid open mode: {mode:?}")]
    InvalidMode {
        /// The mode as given.
        mode: String,
    },

    /// Text operation on a stream not opened for that direction.
    #[error("{operation}: stream not opened for {operation}")]
    Mode {
        /// `"reading"` or `"writing"`.
        operation: &'static str,
    },

    /// Operation on a text session that was already closed.
    #[error("I/O operation on closed stream")]
    Closed,

    // Data errors
    /// Unknown text encoding label.
    #[error("unknown encoding: {label}")]
    UnknownEncoding {
        /// The label as given.
        label: String,
    },

    /// Bytes that are not valid in the session's encoding.
    #[error("{encoding} decode error: {details}")]
    Decode {
        /// The encoding in use.
        encoding: &'static str,
        /// What went wrong.
        details: String,
    },

    /// Text that cannot be represented in the session's encoding.
    #[error("{encoding} encode error: {details}")]
    Encode {
        /// The encoding in use.
        encoding: &'static str,
        /// What went wrong.
        details: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    // Backend errors
    /// Generic backend error.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound { .. } | FsError::MountNotFound { .. } => ErrorKind::NotFound,
            FsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            FsError::PermissionDenied { .. }
            | FsError::OutsideBoundary { .. }
            | FsError::CrossMount { .. }
            | FsError::Detached { .. } => ErrorKind::PermissionDenied,
            FsError::NoLayers | FsError::UnknownScheme { .. } | FsError::InvalidUrl { .. } => {
                ErrorKind::Configuration
            }
            FsError::InvalidMode { .. } | FsError::Mode { .. } | FsError::Closed => {
                ErrorKind::Mode
            }
            FsError::NotADirectory { .. }
            | FsError::NotAFile { .. }
            | FsError::InvalidPath { .. } => ErrorKind::InvalidInput,
            FsError::UnknownEncoding { .. }
            | FsError::Decode { .. }
            | FsError::Encode { .. }
            | FsError::Serialization(_)
            | FsError::Deserialization(_) => ErrorKind::InvalidData,
            FsError::Backend(_) | FsError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Returns `true` for either flavour of "nothing there".
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Convert a host I/O error, keeping the operation and path as context.
    ///
    /// Well-known kinds map to the dedicated variants so that callers see the
    /// same error whether a path is missing on disk or in memory.
    pub fn io(operation: &'static str, path: impl Into<String>, error: std::io::Error) -> Self {
        let path = path.into();
        match error.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound { path },
            std::io::ErrorKind::AlreadyExists => FsError::AlreadyExists { path, operation },
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied { path, operation },
            std::io::ErrorKind::NotADirectory => FsError::NotADirectory { path },
            std::io::ErrorKind::IsADirectory => FsError::NotAFile { path },
            _ => FsError::Io {
                operation,
                path,
                source: error,
            },
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(error: std::io::Error) -> Self {
        FsError::io("io", String::new(), error)
    }
}

/// Convenience alias used throughout the crate.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_error_not_found_display() {
        let err = FsError::NotFound {
            path: "/missing".into(),
        };
        assert_eq!(err.to_string(), "not found: /missing");
    }

    #[test]
    fn mount_not_found_is_not_found_kind() {
        let err = FsError::MountNotFound { name: "nope".into() };
        assert_eq!(err.to_string(), "mount point not found: nope");
        assert!(err.is_not_found());
    }

    #[test]
    fn fs_error_already_exists_display() {
        let err = FsError::AlreadyExists {
            path: "/exists".into(),
            operation: "mkdir",
        };
        assert_eq!(err.to_string(), "mkdir: already exists: /exists");
    }

    #[test]
    fn containment_errors_are_permission_denied() {
        let escape = FsError::OutsideBoundary {
            path: "../etc".into(),
            boundary: "/jail".into(),
        };
        assert!(escape.to_string().contains("/jail"));
        assert_eq!(escape.kind(), ErrorKind::PermissionDenied);

        let cross = FsError::CrossMount {
            src: "/a/x".into(),
            dest: "/b/y".into(),
        };
        assert_eq!(cross.kind(), ErrorKind::PermissionDenied);

        let detached = FsError::Detached { path: "x".into() };
        assert_eq!(detached.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn no_layers_is_configuration() {
        assert_eq!(FsError::NoLayers.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn mode_errors() {
        let err = FsError::Mode {
            operation: "reading",
        };
        assert_eq!(err.to_string(), "reading: stream not opened for reading");
        assert_eq!(err.kind(), ErrorKind::Mode);
        assert_eq!(FsError::Closed.kind(), ErrorKind::Mode);
    }

    #[test]
    fn fs_error_from_io_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let fs_err = FsError::io("open", "/a", io_err);
        assert!(matches!(fs_err, FsError::NotFound { ref path } if path == "/a"));
    }

    #[test]
    fn fs_error_from_io_permission_denied() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let fs_err = FsError::from(io_err);
        assert!(matches!(fs_err, FsError::PermissionDenied { .. }));
    }

    #[test]
    fn fs_error_from_io_already_exists() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "test");
        let fs_err = FsError::io("mkdir", "/d", io_err);
        assert!(matches!(
            fs_err,
            FsError::AlreadyExists {
                operation: "mkdir",
                ..
            }
        ));
    }

    #[test]
    fn fs_error_from_io_other() {
        let io_err = std::io::Error::other("test");
        let fs_err = FsError::from(io_err);
        assert!(matches!(fs_err, FsError::Io { .. }));
        assert_eq!(fs_err.kind(), ErrorKind::Io);
    }
}
