//! # Extension Traits
//!
//! Convenience methods for any [`Storage`].
//!
//! ## Overview
//!
//! [`StorageExt`] provides commonly-needed utility methods that aren't part
//! of the storage contract. They are default methods with a blanket
//! implementation, so every store (and every `dyn Storage`) gets them.
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`is_file`](StorageExt::is_file) | Check if path is a regular file |
//! | [`is_dir`](StorageExt::is_dir) | Check if path is a directory |
//! | [`file_size`](StorageExt::file_size) | Size in bytes |
//! | [`read_bytes`](StorageExt::read_bytes) | Whole file as bytes |
//! | [`write_bytes`](StorageExt::write_bytes) | Replace file contents |
//! | [`read_string`](StorageExt::read_string) | Whole file as UTF-8 |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, additional methods are available:
//!
//! | Method | Description |
//! |--------|-------------|
//! | `read_json` | Read and deserialize JSON file |
//! | `write_json` | Serialize and write JSON file |
//!
//! Enable with:
//! ```toml
//! [dependencies]
//! vpath = { version = "0.1", features = ["serde"] }
//! ```

use std::io::{Read, Write};

use crate::{ByteStream, FsError, OpenMode, Storage};

/// Extension methods for any store.
///
/// # Example
///
/// ```rust
/// use vpath::{FsError, MemoryStore, Storage, StorageExt};
///
/// fn ensure_config(store: &dyn Storage) -> Result<String, FsError> {
///     if !store.is_file("/app.toml")? {
///         store.write_bytes("/app.toml", b"debug = false\n")?;
///     }
///     store.read_string("/app.toml")
/// }
///
/// assert_eq!(ensure_config(&MemoryStore::new()).unwrap(), "debug = false\n");
/// ```
pub trait StorageExt: Storage {
    /// Check if the path points to a regular file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    /// Returns `Err` only for actual failures.
    fn is_file(&self, path: &str) -> Result<bool, FsError> {
        match self.get_info(path) {
            Ok(info) => Ok(info.is_file()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path points to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist (not an error).
    fn is_dir(&self, path: &str) -> Result<bool, FsError> {
        match self.get_info(path) {
            Ok(info) => Ok(info.is_dir()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size of the entry in bytes.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` if the path doesn't exist.
    fn file_size(&self, path: &str) -> Result<u64, FsError> {
        Ok(self.get_info(path)?.size)
    }

    /// Read the whole file.
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let mut stream = self.open(path, OpenMode::READ.binary())?;
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .map_err(|e| FsError::io("read", path, e))?;
        stream.close().map_err(|e| FsError::io("close", path, e))?;
        Ok(data)
    }

    /// Replace the file's contents, creating it and its parents if needed.
    fn write_bytes(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let mut stream = self.open(path, OpenMode::WRITE.binary())?;
        stream
            .write_all(data)
            .map_err(|e| FsError::io("write", path, e))?;
        stream.close().map_err(|e| FsError::io("close", path, e))
    }

    /// Read the whole file as UTF-8.
    ///
    /// # Errors
    ///
    /// - `FsError::Decode` if the content is not valid UTF-8
    fn read_string(&self, path: &str) -> Result<String, FsError> {
        String::from_utf8(self.read_bytes(path)?).map_err(|e| FsError::Decode {
            encoding: "utf-8",
            details: e.to_string(),
        })
    }
}

// Blanket implementation - any store gets StorageExt for free
impl<S: Storage + ?Sized> StorageExt for S {}

// =============================================================================
// JSON Support (Feature-Gated)
// =============================================================================

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON serialization extension methods.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait StorageExtJson: Storage {
        /// Read a file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound` — File doesn't exist
        /// - `FsError::Deserialization` — JSON parsing failed
        ///
        /// # Example
        ///
        /// ```rust
        /// # #[cfg(feature = "serde")]
        /// # {
        /// use vpath::{MemoryStore, StorageExtJson};
        ///
        /// let store = MemoryStore::new();
        /// store.write_json("/cfg.json", &serde_json::json!({"retries": 3}))?;
        /// let cfg: serde_json::Value = store.read_json("/cfg.json")?;
        /// assert_eq!(cfg["retries"], 3);
        /// # }
        /// # Ok::<(), vpath::FsError>(())
        /// ```
        fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FsError> {
            let data = self.read_bytes(path)?;
            serde_json::from_slice(&data).map_err(|e| FsError::Deserialization(e.to_string()))
        }

        /// Serialize a value and write it as JSON.
        ///
        /// Uses pretty-printing with 2-space indentation.
        ///
        /// # Errors
        ///
        /// - `FsError::Serialization` — JSON serialization failed
        /// - Other `FsError` variants from the underlying write
        fn write_json<T: Serialize>(&self, path: &str, value: &T) -> Result<(), FsError> {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| FsError::Serialization(e.to_string()))?;
            self.write_bytes(path, json.as_bytes())
        }
    }

    // Blanket implementation
    impl<S: Storage + ?Sized> StorageExtJson for S {}
}

#[cfg(feature = "serde")]
pub use json::StorageExtJson;
