//! Core types exchanged across the storage contract.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::FsError;

/// Store constructor keyword arguments, usually taken from a URL query.
pub type Params = BTreeMap<String, String>;

/// Type of a storage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

/// Metadata for a single entry.
///
/// This is the only structured payload that crosses the [`Storage`](crate::Storage)
/// boundary. On the wire (with the `serde` feature) it is exactly
/// `{name, type, size, mtime}` and unknown fields are rejected.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct EntryInfo {
    /// Final path component (`"/"` for a root).
    pub name: String,
    /// File or directory.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: f64,
    /// Synthetic directory produced by a mount table, not by a real store.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub mount_point: bool,
}

impl EntryInfo {
    /// Describe a regular file.
    pub fn file(name: impl Into<String>, size: u64, mtime: f64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            mtime,
            mount_point: false,
        }
    }

    /// Describe a directory.
    pub fn dir(name: impl Into<String>, mtime: f64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
            size: 0,
            mtime,
            mount_point: false,
        }
    }

    /// Describe the synthetic directory standing for a mounted store.
    pub fn mount_point(name: impl Into<String>) -> Self {
        Self {
            mount_point: true,
            ..Self::dir(name, 0.0)
        }
    }

    /// Returns `true` if this is a regular file.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Returns `true` if this is a directory (mount points included).
    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Seconds since the Unix epoch, as stored in [`EntryInfo::mtime`].
pub fn unix_mtime(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Flags for opening a byte stream, parsed from mode tokens.
///
/// | Token | Meaning |
/// |-------|---------|
/// | `r` | read |
/// | `w` | write, create, truncate |
/// | `a` | write at end, create |
/// | `x` | write, fail if the entry exists |
/// | `+` | add the missing direction (read and write) |
/// | `b` | binary: no text session |
/// | `t` | text (the default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the entry if it doesn't exist.
    pub create: bool,
    /// Truncate the entry to zero length.
    pub truncate: bool,
    /// Writes go to the end of the entry.
    pub append: bool,
    /// Fail if the entry already exists.
    pub exclusive: bool,
    /// Return the raw byte stream instead of a text session.
    pub binary: bool,
}

impl OpenMode {
    /// Read-only access.
    pub const READ: Self = Self {
        read: true,
        write: false,
        create: false,
        truncate: false,
        append: false,
        exclusive: false,
        binary: false,
    };

    /// Write access with create and truncate.
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: true,
        append: false,
        exclusive: false,
        binary: false,
    };

    /// Append mode - writes go to end of the entry.
    pub const APPEND: Self = Self {
        read: false,
        write: true,
        create: true,
        truncate: false,
        append: true,
        exclusive: false,
        binary: false,
    };

    /// Read and write access on an existing entry.
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        create: false,
        truncate: false,
        append: false,
        exclusive: false,
        binary: false,
    };

    /// Parse a mode string such as `"r"`, `"wb"` or `"a+"`.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidMode`] for unknown tokens, repeated tokens, or
    ///   anything other than exactly one of `r`, `w`, `a`, `x`
    pub fn parse(mode: &str) -> Result<Self, FsError> {
        let invalid = || FsError::InvalidMode {
            mode: mode.to_string(),
        };
        let mut primary = None;
        let mut plus = false;
        let mut binary = false;
        let mut text = false;

        for token in mode.chars() {
            let slot = match token {
                'r' | 'w' | 'a' | 'x' => {
                    if primary.replace(token).is_some() {
                        return Err(invalid());
                    }
                    continue;
                }
                '+' => &mut plus,
                'b' => &mut binary,
                't' => &mut text,
                _ => return Err(invalid()),
            };
            if *slot {
                return Err(invalid());
            }
            *slot = true;
        }

        if binary && text {
            return Err(invalid());
        }

        let mut flags = match primary.ok_or_else(invalid)? {
            'r' => Self::READ,
            'w' => Self::WRITE,
            'a' => Self::APPEND,
            _ => Self {
                write: true,
                create: true,
                exclusive: true,
                ..Self::default()
            },
        };
        if plus {
            flags.read = true;
            flags.write = true;
        }
        flags.binary = binary;
        Ok(flags)
    }

    /// Same flags, binary stream.
    #[inline]
    pub const fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Any mode that may modify or create the entry.
    ///
    /// Overlays send these to their primary layer.
    #[inline]
    pub const fn is_write_like(&self) -> bool {
        self.write || self.append || self.exclusive || self.create
    }

    /// Returns `true` if the caller asked for a text session.
    #[inline]
    pub const fn is_text(&self) -> bool {
        !self.binary
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let primary = if self.exclusive {
            "x"
        } else if self.append {
            "a"
        } else if self.truncate {
            "w"
        } else if self.read {
            "r"
        } else {
            "w"
        };
        f.write_str(primary)?;
        if self.read && self.write {
            f.write_str("+")?;
        }
        if self.binary {
            f.write_str("b")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for OpenMode {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Options for [`Storage::mkdir`](crate::Storage::mkdir).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MkdirOptions {
    /// Permission bits for the new directory, where the store supports them.
    pub mode: u32,
    /// Create missing intermediate directories.
    pub parents: bool,
    /// Succeed if the directory already exists.
    pub exist_ok: bool,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            mode: 0o777,
            parents: false,
            exist_ok: false,
        }
    }
}

impl MkdirOptions {
    /// Default options: mode `0o777`, no parents, fail if present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set [`parents`](Self::parents).
    pub fn parents(mut self, parents: bool) -> Self {
        self.parents = parents;
        self
    }

    /// Set [`exist_ok`](Self::exist_ok).
    pub fn exist_ok(mut self, exist_ok: bool) -> Self {
        self.exist_ok = exist_ok;
        self
    }

    /// Set [`mode`](Self::mode).
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_equality() {
        assert_eq!(EntryKind::File, EntryKind::File);
        assert_ne!(EntryKind::File, EntryKind::Dir);
    }

    #[test]
    fn entry_info_constructors() {
        let f = EntryInfo::file("a.txt", 5, 1.5);
        assert!(f.is_file());
        assert!(!f.is_dir());
        assert_eq!(f.size, 5);

        let d = EntryInfo::dir("d", 0.0);
        assert!(d.is_dir());
        assert!(!d.mount_point);

        let m = EntryInfo::mount_point("a");
        assert!(m.is_dir());
        assert!(m.mount_point);
    }

    #[test]
    fn open_mode_tokens() {
        assert_eq!(OpenMode::parse("r").unwrap(), OpenMode::READ);
        assert_eq!(OpenMode::parse("w").unwrap(), OpenMode::WRITE);
        assert_eq!(OpenMode::parse("a").unwrap(), OpenMode::APPEND);
        assert_eq!(OpenMode::parse("rt").unwrap(), OpenMode::READ);

        let rb = OpenMode::parse("rb").unwrap();
        assert!(rb.read && rb.binary && !rb.write);

        let rplus = OpenMode::parse("r+").unwrap();
        assert!(rplus.read && rplus.write && !rplus.truncate && !rplus.create);

        let wplus = OpenMode::parse("w+b").unwrap();
        assert!(wplus.read && wplus.write && wplus.truncate && wplus.binary);

        let x = OpenMode::parse("x").unwrap();
        assert!(x.exclusive && x.write && !x.read);
    }

    #[test]
    fn open_mode_rejects_garbage() {
        for bad in ["", "b", "rw", "rr", "r++", "rbt", "q", "+"] {
            assert!(
                matches!(OpenMode::parse(bad), Err(FsError::InvalidMode { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn open_mode_write_like() {
        assert!(!OpenMode::READ.is_write_like());
        assert!(OpenMode::WRITE.is_write_like());
        assert!(OpenMode::APPEND.is_write_like());
        assert!(OpenMode::READ_WRITE.is_write_like());
        assert!(OpenMode::parse("x").unwrap().is_write_like());
    }

    #[test]
    fn open_mode_display_round_trips_tokens() {
        for mode in ["r", "w", "a", "x", "r+", "w+", "a+", "rb", "wb", "r+b"] {
            let parsed = OpenMode::parse(mode).unwrap();
            assert_eq!(OpenMode::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn mkdir_options_builder() {
        let opts = MkdirOptions::new().parents(true).exist_ok(true).mode(0o700);
        assert!(opts.parents);
        assert!(opts.exist_ok);
        assert_eq!(opts.mode, 0o700);
        assert_eq!(MkdirOptions::default().mode, 0o777);
    }

    #[test]
    fn unix_mtime_epoch_is_zero() {
        assert_eq!(unix_mtime(UNIX_EPOCH), 0.0);
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EntryKind>();
        assert_send_sync::<EntryInfo>();
        assert_send_sync::<OpenMode>();
        assert_send_sync::<MkdirOptions>();
    }

    #[cfg(feature = "serde")]
    #[test]
    fn entry_info_wire_shape() {
        let info = EntryInfo::file("a.txt", 3, 2.5);
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "a.txt", "type": "file", "size": 3, "mtime": 2.5})
        );

        let extra = serde_json::json!({
            "name": "a",
            "type": "dir",
            "size": 0,
            "mtime": 0.0,
            "owner": "x"
        });
        assert!(serde_json::from_value::<EntryInfo>(extra).is_err());
    }
}
