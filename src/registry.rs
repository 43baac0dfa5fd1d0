//! Scheme registry: from a location string to a bound path handle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{FsError, LocalStore, MemoryStore, Params, ParsedUrl, Storage, VPath};

/// Builds a store from the location's folder and its parameters.
pub type Constructor<S> = Arc<dyn Fn(&str, &Params) -> Result<Arc<S>, FsError> + Send + Sync>;

type Loader<S> = Box<dyn Fn() -> Constructor<S> + Send + Sync>;

enum Driver<S: ?Sized> {
    Ready(Constructor<S>),
    Deferred {
        load: Loader<S>,
        loaded: OnceLock<Constructor<S>>,
    },
}

impl<S: ?Sized> Driver<S> {
    fn constructor(&self, scheme: &str) -> Constructor<S> {
        match self {
            Driver::Ready(ctor) => Arc::clone(ctor),
            Driver::Deferred { load, loaded } => Arc::clone(loaded.get_or_init(|| {
                tracing::debug!(scheme, "resolving deferred driver");
                load()
            })),
        }
    }
}

/// Maps URL schemes to store constructors.
///
/// A registry is an ordinary value: build one, register drivers, then open
/// locations through it. Drivers are either ready constructors or deferred
/// ones whose constructor is produced on first use and then cached.
///
/// `S` is the store interface handed out: `dyn Storage` for [`VPath`]
/// handles, `dyn AsyncStorage` for [`AsyncVPath`](crate::AsyncVPath) ones.
/// Each [`open`](Registry::open) builds a fresh store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vpath::{MemoryStore, Registry, Storage};
///
/// let mut registry = Registry::<dyn Storage>::with_builtins();
/// let shared = MemoryStore::new();
/// registry.register("shared", move |_, _| Ok(Arc::new(shared.clone()) as Arc<dyn Storage>));
///
/// let a = registry.open("shared://greeting.txt")?;
/// a.write_text("hi")?;
/// let b = registry.open("shared://greeting.txt")?;
/// assert_eq!(b.read_text()?, "hi");
///
/// assert!(registry.open("ftp://host/x").is_err());
/// # Ok::<(), vpath::FsError>(())
/// ```
pub struct Registry<S: ?Sized> {
    drivers: BTreeMap<String, Driver<S>>,
}

impl<S: ?Sized> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> Registry<S> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// Register a ready constructor for `scheme`, replacing any previous one.
    pub fn register<F>(&mut self, scheme: &str, ctor: F)
    where
        F: Fn(&str, &Params) -> Result<Arc<S>, FsError> + Send + Sync + 'static,
    {
        self.drivers
            .insert(scheme.to_ascii_lowercase(), Driver::Ready(Arc::new(ctor)));
    }

    /// Register a driver whose constructor is produced by `load` the first
    /// time `scheme` is opened.
    pub fn register_deferred<F>(&mut self, scheme: &str, load: F)
    where
        F: Fn() -> Constructor<S> + Send + Sync + 'static,
    {
        self.drivers.insert(
            scheme.to_ascii_lowercase(),
            Driver::Deferred {
                load: Box::new(load),
                loaded: OnceLock::new(),
            },
        );
    }

    /// Returns `true` if `scheme` has a driver.
    pub fn contains(&self, scheme: &str) -> bool {
        self.drivers.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    /// The constructor for `scheme`, resolving a deferred driver if needed.
    ///
    /// # Errors
    ///
    /// - [`FsError::UnknownScheme`] if nothing is registered for `scheme`
    pub fn constructor(&self, scheme: &str) -> Result<Constructor<S>, FsError> {
        let scheme = scheme.to_ascii_lowercase();
        self.drivers
            .get(&scheme)
            .map(|driver| driver.constructor(&scheme))
            .ok_or(FsError::UnknownScheme { scheme })
    }

    /// Parse `url` and build its store. Returns the store together with the
    /// parsed location.
    pub fn connect(&self, url: &str) -> Result<(Arc<S>, ParsedUrl), FsError> {
        let parsed = ParsedUrl::parse(url)?;
        let ctor = self.constructor(&parsed.scheme)?;
        let store = ctor(&parsed.folder, &parsed.params)?;
        tracing::debug!(url, scheme = %parsed.scheme, root = %parsed.folder, "store opened");
        Ok((store, parsed))
    }
}

impl<S: ?Sized> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The host directory for a `file` location; empty means the working
/// directory.
fn local_root(folder: &str) -> &str {
    if folder.is_empty() { "." } else { folder }
}

fn local_store(folder: &str, _: &Params) -> Result<Arc<dyn Storage>, FsError> {
    Ok(Arc::new(LocalStore::new(local_root(folder))))
}

fn memory_store(_: &str, _: &Params) -> Result<Arc<dyn Storage>, FsError> {
    Ok(Arc::new(MemoryStore::new()))
}

impl Registry<dyn Storage> {
    /// A registry with `file`, `mem` and `memory` registered as deferred
    /// drivers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_deferred("file", || -> Constructor<dyn Storage> {
            Arc::new(local_store)
        });
        for scheme in ["mem", "memory"] {
            registry.register_deferred(scheme, || -> Constructor<dyn Storage> {
                Arc::new(memory_store)
            });
        }
        registry
    }

    /// Open `url` as a [`VPath`] on a fresh store.
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidUrl`] if `url` cannot be parsed
    /// - [`FsError::UnknownScheme`] if no driver handles its scheme
    pub fn open(&self, url: &str) -> Result<VPath, FsError> {
        let (store, parsed) = self.connect(url)?;
        Ok(VPath::new(store, parsed.file))
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use std::sync::Arc;

    use super::{Constructor, Registry, local_root};
    use crate::{AsyncStorage, AsyncVPath, FsError, LocalStore, MemoryStore, Params};

    fn local_store(folder: &str, _: &Params) -> Result<Arc<dyn AsyncStorage>, FsError> {
        Ok(Arc::new(LocalStore::new(local_root(folder))))
    }

    fn memory_store(_: &str, _: &Params) -> Result<Arc<dyn AsyncStorage>, FsError> {
        Ok(Arc::new(MemoryStore::new()))
    }

    impl Registry<dyn AsyncStorage> {
        /// A registry with `file`, `mem` and `memory` registered as deferred
        /// drivers.
        pub fn with_builtins() -> Self {
            let mut registry = Self::new();
            registry.register_deferred("file", || -> Constructor<dyn AsyncStorage> {
                Arc::new(local_store)
            });
            for scheme in ["mem", "memory"] {
                registry.register_deferred(scheme, || -> Constructor<dyn AsyncStorage> {
                    Arc::new(memory_store)
                });
            }
            registry
        }

        /// Open `url` as an [`AsyncVPath`] on a fresh store.
        pub fn open(&self, url: &str) -> Result<AsyncVPath, FsError> {
            let (store, parsed) = self.connect(url)?;
            Ok(AsyncVPath::new(store, parsed.file))
        }
    }
}
