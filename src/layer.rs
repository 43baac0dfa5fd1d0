//! # Layer Trait
//!
//! Tower-style composition for stores.
//!
//! ## Overview
//!
//! The [`Layer`] trait separates middleware configuration from wrapping: a
//! layer value holds the configuration, and [`Layer::layer`] consumes it
//! together with a store to produce the wrapped store.
//!
//! ```text
//! Store ──▶ Layer::layer() ──▶ Wrapped Store
//! ```
//!
//! | Layer | Produces |
//! |-------|----------|
//! | [`ChrootLayer`] | [`Chroot<S>`](crate::Chroot) |
//! | [`WrapLayer`] | [`Wrap<S, M>`](crate::Wrap) |
//!
//! ## Fluent Composition
//!
//! Use [`LayerExt`] for fluent chaining:
//!
//! ```rust
//! use vpath::{ChrootLayer, LayerExt, MemoryStore, MkdirOptions, Storage, WrapLayer};
//!
//! let store = MemoryStore::new();
//! let jailed = store
//!     .clone()
//!     .layer(ChrootLayer::new("/tenants/a"))
//!     .layer(WrapLayer::new());
//!
//! jailed.mkdir("/inbox", MkdirOptions::new().parents(true))?;
//! assert!(store.exists("/tenants/a/inbox")?);
//! # Ok::<(), vpath::FsError>(())
//! ```

use crate::{Chroot, Identity, PathMap, Storage, Wrap};

/// A layer that wraps a store to add functionality.
///
/// # Design Notes
///
/// - `layer(self, store)` consumes both the layer and the store
/// - The resulting `Store` should implement [`Storage`] whenever `S` does
/// - Layers that also work for [`AsyncStorage`](crate::AsyncStorage) leave
///   `S` unbounded, as the built-in ones do
///
/// # Example
///
/// ```rust
/// use vpath::Layer;
///
/// struct Audited<S> {
///     inner: S,
///     tag: &'static str,
/// }
///
/// struct AuditLayer(&'static str);
///
/// impl<S> Layer<S> for AuditLayer {
///     type Store = Audited<S>;
///
///     fn layer(self, store: S) -> Self::Store {
///         Audited { inner: store, tag: self.0 }
///     }
/// }
/// ```
pub trait Layer<S> {
    /// The store produced by this layer.
    type Store;

    /// Wrap `store` with this layer's functionality.
    fn layer(self, store: S) -> Self::Store;
}

/// Extension trait for fluent layer composition.
///
/// Provides `.layer()` on any sized [`Storage`].
pub trait LayerExt: Storage + Sized {
    /// Apply a layer to this store.
    fn layer<L: Layer<Self>>(self, layer: L) -> L::Store {
        layer.layer(self)
    }
}

impl<S: Storage> LayerExt for S {}

/// Confines the wrapped store to a sub-tree.
#[derive(Debug, Clone)]
pub struct ChrootLayer {
    base: String,
}

impl ChrootLayer {
    /// Layer that roots stores at `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl<S> Layer<S> for ChrootLayer {
    type Store = Chroot<S>;

    fn layer(self, store: S) -> Self::Store {
        Chroot::rooted(store, &self.base)
    }
}

/// Wraps the store in a [`Wrap`] with the given [`PathMap`].
#[derive(Debug, Clone, Default)]
pub struct WrapLayer<M = Identity> {
    map: M,
}

impl WrapLayer {
    /// Pass-through layer.
    pub fn new() -> Self {
        Self { map: Identity }
    }
}

impl<M: PathMap> WrapLayer<M> {
    /// Layer that rewrites paths with `map`.
    pub fn with_map(map: M) -> Self {
        Self { map }
    }
}

impl<S, M: PathMap> Layer<S> for WrapLayer<M> {
    type Store = Wrap<S, M>;

    fn layer(self, store: S) -> Self::Store {
        Wrap::with_map(store, self.map)
    }
}
