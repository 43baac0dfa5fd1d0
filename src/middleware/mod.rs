//! # Middleware Stores
//!
//! Stores that wrap other stores and add virtual semantics on top of them.
//!
//! | Store | Owns | Adds |
//! |-------|------|------|
//! | [`Wrap`] | one store | path rewriting through a [`PathMap`] (identity by default) |
//! | [`Chroot`] | one store | confinement to a sub-tree |
//! | [`Mount`] | a [`MountTable`] | routing by first path segment |
//! | [`Overlay`] | a [`LayerStack`] | priority-ordered union |
//!
//! Each middleware is generic over its children and implements
//! [`Storage`](crate::Storage) (and [`AsyncStorage`](crate::AsyncStorage)
//! with the `async` feature) whenever its children do. The routing and
//! containment decisions live in plain types ([`ChrootBoundary`],
//! [`MountTable`], [`LayerStack`]) shared by both execution models.
//!
//! Middleware performs no locking. Configure mounts and layers before the
//! first traversal and serialize concurrent mutations yourself.

mod chroot;
mod mount;
mod overlay;
mod wrap;

pub use chroot::{Chroot, ChrootBoundary};
pub use mount::{Mount, MountTable, Route};
pub use overlay::{LayerStack, Overlay};
pub use wrap::{Identity, PathMap, Wrap};
