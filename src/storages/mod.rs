//! Leaf stores: the ones that actually hold bytes.
//!
//! | Store | Scheme | Backing |
//! |-------|--------|---------|
//! | [`LocalStore`] | `file` | host directory (`std::fs` / `tokio::fs`) |
//! | [`MemoryStore`] | `mem`, `memory` | shared in-process map |

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::{MemFile, MemoryStore};
