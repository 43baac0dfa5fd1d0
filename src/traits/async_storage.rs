//! The suspending storage capability.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{AsyncByteStream, EntryInfo, FsError, ListItem, MkdirOptions, OpenMode};

/// Lazy directory listing produced by [`AsyncStorage::list_dir`].
pub type ListDirStream<'a> = BoxStream<'a, Result<ListItem, FsError>>;

/// Suspending counterpart of [`Storage`](crate::Storage).
///
/// Every method has exactly the contract of its blocking twin; only the
/// execution model differs. Each call is one suspension point.
#[async_trait]
pub trait AsyncStorage: Send + Sync {
    /// See [`Storage::get_info`](crate::Storage::get_info).
    async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError>;

    /// See [`Storage::list_dir`](crate::Storage::list_dir).
    async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError>;

    /// See [`Storage::open`](crate::Storage::open).
    async fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn AsyncByteStream>, FsError>;

    /// See [`Storage::exists`](crate::Storage::exists).
    async fn exists(&self, path: &str) -> Result<bool, FsError>;

    /// See [`Storage::unlink`](crate::Storage::unlink).
    async fn unlink(&self, path: &str) -> Result<(), FsError>;

    /// See [`Storage::mkdir`](crate::Storage::mkdir).
    async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError>;

    /// See [`Storage::rename`](crate::Storage::rename).
    async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError>;
}

macro_rules! forward_async_storage {
    ($($ptr:ident),*) => {$(
        #[async_trait]
        impl<T: AsyncStorage + ?Sized> AsyncStorage for $ptr<T> {
            async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
                (**self).get_info(path).await
            }

            async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
                (**self).list_dir(path).await
            }

            async fn open(
                &self,
                path: &str,
                mode: OpenMode,
            ) -> Result<Box<dyn AsyncByteStream>, FsError> {
                (**self).open(path, mode).await
            }

            async fn exists(&self, path: &str) -> Result<bool, FsError> {
                (**self).exists(path).await
            }

            async fn unlink(&self, path: &str) -> Result<(), FsError> {
                (**self).unlink(path).await
            }

            async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
                (**self).mkdir(path, options).await
            }

            async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
                (**self).rename(src, dest).await
            }
        }
    )*};
}

forward_async_storage!(Arc, Box);
