//! Priority-ordered union of stores.
//!
//! ## Policy
//!
//! | Operation | Target |
//! |-----------|--------|
//! | `get_info`, `open` for read | first layer whose `exists` is true |
//! | `list_dir` | union of every layer that has the directory, first name wins |
//! | `open` for write/append/exclusive/read-write | primary layer |
//! | `mkdir`, `rename` | primary layer |
//! | `unlink` | every layer that has the entry |
//!
//! Writes never copy an entry up from a lower layer, while deletes reach
//! all of them; that asymmetry keeps a deleted entry from resurfacing out of
//! a lower layer.
//!
//! ## Failing layers
//!
//! A backend error from one layer's `exists` check marks that layer as
//! unusable for the current call and the scan continues with the next one.
//! If no layer resolves the path, the first such error is returned instead
//! of `NotFound`, so a broken layer is never reported as a missing entry.
//! Once a layer has been chosen as authoritative, its errors are returned
//! as they are.
//!
//! `list_dir` has no single authoritative layer. A layer whose listing
//! fails, for example because it holds a file where another layer holds
//! the directory, is skipped whatever its position. The call fails only
//! when no layer produced a listing, with the first error seen.

use std::collections::HashSet;

use crate::{ByteStream, EntryInfo, FsError, ListDir, ListItem, MkdirOptions, OpenMode, Storage};

/// Ordered layers, index 0 being the primary (highest priority) layer.
#[derive(Debug, Clone)]
pub struct LayerStack<S> {
    layers: Vec<S>,
}

impl<S> Default for LayerStack<S> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<S> LayerStack<S> {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `layer` on top; it becomes the primary layer.
    pub fn push_top(&mut self, layer: S) {
        self.layers.insert(0, layer);
    }

    /// The layer that receives all writes.
    ///
    /// # Errors
    ///
    /// - [`FsError::NoLayers`] if the stack is empty
    pub fn primary(&self) -> Result<&S, FsError> {
        self.layers.first().ok_or(FsError::NoLayers)
    }

    /// Layers from highest to lowest priority.
    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.layers.iter()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer was added yet.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Bookkeeping for one scan over the layers.
#[derive(Debug, Default)]
struct Scan {
    first_error: Option<FsError>,
}

impl Scan {
    fn skip(&mut self, layer: usize, operation: &'static str, path: &str, error: FsError) {
        tracing::warn!(layer, operation, path, %error, "overlay layer skipped");
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    /// The error to report when no layer resolved `path`.
    fn miss(self, path: &str) -> FsError {
        self.first_error.unwrap_or_else(|| FsError::NotFound {
            path: path.to_string(),
        })
    }

    /// Outcome of a best-effort pass that may have hit some layers.
    fn finish(self, path: &str, hit: bool) -> Result<(), FsError> {
        if hit { Ok(()) } else { Err(self.miss(path)) }
    }
}

/// Drop repeated names, keeping the first (highest priority) occurrence.
fn first_name_wins() -> impl FnMut(&Result<ListItem, FsError>) -> bool + Send {
    let mut seen = HashSet::new();
    move |item| match item {
        Ok((name, _)) => seen.insert(name.clone()),
        Err(_) => true,
    }
}

/// A union view over several stores.
///
/// See the [module documentation](self) for which layer each operation
/// touches. `Overlay<Arc<dyn Storage>>` mixes store types.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use vpath::{ByteStream, MemoryStore, OpenMode, Overlay, Storage};
///
/// let base = MemoryStore::new();
/// let mut stream = base.open("/defaults.toml", OpenMode::WRITE).unwrap();
/// stream.write_all(b"debug = false").unwrap();
/// stream.close().unwrap();
///
/// let scratch = MemoryStore::new();
/// let mut overlay = Overlay::new();
/// overlay.add_layer(base.clone());
/// overlay.add_layer(scratch.clone());
///
/// assert!(overlay.exists("/defaults.toml").unwrap());
/// overlay.open("/new.txt", OpenMode::WRITE).unwrap().close().unwrap();
/// assert!(scratch.exists("/new.txt").unwrap());
/// assert!(!base.exists("/new.txt").unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Overlay<S> {
    stack: LayerStack<S>,
}

impl<S> Default for Overlay<S> {
    fn default() -> Self {
        Self {
            stack: LayerStack::new(),
        }
    }
}

impl<S> Overlay<S> {
    /// An overlay with no layers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `layer` on top of the existing ones. The newest layer wins.
    pub fn add_layer(&mut self, layer: S) {
        self.stack.push_top(layer);
    }

    /// The layer that receives writes, `mkdir` and `rename`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NoLayers`] if no layer was added
    pub fn primary(&self) -> Result<&S, FsError> {
        self.stack.primary()
    }

    /// The layer stack.
    pub fn layers(&self) -> &LayerStack<S> {
        &self.stack
    }
}

impl<S: Storage> Overlay<S> {
    /// First layer that has `path`.
    fn locate(&self, path: &str) -> Result<&S, FsError> {
        let mut scan = Scan::default();
        for (index, layer) in self.stack.iter().enumerate() {
            match layer.exists(path) {
                Ok(true) => {
                    tracing::debug!(layer = index, path, "overlay resolved");
                    return Ok(layer);
                }
                Ok(false) => {}
                Err(e) => scan.skip(index, "exists", path, e),
            }
        }
        Err(scan.miss(path))
    }
}

impl<S: Storage> Storage for Overlay<S> {
    fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
        self.locate(path)?.get_info(path)
    }

    fn list_dir<'a>(&'a self, path: &str) -> Result<ListDir<'a>, FsError> {
        let mut scan = Scan::default();
        let mut listings = Vec::new();
        for (index, layer) in self.stack.iter().enumerate() {
            match layer.exists(path) {
                Ok(true) => match layer.list_dir(path) {
                    Ok(listing) => listings.push(listing),
                    Err(e) => scan.skip(index, "list_dir", path, e),
                },
                Ok(false) => {}
                Err(e) => scan.skip(index, "exists", path, e),
            }
        }
        if listings.is_empty() {
            return Err(scan.miss(path));
        }
        tracing::debug!(path, layers = listings.len(), "overlay listing");
        Ok(ListDir::new(
            listings.into_iter().flatten().filter(first_name_wins()),
        ))
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
        if mode.is_write_like() {
            tracing::debug!(path, %mode, "overlay write to primary layer");
            return self.primary()?.open(path, mode);
        }
        self.locate(path)?.open(path, mode)
    }

    fn exists(&self, path: &str) -> Result<bool, FsError> {
        let mut scan = Scan::default();
        for (index, layer) in self.stack.iter().enumerate() {
            match layer.exists(path) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => scan.skip(index, "exists", path, e),
            }
        }
        match scan.first_error {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    fn unlink(&self, path: &str) -> Result<(), FsError> {
        let mut scan = Scan::default();
        let mut removed = false;
        for (index, layer) in self.stack.iter().enumerate() {
            match layer.exists(path) {
                Ok(true) => match layer.unlink(path) {
                    Ok(()) => {
                        tracing::debug!(layer = index, path, "overlay removed");
                        removed = true;
                    }
                    Err(e) => scan.skip(index, "unlink", path, e),
                },
                Ok(false) => {}
                Err(e) => scan.skip(index, "exists", path, e),
            }
        }
        scan.finish(path, removed)
    }

    fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
        self.primary()?.mkdir(path, options)
    }

    fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
        self.primary()?.rename(src, dest)
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use async_trait::async_trait;
    use futures::StreamExt;

    use super::{Overlay, Scan, first_name_wins};
    use crate::{
        AsyncByteStream, AsyncStorage, EntryInfo, FsError, ListDirStream, MkdirOptions, OpenMode,
    };

    impl<S: AsyncStorage> Overlay<S> {
        async fn locate_async(&self, path: &str) -> Result<&S, FsError> {
            let mut scan = Scan::default();
            for (index, layer) in self.stack.iter().enumerate() {
                match layer.exists(path).await {
                    Ok(true) => {
                        tracing::debug!(layer = index, path, "overlay resolved");
                        return Ok(layer);
                    }
                    Ok(false) => {}
                    Err(e) => scan.skip(index, "exists", path, e),
                }
            }
            Err(scan.miss(path))
        }
    }

    #[async_trait]
    impl<S: AsyncStorage> AsyncStorage for Overlay<S> {
        async fn get_info(&self, path: &str) -> Result<EntryInfo, FsError> {
            self.locate_async(path).await?.get_info(path).await
        }

        async fn list_dir<'a>(&'a self, path: &str) -> Result<ListDirStream<'a>, FsError> {
            let mut scan = Scan::default();
            let mut listings = Vec::new();
            for (index, layer) in self.stack.iter().enumerate() {
                match layer.exists(path).await {
                    Ok(true) => match layer.list_dir(path).await {
                        Ok(listing) => listings.push(listing),
                        Err(e) => scan.skip(index, "list_dir", path, e),
                    },
                    Ok(false) => {}
                    Err(e) => scan.skip(index, "exists", path, e),
                }
            }
            if listings.is_empty() {
                return Err(scan.miss(path));
            }
            tracing::debug!(path, layers = listings.len(), "overlay listing");
            let mut keep = first_name_wins();
            Ok(futures::stream::iter(listings)
                .flatten()
                .filter(move |item| futures::future::ready(keep(item)))
                .boxed())
        }

        async fn open(
            &self,
            path: &str,
            mode: OpenMode,
        ) -> Result<Box<dyn AsyncByteStream>, FsError> {
            if mode.is_write_like() {
                tracing::debug!(path, %mode, "overlay write to primary layer");
                return self.primary()?.open(path, mode).await;
            }
            self.locate_async(path).await?.open(path, mode).await
        }

        async fn exists(&self, path: &str) -> Result<bool, FsError> {
            let mut scan = Scan::default();
            for (index, layer) in self.stack.iter().enumerate() {
                match layer.exists(path).await {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(e) => scan.skip(index, "exists", path, e),
                }
            }
            match scan.first_error {
                Some(e) => Err(e),
                None => Ok(false),
            }
        }

        async fn unlink(&self, path: &str) -> Result<(), FsError> {
            let mut scan = Scan::default();
            let mut removed = false;
            for (index, layer) in self.stack.iter().enumerate() {
                match layer.exists(path).await {
                    Ok(true) => match layer.unlink(path).await {
                        Ok(()) => {
                            tracing::debug!(layer = index, path, "overlay removed");
                            removed = true;
                        }
                        Err(e) => scan.skip(index, "unlink", path, e),
                    },
                    Ok(false) => {}
                    Err(e) => scan.skip(index, "exists", path, e),
                }
            }
            scan.finish(path, removed)
        }

        async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<(), FsError> {
            self.primary()?.mkdir(path, options).await
        }

        async fn rename(&self, src: &str, dest: &str) -> Result<(), FsError> {
            self.primary()?.rename(src, dest).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, MemoryStore};
    use std::io::{Read, Write};
    use std::sync::Arc;

    /// Every call fails the way an unreachable backend would.
    struct Broken;

    fn offline() -> FsError {
        FsError::Backend("layer offline".into())
    }

    impl Storage for Broken {
        fn get_info(&self, _: &str) -> Result<EntryInfo, FsError> {
            Err(offline())
        }
        fn list_dir<'a>(&'a self, _: &str) -> Result<ListDir<'a>, FsError> {
            Err(offline())
        }
        fn open(&self, _: &str, _: OpenMode) -> Result<Box<dyn ByteStream>, FsError> {
            Err(offline())
        }
        fn exists(&self, _: &str) -> Result<bool, FsError> {
            Err(offline())
        }
        fn unlink(&self, _: &str) -> Result<(), FsError> {
            Err(offline())
        }
        fn mkdir(&self, _: &str, _: MkdirOptions) -> Result<(), FsError> {
            Err(offline())
        }
        fn rename(&self, _: &str, _: &str) -> Result<(), FsError> {
            Err(offline())
        }
    }

    fn write(store: &dyn Storage, path: &str, data: &[u8]) {
        let mut stream = store.open(path, OpenMode::WRITE).unwrap();
        stream.write_all(data).unwrap();
        stream.close().unwrap();
    }

    fn read(store: &dyn Storage, path: &str) -> String {
        let mut text = String::new();
        store
            .open(path, OpenMode::READ)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    /// `(top, bottom, overlay)` with `top` as primary.
    fn two_layers() -> (MemoryStore, MemoryStore, Overlay<MemoryStore>) {
        let top = MemoryStore::new();
        let bottom = MemoryStore::new();
        let mut overlay = Overlay::new();
        overlay.add_layer(bottom.clone());
        overlay.add_layer(top.clone());
        (top, bottom, overlay)
    }

    #[test]
    fn newest_layer_is_primary() {
        let (top, _, overlay) = two_layers();
        write(overlay.primary().unwrap(), "/marker", b"");
        assert!(top.exists("/marker").unwrap());
        assert_eq!(overlay.layers().len(), 2);
    }

    #[test]
    fn top_layer_shadows_lower_ones() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/f", b"top");
        write(&bottom, "/f", b"bottom!");

        assert_eq!(overlay.get_info("/f").unwrap().size, 3);
        assert_eq!(read(&overlay, "/f"), "top");
    }

    #[test]
    fn reads_fall_through_to_lower_layers() {
        let (_, bottom, overlay) = two_layers();
        write(&bottom, "/only-below", b"below");
        assert!(overlay.exists("/only-below").unwrap());
        assert_eq!(read(&overlay, "/only-below"), "below");
        assert!(overlay.get_info("/nowhere").unwrap_err().is_not_found());
    }

    #[test]
    fn listing_is_a_deduplicated_union() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/d/a", b"1");
        write(&top, "/d/shared", b"top");
        write(&bottom, "/d/b", b"2");
        write(&bottom, "/d/shared", b"bottom!");

        let mut items = overlay.list_dir("/d").unwrap().collect_all().unwrap();
        items.sort_by(|x, y| x.0.cmp(&y.0));
        let names: Vec<_> = items.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "b", "shared"]);
        assert_eq!(items[2].1.as_ref().unwrap().size, 3);
    }

    #[test]
    fn listing_a_missing_directory_fails() {
        let (_, _, overlay) = two_layers();
        assert!(matches!(
            overlay.list_dir("/nope"),
            Err(FsError::NotFound { .. })
        ));
    }

    #[test]
    fn writes_target_primary_without_copy_up() {
        let (top, bottom, overlay) = two_layers();
        write(&bottom, "/cfg", b"old");
        write(&overlay, "/cfg", b"new");

        assert_eq!(read(&top, "/cfg"), "new");
        assert_eq!(read(&bottom, "/cfg"), "old");

        let append = OpenMode::APPEND;
        let mut stream = overlay.open("/log", append).unwrap();
        stream.write_all(b"x").unwrap();
        stream.close().unwrap();
        assert!(top.exists("/log").unwrap());
        assert!(!bottom.exists("/log").unwrap());
    }

    #[test]
    fn mkdir_and_rename_act_on_primary_only() {
        let (top, bottom, overlay) = two_layers();
        overlay.mkdir("/d", MkdirOptions::new()).unwrap();
        assert!(top.exists("/d").unwrap());
        assert!(!bottom.exists("/d").unwrap());

        write(&bottom, "/below.txt", b"1");
        assert!(overlay.rename("/below.txt", "/moved.txt").unwrap_err().is_not_found());
        assert!(bottom.exists("/below.txt").unwrap());

        write(&top, "/above.txt", b"1");
        overlay.rename("/above.txt", "/moved.txt").unwrap();
        assert!(top.exists("/moved.txt").unwrap());
    }

    #[test]
    fn unlink_removes_from_every_layer() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/f", b"top");
        write(&bottom, "/f", b"bottom");

        overlay.unlink("/f").unwrap();
        assert!(!top.exists("/f").unwrap());
        assert!(!bottom.exists("/f").unwrap());
        assert!(!overlay.exists("/f").unwrap());
        assert!(matches!(overlay.unlink("/f"), Err(FsError::NotFound { .. })));
    }

    #[test]
    fn empty_stack() {
        let overlay: Overlay<MemoryStore> = Overlay::new();
        assert!(matches!(overlay.primary(), Err(FsError::NoLayers)));
        let err = overlay.open("/f", OpenMode::WRITE).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(
            overlay.mkdir("/d", MkdirOptions::new()),
            Err(FsError::NoLayers)
        ));
        assert!(!overlay.exists("/f").unwrap());
        assert!(overlay.get_info("/f").unwrap_err().is_not_found());
    }

    fn broken_on_top() -> (MemoryStore, Overlay<Arc<dyn Storage>>) {
        let healthy = MemoryStore::new();
        let mut overlay: Overlay<Arc<dyn Storage>> = Overlay::new();
        overlay.add_layer(Arc::new(healthy.clone()));
        overlay.add_layer(Arc::new(Broken));
        (healthy, overlay)
    }

    #[test]
    fn failing_layer_is_skipped_for_reads() {
        let (healthy, overlay) = broken_on_top();
        write(&healthy, "/d/f", b"data");

        assert!(overlay.exists("/d/f").unwrap());
        assert_eq!(overlay.get_info("/d/f").unwrap().size, 4);
        assert_eq!(read(&overlay, "/d/f"), "data");
        let names: Vec<_> = overlay
            .list_dir("/d")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(names, ["f"]);
    }

    #[test]
    fn failing_layer_is_not_reported_as_missing() {
        let (_, overlay) = broken_on_top();
        let err = overlay.get_info("/absent").unwrap_err();
        assert!(matches!(err, FsError::Backend(_)));
        assert!(matches!(overlay.exists("/absent"), Err(FsError::Backend(_))));
        assert!(matches!(overlay.list_dir("/absent"), Err(FsError::Backend(_))));
    }

    #[test]
    fn unlink_is_best_effort_across_failing_layers() {
        let (healthy, overlay) = broken_on_top();
        write(&healthy, "/f", b"x");

        overlay.unlink("/f").unwrap();
        assert!(!healthy.exists("/f").unwrap());

        let err = overlay.unlink("/f").unwrap_err();
        assert!(matches!(err, FsError::Backend(_)));
    }

    #[test]
    fn listing_skips_a_file_on_top_of_a_directory() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/d", b"file");
        write(&bottom, "/d/child", b"");

        let names: Vec<_> = overlay
            .list_dir("/d")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(names, ["child"]);
    }

    #[test]
    fn listing_skips_a_file_below_a_directory() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/d/child", b"");
        write(&bottom, "/d", b"file");

        let names: Vec<_> = overlay
            .list_dir("/d")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(names, ["child"]);
    }

    #[test]
    fn listing_fails_with_the_first_error_when_no_layer_lists() {
        let (top, bottom, overlay) = two_layers();
        write(&top, "/d", b"top");
        write(&bottom, "/d", b"bottom");
        assert!(matches!(
            overlay.list_dir("/d"),
            Err(FsError::NotADirectory { .. })
        ));

        let (healthy, broken) = broken_on_top();
        write(&healthy, "/f", b"");
        assert!(matches!(broken.list_dir("/f"), Err(FsError::Backend(_))));
    }

    #[test]
    fn writes_to_a_failing_primary_fail() {
        let (healthy, overlay) = broken_on_top();
        assert!(overlay.open("/f", OpenMode::WRITE).is_err());
        assert!(!healthy.exists("/f").unwrap());
    }
}
