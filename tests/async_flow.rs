//! Integration tests for the suspending model.
//!
//! Mirrors `integration.rs` through [`AsyncStorage`] and [`AsyncVPath`]:
//! the same stacks must behave the same when every store call is awaited.

#![cfg(feature = "async")]

use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;

use vpath::{
    AsyncByteStream, AsyncStorage, AsyncVPath, Chroot, EntryInfo, ErrorKind, FsError,
    ListDirStream, LocalStore, MemoryStore, MkdirOptions, Mount, OpenMode, Overlay, Registry,
    TextOptions,
};

fn root(store: impl AsyncStorage + 'static) -> AsyncVPath {
    AsyncVPath::new(Arc::new(store), "/")
}

/// A layer whose every call fails.
struct Unreachable;

#[async_trait]
impl AsyncStorage for Unreachable {
    async fn get_info(&self, _: &str) -> Result<EntryInfo, FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn list_dir<'a>(&'a self, _: &str) -> Result<ListDirStream<'a>, FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn open(&self, _: &str, _: OpenMode) -> Result<Box<dyn AsyncByteStream>, FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn exists(&self, _: &str) -> Result<bool, FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn unlink(&self, _: &str) -> Result<(), FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn mkdir(&self, _: &str, _: MkdirOptions) -> Result<(), FsError> {
        Err(FsError::Backend("connection reset".into()))
    }

    async fn rename(&self, _: &str, _: &str) -> Result<(), FsError> {
        Err(FsError::Backend("connection reset".into()))
    }
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn chroot_rejects_escapes() {
    let store = MemoryStore::new();
    let jail = root(Chroot::rooted(store.clone(), "/jail"));

    (&jail / "in.txt").write_text("ok").await.unwrap();
    let outside = &jail / "../../etc/passwd";
    let err = outside.read_text().await.unwrap_err();
    assert!(matches!(err, FsError::OutsideBoundary { .. }));
    assert!(outside.write_text("x").await.is_err());
    assert!(matches!(outside.is_file().await, Err(FsError::OutsideBoundary { .. })));
    assert!(matches!(outside.is_dir().await, Err(FsError::OutsideBoundary { .. })));

    assert!(AsyncStorage::exists(&store, "/jail/in.txt").await.unwrap());
    assert!(!AsyncStorage::exists(&store, "/etc").await.unwrap());
}

#[tokio::test]
async fn overlay_shadows_and_unlinks_everywhere() {
    let lower = MemoryStore::new();
    let upper = MemoryStore::new();
    root(lower.clone()).join("f.txt").write_text("lower").await.unwrap();
    root(upper.clone()).join("f.txt").write_text("upper").await.unwrap();

    let mut overlay = Overlay::new();
    overlay.add_layer(lower.clone());
    overlay.add_layer(upper.clone());
    let view = root(overlay);

    let f = &view / "f.txt";
    assert_eq!(f.read_text().await.unwrap(), "upper");
    f.unlink().await.unwrap();
    assert!(!f.exists().await.unwrap());
    assert!(!AsyncStorage::exists(&lower, "/f.txt").await.unwrap());
    assert!(!AsyncStorage::exists(&upper, "/f.txt").await.unwrap());
}

#[tokio::test]
async fn overlay_skips_unreachable_layers() {
    let healthy = MemoryStore::new();
    root(healthy.clone()).join("a.txt").write_text("a").await.unwrap();

    let mut overlay: Overlay<Arc<dyn AsyncStorage>> = Overlay::new();
    overlay.add_layer(Arc::new(healthy));
    overlay.add_layer(Arc::new(Unreachable));
    let view = root(overlay);

    assert_eq!((&view / "a.txt").read_text().await.unwrap(), "a");

    // Nothing resolved and a layer failed: the failure wins over NotFound.
    let err = (&view / "missing").stat().await.unwrap_err();
    assert!(matches!(err, FsError::Backend(_)));
    assert_eq!(err.kind(), ErrorKind::Io);

    let names: Vec<String> = view
        .iterdir()
        .await
        .unwrap()
        .map_ok(|p| p.name().to_string())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(names, ["a.txt"]);
}

#[tokio::test]
async fn overlay_listing_ignores_layer_order_of_file_and_directory() {
    for file_on_top in [true, false] {
        let file_layer = MemoryStore::new();
        let dir_layer = MemoryStore::new();
        root(file_layer.clone()).join("d").write_text("file").await.unwrap();
        root(dir_layer.clone()).join("d/child").write_text("").await.unwrap();

        let mut overlay = Overlay::new();
        if file_on_top {
            overlay.add_layer(dir_layer);
            overlay.add_layer(file_layer);
        } else {
            overlay.add_layer(file_layer);
            overlay.add_layer(dir_layer);
        }

        let names: Vec<String> = root(overlay)
            .join("d")
            .iterdir()
            .await
            .unwrap()
            .map_ok(|p| p.name().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, ["child"], "file on top: {file_on_top}");
    }
}

#[tokio::test]
async fn mount_lists_mounts_and_refuses_cross_moves() {
    let mut mount = Mount::new();
    mount.mount("a", MemoryStore::new()).unwrap();
    mount.mount("b", MemoryStore::new()).unwrap();
    let top = root(mount);

    (&top / "a" / "x").write_text("x").await.unwrap();

    let children: Vec<AsyncVPath> = top.iterdir().await.unwrap().try_collect().await.unwrap();
    let names: Vec<&str> = children.iter().map(AsyncVPath::name).collect();
    assert_eq!(names, ["a", "b"]);
    for child in &children {
        assert!(child.is_dir().await.unwrap());
        assert!(child.stat().await.unwrap().mount_point);
    }

    let err = (&top / "a" / "x").rename("/b/y").await.unwrap_err();
    assert!(matches!(err, FsError::CrossMount { .. }));
    assert!((&top / "a" / "x").exists().await.unwrap());
    assert!(!(&top / "nowhere").exists().await.unwrap());
}

// =============================================================================
// Text sessions
// =============================================================================

#[tokio::test]
async fn round_trip_with_one_byte_chunks() {
    let file = root(MemoryStore::new()).join("multi.txt");
    let text = "€uro ✓ 𝄞\n".repeat(5);
    let tiny = TextOptions::new().with_chunk_size(1).with_buffer_size(2);

    file.write_text_with(&text, &tiny).await.unwrap();
    assert_eq!(file.read_text_with(&tiny).await.unwrap(), text);
}

#[tokio::test]
async fn history_and_line_stream() {
    let file = root(MemoryStore::new()).join("lines.txt");
    let body: String = (1..=5).map(|i| format!("{i}\n")).collect();
    file.write_text(&body).await.unwrap();

    let options = TextOptions::new().with_history_limit(2);
    let mut io = file.open_with("r", &options).await.unwrap().into_text().unwrap();
    for _ in 0..4 {
        io.readline().await.unwrap();
    }
    assert_eq!(io.history().collect::<Vec<_>>(), ["3\n", "4\n"]);

    let rest: Vec<String> = io.lines().unwrap().try_collect().await.unwrap();
    assert_eq!(rest, ["5\n"]);
    io.close().await.unwrap();
}

#[tokio::test]
async fn seek_restarts_decoding() {
    let file = root(MemoryStore::new()).join("seek.txt");
    file.write_text("aéb").await.unwrap();

    let options = TextOptions::new().with_chunk_size(2);
    let mut io = file.open_with("r", &options).await.unwrap().into_text().unwrap();
    assert_eq!(io.read(Some(1)).await.unwrap(), "a");
    io.seek(SeekFrom::Start(3)).await.unwrap();
    assert_eq!(io.read_to_string().await.unwrap(), "b");
    io.seek(SeekFrom::Start(1)).await.unwrap();
    assert_eq!(io.read_to_string().await.unwrap(), "éb");
    io.close().await.unwrap();
}

#[tokio::test]
async fn write_only_sessions_refuse_reads() {
    let file = root(MemoryStore::new()).join("w.txt");
    let mut io = file.open("w").await.unwrap().into_text().unwrap();
    assert!(matches!(io.read(None).await, Err(FsError::Mode { .. })));
    assert!(io.lines().is_err());
    io.write("done").await.unwrap();
    io.close().await.unwrap();
    assert!(matches!(io.flush().await, Err(FsError::Closed)));
    assert_eq!(file.read_text().await.unwrap(), "done");
}

#[tokio::test]
async fn binary_streams_are_raw() {
    let file = root(MemoryStore::new()).join("raw.bin");
    file.write_bytes(&[1, 2, 3, 4]).await.unwrap();

    let mut stream = file.open("rb").await.unwrap().into_binary().unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    stream.close().await.unwrap();
    assert_eq!(buf, [1, 2, 3, 4]);
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn memory_url_end_to_end() {
    let registry = Registry::<dyn AsyncStorage>::with_builtins();

    let x = registry.open("mem://x.txt").unwrap();
    x.write_text("hello").await.unwrap();
    assert!(x.exists().await.unwrap());
    assert_eq!(x.read_text().await.unwrap(), "hello");

    let dir = registry.open("mem://dir").unwrap();
    dir.mkdir(MkdirOptions::new().parents(true)).await.unwrap();
    assert!(dir.exists().await.unwrap());
    dir.unlink().await.unwrap();
    assert!(!dir.exists().await.unwrap());
}

#[tokio::test]
async fn local_read_write_open_creates_no_parents() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());

    let err = AsyncStorage::open(&store, "/missing_dir/f.txt", OpenMode::READ_WRITE)
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
    assert!(!dir.path().join("missing_dir").exists());
}

#[tokio::test]
async fn file_url_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::<dyn AsyncStorage>::with_builtins();

    let url = format!("{}/out/data.txt", dir.path().display());
    let out = registry.open(&url).unwrap();
    out.write_text("on disk").await.unwrap();

    let on_disk = tokio::fs::read_to_string(dir.path().join("out/data.txt")).await.unwrap();
    assert_eq!(on_disk, "on disk");

    let listing: Vec<AsyncVPath> = registry
        .open(&format!("{}/", dir.path().display()))
        .unwrap()
        .iterdir()
        .await
        .unwrap()
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name(), "out");
}
