//! Suspending text session.

use std::fmt;
use std::io::{self, SeekFrom};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::{AsyncByteStream, FsError, OpenMode};

use super::{
    ReaderState, TextOptions, WriterState, not_readable, not_writable, reader_for, writer_for,
};

/// Incrementally decoded text over an [`AsyncByteStream`].
///
/// Behaves exactly like [`TextIo`](crate::TextIo), with every stream call
/// awaited. A dropped session cannot flush, so always [`close`](Self::close)
/// it; buffered text left at drop time is lost and logged.
///
/// A cancelled operation leaves the session in an unspecified position;
/// close it rather than reuse it.
///
/// # Example
///
/// ```rust
/// use vpath::{AsyncStorage, AsyncTextIo, MemoryStore, OpenMode, TextOptions};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let store = MemoryStore::new();
/// let options = TextOptions::new();
///
/// let stream = store.open("/log.txt", OpenMode::WRITE).await?;
/// let mut out = AsyncTextIo::new(stream, OpenMode::WRITE, &options);
/// out.write("line\n").await?;
/// out.close().await?;
///
/// let stream = store.open("/log.txt", OpenMode::READ).await?;
/// let mut input = AsyncTextIo::new(stream, OpenMode::READ, &options);
/// assert_eq!(input.readline().await?, "line\n");
/// # Ok::<(), vpath::FsError>(())
/// # }).unwrap();
/// ```
pub struct AsyncTextIo {
    stream: Box<dyn AsyncByteStream>,
    path: String,
    reader: Option<ReaderState>,
    writer: Option<WriterState>,
    closed: bool,
}

impl AsyncTextIo {
    /// Wrap `stream`, opened with `mode`.
    pub fn new(stream: Box<dyn AsyncByteStream>, mode: OpenMode, options: &TextOptions) -> Self {
        Self {
            stream,
            path: String::new(),
            reader: reader_for(mode, options),
            writer: writer_for(mode, options),
            closed: false,
        }
    }

    /// Name the session after the path it was opened from; used in errors.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// The path given to [`with_path`](Self::with_path), if any.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the session was opened for reading.
    pub fn can_read(&self) -> bool {
        self.reader.is_some()
    }

    /// Whether the session was opened for writing.
    pub fn can_write(&self) -> bool {
        self.writer.is_some()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read up to `size` characters, or everything left when `None`.
    pub async fn read(&mut self, size: Option<usize>) -> Result<String, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        self.write_through().await?;
        let reader = self.reader.as_mut().ok_or_else(not_readable)?;
        let mut chunk = vec![0; reader.chunk_size];
        while reader.wants_chars(size) {
            let n = fill(self.stream.as_mut(), &mut chunk, &self.path).await?;
            reader.feed(&chunk[..n])?;
        }
        Ok(reader.take(size))
    }

    /// Read everything up to the end of the stream.
    pub async fn read_to_string(&mut self) -> Result<String, FsError> {
        self.read(None).await
    }

    /// Read one line including its `\n`; an empty string means end of stream.
    pub async fn readline(&mut self) -> Result<String, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        self.write_through().await?;
        let reader = self.reader.as_mut().ok_or_else(not_readable)?;
        let mut chunk = vec![0; reader.chunk_size];
        while reader.wants_line() {
            let n = fill(self.stream.as_mut(), &mut chunk, &self.path).await?;
            reader.feed(&chunk[..n])?;
        }
        Ok(reader.take_line())
    }

    /// Lines returned by [`readline`](Self::readline), oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.reader
            .iter()
            .flat_map(|reader| reader.history.iter().map(String::as_str))
    }

    /// Stream the remaining lines.
    ///
    /// # Errors
    ///
    /// - [`FsError::Mode`] at once if the session is write-only
    pub fn lines(&mut self) -> Result<BoxStream<'_, Result<String, FsError>>, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        Ok(stream::unfold(Some(self), |io| async move {
            let io = io?;
            match io.readline().await {
                Ok(line) if line.is_empty() => None,
                Ok(line) => Some((Ok(line), Some(io))),
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed())
    }

    /// Buffer `text`, writing through once the buffer threshold is reached.
    pub async fn write(&mut self, text: &str) -> Result<usize, FsError> {
        self.check_open()?;
        let writer = self.writer.as_mut().ok_or_else(not_writable)?;
        if writer.push(text)? {
            self.write_through().await?;
        }
        Ok(text.chars().count())
    }

    /// Write out everything buffered and flush the stream.
    pub async fn flush(&mut self) -> Result<(), FsError> {
        self.check_open()?;
        self.write_through().await?;
        self.stream
            .flush()
            .await
            .map_err(|e| FsError::io("flush", self.path.as_str(), e))
    }

    /// Flush, move the stream, and restart decoding at the new position.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        self.flush().await?;
        let offset = self
            .stream
            .seek(pos)
            .await
            .map_err(|e| FsError::io("seek", self.path.as_str(), e))?;
        if let Some(reader) = self.reader.as_mut() {
            reader.reset();
        }
        Ok(offset)
    }

    /// Flush, then cut or extend the stream. Returns the new length.
    pub async fn truncate(&mut self, size: Option<u64>) -> Result<u64, FsError> {
        self.check_open()?;
        if self.writer.is_none() {
            return Err(not_writable());
        }
        self.flush().await?;
        let len = self
            .stream
            .truncate(size)
            .await
            .map_err(|e| FsError::io("truncate", self.path.as_str(), e))?;
        if let Some(reader) = self.reader.as_mut() {
            reader.reset();
        }
        Ok(len)
    }

    /// Flush and close the stream. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<(), FsError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let written = self.write_through().await;
        let closed = self
            .stream
            .close()
            .await
            .map_err(|e| FsError::io("close", self.path.as_str(), e));
        written.and(closed)
    }

    fn check_open(&self) -> Result<(), FsError> {
        if self.closed {
            Err(FsError::Closed)
        } else {
            Ok(())
        }
    }

    async fn write_through(&mut self) -> Result<(), FsError> {
        let Some(bytes) = self.writer.as_mut().and_then(WriterState::drain) else {
            return Ok(());
        };
        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| FsError::io("write", self.path.as_str(), e))
    }
}

impl Drop for AsyncTextIo {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let lost = self.writer.as_ref().map_or(0, |w| w.pending.len());
        if lost > 0 {
            tracing::warn!(
                path = %self.path,
                bytes = lost,
                "text session dropped with unflushed text"
            );
        }
    }
}

impl fmt::Debug for AsyncTextIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTextIo")
            .field("path", &self.path)
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn fill(
    stream: &mut dyn AsyncByteStream,
    buf: &mut [u8],
    path: &str,
) -> Result<usize, FsError> {
    loop {
        match stream.read(buf).await {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FsError::io("read", path, e)),
        }
    }
}
