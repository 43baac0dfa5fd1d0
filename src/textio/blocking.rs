//! Blocking text session.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::{ByteStream, FsError, OpenMode};

use super::{
    ReaderState, TextOptions, WriterState, not_readable, not_writable, reader_for, writer_for,
};

/// Incrementally decoded text over a [`ByteStream`].
///
/// Created by [`VPath::open`](crate::VPath::open) for modes without `b`, or
/// directly around any byte stream.
///
/// Mixing reads and writes without a [`seek`](Self::seek) in between writes
/// at the stream position, which is past any read-ahead.
///
/// The session closes itself on drop; errors at that point are logged since
/// they cannot be returned. Call [`close`](Self::close) to observe them.
///
/// # Example
///
/// ```rust
/// use vpath::{MemoryStore, OpenMode, Storage, TextIo, TextOptions};
///
/// let store = MemoryStore::new();
/// let options = TextOptions::new();
///
/// let stream = store.open("/notes.txt", OpenMode::WRITE)?;
/// let mut out = TextIo::new(stream, OpenMode::WRITE, &options);
/// out.write("first\nsecond\n")?;
/// out.close()?;
///
/// let stream = store.open("/notes.txt", OpenMode::READ)?;
/// let mut input = TextIo::new(stream, OpenMode::READ, &options);
/// assert_eq!(input.readline()?, "first\n");
/// assert_eq!(input.read_to_string()?, "second\n");
/// # Ok::<(), vpath::FsError>(())
/// ```
pub struct TextIo {
    stream: Box<dyn ByteStream>,
    path: String,
    reader: Option<ReaderState>,
    writer: Option<WriterState>,
    closed: bool,
}

impl TextIo {
    /// Wrap `stream`, opened with `mode`.
    pub fn new(stream: Box<dyn ByteStream>, mode: OpenMode, options: &TextOptions) -> Self {
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
    ///
    /// Returns fewer characters only at end of stream.
    ///
    /// # Errors
    ///
    /// - [`FsError::Mode`] if the session is write-only
    /// - [`FsError::Decode`] on malformed input or a truncated final sequence
    pub fn read(&mut self, size: Option<usize>) -> Result<String, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        self.write_through()?;
        let reader = self.reader.as_mut().ok_or_else(not_readable)?;
        let mut chunk = vec![0; reader.chunk_size];
        while reader.wants_chars(size) {
            let n = fill(self.stream.as_mut(), &mut chunk, &self.path)?;
            reader.feed(&chunk[..n])?;
        }
        Ok(reader.take(size))
    }

    /// Read everything up to the end of the stream.
    pub fn read_to_string(&mut self) -> Result<String, FsError> {
        self.read(None)
    }

    /// Read one line including its `\n`; the last line may lack it, and an
    /// empty string means end of stream.
    ///
    /// Every non-empty line is remembered in [`history`](Self::history).
    pub fn readline(&mut self) -> Result<String, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        self.write_through()?;
        let reader = self.reader.as_mut().ok_or_else(not_readable)?;
        let mut chunk = vec![0; reader.chunk_size];
        while reader.wants_line() {
            let n = fill(self.stream.as_mut(), &mut chunk, &self.path)?;
            reader.feed(&chunk[..n])?;
        }
        Ok(reader.take_line())
    }

    /// Lines returned by [`readline`](Self::readline), oldest first, bounded
    /// by [`TextOptions::history_limit`].
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.reader
            .iter()
            .flat_map(|reader| reader.history.iter().map(String::as_str))
    }

    /// Iterate over the remaining lines.
    ///
    /// # Errors
    ///
    /// - [`FsError::Mode`] at once if the session is write-only
    pub fn lines(&mut self) -> Result<Lines<'_>, FsError> {
        self.check_open()?;
        if self.reader.is_none() {
            return Err(not_readable());
        }
        Ok(Lines {
            io: self,
            done: false,
        })
    }

    /// Buffer `text`, writing through once the buffer threshold is reached.
    /// Returns the number of characters accepted.
    ///
    /// # Errors
    ///
    /// - [`FsError::Mode`] if the session is read-only
    /// - [`FsError::Encode`] if `text` cannot be represented; nothing is buffered
    pub fn write(&mut self, text: &str) -> Result<usize, FsError> {
        self.check_open()?;
        let writer = self.writer.as_mut().ok_or_else(not_writable)?;
        if writer.push(text)? {
            self.write_through()?;
        }
        Ok(text.chars().count())
    }

    /// Write out everything buffered and flush the stream.
    pub fn flush(&mut self) -> Result<(), FsError> {
        self.check_open()?;
        self.write_through()?;
        self.stream
            .flush()
            .map_err(|e| FsError::io("flush", self.path.as_str(), e))
    }

    /// Flush, move the stream, and restart decoding at the new position.
    /// Returns the new byte offset.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        self.flush()?;
        let offset = self
            .stream
            .seek(pos)
            .map_err(|e| FsError::io("seek", self.path.as_str(), e))?;
        if let Some(reader) = self.reader.as_mut() {
            reader.reset();
        }
        Ok(offset)
    }

    /// Flush, then cut or extend the stream to `size` bytes (the current
    /// position when `None`). Returns the new length.
    ///
    /// # Errors
    ///
    /// - [`FsError::Mode`] if the session is read-only
    pub fn truncate(&mut self, size: Option<u64>) -> Result<u64, FsError> {
        self.check_open()?;
        if self.writer.is_none() {
            return Err(not_writable());
        }
        self.flush()?;
        let len = self
            .stream
            .truncate(size)
            .map_err(|e| FsError::io("truncate", self.path.as_str(), e))?;
        if let Some(reader) = self.reader.as_mut() {
            reader.reset();
        }
        Ok(len)
    }

    /// Flush and close the stream.
    ///
    /// Calling it again is a no-op. The session counts as closed even when
    /// flushing fails.
    pub fn close(&mut self) -> Result<(), FsError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let written = self.write_through();
        let closed = self
            .stream
            .close()
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

    fn write_through(&mut self) -> Result<(), FsError> {
        let Some(bytes) = self.writer.as_mut().and_then(WriterState::drain) else {
            return Ok(());
        };
        self.stream
            .write_all(&bytes)
            .map_err(|e| FsError::io("write", self.path.as_str(), e))
    }
}

impl Drop for TextIo {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(path = %self.path, %error, "text session failed to close on drop");
        }
    }
}

impl fmt::Debug for TextIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextIo")
            .field("path", &self.path)
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Lazy iterator over the lines of a [`TextIo`], from [`TextIo::lines`].
///
/// Ends at end of stream or after the first error.
#[derive(Debug)]
pub struct Lines<'a> {
    io: &'a mut TextIo,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.io.readline() {
            Ok(line) if line.is_empty() => {
                self.done = true;
                None
            }
            Ok(line) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn fill(stream: &mut dyn ByteStream, buf: &mut [u8], path: &str) -> Result<usize, FsError> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FsError::io("read", path, e)),
        }
    }
}
