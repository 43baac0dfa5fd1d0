//! # Streaming Text I/O
//!
//! Text sessions layered over the byte streams returned by
//! [`Storage::open`](crate::Storage::open).
//!
//! ## Overview
//!
//! | Type | Model |
//! |------|-------|
//! | [`TextIo`] | blocking, over a [`ByteStream`](crate::ByteStream) |
//! | [`AsyncTextIo`] | suspending, over an [`AsyncByteStream`](crate::AsyncByteStream) |
//!
//! Both share one state machine:
//!
//! - **Reading** pulls `chunk_size` bytes at a time through an
//!   [`IncrementalDecoder`] until the request is satisfied or the stream
//!   ends. Every completed `readline` is remembered in a bounded history
//!   ring, oldest first out.
//! - **Writing** encodes text into a pending buffer and writes it through
//!   once `buffer_size` characters have accumulated, or on `flush`.
//! - **Seek and truncate** flush pending writes, move the stream, then reset
//!   the decoder and drop decoded-but-unread text.
//! - **Close** flushes and closes the stream. It is idempotent; every other
//!   operation fails with [`FsError::Closed`] afterwards.
//!
//! Reading a write-only session or writing a read-only one fails at once
//! with [`FsError::Mode`].

mod blocking;
mod codec;

#[cfg(feature = "async")]
mod nonblocking;

pub use blocking::{Lines, TextIo};
pub use codec::{Encoding, IncrementalDecoder};

#[cfg(feature = "async")]
pub use nonblocking::AsyncTextIo;

use std::collections::VecDeque;

use crate::{FsError, OpenMode};

/// Default read chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
/// Default write-through threshold in characters.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;
/// Default number of lines kept in the history ring.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Settings for a text session.
///
/// # Example
///
/// ```rust
/// use vpath::{Encoding, TextOptions};
///
/// let options = TextOptions::new()
///     .with_encoding(Encoding::Latin1)
///     .with_chunk_size(1);
/// assert_eq!(options.buffer_size, 16 * 1024);
/// assert_eq!(options.history_limit, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// Text encoding.
    pub encoding: Encoding,
    /// Bytes requested from the stream per read.
    pub chunk_size: usize,
    /// Pending characters that trigger a write-through.
    pub buffer_size: usize,
    /// Lines kept by the `readline` history ring.
    pub history_limit: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl TextOptions {
    /// Default options (UTF-8, 16 KiB chunks and buffer, 10 lines of history).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set [`encoding`](Self::encoding).
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set [`chunk_size`](Self::chunk_size); zero is raised to one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set [`buffer_size`](Self::buffer_size).
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set [`history_limit`](Self::history_limit).
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }
}

// =============================================================================
// Shared session state
// =============================================================================

/// Decoder, decoded-text buffer and history ring of a readable session.
#[derive(Debug)]
struct ReaderState {
    decoder: IncrementalDecoder,
    buffer: String,
    buffered_chars: usize,
    eof: bool,
    history: VecDeque<String>,
    history_limit: usize,
    chunk_size: usize,
}

impl ReaderState {
    fn new(options: &TextOptions) -> Self {
        Self {
            decoder: options.encoding.decoder(),
            buffer: String::new(),
            buffered_chars: 0,
            eof: false,
            history: VecDeque::with_capacity(options.history_limit),
            history_limit: options.history_limit,
            chunk_size: options.chunk_size.max(1),
        }
    }

    /// Whether `read(size)` needs another chunk from the stream.
    fn wants_chars(&self, size: Option<usize>) -> bool {
        !self.eof && size.is_none_or(|n| self.buffered_chars < n)
    }

    /// Whether `readline` needs another chunk from the stream.
    fn wants_line(&self) -> bool {
        !self.eof && !self.buffer.contains('\n')
    }

    /// Decode one chunk; an empty chunk marks the end of the stream.
    fn feed(&mut self, chunk: &[u8]) -> Result<(), FsError> {
        let last = chunk.is_empty();
        let text = self.decoder.decode(chunk, last)?;
        if last {
            self.eof = true;
        }
        self.buffered_chars += text.chars().count();
        self.buffer.push_str(&text);
        Ok(())
    }

    /// Remove up to `size` characters (everything when `None`).
    fn take(&mut self, size: Option<usize>) -> String {
        let split = size
            .and_then(|n| self.buffer.char_indices().nth(n))
            .map_or(self.buffer.len(), |(idx, _)| idx);
        self.split_front(split)
    }

    /// Remove the first line including its terminator, or whatever is left
    /// at end of stream, and remember it.
    fn take_line(&mut self) -> String {
        let split = self
            .buffer
            .find('\n')
            .map_or(self.buffer.len(), |idx| idx + 1);
        let line = self.split_front(split);
        if !line.is_empty() && self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(line.clone());
        }
        line
    }

    fn split_front(&mut self, at: usize) -> String {
        let rest = self.buffer.split_off(at);
        let front = std::mem::replace(&mut self.buffer, rest);
        self.buffered_chars -= front.chars().count();
        front
    }

    /// Back to the initial decoder state; decoded text not yet consumed is
    /// dropped. History is kept.
    fn reset(&mut self) {
        if !self.buffer.is_empty() || !self.decoder.pending().is_empty() {
            tracing::trace!(
                dropped_chars = self.buffered_chars,
                pending_bytes = self.decoder.pending().len(),
                "text reader reset"
            );
        }
        self.decoder.reset();
        self.buffer.clear();
        self.buffered_chars = 0;
        self.eof = false;
    }
}

/// Encoded-but-unwritten text of a writable session.
#[derive(Debug)]
struct WriterState {
    encoding: Encoding,
    pending: Vec<u8>,
    pending_chars: usize,
    threshold: usize,
}

impl WriterState {
    fn new(options: &TextOptions) -> Self {
        Self {
            encoding: options.encoding,
            pending: Vec::new(),
            pending_chars: 0,
            threshold: options.buffer_size,
        }
    }

    /// Buffer `text`; returns `true` once the threshold is reached.
    fn push(&mut self, text: &str) -> Result<bool, FsError> {
        let bytes = self.encoding.encode(text)?;
        self.pending.extend_from_slice(&bytes);
        self.pending_chars += text.chars().count();
        Ok(self.pending_chars >= self.threshold)
    }

    /// Take everything pending.
    fn drain(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        tracing::trace!(
            bytes = self.pending.len(),
            chars = self.pending_chars,
            "text writer flush"
        );
        self.pending_chars = 0;
        Some(std::mem::take(&mut self.pending))
    }
}

fn reader_for(mode: OpenMode, options: &TextOptions) -> Option<ReaderState> {
    mode.read.then(|| ReaderState::new(options))
}

fn writer_for(mode: OpenMode, options: &TextOptions) -> Option<WriterState> {
    (mode.write || mode.append).then(|| WriterState::new(options))
}

fn not_readable() -> FsError {
    FsError::Mode {
        operation: "reading",
    }
}

fn not_writable() -> FsError {
    FsError::Mode {
        operation: "writing",
    }
}
