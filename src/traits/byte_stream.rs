//! Raw byte streams returned by `open`.

use std::io::{self, Read, Seek, Write};

/// A seekable byte stream opened through [`Storage::open`](crate::Storage::open).
///
/// Writes may be buffered by the store until [`flush`](Write::flush) or
/// [`close`](ByteStream::close).
pub trait ByteStream: Read + Write + Seek + Send {
    /// Cut or extend the stream to `size` bytes (current position when
    /// `None`) and return the new length.
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64>;

    /// Flush and release the stream.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Box<T> {
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        (**self).truncate(size)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl ByteStream for std::fs::File {
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        let size = match size {
            Some(size) => size,
            None => self.stream_position()?,
        };
        self.set_len(size)?;
        Ok(size)
    }
}

impl ByteStream for io::Cursor<Vec<u8>> {
    fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
        let size = match size {
            Some(size) => size,
            None => self.position(),
        };
        let len = usize::try_from(size).map_err(io::Error::other)?;
        self.get_mut().resize(len, 0);
        Ok(size)
    }
}

#[cfg(feature = "async")]
pub use nonblocking::AsyncByteStream;

#[cfg(feature = "async")]
mod nonblocking {
    use std::io;

    use async_trait::async_trait;
    use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

    /// Suspending counterpart of [`ByteStream`](super::ByteStream).
    #[async_trait]
    pub trait AsyncByteStream: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send {
        /// Cut or extend the stream to `size` bytes (current position when
        /// `None`) and return the new length.
        async fn truncate(&mut self, size: Option<u64>) -> io::Result<u64>;

        /// Flush and release the stream.
        async fn close(&mut self) -> io::Result<()> {
            self.shutdown().await
        }
    }

    #[async_trait]
    impl<T: AsyncByteStream + ?Sized> AsyncByteStream for Box<T> {
        async fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
            (**self).truncate(size).await
        }

        async fn close(&mut self) -> io::Result<()> {
            (**self).close().await
        }
    }

    #[async_trait]
    impl AsyncByteStream for tokio::fs::File {
        async fn truncate(&mut self, size: Option<u64>) -> io::Result<u64> {
            let size = match size {
                Some(size) => size,
                None => self.stream_position().await?,
            };
            self.set_len(size).await?;
            Ok(size)
        }
    }
}
