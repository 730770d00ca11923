//! The transport abstraction the flow drives reads and writes through.
//!
//! `spec.md` §9 notes that the source disables `shutdown()` for
//! stream-descriptor handles via template specialization, and detects
//! input/output aliasing by pointer identity at runtime. We resolve both
//! at the type level instead: [`SingleHandleTransport`] wraps one
//! `AsyncRead + AsyncWrite` handle (the TCP/UNIX-domain case, where
//! closing once suffices and `shutdown()` is meaningful), and
//! [`SplitHandleTransport`] wraps a distinct reader and writer (the
//! stdio/fd-like case, where there is no single handle to shut down).

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// What the flow needs from a connection's I/O.
///
/// All methods are cancel-safe only in the sense the flow requires: the
/// flow never polls a future from this trait and then drops it without
/// first driving it to completion, so implementations may assume each
/// call runs to completion before the next begins.
pub trait Transport: Send {
    /// Reads one `\n`-terminated line, stripping neither the `\r` nor the
    /// `\n` from what is returned (callers normalize via
    /// [`crate::parse::trim_line_ending`]). Returns `Ok(None)` on a clean
    /// EOF with no partial line buffered.
    async fn read_line(&mut self, max_line_length: usize) -> Result<Option<Bytes>, Error>;

    /// Reads at least one and at most `max` bytes of body data. Returns
    /// an empty `Bytes` on EOF.
    async fn read_body(&mut self, max: usize) -> Result<Bytes, Error>;

    /// Writes the entire buffer.
    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Whether `shutdown` does anything useful for this transport.
    fn supports_shutdown(&self) -> bool;

    /// Attempts a graceful shutdown of the write side.
    async fn shutdown(&mut self) -> Result<(), Error>;
}

/// Buffers bytes read from `io` beyond what was needed to complete the
/// current line or body chunk, so the next read resumes from them.
struct ReadBuf {
    buf: BytesMut,
}

impl ReadBuf {
    fn new() -> Self {
        ReadBuf {
            buf: BytesMut::new(),
        }
    }

    async fn read_line<R: AsyncRead + Unpin>(
        &mut self,
        io: &mut R,
        max_line_length: usize,
    ) -> Result<Option<Bytes>, Error> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos + 1 > max_line_length {
                    return Err(Error::new_parse());
                }
                let line = self.buf.split_to(pos + 1);
                return Ok(Some(line.freeze()));
            }
            if self.buf.len() > max_line_length {
                return Err(Error::new_parse());
            }
            let n = io.read_buf(&mut self.buf).await?;
            if n == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::new_incomplete())
                };
            }
        }
    }

    async fn read_body<R: AsyncRead + Unpin>(
        &mut self,
        io: &mut R,
        max: usize,
    ) -> Result<Bytes, Error> {
        if !self.buf.is_empty() {
            let n = max.min(self.buf.len());
            return Ok(self.buf.split_to(n).freeze());
        }
        let mut chunk = BytesMut::with_capacity(max.min(64 * 1024));
        let n = io.read_buf(&mut chunk).await?;
        chunk.truncate(n);
        Ok(chunk.freeze())
    }
}

/// A transport over a single handle used for both reading and writing
/// (the typical `TcpStream`/`UnixStream` shape).
pub struct SingleHandleTransport<T> {
    io: T,
    read_buf: ReadBuf,
}

impl<T> SingleHandleTransport<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a single duplex handle.
    pub fn new(io: T) -> Self {
        SingleHandleTransport {
            io,
            read_buf: ReadBuf::new(),
        }
    }

    /// Consumes the transport, returning the wrapped handle.
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T> Transport for SingleHandleTransport<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self, max_line_length: usize) -> Result<Option<Bytes>, Error> {
        self.read_buf.read_line(&mut self.io, max_line_length).await
    }

    async fn read_body(&mut self, max: usize) -> Result<Bytes, Error> {
        self.read_buf.read_body(&mut self.io, max).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.io.write_all(buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    fn supports_shutdown(&self) -> bool {
        true
    }

    async fn shutdown(&mut self) -> Result<(), Error> {
        self.io.shutdown().await.map_err(Error::new_shutdown)
    }
}

/// A transport over two distinct handles, one for reading and one for
/// writing (e.g. a process's stdin/stdout pair). `shutdown` is a no-op:
/// there is no single handle whose write-half can be half-closed without
/// affecting the other direction.
pub struct SplitHandleTransport<R, W> {
    reader: R,
    writer: W,
    read_buf: ReadBuf,
}

impl<R, W> SplitHandleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps a distinct reader and writer.
    pub fn new(reader: R, writer: W) -> Self {
        SplitHandleTransport {
            reader,
            writer,
            read_buf: ReadBuf::new(),
        }
    }

    /// Consumes the transport, returning the wrapped reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R, W> Transport for SplitHandleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self, max_line_length: usize) -> Result<Option<Bytes>, Error> {
        self.read_buf.read_line(&mut self.reader, max_line_length).await
    }

    async fn read_body(&mut self, max: usize) -> Result<Bytes, Error> {
        self.read_buf.read_body(&mut self.reader, max).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.writer.write_all(buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    fn supports_shutdown(&self) -> bool {
        false
    }

    async fn shutdown(&mut self) -> Result<(), Error> {
        // Stream-descriptor handles skip shutdown; dropping the writer on
        // `recycle` is the closest equivalent to a close.
        Ok(())
    }
}
