//! The framed byte channel: a bidirectional line-and-bytes transport.
//!
//! Grounded on the teacher's `NetBiosClient` -- a `maybe_async`-gated
//! transport so the same dispatch code compiles to blocking `std::io` calls
//! under the `sync` feature or `tokio` awaits under `async`, selected at
//! build time rather than duplicated.

use crate::error::{Error, Result};
use maybe_async::maybe_async;

#[cfg(feature = "sync")]
use std::io::{BufRead, BufReader, Read, Write};
#[cfg(feature = "async")]
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

/// A bidirectional transport supplying the five primitives the protocol
/// dispatcher needs: read a line, read exactly `n` bytes, write a line,
/// write bytes, and flush.
#[maybe_async]
#[allow(async_fn_in_trait)]
pub trait Channel {
    async fn read_line(&mut self) -> Result<String>;
    async fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>>;
    async fn write_line(&mut self, line: &str) -> Result<()>;
    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
}

/// A `Channel` over any stream type providing blocking `Read + Write` (under
/// `sync`) or `AsyncRead + AsyncWrite + Unpin` (under `async`).
pub struct StreamChannel<S> {
    reader: BufReader<S>,
}

#[cfg(feature = "sync")]
impl<S: Read + Write> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        StreamChannel {
            reader: BufReader::new(stream),
        }
    }
}

#[cfg(feature = "async")]
impl<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin> StreamChannel<S> {
    pub fn new(stream: S) -> Self {
        StreamChannel {
            reader: BufReader::new(stream),
        }
    }
}

#[cfg(feature = "sync")]
#[maybe_async]
impl<S: Read + Write> Channel for StreamChannel<S> {
    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "channel closed",
            )));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    async fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let writer = self.reader.get_mut();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.reader.get_mut().write_all(buf)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.reader.get_mut().flush()?;
        Ok(())
    }
}

#[cfg(feature = "async")]
#[maybe_async]
impl<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> Channel for StreamChannel<S> {
    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "channel closed",
            )));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    async fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        let writer = self.reader.get_mut();
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.reader.get_mut().write_all(buf).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.reader.get_mut().flush().await?;
        Ok(())
    }
}

/// An in-memory channel used by tests to drive the dispatcher end to end
/// without a real socket. Always synchronous: it exists purely to exercise
/// [`crate::server::ProtocolServer`] in-process.
#[cfg(all(any(test, feature = "test-util"), feature = "sync"))]
pub struct MemoryChannel {
    pub inbound: std::collections::VecDeque<u8>,
    pub outbound: Vec<u8>,
}

#[cfg(all(any(test, feature = "test-util"), feature = "sync"))]
impl MemoryChannel {
    pub fn new(inbound: Vec<u8>) -> Self {
        MemoryChannel {
            inbound: inbound.into(),
            outbound: Vec::new(),
        }
    }
}

#[cfg(all(any(test, feature = "test-util"), feature = "sync"))]
#[maybe_async]
impl Channel for MemoryChannel {
    async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        loop {
            match self.inbound.pop_front() {
                Some(b'\n') => break,
                Some(b) => line.push(b),
                None if line.is_empty() => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "channel closed",
                    )))
                }
                None => break,
            }
        }
        String::from_utf8(line)
            .map_err(|e| Error::Protocol(format!("non-utf8 line: {e}")))
    }

    async fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.inbound.len() < n {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "not enough bytes buffered",
            )));
        }
        Ok(self.inbound.drain(..n).collect())
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.outbound.extend_from_slice(line.as_bytes());
        self.outbound.push(b'\n');
        Ok(())
    }

    async fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.outbound.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
