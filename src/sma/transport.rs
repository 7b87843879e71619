use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::prelude::*;

/// The byte transport capability: a serial-like stream the link session
/// owns exclusively. Selected by construction, never by subclassing, so a
/// scripted fixture can stand in for the real channel in tests.
#[async_trait]
pub trait ByteTransport: Send {
    /// Reads up to `buf.len()` bytes, returning the count; 0 means the
    /// peer closed the stream.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn close(&mut self) -> io::Result<()>;
}

// StreamTransport {{{

/// Transport backed by a real byte stream. Bluetooth SPP is reached
/// through an RFCOMM-to-TCP gateway, so the common concrete type is a
/// `TcpStream`, but anything duplex works.
pub struct StreamTransport<S> {
    stream: S,
}

impl StreamTransport<TcpStream> {
    pub async fn connect(endpoint: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        info!("transport connected to {}", endpoint);
        Ok(Self { stream })
    }
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> ByteTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
// }}}

// ScriptedTransport {{{

/// One scripted answer to a `read` call.
pub enum ScriptedRead {
    /// Deliver these bytes.
    Data(Vec<u8>),
    /// Never complete; exercises the caller's deadline handling.
    Stall,
    /// Fail with this I/O error kind.
    Error(io::ErrorKind),
}

/// Transport that replays canned byte sequences and records writes.
/// Reads past the end of the script behave like a closed stream. The
/// write log and closed flag are shared handles, so a test keeps sight
/// of them after the transport moves into a session.
#[derive(Default)]
pub struct ScriptedTransport {
    reads: VecDeque<ScriptedRead>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_read(&mut self, data: Vec<u8>) {
        self.reads.push_back(ScriptedRead::Data(data));
    }

    pub fn push_stall(&mut self) {
        self.reads.push_back(ScriptedRead::Stall);
    }

    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.reads.push_back(ScriptedRead::Error(kind));
    }

    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.written)
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl ByteTransport for ScriptedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(ScriptedRead::Data(mut data)) => {
                if data.len() > buf.len() {
                    let rest = data.split_off(buf.len());
                    self.reads.push_front(ScriptedRead::Data(rest));
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(data.len())
            }
            Some(ScriptedRead::Stall) => std::future::pending().await,
            Some(ScriptedRead::Error(kind)) => Err(io::Error::new(kind, "scripted read error")),
            None => Ok(0),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.written.lock().unwrap().push(buf.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
// }}}
