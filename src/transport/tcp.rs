//! TCP transport: dialing, stream splitting, and the shared writer.
//!
//! A connection is split into one reader (owned by the session's dispatch
//! loop) and one writer. The writer sits behind an async mutex so the
//! dispatch loop and the heartbeat task serialize their frames; handing a
//! clone of [`SharedWriter`] to a task is the only sanctioned way to write.
//! Both halves share one cipher slot, so installing the session key
//! promotes reads and writes together.

use crate::core::codec::{CipherSlot, FrameCodec};
use crate::error::Result;
use crate::utils::crypto::ChannelCipher;
use bytes::Bytes;
use futures::SinkExt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{info, instrument, warn};

pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Read half of a framed connection.
pub type FrameReader = FramedRead<BoxedRead, FrameCodec>;

/// Cloneable handle to the exclusive write half.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<FramedWrite<BoxedWrite, FrameCodec>>>,
}

impl SharedWriter {
    fn new(write: BoxedWrite, codec: FrameCodec) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FramedWrite::new(write, codec))),
        }
    }

    /// Frame, optionally encrypt, and write a payload, flushing it out.
    pub async fn send(&self, frame: Vec<u8>) -> Result<()> {
        let mut writer = self.inner.lock().await;
        writer.send(Bytes::from(frame)).await
    }
}

/// A framed duplex connection to a CM server.
pub struct Connection {
    pub reader: FrameReader,
    pub writer: SharedWriter,
    cipher: CipherSlot,
}

impl Connection {
    /// Dial a CM endpoint (`host:port`).
    #[instrument]
    pub async fn dial(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected");

        let (read, write) = stream.into_split();
        Ok(Self::from_parts(Box::new(read), Box::new(write)))
    }

    /// Build a connection over arbitrary stream halves (in-memory pipes in
    /// tests).
    pub fn from_parts(read: BoxedRead, write: BoxedWrite) -> Self {
        let codec = FrameCodec::new();
        let cipher = codec.cipher_slot();
        let reader = FramedRead::new(read, codec.sibling());
        let writer = SharedWriter::new(write, codec);

        Self {
            reader,
            writer,
            cipher,
        }
    }

    /// Promote the channel: every frame from here on is encrypted.
    pub fn install_cipher(&self, key: &[u8; 32]) {
        if self.cipher.set(ChannelCipher::new(key)).is_err() {
            warn!("cipher already installed; ignoring reinstall");
        }
    }
}
