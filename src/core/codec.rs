//! Length-and-magic framing over a byte stream, as a tokio codec.
//!
//! Wire format:
//!
//! ```text
//! [Length(4, LE)] [Magic(4, LE) = "VT01"] [Body(Length)]
//! ```
//!
//! The codec owns one end of a shared cipher slot. The slot starts empty
//! and is filled exactly once, when the encryption handshake completes;
//! from then on every inbound body is decrypted and every outbound body
//! encrypted before framing. The read and write halves of a connection
//! each hold a codec cloned from the same slot, so installation promotes
//! both directions at once and there is no downgrade path.

use crate::config::{MAGIC, MAX_PAYLOAD_SIZE};
use crate::core::packet::Packet;
use crate::error::ProtocolError;
use crate::utils::crypto::ChannelCipher;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::{Arc, OnceLock};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Write-once slot holding the channel cipher shared by both codec halves.
pub type CipherSlot = Arc<OnceLock<ChannelCipher>>;

/// Framing codec with a pluggable encryption layer.
#[derive(Clone, Default)]
pub struct FrameCodec {
    cipher: CipherSlot,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second codec bound to the same cipher slot, for the other half of
    /// a split stream.
    pub fn sibling(&self) -> Self {
        Self {
            cipher: Arc::clone(&self.cipher),
        }
    }

    /// Handle for installing the cipher later.
    pub fn cipher_slot(&self) -> CipherSlot {
        Arc::clone(&self.cipher)
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtocolError> {
        if src.len() < 8 {
            return Ok(None);
        }

        let length = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        let magic = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);

        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        if length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedFrame(length));
        }

        if src.len() < 8 + length {
            src.reserve(8 + length - src.len());
            return Ok(None);
        }

        src.advance(8);
        let body = src.split_to(length).freeze();

        let body = match self.cipher.get() {
            Some(cipher) => Bytes::from(cipher.decrypt(&body)?),
            None => body,
        };

        let packet = Packet::from_body(body)?;
        trace!(kind = %packet.kind, len = packet.data.len(), "frame decoded");
        Ok(Some(packet))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtocolError> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            // EOF inside a frame is unrecoverable; at a boundary the
            // session loop decides whether to poll again.
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::UnexpectedEof),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = match self.cipher.get() {
            Some(cipher) => Bytes::from(cipher.encrypt(&item)?),
            None => item,
        };

        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedFrame(payload.len()));
        }

        dst.reserve(8 + payload.len());
        dst.put_u32_le(payload.len() as u32);
        dst.put_u32_le(MAGIC);
        dst.put_slice(&payload);
        Ok(())
    }
}
