//! Fixed-layout message headers and handshake bodies.
//!
//! Two header flavors exist on the wire. The plain 20-byte header is used
//! only while the channel is still clear, during the encryption handshake.
//! After the handshake every message carries the protobuf header envelope:
//! `kind|PROTO_MASK (u32 LE)`, `header_len (i32 LE)`, then the serialized
//! [`ProtoHeaderData`].

use crate::core::packet::EMsg;
use crate::core::proto::ProtoHeaderData;
use crate::core::types::EResult;
use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut};
use prost::Message;

fn need(src: &impl Buf, n: usize, what: &'static str) -> Result<()> {
    if src.remaining() < n {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(())
}

/// Plain message header, used during the crypto handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: EMsg,
    pub target_job_id: u64,
    pub source_job_id: u64,
}

impl Header {
    pub fn new(kind: EMsg, target_job_id: u64, source_job_id: u64) -> Self {
        Self {
            kind,
            target_job_id,
            source_job_id,
        }
    }

    pub fn write_to(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.kind.0);
        dst.put_u64_le(self.target_job_id);
        dst.put_u64_le(self.source_job_id);
    }

    /// # Errors
    /// Returns `Truncated` when fewer than 20 bytes remain.
    pub fn read_from(src: &mut impl Buf) -> Result<Self> {
        need(src, 20, "plain header")?;
        let kind = EMsg(src.get_u32_le());
        let target_job_id = src.get_u64_le();
        let source_job_id = src.get_u64_le();
        Ok(Self {
            kind,
            target_job_id,
            source_job_id,
        })
    }
}

/// Body of `ChannelEncryptRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptRequest {
    pub protocol_version: u32,
    pub universe: i32,
}

impl EncryptRequest {
    pub fn write_to(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.protocol_version);
        dst.put_i32_le(self.universe);
    }

    pub fn read_from(src: &mut impl Buf) -> Result<Self> {
        need(src, 8, "encrypt request")?;
        Ok(Self {
            protocol_version: src.get_u32_le(),
            universe: src.get_i32_le(),
        })
    }
}

/// Leading fixed fields of `ChannelEncryptResponse`; the wrapped key, its
/// CRC, and a trailing zero word follow in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptResponse {
    pub protocol_version: u32,
    pub key_size: u32,
}

impl EncryptResponse {
    pub fn write_to(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.protocol_version);
        dst.put_u32_le(self.key_size);
    }

    pub fn read_from(src: &mut impl Buf) -> Result<Self> {
        need(src, 8, "encrypt response")?;
        Ok(Self {
            protocol_version: src.get_u32_le(),
            key_size: src.get_u32_le(),
        })
    }
}

/// Body of `ChannelEncryptResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptResult {
    pub result: EResult,
}

impl EncryptResult {
    pub fn write_to(&self, dst: &mut impl BufMut) {
        dst.put_i32_le(self.result.0);
    }

    pub fn read_from(src: &mut impl Buf) -> Result<Self> {
        need(src, 4, "encrypt result")?;
        Ok(Self {
            result: EResult(src.get_i32_le()),
        })
    }
}

/// Protobuf header envelope used by every post-handshake message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtoHeader {
    pub kind: EMsg,
    pub proto: ProtoHeaderData,
}

impl ProtoHeader {
    pub fn new(kind: EMsg) -> Self {
        Self {
            kind,
            proto: ProtoHeaderData::default(),
        }
    }

    /// Header stamped with the session identity, as required on every
    /// outbound message after logon.
    pub fn with_session(kind: EMsg, steam_id: u64, session_id: i32) -> Self {
        let mut header = Self::new(kind);
        header.proto.steamid = Some(steam_id);
        header.proto.client_sessionid = Some(session_id);
        header
    }

    pub fn write_to(&self, dst: &mut impl BufMut) {
        let header_bytes = self.proto.encode_to_vec();
        dst.put_u32_le(self.kind.with_proto_flag());
        dst.put_i32_le(header_bytes.len() as i32);
        dst.put_slice(&header_bytes);
    }

    /// # Errors
    /// Returns `Truncated` on a short buffer and `Decode` when the header
    /// payload is not valid protobuf.
    pub fn read_from(src: &mut impl Buf) -> Result<Self> {
        need(src, 8, "proto header")?;
        let raw = src.get_u32_le();
        let (kind, _is_proto) = EMsg::from_raw(raw);

        let header_len = src.get_i32_le();
        if header_len < 0 {
            return Err(ProtocolError::Truncated("proto header length"));
        }
        need(src, header_len as usize, "proto header payload")?;

        let header_bytes = src.copy_to_bytes(header_len as usize);
        let proto = ProtoHeaderData::decode(header_bytes)?;

        Ok(Self { kind, proto })
    }
}

/// Serialize a protobuf client message: header envelope followed by body.
pub fn client_message<M: Message>(header: &ProtoHeader, body: &M) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + body.encoded_len());
    header.write_to(&mut buf);
    buf.extend_from_slice(&body.encode_to_vec());
    buf
}
