//! `Multi` envelope expansion.
//!
//! A `Multi` message wraps a stream of inner messages, optionally gzip
//! compressed. After decompression the payload is a sequence of
//! `{length(u32 LE), body}` pairs — inner frames carry no magic. Each
//! inner body re-enters dispatch as its own packet, in stream order,
//! via the session's work queue; a wrapper nested inside a wrapper is
//! expanded iteratively rather than recursively.

use crate::core::messages::ProtoHeader;
use crate::core::packet::{EMsg, Packet};
use crate::core::proto;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{Module, Outbox};
use crate::utils::compression::gunzip;
use async_trait::async_trait;
use bytes::{Buf, Bytes};
use prost::Message;
use tracing::{debug, trace};

/// Unpacks `Multi` envelopes and re-enqueues the inner packets.
#[derive(Debug, Default)]
pub struct MultiDispatcher;

impl MultiDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn handle_multi(&self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let mut data = Bytes::clone(&packet.data);
        let _header = ProtoHeader::read_from(&mut data)?;
        let msg = proto::Multi::decode(data)?;

        let size_unzipped = msg.size_unzipped.unwrap_or(0);
        let mut payload = Bytes::from(msg.message_body.unwrap_or_default());

        if size_unzipped > 0 {
            let unzipped = gunzip(&payload)?;
            if unzipped.len() != size_unzipped as usize {
                return Err(ProtocolError::DecompressionFailure);
            }
            payload = Bytes::from(unzipped);
        }

        debug!(bytes = payload.len(), compressed = size_unzipped > 0, "expanding multi");

        let mut count = 0usize;
        while payload.has_remaining() {
            if payload.remaining() < 4 {
                return Err(ProtocolError::Truncated("multi inner length"));
            }
            let length = payload.get_u32_le() as usize;
            if payload.remaining() < length {
                return Err(ProtocolError::Truncated("multi inner frame"));
            }

            let inner = Packet::from_body(payload.split_to(length))?;
            trace!(kind = %inner.kind, "inner packet unpacked");
            out.packet(inner);
            count += 1;
        }

        debug!(count, "multi expanded");
        Ok(())
    }
}

#[async_trait]
impl Module for MultiDispatcher {
    async fn on_packet(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        match packet.kind {
            EMsg::MULTI => self.handle_multi(packet, out),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::messages::client_message;
    use crate::protocol::dispatcher::Output;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn inner_frame(kind: EMsg, tail: &[u8]) -> Vec<u8> {
        let mut body = kind.0.to_le_bytes().to_vec();
        body.extend_from_slice(tail);
        body
    }

    fn pack(inner: &[Vec<u8>]) -> Vec<u8> {
        let mut stream = Vec::new();
        for frame in inner {
            stream.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            stream.extend_from_slice(frame);
        }
        stream
    }

    fn multi_packet(body: proto::Multi) -> Packet {
        let bytes = client_message(&ProtoHeader::new(EMsg::MULTI), &body);
        Packet::from_body(Bytes::from(bytes)).unwrap()
    }

    fn unpacked_kinds(out: &mut Outbox) -> Vec<EMsg> {
        let mut kinds = Vec::new();
        while let Some(output) = out.pop() {
            match output {
                Output::Packet(p) => kinds.push(p.kind),
                other => panic!("unexpected output {other:?}"),
            }
        }
        kinds
    }

    #[tokio::test]
    async fn test_plain_multi_preserves_order() {
        let frames = vec![
            inner_frame(EMsg::CLIENT_ACCOUNT_INFO, b"aaa"),
            inner_frame(EMsg::CLIENT_FRIENDS_LIST, b"bb"),
        ];
        let packet = multi_packet(proto::Multi {
            size_unzipped: Some(0),
            message_body: Some(pack(&frames)),
        });

        let mut dispatcher = MultiDispatcher::new();
        let mut out = Outbox::new();
        dispatcher.on_packet(&packet, &mut out).await.unwrap();

        assert_eq!(
            unpacked_kinds(&mut out),
            vec![EMsg::CLIENT_ACCOUNT_INFO, EMsg::CLIENT_FRIENDS_LIST]
        );
    }

    #[tokio::test]
    async fn test_gzipped_multi() {
        let frames = vec![
            inner_frame(EMsg::CLIENT_LICENSE_LIST, &[0u8; 64]),
            inner_frame(EMsg::CLIENT_SESSION_TOKEN, &[1u8; 8]),
            inner_frame(EMsg::CLIENT_CM_LIST, b""),
        ];
        let stream = pack(&frames);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&stream).unwrap();
        let compressed = encoder.finish().unwrap();

        let packet = multi_packet(proto::Multi {
            size_unzipped: Some(stream.len() as u32),
            message_body: Some(compressed),
        });

        let mut dispatcher = MultiDispatcher::new();
        let mut out = Outbox::new();
        dispatcher.on_packet(&packet, &mut out).await.unwrap();

        assert_eq!(
            unpacked_kinds(&mut out),
            vec![
                EMsg::CLIENT_LICENSE_LIST,
                EMsg::CLIENT_SESSION_TOKEN,
                EMsg::CLIENT_CM_LIST
            ]
        );
    }

    #[tokio::test]
    async fn test_size_mismatch_is_fatal() {
        let stream = pack(&[inner_frame(EMsg::CLIENT_CM_LIST, b"x")]);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&stream).unwrap();
        let compressed = encoder.finish().unwrap();

        let packet = multi_packet(proto::Multi {
            size_unzipped: Some(stream.len() as u32 + 1),
            message_body: Some(compressed),
        });

        let mut dispatcher = MultiDispatcher::new();
        let mut out = Outbox::new();
        assert!(dispatcher.on_packet(&packet, &mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_inner_frame_is_fatal() {
        let mut stream = pack(&[inner_frame(EMsg::CLIENT_CM_LIST, b"full")]);
        // Claim a second frame longer than the remaining bytes.
        stream.extend_from_slice(&100u32.to_le_bytes());
        stream.extend_from_slice(&[0u8; 10]);

        let packet = multi_packet(proto::Multi {
            size_unzipped: Some(0),
            message_body: Some(stream),
        });

        let mut dispatcher = MultiDispatcher::new();
        let mut out = Outbox::new();
        assert!(matches!(
            dispatcher.on_packet(&packet, &mut out).await,
            Err(ProtocolError::Truncated("multi inner frame"))
        ));
    }

    #[tokio::test]
    async fn test_empty_multi() {
        let packet = multi_packet(proto::Multi {
            size_unzipped: Some(0),
            message_body: Some(Vec::new()),
        });

        let mut dispatcher = MultiDispatcher::new();
        let mut out = Outbox::new();
        dispatcher.on_packet(&packet, &mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
