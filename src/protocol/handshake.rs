//! Channel encryption handshake.
//!
//! After the TCP connection is established, the server asks the client to
//! negotiate encryption for a universe:
//!
//! 1. `ChannelEncryptRequest` (server→client): universe + handshake
//!    protocol version.
//! 2. `ChannelEncryptResponse` (client→server): a fresh 256-bit session
//!    key, RSA-OAEP(SHA-1) encrypted under the universe's public key,
//!    followed by the CRC-32 of the wrapped key and a zero word. Still
//!    written in the clear.
//! 3. `ChannelEncryptResult` (server→client): OK promotes the channel;
//!    everything from here on is AES encrypted with the session key.
//!
//! The module is a three-state machine (`Idle → AwaitingResult → Ready`);
//! packets arriving out of order are ignored.

use crate::config::ENCRYPT_PROTOCOL_VERSION;
use crate::core::messages::{EncryptRequest, EncryptResponse, EncryptResult, Header};
use crate::core::packet::{EMsg, Packet};
use crate::core::types::EUniverse;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{Event, Module, Outbox};
use async_trait::async_trait;
use bytes::{BufMut, Bytes};
use rand_core::{OsRng, RngCore};
use rsa::{BigUint, Oaep, RsaPublicKey};
use sha1::Sha1;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// RSA key size the server expects for the wrapped session key.
const WRAPPED_KEY_SIZE: u32 = 128;

/// 1024-bit RSA modulus of the Public universe signing key (big-endian).
const PUBLIC_UNIVERSE_MODULUS: [u8; 128] = [
    0xDF, 0xEC, 0x1A, 0xD6, 0x2C, 0x10, 0x66, 0x2C, 0x17, 0x35, 0x3A, 0x14, 0xB0, 0x7C, 0x59,
    0x11, 0x7F, 0x9D, 0xD3, 0xD8, 0x2B, 0x7A, 0xE3, 0xE0, 0x15, 0xCD, 0x19, 0x1E, 0x46, 0xE8,
    0x7B, 0x87, 0x74, 0xA2, 0x18, 0x46, 0x31, 0xA9, 0x03, 0x14, 0x79, 0x82, 0x8E, 0xE9, 0x45,
    0xA2, 0x49, 0x12, 0xA9, 0x23, 0x68, 0x73, 0x89, 0xCF, 0x69, 0xA1, 0xB1, 0x61, 0x46, 0xBD,
    0xC1, 0xBE, 0xBF, 0xD6, 0x01, 0x1B, 0xD8, 0x81, 0xD4, 0xDC, 0x90, 0xFB, 0xFE, 0x4F, 0x52,
    0x73, 0x66, 0xCB, 0x95, 0x70, 0xD7, 0xC5, 0x8E, 0xBA, 0x1C, 0x7A, 0x33, 0x75, 0xA1, 0x62,
    0x34, 0x46, 0xBB, 0x60, 0xB7, 0x80, 0x68, 0xFA, 0x13, 0xA7, 0x7A, 0x8A, 0x37, 0x4B, 0x9F,
    0xC6, 0xF4, 0x5D, 0x5F, 0x3A, 0x99, 0xF9, 0x9E, 0xC4, 0x3A, 0xE9, 0x63, 0xA2, 0xBB, 0x88,
    0x19, 0x28, 0xE0, 0xE7, 0x14, 0xC0, 0x42, 0x89,
];

/// Public key for a universe.
///
/// # Errors
/// Only `Public` has an embedded key; other universes are rejected.
pub fn public_key_for(universe: EUniverse) -> Result<RsaPublicKey> {
    match universe {
        EUniverse::Public => RsaPublicKey::new(
            BigUint::from_bytes_be(&PUBLIC_UNIVERSE_MODULUS),
            BigUint::from(65537u32),
        )
        .map_err(ProtocolError::KeyWrap),
        other => Err(ProtocolError::UnsupportedUniverse(other as i32)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Idle,
    AwaitingResult,
    Ready,
}

/// Drives the encryption handshake and promotes the channel on success.
pub struct ChannelHandshake {
    state: HandshakeState,
    public_key: RsaPublicKey,
    session_key: Option<Zeroizing<[u8; 32]>>,
}

impl ChannelHandshake {
    /// Handshake against the embedded Public-universe key.
    pub fn new() -> Self {
        // The embedded modulus is a valid key; construction cannot fail.
        let public_key = public_key_for(EUniverse::Public)
            .unwrap_or_else(|_| unreachable!("embedded public key is well-formed"));
        Self::with_public_key(public_key)
    }

    /// Handshake against a specific RSA key (stub peers in tests).
    pub fn with_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            state: HandshakeState::Idle,
            public_key,
            session_key: None,
        }
    }

    fn handle_encrypt_request(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        if self.state != HandshakeState::Idle {
            warn!(state = ?self.state, "encrypt request out of order; ignoring");
            return Ok(());
        }

        let mut data = Bytes::clone(&packet.data);
        let header = Header::read_from(&mut data)?;
        let request = EncryptRequest::read_from(&mut data)?;

        if request.universe != EUniverse::Public as i32 {
            return Err(ProtocolError::UnsupportedUniverse(request.universe));
        }

        if request.protocol_version != ENCRYPT_PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(request.protocol_version));
        }

        let mut session_key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(session_key.as_mut_slice());

        let wrapped = self
            .public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), session_key.as_slice())?;

        // Reply targets the job the request originated from.
        let response_header = Header::new(
            EMsg::CHANNEL_ENCRYPT_RESPONSE,
            header.source_job_id,
            header.target_job_id,
        );

        let mut frame = Vec::with_capacity(20 + 8 + wrapped.len() + 8);
        response_header.write_to(&mut frame);
        EncryptResponse {
            protocol_version: ENCRYPT_PROTOCOL_VERSION,
            key_size: WRAPPED_KEY_SIZE,
        }
        .write_to(&mut frame);
        frame.put_slice(&wrapped);
        frame.put_u32_le(crc32fast::hash(&wrapped));
        frame.put_u32_le(0);

        debug!(wrapped_len = wrapped.len(), "responding to encrypt request");

        self.session_key = Some(session_key);
        self.state = HandshakeState::AwaitingResult;
        out.frame(frame);
        Ok(())
    }

    fn handle_encrypt_result(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        if self.state != HandshakeState::AwaitingResult {
            warn!(state = ?self.state, "encrypt result out of order; ignoring");
            return Ok(());
        }

        let mut data = Bytes::clone(&packet.data);
        let _header = Header::read_from(&mut data)?;
        let result = EncryptResult::read_from(&mut data)?;

        if !result.result.is_ok() {
            return Err(ProtocolError::EncryptNegotiationFailed(result.result));
        }

        let session_key = self
            .session_key
            .take()
            .ok_or(ProtocolError::Truncated("session key"))?;

        debug!("channel encrypt negotiation succeeded");

        self.state = HandshakeState::Ready;
        out.install_cipher(*session_key);
        out.event(Event::ChannelReady);
        Ok(())
    }
}

impl Default for ChannelHandshake {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for ChannelHandshake {
    async fn on_packet(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        match packet.kind {
            EMsg::CHANNEL_ENCRYPT_REQUEST => self.handle_encrypt_request(packet, out),
            EMsg::CHANNEL_ENCRYPT_RESULT => self.handle_encrypt_result(packet, out),
            _ => Ok(()),
        }
    }
}
