//! # Error Types
//!
//! All error variants that can occur while driving a CM session, from
//! low-level socket failures to server-reported logon rejections.
//!
//! ## Error Categories
//! - **Transport**: socket read/write failures, unexpected EOF
//! - **Framing**: bad magic, truncated or oversized frames
//! - **Crypto**: RSA wrap, channel negotiation, AES construction/padding
//! - **Codec**: protobuf and fixed-layout message parse/marshal
//! - **Auth**: missing credentials, two-factor generation, directory lookups
//! - **Cancelled**: caller-initiated shutdown
//!
//! All errors implement `std::error::Error` for interoperability.

use crate::core::types::EResult;
use std::io;
use thiserror::Error;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The four magic bytes after the length prefix did not match `VT01`.
    #[error("invalid frame magic: {0:#010x}")]
    BadMagic(u32),

    /// A frame or message body ended before its advertised length.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// Frame body larger than [`crate::config::MAX_PAYLOAD_SIZE`].
    #[error("frame of {0} bytes exceeds maximum size")]
    OversizedFrame(usize),

    /// The peer closed the stream in the middle of a frame.
    #[error("connection closed mid-frame")]
    UnexpectedEof,

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to wrap session key: {0}")]
    KeyWrap(#[from] rsa::Error),

    /// Encrypt request carried a universe other than Public.
    #[error("unsupported universe: {0}")]
    UnsupportedUniverse(i32),

    /// Encrypt request carried an unknown handshake protocol version.
    #[error("unsupported encrypt protocol version: {0}")]
    UnsupportedVersion(u32),

    /// Server reported a non-OK result for the encryption negotiation.
    #[error("channel encrypt negotiation failed: {0:?}")]
    EncryptNegotiationFailed(EResult),

    /// Ciphertext or padding did not have a valid CBC/PKCS#7 shape, or the
    /// input was too short to carry the IV block.
    #[error("decryption failed")]
    DecryptFailure,

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// Shared secret was not valid base64.
    #[error("invalid shared secret: {0}")]
    InvalidSharedSecret(#[from] base64::DecodeError),

    /// Time sync or directory HTTP round-trip failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory or time endpoint answered with a non-success status.
    #[error("unexpected http status: {0}")]
    HttpStatus(String),

    /// The directory returned an empty server list.
    #[error("no CM endpoints available")]
    NoEndpoints,

    #[error("decompression failed")]
    DecompressionFailure,

    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Caller-requested shutdown; the reader unwound cleanly.
    #[error("session cancelled")]
    Cancelled,
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
