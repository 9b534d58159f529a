//! # Utility Modules
//!
//! Supporting functionality for the session pipeline:
//!
//! - **crypto**: the channel cipher (AES-CBC-PKCS7 with ECB-wrapped IV)
//! - **compression**: capped gzip decompression for `Multi` envelopes
//! - **totp**: time-synced two-factor code generation

pub mod compression;
pub mod crypto;
pub mod totp;
