//! # Core Protocol Components
//!
//! Low-level packet handling, codecs, and wire serialization.
//!
//! ## Components
//! - **Packet / EMsg**: inbound message container and kind codes
//! - **Codec**: tokio codec for length+magic framing with the cipher slot
//! - **Messages**: fixed-layout headers and handshake bodies
//! - **Proto**: protobuf bodies for the logon plane
//!
//! ## Wire Format
//! ```text
//! [Length(4, LE)] [Magic(4, LE) = "VT01"] [Body(Length)]
//! ```
//!
//! ## Security
//! - Maximum frame size: 16MB (prevents memory exhaustion)
//! - Magic bytes prevent accidental misinterpretation
//! - Length validation before allocation

pub mod codec;
pub mod messages;
pub mod packet;
pub mod proto;
pub mod types;
