//! # cm-protocol
//!
//! Client library for the binary TCP protocol spoken by the Steam
//! Connection Manager (CM) servers: the session bring-up pipeline from a
//! raw socket to an authenticated, heartbeating session.
//!
//! ## Architecture
//!
//! The pipeline is an event-driven state machine with three principal
//! channel states — raw, encrypted, authenticated — each gated by a
//! specific server message:
//!
//! - [`core`]: wire framing (`length | magic | body`), message kinds, the
//!   two header flavors, and the protobuf bodies of the logon plane.
//! - [`utils`]: the channel cipher (AES-CBC-PKCS7 with an ECB-wrapped IV
//!   prefix), capped gzip decompression, and the time-synced two-factor
//!   code generator.
//! - [`protocol`]: the modules on the event bus — encryption handshake,
//!   authenticator, `Multi` expansion, heartbeat, presence.
//! - [`transport`]: TCP dialing/splitting and CM endpoint discovery.
//! - [`service`]: the [`Session`](service::session::Session) orchestrator
//!   owning the connection's lifetime.
//!
//! ## Example
//!
//! ```no_run
//! use cm_protocol::config::ClientConfig;
//! use cm_protocol::protocol::dispatcher::Event;
//! use cm_protocol::service::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> cm_protocol::error::Result<()> {
//!     let config = ClientConfig::default_with_overrides(|c| {
//!         c.details.username = "account".into();
//!         c.details.password = "password".into();
//!     });
//!
//!     let (session, mut events) = Session::connect(config, "162.254.197.39:27017").await?;
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             if let Event::NewLoginKey { key, .. } = event {
//!                 // persist the key
//!                 let _ = key;
//!             }
//!         }
//!     });
//!
//!     session.run().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, LogonDetails};
pub use crate::core::packet::{EMsg, Packet};
pub use crate::core::types::{EResult, EUniverse, SteamId};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::Event;
pub use crate::service::session::Session;
