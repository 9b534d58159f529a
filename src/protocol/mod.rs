//! # Session Protocol Modules
//!
//! The event-driven state machine that takes a raw TCP connection to an
//! authenticated, heartbeating session:
//!
//! - **dispatcher**: packet/event fan-out and the handler effect queue
//! - **handshake**: channel encryption negotiation
//! - **auth**: logon and post-logon account maintenance
//! - **multi**: wrapper envelope expansion
//! - **heartbeat**: keepalive task
//! - **presence**: persona-online announcement

pub mod auth;
pub mod dispatcher;
pub mod handshake;
pub mod heartbeat;
pub mod multi;
pub mod presence;
