//! Packet and event fan-out.
//!
//! The domain events a session produces are a closed set, so they are a
//! plain enum rather than a downcast-based subscriber API; packets stay
//! opaque because their kind space is open. Modules register once, before
//! the reader starts, and are walked in registration order on every
//! packet and event. The first handler error aborts the fan-out and
//! surfaces to the session loop.
//!
//! Handlers never touch the socket directly. They describe their side
//! effects — frames to write, events to fire, packets to re-inject, the
//! cipher to install — by pushing [`Output`]s into an [`Outbox`]; the
//! session loop drains the outbox FIFO after each fan-out. Re-injected
//! packets therefore dispatch after the current handler chain completes,
//! in order, and before the next frame is read from the socket, without
//! recursing.

use crate::core::packet::Packet;
use crate::core::types::EResult;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::trace;

/// Domain events distributed alongside raw packets.
///
/// Events are in-process signals only; they never go out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The encryption handshake finished and the channel is promoted.
    ChannelReady,
    /// Logon succeeded.
    Authenticated {
        /// Keepalive period granted by the server.
        heartbeat: Duration,
        steam_id: u64,
        /// Session id this client sends (currently always 0).
        session_id: i32,
        /// Session id observed in the response header, surfaced for hosts.
        server_session_id: Option<i32>,
    },
    /// Logon rejected by the server.
    AuthFailed { result: EResult },
    /// Server terminated the logical session.
    LoggedOff { result: EResult },
    /// Server issued a new login key; hosts should persist it.
    NewLoginKey { unique_id: u32, key: String },
    /// Sentry hash computed for a machine-auth update; hosts should
    /// persist it.
    MachineAuthUpdate { hash: Vec<u8> },
    /// Keepalive loop is starting with the given period.
    HeartbeatStarting { interval: Duration },
    /// A keepalive was written.
    HeartbeatTicked,
}

/// A side effect requested by a handler.
#[derive(Debug)]
pub enum Output {
    /// Write a frame via the connection.
    Frame(Vec<u8>),
    /// Fan an event out to all modules (and the host tap).
    Event(Event),
    /// Re-inject an unpacked inner packet into dispatch.
    Packet(Packet),
    /// Promote the channel with this session key.
    InstallCipher([u8; 32]),
}

/// FIFO queue of handler side effects, drained by the session loop.
#[derive(Debug, Default)]
pub struct Outbox {
    items: VecDeque<Output>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&mut self, frame: Vec<u8>) {
        self.items.push_back(Output::Frame(frame));
    }

    pub fn event(&mut self, event: Event) {
        self.items.push_back(Output::Event(event));
    }

    pub fn packet(&mut self, packet: Packet) {
        self.items.push_back(Output::Packet(packet));
    }

    pub fn install_cipher(&mut self, key: [u8; 32]) {
        self.items.push_back(Output::InstallCipher(key));
    }

    pub fn pop(&mut self) -> Option<Output> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// A subscriber on the bus.
///
/// Both hooks default to no-ops so modules implement only what they watch.
#[async_trait]
pub trait Module: Send {
    async fn on_packet(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let _ = (packet, out);
        Ok(())
    }

    async fn on_event(&mut self, event: &Event, out: &mut Outbox) -> Result<()> {
        let _ = (event, out);
        Ok(())
    }
}

/// Ordered fan-out of packets and events to registered modules.
#[derive(Default)]
pub struct EventBus {
    modules: Vec<Box<dyn Module>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Registration order is dispatch order; there is
    /// no unsubscribe.
    pub fn subscribe(&mut self, module: impl Module + 'static) {
        self.modules.push(Box::new(module));
    }

    /// Broadcast a packet to every module in registration order.
    ///
    /// # Errors
    /// The first handler error aborts the fan-out.
    pub async fn fire_packet(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        trace!(kind = %packet.kind, "dispatching packet");
        for module in &mut self.modules {
            module.on_packet(packet, out).await?;
        }
        Ok(())
    }

    /// Broadcast an event to every module in registration order.
    ///
    /// # Errors
    /// The first handler error aborts the fan-out.
    pub async fn fire_event(&mut self, event: &Event, out: &mut Outbox) -> Result<()> {
        trace!(?event, "dispatching event");
        for module in &mut self.modules {
            module.on_event(event, out).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ProtocolError;
    use bytes::Bytes;
    use std::sync::Arc;

    struct Recorder {
        id: usize,
        order: Arc<std::sync::Mutex<Vec<usize>>>,
        fail: bool,
    }

    #[async_trait]
    impl Module for Recorder {
        async fn on_packet(&mut self, _packet: &Packet, _out: &mut Outbox) -> Result<()> {
            self.order.lock().unwrap().push(self.id);
            if self.fail {
                return Err(ProtocolError::Truncated("test"));
            }
            Ok(())
        }
    }

    fn test_packet() -> Packet {
        Packet::from_body(Bytes::from((1u32).to_le_bytes().to_vec())).unwrap()
    }

    #[tokio::test]
    async fn test_fanout_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for id in 0..3 {
            bus.subscribe(Recorder {
                id,
                order: Arc::clone(&order),
                fail: false,
            });
        }

        let mut out = Outbox::new();
        bus.fire_packet(&test_packet(), &mut out).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_error_aborts_fanout() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Recorder {
            id: 0,
            order: Arc::clone(&order),
            fail: false,
        });
        bus.subscribe(Recorder {
            id: 1,
            order: Arc::clone(&order),
            fail: true,
        });
        bus.subscribe(Recorder {
            id: 2,
            order: Arc::clone(&order),
            fail: false,
        });

        let mut out = Outbox::new();
        assert!(bus.fire_packet(&test_packet(), &mut out).await.is_err());
        // Third module never ran.
        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        struct Inert;

        #[async_trait]
        impl Module for Inert {}

        let mut bus = EventBus::new();
        bus.subscribe(Inert);

        let mut out = Outbox::new();
        bus.fire_packet(&test_packet(), &mut out).await.unwrap();
        bus.fire_event(&Event::ChannelReady, &mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_outbox_is_fifo() {
        let mut out = Outbox::new();
        out.frame(vec![1]);
        out.event(Event::ChannelReady);
        out.frame(vec![2]);

        assert!(matches!(out.pop(), Some(Output::Frame(f)) if f == vec![1]));
        assert!(matches!(out.pop(), Some(Output::Event(Event::ChannelReady))));
        assert!(matches!(out.pop(), Some(Output::Frame(f)) if f == vec![2]));
        assert!(out.pop().is_none());
    }
}
