//! Session orchestrator.
//!
//! Owns the connection for its whole lifetime: wires the protocol modules
//! onto the bus, runs the read/dispatch loop, drains handler effects, and
//! decides when the session is over. One task owns the read half and
//! dispatches synchronously; the write half is shared with the heartbeat
//! task behind [`SharedWriter`](crate::transport::tcp::SharedWriter).
//!
//! The loop ends on the first fatal error, on a heartbeat write failure,
//! on cancellation (socket closed, [`ProtocolError::Cancelled`] returned),
//! or cleanly when the server logs the session off.

use crate::config::ClientConfig;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::auth::{Authenticator, SessionState, SharedSessionState};
use crate::protocol::dispatcher::{Event, EventBus, Outbox, Output};
use crate::protocol::handshake::ChannelHandshake;
use crate::protocol::heartbeat::Heartbeat;
use crate::protocol::multi::MultiDispatcher;
use crate::protocol::presence::Presence;
use crate::transport::tcp::Connection;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Pause before polling the reader again after an EOF that landed exactly
/// on a frame boundary.
const EOF_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Receiving end of the host event tap.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// An authenticated-session-in-the-making over one TCP connection.
pub struct Session {
    connection: Connection,
    bus: EventBus,
    state: SharedSessionState,
    events_tx: mpsc::UnboundedSender<Event>,
    heartbeat_errors: mpsc::UnboundedReceiver<ProtocolError>,
    heartbeat_errors_closed: bool,
    cancel: CancellationToken,
    logged_off: bool,
}

impl Session {
    /// Dial a pre-resolved CM endpoint and wire up the standard modules.
    ///
    /// Returns the session and the host's event tap. Every event the
    /// pipeline fires is mirrored onto the tap, in dispatch order; hosts
    /// persist `NewLoginKey` / `MachineAuthUpdate` payloads from there.
    #[instrument(skip(config))]
    pub async fn connect(config: ClientConfig, addr: &str) -> Result<(Self, EventReceiver)> {
        let connection = Connection::dial(addr).await?;
        Ok(Self::from_connection(config, connection))
    }

    /// Wire a session over an existing connection.
    pub fn from_connection(config: ClientConfig, connection: Connection) -> (Self, EventReceiver) {
        Self::with_handshake(config, connection, ChannelHandshake::new())
    }

    /// Wire a session with a specific handshake module (tests substitute
    /// their own RSA key here).
    pub fn with_handshake(
        config: ClientConfig,
        connection: Connection,
        handshake: ChannelHandshake,
    ) -> (Self, EventReceiver) {
        let state = SharedSessionState::default();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let (heartbeat, heartbeat_errors) =
            Heartbeat::new(connection.writer.clone(), events_tx.clone());

        let mut bus = EventBus::new();
        bus.subscribe(handshake);
        bus.subscribe(MultiDispatcher::new());
        bus.subscribe(Authenticator::new(&config, Arc::clone(&state)));
        bus.subscribe(heartbeat);
        bus.subscribe(Presence::new());

        let session = Self {
            connection,
            bus,
            state,
            events_tx,
            heartbeat_errors,
            heartbeat_errors_closed: false,
            cancel: CancellationToken::new(),
            logged_off: false,
        };

        (session, events_rx)
    }

    /// Token for out-of-band shutdown. Cancelling it closes the socket and
    /// makes [`run`](Self::run) return [`ProtocolError::Cancelled`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Snapshot of the session identity.
    pub fn state(&self) -> SessionState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Drive the session until it ends.
    ///
    /// # Errors
    /// Any transport, framing, crypto, codec, or handler error is fatal
    /// and surfaces here; so does the first heartbeat write failure.
    /// A server-initiated log-off is a clean end (`Ok`).
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<()> {
        info!("session loop started");

        enum Step {
            Cancelled,
            HeartbeatError(Option<ProtocolError>),
            Frame(Option<Result<Packet>>),
        }

        loop {
            let step = tokio::select! {
                _ = self.cancel.cancelled() => Step::Cancelled,
                err = self.heartbeat_errors.recv(), if !self.heartbeat_errors_closed => {
                    Step::HeartbeatError(err)
                }
                frame = self.connection.reader.next() => Step::Frame(frame),
            };

            match step {
                Step::Cancelled => {
                    info!("session cancelled");
                    return Err(ProtocolError::Cancelled);
                }
                Step::HeartbeatError(Some(err)) => {
                    warn!(error = %err, "heartbeat failed; tearing down");
                    return Err(err);
                }
                Step::HeartbeatError(None) => self.heartbeat_errors_closed = true,
                Step::Frame(Some(Ok(packet))) => {
                    self.dispatch(packet).await?;
                    if self.logged_off {
                        info!("logged off; session loop ending");
                        return Ok(());
                    }
                }
                Step::Frame(Some(Err(err))) => return Err(err),
                // EOF on the frame boundary: transient, poll again.
                Step::Frame(None) => tokio::time::sleep(EOF_RETRY_DELAY).await,
            }
        }
    }

    /// Fan a packet out and drain every effect it produced, including
    /// re-injected inner packets, before returning to the socket.
    async fn dispatch(&mut self, packet: Packet) -> Result<()> {
        let mut outbox = Outbox::new();
        self.bus.fire_packet(&packet, &mut outbox).await?;
        self.pump(outbox).await
    }

    async fn pump(&mut self, mut outbox: Outbox) -> Result<()> {
        while let Some(output) = outbox.pop() {
            match output {
                Output::Frame(frame) => {
                    self.connection.writer.send(frame).await?;
                }
                Output::Event(event) => {
                    debug!(?event, "event");
                    if matches!(event, Event::LoggedOff { .. }) {
                        self.logged_off = true;
                    }
                    let _ = self.events_tx.send(event.clone());
                    self.bus.fire_event(&event, &mut outbox).await?;
                }
                Output::Packet(packet) => {
                    self.bus.fire_packet(&packet, &mut outbox).await?;
                }
                Output::InstallCipher(key) => {
                    info!("channel promoted to encrypted");
                    self.connection.install_cipher(&key);
                }
            }
        }
        Ok(())
    }
}
