//! Keepalive loop.
//!
//! The logon response grants a heartbeat interval; from then on the
//! client must write a `ClientHeartBeat` every period or the server drops
//! the session. The loop runs as its own task with two inputs — the timer
//! and a cancellation token — and one output, a dedicated error channel
//! the orchestrator drains. The first failed write ends the loop and
//! surfaces there; a server log-off cancels the token.

use crate::core::messages::{client_message, ProtoHeader};
use crate::core::packet::EMsg;
use crate::core::proto::ClientHeartBeat;
use crate::error::ProtocolError;
use crate::protocol::dispatcher::{Event, Module, Outbox};
use crate::transport::tcp::SharedWriter;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Subscribes to the authentication events and owns the keepalive task.
pub struct Heartbeat {
    writer: SharedWriter,
    tap: mpsc::UnboundedSender<Event>,
    errors: mpsc::UnboundedSender<ProtocolError>,
    running: Option<CancellationToken>,
}

impl Heartbeat {
    /// Returns the module and the receiving end of its error surface.
    pub fn new(
        writer: SharedWriter,
        tap: mpsc::UnboundedSender<Event>,
    ) -> (Self, mpsc::UnboundedReceiver<ProtocolError>) {
        let (errors, error_rx) = mpsc::unbounded_channel();
        (
            Self {
                writer,
                tap,
                errors,
                running: None,
            },
            error_rx,
        )
    }

    fn start(&mut self, period: Duration, steam_id: u64, session_id: i32, out: &mut Outbox) {
        self.stop();

        if period.is_zero() {
            warn!("server granted a zero heartbeat interval; keepalive disabled");
            return;
        }

        out.event(Event::HeartbeatStarting { interval: period });

        let token = CancellationToken::new();
        self.running = Some(token.clone());

        let writer = self.writer.clone();
        let tap = self.tap.clone();
        let errors = self.errors.clone();

        tokio::spawn(async move {
            let header = ProtoHeader::with_session(EMsg::CLIENT_HEART_BEAT, steam_id, session_id);
            let frame = client_message(&header, &ClientHeartBeat::default());

            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("heartbeat stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = writer.send(frame.clone()).await {
                            warn!(error = %err, "heartbeat write failed");
                            let _ = errors.send(err);
                            break;
                        }
                        debug!("heartbeat tick");
                        let _ = tap.send(Event::HeartbeatTicked);
                    }
                }
            }
        });
    }

    fn stop(&mut self) {
        if let Some(token) = self.running.take() {
            token.cancel();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl Module for Heartbeat {
    async fn on_event(&mut self, event: &Event, out: &mut Outbox) -> crate::error::Result<()> {
        match event {
            Event::Authenticated {
                heartbeat,
                steam_id,
                session_id,
                ..
            } => {
                self.start(*heartbeat, *steam_id, *session_id, out);
                Ok(())
            }
            Event::LoggedOff { .. } => {
                self.stop();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
