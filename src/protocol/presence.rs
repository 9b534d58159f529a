//! Post-logon presence ping.
//!
//! Immediately after a successful logon the client announces itself
//! online with a `ClientChangeStatus`; without it the account shows as
//! offline to the rest of the platform.

use crate::core::messages::{client_message, ProtoHeader};
use crate::core::packet::EMsg;
use crate::core::proto::ClientChangeStatus;
use crate::core::types::EPersonaState;
use crate::error::Result;
use crate::protocol::dispatcher::{Event, Module, Outbox};
use async_trait::async_trait;
use tracing::debug;

/// Announces the persona online once the session is authenticated.
#[derive(Debug, Default)]
pub struct Presence;

impl Presence {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for Presence {
    async fn on_event(&mut self, event: &Event, out: &mut Outbox) -> Result<()> {
        if let Event::Authenticated {
            steam_id,
            session_id,
            ..
        } = event
        {
            debug!("announcing persona online");
            let header =
                ProtoHeader::with_session(EMsg::CLIENT_CHANGE_STATUS, *steam_id, *session_id);
            let body = ClientChangeStatus {
                persona_state: Some(EPersonaState::Online as u32),
                ..Default::default()
            };
            out.frame(client_message(&header, &body));
        }
        Ok(())
    }
}
