//! Logon state machine.
//!
//! The general gist of a sign-on, after the channel is encrypted:
//!
//! - `ClientLogon` (client→server): credentials plus an optional Steam
//!   Guard auth code or generated two-factor code.
//! - `ClientLogOnResponse` (server→client): result, the heartbeat
//!   interval, and the authoritative session id in the header.
//! - `ClientLoggedOff` (server→client): the server ended the session.
//! - `ClientNewLoginKey` (server→client): a fresh login key to persist;
//!   acknowledged with `ClientNewLoginKeyAccepted`.
//! - `ClientUpdateMachineAuth` (server→client): sentry bytes to hash and
//!   persist; answered with the SHA-1 as proof of device trust.
//!
//! Rejections and log-offs are events for the host, not errors: the
//! session keeps running until the host decides otherwise.

use crate::config::{ClientConfig, LogonDetails, LOGON_LANGUAGE, LOGON_PROTOCOL_VERSION};
use crate::core::messages::{client_message, ProtoHeader};
use crate::core::packet::{EMsg, Packet};
use crate::core::proto;
use crate::core::types::{EResult, SteamId};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{Event, Module, Outbox};
use crate::utils::totp::TotpGenerator;
use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use sha1::{Digest, Sha1};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mutable session identity, written once at logon time and read by the
/// host across the task boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionState {
    pub steam_id: u64,
    pub session_id: i32,
}

pub type SharedSessionState = Arc<Mutex<SessionState>>;

fn lock_state(state: &SharedSessionState) -> std::sync::MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Drives logon and the post-logon account maintenance messages.
pub struct Authenticator {
    details: LogonDetails,
    machine_auth_reply_kind: EMsg,
    totp: TotpGenerator,
    state: SharedSessionState,
    steam_id: u64,
    session_id: i32,
}

impl Authenticator {
    pub fn new(config: &ClientConfig, state: SharedSessionState) -> Self {
        Self {
            details: config.details.clone(),
            machine_auth_reply_kind: config.machine_auth_reply_kind,
            totp: TotpGenerator::new(config.query_time_url.clone()),
            state,
            steam_id: 0,
            session_id: 0,
        }
    }

    fn session_header(&self, kind: EMsg) -> ProtoHeader {
        ProtoHeader::with_session(kind, self.steam_id, self.session_id)
    }

    async fn handle_channel_ready(&mut self, out: &mut Outbox) -> Result<()> {
        if self.details.username.is_empty() {
            return Err(ProtocolError::MissingCredential("username"));
        }
        if self.details.password.is_empty() {
            return Err(ProtocolError::MissingCredential("password"));
        }

        // Anonymous individual id until the server assigns a real one.
        self.steam_id = SteamId::logon_placeholder().0;
        self.session_id = 0;
        {
            let mut state = lock_state(&self.state);
            state.steam_id = self.steam_id;
            state.session_id = self.session_id;
        }

        let mut body = proto::ClientLogon {
            protocol_version: Some(LOGON_PROTOCOL_VERSION),
            client_language: Some(LOGON_LANGUAGE.to_string()),
            account_name: Some(self.details.username.clone()),
            password: Some(self.details.password.clone()),
            ..Default::default()
        };

        if let Some(code) = &self.details.auth_code {
            body.auth_code = Some(code.clone());
        }

        if let Some(secret) = &self.details.shared_secret {
            let code = self.totp.two_factor_synced(secret).await?;
            body.two_factor_code = Some(code);
        }

        info!(account = %self.details.username, "sending logon");
        out.frame(client_message(&self.session_header(EMsg::CLIENT_LOGON), &body));
        Ok(())
    }

    fn handle_logon_response(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let mut data = Bytes::clone(&packet.data);
        let header = ProtoHeader::read_from(&mut data)?;
        let msg = proto::ClientLogonResponse::decode(data)?;

        let result = EResult(msg.eresult.unwrap_or(EResult::INVALID.0));
        if !result.is_ok() {
            warn!(?result, "logon rejected");
            out.event(Event::AuthFailed { result });
            return Ok(());
        }

        let heartbeat_secs = msg.out_of_game_heartbeat_seconds.unwrap_or(0).max(0) as u64;
        info!(heartbeat_secs, "logon accepted");

        out.event(Event::Authenticated {
            heartbeat: Duration::from_secs(heartbeat_secs),
            steam_id: self.steam_id,
            session_id: self.session_id,
            server_session_id: header.proto.client_sessionid,
        });
        Ok(())
    }

    fn handle_logged_off(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let mut data = Bytes::clone(&packet.data);
        let _header = ProtoHeader::read_from(&mut data)?;
        let msg = proto::ClientLoggedOff::decode(data)?;

        let result = EResult(msg.eresult.unwrap_or(EResult::INVALID.0));
        info!(?result, "logged off by server");
        out.event(Event::LoggedOff { result });
        Ok(())
    }

    fn handle_new_login_key(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let mut data = Bytes::clone(&packet.data);
        let _header = ProtoHeader::read_from(&mut data)?;
        let msg = proto::ClientNewLoginKey::decode(data)?;

        let unique_id = msg.unique_id.unwrap_or(0);
        let key = msg.login_key.unwrap_or_default();
        debug!(unique_id, "accepting new login key");

        let reply = proto::ClientNewLoginKeyAccepted {
            unique_id: Some(unique_id),
        };
        out.frame(client_message(
            &self.session_header(EMsg::CLIENT_NEW_LOGIN_KEY_ACCEPTED),
            &reply,
        ));
        out.event(Event::NewLoginKey { unique_id, key });
        Ok(())
    }

    fn handle_update_machine_auth(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        let mut data = Bytes::clone(&packet.data);
        let header = ProtoHeader::read_from(&mut data)?;
        let msg = proto::ClientUpdateMachineAuth::decode(data)?;

        let hash = Sha1::digest(msg.bytes.unwrap_or_default()).to_vec();
        debug!("answering machine auth update");

        let mut reply_header = self.session_header(self.machine_auth_reply_kind);
        reply_header.proto.jobid_target = header.proto.jobid_source;

        let reply = proto::ClientUpdateMachineAuthResponse {
            sha_file: Some(hash.clone()),
            ..Default::default()
        };
        out.frame(client_message(&reply_header, &reply));
        out.event(Event::MachineAuthUpdate { hash });
        Ok(())
    }
}

#[async_trait]
impl Module for Authenticator {
    async fn on_packet(&mut self, packet: &Packet, out: &mut Outbox) -> Result<()> {
        match packet.kind {
            EMsg::CLIENT_LOG_ON_RESPONSE => self.handle_logon_response(packet, out),
            EMsg::CLIENT_LOGGED_OFF => self.handle_logged_off(packet, out),
            EMsg::CLIENT_NEW_LOGIN_KEY => self.handle_new_login_key(packet, out),
            EMsg::CLIENT_UPDATE_MACHINE_AUTH => self.handle_update_machine_auth(packet, out),
            _ => Ok(()),
        }
    }

    async fn on_event(&mut self, event: &Event, out: &mut Outbox) -> Result<()> {
        match event {
            Event::ChannelReady => self.handle_channel_ready(out).await,
            _ => Ok(()),
        }
    }
}
