//! Inbound packet container and message kind codes.
//!
//! Messages are identified by integer constants known as an `EMsg`. The
//! codes form an open 31-bit space — servers add kinds without notice — so
//! [`EMsg`] is a newtype over the raw code rather than a closed enum, with
//! the kinds this crate acts on (plus the common post-logon notifications)
//! available as associated constants.

use crate::config::{EMSG_MASK, PROTO_MASK};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 31-bit message kind code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EMsg(pub u32);

impl EMsg {
    pub const INVALID: EMsg = EMsg(0);
    pub const MULTI: EMsg = EMsg(1);

    pub const CHANNEL_ENCRYPT_REQUEST: EMsg = EMsg(1303);
    pub const CHANNEL_ENCRYPT_RESPONSE: EMsg = EMsg(1304);
    pub const CHANNEL_ENCRYPT_RESULT: EMsg = EMsg(1305);

    pub const CLIENT_HEART_BEAT: EMsg = EMsg(703);
    pub const CLIENT_CHANGE_STATUS: EMsg = EMsg(716);
    pub const CLIENT_LOG_ON_RESPONSE: EMsg = EMsg(751);
    pub const CLIENT_LOGGED_OFF: EMsg = EMsg(757);
    pub const CLIENT_PERSONA_STATE: EMsg = EMsg(766);
    pub const CLIENT_FRIENDS_LIST: EMsg = EMsg(767);
    pub const CLIENT_NEW_LOGIN_KEY: EMsg = EMsg(768);
    pub const CLIENT_NEW_LOGIN_KEY_ACCEPTED: EMsg = EMsg(769);
    pub const CLIENT_GAME_CONNECT_TOKENS: EMsg = EMsg(779);
    pub const CLIENT_LICENSE_LIST: EMsg = EMsg(780);
    pub const CLIENT_CM_LIST: EMsg = EMsg(783);
    pub const CLIENT_SESSION_TOKEN: EMsg = EMsg(850);
    pub const CLIENT_ACCOUNT_INFO: EMsg = EMsg(5456);
    pub const CLIENT_UPDATE_MACHINE_AUTH: EMsg = EMsg(5479);
    pub const CLIENT_UPDATE_MACHINE_AUTH_RESPONSE: EMsg = EMsg(5480);
    pub const CLIENT_LOGON: EMsg = EMsg(5514);

    /// Split a raw wire value into its kind and protobuf flag.
    pub fn from_raw(raw: u32) -> (EMsg, bool) {
        (EMsg(raw & EMSG_MASK), raw & PROTO_MASK != 0)
    }

    /// Raw wire value with the protobuf flag set.
    pub fn with_proto_flag(self) -> u32 {
        self.0 | PROTO_MASK
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            EMsg::INVALID => "Invalid",
            EMsg::MULTI => "Multi",
            EMsg::CHANNEL_ENCRYPT_REQUEST => "ChannelEncryptRequest",
            EMsg::CHANNEL_ENCRYPT_RESPONSE => "ChannelEncryptResponse",
            EMsg::CHANNEL_ENCRYPT_RESULT => "ChannelEncryptResult",
            EMsg::CLIENT_HEART_BEAT => "ClientHeartBeat",
            EMsg::CLIENT_CHANGE_STATUS => "ClientChangeStatus",
            EMsg::CLIENT_LOG_ON_RESPONSE => "ClientLogOnResponse",
            EMsg::CLIENT_LOGGED_OFF => "ClientLoggedOff",
            EMsg::CLIENT_PERSONA_STATE => "ClientPersonaState",
            EMsg::CLIENT_FRIENDS_LIST => "ClientFriendsList",
            EMsg::CLIENT_NEW_LOGIN_KEY => "ClientNewLoginKey",
            EMsg::CLIENT_NEW_LOGIN_KEY_ACCEPTED => "ClientNewLoginKeyAccepted",
            EMsg::CLIENT_GAME_CONNECT_TOKENS => "ClientGameConnectTokens",
            EMsg::CLIENT_LICENSE_LIST => "ClientLicenseList",
            EMsg::CLIENT_CM_LIST => "ClientCMList",
            EMsg::CLIENT_SESSION_TOKEN => "ClientSessionToken",
            EMsg::CLIENT_ACCOUNT_INFO => "ClientAccountInfo",
            EMsg::CLIENT_UPDATE_MACHINE_AUTH => "ClientUpdateMachineAuth",
            EMsg::CLIENT_UPDATE_MACHINE_AUTH_RESPONSE => "ClientUpdateMachineAuthResponse",
            EMsg::CLIENT_LOGON => "ClientLogon",
            _ => return None,
        })
    }
}

impl Default for EMsg {
    fn default() -> Self {
        EMsg::INVALID
    }
}

impl fmt::Debug for EMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "EMsg::{name}"),
            None => write!(f, "EMsg({})", self.0),
        }
    }
}

impl fmt::Display for EMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Container of message data, broadcast to packet handlers.
///
/// `data` is the full decrypted frame body, kind bytes included; handlers
/// re-read the header they care about.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: EMsg,
    /// Whether bit 31 was set on the wire. Dispatch keys only on `kind`;
    /// the flag is carried for observability.
    pub is_proto: bool,
    pub data: Bytes,
}

impl Packet {
    /// Build a packet from a decrypted frame body.
    ///
    /// # Errors
    /// Returns [`crate::error::ProtocolError::Truncated`] when the body is
    /// too short to carry a kind word.
    pub fn from_body(data: Bytes) -> crate::error::Result<Self> {
        if data.len() < 4 {
            return Err(crate::error::ProtocolError::Truncated("packet kind"));
        }

        let raw = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let (kind, is_proto) = EMsg::from_raw(raw);

        Ok(Packet {
            kind,
            is_proto,
            data,
        })
    }
}
