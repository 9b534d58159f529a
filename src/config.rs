//! # Configuration Management
//!
//! Wire constants and client configuration for the CM session pipeline.
//!
//! Constants here define the frame format shared by every packet on the
//! wire; [`ClientConfig`] carries the host-supplied knobs (credentials,
//! cell id, endpoint overrides).
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment variables via `from_env()` (`CM_PROTOCOL_*`)
//! - Direct instantiation with defaults

use crate::core::packet::EMsg;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Magic present in all TCP frames, read right after the length prefix
/// (`"VT01"` little-endian).
pub const MAGIC: u32 = 0x3130_5456;

/// Bit 31 of the raw wire kind: set when the message body is protobuf-backed.
pub const PROTO_MASK: u32 = 0x8000_0000;

/// Masking a raw wire kind with this yields the [`EMsg`] code.
pub const EMSG_MASK: u32 = !PROTO_MASK;

/// Max allowed frame body size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Handshake protocol version expected in `ChannelEncryptRequest` and echoed
/// in the response.
pub const ENCRYPT_PROTOCOL_VERSION: u32 = 1;

/// Protocol version advertised in the `ClientLogon` body.
pub const LOGON_PROTOCOL_VERSION: u32 = 65580;

/// Language advertised in the `ClientLogon` body.
pub const LOGON_LANGUAGE: &str = "english";

/// Default endpoint for the two-factor time sync query.
pub const QUERY_TIME_URL: &str =
    "https://api.steampowered.com/ITwoFactorService/QueryTime/v1/";

/// Default endpoint for CM server discovery.
pub const CM_LIST_URL: &str =
    "https://api.steampowered.com/ISteamDirectory/GetCMList/v1/";

/// Logon credentials.
///
/// Username and password are always required. On a first logon without a
/// machine-auth hash the server denies with `AccountLogonDenied` and mails
/// an auth code; retry with `auth_code` set. Accounts using the mobile
/// authenticator set `shared_secret` instead and a time-synced two-factor
/// code is generated automatically.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogonDetails {
    pub username: String,
    pub password: String,
    /// E-mailed Steam Guard code, if one was requested.
    #[serde(default)]
    pub auth_code: Option<String>,
    /// Base64 shared secret for generating two-factor codes.
    #[serde(default)]
    pub shared_secret: Option<String>,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Logon credentials.
    #[serde(default)]
    pub details: LogonDetails,

    /// Cell id hint passed to CM discovery.
    #[serde(default = "default_cell_id")]
    pub cell_id: u32,

    /// Message kind used when replying to `ClientUpdateMachineAuth`.
    ///
    /// Defaults to `ClientUpdateMachineAuthResponse`. Hosts that need
    /// bug-for-bug compatibility with older clients can set this to
    /// `ClientNewLoginKeyAccepted`, which some implementations reused.
    #[serde(default = "default_machine_auth_reply_kind")]
    pub machine_auth_reply_kind: EMsg,

    /// Override for the two-factor time sync endpoint (tests, proxies).
    #[serde(default = "default_query_time_url")]
    pub query_time_url: String,

    /// Override for the CM discovery endpoint (tests, proxies).
    #[serde(default = "default_cm_list_url")]
    pub cm_list_url: String,
}

fn default_cell_id() -> u32 {
    7
}

fn default_machine_auth_reply_kind() -> EMsg {
    EMsg::CLIENT_UPDATE_MACHINE_AUTH_RESPONSE
}

fn default_query_time_url() -> String {
    QUERY_TIME_URL.to_string()
}

fn default_cm_list_url() -> String {
    CM_LIST_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            details: LogonDetails::default(),
            cell_id: default_cell_id(),
            machine_auth_reply_kind: default_machine_auth_reply_kind(),
            query_time_url: default_query_time_url(),
            cm_list_url: default_cm_list_url(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(username) = std::env::var("CM_PROTOCOL_USERNAME") {
            config.details.username = username;
        }

        if let Ok(password) = std::env::var("CM_PROTOCOL_PASSWORD") {
            config.details.password = password;
        }

        if let Ok(code) = std::env::var("CM_PROTOCOL_AUTH_CODE") {
            config.details.auth_code = Some(code);
        }

        if let Ok(secret) = std::env::var("CM_PROTOCOL_SHARED_SECRET") {
            config.details.shared_secret = Some(secret);
        }

        if let Ok(cell) = std::env::var("CM_PROTOCOL_CELL_ID") {
            if let Ok(val) = cell.parse::<u32>() {
                config.cell_id = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }
}
