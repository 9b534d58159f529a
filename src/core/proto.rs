//! Protobuf message bodies used on the logon plane.
//!
//! The platform publishes these as `.proto` descriptors; the session
//! pipeline only ever encodes and decodes a handful of them, so they are
//! mirrored here as hand-written `prost` messages (no build-time codegen).
//! Field tags follow the published descriptors — only the fields this
//! client reads or writes are declared, unknown fields are skipped by
//! `prost` on decode.

/// Envelope header carried by every protobuf-backed message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHeaderData {
    #[prost(fixed64, optional, tag = "1")]
    pub steamid: Option<u64>,
    #[prost(int32, optional, tag = "2")]
    pub client_sessionid: Option<i32>,
    #[prost(fixed64, optional, tag = "10")]
    pub jobid_source: Option<u64>,
    #[prost(fixed64, optional, tag = "11")]
    pub jobid_target: Option<u64>,
}

/// `ClientLogon` request body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLogon {
    #[prost(uint32, optional, tag = "1")]
    pub protocol_version: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub cell_id: Option<u32>,
    #[prost(string, optional, tag = "6")]
    pub client_language: Option<String>,
    #[prost(string, optional, tag = "50")]
    pub account_name: Option<String>,
    #[prost(string, optional, tag = "51")]
    pub password: Option<String>,
    #[prost(bytes = "vec", optional, tag = "83")]
    pub sha_sentryfile: Option<Vec<u8>>,
    #[prost(string, optional, tag = "84")]
    pub auth_code: Option<String>,
    #[prost(string, optional, tag = "108")]
    pub two_factor_code: Option<String>,
}

/// `ClientLogOnResponse` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLogonResponse {
    #[prost(int32, optional, tag = "1")]
    pub eresult: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub out_of_game_heartbeat_seconds: Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub in_game_heartbeat_seconds: Option<i32>,
    #[prost(uint32, optional, tag = "7")]
    pub cell_id: Option<u32>,
    #[prost(fixed64, optional, tag = "20")]
    pub client_supplied_steamid: Option<u64>,
}

/// `ClientLoggedOff` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLoggedOff {
    #[prost(int32, optional, tag = "1")]
    pub eresult: Option<i32>,
}

/// `ClientNewLoginKey` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientNewLoginKey {
    #[prost(uint32, optional, tag = "1")]
    pub unique_id: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub login_key: Option<String>,
}

/// `ClientNewLoginKeyAccepted` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientNewLoginKeyAccepted {
    #[prost(uint32, optional, tag = "1")]
    pub unique_id: Option<u32>,
}

/// `ClientUpdateMachineAuth` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientUpdateMachineAuth {
    #[prost(string, optional, tag = "1")]
    pub filename: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub offset: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub cubtowrite: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub bytes: Option<Vec<u8>>,
}

/// `ClientUpdateMachineAuthResponse` body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientUpdateMachineAuthResponse {
    #[prost(string, optional, tag = "1")]
    pub filename: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub eresult: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub filesize: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub sha_file: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "6")]
    pub offset: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub cubwrote: Option<u32>,
}

/// `ClientHeartBeat` body (empty).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientHeartBeat {}

/// `ClientChangeStatus` body for the presence ping.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientChangeStatus {
    #[prost(uint32, optional, tag = "1")]
    pub persona_state: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub player_name: Option<String>,
}

/// `Multi` wrapper body.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Multi {
    #[prost(uint32, optional, tag = "1")]
    pub size_unzipped: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub message_body: Option<Vec<u8>>,
}
