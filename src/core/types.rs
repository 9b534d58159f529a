//! Shared protocol scalar types: result codes, universes, account types,
//! persona states, and the packed 64-bit steam id.

use std::fmt;

/// Server-reported result code.
///
/// Like [`crate::core::packet::EMsg`], the full code space is open; the
/// constants cover the results the session pipeline inspects plus the
/// common logon failures hosts match on.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EResult(pub i32);

impl EResult {
    pub const INVALID: EResult = EResult(0);
    pub const OK: EResult = EResult(1);
    pub const FAIL: EResult = EResult(2);
    pub const NO_CONNECTION: EResult = EResult(3);
    pub const INVALID_PASSWORD: EResult = EResult(5);
    pub const LOGGED_IN_ELSEWHERE: EResult = EResult(6);
    pub const INVALID_PROTOCOL_VER: EResult = EResult(7);
    pub const BUSY: EResult = EResult(10);
    pub const INVALID_STEAM_ID: EResult = EResult(19);
    pub const SERVICE_UNAVAILABLE: EResult = EResult(20);
    pub const ACCOUNT_LOGON_DENIED: EResult = EResult(63);
    pub const ACCOUNT_LOGIN_DENIED_NEED_TWO_FACTOR: EResult = EResult(85);
    pub const TWO_FACTOR_CODE_MISMATCH: EResult = EResult(88);

    pub fn is_ok(self) -> bool {
        self == EResult::OK
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            EResult::INVALID => "Invalid",
            EResult::OK => "OK",
            EResult::FAIL => "Fail",
            EResult::NO_CONNECTION => "NoConnection",
            EResult::INVALID_PASSWORD => "InvalidPassword",
            EResult::LOGGED_IN_ELSEWHERE => "LoggedInElsewhere",
            EResult::INVALID_PROTOCOL_VER => "InvalidProtocolVer",
            EResult::BUSY => "Busy",
            EResult::INVALID_STEAM_ID => "InvalidSteamID",
            EResult::SERVICE_UNAVAILABLE => "ServiceUnavailable",
            EResult::ACCOUNT_LOGON_DENIED => "AccountLogonDenied",
            EResult::ACCOUNT_LOGIN_DENIED_NEED_TWO_FACTOR => "AccountLoginDeniedNeedTwoFactor",
            EResult::TWO_FACTOR_CODE_MISMATCH => "TwoFactorCodeMismatch",
            _ => return None,
        })
    }
}

impl fmt::Debug for EResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "EResult::{name}"),
            None => write!(f, "EResult({})", self.0),
        }
    }
}

/// Deployment realm. Only `Public` is supported by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EUniverse {
    Invalid = 0,
    Public = 1,
    Beta = 2,
    Internal = 3,
    Dev = 4,
}

/// Account type half-nibble packed into the steam id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EAccountType {
    Invalid = 0,
    Individual = 1,
    Multiseat = 2,
    GameServer = 3,
    AnonGameServer = 4,
    Pending = 5,
    ContentServer = 6,
    Clan = 7,
    Chat = 8,
    AnonUser = 10,
}

/// Persona visibility state for the presence ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EPersonaState {
    Offline = 0,
    Online = 1,
    Busy = 2,
    Away = 3,
    Snooze = 4,
}

/// A packed 64-bit steam identifier:
/// `universe(8) | account_type(4) | instance(20) | account_id(32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SteamId(pub u64);

impl SteamId {
    pub fn new(
        account_id: u32,
        instance: u32,
        universe: EUniverse,
        account_type: EAccountType,
    ) -> Self {
        let packed = ((universe as u64) << 56)
            | ((account_type as u64) << 52)
            | (u64::from(instance & 0x000F_FFFF) << 32)
            | u64::from(account_id);
        SteamId(packed)
    }

    /// The anonymous individual id used for the initial logon.
    pub fn logon_placeholder() -> Self {
        SteamId::new(0, 1, EUniverse::Public, EAccountType::Individual)
    }

    pub fn account_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn universe(self) -> i32 {
        (self.0 >> 56) as i32
    }
}
