//! Time-synced two-factor code generation.
//!
//! Codes are a 5-character variant of TOTP: HMAC-SHA1 over the 30-second
//! window counter, dynamic truncation, then five digits in a 26-character
//! alphabet. The window counter comes from the platform's own clock via
//! the `QueryTime` endpoint, so a skewed local clock does not invalidate
//! codes.

use crate::error::{ProtocolError, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, instrument};

/// Alphabet used for code characters.
const CHARS: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";

/// Width of the TOTP window in seconds.
const WINDOW_SECS: i64 = 30;

/// Server time response from the `QueryTime` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeTip {
    /// Unix seconds, transmitted as a decimal string.
    #[serde(deserialize_with = "stringified_i64")]
    pub server_time: i64,
}

#[derive(Deserialize)]
struct QueryTimeResponse {
    response: TimeTip,
}

fn stringified_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Generates two-factor codes synced to the platform clock.
pub struct TotpGenerator {
    http: reqwest::Client,
    query_time_url: String,
}

impl TotpGenerator {
    pub fn new(query_time_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            query_time_url: query_time_url.into(),
        }
    }

    /// Fetch the platform time and generate a code for it.
    ///
    /// A failed fetch surfaces here and leaves the session alone; the
    /// caller decides whether logon can proceed without the code.
    #[instrument(skip(self, shared_secret))]
    pub async fn two_factor_synced(&self, shared_secret: &str) -> Result<String> {
        let tip = self.fetch_time_tip().await?;
        debug!(server_time = tip.server_time, "time tip fetched");
        generate(shared_secret, tip.server_time)
    }

    /// POST the `QueryTime` endpoint (urlencoded content type, empty body).
    pub async fn fetch_time_tip(&self) -> Result<TimeTip> {
        let response = self
            .http
            .post(&self.query_time_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProtocolError::HttpStatus(response.status().to_string()));
        }

        let parsed: QueryTimeResponse = response.json().await?;
        Ok(parsed.response)
    }
}

/// Generate the 5-character code for a shared secret at a given timestamp.
///
/// Deterministic in `(shared_secret, timestamp / 30)`.
///
/// # Errors
/// Returns `InvalidSharedSecret` when the secret is not valid base64.
pub fn generate(shared_secret: &str, timestamp: i64) -> Result<String> {
    let key = BASE64_STANDARD.decode(shared_secret)?;

    let mut counter = [0u8; 8];
    counter[4..].copy_from_slice(&((timestamp / WINDOW_SECS) as u32).to_be_bytes());

    let mut mac = Hmac::<Sha1>::new_from_slice(&key)
        .map_err(|_| ProtocolError::MissingCredential("shared_secret"))?;
    mac.update(&counter);
    let digest = mac.finalize().into_bytes();

    let start = (digest[19] & 0x0F) as usize;
    let mut slice =
        u32::from_be_bytes([digest[start], digest[start + 1], digest[start + 2], digest[start + 3]])
            & 0x7FFF_FFFF;

    let mut code = [0u8; 5];
    for c in &mut code {
        *c = CHARS[(slice as usize) % CHARS.len()];
        slice /= CHARS.len() as u32;
    }

    Ok(String::from_utf8_lossy(&code).into_owned())
}
