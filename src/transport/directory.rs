//! CM endpoint discovery.
//!
//! The platform publishes its Connection Manager fleet through a JSON
//! directory endpoint. The session core itself accepts any pre-resolved
//! `host:port`; this module is the convenience collaborator that fetches
//! and caches the fleet list and hands out an endpoint to dial.

use crate::error::{ProtocolError, Result};
use rand_core::{OsRng, RngCore};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct CmListResponse {
    response: CmList,
}

#[derive(Debug, Default, Deserialize)]
struct CmList {
    #[serde(default)]
    serverlist: Vec<String>,
    #[serde(default)]
    serverlist_websockets: Vec<String>,
}

/// Fetches and caches the CM server fleet.
pub struct Directory {
    http: reqwest::Client,
    url: String,
    cell_id: u32,
    servers: Vec<String>,
    websockets: Vec<String>,
}

impl Directory {
    pub fn new(url: impl Into<String>, cell_id: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            cell_id,
            servers: Vec::new(),
            websockets: Vec::new(),
        }
    }

    /// Refresh the cached endpoint lists.
    ///
    /// # Errors
    /// Non-200 answers surface as their HTTP status text.
    #[instrument(skip(self), fields(cell_id = self.cell_id))]
    pub async fn refresh(&mut self) -> Result<()> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("cellId", self.cell_id)])
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(ProtocolError::HttpStatus(
                response
                    .status()
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            ));
        }

        let parsed: CmListResponse = response.json().await?;
        debug!(
            servers = parsed.response.serverlist.len(),
            websockets = parsed.response.serverlist_websockets.len(),
            "directory refreshed"
        );

        self.servers = parsed.response.serverlist;
        self.websockets = parsed.response.serverlist_websockets;
        Ok(())
    }

    /// Yield a TCP endpoint, refreshing the list on first use.
    ///
    /// Endpoints are drawn uniformly at random so connection attempts
    /// spread over the fleet.
    pub async fn pick(&mut self) -> Result<String> {
        if self.servers.is_empty() {
            self.refresh().await?;
        }

        if self.servers.is_empty() {
            return Err(ProtocolError::NoEndpoints);
        }

        let index = OsRng.next_u32() as usize % self.servers.len();
        Ok(self.servers[index].clone())
    }

    /// Currently cached TCP endpoints.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Currently cached websocket endpoints (unused by this client, cached
    /// for hosts that run their own websocket transport).
    pub fn websockets(&self) -> &[String] {
        &self.websockets
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_response_shape_parses() {
        let parsed: CmListResponse = serde_json::from_str(
            r#"{
                "response": {
                    "serverlist": ["162.254.197.39:27017", "162.254.197.40:27018"],
                    "serverlist_websockets": ["cm1.example.net:443"],
                    "result": 1,
                    "message": ""
                }
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.response.serverlist.len(), 2);
        assert_eq!(parsed.response.serverlist_websockets.len(), 1);
    }

    #[test]
    fn test_missing_lists_default_empty() {
        let parsed: CmListResponse =
            serde_json::from_str(r#"{"response": {"result": 1}}"#).unwrap();
        assert!(parsed.response.serverlist.is_empty());
    }

    #[tokio::test]
    async fn test_pick_draws_from_cached_endpoints() {
        let mut directory = Directory::new("http://unused.invalid", 7);
        directory.servers = vec!["a:1".into(), "b:2".into(), "c:3".into()];

        for _ in 0..32 {
            let endpoint = directory.pick().await.unwrap();
            assert!(directory.servers.contains(&endpoint));
        }
    }

    #[tokio::test]
    async fn test_pick_spreads_over_the_fleet() {
        let mut directory = Directory::new("http://unused.invalid", 7);
        directory.servers = (0..4).map(|n| format!("cm{n}:27017")).collect();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..256 {
            seen.insert(directory.pick().await.unwrap());
        }
        // 256 uniform draws miss one of 4 endpoints with probability
        // 4 * (3/4)^256.
        assert_eq!(seen.len(), directory.servers.len());
    }
}
