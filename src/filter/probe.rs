// src/filter/probe.rs
// Network reachability checks for link-shaped tokens.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Answers "does this address point at a live resource?". Behind a trait
/// so filter tests never touch the network.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// True only for a confirmed-reachable resource. Malformed addresses
    /// and network failures are both negative results.
    async fn is_reachable(&self, address: &str) -> bool;
}

pub struct HttpLinkProbe {
    client: Client,
}

impl HttpLinkProbe {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn is_reachable(&self, address: &str) -> bool {
        let url = match Url::parse(address) {
            Ok(url) => url,
            Err(e) => {
                debug!("Ignoring unparseable address {}: {}", address, e);
                return false;
            }
        };

        match self.client.get(url).send().await {
            Ok(response) => {
                // Anything below 400 counts as a live resource, including a
                // bare redirect the client did not follow.
                let status = response.status();
                !status.is_client_error() && !status.is_server_error()
            }
            Err(e) => {
                debug!("Probe failed for {}: {}", address, e);
                false
            }
        }
    }
}
