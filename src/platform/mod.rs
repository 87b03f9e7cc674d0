// src/platform/mod.rs
// Social platform API client. Everything the pipeline needs from the
// platform goes through the PlatformClient trait so tests can wire fakes.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// History items are only fetched from this point forward.
const HISTORY_START_TIME: &str = "2010-11-06T00:00:00Z";

/// One page of a user's posting history.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub items: Vec<String>,
    pub next_page_token: Option<String>,
    pub result_count: usize,
    pub newest_id: Option<String>,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Resolve a username to the platform's user id.
    async fn lookup_user(&self, username: &str) -> Result<String>;

    /// Fetch one page (up to 100 items) of original posts, oldest-first
    /// pagination via `page_token`. Retweets and replies are excluded.
    async fn fetch_history(&self, user_id: &str, page_token: Option<&str>) -> Result<HistoryPage>;

    /// Publish a single post.
    async fn create_post(&self, text: &str) -> Result<()>;
}

pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpPlatformClient {
    pub fn new(base_url: String, bearer_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            bearer_token,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.bearer_token)
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn lookup_user(&self, username: &str) -> Result<String> {
        let url = format!("{}/2/users/by/username/{}", self.base_url, username);
        debug!("Looking up user @{}", username);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("user lookup failed {}: {}", status, error_text));
        }

        let body = response.json::<Value>().await?;
        body["data"]["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow!("no user id in lookup response for @{}", username))
    }

    async fn fetch_history(&self, user_id: &str, page_token: Option<&str>) -> Result<HistoryPage> {
        let url = format!("{}/2/users/{}/tweets", self.base_url, user_id);

        let mut request = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&[
                ("max_results", "100"),
                ("exclude", "retweets,replies"),
                ("start_time", HISTORY_START_TIME),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pagination_token", token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("history fetch failed {}: {}", status, error_text));
        }

        let body = response.json::<Value>().await?;

        let items = body["data"]
            .as_array()
            .map(|posts| {
                posts
                    .iter()
                    .filter_map(|post| post["text"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let meta = &body["meta"];
        Ok(HistoryPage {
            items,
            next_page_token: meta["next_token"].as_str().map(String::from),
            result_count: meta["result_count"].as_u64().unwrap_or(0) as usize,
            newest_id: meta["newest_id"].as_str().map(String::from),
        })
    }

    async fn create_post(&self, text: &str) -> Result<()> {
        let url = format!("{}/2/tweets", self.base_url);
        let body = json!({ "text": text });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("post creation failed {}: {}", status, error_text));
        }

        Ok(())
    }
}
