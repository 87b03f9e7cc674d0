// src/engine/runtime.rs
// Client for the external model-runtime server. The runtime owns the heavy
// lifting (fine-tuning, sampling); this side only sequences opaque calls.

use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Opaque handle to a loaded model state on the runtime server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(pub String);

/// Fixed-shape sampling request.
#[derive(Debug, Clone)]
pub struct SampleParams {
    pub count: usize,
    pub length: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub prefix: &'static str,
    pub truncate: &'static str,
}

/// Fine-tune request parameters.
#[derive(Debug, Clone)]
pub struct TrainParams {
    pub model_name: String,
    pub run_name: String,
    pub steps: u32,
    pub save_every: u32,
    pub print_every: u32,
}

#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Make the base pretrained model available locally on the runtime.
    async fn fetch_base_model(&self, model_name: &str) -> Result<()>;

    /// Long-blocking fine-tune over the dataset file. Runs to completion
    /// or failure; never interrupted from this side.
    async fn train(&self, dataset: &Path, params: &TrainParams) -> Result<()>;

    /// Load a checkpoint into a fresh session.
    async fn load_session(&self, run_name: &str) -> Result<Session>;

    /// Draw up to `params.count` samples from a loaded session.
    async fn sample(&self, session: &Session, params: &SampleParams) -> Result<Vec<String>>;

    /// Release a session's resources. The handle is consumed.
    async fn release_session(&self, session: Session) -> Result<()>;
}

pub struct HttpModelRuntime {
    client: Client,
    base_url: String,
}

impl HttpModelRuntime {
    pub fn new(base_url: String) -> Self {
        // No request timeout: train and sample are legitimately long calls.
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("model runtime {} error {}: {}", what, status, error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelRuntime for HttpModelRuntime {
    async fn fetch_base_model(&self, model_name: &str) -> Result<()> {
        let body = json!({ "model": model_name });
        let response = self
            .client
            .post(format!("{}/models/pull", self.base_url))
            .json(&body)
            .send()
            .await?;
        Self::check(response, "model pull").await?;
        Ok(())
    }

    async fn train(&self, dataset: &Path, params: &TrainParams) -> Result<()> {
        let body = json!({
            "dataset": dataset.to_string_lossy(),
            "model": params.model_name,
            "run": params.run_name,
            "steps": params.steps,
            "restore_from": "fresh",
            "save_every": params.save_every,
            "print_every": params.print_every,
        });
        debug!("Training request: run={} steps={}", params.run_name, params.steps);

        let response = self
            .client
            .post(format!("{}/train", self.base_url))
            .json(&body)
            .send()
            .await?;
        Self::check(response, "train").await?;
        Ok(())
    }

    async fn load_session(&self, run_name: &str) -> Result<Session> {
        let body = json!({ "run": run_name });
        let response = self
            .client
            .post(format!("{}/sessions", self.base_url))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "session load").await?;

        let body = response.json::<Value>().await?;
        body["session_id"]
            .as_str()
            .map(|id| Session(id.to_string()))
            .ok_or_else(|| anyhow!("no session_id in runtime response"))
    }

    async fn sample(&self, session: &Session, params: &SampleParams) -> Result<Vec<String>> {
        let body = json!({
            "nsamples": params.count,
            "length": params.length,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "prefix": params.prefix,
            "truncate": params.truncate,
        });
        debug!("Sampling {} candidates from session {}", params.count, session.0);

        let response = self
            .client
            .post(format!("{}/sessions/{}/sample", self.base_url, session.0))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "sample").await?;

        let body = response.json::<Value>().await?;
        let samples = body["samples"]
            .as_array()
            .ok_or_else(|| anyhow!("no samples in runtime response"))?
            .iter()
            .filter_map(|sample| sample.as_str().map(String::from))
            .collect();
        Ok(samples)
    }

    async fn release_session(&self, session: Session) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/sessions/{}", self.base_url, session.0))
            .send()
            .await?;
        Self::check(response, "session release").await?;
        Ok(())
    }
}
