// src/engine/mod.rs
// Generation engine: owns the lazy model session and produces raw candidate
// batches. Training and sampling are opaque long-running runtime calls.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::config::QuillConfig;
use crate::corpus::collect;
use crate::platform::PlatformClient;

pub mod runtime;

use runtime::{ModelRuntime, SampleParams, Session, TrainParams};

/// Requested sample count per generation call.
pub const BATCH_TARGET: usize = 10;

/// Delimiters bounding each generated sample.
pub const START_DELIMITER: &str = "<|startoftext|>";
pub const END_DELIMITER: &str = "<|endoftext|>";

const SAMPLE_LENGTH: u32 = 200;
const SAMPLE_TEMPERATURE: f32 = 1.0;
const SAMPLE_TOP_P: f32 = 0.9;

const TRAIN_STEPS: u32 = 100;
const TRAIN_SAVE_EVERY: u32 = 50;
const TRAIN_PRINT_EVERY: u32 = 10;

pub struct GenerationEngine {
    runtime: Box<dyn ModelRuntime>,
    base_model: String,
    run_name: String,
    corpus_path: PathBuf,
    checkpoint_dir: PathBuf,
    base_model_dir: PathBuf,
    session: Option<Session>,
}

impl GenerationEngine {
    pub fn new(runtime: Box<dyn ModelRuntime>, config: &QuillConfig) -> Self {
        Self {
            runtime,
            base_model: config.base_model.clone(),
            run_name: config.run_name.clone(),
            corpus_path: config.corpus_path(),
            checkpoint_dir: config.checkpoint_dir(),
            base_model_dir: config.base_model_dir(),
            session: None,
        }
    }

    /// Make sure a trained checkpoint exists, collecting the corpus and
    /// fine-tuning if needed. A present checkpoint directory means training
    /// is skipped entirely.
    pub async fn ensure_ready(
        &mut self,
        platform: &dyn PlatformClient,
        user_id: &str,
    ) -> Result<()> {
        if !self.corpus_path.is_file() {
            info!("Fetching new history data...");
            collect::collect_history(platform, user_id, &self.corpus_path).await?;
            info!("Finished gathering history data");
        }

        if !self.checkpoint_dir.is_dir() {
            info!("Need to train a new model. This could take a while...");

            if !self.base_model_dir.is_dir() {
                info!("Downloading {} model...", self.base_model);
                self.runtime.fetch_base_model(&self.base_model).await?;
            }

            info!("Starting model training. Please be patient...");
            let params = TrainParams {
                model_name: self.base_model.clone(),
                run_name: self.run_name.clone(),
                steps: TRAIN_STEPS,
                save_every: TRAIN_SAVE_EVERY,
                print_every: TRAIN_PRINT_EVERY,
            };
            self.runtime.train(&self.corpus_path, &params).await?;
            info!("Model training complete");
        }

        info!("Generation engine initialized");
        Ok(())
    }

    /// Generate up to `count` raw samples, loading the session on first use
    /// and releasing it afterwards so the next batch reloads fresh. The
    /// session is released even when sampling fails.
    pub async fn generate_batch(&mut self, count: usize) -> Result<Vec<String>> {
        if self.session.is_none() {
            info!("Loading model...");
            let session = self.runtime.load_session(&self.run_name).await?;
            self.session = Some(session);
        }

        info!("Generating {} candidate(s)...", count);
        let params = SampleParams {
            count,
            length: SAMPLE_LENGTH,
            temperature: SAMPLE_TEMPERATURE,
            top_p: SAMPLE_TOP_P,
            prefix: START_DELIMITER,
            truncate: END_DELIMITER,
        };

        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("model session vanished before sampling"))?;
        let result = self.runtime.sample(session, &params).await;

        if let Some(session) = self.session.take() {
            if let Err(e) = self.runtime.release_session(session).await {
                warn!("Failed to release model session: {}", e);
            }
        }

        let samples = result?;
        Ok(samples
            .into_iter()
            .take(count)
            .map(|sample| sample.replace(START_DELIMITER, ""))
            .collect())
    }

    #[cfg(test)]
    pub fn has_live_session(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct RuntimeCalls {
        loads: AtomicUsize,
        releases: AtomicUsize,
        trains: AtomicUsize,
        pulls: AtomicUsize,
    }

    struct FakeRuntime {
        calls: Arc<RuntimeCalls>,
        fail_sampling: bool,
    }

    #[async_trait]
    impl ModelRuntime for FakeRuntime {
        async fn fetch_base_model(&self, _model_name: &str) -> Result<()> {
            self.calls.pulls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn train(&self, _dataset: &Path, _params: &TrainParams) -> Result<()> {
            self.calls.trains.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn load_session(&self, run_name: &str) -> Result<Session> {
            self.calls.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Session(format!("{}-session", run_name)))
        }

        async fn sample(&self, _session: &Session, params: &SampleParams) -> Result<Vec<String>> {
            if self.fail_sampling {
                return Err(anyhow!("runtime exploded"));
            }
            Ok((0..params.count)
                .map(|i| format!("{}sample {}", params.prefix, i))
                .collect())
        }

        async fn release_session(&self, _session: Session) -> Result<()> {
            self.calls.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn engine_with(calls: Arc<RuntimeCalls>, fail_sampling: bool) -> GenerationEngine {
        let dir = tempfile::tempdir().unwrap();
        let config = QuillConfig {
            platform_base_url: "https://api.example.com".into(),
            bearer_token: "token".into(),
            source_user: "pirate".into(),
            runtime_base_url: "http://localhost:8500".into(),
            base_model: "355M".into(),
            run_name: "run1".into(),
            data_dir: dir.keep(),
            post_interval_secs: 7200,
            probe_timeout_secs: 10,
        };
        let runtime = FakeRuntime {
            calls,
            fail_sampling,
        };
        GenerationEngine::new(Box::new(runtime), &config)
    }

    #[tokio::test]
    async fn batch_strips_start_delimiter_and_releases_session() {
        let calls = Arc::new(RuntimeCalls::default());
        let mut engine = engine_with(calls.clone(), false);

        let batch = engine.generate_batch(3).await.unwrap();
        assert_eq!(batch, vec!["sample 0", "sample 1", "sample 2"]);
        assert!(!engine.has_live_session());
        assert_eq!(calls.loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_batch_reloads_a_fresh_session() {
        let calls = Arc::new(RuntimeCalls::default());
        let mut engine = engine_with(calls.clone(), false);

        engine.generate_batch(1).await.unwrap();
        engine.generate_batch(1).await.unwrap();
        assert_eq!(calls.loads.load(Ordering::SeqCst), 2);
        assert_eq!(calls.releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sampling_failure_still_releases_session() {
        let calls = Arc::new(RuntimeCalls::default());
        let mut engine = engine_with(calls.clone(), true);

        assert!(engine.generate_batch(5).await.is_err());
        assert!(!engine.has_live_session());
        assert_eq!(calls.releases.load(Ordering::SeqCst), 1);
    }
}
