// src/config/mod.rs

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::Deserialize;

/// Process-wide configuration, resolved once at startup.
///
/// Missing optional values fall back to defaults; missing required values
/// (platform credentials, source user) abort startup before the scheduler
/// ever runs.
#[derive(Debug, Clone, Deserialize)]
pub struct QuillConfig {
    // ── Platform API
    pub platform_base_url: String,
    pub bearer_token: String,
    pub source_user: String,

    // ── Model runtime server
    pub runtime_base_url: String,
    pub base_model: String,
    pub run_name: String,

    // ── Local state
    pub data_dir: PathBuf,

    // ── Scheduling
    pub post_interval_secs: u64,

    // ── Link probing
    pub probe_timeout_secs: u64,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => {
                    eprintln!("Config: {} = {} (from environment)", key, clean_val);
                    parsed
                }
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

fn env_var_required(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => bail!("required configuration variable {} is not set", key),
    }
}

impl QuillConfig {
    pub fn from_env() -> Result<Self> {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Ok(Self {
            platform_base_url: env_var_or(
                "QUILL_PLATFORM_BASE_URL",
                "https://api.twitter.com".to_string(),
            ),
            bearer_token: env_var_required("QUILL_BEARER_TOKEN")?,
            source_user: env_var_required("QUILL_SOURCE_USER")?,
            runtime_base_url: env_var_or(
                "QUILL_RUNTIME_BASE_URL",
                "http://localhost:8500".to_string(),
            ),
            base_model: env_var_or("QUILL_BASE_MODEL", "355M".to_string()),
            run_name: env_var_or("QUILL_RUN_NAME", "run1".to_string()),
            data_dir: PathBuf::from(env_var_or("QUILL_DATA_DIR", ".".to_string())),
            post_interval_secs: env_var_or("QUILL_POST_INTERVAL_SECS", 7200),
            probe_timeout_secs: env_var_or("QUILL_PROBE_TIMEOUT_SECS", 10),
        })
    }

    /// Per-identity corpus file: one cleaned history item per line.
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.csv", self.source_user))
    }

    /// Presence of this directory is the signal that training can be skipped.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoint").join(&self.run_name)
    }

    /// Local copy of the base pretrained model artifact.
    pub fn base_model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(&self.base_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_vars_fail() {
        std::env::remove_var("QUILL_TEST_REQUIRED");
        assert!(env_var_required("QUILL_TEST_REQUIRED").is_err());
    }

    #[test]
    fn derived_paths_use_identity() {
        let config = QuillConfig {
            platform_base_url: "https://api.example.com".into(),
            bearer_token: "token".into(),
            source_user: "pirate".into(),
            runtime_base_url: "http://localhost:8500".into(),
            base_model: "355M".into(),
            run_name: "run1".into(),
            data_dir: PathBuf::from("/var/lib/quill"),
            post_interval_secs: 7200,
            probe_timeout_secs: 10,
        };

        assert_eq!(config.corpus_path(), PathBuf::from("/var/lib/quill/pirate.csv"));
        assert_eq!(
            config.checkpoint_dir(),
            PathBuf::from("/var/lib/quill/checkpoint/run1")
        );
        assert_eq!(
            config.base_model_dir(),
            PathBuf::from("/var/lib/quill/models/355M")
        );
    }
}
