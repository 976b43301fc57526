//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`APP_PIPELINE__WORKERS=4` sets `pipeline.workers`). Typed sections are
//! extracted into [`RecallSettings`]; every field has a default so an empty
//! configuration still yields a runnable local setup.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::types::EMBEDDING_DIM;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Builds a config from an explicit figment; used by tests and embedders.
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn settings(&self) -> crate::Result<RecallSettings> {
        let settings: RecallSettings = self
            .figment
            .extract()
            .map_err(|e| crate::Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallSettings {
    pub storage: StorageSettings,
    pub vector: VectorSettings,
    pub records: RecordSettings,
    pub embedding: EmbeddingSettings,
    pub labelers: LabelerSettings,
    pub pipeline: PipelineSettings,
    pub audit: AuditSettings,
}

impl RecallSettings {
    fn validate(&self) -> crate::Result<()> {
        if self.vector.dim == 0 {
            return Err(crate::Error::InvalidConfig("vector.dim must be positive".into()));
        }
        if self.pipeline.retry_attempts == 0 {
            return Err(crate::Error::InvalidConfig("pipeline.retry_attempts must be at least 1".into()));
        }
        if let Some(t) = self.pipeline.merge_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(crate::Error::InvalidConfig(format!("pipeline.merge_threshold {t} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub object_root: String,
    pub public_endpoint: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { object_root: "./data/objects".into(), public_endpoint: "http://localhost:9000".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub uri: String,
    pub dim: usize,
}

impl Default for VectorSettings {
    fn default() -> Self { Self { uri: "./data/vectors".into(), dim: EMBEDDING_DIM } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSettings {
    pub path: String,
}

impl Default for RecordSettings {
    fn default() -> Self { Self { path: "./data/records.sqlite".into() } }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerSettings {
    pub endpoints: Vec<String>,
    pub describer: Option<String>,
    pub timeout_secs: u64,
    pub keywords: Option<Vec<String>>,
}

impl Default for LabelerSettings {
    fn default() -> Self { Self { endpoints: Vec::new(), describer: None, timeout_secs: 120, keywords: None } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub retry_attempts: u32,
    pub workers: usize,
    pub merge_threshold: Option<f32>,
}

impl Default for PipelineSettings {
    fn default() -> Self { Self { retry_attempts: 3, workers: 1, merge_threshold: None } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub threshold: f32,
    pub topic: String,
    pub spool_dir: String,
    pub webhook: Option<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { threshold: 0.8, topic: "file_differences".into(), spool_dir: "./data/review".into(), webhook: None }
    }
}

/// Expands `~` and `${VAR}`/`$VAR` in a configured path. An unknown variable
/// leaves the input as written; the result is not canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
