use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub chunking: ChunkConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub sparse: SparseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexingConfig {
    /// Glob patterns excluded from folder walks, on top of the built-in
    /// dotfile skipping.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_dense_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_dense_provider(),
            model: None,
            url: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_dense_provider() -> String {
    "hash".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SparseConfig {
    #[serde(default = "default_sparse_provider")]
    pub provider: String,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            provider: default_sparse_provider(),
        }
    }
}

fn default_sparse_provider() -> String {
    "hash".to_string()
}

impl SparseConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Weight of the sparse side in hybrid fusion; 0.0 is pure dense.
    #[serde(default = "default_sparse_weight")]
    pub sparse_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            sparse_weight: default_sparse_weight(),
        }
    }
}

fn default_limit() -> usize {
    10
}
fn default_sparse_weight() -> f64 {
    0.4
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Managed root the `watch` command observes recursively.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate search
    if config.search.default_limit == 0 {
        anyhow::bail!("search.default_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.search.sparse_weight) {
        anyhow::bail!("search.sparse_weight must be in [0.0, 1.0]");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "hash" => {}
        "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be set when provider is 'ollama'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash or ollama.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.sparse.provider.as_str() {
        "hash" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown sparse provider: '{}'. Must be hash or disabled.",
            other
        ),
    }

    // Validate walk exclusions eagerly so a bad pattern fails at startup
    for pattern in &config.indexing.exclude_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("invalid indexing.exclude_globs pattern: {}", pattern))?;
    }

    if config.worker.poll_interval_secs == 0 {
        anyhow::bail!("worker.poll_interval_secs must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resift.toml");
        fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let (_dir, path) = write_config("[db]\npath = \"/tmp/resift.sqlite\"\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.sparse.provider, "hash");
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.worker.poll_interval_secs, 5);
        assert_eq!(config.watcher.debounce_ms, 500);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let (_dir, path) = write_config(
            "[db]\npath = \"/tmp/resift.sqlite\"\n\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        );
        let err = load_config(&path).unwrap_err().to_string();
        assert!(err.contains("chunk_overlap"));
    }

    #[test]
    fn test_sparse_weight_range_enforced() {
        let (_dir, path) = write_config(
            "[db]\npath = \"/tmp/resift.sqlite\"\n\n[search]\nsparse_weight = 1.5\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_dir, path) = write_config(
            "[db]\npath = \"/tmp/resift.sqlite\"\n\n[embedding]\nprovider = \"quantum\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_ollama_requires_model() {
        let (_dir, path) = write_config(
            "[db]\npath = \"/tmp/resift.sqlite\"\n\n[embedding]\nprovider = \"ollama\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_bad_exclude_glob_rejected() {
        let (_dir, path) = write_config(
            "[db]\npath = \"/tmp/resift.sqlite\"\n\n[indexing]\nexclude_globs = [\"[\"]\n",
        );
        assert!(load_config(&path).is_err());
    }
}
