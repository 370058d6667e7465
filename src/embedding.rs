//! Embedding providers and vector utilities.
//!
//! Dense and sparse embedding sit behind the [`DenseEmbedder`] and
//! [`SparseEmbedder`] traits so the indexer and search engine never know
//! which model produced a vector. Bundled implementations:
//!
//! - **[`HashEmbedder`]** — deterministic local feature hashing (FNV-1a with
//!   a sign bit) into a fixed-dimension L2-normalized vector. No network, no
//!   model files; the default and the provider used by the test suite.
//! - **[`HashSparseEmbedder`]** — lexical companion: tokens hashed into a
//!   2^20 index space with log-scaled term-frequency values.
//! - **[`OllamaEmbedder`]** — remote dense provider speaking the Ollama
//!   `/api/embeddings` protocol, with bounded retry and exponential backoff
//!   (429/5xx/network retried, other 4xx fatal).
//!
//! Also provides the BLOB codecs used for SQLite storage
//! ([`vec_to_blob`]/[`blob_to_vec`], [`indices_to_blob`]/[`blob_to_indices`])
//! and the in-process similarity kernels ([`cosine_similarity`],
//! [`sparse_dot`]).

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::{EmbeddingConfig, SparseConfig};

/// Batch dense embedding seam.
#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    /// Vector dimensionality every returned embedding must have.
    fn dims(&self) -> usize;
    /// Model identifier recorded for diagnostics.
    fn model_name(&self) -> &str;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sparse (keyword-weighted) embedding seam.
#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>>;
    async fn embed_query(&self, text: &str) -> Result<SparseVector>;
}

/// Sparse vector as parallel index/value arrays, indices sorted ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Instantiate the configured dense provider.
pub fn create_dense_embedder(config: &EmbeddingConfig) -> Result<std::sync::Arc<dyn DenseEmbedder>> {
    match config.provider.as_str() {
        "hash" => Ok(std::sync::Arc::new(HashEmbedder::new(config.dims))),
        "ollama" => Ok(std::sync::Arc::new(OllamaEmbedder::new(config)?)),
        other => bail!("unknown embedding provider: {}", other),
    }
}

/// Instantiate the configured sparse provider; `None` means hybrid search
/// degrades to dense-only.
pub fn create_sparse_embedder(
    config: &SparseConfig,
) -> Result<Option<std::sync::Arc<dyn SparseEmbedder>>> {
    match config.provider.as_str() {
        "hash" => Ok(Some(std::sync::Arc::new(HashSparseEmbedder::new()))),
        "disabled" => Ok(None),
        other => bail!("unknown sparse provider: {}", other),
    }
}

// ============ Hash Providers ============

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a, fixed across platforms and releases so stored vectors stay
/// comparable with freshly computed ones.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Deterministic local dense provider: signed feature hashing of tokens into
/// `dims` buckets, L2-normalized.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        HashEmbedder { dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let h = fnv1a64(token.as_bytes());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 32) & 1 == 1 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl DenseEmbedder for HashEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_one(text))
    }
}

/// Sparse index space for the hash provider.
const SPARSE_SPACE: u64 = 1 << 20;

/// Lexical sparse provider: token hash → index, value `1 + ln(tf)` for
/// documents and a flat `1.0` per distinct token for queries.
pub struct HashSparseEmbedder;

impl HashSparseEmbedder {
    pub fn new() -> Self {
        HashSparseEmbedder
    }

    fn embed_one(&self, text: &str, query: bool) -> SparseVector {
        use std::collections::BTreeMap;
        let mut tf: BTreeMap<u32, f32> = BTreeMap::new();
        for token in tokenize(text) {
            let idx = (fnv1a64(token.as_bytes()) % SPARSE_SPACE) as u32;
            *tf.entry(idx).or_insert(0.0) += 1.0;
        }
        let (indices, values) = tf
            .into_iter()
            .map(|(i, count)| (i, if query { 1.0 } else { 1.0 + count.ln() }))
            .unzip();
        SparseVector { indices, values }
    }
}

impl Default for HashSparseEmbedder {
    fn default() -> Self {
        HashSparseEmbedder::new()
    }
}

#[async_trait]
impl SparseEmbedder for HashSparseEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>> {
        Ok(texts.iter().map(|t| self.embed_one(t, false)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<SparseVector> {
        Ok(self.embed_one(text, true))
    }
}

// ============ Ollama Provider ============

/// Remote dense provider for an Ollama-compatible endpoint.
///
/// The embeddings API takes one prompt per request, so a batch is a request
/// loop; each request retries on 429/5xx/network errors with exponential
/// backoff (1s, 2s, 4s, ... capped at 2^5).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for the ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(OllamaEmbedder {
            client,
            url,
            model,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let endpoint = format!("{}/api/embeddings", self.url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.client.post(&endpoint).json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_response(&json);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("ollama API error {}: {}", status, body_text));
                        continue;
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("invalid ollama response: missing embedding array"))?;
    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

#[async_trait]
impl DenseEmbedder for OllamaEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }
}

// ============ Vector Utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
///
/// ```rust
/// use resift::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Encode sparse indices as little-endian u32 bytes.
pub fn indices_to_blob(indices: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(indices.len() * 4);
    for &i in indices {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`indices_to_blob`].
pub fn blob_to_indices(blob: &[u8]) -> Vec<u32> {
    blob.chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Dot product of two sparse vectors over their shared indices.
/// Both index lists must be sorted ascending.
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let mut score = 0.0f32;
    let (mut i, mut j) = (0, 0);
    while i < a.indices.len() && j < b.indices.len() {
        match a.indices[i].cmp(&b.indices[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                score += a.values[i] * b.values[j];
                i += 1;
                j += 1;
            }
        }
    }
    score
}
