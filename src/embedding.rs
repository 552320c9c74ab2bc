//! Embedding provider abstraction and document-level aggregation.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`JinaProvider`]** — calls the Jina AI embeddings API with retry and backoff.
//!
//! [`embed_document`] turns arbitrarily long text into one document-level
//! vector: texts within the chunk budget are embedded with a single call;
//! longer texts are split on paragraph boundaries, each chunk is embedded
//! concurrently (bounded by a concurrency limit), and the chunk vectors are
//! combined by element-wise arithmetic mean. The mean is order-independent,
//! which is what makes concurrent dispatch safe.
//!
//! Failure policy: a failed chunk is dropped from the mean (fail-soft); the
//! aggregator only fails with `EmbeddingUnavailable` when every chunk fails.
//!
//! Also provides vector codecs for SQLite BLOB storage:
//! [`vec_to_blob`] / [`blob_to_vec`] (little-endian `f32` bytes).
//!
//! # Retry Strategy
//!
//! The Jina provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use tracing::warn;

use crate::chunk::{char_len, chunk_by_chars};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Trait for embedding backends: text in, fixed-dimension vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"jina-embeddings-v2-base-en"`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed a full document into one vector.
///
/// Texts within `max_chunk_size` characters are embedded with a single
/// endpoint call. Longer texts are chunked, embedded with at most
/// `max_concurrency` in-flight calls, and averaged element-wise.
///
/// # Errors
///
/// - `EmbeddingUnavailable` — the text is empty, or every chunk call failed.
/// - `DimensionMismatch` — successful chunk vectors disagree on length.
pub async fn embed_document(
    provider: &dyn EmbeddingProvider,
    text: &str,
    max_chunk_size: usize,
    max_concurrency: usize,
) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
        return Err(Error::EmbeddingUnavailable(
            "cannot embed empty text".to_string(),
        ));
    }

    if char_len(text) <= max_chunk_size {
        return provider.embed(text).await;
    }

    let chunks = chunk_by_chars(text, max_chunk_size);

    let futures: Vec<_> = chunks.iter().map(|c| provider.embed(c)).collect();
    let results: Vec<Result<Vec<f32>>> = stream::iter(futures)
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let total = results.len();
    let mut vectors = Vec::with_capacity(total);
    let mut last_err: Option<Error> = None;

    for result in results {
        match result {
            Ok(v) => vectors.push(v),
            Err(e) => {
                warn!(error = %e, "chunk embedding failed, excluding from mean");
                last_err = Some(e);
            }
        }
    }

    if vectors.is_empty() {
        let detail = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no chunks produced".to_string());
        return Err(Error::EmbeddingUnavailable(format!(
            "all {} chunk embeddings failed: {}",
            total, detail
        )));
    }

    mean_vectors(&vectors)
}

/// Embed a batch of independent texts via the single-text path.
///
/// Returns one `Result` per input, in input order: failures are reported
/// per item rather than silently omitted, so callers can see exactly which
/// texts were dropped. Calls run concurrently, bounded by `max_concurrency`.
pub async fn embed_batch(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    max_concurrency: usize,
) -> Vec<Result<Vec<f32>>> {
    let futures: Vec<_> = texts.iter().map(|t| provider.embed(t)).collect();
    stream::iter(futures)
        .buffered(max_concurrency.max(1))
        .collect()
        .await
}

/// Element-wise arithmetic mean of equally sized vectors.
///
/// Fails with `DimensionMismatch` if any vector's length differs from the
/// first, and `InvalidVector` for an empty input set.
pub fn mean_vectors(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = vectors
        .first()
        .ok_or_else(|| Error::InvalidVector("cannot average zero vectors".to_string()))?;
    let dims = first.len();

    let mut sums = vec![0.0f64; dims];
    for vector in vectors {
        if vector.len() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
        for (sum, &v) in sums.iter_mut().zip(vector.iter()) {
            *sum += v as f64;
        }
    }

    let n = vectors.len() as f64;
    Ok(sums.into_iter().map(|s| (s / n) as f32).collect())
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Jina Provider ============

/// Embedding provider using the Jina AI API.
///
/// Calls `POST https://api.jina.ai/v1/embeddings` with the configured model.
/// Requires the `JINA_API_KEY` environment variable to be set.
pub struct JinaProvider {
    model: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

const JINA_API_URL: &str = "https://api.jina.ai/v1/embeddings";

impl JinaProvider {
    /// Create a new Jina provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or `JINA_API_KEY`
    /// is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::EmbeddingUnavailable("embedding.model required for Jina provider".to_string())
        })?;

        let api_key = std::env::var("JINA_API_KEY").map_err(|_| {
            Error::EmbeddingUnavailable("JINA_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            model,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for JinaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(JINA_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;
                        let mut vectors = parse_embeddings_response(&json)?;
                        return vectors.pop().ok_or_else(|| {
                            Error::EmbeddingUnavailable("empty embedding response".to_string())
                        });
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::EmbeddingUnavailable(format!(
                            "Jina API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingUnavailable(format!(
                        "Jina API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::EmbeddingUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::EmbeddingUnavailable("embedding failed after retries".to_string())
        }))
    }
}

/// Parse an OpenAI-style embeddings response (`data[].embedding`).
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        Error::EmbeddingUnavailable("invalid embeddings response: missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingUnavailable(
                    "invalid embeddings response: missing embedding".to_string(),
                )
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "jina" => Ok(Box::new(JinaProvider::new(config)?)),
        other => Err(Error::EmbeddingUnavailable(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a BLOB
/// of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: returns a fixed vector per text, or fails for
    /// texts containing a marker. Counts calls.
    struct ScriptedProvider {
        calls: AtomicUsize,
        fail_marker: Option<&'static str>,
        dims: usize,
    }

    impl ScriptedProvider {
        fn new(dims: usize, fail_marker: Option<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_marker,
                dims,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.fail_marker {
                if text.contains(marker) {
                    return Err(Error::EmbeddingUnavailable("scripted failure".to_string()));
                }
            }
            // First char code as the leading component, rest zeros.
            let lead = text.chars().next().map(|c| c as u32 as f32).unwrap_or(0.0);
            let mut v = vec![0.0; self.dims];
            v[0] = lead;
            Ok(v)
        }
    }

    #[test]
    fn blob_round_trip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn mean_of_two_vectors() {
        let mean = mean_vectors(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_rejects_dimension_mismatch() {
        let err = mean_vectors(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn mean_is_order_independent() {
        let a = vec![1.0, 8.0, -2.0];
        let b = vec![3.0, 0.0, 6.0];
        let c = vec![5.0, 4.0, 2.0];
        let forward = mean_vectors(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let reversed = mean_vectors(&[c, b, a]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[tokio::test]
    async fn short_text_embeds_with_single_call() {
        let provider = ScriptedProvider::new(4, None);
        let result = embed_document(&provider, "short text", 100, 4).await.unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn long_text_is_chunked_and_averaged() {
        let provider = ScriptedProvider::new(2, None);
        // Two paragraphs, each over half the limit: forces two chunks.
        let text = "aaaaaaaaaa\n\naaaaaaaaaa";
        let result = embed_document(&provider, text, 12, 4).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        // Both chunks start with 'a' (97.0), so the mean keeps it.
        assert_eq!(result, vec![97.0, 0.0]);
    }

    #[tokio::test]
    async fn failed_chunks_are_excluded_from_mean() {
        let provider = ScriptedProvider::new(2, Some("BAD"));
        let text = "aaaaaaaaaa\n\nBADBADBADB";
        let result = embed_document(&provider, text, 12, 4).await.unwrap();
        assert_eq!(result, vec![97.0, 0.0]);
    }

    #[tokio::test]
    async fn all_chunks_failing_is_an_error() {
        let provider = ScriptedProvider::new(2, Some("BAD"));
        let text = "BADBADBADB\n\nBADBADBADB";
        let err = embed_document(&provider, text, 12, 4).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_text_is_an_error() {
        let provider = ScriptedProvider::new(2, None);
        let err = embed_document(&provider, "   ", 12, 4).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn batch_reports_per_item_results() {
        let provider = ScriptedProvider::new(2, Some("BAD"));
        let texts = vec![
            "alpha".to_string(),
            "BAD item".to_string(),
            "gamma".to_string(),
        ];
        let results = embed_batch(&provider, &texts, 2).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn parse_response_extracts_vectors() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]},
            ]
        });
        let vectors = parse_embeddings_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1].len(), 2);
    }

    #[test]
    fn parse_response_rejects_missing_data() {
        let json = serde_json::json!({"oops": true});
        assert!(parse_embeddings_response(&json).is_err());
    }
}
