use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk sent to the embedding endpoint.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on concurrent per-chunk embedding calls for one document.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// How many questions to ask the model for per batch.
    #[serde(default = "default_num_questions")]
    pub num_questions: usize,
    /// Character prefix of the document embedded into the initial prompt.
    #[serde(default = "default_initial_context_chars")]
    pub initial_context_chars: usize,
    /// Character prefix of the document appended to follow-up prompts.
    #[serde(default = "default_followup_context_chars")]
    pub followup_context_chars: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            num_questions: default_num_questions(),
            initial_context_chars: default_initial_context_chars(),
            followup_context_chars: default_followup_context_chars(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Key prefix for uploaded files; objects land at `{prefix}/{uuid}-{name}`.
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            upload_prefix: default_upload_prefix(),
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Speech-to-text HTTP endpoint. Audio answers are rejected when unset.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_transcribe_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            model: None,
            timeout_secs: default_transcribe_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    4
}
fn default_num_questions() -> usize {
    5
}
fn default_initial_context_chars() -> usize {
    4000
}
fn default_followup_context_chars() -> usize {
    2000
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_upload_prefix() -> String {
    "uploads".to_string()
}
fn default_transcribe_timeout_secs() -> u64 {
    120
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.max_concurrency == 0 {
            anyhow::bail!("embedding.max_concurrency must be > 0");
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "jina" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or jina.",
            other
        ),
    }

    if config.generation.is_enabled() {
        if config.generation.model.is_none() {
            anyhow::bail!(
                "generation.model must be specified when provider is '{}'",
                config.generation.provider
            );
        }
        if config.generation.num_questions == 0 {
            anyhow::bail!("generation.num_questions must be > 0");
        }
    }
    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[db]
path = "data/recall.sqlite"

[server]
bind = "127.0.0.1:7431"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunking.max_chars, 8000);
        assert!(!config.embedding.is_enabled());
        assert!(!config.generation.is_enabled());
        assert_eq!(config.generation.initial_context_chars, 4000);
        assert_eq!(config.generation.followup_context_chars, 2000);
        assert_eq!(config.storage.upload_prefix, "uploads");
    }

    #[test]
    fn enabled_embedding_requires_model() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[db]
path = "data/recall.sqlite"

[embedding]
provider = "jina"

[server]
bind = "127.0.0.1:7431"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[db]
path = "data/recall.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"

[server]
bind = "127.0.0.1:7431"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
