//! Application configuration, loaded from environment variables (.env).

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,

    // Chunking / retrieval
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_context_chunks: usize,
    pub default_top_k: usize,

    // Embedding models
    pub text_embedding_model: String,
    pub image_embedding_model: String,
    pub text_embedding_dim: usize,
    pub image_embedding_dim: usize,
    pub embedding_base_url: String,

    /// Prefer the store's vector index when it offers one.
    pub use_vector_index: bool,

    // Answer model
    pub gemini_api_key: String,
    pub gemini_model: String,
}

impl RagConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir = env_or("DATA_DIR", "./data");
        let config = Self {
            db_path: PathBuf::from(env_or("DB_PATH", &format!("{data_dir}/rag.db"))),
            log_dir: PathBuf::from(env_or("LOG_DIR", &format!("{data_dir}/logs"))),
            chunk_size: parse_env("CHUNK_SIZE", 450)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", 75)?,
            max_context_chunks: parse_env("MAX_CONTEXT_CHUNKS", 8)?,
            default_top_k: parse_env("DEFAULT_TOP_K", 5)?,
            text_embedding_model: env_or("TEXT_EMBEDDING_MODEL", "BAAI/bge-large-en-v1.5"),
            image_embedding_model: env_or(
                "IMAGE_EMBEDDING_MODEL",
                "laion/CLIP-ViT-H-14-laion2B-s32B-b79K",
            ),
            text_embedding_dim: parse_env("TEXT_EMBEDDING_DIM", 1024)?,
            image_embedding_dim: parse_env("IMAGE_EMBEDDING_DIM", 1024)?,
            embedding_base_url: env_or("EMBEDDING_BASE_URL", "http://127.0.0.1:1234"),
            use_vector_index: env_or("USE_VECTOR_INDEX", "false")
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("GOOGLE_API_KEY"))
                .unwrap_or_default(),
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.0-flash"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            bail!("CHUNK_SIZE must be positive");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.max_context_chunks == 0 {
            bail!("MAX_CONTEXT_CHUNKS must be positive");
        }
        if self.text_embedding_dim == 0 || self.image_embedding_dim == 0 {
            bail!("embedding dimensions must be positive");
        }
        if !(1..=50).contains(&self.default_top_k) {
            bail!("DEFAULT_TOP_K must be between 1 and 50");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env(key: &str, default: usize) -> anyhow::Result<usize> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RagConfig {
        RagConfig {
            db_path: PathBuf::from("/tmp/rag.db"),
            log_dir: PathBuf::from("/tmp/logs"),
            chunk_size: 450,
            chunk_overlap: 75,
            max_context_chunks: 8,
            default_top_k: 5,
            text_embedding_model: "test-text".to_string(),
            image_embedding_model: "test-image".to_string(),
            text_embedding_dim: 4,
            image_embedding_dim: 4,
            embedding_base_url: "http://127.0.0.1:1234".to_string(),
            use_vector_index: false,
            gemini_api_key: String::new(),
            gemini_model: "gemini-2.0-flash".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = base_config();
        config.chunk_overlap = 450;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_top_k_bounds_are_enforced() {
        let mut config = base_config();
        config.default_top_k = 51;
        assert!(config.validate().is_err());
    }
}
