//! TOML configuration loading and validation.
//!
//! All commands read settings from a single TOML file (default
//! `./config/arcbot.toml`). Secrets never live in the file: the OpenAI key
//! and Supabase credentials come from the environment and are validated by
//! the components that need them, before any network call is made.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    /// Merge citation fragments by section before responding. Disable to
    /// pass fragments through one-per-retrieval-chunk.
    #[serde(default = "default_merge_sources")]
    pub merge_sources: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            merge_sources: default_merge_sources(),
        }
    }
}

fn default_merge_sources() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// API base URL override. When absent, the public OpenAI endpoint is
    /// used. The API key always comes from `OPENAI_API_KEY`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            url: None,
            model: None,
            dims: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
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

#[derive(Debug, Deserialize, Clone)]
pub struct SupabaseConfig {
    /// Project URL override. When absent, `SUPABASE_URL` from the
    /// environment is used. The service key always comes from
    /// `SUPABASE_SERVICE_KEY`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_document_name")]
    pub document_name: String,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    /// Canonical URL of the code text being uploaded; stored with the
    /// document and each chunk.
    #[serde(default = "default_source_url")]
    pub source_url: String,
    /// Hierarchy path prepended to each chunk's section number.
    #[serde(default = "default_hierarchy")]
    pub hierarchy: Vec<String>,
    /// Fixed pause between chunk uploads, to stay under API rate limits.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            document_name: default_document_name(),
            document_type: default_document_type(),
            source_url: default_source_url(),
            hierarchy: default_hierarchy(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_document_name() -> String {
    "City of Bend Development Code - Discovery West".to_string()
}
fn default_document_type() -> String {
    "city_code".to_string()
}
fn default_source_url() -> String {
    "https://bend.municipal.codes/BDC/2.7_ArtXIX".to_string()
}
fn default_hierarchy() -> Vec<String> {
    vec!["BDC Ch. 2.7".to_string(), "Article XIX".to_string()]
}
fn default_delay_ms() -> u64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Config {
    /// All-defaults configuration for commands that can run without a
    /// config file (normalizing from stdin, printing migration SQL).
    pub fn minimal() -> Self {
        Config::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate upload
    if config.upload.document_name.is_empty() {
        anyhow::bail!("upload.document_name must not be empty");
    }
    if config.upload.document_type.is_empty() {
        anyhow::bail!("upload.document_type must not be empty");
    }

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}
