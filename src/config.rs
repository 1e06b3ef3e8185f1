use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_lines")]
    pub window_lines: usize,
    #[serde(default = "default_stride_lines")]
    pub stride_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_lines: default_window_lines(),
            stride_lines: default_stride_lines(),
        }
    }
}

fn default_window_lines() -> usize {
    crate::chunk::WINDOW_LINES
}
fn default_stride_lines() -> usize {
    crate::chunk::STRIDE_LINES
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    /// A file is processed only after this long with no further writes.
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    /// Interval at which pending events are checked for quietness.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Extra exclusion globs layered over the built-in ignore policy.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_quiet_period_ms() -> u64 {
    500
}
fn default_poll_interval_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Top-K for semantic retrieval.
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,
    /// Result cap for structural keyword search.
    #[serde(default = "default_symbol_limit")]
    pub symbol_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_limit: default_semantic_limit(),
            symbol_limit: default_symbol_limit(),
        }
    }
}

fn default_semantic_limit() -> usize {
    3
}
fn default_symbol_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            max_retries: 5,
            timeout_secs: 30,
        }
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

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.window_lines == 0 {
        anyhow::bail!("chunking.window_lines must be > 0");
    }
    if config.chunking.stride_lines == 0 || config.chunking.stride_lines > config.chunking.window_lines
    {
        anyhow::bail!("chunking.stride_lines must be in 1..=window_lines");
    }

    if config.watcher.quiet_period_ms == 0 || config.watcher.poll_interval_ms == 0 {
        anyhow::bail!("watcher.quiet_period_ms and watcher.poll_interval_ms must be > 0");
    }

    if config.retrieval.semantic_limit == 0 {
        anyhow::bail!("retrieval.semantic_limit must be >= 1");
    }
    if config.retrieval.symbol_limit < 1 {
        anyhow::bail!("retrieval.symbol_limit must be >= 1");
    }

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
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
