use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use item_rag_core::index::Bm25Params;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// sqlx connection string, e.g. `sqlite:./data/items.sqlite`.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            k1: default_k1(),
            b: default_b(),
        }
    }
}

impl RetrievalConfig {
    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Name of an environment variable holding a bearer token, if the
    /// endpoint needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            api_key_env: None,
        }
    }
}

fn default_generation_url() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "qwen2.5:0.5b".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Download filename sent in `Content-Disposition`.
    #[serde(default = "default_report_filename")]
    pub filename: String,
    /// When set, every generated report is also written here under a
    /// unique name.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            filename: default_report_filename(),
            output_dir: None,
        }
    }
}

fn default_report_filename() -> String {
    "Model_Response.docx".to_string()
}

impl Config {
    /// Defaults used when no config file is present.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                url: "sqlite:./data/items.sqlite".to_string(),
                max_connections: default_max_connections(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                page_size: default_page_size(),
            },
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    if config.server.page_size == 0 {
        anyhow::bail!("server.page_size must be >= 1");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.k1.is_nan() || config.retrieval.k1 < 0.0 {
        anyhow::bail!("retrieval.k1 must be >= 0.0");
    }
    if !(0.0..=1.0).contains(&config.retrieval.b) {
        anyhow::bail!("retrieval.b must be in [0.0, 1.0]");
    }

    // Validate generation
    if config.generation.model.trim().is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be >= 1");
    }

    // Validate report
    let filename = &config.report.filename;
    if !filename.ends_with(".docx") {
        anyhow::bail!("report.filename must end with .docx");
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains('"') {
        anyhow::bail!("report.filename must be a bare file name");
    }

    Ok(())
}
