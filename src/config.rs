use serde::Deserialize;

use crate::policy::PolicyVersion;
use crate::report::{DEFAULT_MAX_DISTANCE, DEFAULT_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Joined transaction + identity table.
    #[serde(default = "default_table")]
    pub table: String,
    /// Amount at or above which the evidence carries the `amount_high` hint.
    #[serde(default = "default_amount_high_threshold")]
    pub amount_high_threshold: f64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_table() -> String {
    "train_joined".to_string()
}

fn default_amount_high_threshold() -> f64 {
    500.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub artifact_path: String,
}

// ============================================================
// Retrieval Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            collection: default_collection(),
        }
    }
}

fn default_index_dir() -> String {
    "data/case_index".to_string()
}

fn default_collection() -> String {
    "fraud_cases".to_string()
}

// ============================================================
// Policy Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default)]
    pub version: PolicyVersion,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_distance")]
    pub default_max_distance: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: PolicyVersion::default(),
            default_top_k: DEFAULT_TOP_K,
            default_max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_max_distance() -> f64 {
    DEFAULT_MAX_DISTANCE
}

// ============================================================
// Batch Evaluation Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// CSV with a transaction id column and a label column.
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_id_col")]
    pub id_col: String,
    #[serde(default = "default_label_col")]
    pub label_col: String,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub debug: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            id_col: default_id_col(),
            label_col: default_label_col(),
            sample_size: default_sample_size(),
            seed: default_seed(),
            concurrency: default_concurrency(),
            debug: false,
        }
    }
}

fn default_data_path() -> String {
    "data/raw/train_transaction.csv".to_string()
}

fn default_id_col() -> String {
    "TransactionID".to_string()
}

fn default_label_col() -> String {
    "isFraud".to_string()
}

fn default_sample_size() -> usize {
    500
}

fn default_seed() -> u64 {
    42
}

fn default_concurrency() -> usize {
    8
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        // The table name is interpolated into SQL.
        let table = &self.database.table;
        if table.is_empty()
            || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || table.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(eyre::eyre!("Invalid table name '{}'", table));
        }
        if self.model.artifact_path.trim().is_empty() {
            return Err(eyre::eyre!("model.artifact_path must not be empty"));
        }
        if self.policy.default_top_k == 0 {
            return Err(eyre::eyre!("policy.default_top_k must be at least 1"));
        }
        let max_distance = self.policy.default_max_distance;
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(eyre::eyre!(
                "policy.default_max_distance must be a non-negative number, got {}",
                max_distance
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(eyre::eyre!("batch.concurrency must be at least 1"));
        }
        Ok(())
    }
}
