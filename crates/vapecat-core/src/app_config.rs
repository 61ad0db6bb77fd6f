use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// Directory holding the per-seller `*.json` result files.
    pub results_dir: PathBuf,
    /// Optional YAML normalization rules; built-in defaults apply when `None`.
    pub rules_path: Option<PathBuf>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Minimum title similarity for two listings to share a group, in `(0, 1]`.
    pub similarity_threshold: f64,
    pub max_length_ratio: f64,
    pub min_charset_jaccard: f64,
    pub grouping_batch_size: usize,
    /// Company id recorded for products whose brand is not in the registry.
    pub unknown_brand_id: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("results_dir", &self.results_dir)
            .field("rules_path", &self.rules_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("similarity_threshold", &self.similarity_threshold)
            .field("max_length_ratio", &self.max_length_ratio)
            .field("min_charset_jaccard", &self.min_charset_jaccard)
            .field("grouping_batch_size", &self.grouping_batch_size)
            .field("unknown_brand_id", &self.unknown_brand_id)
            .finish()
    }
}
