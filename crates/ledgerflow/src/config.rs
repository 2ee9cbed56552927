//! Configuration for ledgerflow
//!
//! Loaded from YAML with `${VAR}` / `${VAR:-default}` expansion. Every field
//! has a default, so an empty file (or no file) yields a working setup for
//! the standard tables.

use ledgerflow_aws::AwsConfig;
use ledgerflow_core::chunk::{Chunker, BATCH_LIMIT};
use ledgerflow_core::dead_letter::{DeadLetterSink, FileDeadLetter, LogDeadLetter};
use ledgerflow_core::retry::RetryPolicy;
use ledgerflow_rdbc::security::validate_sql_identifier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use validator::Validate;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PipelineConfig {
    /// AWS client settings shared by every adapter
    #[serde(default)]
    #[validate(nested)]
    pub aws: AwsConfig,

    /// Bulk (key-value) path
    #[serde(default)]
    #[validate(nested)]
    pub bulk: BulkConfig,

    /// Relational path
    #[serde(default)]
    #[validate(nested)]
    pub relational: RelationalConfig,
}

/// Bulk path settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BulkConfig {
    /// Destination table
    #[serde(default = "default_bulk_table")]
    #[validate(length(min = 3, max = 255))]
    pub table: String,

    /// Put-requests per store call
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 25))]
    pub batch_size: usize,

    /// Retry schedule
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Where exhausted chunks go
    #[serde(default)]
    pub dead_letter: DeadLetterConfig,
}

fn default_bulk_table() -> String {
    "business_transactions".to_string()
}

fn default_batch_size() -> usize {
    BATCH_LIMIT
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            table: default_bulk_table(),
            batch_size: default_batch_size(),
            retry: RetryConfig::default(),
            dead_letter: DeadLetterConfig::default(),
        }
    }
}

impl BulkConfig {
    /// Chunker honoring `batch_size`
    pub fn chunker(&self) -> ledgerflow_core::Result<Chunker> {
        Chunker::new(self.batch_size)
    }
}

/// Retry schedule for bulk writes
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetryConfig {
    /// Store calls per chunk before dead-lettering
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 20))]
    pub max_retries: u32,

    /// Delay after the first failed call
    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub initial_backoff_ms: u64,

    /// Growth factor per failure
    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(min = 1.0, max = 10.0))]
    pub backoff_multiplier: f64,

    /// Ceiling for any single delay
    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 1, max = 300000))]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Equivalent engine policy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
    }
}

/// Dead-letter destination
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeadLetterConfig {
    /// Log residual records at error level
    #[default]
    Log,
    /// Append JSON lines to a file
    File {
        /// Target file
        path: PathBuf,
    },
}

impl DeadLetterConfig {
    /// Instantiate the sink
    pub fn build(&self) -> Arc<dyn DeadLetterSink> {
        match self {
            Self::Log => Arc::new(LogDeadLetter),
            Self::File { path } => Arc::new(FileDeadLetter::new(path.clone())),
        }
    }
}

/// Relational path settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RelationalConfig {
    /// Destination table
    #[serde(default = "default_relational_table")]
    pub table: String,

    /// Database name
    #[serde(default = "default_database")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    /// Database port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 100, max = 300000))]
    pub connect_timeout_ms: u64,

    /// Secret holding `{host, username, password}`
    #[serde(default)]
    pub secret_id: String,
}

fn default_relational_table() -> String {
    "monetary_transaction".to_string()
}

fn default_database() -> String {
    "user_db".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            table: default_relational_table(),
            database: default_database(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            secret_id: String::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let expanded = Self::expand_env_vars(content);

        // An empty document deserializes as unit, not as a mapping
        let config: Self = if expanded.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&expanded)
                .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?
        };

        config.validate_all()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Field rules plus cross-field checks
    pub fn validate_all(&self) -> anyhow::Result<()> {
        self.validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        validate_sql_identifier(&self.relational.table)
            .map_err(|e| anyhow::anyhow!("relational.table: {}", e))?;

        if let DeadLetterConfig::File { path } = &self.bulk.dead_letter {
            if path.as_os_str().is_empty() {
                anyhow::bail!("bulk.dead_letter.path must not be empty");
            }
        }

        if self.bulk.retry.max_backoff_ms < self.bulk.retry.initial_backoff_ms {
            anyhow::bail!("bulk.retry.max_backoff_ms must be >= initial_backoff_ms");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml("").unwrap();
        assert_eq!(config.aws.region, "ap-southeast-1");
        assert_eq!(config.bulk.table, "business_transactions");
        assert_eq!(config.bulk.batch_size, 25);
        assert_eq!(config.bulk.dead_letter, DeadLetterConfig::Log);
        assert_eq!(config.relational.table, "monetary_transaction");
        assert_eq!(config.relational.database, "user_db");
        assert_eq!(config.relational.port, 5432);
        assert_eq!(config.bulk.retry.to_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
aws:
  region: eu-central-1
  endpoint_url: http://localhost:4566
bulk:
  table: audit_log
  batch_size: 10
  retry:
    max_retries: 3
    initial_backoff_ms: 100
  dead_letter:
    type: file
    path: /var/lib/ledgerflow/dead-letter.jsonl
relational:
  table: payments
  database: ledger
  port: 6432
  secret_id: arn:aws:secretsmanager:eu-central-1:123456789012:secret:db
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.bulk.chunker().unwrap().limit(), 10);
        assert_eq!(config.bulk.retry.to_policy().max_retries, 3);
        assert_eq!(
            config.bulk.retry.to_policy().initial_backoff,
            Duration::from_millis(100)
        );
        assert_eq!(
            config.bulk.dead_letter,
            DeadLetterConfig::File {
                path: PathBuf::from("/var/lib/ledgerflow/dead-letter.jsonl")
            }
        );
        assert_eq!(config.relational.port, 6432);
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("LEDGERFLOW_TEST_SECRET_ARN", "arn:test");
        let yaml = "relational:\n  secret_id: ${LEDGERFLOW_TEST_SECRET_ARN}\n  database: ${LEDGERFLOW_TEST_UNSET_DB:-fallback_db}\n";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.relational.secret_id, "arn:test");
        assert_eq!(config.relational.database, "fallback_db");
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(PipelineConfig::from_yaml("bulk:\n  batch_size: 0\n").is_err());
        assert!(PipelineConfig::from_yaml("bulk:\n  batch_size: 26\n").is_err());
        assert!(PipelineConfig::from_yaml("bulk:\n  batch_size: 1\n").is_ok());
    }

    #[test]
    fn test_invalid_relational_table() {
        let err = PipelineConfig::from_yaml("relational:\n  table: \"x; DROP TABLE y\"\n").unwrap_err();
        assert!(err.to_string().contains("relational.table"));
    }

    #[test]
    fn test_backoff_ordering() {
        let yaml = "bulk:\n  retry:\n    initial_backoff_ms: 5000\n    max_backoff_ms: 1000\n";
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerflow.yaml");
        std::fs::write(&path, "bulk:\n  table: from_file\n").unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap().bulk.table, "from_file");
        assert!(PipelineConfig::from_file(&dir.path().join("missing.yaml")).is_err());
    }
}
