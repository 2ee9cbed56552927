//! Key-value store seam for the bulk path
//!
//! A [`KeyValueStore`] accepts up to [`crate::chunk::BATCH_LIMIT`]
//! put-requests per call and answers with the subset it did not persist,
//! scoped by table name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;

/// Item attributes keyed by name; all values are strings
pub type Item = BTreeMap<String, String>;

/// Attribute holding the primary key of audit items
pub const KEY_ATTRIBUTE: &str = "log_id";

/// Single put of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRequest {
    /// Item attributes
    pub item: Item,
}

impl PutRequest {
    /// Wrap an item
    pub fn new(item: Item) -> Self {
        Self { item }
    }

    /// Primary key of the item, if present
    pub fn key(&self) -> Option<&str> {
        self.item.get(KEY_ATTRIBUTE).map(String::as_str)
    }
}

/// Response of one batched write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Put-requests the store did not persist, by table
    pub unprocessed: HashMap<String, Vec<PutRequest>>,
}

impl BatchWriteOutput {
    /// Everything was persisted
    pub fn complete() -> Self {
        Self::default()
    }

    /// Some requests for `table` were not persisted
    pub fn with_unprocessed(table: impl Into<String>, requests: Vec<PutRequest>) -> Self {
        let mut unprocessed = HashMap::new();
        if !requests.is_empty() {
            unprocessed.insert(table.into(), requests);
        }
        Self { unprocessed }
    }

    /// Unprocessed requests for `table`; entries for other tables are ignored
    pub fn take_unprocessed(&mut self, table: &str) -> Vec<PutRequest> {
        self.unprocessed.remove(table).unwrap_or_default()
    }
}

/// Key-value store accepting batched puts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Submit up to 25 put-requests for `table` in one call
    async fn batch_write(
        &self,
        table: &str,
        requests: &[PutRequest],
    ) -> Result<BatchWriteOutput, StoreError>;
}
