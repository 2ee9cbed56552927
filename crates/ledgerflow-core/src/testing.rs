//! Test doubles for the engines and the driver
//!
//! Scripted collaborators that record what they were asked to do:
//!
//! ```rust,ignore
//! use ledgerflow_core::testing::*;
//!
//! let store = MockKeyValueStore::new()
//!     .then(Step::LeaveLast(3))
//!     .then(Step::AcceptAll);
//! let sleeper = RecordingSleeper::new();
//!
//! let writer = BulkWriter::new(Arc::new(store.clone()))
//!     .with_sleeper(Arc::new(sleeper.clone()));
//! writer.write_chunk("t", requests).await;
//!
//! assert_eq!(store.call_count(), 2);
//! assert_eq!(sleeper.delays(), vec![Duration::from_millis(500)]);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::collab::{ObjectStore, SecretResolver};
use crate::dead_letter::{DeadLetter, DeadLetterSink};
use crate::error::{CollaboratorError, Result, StoreError};
use crate::store::{BatchWriteOutput, Item, KeyValueStore, PutRequest, KEY_ATTRIBUTE};

pub use crate::retry::RecordingSleeper;

/// Put-request carrying only a `log_id`
pub fn put(id: impl Into<String>) -> PutRequest {
    PutRequest::new(Item::from([(KEY_ATTRIBUTE.to_string(), id.into())]))
}

/// `count` put-requests with ids `prefix-0..`
pub fn puts(prefix: &str, count: usize) -> Vec<PutRequest> {
    (0..count).map(|i| put(format!("{}-{}", prefix, i))).collect()
}

/// How the mock answers one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Persist everything
    AcceptAll,
    /// Persist nothing; every request comes back unprocessed
    LeaveAll,
    /// Leave the last `n` submitted requests unprocessed
    LeaveLast(usize),
    /// Leave requests with these keys unprocessed
    LeaveKeys(Vec<String>),
    /// Fail the call outright
    Fail(StoreError),
}

#[derive(Debug, Default)]
struct StoreState {
    script: VecDeque<Step>,
    fallback: Option<Step>,
    calls: Vec<(String, Vec<PutRequest>)>,
    persisted: Vec<PutRequest>,
}

/// Scripted [`KeyValueStore`]; unscripted calls accept everything
#[derive(Debug, Clone, Default)]
pub struct MockKeyValueStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockKeyValueStore {
    /// Create a store that accepts every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next unscripted call
    pub fn then(self, step: Step) -> Self {
        self.state.lock().script.push_back(step);
        self
    }

    /// Answer used once the script runs out
    pub fn otherwise(self, step: Step) -> Self {
        self.state.lock().fallback = Some(step);
        self
    }

    /// Number of `batch_write` calls
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Requests submitted per call
    pub fn calls(&self) -> Vec<Vec<PutRequest>> {
        self.state.lock().calls.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Tables addressed per call
    pub fn tables(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(|(t, _)| t.clone()).collect()
    }

    /// Every request acknowledged, in acknowledgement order
    pub fn persisted(&self) -> Vec<PutRequest> {
        self.state.lock().persisted.clone()
    }

    /// Keys of acknowledged requests
    pub fn persisted_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .persisted
            .iter()
            .filter_map(|r| r.key().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn batch_write(
        &self,
        table: &str,
        requests: &[PutRequest],
    ) -> std::result::Result<BatchWriteOutput, StoreError> {
        let mut state = self.state.lock();
        state.calls.push((table.to_string(), requests.to_vec()));

        let step = state
            .script
            .pop_front()
            .or_else(|| state.fallback.clone())
            .unwrap_or(Step::AcceptAll);

        let (accepted, unprocessed): (Vec<PutRequest>, Vec<PutRequest>) = match step {
            Step::Fail(err) => return Err(err),
            Step::AcceptAll => (requests.to_vec(), Vec::new()),
            Step::LeaveAll => (Vec::new(), requests.to_vec()),
            Step::LeaveLast(n) => {
                let split = requests.len().saturating_sub(n);
                (requests[..split].to_vec(), requests[split..].to_vec())
            }
            Step::LeaveKeys(keys) => requests
                .iter()
                .cloned()
                .partition(|r| !r.key().is_some_and(|k| keys.iter().any(|x| x == k))),
        };

        state.persisted.extend(accepted);
        Ok(BatchWriteOutput::with_unprocessed(table, unprocessed))
    }
}

/// [`DeadLetterSink`] keeping reports in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDeadLetter {
    letters: Arc<Mutex<Vec<DeadLetter>>>,
    failure: Option<String>,
}

impl MemoryDeadLetter {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose every report fails with an I/O error carrying `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Reports received
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().clone()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn report(&self, letter: &DeadLetter) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(std::io::Error::other(message.clone()).into());
        }
        self.letters.lock().push(letter.clone());
        Ok(())
    }
}

/// [`ObjectStore`] over an in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), body.into());
        self
    }

    /// `(bucket, key)` pairs requested
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> std::result::Result<Vec<u8>, CollaboratorError> {
        self.requests
            .lock()
            .push((bucket.to_string(), key.to_string()));
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("s3://{}/{}", bucket, key)))
    }
}

/// [`SecretResolver`] answering from a fixed map
#[derive(Debug, Clone, Default)]
pub struct StaticSecretResolver {
    secrets: Arc<Mutex<HashMap<String, String>>>,
}

impl StaticSecretResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    pub fn with_secret(self, id: &str, value: impl Into<String>) -> Self {
        self.secrets.lock().insert(id.to_string(), value.into());
        self
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, secret_id: &str) -> std::result::Result<SecretString, CollaboratorError> {
        self.secrets
            .lock()
            .get(secret_id)
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| CollaboratorError::NotFound(format!("secret {}", secret_id)))
    }
}
