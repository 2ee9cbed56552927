//! Pipeline drivers
//!
//! [`BulkPipeline`] normalizes a stream batch and hands every surviving record
//! to the bulk writer. [`RelationalPipeline`] fetches a transactions file,
//! resolves database credentials and loads the rows one transaction at a time.

use crate::error::PipelineError;
use crate::event::{ObjectNotification, StreamBatch};
use crate::response::{BulkResponse, ErrorResponse};
use ledgerflow_core::bulk::BulkWriter;
use ledgerflow_core::collab::{DbCredentials, ObjectStore, SecretResolver};
use ledgerflow_core::record::{AuditRecord, Normalizer};
use ledgerflow_core::row_writer::{RowWriteOutcome, RowWriter};
use ledgerflow_core::transaction::decode_transactions;
use ledgerflow_rdbc::connection::ConnectionConfig;
use std::sync::Arc;
use tracing::{error, info};

/// Application name reported to the database
pub const APPLICATION_NAME: &str = "ledgerflow";

/// Stream batch → key-value store
pub struct BulkPipeline {
    normalizer: Normalizer,
    writer: BulkWriter,
    table: String,
}

impl BulkPipeline {
    /// Pipeline writing to `table`
    pub fn new(writer: BulkWriter, table: impl Into<String>) -> Self {
        Self {
            normalizer: Normalizer::new(),
            writer,
            table: table.into(),
        }
    }

    /// Process one batch
    ///
    /// Always reports success. Rejected messages are logged by the normalizer
    /// and exhausted chunks go to the writer's dead-letter sink.
    pub async fn handle(&self, batch: &StreamBatch) -> BulkResponse {
        let normalized = self.normalizer.normalize_all(batch.envelopes());
        let processed = normalized.records.len();

        let requests = normalized
            .records
            .into_iter()
            .map(AuditRecord::into_put_request)
            .collect();
        let summary = self.writer.write(&self.table, requests).await;

        info!(
            table = %self.table,
            messages = batch.len(),
            rejected = normalized.rejected.len(),
            accepted = summary.accepted,
            failed = summary.failed,
            exhausted_chunks = summary.exhausted_chunks,
            "Bulk batch processed"
        );
        BulkResponse::success(processed)
    }
}

/// Database location for the relational path; host and login come from the secret
#[derive(Debug, Clone)]
pub struct DatabaseTarget {
    /// Secret holding `{host, username, password}`
    pub secret_id: String,
    /// Database name
    pub database: String,
    /// Database port
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl DatabaseTarget {
    /// Target with the default port and timeout
    pub fn new(secret_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            database: database.into(),
            port: 5432,
            connect_timeout_ms: 10_000,
        }
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the connection timeout
    pub fn with_connect_timeout(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    fn connection_config(&self, credentials: DbCredentials) -> ConnectionConfig {
        ConnectionConfig::new(credentials.host, self.database.clone())
            .with_port(self.port)
            .with_credentials(credentials.username, credentials.password)
            .with_connect_timeout(self.connect_timeout_ms)
            .with_application_name(APPLICATION_NAME)
    }
}

/// Object notification → relational table
pub struct RelationalPipeline {
    objects: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretResolver>,
    writer: RowWriter,
    target: DatabaseTarget,
}

impl RelationalPipeline {
    /// Assemble from collaborators
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretResolver>,
        writer: RowWriter,
        target: DatabaseTarget,
    ) -> Self {
        Self {
            objects,
            secrets,
            writer,
            target,
        }
    }

    /// Process one notification; `None` means success
    pub async fn handle(&self, event: &ObjectNotification) -> Option<ErrorResponse> {
        match self.process(event).await {
            Ok(_) => None,
            Err(e) => {
                error!(error = %e, "Relational load failed");
                Some(e.to_response())
            }
        }
    }

    /// Process one notification and report per-row results
    ///
    /// The file is decoded completely before credentials are resolved, so a
    /// malformed file never opens a connection.
    pub async fn process(
        &self,
        event: &ObjectNotification,
    ) -> Result<RowWriteOutcome, PipelineError> {
        let location = event.first_object()?;
        info!(bucket = %location.bucket, key = %location.key, "Loading transactions file");

        let bytes = self
            .objects
            .get_object(&location.bucket, &location.key)
            .await
            .map_err(PipelineError::ObjectFetch)?;
        let rows = decode_transactions(&bytes)?;

        let secret = self
            .secrets
            .resolve(&self.target.secret_id)
            .await
            .map_err(PipelineError::Secret)?;
        let credentials = DbCredentials::from_secret(&secret).map_err(PipelineError::Secret)?;
        let config = self.target.connection_config(credentials);

        let outcome = self.writer.write(&config, &rows).await?;
        info!(
            key = %location.key,
            rows = rows.len(),
            inserted = outcome.inserted,
            skipped = outcome.skipped.len(),
            "Transactions file loaded"
        );
        Ok(outcome)
    }
}
