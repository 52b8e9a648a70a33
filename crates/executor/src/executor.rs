use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use cadence_core::{BatchId, SendMode, SendStatus, TrackingRow};
use cadence_provider::{
    ContactDirectory, EmailProvider, EmailRenderer, EmailSettings, OutboundEmail, ProviderError,
};
use cadence_store::{SendOutcome, StoreError, StoreManager};

use crate::config::ExecutorConfig;
use crate::policy::SendPolicy;

/// Largest chunk a single call may process.
const MAX_CHUNK_SIZE: usize = 100;

/// How many error strings a report carries at most.
const MAX_REPORTED_ERRORS: usize = 10;

/// Errors surfaced by the executor. Per-row issues never appear here; they
/// are absorbed into row state.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("chunk size must be between 1 and {MAX_CHUNK_SIZE}, got {0}")]
    InvalidChunkSize(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for one processed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Pending rows still left in the batch after this chunk.
    pub remaining: i64,
    /// First few row-level error messages, for operator visibility.
    pub errors: Vec<String>,
}

/// Turns pending tracking rows into provider dispatches.
///
/// Rows are claimed in scheduled-date order, dispatched with bounded
/// concurrency, and their outcomes committed in a single transaction per
/// chunk. Completion order between concurrent sends is unspecified.
pub struct SendExecutor {
    manager: StoreManager,
    directory: Arc<dyn ContactDirectory>,
    renderer: Arc<dyn EmailRenderer>,
    provider: Arc<dyn EmailProvider>,
    settings: EmailSettings,
    policy: SendPolicy,
    config: ExecutorConfig,
}

impl SendExecutor {
    #[must_use]
    pub fn new(
        manager: StoreManager,
        directory: Arc<dyn ContactDirectory>,
        renderer: Arc<dyn EmailRenderer>,
        provider: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            manager,
            directory,
            renderer,
            provider,
            settings: EmailSettings::default(),
            policy: SendPolicy::from_env(),
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EmailSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Dispatch the next `chunk_size` pending rows of a batch.
    #[instrument(skip(self), fields(batch = %batch_id))]
    pub async fn process_chunk(
        &self,
        batch_id: &BatchId,
        chunk_size: usize,
    ) -> Result<ChunkReport, ExecutorError> {
        self.run_chunk(batch_id, chunk_size, SendStatus::Pending).await
    }

    /// Re-attempt up to `chunk_size` failed rows of a batch. Attempt
    /// counters keep growing; they are never reset.
    #[instrument(skip(self), fields(batch = %batch_id))]
    pub async fn retry_failed(
        &self,
        batch_id: &BatchId,
        chunk_size: usize,
    ) -> Result<ChunkReport, ExecutorError> {
        self.run_chunk(batch_id, chunk_size, SendStatus::Failed).await
    }

    async fn run_chunk(
        &self,
        batch_id: &BatchId,
        chunk_size: usize,
        source: SendStatus,
    ) -> Result<ChunkReport, ExecutorError> {
        if !(1..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(ExecutorError::InvalidChunkSize(chunk_size));
        }

        let org_id = self.manager.org_for_batch(batch_id).await?;
        let store = self.manager.open_org(org_id).await?;

        let limit = i64::try_from(chunk_size).unwrap_or(i64::MAX);
        let rows = match source {
            SendStatus::Failed => store.next_failed(batch_id, limit).await?,
            _ => store.next_pending(batch_id, limit).await?,
        };

        if rows.is_empty() {
            let remaining = store.count_status(batch_id, SendStatus::Pending).await?;
            return Ok(ChunkReport {
                processed: 0,
                sent: 0,
                failed: 0,
                remaining,
                errors: Vec::new(),
            });
        }

        let row_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        store.mark_processing(&row_ids).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let dispatches = rows.iter().map(|row| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                self.dispatch_row(row).await
            }
        });
        let outcomes: Vec<SendOutcome> = join_all(dispatches).await;

        store.record_outcomes(&outcomes).await?;

        let sent = outcomes.iter().filter(|o| o.outcome.is_ok()).count();
        let errors: Vec<String> = outcomes
            .iter()
            .filter_map(|o| o.outcome.as_ref().err().cloned())
            .take(MAX_REPORTED_ERRORS)
            .collect();
        let failed = outcomes.len() - sent;
        let remaining = store.count_status(batch_id, SendStatus::Pending).await?;

        info!(
            processed = outcomes.len(),
            sent, failed, remaining, "chunk processed"
        );

        Ok(ChunkReport {
            processed: outcomes.len(),
            sent,
            failed,
            remaining,
            errors,
        })
    }

    /// Dispatch one row. Every failure path collapses into the outcome's
    /// error string; nothing propagates past the row.
    async fn dispatch_row(&self, row: &TrackingRow) -> SendOutcome {
        let outcome = self.try_dispatch(row).await;
        if let Err(error) = &outcome {
            warn!(row = row.id, contact = %row.contact_id, %error, "send failed");
        }
        SendOutcome {
            row_id: row.id,
            outcome,
        }
    }

    async fn try_dispatch(&self, row: &TrackingRow) -> Result<Option<String>, String> {
        let contact = self
            .directory
            .get_contact(row.org_id, &row.contact_id)
            .await
            .map_err(|e| e.to_string())?;

        let rendered = self
            .renderer
            .render(row.email_type, &contact, row.scheduled_date, true)
            .map_err(|e| e.to_string())?;

        let recipient = match row.send_mode {
            SendMode::Test => row.test_email.clone().unwrap_or_default(),
            SendMode::Production => contact.email.clone(),
        };
        if recipient.is_empty() {
            return Err("no recipient email address available".to_owned());
        }

        let subject = match row.send_mode {
            SendMode::Test => format!("[TEST] {}", rendered.subject),
            SendMode::Production => rendered.subject.clone(),
        };

        // Consult the gate per send. A closed gate demotes the dispatch to
        // a dry run; the row is still marked sent.
        let dry_run = !self.policy.allows(row.send_mode);

        let message = OutboundEmail {
            from_addr: self.settings.from_email.clone(),
            from_name: self.settings.from_name.clone(),
            to: recipient,
            subject,
            text: rendered.text_body,
            html: rendered.html_body,
        };

        let receipt = match timeout(
            self.config.provider_timeout,
            self.provider.send(&message, dry_run),
        )
        .await
        {
            Ok(result) => result.map_err(|e| e.to_string())?,
            Err(_) => {
                return Err(ProviderError::Timeout(self.config.provider_timeout).to_string());
            }
        };

        if receipt.accepted {
            Ok(receipt.message_id)
        } else {
            Err(receipt
                .error
                .unwrap_or_else(|| "provider rejected message".to_owned()))
        }
    }
}
