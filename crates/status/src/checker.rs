use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use cadence_core::{BatchId, OrgId, SendStatus};
use cadence_provider::EmailProvider;
use cadence_store::{BatchStatus, StoreManager};

use crate::error::StatusError;
use crate::mapping::map_provider_status;

/// Outcome of one checked row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDetail {
    pub row_id: i64,
    pub message_id: String,
    /// Raw provider status string.
    pub provider_status: String,
    /// Internal status the row ended up in.
    pub send_status: SendStatus,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub org_id: OrgId,
    pub batch_id: Option<BatchId>,
    /// Rows whose status was queried this pass.
    pub checked: usize,
    /// Rows whose query failed; their check stamp is refreshed so they are
    /// not hammered.
    pub errors: usize,
    pub details: Vec<StatusDetail>,
}

/// Pull-mode reconciler: queries the provider for rows that were sent but
/// have no terminal answer yet.
pub struct StatusChecker {
    manager: StoreManager,
    provider: Arc<dyn EmailProvider>,
    /// Rows checked more recently than this are left alone.
    recheck_interval: Duration,
    /// Sends older than this with no definitive provider answer are
    /// treated as delivered for reporting purposes.
    delivered_grace: Duration,
}

impl StatusChecker {
    #[must_use]
    pub fn new(manager: StoreManager, provider: Arc<dyn EmailProvider>) -> Self {
        Self {
            manager,
            provider,
            recheck_interval: Duration::from_secs(15 * 60),
            delivered_grace: Duration::from_secs(5 * 60),
        }
    }

    #[must_use]
    pub fn with_recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }

    #[must_use]
    pub fn with_delivered_grace(mut self, grace: Duration) -> Self {
        self.delivered_grace = grace;
        self
    }

    /// Check up to `limit` rows of one organization (optionally one batch)
    /// against the provider and advance their statuses.
    ///
    /// Idempotent: a second pass over the same provider answers leaves
    /// every row unchanged.
    #[instrument(skip(self), fields(org = %org_id))]
    pub async fn check_pending(
        &self,
        org_id: OrgId,
        batch_id: Option<&BatchId>,
        limit: i64,
    ) -> Result<StatusReport, StatusError> {
        let store = self.manager.open_org(org_id).await?;
        let now = Utc::now();
        let cutoff = now
            - chrono::Duration::from_std(self.recheck_interval)
                .unwrap_or_else(|_| chrono::Duration::minutes(15));

        let rows = store
            .rows_needing_status_check(batch_id, limit, cutoff)
            .await?;
        debug!(candidates = rows.len(), "status check pass");

        let mut report = StatusReport {
            org_id,
            batch_id: batch_id.cloned(),
            checked: 0,
            errors: 0,
            details: Vec::new(),
        };

        for row in rows {
            let Some(message_id) = row.message_id.clone() else {
                continue;
            };

            match self.provider.query_message(&message_id).await {
                Ok(status) => {
                    report.checked += 1;
                    let mut mapped = map_provider_status(&status.status);

                    // No bounce or drop within the grace period after the
                    // send: the provider will not say more, report it
                    // delivered.
                    if mapped == SendStatus::Sent
                        && let Some(attempted) = row.last_attempt_date
                        && now.signed_duration_since(attempted).to_std().ok()
                            >= Some(self.delivered_grace)
                    {
                        debug!(row = row.id, "upgrading aged sent row to delivered");
                        mapped = SendStatus::Delivered;
                    }

                    let details = serde_json::to_string(&status.raw).unwrap_or_default();
                    store
                        .apply_status_result(row.id, mapped, &status.status, &details, now)
                        .await?;
                    report.details.push(StatusDetail {
                        row_id: row.id,
                        message_id,
                        provider_status: status.status,
                        send_status: mapped,
                    });
                }
                Err(err) => {
                    warn!(row = row.id, %err, "provider status query failed");
                    report.errors += 1;
                    store.touch_status_checked(row.id, now).await?;
                }
            }
        }

        info!(
            checked = report.checked,
            errors = report.errors,
            "status reconciliation finished"
        );
        Ok(report)
    }

    /// Aggregate delivery statistics for one batch.
    pub async fn delivery_stats(
        &self,
        org_id: OrgId,
        batch_id: &BatchId,
    ) -> Result<BatchStatus, StatusError> {
        let store = self.manager.open_org(org_id).await?;
        Ok(store.batch_status(batch_id).await?)
    }
}
