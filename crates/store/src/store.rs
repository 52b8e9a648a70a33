use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use tracing::{info, instrument};

use cadence_core::{
    BatchId, BatchScope, ContactId, EmailType, OrgId, ScheduleResult, SendMode, SendStatus,
    TrackingRow, new_batch_id, new_single_batch_id,
};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrations;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap applied to stored error messages.
const MAX_ERROR_LEN: usize = 500;

/// Connection options for an embedded database file: WAL journaling so
/// status checks can read while a send chunk writes, plus a bounded busy
/// timeout.
pub(crate) fn file_options(path: &std::path::Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Outcome of one dispatched row, applied transactionally per chunk.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub row_id: i64,
    /// `Ok(message_id)` marks the row sent; `Err(error)` marks it failed.
    pub outcome: Result<Option<String>, String>,
}

/// Aggregate counts for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: BatchId,
    pub org_id: OrgId,
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub accepted: i64,
    pub sent: i64,
    pub delivered: i64,
    pub deferred: i64,
    pub bounced: i64,
    pub dropped: i64,
    pub failed: i64,
    pub skipped: i64,
    pub send_mode: Option<String>,
    pub test_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completion_percentage: f64,
    pub delivery_percentage: f64,
    pub is_complete: bool,
}

/// One line of a batch listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub org_id: OrgId,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub total: i64,
    pub sent: i64,
    pub failed: i64,
    pub pending: i64,
    pub send_mode: Option<String>,
    pub is_complete: bool,
}

/// Tracking store for one organization, backed by that organization's
/// embedded database file.
#[derive(Debug, Clone)]
pub struct OrgStore {
    pool: SqlitePool,
    org_id: OrgId,
}

impl OrgStore {
    /// Open (creating if necessary) the organization's database and ensure
    /// the tracking schema exists.
    pub async fn open(config: &StoreConfig, org_id: OrgId) -> Result<Self, StoreError> {
        let path = config.org_db_path(org_id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(file_options(&path))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::from_pool(pool, org_id).await
    }

    /// Wrap an existing pool (used by tests with in-memory databases).
    pub async fn from_pool(pool: SqlitePool, org_id: OrgId) -> Result<Self, StoreError> {
        migrations::run_tracking_migrations(&pool).await?;
        Ok(Self { pool, org_id })
    }

    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a batch from computed schedules: one row per scheduled event
    /// matching the requested types and the scope's date range, or (for the
    /// bulk scope) one row per contact per type dated `as_of`.
    ///
    /// All rows are inserted in a single transaction.
    #[instrument(skip(self, schedules), fields(org = %self.org_id, scope = ?scope))]
    pub async fn init_batch(
        &self,
        schedules: &[ScheduleResult],
        email_types: &[EmailType],
        scope: BatchScope,
        mode: SendMode,
        test_recipient: Option<&str>,
        as_of: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        validate_batch_request(email_types, mode, test_recipient)?;

        let batch_id = new_batch_id(Utc::now());
        let recipient = (mode == SendMode::Test).then(|| test_recipient.unwrap_or_default());
        let mut tx = self.pool.begin().await?;
        let mut total = 0_u64;

        if scope == BatchScope::Bulk {
            let mut seen = HashSet::new();
            for schedule in schedules {
                if !seen.insert(schedule.contact_id.clone()) {
                    continue;
                }
                for email_type in email_types {
                    insert_row(
                        &mut tx,
                        self.org_id,
                        &schedule.contact_id,
                        *email_type,
                        as_of,
                        mode,
                        recipient,
                        &batch_id,
                    )
                    .await?;
                    total += 1;
                }
            }
        } else {
            let (range_start, range_end) = scope.date_range(as_of);
            for schedule in schedules {
                for event in &schedule.scheduled {
                    let Some(date) = event.date else { continue };
                    if !email_types.contains(&event.email_type) {
                        continue;
                    }
                    if date < range_start || date > range_end {
                        continue;
                    }
                    insert_row(
                        &mut tx,
                        self.org_id,
                        &schedule.contact_id,
                        event.email_type,
                        date,
                        mode,
                        recipient,
                        &batch_id,
                    )
                    .await?;
                    total += 1;
                }
            }
        }

        tx.commit().await?;
        info!(batch = %batch_id, rows = total, "batch initialized");
        Ok(batch_id)
    }

    /// Create a batch with exactly one row per unique contact, always dated
    /// `as_of`, under a `batch_single_` id.
    #[instrument(skip(self, contact_ids), fields(org = %self.org_id))]
    pub async fn init_single_email_batch(
        &self,
        contact_ids: &[ContactId],
        email_type: EmailType,
        mode: SendMode,
        test_recipient: Option<&str>,
        as_of: NaiveDate,
    ) -> Result<BatchId, StoreError> {
        validate_batch_request(&[email_type], mode, test_recipient)?;

        let batch_id = new_single_batch_id(Utc::now());
        let recipient = (mode == SendMode::Test).then(|| test_recipient.unwrap_or_default());
        let mut tx = self.pool.begin().await?;
        let mut seen = HashSet::new();
        let mut total = 0_u64;

        for contact_id in contact_ids {
            if !seen.insert(contact_id.clone()) {
                continue;
            }
            insert_row(
                &mut tx,
                self.org_id,
                contact_id,
                email_type,
                as_of,
                mode,
                recipient,
                &batch_id,
            )
            .await?;
            total += 1;
        }

        tx.commit().await?;
        info!(batch = %batch_id, rows = total, "single-email batch initialized");
        Ok(batch_id)
    }

    /// Next pending rows of a batch, earliest scheduled first.
    pub async fn next_pending(
        &self,
        batch_id: &BatchId,
        limit: i64,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        self.rows_by_status(batch_id, SendStatus::Pending, limit).await
    }

    /// Failed rows of a batch for retry, earliest scheduled first.
    pub async fn next_failed(
        &self,
        batch_id: &BatchId,
        limit: i64,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        self.rows_by_status(batch_id, SendStatus::Failed, limit).await
    }

    async fn rows_by_status(
        &self,
        batch_id: &BatchId,
        status: SendStatus,
        limit: i64,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM email_send_tracking
             WHERE batch_id = ? AND send_status = ?
             ORDER BY scheduled_date ASC, id ASC
             LIMIT ?",
        )
        .bind(batch_id.as_str())
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_from_sqlite).collect()
    }

    /// Claim rows for dispatch by moving them to `processing`.
    pub async fn mark_processing(&self, row_ids: &[i64]) -> Result<(), StoreError> {
        if row_ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; row_ids.len()].join(",");
        let sql = format!(
            "UPDATE email_send_tracking SET send_status = 'processing' WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in row_ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    /// Mark one row sent: records the provider message id when present,
    /// bumps the attempt counter, and stamps the attempt time.
    pub async fn mark_sent(
        &self,
        row_id: i64,
        message_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE email_send_tracking
             SET send_status = 'sent',
                 message_id = COALESCE(?, message_id),
                 send_attempt_count = send_attempt_count + 1,
                 last_attempt_date = ?
             WHERE id = ?",
        )
        .bind(message_id)
        .bind(Utc::now())
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(row_id));
        }
        Ok(())
    }

    /// Mark one row failed with a truncated error message.
    pub async fn mark_failed(&self, row_id: i64, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE email_send_tracking
             SET send_status = 'failed',
                 last_error = ?,
                 send_attempt_count = send_attempt_count + 1,
                 last_attempt_date = ?
             WHERE id = ?",
        )
        .bind(truncate(error, MAX_ERROR_LEN))
        .bind(Utc::now())
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(row_id));
        }
        Ok(())
    }

    /// Apply a whole chunk's outcomes in one transaction.
    pub async fn record_outcomes(&self, outcomes: &[SendOutcome]) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for outcome in outcomes {
            match &outcome.outcome {
                Ok(message_id) => {
                    sqlx::query(
                        "UPDATE email_send_tracking
                         SET send_status = 'sent',
                             message_id = COALESCE(?, message_id),
                             send_attempt_count = send_attempt_count + 1,
                             last_attempt_date = ?
                         WHERE id = ?",
                    )
                    .bind(message_id.as_deref())
                    .bind(now)
                    .bind(outcome.row_id)
                    .execute(&mut *tx)
                    .await?;
                }
                Err(error) => {
                    sqlx::query(
                        "UPDATE email_send_tracking
                         SET send_status = 'failed',
                             last_error = ?,
                             send_attempt_count = send_attempt_count + 1,
                             last_attempt_date = ?
                         WHERE id = ?",
                    )
                    .bind(truncate(error, MAX_ERROR_LEN))
                    .bind(now)
                    .bind(outcome.row_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Number of rows in a batch with the given status.
    pub async fn count_status(
        &self,
        batch_id: &BatchId,
        status: SendStatus,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM email_send_tracking
             WHERE batch_id = ? AND send_status = ?",
        )
        .bind(batch_id.as_str())
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    /// Aggregate counts and completion percentages for one batch.
    pub async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchStatus, StoreError> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN send_status = 'pending' THEN 1 ELSE 0 END) AS pending,
                SUM(CASE WHEN send_status = 'processing' THEN 1 ELSE 0 END) AS processing,
                SUM(CASE WHEN send_status = 'accepted' THEN 1 ELSE 0 END) AS accepted,
                SUM(CASE WHEN send_status = 'sent' THEN 1 ELSE 0 END) AS sent,
                SUM(CASE WHEN send_status = 'delivered' THEN 1 ELSE 0 END) AS delivered,
                SUM(CASE WHEN send_status = 'deferred' THEN 1 ELSE 0 END) AS deferred,
                SUM(CASE WHEN send_status = 'bounced' THEN 1 ELSE 0 END) AS bounced,
                SUM(CASE WHEN send_status = 'dropped' THEN 1 ELSE 0 END) AS dropped,
                SUM(CASE WHEN send_status = 'failed' THEN 1 ELSE 0 END) AS failed,
                SUM(CASE WHEN send_status = 'skipped' THEN 1 ELSE 0 END) AS skipped,
                MAX(created_at) AS created_at,
                MAX(updated_at) AS updated_at,
                MAX(send_mode) AS send_mode,
                MAX(test_email) AS test_email
             FROM email_send_tracking
             WHERE batch_id = ?",
        )
        .bind(batch_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        if total == 0 {
            return Err(StoreError::BatchNotFound(batch_id.to_string()));
        }

        let pending: i64 = row.get("pending");
        let processing: i64 = row.get("processing");
        let delivered: i64 = row.get("delivered");

        #[allow(clippy::cast_precision_loss)]
        let percent = |n: i64| round2(n as f64 / total as f64 * 100.0);

        Ok(BatchStatus {
            batch_id: batch_id.clone(),
            org_id: self.org_id,
            total,
            pending,
            processing,
            accepted: row.get("accepted"),
            sent: row.get("sent"),
            delivered,
            deferred: row.get("deferred"),
            bounced: row.get("bounced"),
            dropped: row.get("dropped"),
            failed: row.get("failed"),
            skipped: row.get("skipped"),
            send_mode: row.get("send_mode"),
            test_email: row.get("test_email"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completion_percentage: percent(total - pending - processing),
            delivery_percentage: percent(delivered),
            is_complete: pending + processing == 0,
        })
    }

    /// Recent batches in this organization, newest first, optionally
    /// filtered to batches containing rows with `status`.
    pub async fn list_batches(
        &self,
        limit: i64,
        status: Option<SendStatus>,
    ) -> Result<Vec<BatchSummary>, StoreError> {
        let mut sql = String::from(
            "SELECT
                batch_id,
                MAX(created_at) AS created_at,
                MAX(updated_at) AS updated_at,
                COUNT(*) AS total,
                SUM(CASE WHEN send_status = 'sent' THEN 1 ELSE 0 END) AS sent,
                SUM(CASE WHEN send_status = 'failed' THEN 1 ELSE 0 END) AS failed,
                SUM(CASE WHEN send_status = 'pending' THEN 1 ELSE 0 END) AS pending,
                MAX(send_mode) AS send_mode
             FROM email_send_tracking",
        );
        if status.is_some() {
            sql.push_str(
                " WHERE batch_id IN (
                    SELECT DISTINCT batch_id FROM email_send_tracking WHERE send_status = ?
                  )",
            );
        }
        sql.push_str(" GROUP BY batch_id ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let pending: i64 = row.get("pending");
                BatchSummary {
                    batch_id: BatchId::new(row.get::<String, _>("batch_id")),
                    org_id: self.org_id,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                    total: row.get("total"),
                    sent: row.get("sent"),
                    failed: row.get("failed"),
                    pending,
                    send_mode: row.get("send_mode"),
                    is_complete: pending == 0,
                }
            })
            .collect())
    }

    /// True when the batch has at least one row in this store.
    pub async fn contains_batch(&self, batch_id: &BatchId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(
                SELECT 1 FROM email_send_tracking WHERE batch_id = ?
             ) AS present",
        )
        .bind(batch_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("present") != 0)
    }

    /// Rows eligible for a provider status check: a message id is present,
    /// the send is not yet terminal, and the last check is absent or older
    /// than `checked_before`.
    pub async fn rows_needing_status_check(
        &self,
        batch_id: Option<&BatchId>,
        limit: i64,
        checked_before: DateTime<Utc>,
    ) -> Result<Vec<TrackingRow>, StoreError> {
        let mut sql = String::from(
            "SELECT * FROM email_send_tracking
             WHERE message_id IS NOT NULL
               AND send_status IN ('accepted', 'deferred', 'sent')
               AND (status_checked_at IS NULL OR status_checked_at < ?)",
        );
        if batch_id.is_some() {
            sql.push_str(" AND batch_id = ?");
        }
        sql.push_str(" ORDER BY last_attempt_date DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(checked_before);
        if let Some(batch_id) = batch_id {
            query = query.bind(batch_id.as_str());
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(row_from_sqlite).collect()
    }

    /// Record the result of one provider status check or webhook event.
    pub async fn apply_status_result(
        &self,
        row_id: i64,
        send_status: SendStatus,
        delivery_status: &str,
        details: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE email_send_tracking
             SET send_status = ?,
                 delivery_status = ?,
                 status_checked_at = ?,
                 status_details = ?
             WHERE id = ?",
        )
        .bind(send_status.as_str())
        .bind(delivery_status)
        .bind(checked_at)
        .bind(details)
        .bind(row_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(row_id));
        }
        Ok(())
    }

    /// Stamp a failed status check so the row is not re-queried immediately.
    pub async fn touch_status_checked(
        &self,
        row_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE email_send_tracking SET status_checked_at = ? WHERE id = ?")
            .bind(checked_at)
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look up one row by provider message id.
    pub async fn find_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<TrackingRow>, StoreError> {
        let row = sqlx::query("SELECT * FROM email_send_tracking WHERE message_id = ? LIMIT 1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_from_sqlite).transpose()
    }

    /// Fetch one row by id.
    pub async fn get_row(&self, row_id: i64) -> Result<TrackingRow, StoreError> {
        let row = sqlx::query("SELECT * FROM email_send_tracking WHERE id = ?")
            .bind(row_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(row_from_sqlite)
            .transpose()?
            .ok_or(StoreError::RowNotFound(row_id))
    }
}

fn validate_batch_request(
    email_types: &[EmailType],
    mode: SendMode,
    test_recipient: Option<&str>,
) -> Result<(), StoreError> {
    if email_types.is_empty() {
        return Err(StoreError::InvalidBatch(
            "at least one email type is required".to_owned(),
        ));
    }
    if email_types.contains(&EmailType::All) {
        return Err(StoreError::InvalidBatch(
            "invalid email type: all".to_owned(),
        ));
    }
    if mode == SendMode::Test && test_recipient.map_or(true, str::is_empty) {
        return Err(StoreError::InvalidBatch(
            "test email is required for test mode".to_owned(),
        ));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    org_id: OrgId,
    contact_id: &ContactId,
    email_type: EmailType,
    scheduled_date: NaiveDate,
    mode: SendMode,
    test_recipient: Option<&str>,
    batch_id: &BatchId,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO email_send_tracking
         (org_id, contact_id, email_type, scheduled_date, send_status, send_mode,
          test_email, batch_id)
         VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(org_id.value())
    .bind(contact_id.as_str())
    .bind(email_type.as_str())
    .bind(scheduled_date)
    .bind(mode.as_str())
    .bind(test_recipient)
    .bind(batch_id.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn row_from_sqlite(row: &SqliteRow) -> Result<TrackingRow, StoreError> {
    let email_type: String = row.get("email_type");
    let send_status: String = row.get("send_status");
    let send_mode: String = row.get("send_mode");

    Ok(TrackingRow {
        id: row.get("id"),
        org_id: OrgId::new(row.get("org_id")),
        contact_id: ContactId::new(row.get::<String, _>("contact_id")),
        email_type: EmailType::from_str(&email_type).map_err(StoreError::Serialization)?,
        scheduled_date: row.get("scheduled_date"),
        send_status: SendStatus::from_str(&send_status).map_err(StoreError::Serialization)?,
        send_mode: SendMode::from_str(&send_mode).map_err(StoreError::Serialization)?,
        test_email: row.get("test_email"),
        send_attempt_count: row.get("send_attempt_count"),
        last_attempt_date: row.get("last_attempt_date"),
        last_error: row.get("last_error"),
        batch_id: BatchId::new(row.get::<String, _>("batch_id")),
        message_id: row.get("message_id"),
        delivery_status: row.get("delivery_status"),
        status_checked_at: row.get("status_checked_at"),
        status_details: row.get("status_details"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::EmailEvent;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    async fn memory_store() -> OrgStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        OrgStore::from_pool(pool, OrgId::new(1)).await.unwrap()
    }

    fn schedule(contact: &str, events: Vec<(EmailType, NaiveDate)>) -> ScheduleResult {
        ScheduleResult {
            contact_id: ContactId::from(contact),
            scheduled: events
                .into_iter()
                .map(|(ty, date)| EmailEvent::scheduled(ty, date))
                .collect(),
            skipped: Vec::new(),
        }
    }

    #[tokio::test]
    async fn init_batch_inserts_matching_events() {
        let store = memory_store().await;
        let as_of = d(2024, 6, 1);
        let schedules = vec![
            schedule(
                "1",
                vec![
                    (EmailType::Birthday, d(2024, 6, 3)),
                    (EmailType::Aep, d(2024, 8, 18)),
                ],
            ),
            schedule("2", vec![(EmailType::Birthday, d(2024, 6, 20))]),
        ];

        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::Next7Days,
                SendMode::Production,
                None,
                as_of,
            )
            .await
            .unwrap();

        // Only contact 1's birthday email falls inside [Jun 1, Jun 8]; the
        // AEP event is the wrong type and contact 2's date is out of range.
        let status = store.batch_status(&batch_id).await.unwrap();
        assert_eq!(status.total, 1);
        assert_eq!(status.pending, 1);

        let rows = store.next_pending(&batch_id, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contact_id.as_str(), "1");
        assert_eq!(rows[0].email_type, EmailType::Birthday);
        assert_eq!(rows[0].scheduled_date, d(2024, 6, 3));
        assert_eq!(rows[0].send_status, SendStatus::Pending);
    }

    #[tokio::test]
    async fn bulk_scope_creates_contact_type_matrix() {
        let store = memory_store().await;
        let schedules = vec![
            schedule("1", vec![]),
            schedule("2", vec![]),
            schedule("2", vec![]), // duplicate contact collapses
        ];

        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday, EmailType::Aep],
                BatchScope::Bulk,
                SendMode::Test,
                Some("qa@example.com"),
                d(2024, 6, 1),
            )
            .await
            .unwrap();

        let status = store.batch_status(&batch_id).await.unwrap();
        assert_eq!(status.total, 4); // 2 contacts x 2 types
        let rows = store.next_pending(&batch_id, 10).await.unwrap();
        for row in &rows {
            assert_eq!(row.scheduled_date, d(2024, 6, 1));
            assert_eq!(row.test_email.as_deref(), Some("qa@example.com"));
            assert_eq!(row.send_mode, SendMode::Test);
        }
    }

    #[tokio::test]
    async fn single_email_batch_dedupes_contacts() {
        let store = memory_store().await;
        let ids = vec![
            ContactId::from("1"),
            ContactId::from("2"),
            ContactId::from("1"),
        ];
        let batch_id = store
            .init_single_email_batch(
                &ids,
                EmailType::Aep,
                SendMode::Production,
                None,
                d(2024, 8, 1),
            )
            .await
            .unwrap();

        assert!(batch_id.starts_with("batch_single_"));
        let status = store.batch_status(&batch_id).await.unwrap();
        assert_eq!(status.total, 2);
    }

    #[tokio::test]
    async fn test_mode_requires_recipient() {
        let store = memory_store().await;
        let err = store
            .init_batch(
                &[],
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Test,
                None,
                d(2024, 1, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidBatch(_)));
    }

    #[tokio::test]
    async fn all_type_is_rejected() {
        let store = memory_store().await;
        let err = store
            .init_batch(
                &[],
                &[EmailType::All],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 1, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidBatch(_)));
    }

    #[tokio::test]
    async fn mark_sent_and_failed_update_attempts() {
        let store = memory_store().await;
        let schedules = vec![schedule(
            "1",
            vec![
                (EmailType::Birthday, d(2024, 6, 3)),
                (EmailType::Aep, d(2024, 8, 18)),
            ],
        )];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday, EmailType::Aep],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();

        let rows = store.next_pending(&batch_id, 10).await.unwrap();
        assert_eq!(rows.len(), 2);

        store.mark_sent(rows[0].id, Some("sg-123")).await.unwrap();
        store.mark_failed(rows[1].id, "mailbox full").await.unwrap();

        let sent = store.get_row(rows[0].id).await.unwrap();
        assert_eq!(sent.send_status, SendStatus::Sent);
        assert_eq!(sent.message_id.as_deref(), Some("sg-123"));
        assert_eq!(sent.send_attempt_count, 1);
        assert!(sent.last_attempt_date.is_some());

        let failed = store.get_row(rows[1].id).await.unwrap();
        assert_eq!(failed.send_status, SendStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("mailbox full"));

        // Conservation: every row is accounted for by exactly one status.
        let status = store.batch_status(&batch_id).await.unwrap();
        assert_eq!(
            status.total,
            status.pending
                + status.processing
                + status.accepted
                + status.sent
                + status.delivered
                + status.deferred
                + status.bounced
                + status.dropped
                + status.failed
                + status.skipped
        );
        assert_eq!(status.completion_percentage, 100.0);
        assert_eq!(status.delivery_percentage, 0.0);
        assert!(status.is_complete);
    }

    #[tokio::test]
    async fn failed_rows_selected_for_retry() {
        let store = memory_store().await;
        let schedules = vec![schedule("1", vec![(EmailType::Birthday, d(2024, 6, 3))])];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();

        let rows = store.next_pending(&batch_id, 1).await.unwrap();
        store.mark_failed(rows[0].id, "boom").await.unwrap();

        let failed = store.next_failed(&batch_id, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(store.next_pending(&batch_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_errors_are_truncated() {
        let store = memory_store().await;
        let schedules = vec![schedule("1", vec![(EmailType::Birthday, d(2024, 6, 3))])];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();
        let rows = store.next_pending(&batch_id, 1).await.unwrap();

        let long_error = "x".repeat(900);
        store.mark_failed(rows[0].id, &long_error).await.unwrap();
        let row = store.get_row(rows[0].id).await.unwrap();
        assert_eq!(row.last_error.unwrap().len(), 500);
    }

    #[tokio::test]
    async fn record_outcomes_is_transactional() {
        let store = memory_store().await;
        let schedules = vec![schedule(
            "1",
            vec![
                (EmailType::Birthday, d(2024, 6, 3)),
                (EmailType::Aep, d(2024, 8, 18)),
            ],
        )];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday, EmailType::Aep],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();
        let rows = store.next_pending(&batch_id, 10).await.unwrap();

        store
            .record_outcomes(&[
                SendOutcome {
                    row_id: rows[0].id,
                    outcome: Ok(Some("sg-1".into())),
                },
                SendOutcome {
                    row_id: rows[1].id,
                    outcome: Err("refused".into()),
                },
            ])
            .await
            .unwrap();

        let status = store.batch_status(&batch_id).await.unwrap();
        assert_eq!(status.sent, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn status_check_selection_honors_cutoff() {
        let store = memory_store().await;
        let schedules = vec![schedule("1", vec![(EmailType::Birthday, d(2024, 6, 3))])];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();
        let rows = store.next_pending(&batch_id, 1).await.unwrap();
        store.mark_sent(rows[0].id, Some("sg-1")).await.unwrap();

        let now = Utc::now();
        let due = store
            .rows_needing_status_check(Some(&batch_id), 10, now)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        // A fresh check stamp takes the row out of the candidate set.
        store.touch_status_checked(rows[0].id, now).await.unwrap();
        let due = store
            .rows_needing_status_check(Some(&batch_id), 10, now - chrono::Duration::minutes(15))
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn apply_status_result_round_trip() {
        let store = memory_store().await;
        let schedules = vec![schedule("1", vec![(EmailType::Birthday, d(2024, 6, 3))])];
        let batch_id = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();
        let rows = store.next_pending(&batch_id, 1).await.unwrap();
        store.mark_sent(rows[0].id, Some("sg-9")).await.unwrap();

        let now = Utc::now();
        store
            .apply_status_result(rows[0].id, SendStatus::Delivered, "delivered", "{}", now)
            .await
            .unwrap();

        let row = store.find_by_message_id("sg-9").await.unwrap().unwrap();
        assert_eq!(row.send_status, SendStatus::Delivered);
        assert_eq!(row.delivery_status.as_deref(), Some("delivered"));
        assert!(row.status_checked_at.is_some());
    }

    #[tokio::test]
    async fn list_batches_newest_first() {
        let store = memory_store().await;
        let schedules = vec![schedule("1", vec![(EmailType::Birthday, d(2024, 6, 3))])];
        let first = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();
        let second = store
            .init_batch(
                &schedules,
                &[EmailType::Birthday],
                BatchScope::All,
                SendMode::Production,
                None,
                d(2024, 6, 1),
            )
            .await
            .unwrap();

        let batches = store.list_batches(10, None).await.unwrap();
        assert_eq!(batches.len(), 2);
        let ids: Vec<&str> = batches.iter().map(|b| b.batch_id.as_str()).collect();
        assert!(ids.contains(&first.as_str()));
        assert!(ids.contains(&second.as_str()));

        // Failed-status filter drops untouched batches.
        let rows = store.next_pending(&second, 1).await.unwrap();
        store.mark_failed(rows[0].id, "boom").await.unwrap();
        let failed_only = store
            .list_batches(10, Some(SendStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed_only.len(), 1);
        assert_eq!(failed_only[0].batch_id, second);
    }

    #[tokio::test]
    async fn missing_batch_status_errors() {
        let store = memory_store().await;
        let err = store
            .batch_status(&BatchId::from("batch_nothere_20240101_000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BatchNotFound(_)));
    }
}
