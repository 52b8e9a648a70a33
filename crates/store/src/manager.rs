use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{debug, warn};

use cadence_core::{BatchId, OrgId, SendStatus};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::migrations;
use crate::store::{BatchSummary, OrgStore, file_options};

/// Opens per-organization stores and answers the cross-organization
/// questions: which org owns a batch or a provider message, and what
/// batches exist anywhere.
///
/// Connections are opened per call and dropped when the store goes out of
/// scope; nothing is shared across tasks.
#[derive(Debug, Clone)]
pub struct StoreManager {
    config: StoreConfig,
}

impl StoreManager {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open one organization's tracking store, creating the database file
    /// and schema on first use.
    pub async fn open_org(&self, org_id: OrgId) -> Result<OrgStore, StoreError> {
        OrgStore::open(&self.config, org_id).await
    }

    /// Register an organization in the registry database.
    pub async fn register_org(&self, org_id: OrgId, name: &str) -> Result<(), StoreError> {
        let pool = self.registry_pool().await?;
        sqlx::query(
            "INSERT INTO organizations (id, name) VALUES (?, ?)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name",
        )
        .bind(org_id.value())
        .bind(name)
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Organization display name from the registry, when registered.
    pub async fn org_name(&self, org_id: OrgId) -> Result<Option<String>, StoreError> {
        let pool = self.registry_pool().await?;
        let row = sqlx::query("SELECT name FROM organizations WHERE id = ?")
            .bind(org_id.value())
            .fetch_optional(&pool)
            .await?;
        Ok(row.map(|r| r.get("name")))
    }

    /// Organization ids discovered from database files on disk, ascending.
    #[must_use]
    pub fn list_org_ids(&self) -> Vec<OrgId> {
        let Ok(entries) = std::fs::read_dir(self.config.org_db_dir()) else {
            return Vec::new();
        };
        let mut ids: Vec<OrgId> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| StoreConfig::org_id_from_file(&entry.path()))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Find the organization owning a batch by scanning org databases.
    /// First match wins.
    pub async fn org_for_batch(&self, batch_id: &BatchId) -> Result<OrgId, StoreError> {
        for org_id in self.list_org_ids() {
            match self.open_org(org_id).await {
                Ok(store) => {
                    if store.contains_batch(batch_id).await? {
                        return Ok(org_id);
                    }
                }
                Err(err) => {
                    warn!(org = %org_id, %err, "skipping unreadable org database");
                }
            }
        }
        Err(StoreError::BatchNotFound(batch_id.to_string()))
    }

    /// Find the organization (and store) holding a provider message id.
    /// First match wins; `None` when no org knows the message.
    pub async fn org_for_message(&self, message_id: &str) -> Result<Option<OrgId>, StoreError> {
        for org_id in self.list_org_ids() {
            match self.open_org(org_id).await {
                Ok(store) => {
                    if store.find_by_message_id(message_id).await?.is_some() {
                        return Ok(Some(org_id));
                    }
                }
                Err(err) => {
                    warn!(org = %org_id, %err, "skipping unreadable org database");
                }
            }
        }
        debug!(message_id, "message id not found in any org database");
        Ok(None)
    }

    /// Recent batches, in one organization or across all of them, newest
    /// first.
    pub async fn list_batches(
        &self,
        org_id: Option<OrgId>,
        limit: i64,
        status: Option<SendStatus>,
    ) -> Result<Vec<BatchSummary>, StoreError> {
        let org_ids = match org_id {
            Some(id) => vec![id],
            None => self.list_org_ids(),
        };

        let mut batches = Vec::new();
        for org_id in org_ids {
            match self.open_org(org_id).await {
                Ok(store) => batches.extend(store.list_batches(limit, status).await?),
                Err(err) => {
                    warn!(org = %org_id, %err, "skipping unreadable org database");
                }
            }
        }

        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        batches.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(batches)
    }

    async fn registry_pool(&self) -> Result<sqlx::SqlitePool, StoreError> {
        let path = self.config.main_db_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(self.config.pool_size)
            .connect_with(file_options(&path))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        migrations::run_registry_migrations(&pool).await?;
        Ok(pool)
    }
}
