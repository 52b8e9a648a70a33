use async_trait::async_trait;
use sqlx::Row;
use sqlx::SqlitePool;

use cadence_core::{Contact, ContactId, OrgId};
use cadence_provider::{ContactDirectory, DirectoryError};

use crate::manager::StoreManager;

/// Contact directory backed by the `contacts` table each organization
/// database carries alongside the tracking table.
#[derive(Debug, Clone)]
pub struct SqliteContactDirectory {
    manager: StoreManager,
}

impl SqliteContactDirectory {
    #[must_use]
    pub fn new(manager: StoreManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ContactDirectory for SqliteContactDirectory {
    async fn get_contact(
        &self,
        org_id: OrgId,
        contact_id: &ContactId,
    ) -> Result<Contact, DirectoryError> {
        let store = self
            .manager
            .open_org(org_id)
            .await
            .map_err(|e| DirectoryError::Backend(e.to_string()))?;

        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, state, birth_date,
                    effective_date, zip_code
             FROM contacts
             WHERE id = ?",
        )
        .bind(contact_id.as_str())
        .fetch_optional(store.pool())
        .await
        .map_err(|e| DirectoryError::Backend(e.to_string()))?;

        let row = row.ok_or(DirectoryError::NotFound)?;

        Ok(Contact {
            id: ContactId::new(row.get::<i64, _>("id").to_string()),
            org_id,
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            state: row.get("state"),
            birth_date: row.get("birth_date"),
            effective_date: row.get("effective_date"),
            zip_code: row.get("zip_code"),
        })
    }
}

/// Ensure the `contacts` table exists. Contact rows are owned by the
/// importer outside the core; this schema exists so tests and fresh
/// deployments can seed them.
pub async fn ensure_contacts_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY,
            first_name TEXT,
            last_name TEXT,
            email TEXT NOT NULL,
            state TEXT,
            birth_date TEXT,
            effective_date TEXT,
            zip_code TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert or replace one contact row.
pub async fn upsert_contact(pool: &SqlitePool, contact: &Contact) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR REPLACE INTO contacts
         (id, first_name, last_name, email, state, birth_date, effective_date, zip_code)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(contact.id.as_str())
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.email)
    .bind(&contact.state)
    .bind(contact.birth_date)
    .bind(contact.effective_date)
    .bind(&contact.zip_code)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::config::StoreConfig;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn directory_reads_seeded_contact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StoreManager::new(StoreConfig::new(dir.path()));
        let store = manager.open_org(OrgId::new(5)).await.unwrap();
        ensure_contacts_schema(store.pool()).await.unwrap();

        let contact = Contact::new("12", 5, "mia@example.com")
            .with_name("Mia", "Chen")
            .with_state("CA")
            .with_birth_date(d(1960, 2, 29));
        upsert_contact(store.pool(), &contact).await.unwrap();

        let directory = SqliteContactDirectory::new(manager);
        let loaded = directory
            .get_contact(OrgId::new(5), &ContactId::from("12"))
            .await
            .unwrap();
        assert_eq!(loaded.email, "mia@example.com");
        assert_eq!(loaded.state_code(), "CA");
        assert_eq!(loaded.birth_date, Some(d(1960, 2, 29)));
        assert_eq!(loaded.full_name(), "Mia Chen");
    }

    #[tokio::test]
    async fn missing_contact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StoreManager::new(StoreConfig::new(dir.path()));
        let store = manager.open_org(OrgId::new(5)).await.unwrap();
        ensure_contacts_schema(store.pool()).await.unwrap();

        let directory = SqliteContactDirectory::new(manager);
        let missing = directory
            .get_contact(OrgId::new(5), &ContactId::from("99"))
            .await;
        assert!(matches!(missing, Err(DirectoryError::NotFound)));
    }
}
