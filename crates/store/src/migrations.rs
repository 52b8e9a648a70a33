use sqlx::SqlitePool;

use crate::error::StoreError;

/// Schema of one organization's tracking database.
///
/// Statements are idempotent so every connection path can run them on open.
const TRACKING_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS email_send_tracking (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        org_id INTEGER NOT NULL,
        contact_id TEXT NOT NULL,
        email_type TEXT NOT NULL,
        scheduled_date TEXT NOT NULL,
        send_status TEXT NOT NULL DEFAULT 'pending',
        send_mode TEXT NOT NULL,
        test_email TEXT,
        send_attempt_count INTEGER NOT NULL DEFAULT 0,
        last_attempt_date TEXT,
        last_error TEXT,
        batch_id TEXT NOT NULL,
        message_id TEXT,
        delivery_status TEXT,
        status_checked_at TEXT,
        status_details TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_tracking_batch
        ON email_send_tracking(batch_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_status
        ON email_send_tracking(send_status)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_contact
        ON email_send_tracking(contact_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_contact_type
        ON email_send_tracking(contact_id, email_type)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_status_date
        ON email_send_tracking(send_status, scheduled_date)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_message
        ON email_send_tracking(message_id)",
    "CREATE INDEX IF NOT EXISTS idx_tracking_delivery
        ON email_send_tracking(delivery_status)",
    "CREATE TRIGGER IF NOT EXISTS email_send_tracking_touch_updated
        AFTER UPDATE ON email_send_tracking
        FOR EACH ROW
        BEGIN
            UPDATE email_send_tracking
            SET updated_at = datetime('now')
            WHERE id = NEW.id;
        END",
];

/// Schema of the registry database.
const REGISTRY_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS organizations (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
];

/// Ensure the tracking schema exists in an organization database.
pub async fn run_tracking_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in TRACKING_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Ensure the registry schema exists in the main database.
pub async fn run_registry_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in REGISTRY_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
