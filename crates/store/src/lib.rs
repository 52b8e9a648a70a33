//! Per-organization persistent tracking of planned email sends.
//!
//! Each organization owns one embedded SQLite file under `org_dbs/`; a
//! registry database at the base directory maps organization ids to names.
//! WAL journaling lets the status reconciler read while the send executor
//! writes. The executor transitions rows `pending → {sent, failed}`; the
//! reconciler transitions `sent|deferred|accepted → {delivered, bounced,
//! dropped, deferred}`. The source-state sets are disjoint, so the two
//! never race on a row.

pub mod config;
pub mod contacts;
pub mod error;
pub mod manager;
pub mod migrations;
pub mod store;

pub use config::StoreConfig;
pub use contacts::{SqliteContactDirectory, ensure_contacts_schema, upsert_contact};
pub use error::StoreError;
pub use manager::StoreManager;
pub use store::{BatchStatus, BatchSummary, OrgStore, SendOutcome};
