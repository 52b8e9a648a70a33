use std::path::{Path, PathBuf};

use cadence_core::OrgId;

/// Filesystem layout of the persisted state: one embedded database per
/// organization under `org_dbs/`, plus a registry database at the root.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding `main.db` and the `org_dbs/` directory.
    pub base_dir: PathBuf,

    /// Connections per pool. SQLite serializes writers anyway; a small pool
    /// keeps reader concurrency without file-handle sprawl.
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            pool_size: 5,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Path of one organization's database file.
    #[must_use]
    pub fn org_db_path(&self, org_id: OrgId) -> PathBuf {
        self.org_db_dir().join(format!("org-{org_id}.db"))
    }

    /// Directory containing the per-organization database files.
    #[must_use]
    pub fn org_db_dir(&self) -> PathBuf {
        self.base_dir.join("org_dbs")
    }

    /// Path of the registry database.
    #[must_use]
    pub fn main_db_path(&self) -> PathBuf {
        self.base_dir.join("main.db")
    }

    /// Parse an organization id out of a database file name like
    /// `org-12.db`.
    #[must_use]
    pub fn org_id_from_file(path: &Path) -> Option<OrgId> {
        let name = path.file_name()?.to_str()?;
        let id = name.strip_prefix("org-")?.strip_suffix(".db")?;
        id.parse::<i64>().ok().map(OrgId::new)
    }
}
