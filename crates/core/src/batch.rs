use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::BatchId;

/// Generate a batch id of the form `batch_<hex10>_<YYYYMMDD_HHMMSS>`.
///
/// The random component makes collisions implausible; the timestamp keeps
/// ids sortable and human-scannable in logs.
#[must_use]
pub fn new_batch_id(now: DateTime<Utc>) -> BatchId {
    let hex = Uuid::new_v4().simple().to_string();
    BatchId::new(format!(
        "batch_{}_{}",
        &hex[..10],
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Generate a single-email batch id of the form
/// `batch_single_<hex8>_<YYYYMMDD_HHMMSS>`.
#[must_use]
pub fn new_single_batch_id(now: DateTime<Utc>) -> BatchId {
    let hex = Uuid::new_v4().simple().to_string();
    BatchId::new(format!(
        "batch_single_{}_{}",
        &hex[..8],
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// True when `value` matches `batch(_single)?_<hex8..10>_<YYYYMMDD_HHMMSS>`.
#[must_use]
pub fn is_batch_id(value: &str) -> bool {
    let rest = match value.strip_prefix("batch_single_") {
        Some(rest) => rest,
        None => match value.strip_prefix("batch_") {
            Some(rest) => rest,
            None => return false,
        },
    };

    let mut parts = rest.splitn(2, '_');
    let (Some(hex), Some(stamp)) = (parts.next(), parts.next()) else {
        return false;
    };

    let hex_ok = (8..=10).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit());
    let stamp_ok = chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").is_ok();
    hex_ok && stamp_ok
}
