use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EmailType;
use crate::types::{BatchId, ContactId, OrgId};

/// Delivery state of one tracked send.
///
/// Transitions run `pending → processing → {accepted, sent, delivered,
/// deferred, bounced, dropped, failed, skipped}`. `delivered`, `bounced`,
/// `dropped`, `failed` and `skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Processing,
    Accepted,
    Sent,
    Delivered,
    Deferred,
    Bounced,
    Dropped,
    Failed,
    Skipped,
}

impl SendStatus {
    pub const ALL: [SendStatus; 10] = [
        SendStatus::Pending,
        SendStatus::Processing,
        SendStatus::Accepted,
        SendStatus::Sent,
        SendStatus::Delivered,
        SendStatus::Deferred,
        SendStatus::Bounced,
        SendStatus::Dropped,
        SendStatus::Failed,
        SendStatus::Skipped,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SendStatus::Pending => "pending",
            SendStatus::Processing => "processing",
            SendStatus::Accepted => "accepted",
            SendStatus::Sent => "sent",
            SendStatus::Delivered => "delivered",
            SendStatus::Deferred => "deferred",
            SendStatus::Bounced => "bounced",
            SendStatus::Dropped => "dropped",
            SendStatus::Failed => "failed",
            SendStatus::Skipped => "skipped",
        }
    }

    /// True once no further transition is expected.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SendStatus::Delivered
                | SendStatus::Bounced
                | SendStatus::Dropped
                | SendStatus::Failed
                | SendStatus::Skipped
        )
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SendStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown send status: {s}"))
    }
}

/// Whether a batch dispatches to a supplied test recipient or to each
/// contact's own address. Each mode has an independent enable gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    Test,
    Production,
}

impl SendMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SendMode::Test => "test",
            SendMode::Production => "production",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(SendMode::Test),
            "production" => Ok(SendMode::Production),
            other => Err(format!("unknown send mode: {other}")),
        }
    }
}

/// Date-range filter applied when a batch is initialized from a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchScope {
    Today,
    Next7Days,
    Next30Days,
    Next90Days,
    All,
    /// One row per contact per email type, all dated today, ignoring the
    /// computed schedule.
    Bulk,
}

impl BatchScope {
    /// Inclusive date range selected by this scope, anchored at `as_of`.
    /// `Bulk` has no range; callers special-case it.
    #[must_use]
    pub fn date_range(self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            BatchScope::Today => (as_of, as_of),
            BatchScope::Next7Days => (as_of, as_of + chrono::Days::new(7)),
            BatchScope::Next30Days => (as_of, as_of + chrono::Days::new(30)),
            BatchScope::Next90Days => (as_of, as_of + chrono::Days::new(90)),
            BatchScope::All => (as_of, as_of + chrono::Days::new(365)),
            BatchScope::Bulk => (
                NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
                NaiveDate::from_ymd_opt(2100, 1, 1).expect("valid date"),
            ),
        }
    }
}

/// One persisted send attempt and its provider feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRow {
    /// Row id within the owning organization's database.
    pub id: i64,
    pub org_id: OrgId,
    pub contact_id: ContactId,
    pub email_type: EmailType,
    pub scheduled_date: NaiveDate,
    pub send_status: SendStatus,
    pub send_mode: SendMode,
    /// Recipient override for test mode.
    pub test_email: Option<String>,
    pub send_attempt_count: i64,
    pub last_attempt_date: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub batch_id: BatchId,
    /// Provider message id once the provider accepted the send.
    pub message_id: Option<String>,
    /// Raw provider status string from the most recent reconciliation.
    pub delivery_status: Option<String>,
    pub status_checked_at: Option<DateTime<Utc>>,
    /// Serialized provider response from the most recent reconciliation.
    pub status_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in SendStatus::ALL {
            assert_eq!(status.as_str().parse::<SendStatus>().unwrap(), status);
        }
        assert!("nope".parse::<SendStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(SendStatus::Delivered.is_terminal());
        assert!(SendStatus::Bounced.is_terminal());
        assert!(SendStatus::Dropped.is_terminal());
        assert!(SendStatus::Failed.is_terminal());
        assert!(SendStatus::Skipped.is_terminal());
        assert!(!SendStatus::Pending.is_terminal());
        assert!(!SendStatus::Sent.is_terminal());
        assert!(!SendStatus::Deferred.is_terminal());
    }

    #[test]
    fn scope_ranges() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(BatchScope::Today.date_range(as_of), (as_of, as_of));

        let (start, end) = BatchScope::Next7Days.date_range(as_of);
        assert_eq!(start, as_of);
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 6, 8).unwrap());

        let (_, all_end) = BatchScope::All.date_range(as_of);
        assert_eq!(all_end, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn mode_parses() {
        assert_eq!("test".parse::<SendMode>().unwrap(), SendMode::Test);
        assert_eq!("production".parse::<SendMode>().unwrap(), SendMode::Production);
        assert!("staging".parse::<SendMode>().is_err());
    }
}
