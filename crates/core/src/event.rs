use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::ContactId;

/// The kind of lifecycle email an event represents.
///
/// `All` appears only in skip lists, standing for "every email type for this
/// contact" (year-round states, missing anchors, processing errors).
/// `anniversary` is accepted as an alias of `effective_date` at the
/// serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Birthday,
    #[serde(alias = "anniversary")]
    EffectiveDate,
    Aep,
    PostWindow,
    All,
}

impl EmailType {
    /// All types that correspond to a concrete send.
    pub const SENDABLE: [EmailType; 4] = [
        EmailType::Birthday,
        EmailType::EffectiveDate,
        EmailType::Aep,
        EmailType::PostWindow,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EmailType::Birthday => "birthday",
            EmailType::EffectiveDate => "effective_date",
            EmailType::Aep => "aep",
            EmailType::PostWindow => "post_window",
            EmailType::All => "all",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birthday" => Ok(EmailType::Birthday),
            "effective_date" | "anniversary" => Ok(EmailType::EffectiveDate),
            "aep" => Ok(EmailType::Aep),
            "post_window" => Ok(EmailType::PostWindow),
            "all" => Ok(EmailType::All),
            other => Err(format!("unknown email type: {other}")),
        }
    }
}

/// One dated (or, for whole-contact skips, undated) email event produced by
/// the scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEvent {
    #[serde(rename = "type")]
    pub email_type: EmailType,

    /// Send date. Absent only for `All`-typed skip entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// Human-readable skip reason, drawn from a small closed set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EmailEvent {
    /// A scheduled event with no reason attached.
    #[must_use]
    pub fn scheduled(email_type: EmailType, date: NaiveDate) -> Self {
        Self {
            email_type,
            date: Some(date),
            reason: None,
        }
    }

    /// A skipped event with its reason.
    #[must_use]
    pub fn skipped(email_type: EmailType, date: Option<NaiveDate>, reason: impl Into<String>) -> Self {
        Self {
            email_type,
            date,
            reason: Some(reason.into()),
        }
    }
}

/// Classified schedule for one contact over a horizon.
///
/// Both lists are sorted ascending by date (undated entries first) and the
/// scheduled list never contains two events with the same `(type, date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub contact_id: ContactId,
    pub scheduled: Vec<EmailEvent>,
    pub skipped: Vec<EmailEvent>,
}

impl ScheduleResult {
    #[must_use]
    pub fn empty(contact_id: ContactId) -> Self {
        Self {
            contact_id,
            scheduled: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// An all-skipped result carrying a single `All`-typed entry.
    #[must_use]
    pub fn all_skipped(contact_id: ContactId, reason: impl Into<String>) -> Self {
        Self {
            contact_id,
            scheduled: Vec::new(),
            skipped: vec![EmailEvent::skipped(EmailType::All, None, reason)],
        }
    }

    /// Sort both lists by date and drop duplicate `(type, date)` pairs from
    /// the scheduled list, keeping the first occurrence.
    pub fn normalize(&mut self) {
        self.scheduled.sort_by_key(|e| e.date);
        self.skipped.sort_by_key(|e| e.date);

        let mut seen = std::collections::HashSet::new();
        self.scheduled.retain(|e| seen.insert((e.email_type, e.date)));
    }
}
