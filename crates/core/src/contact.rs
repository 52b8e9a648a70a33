use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{ContactId, OrgId};

/// An insurance contact as the scheduler and executor see it.
///
/// Contacts live outside the core; this is the projection returned by the
/// contact directory. At least one of `birth_date` / `effective_date` must be
/// present for scheduling to emit anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Stable contact identifier.
    pub id: ContactId,

    /// Owning organization.
    pub org_id: OrgId,

    pub first_name: Option<String>,
    pub last_name: Option<String>,

    /// Destination address for production sends.
    pub email: String,

    /// Two-letter U.S. state code. Absent when neither the record nor a ZIP
    /// lookup could determine it.
    pub state: Option<String>,

    /// Birth date anchor. Feb 29 is retained verbatim; occurrence expansion
    /// substitutes Feb 28 in non-leap years.
    pub birth_date: Option<NaiveDate>,

    /// Policy-anniversary anchor.
    pub effective_date: Option<NaiveDate>,

    pub zip_code: Option<String>,
}

impl Contact {
    /// Create a contact with only the fields scheduling requires.
    #[must_use]
    pub fn new(id: impl Into<ContactId>, org_id: impl Into<OrgId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            org_id: org_id.into(),
            first_name: None,
            last_name: None,
            email: email.into(),
            state: None,
            birth_date: None,
            effective_date: None,
            zip_code: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_birth_date(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// True when the contact carries at least one scheduling anchor.
    #[must_use]
    pub fn has_anchor_dates(&self) -> bool {
        self.birth_date.is_some() || self.effective_date.is_some()
    }

    /// State code, uppercased. Empty string when unknown.
    #[must_use]
    pub fn state_code(&self) -> String {
        self.state
            .as_deref()
            .map(str::trim)
            .map(str::to_uppercase)
            .unwrap_or_default()
    }

    /// Display name assembled from the name parts.
    #[must_use]
    pub fn full_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_owned(),
            (None, Some(l)) => l.to_owned(),
            (None, None) => String::new(),
        }
    }
}
