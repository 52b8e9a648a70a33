use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A `{month, day}` pair used for date overrides. Feb 29 is permitted and
/// resolves to Feb 28 in non-leap years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    #[must_use]
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    /// Resolve this pair in a concrete year, substituting Feb 28 for Feb 29
    /// in non-leap years.
    #[must_use]
    pub fn resolve(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            if self.month == 2 && self.day == 29 {
                NaiveDate::from_ymd_opt(year, 2, 28)
            } else {
                None
            }
        })
    }

    pub(crate) fn validate(self, context: &str) -> Result<(), ConfigError> {
        if !(1..=12).contains(&self.month) {
            return Err(ConfigError::date_override(
                context,
                "month must be between 1 and 12",
            ));
        }
        if !(1..=31).contains(&self.day) {
            return Err(ConfigError::date_override(
                context,
                "day must be between 1 and 31",
            ));
        }
        // Check against a leap year so Feb 29 passes.
        if NaiveDate::from_ymd_opt(2024, self.month, self.day).is_none() {
            return Err(ConfigError::date_override(
                context,
                format!("invalid calendar date {}-{}", self.month, self.day),
            ));
        }
        Ok(())
    }
}

/// Global lead times and the exclusion prelude, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConstants {
    #[serde(default = "default_birthday_lead")]
    pub birthday_email_days_before: i64,
    #[serde(default = "default_effective_lead")]
    pub effective_date_days_before: i64,
    #[serde(default = "default_exclusion_prelude")]
    pub pre_window_exclusion_days: i64,
}

fn default_birthday_lead() -> i64 {
    14
}

fn default_effective_lead() -> i64 {
    30
}

fn default_exclusion_prelude() -> i64 {
    60
}

impl Default for TimingConstants {
    fn default() -> Self {
        Self {
            birthday_email_days_before: default_birthday_lead(),
            effective_date_days_before: default_effective_lead(),
            pre_window_exclusion_days: default_exclusion_prelude(),
        }
    }
}

impl TimingConstants {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("birthday_email_days_before", self.birthday_email_days_before),
            ("effective_date_days_before", self.effective_date_days_before),
            ("pre_window_exclusion_days", self.pre_window_exclusion_days),
        ] {
            if value < 0 {
                return Err(ConfigError::InvalidTimingConstant(name.to_owned()));
            }
        }
        Ok(())
    }
}

/// One entry of the `state_rules` table as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRuleEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub window_before: Option<i64>,
    #[serde(default)]
    pub window_after: Option<i64>,
}

/// The `aep_config` section: which years have an AEP calendar and the
/// ordered candidate dates each of those years carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AepConfig {
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub default_dates: Vec<MonthDay>,
}

impl AepConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.years.is_empty() {
            return Err(ConfigError::InvalidAepConfig(
                "years must be a non-empty list".to_owned(),
            ));
        }
        for year in &self.years {
            if *year < 2000 {
                return Err(ConfigError::InvalidAepConfig(format!(
                    "invalid year: {year}"
                )));
            }
        }
        if self.default_dates.is_empty() {
            return Err(ConfigError::InvalidAepConfig(
                "default_dates must be a non-empty list".to_owned(),
            ));
        }
        for (i, date) in self.default_dates.iter().enumerate() {
            date.validate(&format!("AEP default date at index {i}"))?;
        }
        Ok(())
    }
}

/// Condition guarding a per-contact post-window override.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PostWindowCondition {
    #[serde(default)]
    pub birth_month: Option<u32>,
}

/// A per-contact post-window override: when the condition matches, the
/// override date replaces the computed post-window date for that year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWindowRule {
    #[serde(default)]
    pub condition: PostWindowCondition,
    pub override_date: MonthDay,
}

/// Per-contact overrides keyed by contact id in the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactRuleEntry {
    /// Emit the contact's AEP email even when every candidate date is
    /// excluded.
    #[serde(default)]
    pub force_aep: bool,

    /// Replace the AEP candidate with this date.
    #[serde(default)]
    pub aep_date_override: Option<MonthDay>,

    #[serde(default)]
    pub post_window_rules: Vec<PostWindowRule>,
}

/// The `global_rules` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalRules {
    /// Fixed AEP date applied to October birthdays with no contact-specific
    /// override.
    #[serde(default)]
    pub october_birthday_aep: Option<MonthDay>,
}

/// The rule configuration document as parsed from YAML, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub state_rules: BTreeMap<String, StateRuleEntry>,

    #[serde(default)]
    pub timing_constants: TimingConstants,

    #[serde(default)]
    pub aep_config: AepConfig,

    #[serde(default)]
    pub contact_rules: BTreeMap<String, ContactRuleEntry>,

    #[serde(default)]
    pub global_rules: GlobalRules,
}
