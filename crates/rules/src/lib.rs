//! Declarative scheduling rules: the per-state window table, timing
//! constants, the AEP calendar, and sparse per-contact overrides.
//!
//! The configuration is loaded once at process start (reload = restart) and
//! validated eagerly; every query afterwards is pure and infallible.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use tracing::info;

use cadence_core::Contact;

pub mod config;
pub mod error;

pub use config::{
    AepConfig, ContactRuleEntry, GlobalRules, MonthDay, PostWindowCondition, PostWindowRule,
    RuleDocument, StateRuleEntry, TimingConstants,
};
pub use error::ConfigError;

/// Regulatory scheduling rule for one U.S. state.
///
/// A tagged variant rather than a hierarchy: the engine dispatches on the
/// tag and reads the window pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRule {
    /// Window around the yearly birthday.
    Birthday { window_before: i64, window_after: i64 },
    /// Window around the yearly policy anniversary.
    EffectiveDate { window_before: i64, window_after: i64 },
    /// Year-round enrollment: no scheduled emails at all.
    YearRound,
    /// No special window; only global timing rules apply.
    None,
}

impl StateRule {
    /// True for the variants that produce rule windows.
    #[must_use]
    pub fn is_windowed(self) -> bool {
        matches!(self, StateRule::Birthday { .. } | StateRule::EffectiveDate { .. })
    }
}

/// Validated, immutable rule set shared by every scheduling call.
#[derive(Debug, Clone)]
pub struct RuleSet {
    state_rules: BTreeMap<String, StateRule>,
    timing: TimingConstants,
    aep_years: Vec<i32>,
    aep_dates: Vec<MonthDay>,
    contact_rules: BTreeMap<String, ContactRuleEntry>,
    october_birthday_aep: MonthDay,
}

impl Default for RuleSet {
    /// The canonical built-in table: nine birthday-rule states, Missouri's
    /// effective-date rule, and the four year-round enrollment states.
    fn default() -> Self {
        let mut state_rules = BTreeMap::new();
        let birthday = [
            ("CA", 30, 30),
            ("ID", 0, 63),
            ("IL", 0, 45),
            ("KY", 0, 60),
            ("LA", 30, 63),
            ("MD", 0, 31),
            ("NV", 0, 60),
            ("OK", 0, 60),
            ("OR", 0, 31),
        ];
        for (state, before, after) in birthday {
            state_rules.insert(
                state.to_owned(),
                StateRule::Birthday {
                    window_before: before,
                    window_after: after,
                },
            );
        }
        state_rules.insert(
            "MO".to_owned(),
            StateRule::EffectiveDate {
                window_before: 30,
                window_after: 33,
            },
        );
        for state in ["CT", "MA", "NY", "WA"] {
            state_rules.insert(state.to_owned(), StateRule::YearRound);
        }

        Self {
            state_rules,
            timing: TimingConstants::default(),
            aep_years: (2023..=2027).collect(),
            aep_dates: vec![
                MonthDay::new(8, 18),
                MonthDay::new(8, 25),
                MonthDay::new(9, 1),
                MonthDay::new(9, 7),
            ],
            contact_rules: BTreeMap::new(),
            october_birthday_aep: MonthDay::new(8, 25),
        }
    }
}

impl RuleSet {
    /// Build a validated rule set from a parsed document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending section when any part
    /// of the document is malformed.
    pub fn from_document(doc: RuleDocument) -> Result<Self, ConfigError> {
        doc.timing_constants.validate()?;
        doc.aep_config.validate()?;

        let mut state_rules = BTreeMap::new();
        for (state, entry) in &doc.state_rules {
            let rule = match entry.kind.as_str() {
                "year_round" => StateRule::YearRound,
                kind @ ("birthday" | "effective_date") => {
                    let (Some(before), Some(after)) = (entry.window_before, entry.window_after)
                    else {
                        return Err(ConfigError::state_rule(
                            state,
                            "missing window_before or window_after",
                        ));
                    };
                    if before < 0 || after < 0 {
                        return Err(ConfigError::state_rule(
                            state,
                            "window periods must be non-negative integers",
                        ));
                    }
                    if kind == "birthday" {
                        StateRule::Birthday {
                            window_before: before,
                            window_after: after,
                        }
                    } else {
                        StateRule::EffectiveDate {
                            window_before: before,
                            window_after: after,
                        }
                    }
                }
                other => {
                    return Err(ConfigError::state_rule(
                        state,
                        format!("invalid rule type '{other}'"),
                    ));
                }
            };
            state_rules.insert(state.to_uppercase(), rule);
        }

        for (contact, entry) in &doc.contact_rules {
            if let Some(override_date) = entry.aep_date_override {
                override_date.validate(&format!("Contact {contact} AEP override"))?;
            }
            for (i, rule) in entry.post_window_rules.iter().enumerate() {
                if let Some(month) = rule.condition.birth_month
                    && !(1..=12).contains(&month)
                {
                    return Err(ConfigError::contact_rule(
                        contact,
                        format!("invalid birth month in post window rule {i}"),
                    ));
                }
                rule.override_date
                    .validate(&format!("Contact {contact} post window rule {i}"))?;
            }
        }

        let october_birthday_aep = match doc.global_rules.october_birthday_aep {
            Some(date) => {
                date.validate("October birthday AEP rule")?;
                date
            }
            None => MonthDay::new(8, 25),
        };

        info!(
            states = state_rules.len(),
            contact_overrides = doc.contact_rules.len(),
            aep_years = doc.aep_config.years.len(),
            "rule configuration loaded"
        );

        Ok(Self {
            state_rules,
            timing: doc.timing_constants,
            aep_years: doc.aep_config.years,
            aep_dates: doc.aep_config.default_dates,
            contact_rules: doc.contact_rules,
            october_birthday_aep,
        })
    }

    /// Parse and validate a YAML rule document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_document(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load and validate a YAML rule document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Rule for a state code; `StateRule::None` when the state is unknown.
    #[must_use]
    pub fn rule_for(&self, state: &str) -> StateRule {
        self.state_rules
            .get(&state.to_uppercase())
            .copied()
            .unwrap_or(StateRule::None)
    }

    /// True for year-round enrollment states.
    #[must_use]
    pub fn is_year_round(&self, state: &str) -> bool {
        self.rule_for(state) == StateRule::YearRound
    }

    /// Ordered AEP candidate dates for one year. Empty when the year is not
    /// in the configured calendar.
    #[must_use]
    pub fn aep_dates_for(&self, year: i32) -> Vec<NaiveDate> {
        if !self.aep_years.contains(&year) {
            return Vec::new();
        }
        let mut dates: Vec<NaiveDate> = self
            .aep_dates
            .iter()
            .filter_map(|md| md.resolve(year))
            .collect();
        dates.sort_unstable();
        dates
    }

    /// Per-contact override entry, if any.
    #[must_use]
    pub fn contact_override(&self, contact_id: &str) -> Option<&ContactRuleEntry> {
        self.contact_rules.get(contact_id)
    }

    /// Whether the contact's AEP email is emitted even when every candidate
    /// date falls inside an exclusion window.
    #[must_use]
    pub fn should_force_aep(&self, contact: &Contact) -> bool {
        self.contact_override(contact.id.as_str())
            .is_some_and(|entry| entry.force_aep)
    }

    /// The AEP date replacing the distributed candidate, if an override
    /// applies: a contact-specific override first, then the global
    /// October-birthday rule.
    #[must_use]
    pub fn aep_override_date(&self, contact: &Contact, horizon_start: NaiveDate) -> Option<NaiveDate> {
        if let Some(entry) = self.contact_override(contact.id.as_str())
            && let Some(date) = entry.aep_date_override
        {
            return date.resolve(horizon_start.year());
        }

        if contact.birth_date.is_some_and(|b| b.month() == 10) {
            return self.october_birthday_aep.resolve(horizon_start.year());
        }

        None
    }

    /// Post-window override dates matching the contact's birth month.
    #[must_use]
    pub fn post_window_overrides(&self, contact: &Contact) -> Vec<MonthDay> {
        let Some(entry) = self.contact_override(contact.id.as_str()) else {
            return Vec::new();
        };
        entry
            .post_window_rules
            .iter()
            .filter(|rule| match rule.condition.birth_month {
                Some(month) => contact.birth_date.is_some_and(|b| b.month() == month),
                None => true,
            })
            .map(|rule| rule.override_date)
            .collect()
    }

    /// Global timing constants.
    #[must_use]
    pub fn timing(&self) -> TimingConstants {
        self.timing
    }
}
