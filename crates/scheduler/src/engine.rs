//! The scheduling engine: a pure function from one contact and a horizon to
//! a classified list of email events.
//!
//! Per-state window arithmetic lives here. The general shape: each yearly
//! anchor (birthday or policy anniversary, per the state's rule variant)
//! spawns a rule window; each rule window spawns an exclusion window
//! reaching sixty days before it and a post-window follow-up one day after
//! it. Plain email candidates inside any exclusion window are skipped;
//! post-window emails are exempt from exclusion checks.

use chrono::{Datelike, Days, Months, NaiveDate};
use std::sync::Arc;
use tracing::debug;

use cadence_core::{Contact, EmailEvent, EmailType, ScheduleResult};
use cadence_rules::{RuleSet, StateRule};

use crate::dates::{first_of_month, is_month_end, yearly_occurrences};

/// Skip reason for candidates falling inside an exclusion window.
pub const REASON_EXCLUDED: &str = "in exclusion window";
/// Skip reason for year-round enrollment states.
pub const REASON_YEAR_ROUND: &str = "year-round enrollment state";
/// Skip reason for contacts without any anchor date.
pub const REASON_MISSING_ANCHORS: &str = "missing anchor dates";
/// Skip reason when every AEP candidate of a year is excluded.
pub const REASON_AEP_ALL_EXCLUDED: &str = "all AEP dates excluded";
/// Skip reason when no AEP candidate lands inside the horizon at all.
pub const REASON_AEP_NONE_IN_HORIZON: &str = "no valid AEP date in horizon";
/// Skip reason for the Illinois age rule.
pub const REASON_IL_AGE: &str = "Illinois resident age 76 or older";

/// Age at which Illinois suppresses birthday solicitations.
const IL_AGE_LIMIT: i32 = 76;

/// The scheduling window and the contact's position within the population
/// being processed together (used only for AEP distribution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub population_size: usize,
    pub population_index: usize,
}

impl Horizon {
    /// A horizon starting at `start` and ending two years later, for a
    /// population of one.
    #[must_use]
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Months::new(24),
            population_size: 1,
            population_index: 0,
        }
    }

    #[must_use]
    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = end;
        self
    }

    #[must_use]
    pub fn with_population(mut self, size: usize, index: usize) -> Self {
        self.population_size = size;
        self.population_index = index;
        self
    }

    fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A state rule window derived from one yearly anchor.
#[derive(Debug, Clone, Copy)]
struct RuleWindow {
    start: NaiveDate,
    end: NaiveDate,
    /// The (possibly shifted) anchor the window was built around.
    anchor: NaiveDate,
    /// Which email type the anchor belongs to.
    source: EmailType,
}

impl RuleWindow {
    /// Exclusion interval: the window itself plus the prelude before it.
    fn exclusion(&self, prelude_days: i64) -> (NaiveDate, NaiveDate) {
        (sub_days(self.start, prelude_days), self.end)
    }
}

/// The scheduling engine. Cheap to clone; holds only the shared rule set.
#[derive(Debug, Clone)]
pub struct Scheduler {
    rules: Arc<RuleSet>,
}

impl Scheduler {
    #[must_use]
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Compute the classified schedule for one contact.
    ///
    /// Pure and deterministic: identical inputs always produce identical
    /// output. Never panics on malformed contact data; an internal failure
    /// surfaces as an all-skipped result with a `processing error` reason.
    #[must_use]
    pub fn schedule(&self, contact: &Contact, horizon: &Horizon) -> ScheduleResult {
        match self.schedule_inner(contact, horizon) {
            Ok(result) => result,
            Err(message) => {
                debug!(contact = %contact.id, %message, "scheduling failed");
                ScheduleResult::all_skipped(
                    contact.id.clone(),
                    format!("processing error: {message}"),
                )
            }
        }
    }

    fn schedule_inner(
        &self,
        contact: &Contact,
        horizon: &Horizon,
    ) -> Result<ScheduleResult, String> {
        if horizon.start > horizon.end {
            return Err(format!(
                "horizon start {} after end {}",
                horizon.start, horizon.end
            ));
        }

        let state = contact.state_code();
        if self.rules.is_year_round(&state) {
            return Ok(ScheduleResult::all_skipped(
                contact.id.clone(),
                REASON_YEAR_ROUND,
            ));
        }
        if !contact.has_anchor_dates() {
            return Ok(ScheduleResult::all_skipped(
                contact.id.clone(),
                REASON_MISSING_ANCHORS,
            ));
        }

        let mut result = ScheduleResult::empty(contact.id.clone());
        let timing = self.rules.timing();
        let rule = self.rules.rule_for(&state);

        let windows =
            self.rule_windows(contact, &state, rule, horizon, timing.pre_window_exclusion_days);
        let exclusions: Vec<(NaiveDate, NaiveDate)> = windows
            .iter()
            .map(|w| w.exclusion(timing.pre_window_exclusion_days))
            .collect();
        let excluded = |date: NaiveDate| exclusions.iter().any(|(s, e)| *s <= date && date <= *e);

        // Birthday candidates: lead days before each yearly occurrence.
        if let Some(birth_date) = contact.birth_date {
            for occurrence in yearly_occurrences(birth_date, horizon.start, horizon.end) {
                if state == "IL" && occurrence.year() - birth_date.year() >= IL_AGE_LIMIT {
                    result.skipped.push(EmailEvent::skipped(
                        EmailType::Birthday,
                        Some(occurrence),
                        REASON_IL_AGE,
                    ));
                    continue;
                }
                let email_date = sub_days(occurrence, timing.birthday_email_days_before);
                if !horizon.contains(email_date) {
                    continue;
                }
                if excluded(email_date) {
                    result.skipped.push(EmailEvent::skipped(
                        EmailType::Birthday,
                        Some(email_date),
                        REASON_EXCLUDED,
                    ));
                } else {
                    result
                        .scheduled
                        .push(EmailEvent::scheduled(EmailType::Birthday, email_date));
                }
            }
        }

        // Effective-date candidates.
        if let Some(effective_date) = contact.effective_date {
            for occurrence in yearly_occurrences(effective_date, horizon.start, horizon.end) {
                let email_date = sub_days(occurrence, timing.effective_date_days_before);
                if !horizon.contains(email_date) {
                    continue;
                }
                if excluded(email_date) {
                    result.skipped.push(EmailEvent::skipped(
                        EmailType::EffectiveDate,
                        Some(email_date),
                        REASON_EXCLUDED,
                    ));
                } else {
                    result
                        .scheduled
                        .push(EmailEvent::scheduled(EmailType::EffectiveDate, email_date));
                }
            }
        }

        // One AEP candidate per horizon year, distributed across the year's
        // calendar by population index.
        self.schedule_aep(contact, horizon, &excluded, &mut result);

        // Post-window follow-ups bypass exclusion checks entirely.
        for window in &windows {
            let date = self.post_window_date(contact, &state, window);
            if !horizon.contains(date) {
                continue;
            }
            if state == "IL"
                && window.source == EmailType::Birthday
                && contact
                    .birth_date
                    .is_some_and(|b| window.anchor.year() - b.year() >= IL_AGE_LIMIT)
            {
                result.skipped.push(EmailEvent::skipped(
                    EmailType::PostWindow,
                    Some(date),
                    REASON_IL_AGE,
                ));
                continue;
            }
            result
                .scheduled
                .push(EmailEvent::scheduled(EmailType::PostWindow, date));
        }

        result.normalize();
        Ok(result)
    }

    /// Rule windows whose exclusion interval can touch the horizon.
    ///
    /// Anchors from the year before the horizon start are considered too:
    /// their windows (and post-window dates) may reach into the horizon.
    fn rule_windows(
        &self,
        contact: &Contact,
        state: &str,
        rule: StateRule,
        horizon: &Horizon,
        prelude_days: i64,
    ) -> Vec<RuleWindow> {
        let (anchor_date, before, after, source) = match rule {
            StateRule::Birthday {
                window_before,
                window_after,
            } => match contact.birth_date {
                Some(birth) => (birth, window_before, window_after, EmailType::Birthday),
                None => return Vec::new(),
            },
            StateRule::EffectiveDate {
                window_before,
                window_after,
            } => match contact.effective_date {
                Some(effective) => (
                    effective,
                    window_before,
                    window_after,
                    EmailType::EffectiveDate,
                ),
                None => return Vec::new(),
            },
            StateRule::YearRound | StateRule::None => return Vec::new(),
        };

        // Pad a year on both sides: windows anchored just outside the
        // horizon can still push an exclusion or follow-up into it.
        let padded_start = sub_days(horizon.start, 366);
        let padded_end = horizon.end + Days::new(366);
        let occurrences = yearly_occurrences(anchor_date, padded_start, padded_end);

        occurrences
            .into_iter()
            .map(|occurrence| {
                let anchor = if state == "NV" {
                    first_of_month(occurrence)
                } else {
                    occurrence
                };
                RuleWindow {
                    start: sub_days(anchor, before),
                    end: anchor + Days::new(days_u64(after)),
                    anchor,
                    source,
                }
            })
            // Keep windows that matter inside the horizon: an overlapping
            // exclusion (which reaches `prelude_days` before the window) or
            // an in-horizon follow-up one day after the window end.
            .filter(|w| {
                w.end >= sub_days(horizon.start, 1)
                    && sub_days(w.start, prelude_days) <= horizon.end
            })
            .collect()
    }

    /// Post-window date for one rule window, honoring the state-specific
    /// exceptions and per-contact overrides.
    fn post_window_date(&self, contact: &Contact, state: &str, window: &RuleWindow) -> NaiveDate {
        if window.source == EmailType::Birthday {
            if let Some(first) = self.rules.post_window_overrides(contact).first()
                && let Some(date) = first.resolve(window.end.year())
            {
                return date;
            }
        }

        let mut date = window.end + Days::new(1);

        // First-of-month anchor whose window ends on a month boundary: the
        // follow-up lands on the window's final day (canonical NV shape).
        if window.start.day() == 1 && is_month_end(window.end) {
            date = window.end;
        }

        let leap_birthday = contact
            .birth_date
            .is_some_and(|b| b.month() == 2 && b.day() == 29);

        if window.source == EmailType::Birthday {
            if leap_birthday && state == "CA" {
                date = NaiveDate::from_ymd_opt(window.end.year(), 3, 30).unwrap_or(date);
            } else if leap_birthday && state == "NV" {
                date = NaiveDate::from_ymd_opt(window.end.year(), 3, 31).unwrap_or(date);
            } else if state == "CA"
                && window.start.month() == 2
                && window.start.day() > 1
                && window.start.day() < 15
                && window.end.month() == 3
                && (window.end.day() == 29 || window.end.day() == 30)
            {
                // Early-February California birthdays whose window ends just
                // short of month end resume on the last day of March.
                date = NaiveDate::from_ymd_opt(window.end.year(), 3, 31).unwrap_or(date);
            }
        }

        date
    }

    /// Pick, override, and exclusion-check the AEP candidate for each year
    /// of the horizon.
    fn schedule_aep(
        &self,
        contact: &Contact,
        horizon: &Horizon,
        excluded: &dyn Fn(NaiveDate) -> bool,
        result: &mut ScheduleResult,
    ) {
        let mut any_candidate = false;

        for year in horizon.start.year()..=horizon.end.year() {
            let dates = self.rules.aep_dates_for(year);
            if dates.is_empty() {
                continue;
            }

            let index = if horizon.population_size <= 1 {
                0
            } else {
                horizon.population_index % dates.len()
            };
            let mut chosen = dates[index];

            // Per-contact override first, then the global October-birthday
            // rule, both resolved within this calendar year.
            let year_probe = NaiveDate::from_ymd_opt(year, 1, 1).expect("Jan 1 always valid");
            if let Some(override_date) = self.rules.aep_override_date(contact, year_probe) {
                chosen = override_date;
            }

            if !horizon.contains(chosen) {
                continue;
            }
            any_candidate = true;

            if !excluded(chosen) {
                result
                    .scheduled
                    .push(EmailEvent::scheduled(EmailType::Aep, chosen));
                continue;
            }

            if self.rules.should_force_aep(contact) {
                result
                    .scheduled
                    .push(EmailEvent::scheduled(EmailType::Aep, chosen));
                continue;
            }

            // The chosen week is excluded: fall back to the year's other
            // weeks in calendar order.
            let fallback = dates
                .iter()
                .copied()
                .find(|d| *d != chosen && horizon.contains(*d) && !excluded(*d));
            match fallback {
                Some(date) => result
                    .scheduled
                    .push(EmailEvent::scheduled(EmailType::Aep, date)),
                None => result.skipped.push(EmailEvent::skipped(
                    EmailType::Aep,
                    Some(chosen),
                    REASON_AEP_ALL_EXCLUDED,
                )),
            }
        }

        if !any_candidate {
            result.skipped.push(EmailEvent::skipped(
                EmailType::Aep,
                None,
                REASON_AEP_NONE_IN_HORIZON,
            ));
        }
    }
}

fn sub_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_days(Days::new(days_u64(days)))
        .unwrap_or(NaiveDate::MIN)
}

fn days_u64(days: i64) -> u64 {
    u64::try_from(days.max(0)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(Arc::new(RuleSet::default()))
    }

    fn horizon() -> Horizon {
        Horizon::new(d(2024, 1, 1)).with_end(d(2025, 12, 31))
    }

    fn contact(id: &str, state: &str) -> Contact {
        Contact::new(id, 1, format!("{id}@example.com")).with_state(state)
    }

    fn scheduled_of(result: &ScheduleResult, ty: EmailType) -> Vec<NaiveDate> {
        result
            .scheduled
            .iter()
            .filter(|e| e.email_type == ty)
            .filter_map(|e| e.date)
            .collect()
    }

    fn skipped_of(result: &ScheduleResult, ty: EmailType) -> Vec<&EmailEvent> {
        result
            .skipped
            .iter()
            .filter(|e| e.email_type == ty)
            .collect()
    }

    // Scenario: CA birthday with a leap anchor. The candidate email dates
    // land inside the exclusion window each year; the follow-ups land on
    // March 30 per the Feb-29 California exception.
    #[test]
    fn ca_leap_birthday() {
        let contact = contact("1", "CA").with_birth_date(d(1960, 2, 29));
        let result = scheduler().schedule(&contact, &horizon());

        let birthday_skips = skipped_of(&result, EmailType::Birthday);
        let skip_dates: Vec<NaiveDate> =
            birthday_skips.iter().filter_map(|e| e.date).collect();
        assert_eq!(skip_dates, vec![d(2024, 2, 15), d(2025, 2, 14)]);
        for skip in &birthday_skips {
            assert_eq!(skip.reason.as_deref(), Some(REASON_EXCLUDED));
        }

        let post = scheduled_of(&result, EmailType::PostWindow);
        assert!(post.contains(&d(2024, 3, 30)));
        assert!(post.contains(&d(2025, 3, 30)));

        // The chosen AEP week (index 0) is clear of the exclusion windows.
        let aep = scheduled_of(&result, EmailType::Aep);
        assert_eq!(aep, vec![d(2024, 8, 18), d(2025, 8, 18)]);
    }

    // Scenario: NV shifts the anchor to the first of the birth month, and
    // Feb-29 birthdays resume on March 31.
    #[test]
    fn nv_leap_birthday() {
        let contact = contact("2", "NV").with_birth_date(d(1960, 2, 29));
        let result = scheduler().schedule(&contact, &horizon());

        // Candidate 2024-02-15 sits inside the exclusion window built from
        // the shifted [2024-02-01, 2024-04-01] rule window.
        let skips = skipped_of(&result, EmailType::Birthday);
        assert!(skips
            .iter()
            .any(|e| e.date == Some(d(2024, 2, 15))
                && e.reason.as_deref() == Some(REASON_EXCLUDED)));

        let post = scheduled_of(&result, EmailType::PostWindow);
        assert!(post.contains(&d(2024, 3, 31)));
        assert!(post.contains(&d(2025, 3, 31)));
    }

    // Scenario: NV non-leap birthday whose shifted window ends on a month
    // boundary resumes on the window's final day.
    #[test]
    fn nv_month_end_window() {
        let contact = contact("3", "NV").with_birth_date(d(1960, 6, 15));
        let result = scheduler().schedule(&contact, &horizon());

        // Anchor 2024-06-01, window [2024-06-01, 2024-07-31]; July 31 is a
        // month end so the follow-up is the end date itself.
        let post = scheduled_of(&result, EmailType::PostWindow);
        assert!(post.contains(&d(2024, 7, 31)));
    }

    // Scenario: Illinois suppresses birthday emails and the derived
    // follow-up from the year the contact turns 76.
    #[test]
    fn il_age_76_suppression() {
        let contact = contact("4", "IL").with_birth_date(d(1949, 6, 10));
        let result = scheduler().schedule(&contact, &horizon());

        // 2024 (age 75): candidate classified normally, follow-up present.
        let post = scheduled_of(&result, EmailType::PostWindow);
        assert!(post.contains(&d(2024, 7, 26)));

        // 2025 (age 76): both suppressed with the age reason.
        assert!(!post.iter().any(|date| date.year() == 2025));
        let age_skips: Vec<&EmailEvent> = result
            .skipped
            .iter()
            .filter(|e| e.reason.as_deref() == Some(REASON_IL_AGE))
            .collect();
        assert!(age_skips
            .iter()
            .any(|e| e.email_type == EmailType::Birthday && e.date == Some(d(2025, 6, 10))));
        assert!(age_skips.iter().any(|e| e.email_type == EmailType::PostWindow));
    }

    // Scenario: year-round enrollment states produce nothing but a single
    // all-typed skip.
    #[test]
    fn year_round_state() {
        let contact = contact("5", "NY")
            .with_birth_date(d(1960, 7, 1))
            .with_effective_date(d(2000, 7, 1));
        let result = scheduler().schedule(&contact, &horizon());

        assert!(result.scheduled.is_empty());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].email_type, EmailType::All);
        assert_eq!(result.skipped[0].reason.as_deref(), Some(REASON_YEAR_ROUND));
    }

    // Scenario: AEP distribution across a population of four.
    #[test]
    fn aep_distribution() {
        let sched = scheduler();
        let expected = [d(2024, 8, 18), d(2024, 8, 25), d(2024, 9, 1), d(2024, 9, 7)];
        for index in 0..4 {
            let contact =
                contact(&format!("c{index}"), "TX").with_birth_date(d(1960, 3, 15));
            let h = horizon().with_population(4, index);
            let result = sched.schedule(&contact, &h);
            let aep = scheduled_of(&result, EmailType::Aep);
            assert_eq!(aep[0], expected[index], "index {index}");
        }
    }

    // Scenario: population of one always takes the first week regardless of
    // index.
    #[test]
    fn aep_single_population_uses_first_week() {
        let contact = contact("9", "TX").with_birth_date(d(1960, 3, 15));
        let h = horizon().with_population(1, 3);
        let result = scheduler().schedule(&contact, &h);
        assert_eq!(scheduled_of(&result, EmailType::Aep)[0], d(2024, 8, 18));
    }

    // Scenario: Missouri effective-date rule. The candidate lands inside the
    // exclusion window; the follow-up is emitted the day after the window.
    #[test]
    fn mo_effective_date_rule() {
        let contact = contact("6", "MO").with_effective_date(d(2020, 6, 15));
        let result = scheduler().schedule(&contact, &horizon());

        let skips = skipped_of(&result, EmailType::EffectiveDate);
        assert!(skips
            .iter()
            .any(|e| e.date == Some(d(2024, 5, 16))
                && e.reason.as_deref() == Some(REASON_EXCLUDED)));

        let post = scheduled_of(&result, EmailType::PostWindow);
        assert!(post.contains(&d(2024, 7, 19)));
    }

    #[test]
    fn missing_anchor_dates() {
        let contact = contact("7", "CA");
        let result = scheduler().schedule(&contact, &horizon());
        assert!(result.scheduled.is_empty());
        assert_eq!(result.skipped[0].reason.as_deref(), Some(REASON_MISSING_ANCHORS));
    }

    #[test]
    fn no_rule_state_schedules_everything() {
        let contact = contact("8", "KS")
            .with_birth_date(d(1970, 5, 20))
            .with_effective_date(d(2015, 9, 12));
        let result = scheduler().schedule(&contact, &horizon());

        assert_eq!(
            scheduled_of(&result, EmailType::Birthday),
            vec![d(2024, 5, 6), d(2025, 5, 6)]
        );
        assert_eq!(
            scheduled_of(&result, EmailType::EffectiveDate),
            vec![d(2024, 8, 13), d(2025, 8, 13)]
        );
        assert!(scheduled_of(&result, EmailType::PostWindow).is_empty());
        assert!(result.skipped.is_empty());
    }

    // Invariant: no scheduled birthday/effective/AEP event ever sits inside
    // an exclusion window.
    #[test]
    fn scheduled_events_avoid_exclusions() {
        let sched = scheduler();
        let states = ["CA", "ID", "IL", "KY", "LA", "MD", "NV", "OK", "OR", "MO", "KS"];
        for (i, state) in states.iter().enumerate() {
            let contact = contact(&format!("s{i}"), state)
                .with_birth_date(d(1958, 4, 11))
                .with_effective_date(d(2012, 10, 1));
            let result = sched.schedule(&contact, &horizon());

            let timing = sched.rules().timing();
            let rule = sched.rules().rule_for(state);
            let windows = sched.rule_windows(
                &contact,
                state,
                rule,
                &horizon(),
                timing.pre_window_exclusion_days,
            );
            for event in &result.scheduled {
                if event.email_type == EmailType::PostWindow {
                    continue;
                }
                let date = event.date.unwrap();
                for w in &windows {
                    let (ex_start, ex_end) = w.exclusion(timing.pre_window_exclusion_days);
                    assert!(
                        !(ex_start <= date && date <= ex_end),
                        "{state}: {} event on {date} inside exclusion [{ex_start}, {ex_end}]",
                        event.email_type
                    );
                }
            }
        }
    }

    // Invariant: windowed birthday states always produce a follow-up when a
    // birthday falls inside the horizon.
    #[test]
    fn birthday_states_emit_post_window() {
        let sched = scheduler();
        for state in ["CA", "ID", "IL", "KY", "LA", "MD", "NV", "OK", "OR"] {
            let contact =
                contact(&format!("p-{state}"), state).with_birth_date(d(1958, 4, 11));
            let result = sched.schedule(&contact, &horizon());
            assert!(
                !scheduled_of(&result, EmailType::PostWindow).is_empty(),
                "{state} should emit a post-window follow-up"
            );
        }
    }

    // Invariant: both lists come back sorted.
    #[test]
    fn output_lists_sorted() {
        let contact = contact("10", "LA")
            .with_birth_date(d(1958, 4, 11))
            .with_effective_date(d(2012, 10, 1));
        let result = scheduler().schedule(&contact, &horizon());
        let mut sorted = result.scheduled.clone();
        sorted.sort_by_key(|e| e.date);
        assert_eq!(
            result.scheduled.iter().map(|e| e.date).collect::<Vec<_>>(),
            sorted.iter().map(|e| e.date).collect::<Vec<_>>()
        );
    }

    // Determinism: repeated runs are byte-identical once serialized.
    #[test]
    fn schedule_is_deterministic() {
        let contact = contact("11", "NV")
            .with_birth_date(d(1960, 2, 29))
            .with_effective_date(d(2001, 1, 15));
        let h = horizon().with_population(7, 3);
        let first = serde_json::to_vec(&scheduler().schedule(&contact, &h)).unwrap();
        let second = serde_json::to_vec(&scheduler().schedule(&contact, &h)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn forced_aep_overrides_exclusion() {
        let rules = RuleSet::from_yaml(
            r"
state_rules:
  CA:
    type: birthday
    window_before: 30
    window_after: 30
aep_config:
  years: [2024]
  default_dates:
    - {month: 8, day: 18}
contact_rules:
  '502':
    force_aep: true
    aep_date_override: {month: 8, day: 25}
",
        )
        .unwrap();
        let sched = Scheduler::new(Arc::new(rules));

        // Birthday in early October: the CA window [Sep 8, Nov 7] excludes
        // from July 10 onwards, covering both August dates.
        let contact = Contact::new("502", 1, "f@example.com")
            .with_state("CA")
            .with_birth_date(d(1950, 10, 8));
        let h = Horizon::new(d(2024, 1, 1)).with_end(d(2024, 12, 31));
        let result = sched.schedule(&contact, &h);

        let aep = scheduled_of(&result, EmailType::Aep);
        assert_eq!(aep, vec![d(2024, 8, 25)]);
    }

    #[test]
    fn all_aep_dates_excluded_is_reported() {
        let rules = RuleSet::from_yaml(
            r"
state_rules:
  CA:
    type: birthday
    window_before: 30
    window_after: 30
aep_config:
  years: [2024]
  default_dates:
    - {month: 8, day: 18}
    - {month: 8, day: 25}
",
        )
        .unwrap();
        let sched = Scheduler::new(Arc::new(rules));

        // October 8 birthday: exclusion [Jul 10, Nov 7] swallows both weeks.
        // (October birthdays normally reroute to the global Aug 25 override,
        // which is excluded here too.)
        let contact = Contact::new("20", 1, "g@example.com")
            .with_state("CA")
            .with_birth_date(d(1950, 10, 8));
        let h = Horizon::new(d(2024, 1, 1)).with_end(d(2024, 12, 31));
        let result = sched.schedule(&contact, &h);

        assert!(scheduled_of(&result, EmailType::Aep).is_empty());
        let skips = skipped_of(&result, EmailType::Aep);
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].reason.as_deref(), Some(REASON_AEP_ALL_EXCLUDED));
    }

    #[test]
    fn no_aep_years_configured() {
        let rules = RuleSet::from_yaml(
            r"
aep_config:
  years: [2030]
  default_dates:
    - {month: 8, day: 18}
",
        )
        .unwrap();
        let sched = Scheduler::new(Arc::new(rules));
        let contact = Contact::new("21", 1, "h@example.com")
            .with_state("TX")
            .with_birth_date(d(1960, 3, 15));
        let result = sched.schedule(&contact, &horizon());

        let skips = skipped_of(&result, EmailType::Aep);
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].reason.as_deref(), Some(REASON_AEP_NONE_IN_HORIZON));
    }

    #[test]
    fn contact_post_window_override_applies() {
        let rules = RuleSet::from_yaml(
            r"
state_rules:
  CA:
    type: birthday
    window_before: 30
    window_after: 30
aep_config:
  years: [2024, 2025]
  default_dates:
    - {month: 8, day: 18}
contact_rules:
  '101':
    post_window_rules:
      - condition: {birth_month: 6}
        override_date: {month: 8, day: 1}
",
        )
        .unwrap();
        let sched = Scheduler::new(Arc::new(rules));
        let contact = Contact::new("101", 1, "i@example.com")
            .with_state("CA")
            .with_birth_date(d(1960, 6, 10));
        let result = sched.schedule(&contact, &horizon());

        let post = scheduled_of(&result, EmailType::PostWindow);
        assert_eq!(post, vec![d(2024, 8, 1), d(2025, 8, 1)]);
    }

    #[test]
    fn inverted_horizon_reports_processing_error() {
        let contact = contact("12", "CA").with_birth_date(d(1960, 2, 29));
        let h = Horizon::new(d(2024, 1, 1)).with_end(d(2023, 1, 1));
        let result = scheduler().schedule(&contact, &h);
        assert!(result.scheduled.is_empty());
        assert!(result.skipped[0]
            .reason
            .as_deref()
            .unwrap()
            .starts_with("processing error:"));
    }

    #[test]
    fn default_horizon_is_two_years() {
        let h = Horizon::new(d(2024, 1, 1));
        assert_eq!(h.end, d(2026, 1, 1));
        assert_eq!(h.population_size, 1);
    }
}
