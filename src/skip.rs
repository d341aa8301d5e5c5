//! Skip date resolution.
//!
//! [`SkipDateResolver`] merges an alarm's one-off custom skip dates with the
//! holidays it has selected and answers whether a given occurrence of the
//! alarm should be skipped. All comparisons are by local calendar day.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::holiday::{Country, HolidayCatalog};
use crate::logger::Log;
use crate::prefs::{AlarmPrefs, HolidaySelections, SkipActivationStatus};

/// What happens to a holiday selection once its snapshotted occurrences have passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HolidayPrunePolicy {
    /// Keep the selection and rely on the catalog for future occurrences.
    #[default]
    Retain,
    /// Drop passed occurrences, and the selection itself once none remain.
    PrunePassed,
}

impl HolidayPrunePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayPrunePolicy::Retain => "retain",
            HolidayPrunePolicy::PrunePassed => "prune_passed",
        }
    }
}

impl FromStr for HolidayPrunePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(HolidayPrunePolicy::Retain),
            "prune_passed" => Ok(HolidayPrunePolicy::PrunePassed),
            other => anyhow::bail!(
                "Unknown holiday prune policy '{}'. Use 'retain' or 'prune_passed'",
                other
            ),
        }
    }
}

impl fmt::Display for HolidayPrunePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the next skip date was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    CustomDate(NaiveDate),
    Holiday {
        country: Country,
        name: String,
        date: NaiveDate,
    },
}

impl SkipReason {
    pub fn date(&self) -> NaiveDate {
        match self {
            SkipReason::CustomDate(date) => *date,
            SkipReason::Holiday { date, .. } => *date,
        }
    }
}

/// Human label for a skip date relative to `today`.
pub fn skip_date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.succ_opt() == Some(date) {
        "Tomorrow".to_string()
    } else {
        date.format("%B %-d, %Y").to_string()
    }
}

pub struct SkipDateResolver {
    catalog: Arc<HolidayCatalog>,
    policy: HolidayPrunePolicy,
}

impl SkipDateResolver {
    pub fn new(catalog: Arc<HolidayCatalog>, policy: HolidayPrunePolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &HolidayCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> HolidayPrunePolicy {
        self.policy
    }

    /// Remove every date strictly before `today`.
    ///
    /// Order is preserved and later duplicates are dropped, so applying this
    /// twice gives the same result as applying it once.
    pub fn prune_custom_dates(dates: &[NaiveDate], today: NaiveDate) -> Vec<NaiveDate> {
        let mut pruned: Vec<NaiveDate> = Vec::with_capacity(dates.len());
        for date in dates {
            if *date >= today && !pruned.contains(date) {
                pruned.push(*date);
            }
        }
        pruned
    }

    /// Apply the configured policy to holiday selections.
    pub fn prune_holiday_selections(
        &self,
        selections: &HolidaySelections,
        today: NaiveDate,
    ) -> HolidaySelections {
        if self.policy == HolidayPrunePolicy::Retain {
            return selections.clone();
        }

        let mut pruned = HolidaySelections::new();
        for (country, holidays) in selections {
            for (name, dates) in holidays {
                let upcoming: BTreeSet<NaiveDate> =
                    dates.range(today..).copied().collect();
                // Selections without a snapshot follow the catalog and are kept
                if upcoming.is_empty() && !dates.is_empty() {
                    Log::log_debug(&format!(
                        "Pruning passed holiday selection {} ({})",
                        name, country
                    ));
                    continue;
                }
                pruned
                    .entry(*country)
                    .or_default()
                    .insert(name.clone(), upcoming);
            }
        }
        pruned
    }

    /// Prune an alarm's skip dates in place. Returns whether anything changed.
    pub fn prune(&self, prefs: &mut AlarmPrefs, today: NaiveDate) -> bool {
        let custom = Self::prune_custom_dates(&prefs.custom_skip_dates, today);
        let holidays = self.prune_holiday_selections(&prefs.holiday_skip_dates, today);

        let changed = custom != prefs.custom_skip_dates || holidays != prefs.holiday_skip_dates;
        prefs.custom_skip_dates = custom;
        prefs.holiday_skip_dates = holidays;
        changed
    }

    /// Earliest upcoming occurrence of one selected holiday.
    ///
    /// Considers both the snapshotted dates and the catalog. A holiday the
    /// catalog does not know contributes only its snapshot.
    fn holiday_next_date(
        &self,
        country: Country,
        name: &str,
        snapshot: &BTreeSet<NaiveDate>,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        let from_snapshot = snapshot.range(today..).next().copied();
        let from_catalog = self.catalog.first_date_on_or_after(country, name, today);
        match (from_snapshot, from_catalog) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The next skip date and where it came from.
    ///
    /// When a custom date and a holiday fall on the same day the custom date is reported.
    pub fn skip_reason(&self, prefs: &AlarmPrefs, today: NaiveDate) -> Option<SkipReason> {
        let custom = prefs
            .custom_skip_dates
            .iter()
            .filter(|d| **d >= today)
            .min()
            .copied();

        let holiday = prefs
            .holiday_skip_dates
            .iter()
            .flat_map(|(country, holidays)| {
                holidays.iter().filter_map(move |(name, snapshot)| {
                    self.holiday_next_date(*country, name, snapshot, today)
                        .map(|date| (date, *country, name))
                })
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));

        match (custom, holiday) {
            (Some(custom), Some((date, _, _))) if custom <= date => {
                Some(SkipReason::CustomDate(custom))
            }
            (_, Some((date, country, name))) => Some(SkipReason::Holiday {
                country,
                name: name.clone(),
                date,
            }),
            (Some(custom), None) => Some(SkipReason::CustomDate(custom)),
            (None, None) => None,
        }
    }

    /// Earliest date on or after `today` on which the alarm should be skipped.
    pub fn next_skip_date(&self, prefs: &AlarmPrefs, today: NaiveDate) -> Option<NaiveDate> {
        self.skip_reason(prefs, today).map(|reason| reason.date())
    }

    /// Whether the occurrence at `candidate` falls on the next skip date.
    pub fn should_skip(
        &self,
        prefs: &AlarmPrefs,
        candidate: NaiveDateTime,
        today: NaiveDate,
    ) -> bool {
        prefs.skip_enabled && self.next_skip_date(prefs, today) == Some(candidate.date())
    }

    /// Whether an alarm firing today should be skipped.
    pub fn should_skip_today(&self, prefs: &AlarmPrefs, now: NaiveDateTime) -> bool {
        self.should_skip(prefs, now, now.date())
    }

    /// Whether `now` lies within the alarm's skip window before `candidate`.
    pub fn is_within_skip_window(
        &self,
        prefs: &AlarmPrefs,
        candidate: NaiveDateTime,
        now: NaiveDateTime,
    ) -> bool {
        now <= candidate && candidate - now <= prefs.skip_time.to_duration()
    }

    /// Sentence explaining why the alarm will be skipped, if it will be.
    pub fn skip_reason_explanation(&self, prefs: &AlarmPrefs, today: NaiveDate) -> Option<String> {
        if prefs.skip_activation_status == SkipActivationStatus::Activated {
            return Some(
                "You have decided to skip this alarm the next time it is set to fire. \
                 This decision will be reset if you save the alarm."
                    .to_string(),
            );
        }
        if !prefs.skip_enabled {
            return None;
        }

        match self.skip_reason(prefs, today)? {
            SkipReason::CustomDate(date) => Some(format!(
                "The next skip date you've selected for this alarm is {}.",
                skip_date_label(date, today)
            )),
            SkipReason::Holiday { name, date, .. } => Some(format!(
                "The next holiday you've selected for this alarm is {} ({}).",
                name,
                skip_date_label(date, today)
            )),
        }
    }

    /// Consume a skip date after its occurrence was handled.
    ///
    /// Only one-off custom dates are removed; holidays recur.
    pub fn consume_skip_date(prefs: &mut AlarmPrefs, date: NaiveDate) -> bool {
        prefs.remove_custom_skip_date(date)
    }
}
