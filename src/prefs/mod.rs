//! Per-alarm preference model and persistence.
//!
//! An [`AlarmPrefs`] holds every override sleeper applies to one alarm: the
//! custom snooze duration, the skip window and skip dates, the skip activation
//! status, and the auto-set choice. Records are keyed by the externally owned
//! alarm identifier.
//!
//! - [`record`]: the versioned on-disk schema with default filling
//! - [`store`]: the [`PreferenceStore`] trait and its file/memory backends
//! - [`manager`]: [`PreferenceManager`], which serializes writes per alarm
//! - [`locks`]: the per-key lock table used by the manager

pub mod locks;
pub mod manager;
pub mod record;
pub mod store;

pub use manager::PreferenceManager;
pub use store::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::holiday::Country;
use crate::sun::SunEvent;

/// Selected holiday occurrences, per country and holiday name.
///
/// Only selections live here. The full recurring date list for a holiday comes
/// from the [`crate::holiday::HolidayCatalog`]; the stored set holds the
/// occurrences that were snapshotted when the holiday was selected.
pub type HolidaySelections = BTreeMap<Country, BTreeMap<String, BTreeSet<NaiveDate>>>;

/// An hour/minute/second span bounded to a single day.
///
/// Used for the snooze length and for how long before an alarm the skip
/// prompt becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockDuration {
    hour: u32,
    minute: u32,
    second: u32,
}

impl ClockDuration {
    /// Build a span, rejecting components out of range or a total of a day or more.
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self> {
        if minute > 59 || second > 59 {
            anyhow::bail!(
                "Invalid duration {}:{:02}:{:02}: minutes and seconds must be below 60",
                hour,
                minute,
                second
            );
        }
        // Checked before any arithmetic so stored garbage cannot overflow the total
        if hour > MAXIMUM_CLOCK_DURATION_HOUR {
            anyhow::bail!(
                "Invalid duration {}:{:02}:{:02}: must be shorter than a day",
                hour,
                minute,
                second
            );
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn default_snooze() -> Self {
        Self {
            hour: DEFAULT_SNOOZE_HOUR,
            minute: DEFAULT_SNOOZE_MINUTE,
            second: DEFAULT_SNOOZE_SECOND,
        }
    }

    pub fn default_skip() -> Self {
        Self {
            hour: DEFAULT_SKIP_HOUR,
            minute: DEFAULT_SKIP_MINUTE,
            second: DEFAULT_SKIP_SECOND,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    pub fn total_seconds(&self) -> u32 {
        self.hour * 3600 + self.minute * 60 + self.second
    }

    pub fn to_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.total_seconds()))
    }
}

impl fmt::Display for ClockDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Whether the skip prompt for the pending occurrence has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkipActivationStatus {
    #[default]
    Unknown,
    Activated,
    Disabled,
}

/// What an alarm's time should follow, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AutoSetOption {
    #[default]
    Off,
    Sunrise,
    Sunset,
}

impl AutoSetOption {
    /// The solar event this option tracks, or `None` when auto-set is off.
    pub fn sun_event(self) -> Option<SunEvent> {
        match self {
            AutoSetOption::Off => None,
            AutoSetOption::Sunrise => Some(SunEvent::Sunrise),
            AutoSetOption::Sunset => Some(SunEvent::Sunset),
        }
    }
}

/// Direction of the auto-set offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoSetOffsetOption {
    #[default]
    Off,
    Before,
    After,
}

// Lowercase names shared by the persisted record and the configuration file.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => anyhow::bail!("Unknown {} value: '{}'", stringify!($ty), other),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(SkipActivationStatus {
    Unknown => "unknown",
    Activated => "activated",
    Disabled => "disabled",
});

string_enum!(AutoSetOption {
    Off => "off",
    Sunrise => "sunrise",
    Sunset => "sunset",
});

string_enum!(AutoSetOffsetOption {
    Off => "off",
    Before => "before",
    After => "after",
});

/// Sleeper preferences for a single alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmPrefs {
    alarm_id: String,
    pub snooze_time: ClockDuration,
    pub skip_enabled: bool,
    /// How long before the scheduled fire time the skip prompt is offered.
    pub skip_time: ClockDuration,
    pub skip_activation_status: SkipActivationStatus,
    /// One-off skip dates. Kept free of duplicates.
    pub custom_skip_dates: Vec<NaiveDate>,
    pub holiday_skip_dates: HolidaySelections,
    pub auto_set_option: AutoSetOption,
    pub auto_set_offset_option: AutoSetOffsetOption,
    pub auto_set_offset_hour: u32,
    pub auto_set_offset_minute: u32,
}

impl AlarmPrefs {
    /// Create preferences with default values for the given alarm.
    pub fn new(alarm_id: impl Into<String>) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            snooze_time: ClockDuration::default_snooze(),
            skip_enabled: DEFAULT_SKIP_ENABLED,
            skip_time: ClockDuration::default_skip(),
            skip_activation_status: SkipActivationStatus::Unknown,
            custom_skip_dates: Vec::new(),
            holiday_skip_dates: HolidaySelections::new(),
            auto_set_option: AutoSetOption::Off,
            auto_set_offset_option: AutoSetOffsetOption::Off,
            auto_set_offset_hour: DEFAULT_AUTO_SET_OFFSET_HOUR,
            auto_set_offset_minute: DEFAULT_AUTO_SET_OFFSET_MINUTE,
        }
    }

    pub fn alarm_id(&self) -> &str {
        &self.alarm_id
    }

    /// When a snooze started at `from` should go off again.
    pub fn snooze_fire_date(&self, from: NaiveDateTime) -> NaiveDateTime {
        from + self.snooze_time.to_duration()
    }

    pub fn has_auto_set(&self) -> bool {
        self.auto_set_option != AutoSetOption::Off
    }

    /// Add a one-off skip date. Returns `false` if it was already present.
    pub fn add_custom_skip_date(&mut self, date: NaiveDate) -> bool {
        if self.custom_skip_dates.contains(&date) {
            return false;
        }
        self.custom_skip_dates.push(date);
        true
    }

    pub fn remove_custom_skip_date(&mut self, date: NaiveDate) -> bool {
        let before = self.custom_skip_dates.len();
        self.custom_skip_dates.retain(|d| *d != date);
        before != self.custom_skip_dates.len()
    }

    /// Select a holiday, snapshotting the given occurrences.
    pub fn select_holiday(
        &mut self,
        country: Country,
        name: impl Into<String>,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) {
        self.holiday_skip_dates
            .entry(country)
            .or_default()
            .entry(name.into())
            .or_default()
            .extend(dates);
    }

    /// Remove a holiday selection, dropping the country entry once it is empty.
    pub fn deselect_holiday(&mut self, country: Country, name: &str) -> bool {
        let Some(holidays) = self.holiday_skip_dates.get_mut(&country) else {
            return false;
        };
        let removed = holidays.remove(name).is_some();
        if holidays.is_empty() {
            self.holiday_skip_dates.remove(&country);
        }
        removed
    }

    /// Remove every custom skip date, and optionally every holiday selection.
    pub fn clear_skip_dates(&mut self, include_holidays: bool) {
        self.custom_skip_dates.clear();
        if include_holidays {
            self.holiday_skip_dates.clear();
        }
    }

    /// Total number of selected holidays across all countries.
    pub fn total_selected_holidays(&self) -> usize {
        self.holiday_skip_dates.values().map(BTreeMap::len).sum()
    }

    /// Short summary of the selected skip dates, e.g. "2 Dates, 1 Holiday".
    pub fn total_selected_dates_summary(&self) -> String {
        let dates = self.custom_skip_dates.len();
        let holidays = self.total_selected_holidays();

        let mut parts = Vec::new();
        if dates > 0 {
            parts.push(format!("{} {}", dates, if dates == 1 { "Date" } else { "Dates" }));
        }
        if holidays > 0 {
            parts.push(format!(
                "{} {}",
                holidays,
                if holidays == 1 { "Holiday" } else { "Holidays" }
            ));
        }

        if parts.is_empty() {
            "None".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Human readable description of the auto-set choice.
    pub fn auto_set_explanation(&self) -> String {
        let Some(event) = self.auto_set_option.sun_event() else {
            return "You can use the auto-set feature to have this alarm automatically set its \
                    time based on the sunrise or sunset."
                .to_string();
        };

        let direction = match self.auto_set_offset_option {
            AutoSetOffsetOption::Off => {
                return format!(
                    "This alarm will be automatically set to the {} time.",
                    event.as_str()
                );
            }
            AutoSetOffsetOption::Before => "before",
            AutoSetOffsetOption::After => "after",
        };

        format!(
            "This alarm will be automatically set to {} hour(s) and {} minute(s) {} the {} time.",
            self.auto_set_offset_hour,
            self.auto_set_offset_minute,
            direction,
            event.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let prefs = AlarmPrefs::new(TEST_ALARM_ID);
        assert_eq!(prefs.alarm_id(), TEST_ALARM_ID);
        assert_eq!(prefs.snooze_time.to_string(), "0:09:00");
        assert_eq!(prefs.skip_time.to_string(), "0:30:00");
        assert!(!prefs.skip_enabled);
        assert_eq!(prefs.skip_activation_status, SkipActivationStatus::Unknown);
        assert_eq!(prefs.auto_set_option, AutoSetOption::Off);
        assert_eq!(prefs.auto_set_offset_hour, 1);
        assert_eq!(prefs.auto_set_offset_minute, 0);
    }

    #[test]
    fn test_clock_duration_bounds() {
        assert!(ClockDuration::new(23, 59, 59).is_ok());
        assert!(ClockDuration::new(24, 0, 0).is_err());
        assert!(ClockDuration::new(0, 60, 0).is_err());
        assert!(ClockDuration::new(0, 0, 60).is_err());
        assert!(ClockDuration::new(u32::MAX, 0, 0).is_err());
        assert_eq!(ClockDuration::new(1, 2, 3).unwrap().total_seconds(), 3723);
    }

    #[test]
    fn test_snooze_fire_date() {
        let mut prefs = AlarmPrefs::new(TEST_ALARM_ID);
        prefs.snooze_time = ClockDuration::new(0, 15, 30).unwrap();
        let from = date(2026, 3, 1).and_hms_opt(23, 50, 0).unwrap();
        assert_eq!(
            prefs.snooze_fire_date(from),
            date(2026, 3, 2).and_hms_opt(0, 5, 30).unwrap()
        );
    }

    #[test]
    fn test_custom_dates_have_set_semantics() {
        let mut prefs = AlarmPrefs::new(TEST_ALARM_ID);
        assert!(prefs.add_custom_skip_date(date(2026, 5, 1)));
        assert!(!prefs.add_custom_skip_date(date(2026, 5, 1)));
        assert_eq!(prefs.custom_skip_dates.len(), 1);
        assert!(prefs.remove_custom_skip_date(date(2026, 5, 1)));
        assert!(!prefs.remove_custom_skip_date(date(2026, 5, 1)));
    }

    #[test]
    fn test_holiday_selection_and_summary() {
        let mut prefs = AlarmPrefs::new(TEST_ALARM_ID);
        assert_eq!(prefs.total_selected_dates_summary(), "None");

        prefs.select_holiday(Country::UnitedStates, "Christmas Day", [date(2026, 12, 25)]);
        prefs.select_holiday(Country::Canada, "Canada Day", []);
        prefs.add_custom_skip_date(date(2026, 7, 3));
        assert_eq!(prefs.total_selected_holidays(), 2);
        assert_eq!(prefs.total_selected_dates_summary(), "1 Date, 2 Holidays");

        assert!(prefs.deselect_holiday(Country::Canada, "Canada Day"));
        assert!(!prefs.holiday_skip_dates.contains_key(&Country::Canada));

        prefs.clear_skip_dates(false);
        assert!(prefs.custom_skip_dates.is_empty());
        assert_eq!(prefs.total_selected_holidays(), 1);
        prefs.clear_skip_dates(true);
        assert_eq!(prefs.total_selected_holidays(), 0);
    }

    #[test]
    fn test_string_enums() {
        assert_eq!(
            "Activated".parse::<SkipActivationStatus>().unwrap(),
            SkipActivationStatus::Activated
        );
        assert_eq!("sunset".parse::<AutoSetOption>().unwrap(), AutoSetOption::Sunset);
        assert_eq!(AutoSetOffsetOption::Before.as_str(), "before");
        assert!("sideways".parse::<AutoSetOffsetOption>().is_err());
    }

    #[test]
    fn test_auto_set_explanation() {
        let mut prefs = AlarmPrefs::new(TEST_ALARM_ID);
        assert!(prefs.auto_set_explanation().contains("auto-set feature"));

        prefs.auto_set_option = AutoSetOption::Sunrise;
        assert_eq!(
            prefs.auto_set_explanation(),
            "This alarm will be automatically set to the sunrise time."
        );

        prefs.auto_set_offset_option = AutoSetOffsetOption::Before;
        prefs.auto_set_offset_minute = 15;
        assert_eq!(
            prefs.auto_set_explanation(),
            "This alarm will be automatically set to 1 hour(s) and 15 minute(s) before the sunrise time."
        );
    }
}
