//! On-disk schema for alarm preferences.
//!
//! The record mirrors [`AlarmPrefs`] with plain, forward compatible types: every
//! field has a serde default so files written by older versions (for example,
//! before the auto-set keys existed) load with defaults filled in, and enum
//! values are stored as lowercase strings so an unknown value degrades to the
//! default instead of failing the whole document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use super::{
    AlarmPrefs, AutoSetOffsetOption, AutoSetOption, ClockDuration, HolidaySelections,
    SkipActivationStatus,
};
use crate::constants::*;
use crate::holiday::Country;
use crate::logger::Log;

/// The whole preference file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefsDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub alarms: Vec<AlarmRecord>,
}

impl Default for PrefsDocument {
    fn default() -> Self {
        Self {
            version: PREFS_SCHEMA_VERSION,
            alarms: Vec::new(),
        }
    }
}

/// One persisted alarm entry.
///
/// `holiday_skip_dates` must stay the last field so TOML emits it as a sub-table
/// after the plain values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlarmRecord {
    pub alarm_id: String,
    pub snooze_hour: u32,
    pub snooze_minute: u32,
    pub snooze_second: u32,
    pub skip_enabled: bool,
    pub skip_hour: u32,
    pub skip_minute: u32,
    pub skip_second: u32,
    pub skip_activation_status: String,
    pub auto_set_option: String,
    pub auto_set_offset_option: String,
    pub auto_set_offset_hour: u32,
    pub auto_set_offset_minute: u32,
    pub custom_skip_dates: Vec<String>,
    pub holiday_skip_dates: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Default for AlarmRecord {
    fn default() -> Self {
        Self::from_prefs(&AlarmPrefs::new(String::new()))
    }
}

impl AlarmRecord {
    pub fn from_prefs(prefs: &AlarmPrefs) -> Self {
        let holiday_skip_dates = prefs
            .holiday_skip_dates
            .iter()
            .map(|(country, holidays)| {
                let holidays = holidays
                    .iter()
                    .map(|(name, dates)| (name.clone(), dates.iter().map(format_date).collect()))
                    .collect();
                (country.code().to_string(), holidays)
            })
            .collect();

        Self {
            alarm_id: prefs.alarm_id().to_string(),
            snooze_hour: prefs.snooze_time.hour(),
            snooze_minute: prefs.snooze_time.minute(),
            snooze_second: prefs.snooze_time.second(),
            skip_enabled: prefs.skip_enabled,
            skip_hour: prefs.skip_time.hour(),
            skip_minute: prefs.skip_time.minute(),
            skip_second: prefs.skip_time.second(),
            skip_activation_status: prefs.skip_activation_status.as_str().to_string(),
            auto_set_option: prefs.auto_set_option.as_str().to_string(),
            auto_set_offset_option: prefs.auto_set_offset_option.as_str().to_string(),
            auto_set_offset_hour: prefs.auto_set_offset_hour,
            auto_set_offset_minute: prefs.auto_set_offset_minute,
            custom_skip_dates: prefs.custom_skip_dates.iter().map(format_date).collect(),
            holiday_skip_dates,
        }
    }

    /// Convert to the domain model, dropping anything that cannot be interpreted.
    pub fn into_prefs(self) -> AlarmPrefs {
        let id = self.alarm_id;
        let mut prefs = AlarmPrefs::new(id.clone());

        prefs.snooze_time = duration_or(
            &id,
            "snooze",
            (self.snooze_hour, self.snooze_minute, self.snooze_second),
            ClockDuration::default_snooze(),
        );
        prefs.skip_enabled = self.skip_enabled;
        prefs.skip_time = duration_or(
            &id,
            "skip",
            (self.skip_hour, self.skip_minute, self.skip_second),
            ClockDuration::default_skip(),
        );
        prefs.skip_activation_status = parse_or_default(&id, &self.skip_activation_status);
        prefs.auto_set_option = parse_or_default(&id, &self.auto_set_option);
        prefs.auto_set_offset_option = parse_or_default(&id, &self.auto_set_offset_option);
        prefs.auto_set_offset_hour = self.auto_set_offset_hour;
        prefs.auto_set_offset_minute = self.auto_set_offset_minute;

        for raw in &self.custom_skip_dates {
            if let Some(date) = parse_date(&id, raw) {
                prefs.add_custom_skip_date(date);
            }
        }

        prefs.holiday_skip_dates = parse_holiday_selections(&id, self.holiday_skip_dates);
        prefs
    }
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(alarm_id: &str, raw: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            Log::log_warning(&format!(
                "Dropping malformed skip date '{}' for alarm {}",
                raw, alarm_id
            ));
            None
        }
    }
}

fn parse_or_default<T>(alarm_id: &str, raw: &str) -> T
where
    T: FromStr + Default,
{
    // Absent keys deserialize to the default record, which already holds valid names
    raw.parse().unwrap_or_else(|_| {
        Log::log_warning(&format!(
            "Unknown value '{}' for alarm {}, using default",
            raw, alarm_id
        ));
        T::default()
    })
}

fn duration_or(
    alarm_id: &str,
    what: &str,
    (hour, minute, second): (u32, u32, u32),
    fallback: ClockDuration,
) -> ClockDuration {
    ClockDuration::new(hour, minute, second).unwrap_or_else(|e| {
        Log::log_warning(&format!(
            "Invalid {} time for alarm {} ({}), using {}",
            what, alarm_id, e, fallback
        ));
        fallback
    })
}

fn parse_holiday_selections(
    alarm_id: &str,
    raw: BTreeMap<String, BTreeMap<String, Vec<String>>>,
) -> HolidaySelections {
    let mut selections = HolidaySelections::new();

    for (code, holidays) in raw {
        let Some(country) = Country::from_code(&code) else {
            Log::log_warning(&format!(
                "Ignoring holiday selections for unknown country '{}' on alarm {}",
                code, alarm_id
            ));
            continue;
        };

        let entry = selections.entry(country).or_default();
        for (name, dates) in holidays {
            let dates: BTreeSet<NaiveDate> = dates
                .iter()
                .filter_map(|raw| parse_date(alarm_id, raw))
                .collect();
            entry.insert(name, dates);
        }
    }

    selections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_round_trip() {
        let mut prefs = AlarmPrefs::new(TEST_ALARM_ID);
        prefs.skip_enabled = true;
        prefs.snooze_time = ClockDuration::new(0, 5, 0).unwrap();
        prefs.skip_activation_status = SkipActivationStatus::Disabled;
        prefs.auto_set_option = AutoSetOption::Sunset;
        prefs.auto_set_offset_option = AutoSetOffsetOption::After;
        prefs.add_custom_skip_date(date(2026, 11, 2));
        prefs.select_holiday(Country::UnitedStates, "Labor Day", [date(2026, 9, 7)]);

        let record = AlarmRecord::from_prefs(&prefs);
        let text = toml::to_string(&record).unwrap();
        let parsed: AlarmRecord = toml::from_str(&text).unwrap();
        assert_eq!(parsed.into_prefs(), prefs);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        // A version 1 record, written before auto-set existed
        let record: AlarmRecord = toml::from_str(
            r#"
alarm_id = "legacy"
snooze_minute = 12
skip_enabled = true
"#,
        )
        .unwrap();
        let prefs = record.into_prefs();

        assert_eq!(prefs.alarm_id(), "legacy");
        assert_eq!(prefs.snooze_time, ClockDuration::new(0, 12, 0).unwrap());
        assert!(prefs.skip_enabled);
        assert_eq!(prefs.skip_time, ClockDuration::default_skip());
        assert_eq!(prefs.auto_set_option, AutoSetOption::Off);
        assert_eq!(prefs.auto_set_offset_hour, DEFAULT_AUTO_SET_OFFSET_HOUR);
    }

    #[test]
    fn test_bad_values_are_dropped() {
        let record: AlarmRecord = toml::from_str(
            r#"
alarm_id = "messy"
skip_activation_status = "maybe"
snooze_minute = 75
custom_skip_dates = ["2026-02-30", "2026-03-01", "2026-03-01", "soon"]

[holiday_skip_dates.US]
"Christmas Day" = ["2026-12-25", "bad"]

[holiday_skip_dates.XX]
"Mystery Day" = ["2026-01-01"]
"#,
        )
        .unwrap();
        let prefs = record.into_prefs();

        assert_eq!(prefs.skip_activation_status, SkipActivationStatus::Unknown);
        assert_eq!(prefs.snooze_time, ClockDuration::default_snooze());
        assert_eq!(prefs.custom_skip_dates, vec![date(2026, 3, 1)]);
        assert_eq!(prefs.holiday_skip_dates.len(), 1);
        let christmas = &prefs.holiday_skip_dates[&Country::UnitedStates]["Christmas Day"];
        assert_eq!(christmas.iter().copied().collect::<Vec<_>>(), vec![date(2026, 12, 25)]);
    }

    #[test]
    fn test_huge_hours_fall_back_to_defaults() {
        let record: AlarmRecord = toml::from_str(
            r#"
alarm_id = "overflow"
snooze_hour = 2000000
skip_hour = 4294967295
skip_minute = 10
"#,
        )
        .unwrap();
        let prefs = record.into_prefs();

        assert_eq!(prefs.snooze_time, ClockDuration::default_snooze());
        assert_eq!(prefs.skip_time, ClockDuration::default_skip());
    }
}
