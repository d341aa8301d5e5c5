use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use serial_test::serial;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

use sleeper::holiday::Country;
use sleeper::prefs::{
    AlarmPrefs, AutoSetOffsetOption, AutoSetOption, ClockDuration, FilePreferenceStore,
    PreferenceManager, PreferenceStore, SkipActivationStatus,
};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

fn clock_duration() -> impl Strategy<Value = ClockDuration> {
    (0u32..24, 0u32..60, 0u32..60).prop_map(|(h, m, s)| ClockDuration::new(h, m, s).unwrap())
}

fn dates(max: usize) -> impl Strategy<Value = Vec<NaiveDate>> {
    prop::collection::vec(0i64..2000, 0..max).prop_map(|offsets| {
        let mut seen = Vec::new();
        for offset in offsets {
            let date = base_date() + Duration::days(offset);
            if !seen.contains(&date) {
                seen.push(date);
            }
        }
        seen
    })
}

fn holidays() -> impl Strategy<Value = Vec<(Country, String, Vec<NaiveDate>)>> {
    prop::collection::vec(
        (
            prop::sample::select(Country::ALL.to_vec()),
            "[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8})?",
            dates(4),
        ),
        0..4,
    )
}

prop_compose! {
    fn alarm_prefs()(
        snooze in clock_duration(),
        skip in clock_duration(),
        skip_enabled in any::<bool>(),
        status in prop::sample::select(vec![
            SkipActivationStatus::Unknown,
            SkipActivationStatus::Activated,
            SkipActivationStatus::Disabled,
        ]),
        option in prop::sample::select(vec![
            AutoSetOption::Off,
            AutoSetOption::Sunrise,
            AutoSetOption::Sunset,
        ]),
        offset in prop::sample::select(vec![
            AutoSetOffsetOption::Off,
            AutoSetOffsetOption::Before,
            AutoSetOffsetOption::After,
        ]),
        offset_hour in 0u32..24,
        offset_minute in 0u32..60,
        custom in dates(8),
        selections in holidays(),
    ) -> AlarmPrefs {
        let mut prefs = AlarmPrefs::new("4C8D0B7E-1A52-4F0B-9E33-7C2D5A1B9F60");
        prefs.snooze_time = snooze;
        prefs.skip_time = skip;
        prefs.skip_enabled = skip_enabled;
        prefs.skip_activation_status = status;
        prefs.auto_set_option = option;
        prefs.auto_set_offset_option = offset;
        prefs.auto_set_offset_hour = offset_hour;
        prefs.auto_set_offset_minute = offset_minute;
        prefs.custom_skip_dates = custom;
        for (country, name, dates) in selections {
            prefs.select_holiday(country, name, dates);
        }
        prefs
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_file_store_round_trip(prefs in alarm_prefs()) {
        let dir = tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("alarms.toml"));

        store.save(&prefs).unwrap();
        prop_assert_eq!(store.get(prefs.alarm_id()).unwrap(), Some(prefs.clone()));

        // A second store on the same file sees the same record
        let reopened = FilePreferenceStore::new(dir.path().join("alarms.toml"));
        prop_assert_eq!(reopened.get(prefs.alarm_id()).unwrap(), Some(prefs));
    }
}

#[test]
fn test_legacy_file_without_auto_set_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alarms.toml");
    fs::write(
        &path,
        r#"
version = 1

[[alarms]]
alarm_id = "legacy"
snooze_hour = 0
snooze_minute = 5
snooze_second = 0
skip_enabled = true
custom_skip_dates = ["2026-12-24", "not-a-date"]

[alarms.holiday_skip_dates.US]
"Christmas Day" = ["2026-12-25"]

[alarms.holiday_skip_dates.XX]
"Nowhere Day" = ["2026-01-01"]
"#,
    )
    .unwrap();

    let store = FilePreferenceStore::new(&path);
    let prefs = store.get("legacy").unwrap().unwrap();

    assert_eq!(prefs.snooze_time, ClockDuration::new(0, 5, 0).unwrap());
    assert!(prefs.skip_enabled);
    assert_eq!(prefs.skip_time, ClockDuration::default_skip());
    assert_eq!(prefs.auto_set_option, AutoSetOption::Off);
    assert_eq!(
        prefs.custom_skip_dates,
        vec![NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()]
    );
    assert_eq!(prefs.total_selected_holidays(), 1);
    assert!(prefs.holiday_skip_dates.contains_key(&Country::UnitedStates));
}

#[test]
#[serial]
fn test_concurrent_managers_share_one_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alarms.toml");
    let manager = Arc::new(PreferenceManager::new(FilePreferenceStore::new(&path)));

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let alarm_id = format!("alarm-{}", i % 2);
                manager
                    .update_alarm_prefs(&alarm_id, |prefs| {
                        prefs.add_custom_skip_date(base_date() + Duration::days(i64::from(i)));
                        Ok(())
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let all = manager.all_alarm_prefs().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|prefs| prefs.custom_skip_dates.len() == 4));
}

#[test]
fn test_delete_removes_only_that_alarm() {
    let dir = tempdir().unwrap();
    let manager = PreferenceManager::new(FilePreferenceStore::new(dir.path().join("alarms.toml")));

    manager.save_alarm_prefs(&AlarmPrefs::new("first")).unwrap();
    manager.save_alarm_prefs(&AlarmPrefs::new("second")).unwrap();
    manager.delete_alarm("first").unwrap();

    assert!(manager.alarm_prefs("first").unwrap().is_none());
    assert!(manager.alarm_prefs("second").unwrap().is_some());
}
