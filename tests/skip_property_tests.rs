use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use proptest::prelude::*;
use std::sync::Arc;

use sleeper::alarm::AlarmTime;
use sleeper::autoset::compute_fire_time;
use sleeper::holiday::{Country, Holiday, HolidayCatalog};
use sleeper::prefs::{AlarmPrefs, AutoSetOffsetOption};
use sleeper::skip::{HolidayPrunePolicy, SkipDateResolver};
use sleeper::sun::SunEvent;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    base_date() + Duration::days(offset)
}

fn resolver() -> SkipDateResolver {
    let catalog = HolidayCatalog::from_holidays([(
        Country::UnitedStates,
        vec![
            Holiday::new("Independence Day", vec![day(183), day(548), day(913)]),
            Holiday::new("Christmas Day", vec![day(358), day(722), day(1088)]),
        ],
    )]);
    SkipDateResolver::new(Arc::new(catalog), HolidayPrunePolicy::Retain)
}

fn prefs_with(custom: &[i64], holidays: &[&str]) -> AlarmPrefs {
    let mut prefs = AlarmPrefs::new("A1B2C3D4-0000-4000-8000-000000000001");
    prefs.skip_enabled = true;
    for offset in custom {
        prefs.add_custom_skip_date(day(*offset));
    }
    for name in holidays {
        prefs.select_holiday(Country::UnitedStates, *name, []);
    }
    prefs
}

fn holiday_names() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(vec!["Independence Day", "Christmas Day", "Unknown Day"], 0..=3)
}

fn time_of_day() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

proptest! {
    #[test]
    fn test_prune_is_idempotent(
        offsets in prop::collection::vec(0i64..1200, 0..20),
        today in 0i64..1200,
    ) {
        let dates: Vec<NaiveDate> = offsets.iter().map(|o| day(*o)).collect();
        let once = SkipDateResolver::prune_custom_dates(&dates, day(today));
        let twice = SkipDateResolver::prune_custom_dates(&once, day(today));
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.iter().all(|d| *d >= day(today)));
    }

    #[test]
    fn test_prune_preserves_order(
        offsets in prop::collection::vec(0i64..1200, 0..20),
        today in 0i64..1200,
    ) {
        let dates: Vec<NaiveDate> = offsets.iter().map(|o| day(*o)).collect();
        let pruned = SkipDateResolver::prune_custom_dates(&dates, day(today));
        let mut expected: Vec<NaiveDate> = Vec::new();
        for date in dates.into_iter().filter(|d| *d >= day(today)) {
            if !expected.contains(&date) {
                expected.push(date);
            }
        }
        prop_assert_eq!(pruned, expected);
    }

    #[test]
    fn test_next_skip_date_is_never_in_the_past(
        custom in prop::collection::vec(0i64..1200, 0..10),
        holidays in holiday_names(),
        today in 0i64..1200,
    ) {
        let resolver = resolver();
        let prefs = prefs_with(&custom, &holidays);
        if let Some(next) = resolver.next_skip_date(&prefs, day(today)) {
            prop_assert!(next >= day(today));
        }
    }

    #[test]
    fn test_next_skip_date_is_the_earliest_candidate(
        custom in prop::collection::vec(0i64..1200, 0..10),
        holidays in holiday_names(),
        today in 0i64..1200,
    ) {
        let resolver = resolver();
        let prefs = prefs_with(&custom, &holidays);
        let today = day(today);

        let mut candidates: Vec<NaiveDate> =
            custom.iter().map(|o| day(*o)).filter(|d| *d >= today).collect();
        for name in &holidays {
            if let Some(date) = resolver.catalog().first_date_on_or_after(Country::UnitedStates, name, today) {
                candidates.push(date);
            }
        }
        prop_assert_eq!(resolver.next_skip_date(&prefs, today), candidates.into_iter().min());
    }

    #[test]
    fn test_should_skip_exactly_on_next_skip_day(
        custom in prop::collection::vec(0i64..1200, 1..10),
        holidays in holiday_names(),
        today in 0i64..1200,
        candidate in 0i64..1300,
        time in time_of_day(),
    ) {
        let resolver = resolver();
        let prefs = prefs_with(&custom, &holidays);
        let candidate = day(candidate).and_time(time);

        let expected = resolver.next_skip_date(&prefs, day(today)) == Some(candidate.date());
        prop_assert_eq!(resolver.should_skip(&prefs, candidate, day(today)), expected);
    }

    #[test]
    fn test_coincident_custom_and_holiday_reported_once(today in 0i64..358) {
        let resolver = resolver();
        // Christmas Day 2026 is day 358
        let prefs = prefs_with(&[358], &["Christmas Day"]);
        let first = resolver.next_skip_date(&prefs, day(today));

        let mut consumed = prefs.clone();
        SkipDateResolver::consume_skip_date(&mut consumed, day(358));
        prop_assert_eq!(first, resolver.next_skip_date(&consumed, day(today)));

        // The day after, the next occurrence is next year's holiday, not the same day again
        prop_assert_eq!(resolver.next_skip_date(&prefs, day(359)), Some(day(722)));
    }

    #[test]
    fn test_fire_time_offsets_cancel(
        sunrise in time_of_day(),
        sunset in time_of_day(),
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        let base = compute_fire_time(SunEvent::Sunset, AutoSetOffsetOption::Off, hour, minute, sunrise, sunset);
        let before = compute_fire_time(SunEvent::Sunset, AutoSetOffsetOption::Before, hour, minute, sunrise, sunset);
        let after = compute_fire_time(SunEvent::Sunset, AutoSetOffsetOption::After, hour, minute, sunrise, sunset);

        prop_assert!(before.hour < 24 && before.minute < 60);
        prop_assert!(after.hour < 24 && after.minute < 60);

        // Shifting back by the same offset lands on the base time
        let back = compute_fire_time(
            SunEvent::Sunset,
            AutoSetOffsetOption::Before,
            hour,
            minute,
            sunrise,
            NaiveTime::from_hms_opt(after.hour, after.minute, 0).unwrap(),
        );
        prop_assert_eq!(back, base);
        prop_assert_eq!(
            base,
            AlarmTime {
                hour: sunset.hour(),
                minute: sunset.minute()
            }
        );
    }
}
