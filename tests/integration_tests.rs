//! End-to-end tests wiring the preference file, skip prompt state machine and
//! auto-set scheduler together against a scripted alarm manager.

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use mockall::mock;
use mockall::predicate::*;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use sleeper::activation::{PromptDecision, SkipActivationStateMachine};
use sleeper::alarm::{AlarmDecision, AlarmManager, AlarmTime};
use sleeper::autoset::{AutoSetOutcome, AutoSetScheduler, fire_time_for};
use sleeper::config::Config;
use sleeper::holiday::{Country, Holiday, HolidayCatalog};
use sleeper::prefs::{
    AlarmPrefs, AutoSetOffsetOption, AutoSetOption, FilePreferenceStore, PreferenceManager,
    PreferenceStore, SkipActivationStatus,
};
use sleeper::skip::{HolidayPrunePolicy, SkipDateResolver};
use sleeper::sun::{SolarForecastProvider, SunObserver};

mock! {
    pub Alarms {}

    impl AlarmManager for Alarms {
        fn next_fire_date(&self, alarm_id: &str) -> Result<Option<NaiveDateTime>>;
        fn next_fire_date_after(
            &self,
            alarm_id: &str,
            after: NaiveDateTime,
        ) -> Result<Option<NaiveDateTime>>;
        fn update_alarm(&self, alarm_id: &str, new_fire_date: NaiveDateTime) -> Result<()>;
        fn set_alarm_time(&self, alarm_id: &str, time: AlarmTime) -> Result<()>;
        fn cancel_notification(&self, alarm_id: &str) -> Result<()>;
    }
}

const WAKE_ALARM: &str = "0F1E2D3C-4B5A-4968-8776-655443322110";
const NAP_ALARM: &str = "9A8B7C6D-5E4F-4031-8213-243546576879";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(d: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    d.and_hms_opt(h, m, 0).unwrap()
}

fn resolver() -> Arc<SkipDateResolver> {
    let catalog = HolidayCatalog::from_holidays([(
        Country::UnitedStates,
        vec![Holiday::new(
            "Columbus Day",
            vec![date(2026, 10, 12), date(2027, 10, 11)],
        )],
    )]);
    Arc::new(SkipDateResolver::new(
        Arc::new(catalog),
        HolidayPrunePolicy::Retain,
    ))
}

/// Alarm manager whose next fire date moves when `update_alarm` is called.
fn daily_alarms(first: NaiveDateTime) -> (MockAlarms, Arc<Mutex<NaiveDateTime>>) {
    let next = Arc::new(Mutex::new(first));
    let mut alarms = MockAlarms::new();

    let current = Arc::clone(&next);
    alarms
        .expect_next_fire_date()
        .returning(move |_| Ok(Some(*current.lock().unwrap())));
    alarms
        .expect_next_fire_date_after()
        .returning(|_, after| Ok(Some(after + Duration::days(1))));
    let moved = Arc::clone(&next);
    alarms
        .expect_update_alarm()
        .with(eq(WAKE_ALARM), always())
        .times(1)
        .returning(move |_, new_date| {
            *moved.lock().unwrap() = new_date;
            Ok(())
        });
    (alarms, next)
}

#[test]
fn test_confirmed_skip_moves_alarm_and_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("alarms.toml");
    let prefs = Arc::new(PreferenceManager::new(FilePreferenceStore::new(&path)));

    let mut wake = AlarmPrefs::new(WAKE_ALARM);
    wake.skip_enabled = true;
    wake.add_custom_skip_date(date(2026, 10, 19));
    wake.add_custom_skip_date(date(2026, 11, 2));
    prefs.save_alarm_prefs(&wake).unwrap();

    let (alarms, next) = daily_alarms(at(date(2026, 10, 19), 7, 0));
    let machine = SkipActivationStateMachine::new(Arc::clone(&prefs), resolver(), Arc::new(alarms));

    // Outside the 30 minute window nothing is offered
    assert_eq!(
        machine
            .check_skip_window(WAKE_ALARM, at(date(2026, 10, 19), 6, 0))
            .unwrap(),
        PromptDecision::NoPrompt
    );

    let decision = machine
        .check_skip_window(WAKE_ALARM, at(date(2026, 10, 19), 6, 40))
        .unwrap();
    match decision {
        PromptDecision::ShowPrompt {
            fire_date,
            explanation,
            ..
        } => {
            assert_eq!(fire_date, at(date(2026, 10, 19), 7, 0));
            assert_eq!(
                explanation.as_deref(),
                Some("The next skip date you've selected for this alarm is Today.")
            );
        }
        other => panic!("expected a prompt, got {:?}", other),
    }
    assert_eq!(
        machine
            .check_skip_window(WAKE_ALARM, at(date(2026, 10, 19), 6, 45))
            .unwrap(),
        PromptDecision::AlreadyPending
    );

    machine.confirm_skip(WAKE_ALARM).unwrap();
    assert_eq!(*next.lock().unwrap(), at(date(2026, 10, 20), 7, 0));

    // A fresh store on the same file sees the answer and the consumed date
    let reopened = FilePreferenceStore::new(&path);
    let stored = reopened.get(WAKE_ALARM).unwrap().unwrap();
    assert_eq!(stored.skip_activation_status, SkipActivationStatus::Activated);
    assert_eq!(stored.custom_skip_dates, vec![date(2026, 11, 2)]);

    // The moved-away occurrence is skipped, the new one fires
    assert_eq!(
        machine
            .on_alarm_about_to_fire(WAKE_ALARM, at(date(2026, 10, 19), 7, 0))
            .unwrap(),
        AlarmDecision::Skip
    );
    let stored = reopened.get(WAKE_ALARM).unwrap().unwrap();
    assert_eq!(stored.skip_activation_status, SkipActivationStatus::Unknown);
    assert_eq!(
        machine
            .on_alarm_about_to_fire(WAKE_ALARM, at(date(2026, 10, 20), 7, 0))
            .unwrap(),
        AlarmDecision::Fire
    );
}

#[test]
fn test_unanswered_prompt_fires_and_consumes_date() {
    let dir = tempdir().unwrap();
    let prefs = Arc::new(PreferenceManager::new(FilePreferenceStore::new(
        dir.path().join("alarms.toml"),
    )));

    let mut wake = AlarmPrefs::new(WAKE_ALARM);
    wake.skip_enabled = true;
    wake.add_custom_skip_date(date(2026, 10, 19));
    prefs.save_alarm_prefs(&wake).unwrap();

    let mut alarms = MockAlarms::new();
    alarms
        .expect_next_fire_date()
        .returning(|_| Ok(Some(at(date(2026, 10, 19), 7, 0))));
    alarms
        .expect_cancel_notification()
        .with(eq(WAKE_ALARM))
        .times(1)
        .returning(|_| Ok(()));
    alarms.expect_update_alarm().never();

    let machine = SkipActivationStateMachine::new(Arc::clone(&prefs), resolver(), Arc::new(alarms));
    assert!(matches!(
        machine
            .check_skip_window(WAKE_ALARM, at(date(2026, 10, 19), 6, 50))
            .unwrap(),
        PromptDecision::ShowPrompt { .. }
    ));

    assert_eq!(
        machine
            .on_alarm_about_to_fire(WAKE_ALARM, at(date(2026, 10, 19), 7, 0))
            .unwrap(),
        AlarmDecision::Fire
    );
    assert!(!machine.is_prompt_pending(WAKE_ALARM));

    let stored = prefs.alarm_prefs(WAKE_ALARM).unwrap().unwrap();
    assert!(stored.custom_skip_dates.is_empty());
    assert_eq!(stored.skip_activation_status, SkipActivationStatus::Unknown);
}

#[test]
fn test_holiday_selection_prompts_without_being_consumed() {
    let dir = tempdir().unwrap();
    let prefs = Arc::new(PreferenceManager::new(FilePreferenceStore::new(
        dir.path().join("alarms.toml"),
    )));

    let mut wake = AlarmPrefs::new(WAKE_ALARM);
    wake.skip_enabled = true;
    wake.select_holiday(Country::UnitedStates, "Columbus Day", []);
    prefs.save_alarm_prefs(&wake).unwrap();

    let mut alarms = MockAlarms::new();
    alarms
        .expect_next_fire_date()
        .returning(|_| Ok(Some(at(date(2027, 10, 11), 6, 30))));

    let machine = SkipActivationStateMachine::new(Arc::clone(&prefs), resolver(), Arc::new(alarms));
    match machine
        .check_skip_window(WAKE_ALARM, at(date(2027, 10, 11), 6, 15))
        .unwrap()
    {
        PromptDecision::ShowPrompt { explanation, .. } => assert_eq!(
            explanation.as_deref(),
            Some("The next holiday you've selected for this alarm is Columbus Day (Today).")
        ),
        other => panic!("expected a prompt, got {:?}", other),
    }

    machine.decline_skip(WAKE_ALARM).unwrap();
    let stored = prefs.alarm_prefs(WAKE_ALARM).unwrap().unwrap();
    assert_eq!(stored.skip_activation_status, SkipActivationStatus::Disabled);
    assert_eq!(stored.total_selected_holidays(), 1);

    // A second answer for the same occurrence is rejected
    assert!(machine.confirm_skip(WAKE_ALARM).is_err());
}

#[test]
fn test_sun_change_retimes_auto_set_alarms() {
    let dir = tempdir().unwrap();
    let prefs = Arc::new(PreferenceManager::new(FilePreferenceStore::new(
        dir.path().join("alarms.toml"),
    )));

    let mut wake = AlarmPrefs::new(WAKE_ALARM);
    wake.auto_set_option = AutoSetOption::Sunrise;
    wake.auto_set_offset_option = AutoSetOffsetOption::Before;
    wake.auto_set_offset_hour = 0;
    wake.auto_set_offset_minute = 45;
    prefs.save_alarm_prefs(&wake).unwrap();

    let mut nap = AlarmPrefs::new(NAP_ALARM);
    nap.auto_set_option = AutoSetOption::Sunset;
    nap.auto_set_offset_option = AutoSetOffsetOption::Off;
    prefs.save_alarm_prefs(&nap).unwrap();

    prefs.save_alarm_prefs(&AlarmPrefs::new("manual")).unwrap();

    let tz: Tz = "America/New_York".parse().unwrap();
    let provider = Arc::new(SolarForecastProvider::new(40.7128, -74.0060, Some(tz)).unwrap());
    let (observer, receiver) = SunObserver::new(provider.clone());
    assert!(observer.start_monitoring(prefs.has_auto_set_alarms().unwrap()).unwrap());
    assert_eq!(provider.observer_count(), 1);

    let day = date(2026, 10, 18);
    let published = provider.refresh(day).unwrap();
    let sample = receiver.try_recv().unwrap();
    assert_eq!(sample, published);

    // Same day again: the times did not change, so nothing is republished
    provider.refresh(day).unwrap();
    assert!(receiver.try_recv().is_err());

    let expected_wake = fire_time_for(&wake, &sample).unwrap();
    let expected_nap = fire_time_for(&nap, &sample).unwrap();
    let mut alarms = MockAlarms::new();
    alarms
        .expect_set_alarm_time()
        .with(eq(WAKE_ALARM), eq(expected_wake))
        .times(1)
        .returning(|_, _| Ok(()));
    alarms
        .expect_set_alarm_time()
        .with(eq(NAP_ALARM), eq(expected_nap))
        .times(1)
        .returning(|_, _| Ok(()));

    let scheduler = AutoSetScheduler::new(
        Arc::clone(&prefs),
        Arc::new(alarms),
        Duration::hours(36),
        Vec::new(),
    );
    match scheduler.handle_sun_change(&sample, Utc::now()).unwrap() {
        AutoSetOutcome::Applied(report) => {
            assert_eq!(report.updated.len(), 2);
            assert!(report.failed.is_empty());
        }
        AutoSetOutcome::NoForecast => panic!("fresh sample was rejected"),
    }

    // A forecast older than the limit is not applied
    assert_eq!(
        scheduler
            .handle_sun_change(&sample, Utc::now() + Duration::hours(48))
            .unwrap(),
        AutoSetOutcome::NoForecast
    );

    observer.stop_monitoring();
    assert_eq!(provider.observer_count(), 0);
}

#[test]
fn test_config_drives_prune_policy() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("sleeper.toml");
    fs::write(
        &config_path,
        r#"
prefs_file = "stored.toml"
holiday_prune_policy = "prune_passed"
latitude = 40.7128
longitude = -74.0060
timezone = "America/New_York"
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&config_path).unwrap();
    assert_eq!(config.prune_policy(), HolidayPrunePolicy::PrunePassed);
    assert_eq!(config.prefs_path(&config_path), dir.path().join("stored.toml"));

    let catalog = HolidayCatalog::from_holidays([(
        Country::UnitedStates,
        vec![Holiday::new("Columbus Day", vec![date(2026, 10, 12)])],
    )]);
    let resolver = SkipDateResolver::new(Arc::new(catalog), config.prune_policy());
    let prefs = PreferenceManager::new(FilePreferenceStore::new(config.prefs_path(&config_path)));

    let mut wake = AlarmPrefs::new(WAKE_ALARM);
    wake.add_custom_skip_date(date(2026, 10, 1));
    wake.add_custom_skip_date(date(2026, 12, 24));
    wake.select_holiday(Country::UnitedStates, "Columbus Day", [date(2026, 10, 12)]);
    prefs.save_alarm_prefs(&wake).unwrap();

    let today = date(2026, 10, 18);
    let changed = prefs
        .update_alarm_prefs(WAKE_ALARM, |stored| Ok(resolver.prune(stored, today)))
        .unwrap();
    assert!(changed);

    let stored = prefs.alarm_prefs(WAKE_ALARM).unwrap().unwrap();
    assert_eq!(stored.custom_skip_dates, vec![date(2026, 12, 24)]);
    assert_eq!(stored.total_selected_holidays(), 0);
}
