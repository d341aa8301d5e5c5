//! Sunrise/sunset driven alarm times.
//!
//! [`compute_fire_time`] turns a sun sample and an alarm's offset into a local
//! hour/minute. [`AutoSetScheduler`] applies it to every auto-set alarm and
//! pushes the result to the host's alarm manager, either on the twice-daily
//! sweep or whenever the [`crate::sun::SunObserver`] reports a changed sample.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::alarm::{AlarmManager, AlarmTime};
use crate::constants::MINUTES_PER_DAY;
use crate::logger::Log;
use crate::prefs::{AlarmPrefs, AutoSetOffsetOption, AutoSetOption, PreferenceManager, PreferenceStore};
use crate::sun::{SunEvent, SunSample};

/// Alarm time for `event` shifted by the offset.
///
/// The result wraps around midnight: only the time-of-day changes, never the
/// day the alarm is scheduled on.
pub fn compute_fire_time(
    event: SunEvent,
    offset_option: AutoSetOffsetOption,
    offset_hour: u32,
    offset_minute: u32,
    sunrise: NaiveTime,
    sunset: NaiveTime,
) -> AlarmTime {
    let base = match event {
        SunEvent::Sunrise => sunrise,
        SunEvent::Sunset => sunset,
    };
    let base_minutes = i64::from(base.hour()) * 60 + i64::from(base.minute());
    let offset = i64::from(offset_hour) * 60 + i64::from(offset_minute);

    let total = match offset_option {
        AutoSetOffsetOption::Off => base_minutes,
        AutoSetOffsetOption::Before => base_minutes - offset,
        AutoSetOffsetOption::After => base_minutes + offset,
    }
    .rem_euclid(MINUTES_PER_DAY);

    // total is in 0..1440, so both parts fit
    AlarmTime {
        hour: (total / 60) as u32,
        minute: (total % 60) as u32,
    }
}

/// Alarm time for one alarm's auto-set choice, or `None` when auto-set is off.
pub fn fire_time_for(prefs: &AlarmPrefs, sample: &SunSample) -> Option<AlarmTime> {
    let event = prefs.auto_set_option.sun_event()?;
    Some(compute_fire_time(
        event,
        prefs.auto_set_offset_option,
        prefs.auto_set_offset_hour,
        prefs.auto_set_offset_minute,
        sample.local_time(SunEvent::Sunrise),
        sample.local_time(SunEvent::Sunset),
    ))
}

/// Alarms updated and alarms the alarm manager rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoSetReport {
    pub updated: Vec<(String, AlarmTime)>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSetOutcome {
    /// No usable forecast; nothing was written.
    NoForecast,
    Applied(AutoSetReport),
}

pub struct AutoSetScheduler<S: PreferenceStore> {
    prefs: Arc<PreferenceManager<S>>,
    alarms: Arc<dyn AlarmManager>,
    max_forecast_age: Duration,
    sweep_times: Vec<NaiveTime>,
}

impl<S: PreferenceStore> AutoSetScheduler<S> {
    pub fn new(
        prefs: Arc<PreferenceManager<S>>,
        alarms: Arc<dyn AlarmManager>,
        max_forecast_age: Duration,
        mut sweep_times: Vec<NaiveTime>,
    ) -> Self {
        sweep_times.sort_unstable();
        sweep_times.dedup();
        Self {
            prefs,
            alarms,
            max_forecast_age,
            sweep_times,
        }
    }

    fn usable_sample<'a>(
        &self,
        sample: Option<&'a SunSample>,
        now: DateTime<Utc>,
    ) -> Option<&'a SunSample> {
        let Some(sample) = sample else {
            Log::log_debug("No sun forecast yet, skipping auto-set update");
            return None;
        };
        if sample.is_stale(now, self.max_forecast_age) {
            Log::log_warning(&format!(
                "Sun forecast from {} is older than {} hours, skipping auto-set update",
                sample.observed_at.format("%Y-%m-%d %H:%M UTC"),
                self.max_forecast_age.num_hours()
            ));
            return None;
        }
        Some(sample)
    }

    /// Retime every alarm in the map from the same sample.
    ///
    /// A failure for one alarm is logged and recorded in the report; the
    /// remaining alarms are still updated.
    pub fn bulk_update(
        &self,
        alarms_by_option: &BTreeMap<AutoSetOption, Vec<AlarmPrefs>>,
        sample: Option<&SunSample>,
        now: DateTime<Utc>,
    ) -> AutoSetOutcome {
        let Some(sample) = self.usable_sample(sample, now) else {
            return AutoSetOutcome::NoForecast;
        };

        let mut report = AutoSetReport::default();
        for alarms in alarms_by_option.values() {
            for prefs in alarms {
                let Some(time) = fire_time_for(prefs, sample) else {
                    continue;
                };
                match self.alarms.set_alarm_time(prefs.alarm_id(), time) {
                    Ok(()) => {
                        Log::log_debug(&format!(
                            "Auto-set alarm {} to {} ({})",
                            prefs.alarm_id(),
                            time,
                            prefs.auto_set_option
                        ));
                        report.updated.push((prefs.alarm_id().to_string(), time));
                    }
                    Err(e) => {
                        Log::log_warning(&format!(
                            "Failed to auto-set alarm {}: {}",
                            prefs.alarm_id(),
                            e
                        ));
                        report.failed.push(prefs.alarm_id().to_string());
                    }
                }
            }
        }
        AutoSetOutcome::Applied(report)
    }

    /// Retime one alarm right after it was created or edited.
    pub fn update_single(
        &self,
        prefs: &AlarmPrefs,
        sample: Option<&SunSample>,
        now: DateTime<Utc>,
    ) -> AutoSetOutcome {
        let mut map = BTreeMap::new();
        map.insert(prefs.auto_set_option, vec![prefs.clone()]);
        self.bulk_update(&map, sample, now)
    }

    /// Reload every auto-set alarm and apply a new sample to all of them.
    pub fn handle_sun_change(&self, sample: &SunSample, now: DateTime<Utc>) -> Result<AutoSetOutcome> {
        let grouped = self.prefs.auto_set_alarms()?;
        let total: usize = grouped.values().map(Vec::len).sum();
        Log::log_debug(&format!("Applying sun sample to {} auto-set alarm(s)", total));
        Ok(self.bulk_update(&grouped, Some(sample), now))
    }

    /// Whether a sweep time lies in `(last_sweep, now]`.
    pub fn is_sweep_due(&self, last_sweep: NaiveDateTime, now: NaiveDateTime) -> bool {
        if self.sweep_times.is_empty() || now <= last_sweep {
            return false;
        }
        if now - last_sweep >= Duration::days(1) {
            return true;
        }

        let mut day = last_sweep.date();
        while day <= now.date() {
            if self
                .sweep_times
                .iter()
                .map(|time| day.and_time(*time))
                .any(|sweep| sweep > last_sweep && sweep <= now)
            {
                return true;
            }
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }
        false
    }

    pub fn sweep_times(&self) -> &[NaiveTime] {
        &self.sweep_times
    }
}
