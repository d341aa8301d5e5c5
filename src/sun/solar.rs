//! Forecast provider backed by local solar calculations.
//!
//! Computes sunrise and sunset (sun at 0° elevation) for fixed coordinates with
//! the `sunrise` crate, converts them into the configured timezone, and pushes
//! the sample to every registered observer on [`SolarForecastProvider::refresh`].

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::{ForecastCallback, ForecastProvider, ObserverId, SunSample};
use crate::logger::Log;

pub struct SolarForecastProvider {
    latitude: f64,
    longitude: f64,
    timezone: Option<Tz>,
    observers: Mutex<BTreeMap<ObserverId, Arc<dyn Fn(SunSample) + Send + Sync>>>,
    next_id: AtomicU64,
}

impl SolarForecastProvider {
    /// Create a provider for the given coordinates.
    ///
    /// When `timezone` is `None`, times are expressed in the system's local timezone.
    pub fn new(latitude: f64, longitude: f64, timezone: Option<Tz>) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            anyhow::bail!(
                "Invalid latitude: {}. Must be between -90 and 90 degrees",
                latitude
            );
        }
        if !(-180.0..=180.0).contains(&longitude) {
            anyhow::bail!(
                "Invalid longitude: {}. Must be between -180 and 180 degrees",
                longitude
            );
        }
        if Coordinates::new(latitude, longitude).is_none() {
            anyhow::bail!("Failed to create coordinates");
        }

        Ok(Self {
            latitude,
            longitude,
            timezone,
            observers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Sunrise and sunset for `date` at this provider's location.
    ///
    /// Fails when the sun does not both rise and set that day (polar day/night).
    pub fn sample_for_date(&self, date: NaiveDate, observed_at: DateTime<Utc>) -> Result<SunSample> {
        let coordinates = Coordinates::new(self.latitude, self.longitude)
            .ok_or_else(|| anyhow::anyhow!("Failed to create coordinates"))?;
        let solar_day = SolarDay::new(coordinates, date);
        let sunrise_utc = solar_day.event_time(SolarEvent::Sunrise);
        let sunset_utc = solar_day.event_time(SolarEvent::Sunset);

        if sunset_utc <= sunrise_utc {
            anyhow::bail!(
                "No distinct sunrise and sunset on {} at ({:.4}, {:.4})",
                date,
                self.latitude,
                self.longitude
            );
        }

        let (sunrise, sunset, timezone) = match self.timezone {
            Some(tz) => (
                sunrise_utc.with_timezone(&tz).fixed_offset(),
                sunset_utc.with_timezone(&tz).fixed_offset(),
                tz.name().to_string(),
            ),
            None => (
                sunrise_utc.with_timezone(&Local).fixed_offset(),
                sunset_utc.with_timezone(&Local).fixed_offset(),
                "local".to_string(),
            ),
        };

        Ok(SunSample {
            sunrise,
            sunset,
            timezone,
            observed_at,
        })
    }

    /// Compute the sample for `date` and deliver it to every observer.
    pub fn refresh(&self, date: NaiveDate) -> Result<SunSample> {
        let sample = self.sample_for_date(date, Utc::now())?;
        // Callbacks run unlocked so they may add or remove observers
        let callbacks: Vec<_> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        Log::log_debug(&format!(
            "Publishing sun sample for {} to {} observer(s)",
            date,
            callbacks.len()
        ));
        for callback in callbacks {
            callback(sample.clone());
        }
        Ok(sample)
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ForecastProvider for SolarForecastProvider {
    fn add_observer(&self, callback: ForecastCallback) -> Result<ObserverId> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::from(callback));
        Ok(id)
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}
