//! Sunrise/sunset monitoring for auto-set alarms.
//!
//! A [`ForecastProvider`] publishes sunrise/sunset samples for the device's
//! primary location. [`SunObserver`] owns the subscription to that provider,
//! holding it only while at least one alarm uses auto-set, and republishes a
//! sample over its channel only when the sunrise/sunset pair actually changed.

pub mod solar;

pub use solar::SolarForecastProvider;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use crate::logger::Log;

/// The two solar events an alarm can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl SunEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SunEvent::Sunrise => "sunrise",
            SunEvent::Sunset => "sunset",
        }
    }
}

/// One forecast result: today's sunrise and sunset at the primary location.
#[derive(Debug, Clone, PartialEq)]
pub struct SunSample {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
    /// IANA name of the location's timezone, or `local`.
    pub timezone: String,
    pub observed_at: DateTime<Utc>,
}

impl SunSample {
    /// Local time-of-day of the given event.
    pub fn local_time(&self, event: SunEvent) -> NaiveTime {
        match event {
            SunEvent::Sunrise => self.sunrise.time(),
            SunEvent::Sunset => self.sunset.time(),
        }
    }

    /// Whether the sample is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.observed_at > max_age
    }

    /// Same sunrise/sunset pair, ignoring when it was observed.
    pub fn same_times(&self, other: &SunSample) -> bool {
        self.sunrise == other.sunrise
            && self.sunset == other.sunset
            && self.timezone == other.timezone
    }
}

/// Handle returned by [`ForecastProvider::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

pub type ForecastCallback = Box<dyn Fn(SunSample) + Send + Sync>;

/// External source of sunrise/sunset forecasts.
#[cfg_attr(test, mockall::automock)]
pub trait ForecastProvider: Send + Sync {
    /// Register a callback invoked with every new forecast.
    fn add_observer(&self, callback: ForecastCallback) -> Result<ObserverId>;

    /// Unregister a callback. Unknown ids are ignored.
    fn remove_observer(&self, id: ObserverId);
}

/// Deduplicating subscriber to a [`ForecastProvider`].
pub struct SunObserver {
    provider: Arc<dyn ForecastProvider>,
    subscription: Mutex<Option<ObserverId>>,
    last_published: Arc<Mutex<Option<SunSample>>>,
    sender: Sender<SunSample>,
}

impl SunObserver {
    /// Create an observer and the channel on which changed samples arrive.
    pub fn new(provider: Arc<dyn ForecastProvider>) -> (Self, Receiver<SunSample>) {
        let (sender, receiver) = mpsc::channel();
        let observer = Self {
            provider,
            subscription: Mutex::new(None),
            last_published: Arc::new(Mutex::new(None)),
            sender,
        };
        (observer, receiver)
    }

    /// Subscribe to the provider if any alarm uses auto-set.
    ///
    /// Returns whether a subscription is held afterwards. Calling this while
    /// already subscribed keeps the existing subscription.
    pub fn start_monitoring(&self, has_auto_set_alarms: bool) -> Result<bool> {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !has_auto_set_alarms {
            Log::log_debug("No auto-set alarms, not monitoring sun changes");
            return Ok(subscription.is_some());
        }
        if subscription.is_some() {
            return Ok(true);
        }

        let last_published = Arc::clone(&self.last_published);
        let sender = self.sender.clone();
        let id = self.provider.add_observer(Box::new(move |sample| {
            if let Some(sample) = publish_if_changed(&last_published, sample) {
                if sender.send(sample).is_err() {
                    Log::log_debug("Sun sample receiver dropped, discarding update");
                }
            }
        }))?;

        Log::log_debug(&format!("Started monitoring sun changes ({:?})", id));
        *subscription = Some(id);
        Ok(true)
    }

    /// Release the provider subscription, if held.
    ///
    /// The cached sample is forgotten, so the first sample after the next
    /// [`Self::start_monitoring`] is always published.
    pub fn stop_monitoring(&self) {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = subscription.take() {
            self.provider.remove_observer(id);
            *self
                .last_published
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
            Log::log_debug(&format!("Stopped monitoring sun changes ({:?})", id));
        }
    }

    /// Acquire or release the subscription to match the number of auto-set alarms.
    pub fn set_auto_set_alarm_count(&self, count: usize) -> Result<()> {
        if count == 0 {
            self.stop_monitoring();
        } else {
            self.start_monitoring(true)?;
        }
        Ok(())
    }

    pub fn is_monitoring(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The most recently published sample of the current subscription.
    pub fn latest(&self) -> Option<SunSample> {
        self.last_published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for SunObserver {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// Record `sample` and return it if its sunrise/sunset pair differs from the last one.
fn publish_if_changed(
    last_published: &Mutex<Option<SunSample>>,
    sample: SunSample,
) -> Option<SunSample> {
    let mut last = last_published
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if last.as_ref().is_some_and(|prev| prev.same_times(&sample)) {
        Log::log_debug("Sun times unchanged, skipping republish");
        return None;
    }

    Log::log_debug(&format!(
        "Sun times changed: sunrise {} sunset {}",
        sample.sunrise.format("%H:%M"),
        sample.sunset.format("%H:%M")
    ));
    *last = Some(sample.clone());
    Some(sample)
}
