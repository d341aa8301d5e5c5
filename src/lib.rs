//! # Sleeper
//!
//! Per-alarm overrides for an alarm clock: a custom snooze duration, skipping
//! the next occurrence on selected dates and holidays, and retiming alarms to
//! sunrise or sunset.
//!
//! Sleeper decides; the host acts. Firing alarms, showing prompts and locating
//! the device belong to the host and are reached through the [`alarm::AlarmManager`]
//! and [`sun::ForecastProvider`] traits.
//!
//! ## Architecture
//!
//! - **prefs**: Per-alarm preference model, persisted store, per-alarm write serialization
//! - **holiday**: Per-country holiday catalog, built-in and file based
//! - **skip**: Next skip date resolution and skip window checks
//! - **activation**: Skip prompt state machine and the fire/skip hook
//! - **sun**: Sun samples, forecast providers and the deduplicating observer
//! - **autoset**: Sunrise/sunset fire time computation and bulk updates
//! - **alarm**: The host alarm manager interface
//! - **config**: Configuration loading, validation, and default generation
//! - **constants**: Application-wide constants and defaults
//! - **logger**: Structured logging with visual formatting
//! - **args**: Command-line parsing for the `sleeper` binary

pub mod activation;
pub mod alarm;
pub mod args;
pub mod autoset;
pub mod config;
pub mod constants;
pub mod holiday;
pub mod logger;
pub mod prefs;
pub mod skip;
pub mod sun;

// Re-export important types for easier access
pub use activation::{PromptDecision, SkipActivationStateMachine};
pub use alarm::{AlarmDecision, AlarmManager, AlarmTime};
pub use autoset::{AutoSetOutcome, AutoSetReport, AutoSetScheduler, compute_fire_time};
pub use config::Config;
pub use holiday::{Country, Holiday, HolidayCatalog};
pub use logger::{Log, LogLevel};
pub use prefs::{AlarmPrefs, PreferenceManager, PreferenceStore};
pub use skip::{HolidayPrunePolicy, SkipDateResolver, SkipReason};
pub use sun::{ForecastProvider, SunEvent, SunObserver, SunSample};
