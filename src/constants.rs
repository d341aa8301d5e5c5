//! Application constants and default values for sleeper.
//!
//! This module contains the per-alarm preference defaults, configuration
//! defaults, validation limits, and file naming used throughout the crate.

// ═══ Alarm Preference Defaults ═══
// Applied when an alarm has no stored preferences or a stored key is missing

pub const DEFAULT_SNOOZE_HOUR: u32 = 0;
pub const DEFAULT_SNOOZE_MINUTE: u32 = 9; // matches the stock 9-minute snooze
pub const DEFAULT_SNOOZE_SECOND: u32 = 0;
pub const DEFAULT_SKIP_ENABLED: bool = false;
pub const DEFAULT_SKIP_HOUR: u32 = 0;
pub const DEFAULT_SKIP_MINUTE: u32 = 30; // prompt 30 minutes before the alarm fires
pub const DEFAULT_SKIP_SECOND: u32 = 0;
pub const DEFAULT_AUTO_SET_OFFSET_HOUR: u32 = 1;
pub const DEFAULT_AUTO_SET_OFFSET_MINUTE: u32 = 0;

// ═══ Persistence ═══

pub const PREFS_SCHEMA_VERSION: u32 = 2; // 2 added the auto-set fields
pub const DEFAULT_PREFS_FILE: &str = "alarms.toml";
pub const PREFS_LOCK_SUFFIX: &str = "lock";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const HOLIDAY_FILE_PREFIX: &str = "holidays-";

// ═══ Configuration Defaults ═══

pub const CONFIG_DIR_NAME: &str = "sleeper";
pub const CONFIG_FILE_NAME: &str = "sleeper.toml";
pub const DEFAULT_HOLIDAY_YEARS: u32 = 10;
pub const DEFAULT_HOLIDAY_PRUNE_POLICY: &str = "retain";
pub const DEFAULT_FORECAST_MAX_AGE_HOURS: u32 = 36;
pub const DEFAULT_AUTO_SET_SWEEP_TIMES: &[&str] = &["00:00:00", "12:00:00"]; // midnight and noon

// ═══ Validation Limits ═══

pub const MINIMUM_HOLIDAY_YEARS: u32 = 1;
pub const MAXIMUM_HOLIDAY_YEARS: u32 = 100;
pub const MINIMUM_FORECAST_MAX_AGE_HOURS: u32 = 1;
pub const MAXIMUM_FORECAST_MAX_AGE_HOURS: u32 = 72;
pub const MAXIMUM_CLOCK_DURATION_HOUR: u32 = 23; // durations are bounded to a day
pub const MINUTES_PER_DAY: i64 = 24 * 60;

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;
