//! Configuration system for sleeper.
//!
//! Settings live in `sleeper.toml` under the user's config directory
//! (`$XDG_CONFIG_HOME/sleeper/sleeper.toml` on Linux). Every key is optional;
//! missing keys take the defaults from [`crate::constants`].
//!
//! ```toml
//! #[Sleeper configuration]
//! prefs_file = "alarms.toml"          # Alarm preference file, relative to this directory
//!
//! #[Holidays]
//! holiday_dir = "holidays"            # Directory of holidays-<CC>.toml catalog files
//! holiday_years = 10                  # Years generated by the built-in holiday rules
//! holiday_prune_policy = "retain"     # "retain" or "prune_passed"
//!
//! #[Auto-set]
//! latitude = 40.7128                  # Primary location for sunrise/sunset
//! longitude = -74.0060
//! timezone = "America/New_York"       # IANA name; system timezone when omitted
//! forecast_max_age_hours = 36         # Older sun samples are ignored
//! auto_set_sweep_times = ["00:00:00", "12:00:00"]
//! ```
//!
//! Values are validated on load and produce descriptive errors when out of range.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::logger::Log;
use crate::skip::HolidayPrunePolicy;

/// Settings loaded from `sleeper.toml`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    /// Alarm preference file. Relative paths resolve against the config directory.
    pub prefs_file: Option<String>,
    /// Directory holding `holidays-<CC>.toml` files, merged over the built-in catalog.
    pub holiday_dir: Option<String>,
    pub holiday_years: Option<u32>,
    pub holiday_prune_policy: Option<String>, // "retain" or "prune_passed"
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub forecast_max_age_hours: Option<u32>,
    pub auto_set_sweep_times: Option<Vec<String>>, // HH:MM:SS
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Write a commented default configuration to `path`.
    pub fn create_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let sweep_times = DEFAULT_AUTO_SET_SWEEP_TIMES
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(", ");

        let config_content = ConfigBuilder::new()
            .add_section("Sleeper configuration")
            .add_setting(
                "prefs_file",
                &format!("\"{}\"", DEFAULT_PREFS_FILE),
                "Alarm preference file, relative to this directory",
            )
            .add_section("Holidays")
            .add_setting(
                "holiday_years",
                &DEFAULT_HOLIDAY_YEARS.to_string(),
                &format!(
                    "Years generated by the built-in holiday rules ({}-{})",
                    MINIMUM_HOLIDAY_YEARS, MAXIMUM_HOLIDAY_YEARS
                ),
            )
            .add_setting(
                "holiday_prune_policy",
                &format!("\"{}\"", DEFAULT_HOLIDAY_PRUNE_POLICY),
                "Passed holiday selections: \"retain\" or \"prune_passed\"",
            )
            .add_section("Auto-set")
            .add_setting(
                "forecast_max_age_hours",
                &DEFAULT_FORECAST_MAX_AGE_HOURS.to_string(),
                &format!(
                    "Ignore sun samples older than this ({}-{} hours)",
                    MINIMUM_FORECAST_MAX_AGE_HOURS, MAXIMUM_FORECAST_MAX_AGE_HOURS
                ),
            )
            .add_setting(
                "auto_set_sweep_times",
                &format!("[{}]", sweep_times),
                "Times at which every auto-set alarm is refreshed",
            )
            .build();

        fs::write(path, config_content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        Log::log_indented(&format!("Created default config at {}", path.display()));
        Ok(())
    }

    fn apply_defaults_and_validate_fields(config: &mut Config) -> Result<()> {
        if config.prefs_file.is_none() {
            config.prefs_file = Some(DEFAULT_PREFS_FILE.to_string());
        }

        if let Some(years) = config.holiday_years {
            if !(MINIMUM_HOLIDAY_YEARS..=MAXIMUM_HOLIDAY_YEARS).contains(&years) {
                anyhow::bail!(
                    "holiday_years must be between {} and {} (got {})",
                    MINIMUM_HOLIDAY_YEARS,
                    MAXIMUM_HOLIDAY_YEARS,
                    years
                );
            }
        } else {
            config.holiday_years = Some(DEFAULT_HOLIDAY_YEARS);
        }

        match &config.holiday_prune_policy {
            Some(policy) => {
                policy
                    .parse::<HolidayPrunePolicy>()
                    .context("Invalid holiday_prune_policy in config")?;
            }
            None => config.holiday_prune_policy = Some(DEFAULT_HOLIDAY_PRUNE_POLICY.to_string()),
        }

        if let Some(hours) = config.forecast_max_age_hours {
            if !(MINIMUM_FORECAST_MAX_AGE_HOURS..=MAXIMUM_FORECAST_MAX_AGE_HOURS).contains(&hours) {
                anyhow::bail!(
                    "forecast_max_age_hours must be between {} and {} (got {})",
                    MINIMUM_FORECAST_MAX_AGE_HOURS,
                    MAXIMUM_FORECAST_MAX_AGE_HOURS,
                    hours
                );
            }
        } else {
            config.forecast_max_age_hours = Some(DEFAULT_FORECAST_MAX_AGE_HOURS);
        }

        match &config.auto_set_sweep_times {
            Some(times) => {
                for time in times {
                    NaiveTime::parse_from_str(time, "%H:%M:%S").with_context(|| {
                        format!("Invalid auto_set_sweep_times entry '{}'. Use HH:MM:SS format", time)
                    })?;
                }
            }
            None => {
                config.auto_set_sweep_times = Some(
                    DEFAULT_AUTO_SET_SWEEP_TIMES
                        .iter()
                        .map(|t| t.to_string())
                        .collect(),
                );
            }
        }

        if let Some(lat) = config.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                anyhow::bail!("Latitude must be between -90 and 90 degrees (got {})", lat);
            }
        }
        if let Some(lon) = config.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                anyhow::bail!(
                    "Longitude must be between -180 and 180 degrees (got {})",
                    lon
                );
            }
        }
        if config.latitude.is_some() != config.longitude.is_some() {
            anyhow::bail!("latitude and longitude must be set together");
        }

        if let Some(tz) = &config.timezone {
            tz.parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("Invalid timezone '{}' in config: {}", tz, e))?;
        }

        Ok(())
    }

    /// Load from a specific path. Does NOT create a default config if the path doesn't exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Self::apply_defaults_and_validate_fields(&mut config)?;
        Ok(config)
    }

    /// Load from the default location, creating a default config first if needed.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)
                .context("Failed to create default config during load")?;
        }

        Self::load_from_path(&config_path).with_context(|| {
            Log::log_pipe();
            format!(
                "Failed to load configuration from {}",
                config_path.display()
            )
        })
    }

    fn resolve(config_path: &Path, value: &str) -> PathBuf {
        let path = PathBuf::from(value);
        if path.is_absolute() {
            return path;
        }
        match config_path.parent() {
            Some(dir) => dir.join(path),
            None => path,
        }
    }

    /// Preference file location for a config loaded from `config_path`.
    pub fn prefs_path(&self, config_path: &Path) -> PathBuf {
        Self::resolve(
            config_path,
            self.prefs_file.as_deref().unwrap_or(DEFAULT_PREFS_FILE),
        )
    }

    pub fn holiday_dir_path(&self, config_path: &Path) -> Option<PathBuf> {
        self.holiday_dir
            .as_deref()
            .map(|dir| Self::resolve(config_path, dir))
    }

    pub fn holiday_years(&self) -> u32 {
        self.holiday_years.unwrap_or(DEFAULT_HOLIDAY_YEARS)
    }

    pub fn prune_policy(&self) -> HolidayPrunePolicy {
        self.holiday_prune_policy
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_default()
    }

    pub fn timezone(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|tz| {
                tz.parse::<Tz>()
                    .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", tz, e))
            })
            .transpose()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn forecast_max_age(&self) -> Duration {
        Duration::hours(i64::from(
            self.forecast_max_age_hours
                .unwrap_or(DEFAULT_FORECAST_MAX_AGE_HOURS),
        ))
    }

    pub fn sweep_times(&self) -> Vec<NaiveTime> {
        match &self.auto_set_sweep_times {
            Some(times) => times
                .iter()
                .filter_map(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
                .collect(),
            None => DEFAULT_AUTO_SET_SWEEP_TIMES
                .iter()
                .filter_map(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
                .collect(),
        }
    }

    pub fn log_config(&self, config_path: &Path) {
        Log::log_block_start(&format!(
            "Loaded configuration from {}",
            config_path.display()
        ));
        Log::log_indented(&format!(
            "Preference file: {}",
            self.prefs_path(config_path).display()
        ));
        if let Some(dir) = self.holiday_dir_path(config_path) {
            Log::log_indented(&format!("Holiday directory: {}", dir.display()));
        }
        Log::log_indented(&format!("Holiday years: {}", self.holiday_years()));
        Log::log_indented(&format!("Holiday prune policy: {}", self.prune_policy()));

        if let Some((lat, lon)) = self.coordinates() {
            let lat_dir = if lat >= 0.0 { "N" } else { "S" };
            let lon_dir = if lon >= 0.0 { "E" } else { "W" };
            Log::log_indented(&format!(
                "Location: {:.4}°{}, {:.4}°{}",
                lat.abs(),
                lat_dir,
                lon.abs(),
                lon_dir
            ));
        } else {
            Log::log_indented("Location: not configured");
        }
        Log::log_indented(&format!(
            "Forecast max age: {} hours",
            self.forecast_max_age().num_hours()
        ));
    }
}

/// Builder for creating dynamically-aligned configuration files.
///
/// Comments are padded to a common column computed from the longest setting line.
struct ConfigBuilder {
    entries: Vec<EntryType>,
}

enum EntryType {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(EntryType::Section(format!("#[{}]", title)));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(EntryType::Setting {
            line: format!("{} = {}", key, value),
            comment: format!("# {}", comment),
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1; // one space between setting and comment

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                EntryType::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{}{}{}", line, padding, comment));
                }
            }
        }

        result.push(String::new());
        result.join("\n")
    }
}
