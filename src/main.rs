use anyhow::{Context, Result};
use chrono::{Datelike, Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use sleeper::args::{self, CliAction, ParsedArgs};
use sleeper::autoset::fire_time_for;
use sleeper::config::Config;
use sleeper::constants::EXIT_FAILURE;
use sleeper::holiday::{Country, HolidayCatalog};
use sleeper::logger::Log;
use sleeper::prefs::{AlarmPrefs, FilePreferenceStore, PreferenceManager};
use sleeper::skip::{SkipDateResolver, skip_date_label};
use sleeper::sun::SolarForecastProvider;

/// Services shared by every command, built once from the configuration.
struct App {
    config: Config,
    config_path: PathBuf,
    prefs: PreferenceManager<FilePreferenceStore>,
    resolver: SkipDateResolver,
}

impl App {
    fn load() -> Result<Self> {
        let config_path = Config::get_config_path()?;
        let config = Config::load()?;
        if Log::is_debug() {
            config.log_config(&config_path);
        }

        let prefs_path = config.prefs_path(&config_path);
        Log::log_debug(&format!("Using preference file {}", prefs_path.display()));
        let prefs = PreferenceManager::new(FilePreferenceStore::new(prefs_path));

        let mut catalog = HolidayCatalog::builtin(Local::now().year(), config.holiday_years());
        if let Some(dir) = config.holiday_dir_path(&config_path) {
            if dir.is_dir() {
                catalog = catalog.load_dir(&dir)?;
            } else {
                Log::log_warning(&format!(
                    "Holiday directory {} does not exist, using built-in holidays only",
                    dir.display()
                ));
            }
        }
        let resolver = SkipDateResolver::new(Arc::new(catalog), config.prune_policy());

        Ok(Self {
            config,
            config_path,
            prefs,
            resolver,
        })
    }

    fn describe(&self, prefs: &AlarmPrefs) {
        let today = Local::now().date_naive();

        Log::log_block_start(&format!("Alarm {}", prefs.alarm_id()));
        Log::log_indented(&format!("Snooze time: {}", prefs.snooze_time));
        if prefs.skip_enabled {
            Log::log_indented(&format!("Skip prompt: {} before firing", prefs.skip_time));
        } else {
            Log::log_indented("Skip prompt: disabled");
        }
        Log::log_indented(&format!(
            "Skip activation: {}",
            prefs.skip_activation_status
        ));
        Log::log_indented(&format!(
            "Skip dates: {}",
            prefs.total_selected_dates_summary()
        ));
        match self.resolver.next_skip_date(prefs, today) {
            Some(date) => Log::log_indented(&format!(
                "Next skip date: {}",
                skip_date_label(date, today)
            )),
            None => Log::log_indented("Next skip date: none"),
        }
        if let Some(explanation) = self.resolver.skip_reason_explanation(prefs, today) {
            Log::log_indented(&explanation);
        }
        Log::log_indented(&prefs.auto_set_explanation());
    }

    fn run_overview(&self) -> Result<()> {
        let alarms = self.prefs.all_alarm_prefs()?;
        if alarms.is_empty() {
            Log::log_block_start("No alarm preferences stored yet");
            return Ok(());
        }
        for prefs in &alarms {
            self.describe(prefs);
        }
        Ok(())
    }

    fn run_status(&self, alarm_id: &str) -> Result<()> {
        let prefs = match self.prefs.alarm_prefs(alarm_id)? {
            Some(prefs) => prefs,
            None => {
                Log::log_block_start(&format!(
                    "No preferences stored for {}, showing defaults",
                    alarm_id
                ));
                AlarmPrefs::new(alarm_id)
            }
        };
        self.describe(&prefs);
        Ok(())
    }

    fn run_holidays(&self, country_code: &str) -> Result<()> {
        let country = Country::from_code(country_code)
            .with_context(|| format!("Unknown country code '{}'", country_code))?;
        let today = Local::now().date_naive();
        let holidays = self.resolver.catalog().holidays(country);

        Log::log_block_start(&format!("{} holidays ({})", country, country.code()));
        if holidays.is_empty() {
            Log::log_indented("No holiday data available for this country");
            return Ok(());
        }
        for holiday in holidays {
            match holiday.next_date(today) {
                Some(date) => Log::log_indented(&format!(
                    "{}: {}",
                    holiday.name,
                    skip_date_label(date, today)
                )),
                None => Log::log_indented(&format!("{}: no upcoming date", holiday.name)),
            }
        }
        Ok(())
    }

    fn run_sun(&self) -> Result<()> {
        let (latitude, longitude) = self.config.coordinates().with_context(|| {
            format!(
                "Set latitude and longitude in {} to use auto-set",
                self.config_path.display()
            )
        })?;
        let provider = SolarForecastProvider::new(latitude, longitude, self.config.timezone()?)?;
        let sample = provider.sample_for_date(Local::now().date_naive(), Utc::now())?;

        Log::log_block_start(&format!("Sun times ({})", sample.timezone));
        Log::log_indented(&format!("Sunrise: {}", sample.sunrise.format("%H:%M")));
        Log::log_indented(&format!("Sunset: {}", sample.sunset.format("%H:%M")));

        let grouped = self.prefs.auto_set_alarms()?;
        if grouped.is_empty() {
            Log::log_block_start("No auto-set alarms");
            return Ok(());
        }
        for (option, alarms) in &grouped {
            Log::log_block_start(&format!("Auto-set to {}", option));
            for prefs in alarms {
                if let Some(time) = fire_time_for(prefs, &sample) {
                    Log::log_indented(&format!("{}: {}", prefs.alarm_id(), time));
                }
            }
        }
        Ok(())
    }

    fn run_prune(&self) -> Result<()> {
        let today = Local::now().date_naive();
        let mut pruned = 0;

        for prefs in self.prefs.all_alarm_prefs()? {
            let mut candidate = prefs.clone();
            if !self.resolver.prune(&mut candidate, today) {
                continue;
            }
            // Pruning is not an edit, so the activation status is kept
            self.prefs.update_alarm_prefs(prefs.alarm_id(), |stored| {
                self.resolver.prune(stored, today);
                Ok(())
            })?;
            pruned += 1;
            Log::log_indented(&format!("Pruned skip dates of {}", prefs.alarm_id()));
        }

        Log::log_block_start(&format!(
            "Pruned {} alarm(s) with policy {}",
            pruned,
            self.resolver.policy()
        ));
        Ok(())
    }
}

fn run(action: CliAction) -> Result<()> {
    let debug_enabled = match &action {
        CliAction::Run { debug_enabled }
        | CliAction::Status { debug_enabled, .. }
        | CliAction::Holidays { debug_enabled, .. }
        | CliAction::Sun { debug_enabled }
        | CliAction::Prune { debug_enabled } => *debug_enabled,
        _ => false,
    };
    Log::set_debug(debug_enabled);
    Log::log_version();

    let app = App::load()?;
    match action {
        CliAction::Status { alarm_id, .. } => app.run_status(&alarm_id)?,
        CliAction::Holidays { country_code, .. } => app.run_holidays(&country_code)?,
        CliAction::Sun { .. } => app.run_sun()?,
        CliAction::Prune { .. } => app.run_prune()?,
        _ => app.run_overview()?,
    }

    Log::log_end();
    Ok(())
}

fn main() -> Result<()> {
    match ParsedArgs::from_env().action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        action => run(action),
    }
}
