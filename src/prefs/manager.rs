//! Preference access with per-alarm write serialization.
//!
//! Edits come from several unsynchronized triggers (user edits, skip prompt
//! answers, forecast callbacks, the scheduled auto-set sweep). The manager
//! serializes every read-modify-write cycle on the same alarm identifier while
//! letting different alarms proceed independently.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use super::locks::KeyedLocks;
use super::store::PreferenceStore;
use super::{AlarmPrefs, AutoSetOption, SkipActivationStatus};
use crate::logger::Log;

pub struct PreferenceManager<S: PreferenceStore> {
    store: S,
    locks: KeyedLocks,
    /// Bumped on every save or delete of an alarm, under that alarm's lock.
    generations: Mutex<HashMap<String, u64>>,
}

impl<S: PreferenceStore> PreferenceManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored preferences for an alarm, or `None` when nothing was ever saved.
    pub fn alarm_prefs(&self, alarm_id: &str) -> Result<Option<AlarmPrefs>> {
        self.store.get(alarm_id)
    }

    /// Stored preferences, or defaults (not persisted) when absent.
    pub fn alarm_prefs_or_default(&self, alarm_id: &str) -> Result<AlarmPrefs> {
        Ok(self
            .store
            .get(alarm_id)?
            .unwrap_or_else(|| AlarmPrefs::new(alarm_id)))
    }

    /// Stored preferences together with the save generation they belong to.
    pub fn alarm_prefs_with_generation(&self, alarm_id: &str) -> Result<(AlarmPrefs, u64)> {
        self.locks.with_lock(alarm_id, || {
            let prefs = self.alarm_prefs_or_default(alarm_id)?;
            Ok((prefs, self.generation(alarm_id)))
        })
    }

    /// Save preferences from an edit.
    ///
    /// Any save resets the skip activation status to `Unknown`, so a decision
    /// about one occurrence never leaks into the next.
    pub fn save_alarm_prefs(&self, prefs: &AlarmPrefs) -> Result<()> {
        self.locks.with_lock(prefs.alarm_id(), || {
            let mut prefs = prefs.clone();
            prefs.skip_activation_status = SkipActivationStatus::Unknown;
            self.store.save(&prefs)?;
            self.bump_generation(prefs.alarm_id());
            Ok(())
        })
    }

    /// Reset the stored skip activation status to `Unknown`, keeping every
    /// other field as currently stored. Does nothing when no record exists.
    pub fn reset_skip_activation_status(&self, alarm_id: &str) -> Result<()> {
        self.locks.with_lock(alarm_id, || {
            let Some(mut prefs) = self.store.get(alarm_id)? else {
                return Ok(());
            };
            prefs.skip_activation_status = SkipActivationStatus::Unknown;
            self.store.save(&prefs)?;
            self.bump_generation(alarm_id);
            Ok(())
        })
    }

    /// Delete an alarm's preferences when the backing alarm is deleted.
    pub fn delete_alarm(&self, alarm_id: &str) -> Result<()> {
        self.locks.with_lock(alarm_id, || {
            Log::log_debug(&format!("Deleting preferences for alarm {}", alarm_id));
            self.store.delete(alarm_id)?;
            self.bump_generation(alarm_id);
            Ok(())
        })
    }

    /// Read-modify-write one alarm's preferences under its lock.
    ///
    /// Defaults are used when nothing is stored. Nothing is written if `f`
    /// returns an error.
    pub fn update_alarm_prefs<T>(
        &self,
        alarm_id: &str,
        f: impl FnOnce(&mut AlarmPrefs) -> Result<T>,
    ) -> Result<T> {
        self.locks.with_lock(alarm_id, || {
            let mut prefs = self
                .store
                .get(alarm_id)?
                .unwrap_or_else(|| AlarmPrefs::new(alarm_id));
            let value = f(&mut prefs)?;
            self.store.save(&prefs)?;
            Ok(value)
        })
    }

    /// Like [`Self::update_alarm_prefs`], but fails without writing when the
    /// alarm was saved or deleted since `generation` was read.
    pub fn update_alarm_prefs_at<T>(
        &self,
        alarm_id: &str,
        generation: u64,
        f: impl FnOnce(&mut AlarmPrefs) -> Result<T>,
    ) -> Result<T> {
        self.update_alarm_prefs(alarm_id, |prefs| {
            let current = self.generation(alarm_id);
            if current != generation {
                anyhow::bail!(
                    "Preferences for alarm {} changed while the update was prepared",
                    alarm_id
                );
            }
            f(prefs)
        })
    }

    /// Record the user's answer to a skip prompt without touching other fields.
    pub fn set_skip_activation_status(
        &self,
        alarm_id: &str,
        status: SkipActivationStatus,
    ) -> Result<()> {
        self.update_alarm_prefs(alarm_id, |prefs| {
            prefs.skip_activation_status = status;
            Ok(())
        })
    }

    fn generation(&self, alarm_id: &str) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alarm_id)
            .copied()
            .unwrap_or(0)
    }

    fn bump_generation(&self, alarm_id: &str) {
        let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        // Kept after deletion so a recreated record never reuses an old value
        *generations.entry(alarm_id.to_string()).or_insert(0) += 1;
    }

    pub fn all_alarm_prefs(&self) -> Result<Vec<AlarmPrefs>> {
        self.store.all()
    }

    /// Every alarm with auto-set enabled, grouped by option.
    pub fn auto_set_alarms(&self) -> Result<BTreeMap<AutoSetOption, Vec<AlarmPrefs>>> {
        let mut grouped: BTreeMap<AutoSetOption, Vec<AlarmPrefs>> = BTreeMap::new();
        for prefs in self.store.all()? {
            if prefs.has_auto_set() {
                grouped.entry(prefs.auto_set_option).or_default().push(prefs);
            }
        }
        Ok(grouped)
    }

    pub fn has_auto_set_alarms(&self) -> Result<bool> {
        Ok(self.store.all()?.iter().any(AlarmPrefs::has_auto_set))
    }
}
