//! Skip prompt lifecycle.
//!
//! Per alarm, the skip activation status moves `Unknown` to `Activated` when
//! the user confirms a skip, or to `Disabled` when they decline or the window
//! closes without an answer. Only a save of the preferences brings it back to
//! `Unknown`, which happens once the occurrence has been decided at fire time.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::alarm::{AlarmDecision, AlarmManager};
use crate::logger::Log;
use crate::prefs::locks::KeyedLocks;
use crate::prefs::{AlarmPrefs, PreferenceManager, PreferenceStore, SkipActivationStatus};
use crate::skip::SkipDateResolver;

/// Result of checking whether the skip prompt should be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptDecision {
    /// Offer the prompt for the occurrence at `fire_date`.
    ShowPrompt {
        alarm_id: String,
        fire_date: NaiveDateTime,
        explanation: Option<String>,
    },
    /// A prompt for this alarm is already waiting for an answer.
    AlreadyPending,
    NoPrompt,
}

pub struct SkipActivationStateMachine<S: PreferenceStore> {
    prefs: Arc<PreferenceManager<S>>,
    resolver: Arc<SkipDateResolver>,
    alarms: Arc<dyn AlarmManager>,
    pending: Mutex<HashSet<String>>,
    /// Serializes answers to the prompt of the same alarm.
    answers: KeyedLocks,
}

impl<S: PreferenceStore> SkipActivationStateMachine<S> {
    pub fn new(
        prefs: Arc<PreferenceManager<S>>,
        resolver: Arc<SkipDateResolver>,
        alarms: Arc<dyn AlarmManager>,
    ) -> Self {
        Self {
            prefs,
            resolver,
            alarms,
            pending: Mutex::new(HashSet::new()),
            answers: KeyedLocks::new(),
        }
    }

    pub fn is_prompt_pending(&self, alarm_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(alarm_id)
    }

    fn take_pending(&self, alarm_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(alarm_id)
    }

    /// Decide whether to offer the skip prompt at `now`.
    ///
    /// The prompt is offered once per pending occurrence: repeated checks
    /// before the user answers report [`PromptDecision::AlreadyPending`].
    pub fn check_skip_window(&self, alarm_id: &str, now: NaiveDateTime) -> Result<PromptDecision> {
        let Some(prefs) = self.prefs.alarm_prefs(alarm_id)? else {
            return Ok(PromptDecision::NoPrompt);
        };
        if !prefs.skip_enabled || prefs.skip_activation_status != SkipActivationStatus::Unknown {
            return Ok(PromptDecision::NoPrompt);
        }

        let Some(fire_date) = self.alarms.next_fire_date(alarm_id)? else {
            return Ok(PromptDecision::NoPrompt);
        };
        if !self.resolver.should_skip(&prefs, fire_date, now.date())
            || !self.resolver.is_within_skip_window(&prefs, fire_date, now)
        {
            return Ok(PromptDecision::NoPrompt);
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(alarm_id.to_string()) {
            return Ok(PromptDecision::AlreadyPending);
        }

        Log::log_debug(&format!(
            "Offering skip prompt for alarm {} firing at {}",
            alarm_id, fire_date
        ));
        Ok(PromptDecision::ShowPrompt {
            alarm_id: alarm_id.to_string(),
            fire_date,
            explanation: self
                .resolver
                .skip_reason_explanation(&prefs, now.date()),
        })
    }

    /// The user chose to skip the next occurrence.
    ///
    /// The alarm is pushed to its following occurrence first. `Activated` is
    /// recorded only once that succeeded; on failure the status stays `Unknown`
    /// and the error is returned. When the preferences were saved while the
    /// alarm was being moved, the move is reverted and the newer save wins.
    pub fn confirm_skip(&self, alarm_id: &str) -> Result<()> {
        self.take_pending(alarm_id);
        self.answers.with_lock(alarm_id, || {
            let (current, generation) = self.prefs.alarm_prefs_with_generation(alarm_id)?;
            Self::ensure_unanswered(&current)?;

            let fire_date = self
                .alarms
                .next_fire_date(alarm_id)?
                .with_context(|| format!("Alarm {} has no scheduled occurrence to skip", alarm_id))?;
            let following = self
                .alarms
                .next_fire_date_after(alarm_id, fire_date)?
                .with_context(|| format!("Alarm {} has no occurrence after {}", alarm_id, fire_date))?;

            if let Err(e) = self.alarms.update_alarm(alarm_id, following) {
                Log::log_warning(&format!(
                    "Could not reschedule alarm {} to {}: {}",
                    alarm_id, following, e
                ));
                return Err(e.context(format!("Failed to skip alarm {}", alarm_id)));
            }

            let recorded = self.prefs.update_alarm_prefs_at(alarm_id, generation, |prefs| {
                Self::ensure_unanswered(prefs)?;
                Self::apply_answer(prefs, SkipActivationStatus::Activated, fire_date.date());
                Ok(())
            });
            if let Err(e) = recorded {
                if let Err(revert) = self.alarms.update_alarm(alarm_id, fire_date) {
                    Log::log_warning(&format!(
                        "Could not restore alarm {} to {}: {}",
                        alarm_id, fire_date, revert
                    ));
                }
                return Err(e.context(format!("Failed to skip alarm {}", alarm_id)));
            }

            Log::log_info(&format!(
                "Skipping alarm {} on {}, next occurrence {}",
                alarm_id,
                fire_date.date(),
                following
            ));
            Ok(())
        })
    }

    /// The user chose to keep the next occurrence.
    pub fn decline_skip(&self, alarm_id: &str) -> Result<()> {
        self.take_pending(alarm_id);
        self.disable(alarm_id)
    }

    /// The skip window elapsed without an answer. Returns whether a prompt was pending.
    pub fn skip_window_closed(&self, alarm_id: &str) -> Result<bool> {
        if !self.take_pending(alarm_id) {
            return Ok(false);
        }
        if let Err(e) = self.alarms.cancel_notification(alarm_id) {
            Log::log_warning(&format!(
                "Failed to withdraw skip prompt for alarm {}: {}",
                alarm_id, e
            ));
        }
        self.disable(alarm_id)?;
        Ok(true)
    }

    /// Hook for the host right before an alarm goes off.
    ///
    /// Once decided, the preferences are saved again so the next occurrence
    /// starts from `Unknown`.
    pub fn on_alarm_about_to_fire(
        &self,
        alarm_id: &str,
        candidate: NaiveDateTime,
    ) -> Result<AlarmDecision> {
        let Some(prefs) = self.prefs.alarm_prefs(alarm_id)? else {
            return Ok(AlarmDecision::Fire);
        };

        let decision = match prefs.skip_activation_status {
            SkipActivationStatus::Activated => {
                // The alarm was moved already; only an occurrence before the new date is skipped
                match self.alarms.next_fire_date(alarm_id)? {
                    Some(next) if candidate < next => AlarmDecision::Skip,
                    _ => AlarmDecision::Fire,
                }
            }
            SkipActivationStatus::Disabled => AlarmDecision::Fire,
            SkipActivationStatus::Unknown => {
                if self.skip_window_closed(alarm_id)? {
                    Log::log_debug(&format!(
                        "Skip prompt for alarm {} unanswered at fire time",
                        alarm_id
                    ));
                }
                AlarmDecision::Fire
            }
        };

        self.prefs.reset_skip_activation_status(alarm_id)?;

        Log::log_debug(&format!("Alarm {} at {}: {:?}", alarm_id, candidate, decision));
        Ok(decision)
    }

    fn disable(&self, alarm_id: &str) -> Result<()> {
        self.answers.with_lock(alarm_id, || {
            let occurrence = self.alarms.next_fire_date(alarm_id)?.map(|d| d.date());
            self.prefs.update_alarm_prefs(alarm_id, |prefs| {
                Self::ensure_unanswered(prefs)?;
                match occurrence {
                    Some(date) => Self::apply_answer(prefs, SkipActivationStatus::Disabled, date),
                    None => prefs.skip_activation_status = SkipActivationStatus::Disabled,
                }
                Ok(())
            })
        })
    }

    fn ensure_unanswered(prefs: &AlarmPrefs) -> Result<()> {
        if prefs.skip_activation_status != SkipActivationStatus::Unknown {
            anyhow::bail!(
                "Skip for alarm {} was already answered ({})",
                prefs.alarm_id(),
                prefs.skip_activation_status
            );
        }
        Ok(())
    }

    fn apply_answer(prefs: &mut AlarmPrefs, status: SkipActivationStatus, occurrence: NaiveDate) {
        prefs.skip_activation_status = status;
        if SkipDateResolver::consume_skip_date(prefs, occurrence) {
            Log::log_debug(&format!(
                "Consumed skip date {} for alarm {}",
                occurrence,
                prefs.alarm_id()
            ));
        }
    }
}
