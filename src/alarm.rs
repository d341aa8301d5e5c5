//! The external alarm manager as seen from sleeper.
//!
//! Sleeper never fires or cancels alarms itself. Everything it needs from the
//! host's alarm system goes through [`AlarmManager`], and everything the host
//! needs back is an [`AlarmDecision`].

use anyhow::Result;
use chrono::{NaiveDateTime, NaiveTime};
use std::fmt;

/// Local time-of-day an alarm is set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmTime {
    pub hour: u32,
    pub minute: u32,
}

impl AlarmTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            anyhow::bail!("Invalid alarm time {:02}:{:02}", hour, minute);
        }
        Ok(Self { hour, minute })
    }

    pub fn to_naive_time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// What the hook layer should do with an alarm that is about to go off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmDecision {
    Fire,
    Skip,
}

/// Operations sleeper requests from the host's alarm system.
#[cfg_attr(test, mockall::automock)]
pub trait AlarmManager: Send + Sync {
    /// The next scheduled fire date of an alarm, or `None` if it is not scheduled.
    fn next_fire_date(&self, alarm_id: &str) -> Result<Option<NaiveDateTime>>;

    /// The first scheduled occurrence strictly after `after`.
    fn next_fire_date_after(
        &self,
        alarm_id: &str,
        after: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>>;

    /// Push an alarm's next fire date to `new_fire_date`.
    fn update_alarm(&self, alarm_id: &str, new_fire_date: NaiveDateTime) -> Result<()>;

    /// Retime an alarm to a new local time-of-day.
    fn set_alarm_time(&self, alarm_id: &str, time: AlarmTime) -> Result<()>;

    /// Withdraw any pending skip prompt notification for an alarm.
    fn cancel_notification(&self, alarm_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_time_bounds() {
        assert!(AlarmTime::new(23, 59).is_ok());
        assert!(AlarmTime::new(24, 0).is_err());
        assert!(AlarmTime::new(0, 60).is_err());
        assert_eq!(AlarmTime::new(5, 7).unwrap().to_string(), "05:07");
        assert_eq!(
            AlarmTime::new(5, 7).unwrap().to_naive_time(),
            NaiveTime::from_hms_opt(5, 7, 0)
        );
    }
}
