//! Schedule entries: a daily local time-of-day mapped to an action.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};

/// The action a schedule entry triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledAction {
    Scan,
    Clean,
    PurgePip,
    PurgeNpm,
}

impl ScheduledAction {
    pub const ALL: [Self; 4] = [Self::Scan, Self::Clean, Self::PurgePip, Self::PurgeNpm];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Clean => "clean",
            Self::PurgePip => "purge_pip",
            Self::PurgeNpm => "purge_npm",
        }
    }
}

impl fmt::Display for ScheduledAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduledAction {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| SweepError::InvalidConfig {
                details: format!(
                    "unknown scheduled action {s:?}; expected scan, clean, purge_pip or purge_npm"
                ),
            })
    }
}

/// One daily trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub action: ScheduledAction,
    /// `HH:MM`, 24-hour local time.
    pub time: String,
}

impl ScheduleEntry {
    pub fn new(name: impl Into<String>, action: ScheduledAction, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action,
            time: time.into(),
        }
    }

    /// Fallback label for an entry added without a name.
    pub fn default_name(existing: usize) -> String {
        format!("Task {}", existing + 1)
    }

    pub fn time_of_day(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.time).ok_or_else(|| SweepError::InvalidSchedule {
            name: self.name.clone(),
            details: format!("time {:?} is not HH:MM (00:00-23:59)", self.time),
        })
    }

    /// Reject entries whose time could never fire.
    pub fn validate(&self) -> Result<()> {
        self.time_of_day().map(|_| ())
    }

    /// Whether `now` falls in `[target, target + window)` for today's target.
    pub fn is_due(&self, now: NaiveDateTime, window: Duration) -> Result<bool> {
        let target = now.date().and_time(self.time_of_day()?);
        Ok(now >= target && now - target < window)
    }

    /// Key used to fire an entry at most once per calendar day.
    pub fn firing_key(&self, date: NaiveDate) -> (String, ScheduledAction, String, NaiveDate) {
        (self.name.clone(), self.action, self.time.clone(), date)
    }
}

fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let (h, m) = raw.trim().split_once(':')?;
    let digits = |s: &str, max_len: usize| {
        (1..=max_len).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits(h, 2) || m.len() != 2 || !digits(m, 2) {
        return None;
    }
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn window() -> Duration {
        Duration::seconds(30)
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_hhmm("02:30"), NaiveTime::from_hms_opt(2, 30, 0));
        assert_eq!(parse_hhmm("7:05"), NaiveTime::from_hms_opt(7, 5, 0));
        assert_eq!(parse_hhmm(" 23:59 "), NaiveTime::from_hms_opt(23, 59, 0));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["24:00", "12:60", "12:5", "1230", "ab:cd", "", ":30", "12:30:00", "-1:30"] {
            assert!(parse_hhmm(bad).is_none(), "{bad:?} should be rejected");
        }
        let entry = ScheduleEntry::new("Bad", ScheduledAction::Scan, "25:00");
        assert!(matches!(
            entry.validate(),
            Err(SweepError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn due_inside_trailing_window_only() {
        let entry = ScheduleEntry::new("Nightly", ScheduledAction::Clean, "02:30");
        assert!(entry.is_due(at(2, 30, 0), window()).unwrap());
        assert!(entry.is_due(at(2, 30, 10), window()).unwrap());
        assert!(entry.is_due(at(2, 30, 29), window()).unwrap());
        assert!(!entry.is_due(at(2, 30, 30), window()).unwrap());
        assert!(!entry.is_due(at(2, 31, 0), window()).unwrap());
        assert!(!entry.is_due(at(2, 29, 59), window()).unwrap());
    }

    #[test]
    fn action_names_round_trip() {
        for action in ScheduledAction::ALL {
            assert_eq!(action.as_str().parse::<ScheduledAction>().unwrap(), action);
        }
        assert_eq!(
            "purge-npm".parse::<ScheduledAction>().unwrap(),
            ScheduledAction::PurgeNpm
        );
        assert!("reboot".parse::<ScheduledAction>().is_err());
    }

    #[test]
    fn default_names_count_from_one() {
        assert_eq!(ScheduleEntry::default_name(0), "Task 1");
        assert_eq!(ScheduleEntry::default_name(4), "Task 5");
    }

    proptest! {
        #[test]
        fn due_iff_within_window(h in 0u32..24, m in 0u32..60, offset in -120i64..120) {
            let entry = ScheduleEntry::new("P", ScheduledAction::Scan, format!("{h:02}:{m:02}"));
            let target = at(h, m, 0);
            let now = target + Duration::seconds(offset);
            prop_assume!(now.date() == target.date());
            let due = entry.is_due(now, window()).unwrap();
            prop_assert_eq!(due, (0..30).contains(&offset));
        }
    }
}
