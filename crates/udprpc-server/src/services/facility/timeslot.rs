//! Weekdays, wall-clock times and booking slots.

use std::fmt;

use serde::Deserialize;
use udprpc_core::error::{Result, RpcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Zero-based, Monday first.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RpcError::Handler(format!("Invalid day: {s}")))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hour and minute within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(RpcError::Handler(format!(
                "Invalid time {hour:02}:{minute:02}"
            )));
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// `"HH:MM"`, as written in the config file.
    pub fn parse_hhmm(s: &str) -> Result<Self> {
        let bad = || RpcError::BadRequest(format!("invalid time {s:?}, expected HH:MM"));
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let hour = h.parse().map_err(|_| bad())?;
        let minute = m.parse().map_err(|_| bad())?;
        Self::new(hour, minute).map_err(|_| bad())
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }
}

/// Renders as `HHMM`.
impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.hour, self.minute)
    }
}

/// Half-open interval `[start, end)` on one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSlot {
    pub day: Weekday,
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeSlot {
    /// `start` must be strictly before `end`.
    pub fn new(day: Weekday, start: ClockTime, end: ClockTime) -> Result<Self> {
        if start >= end {
            return Err(RpcError::Handler(format!(
                "Invalid time slot {start} - {end}: start must be before end"
            )));
        }
        Ok(Self { day, start, end })
    }

    /// Two slots on the same day overlap unless one ends at or before the
    /// other starts.
    pub fn conflicts_with(&self, other: &TimeSlot) -> bool {
        self.day == other.day && !(self.end <= other.start || other.end <= self.start)
    }

    /// True when the whole slot lies in `[open, close]`.
    pub fn within(&self, open: ClockTime, close: ClockTime) -> bool {
        open <= self.start && self.end <= close
    }
}

/// Renders as `HHMM - HHMM`.
impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}
