//! Time-of-day handling for availability windows.
//!
//! The backend stores slot times as "HH:MM" or "HH:MM:SS" strings in local
//! wall-clock time. There is no timezone and no midnight rollover: a window
//! is always read within a single calendar day.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Rendered in place of a time that cannot be parsed.
pub const UNPARSEABLE_TIME: &str = "--:--";

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A validated wall-clock time of day.
///
/// Ordering is chronological, so two `ClockTime`s can be compared directly
/// to decide whether a slot has ended.
///
/// # Examples
///
/// ```
/// use ride_server::domain::ClockTime;
///
/// let t = ClockTime::parse("14:30").unwrap();
/// assert_eq!(t.to_string(), "14:30");
/// assert_eq!(t.to_12h(), "2:30 PM");
///
/// // Seconds are accepted
/// assert!(ClockTime::parse("14:30:15").is_ok());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Parse a time from "HH:MM" or "HH:MM:SS".
    ///
    /// # Examples
    ///
    /// ```
    /// use ride_server::domain::ClockTime;
    ///
    /// assert!(ClockTime::parse("00:00").is_ok());
    /// assert!(ClockTime::parse("23:59:59").is_ok());
    ///
    /// assert!(ClockTime::parse("1430").is_err());
    /// assert!(ClockTime::parse("9:30").is_err());
    /// assert!(ClockTime::parse("24:00").is_err());
    /// assert!(ClockTime::parse("12:00:60").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let bytes = s.as_bytes();

        if bytes.len() != 5 && bytes.len() != 8 {
            return Err(TimeError::new("expected HH:MM or HH:MM:SS format"));
        }

        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        if hour > 23 {
            return Err(TimeError::new("hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        let second = if bytes.len() == 8 {
            if bytes[5] != b':' {
                return Err(TimeError::new("expected colon at position 5"));
            }
            let second = parse_two_digits(&bytes[6..8])
                .ok_or_else(|| TimeError::new("invalid second digits"))?;
            if second > 59 {
                return Err(TimeError::new("second must be 0-59"));
            }
            second
        } else {
            0
        };

        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(|| TimeError::new("invalid time"))
    }

    /// Construct from hour and minute, if in range.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Wrap a chrono time.
    pub fn from_naive(time: NaiveTime) -> Self {
        Self(time)
    }

    /// The underlying chrono time.
    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }

    /// Returns the hour (0-23).
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    /// Minutes since midnight, ignoring seconds.
    pub fn minutes_from_midnight(&self) -> u32 {
        self.hour() * 60 + self.minute()
    }

    /// Render on a 12-hour clock with an AM/PM suffix, e.g. "9:05 AM".
    ///
    /// Seconds are dropped.
    pub fn to_12h(&self) -> String {
        let (is_pm, hour) = self.0.hour12();
        let suffix = if is_pm { "PM" } else { "AM" };
        format!("{}:{:02} {}", hour, self.minute(), suffix)
    }
}

impl fmt::Debug for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClockTime({})", self.0.format("%H:%M:%S"))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Format a raw time string for display on a 12-hour clock.
///
/// Never fails: malformed input renders as [`UNPARSEABLE_TIME`].
///
/// ```
/// use ride_server::domain::format_12h;
///
/// assert_eq!(format_12h("09:00:00"), "9:00 AM");
/// assert_eq!(format_12h("tea time"), "--:--");
/// ```
pub fn format_12h(raw: &str) -> String {
    match ClockTime::parse(raw) {
        Ok(t) => t.to_12h(),
        Err(_) => UNPARSEABLE_TIME.to_string(),
    }
}

/// A slot time exactly as the backend sent it.
///
/// Kept unparsed so that one bad row degrades to a placeholder in the
/// rendered list instead of failing the whole fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotTime(String);

impl SlotTime {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a comparable time.
    pub fn parse(&self) -> Result<ClockTime, TimeError> {
        ClockTime::parse(self.0.trim())
    }

    /// 12-hour display form, or the placeholder.
    pub fn display(&self) -> String {
        format_12h(self.0.trim())
    }
}

impl From<ClockTime> for SlotTime {
    fn from(t: ClockTime) -> Self {
        Self(t.as_naive().format("%H:%M:%S").to_string())
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}
