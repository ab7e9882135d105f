//! Rider search input and the "now" reference point.

use chrono::{Local, NaiveDate, NaiveDateTime};

use super::time::ClockTime;

/// Transient rider search, rebuilt per interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub date: NaiveDate,
    /// Origin substring filter; empty matches everything
    pub from_area: String,
    /// Destination substring filter; empty matches everything
    pub to_area: String,
}

impl SearchParams {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            from_area: String::new(),
            to_area: String::new(),
        }
    }

    pub fn with_from_area(mut self, area: impl Into<String>) -> Self {
        self.from_area = area.into();
        self
    }

    pub fn with_to_area(mut self, area: impl Into<String>) -> Self {
        self.to_area = area.into();
        self
    }
}

/// The wall-clock instant used to decide whether a slot is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub date: NaiveDate,
    pub time: ClockTime,
}

impl Now {
    pub fn new(date: NaiveDate, time: ClockTime) -> Self {
        Self { date, time }
    }

    /// The current local date and time.
    pub fn local() -> Self {
        Self::from(Local::now().naive_local())
    }
}

impl From<NaiveDateTime> for Now {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.date(),
            time: ClockTime::from_naive(dt.time()),
        }
    }
}
