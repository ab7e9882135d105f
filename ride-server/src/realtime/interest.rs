//! Which change events a subscriber cares about.

use std::fmt;

use super::event::ChangeEvent;

/// Error returned for a malformed row filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid row filter {filter:?}: expected column=eq.value")]
pub struct InvalidRowFilter {
    filter: String,
}

/// An equality filter on one column, written `column=eq.value`.
///
/// This is the only operator the change feed is asked to filter by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    /// Parse `column=eq.value`.
    ///
    /// ```
    /// use ride_server::realtime::RowFilter;
    ///
    /// let f = RowFilter::parse("status=eq.pending").unwrap();
    /// assert_eq!(f.column, "status");
    /// assert_eq!(f.value, "pending");
    /// assert!(RowFilter::parse("status=pending").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, InvalidRowFilter> {
        let invalid = || InvalidRowFilter {
            filter: s.to_string(),
        };
        let (column, rest) = s.split_once('=').ok_or_else(invalid)?;
        let value = rest.strip_prefix("eq.").ok_or_else(invalid)?;
        if column.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    fn matches(&self, record: &serde_json::Value) -> bool {
        match record.get(&self.column) {
            Some(serde_json::Value::String(s)) => s == &self.value,
            Some(serde_json::Value::Null) => false,
            Some(other) => other.to_string() == self.value,
            // Deletes often carry only the primary key.
            None => true,
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// A table, optionally narrowed by a row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInterest {
    pub table: String,
    pub filter: Option<RowFilter>,
}

impl ChangeInterest {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether `event` should trigger a refresh for this interest.
    ///
    /// Events without a record are assumed relevant: a missing payload
    /// must not hide a change.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match (&self.filter, &event.record) {
            (Some(filter), Some(record)) => filter.matches(record),
            _ => true,
        }
    }
}
