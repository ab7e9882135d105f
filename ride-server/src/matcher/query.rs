//! Match query.

use chrono::NaiveDate;

use crate::domain::{Now, SearchParams};

/// What a rider is looking for.
///
/// Every field is optional; an empty query matches any driver that is not
/// on a ride and has at least one availability entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchQuery {
    /// Case-insensitive substring of the origin area
    pub from_area: Option<String>,
    /// Case-insensitive substring of the destination area
    pub to_area: Option<String>,
    /// Only entries on this date participate
    pub date: Option<NaiveDate>,
    /// "Available now" mode: only today's entries that have not yet ended
    pub now: Option<Now>,
}

impl MatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_from_area(mut self, area: impl Into<String>) -> Self {
        self.from_area = Some(area.into());
        self
    }

    pub fn with_to_area(mut self, area: impl Into<String>) -> Self {
        self.to_area = Some(area.into());
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn available_now(mut self, now: Now) -> Self {
        self.now = Some(now);
        self
    }

    /// The origin filter, lowercased, or `None` if absent or blank.
    pub(super) fn from_needle(&self) -> Option<String> {
        needle(self.from_area.as_deref())
    }

    /// The destination filter, lowercased, or `None` if absent or blank.
    pub(super) fn to_needle(&self) -> Option<String> {
        needle(self.to_area.as_deref())
    }
}

impl From<&SearchParams> for MatchQuery {
    fn from(params: &SearchParams) -> Self {
        MatchQuery::new()
            .on_date(params.date)
            .with_from_area(params.from_area.clone())
            .with_to_area(params.to_area.clone())
    }
}

fn needle(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_wildcards() {
        let q = MatchQuery::new().with_from_area("   ").with_to_area("");
        assert_eq!(q.from_needle(), None);
        assert_eq!(q.to_needle(), None);
    }

    #[test]
    fn needles_are_trimmed_and_lowercased() {
        let q = MatchQuery::new().with_from_area("  DownTown ");
        assert_eq!(q.from_needle().as_deref(), Some("downtown"));
    }

    #[test]
    fn from_search_params() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let params = SearchParams::new(date).with_from_area("down");
        let q = MatchQuery::from(&params);
        assert_eq!(q.date, Some(date));
        assert_eq!(q.from_area.as_deref(), Some("down"));
        assert_eq!(q.to_needle(), None);
        assert_eq!(q.now, None);
    }
}
