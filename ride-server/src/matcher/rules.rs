//! Driver matching rules.

use crate::domain::{Availability, ClockTime, Driver, Now};

use super::query::MatchQuery;

/// Drivers matching `query`, most rides offered first.
///
/// Rules, in order of precedence:
///
/// 1. Drivers on a ride never match.
/// 2. Drivers without availability never match.
/// 3. In "now" mode only today's entries count, and only if they end
///    strictly after the current time. An entry ending exactly now has
///    expired; an entry with an unparseable end time never counts.
/// 4. Area filters are case-insensitive substring matches; a blank
///    filter matches everything.
/// 5. An explicit date restricts matching to entries on that date. If it
///    disagrees with the "now" date, the explicit date wins and the
///    end-time check only applies when it is today.
///
/// A driver matches if any single entry satisfies every active rule.
/// Drivers are stably sorted by `rides_offered` descending before filtering,
/// so ties keep their input order.
pub fn match_drivers(drivers: &[Driver], query: &MatchQuery) -> Vec<Driver> {
    match_driver_refs(drivers, query)
        .into_iter()
        .cloned()
        .collect()
}

/// Borrowing variant of [`match_drivers`].
pub fn match_driver_refs<'a>(drivers: &'a [Driver], query: &MatchQuery) -> Vec<&'a Driver> {
    let filter = EntryFilter::new(query);

    let mut ranked: Vec<&Driver> = drivers.iter().collect();
    ranked.sort_by(|a, b| b.rides_offered.cmp(&a.rides_offered));

    ranked
        .into_iter()
        .filter(|driver| !driver.is_on_ride)
        .filter(|driver| driver.availability.iter().any(|e| filter.accepts(e)))
        .collect()
}

/// The entries of `driver` that satisfy `query`, in their original order.
///
/// Used to show only the windows that caused a match.
pub fn matching_entries<'a>(driver: &'a Driver, query: &MatchQuery) -> Vec<&'a Availability> {
    let filter = EntryFilter::new(query);
    driver
        .availability
        .iter()
        .filter(|e| filter.accepts(e))
        .collect()
}

/// A query with its area needles normalized once up front.
struct EntryFilter<'q> {
    query: &'q MatchQuery,
    from: Option<String>,
    to: Option<String>,
}

impl<'q> EntryFilter<'q> {
    fn new(query: &'q MatchQuery) -> Self {
        Self {
            query,
            from: query.from_needle(),
            to: query.to_needle(),
        }
    }

    fn accepts(&self, entry: &Availability) -> bool {
        self.date_ok(entry) && self.window_ok(entry) && self.areas_ok(entry)
    }

    fn date_ok(&self, entry: &Availability) -> bool {
        match (self.query.date, self.query.now) {
            (Some(date), _) => entry.date == date,
            (None, Some(now)) => entry.date == now.date,
            (None, None) => true,
        }
    }

    fn window_ok(&self, entry: &Availability) -> bool {
        let Some(now) = self.query.now else {
            return true;
        };
        if entry.date < now.date {
            return false;
        }
        if entry.date > now.date {
            // Only reachable with an explicit future date.
            return true;
        }
        ends_after(entry, &now)
    }

    fn areas_ok(&self, entry: &Availability) -> bool {
        contains_ci(&entry.from_area, self.from.as_deref())
            && contains_ci(&entry.to_area, self.to.as_deref())
    }
}

fn ends_after(entry: &Availability, now: &Now) -> bool {
    entry
        .end()
        .is_some_and(|end: ClockTime| end > now.time)
}

/// Case-insensitive containment; `needle` must already be lowercase.
fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => haystack.to_lowercase().contains(n),
    }
}
