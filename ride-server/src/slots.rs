//! Time-slot grouping for display.
//!
//! A driver's availability entries are bucketed by their formatted
//! (start, end) pair so that, for example, three routes offered in the
//! same window render under a single "9:00 AM - 9:30 AM" heading.

use std::collections::HashMap;

use crate::domain::{Availability, ClockTime};

/// Entries sharing one displayed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlotGroup {
    /// "start - end" on a 12-hour clock
    pub label: String,
    /// Chronological start of the window, `None` if unparseable
    pub start: Option<ClockTime>,
    /// Entries in insertion order
    pub entries: Vec<Availability>,
}

impl TimeSlotGroup {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Availability> {
        self.entries.iter()
    }
}

/// Display label for an entry's window.
pub fn window_label(entry: &Availability) -> String {
    format!("{} - {}", entry.start_time.display(), entry.end_time.display())
}

/// Group entries by displayed window and order the groups by start time.
///
/// Entries whose formatted start and end are identical share a group,
/// keeping their relative order. Groups are sorted ascending by start
/// time; equal starts keep the order in which the groups were first seen.
/// Groups with an unparseable start sort last.
///
/// ```
/// use chrono::NaiveDate;
/// use ride_server::domain::{Availability, DriverId, SlotTime};
/// use ride_server::slots::group_by_window;
///
/// let entry = |start: &str, end: &str| Availability {
///     id: format!("{start}-{end}"),
///     driver_id: DriverId::new("d"),
///     from_area: "A".into(),
///     to_area: "B".into(),
///     date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
///     start_time: SlotTime::new(start),
///     end_time: SlotTime::new(end),
/// };
///
/// let groups = group_by_window(&[
///     entry("10:00", "11:00"),
///     entry("09:00", "09:30"),
///     entry("09:00", "09:30"),
/// ]);
/// assert_eq!(groups[0].label, "9:00 AM - 9:30 AM");
/// assert_eq!(groups[0].len(), 2);
/// assert_eq!(groups[1].label, "10:00 AM - 11:00 AM");
/// ```
pub fn group_by_window(entries: &[Availability]) -> Vec<TimeSlotGroup> {
    let mut groups: Vec<TimeSlotGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let label = window_label(entry);
        match index.get(&label) {
            Some(&i) => groups[i].entries.push(entry.clone()),
            None => {
                index.insert(label.clone(), groups.len());
                groups.push(TimeSlotGroup {
                    label,
                    start: entry.start(),
                    entries: vec![entry.clone()],
                });
            }
        }
    }

    // Vec::sort_by_key is stable, which is what breaks ties by discovery order.
    groups.sort_by_key(|g| (g.start.is_none(), g.start));
    groups
}

/// Concatenate grouped entries back into a single ordered list.
pub fn flatten(groups: &[TimeSlotGroup]) -> Vec<Availability> {
    groups.iter().flat_map(|g| g.entries.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DriverId, SlotTime, UNPARSEABLE_TIME};
    use chrono::NaiveDate;

    fn entry(id: &str, start: &str, end: &str) -> Availability {
        Availability {
            id: id.to_string(),
            driver_id: DriverId::new("d"),
            from_area: "Downtown".to_string(),
            to_area: "Airport".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            start_time: SlotTime::new(start),
            end_time: SlotTime::new(end),
        }
    }

    fn labels(groups: &[TimeSlotGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.label.as_str()).collect()
    }

    #[test]
    fn collapses_duplicates_and_orders() {
        let groups = group_by_window(&[
            entry("a", "10:00", "11:00"),
            entry("b", "09:00", "09:30"),
            entry("c", "09:00", "09:30"),
        ]);
        assert_eq!(labels(&groups), vec!["9:00 AM - 9:30 AM", "10:00 AM - 11:00 AM"]);
        let ids: Vec<&str> = groups[0].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn seconds_collapse_into_same_bucket() {
        let groups = group_by_window(&[
            entry("a", "09:00", "09:30"),
            entry("b", "09:00:00", "09:30:00"),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn chronological_not_lexical() {
        // Lexically "1:00 PM" < "9:00 AM"; chronologically it is later.
        let groups = group_by_window(&[entry("pm", "13:00", "14:00"), entry("am", "09:00", "10:00")]);
        assert_eq!(labels(&groups), vec!["9:00 AM - 10:00 AM", "1:00 PM - 2:00 PM"]);
    }

    #[test]
    fn equal_starts_keep_discovery_order() {
        let groups = group_by_window(&[
            entry("long", "09:00", "12:00"),
            entry("short", "09:00", "09:30"),
        ]);
        assert_eq!(labels(&groups), vec!["9:00 AM - 12:00 PM", "9:00 AM - 9:30 AM"]);
    }

    #[test]
    fn unparseable_sorts_last_with_placeholder() {
        let groups = group_by_window(&[entry("bad", "soon", "later"), entry("ok", "23:00", "23:30")]);
        assert_eq!(groups[0].label, "11:00 PM - 11:30 PM");
        assert_eq!(
            groups[1].label,
            format!("{UNPARSEABLE_TIME} - {UNPARSEABLE_TIME}")
        );
        assert_eq!(groups[1].start, None);
    }

    #[test]
    fn empty_input() {
        assert!(group_by_window(&[]).is_empty());
    }
}
