//! Which ride requests a driver should still see.

use std::cmp::Ordering;

use crate::domain::{Now, RideRequest, RideStatus};

/// Pending requests that have not yet ended, soonest first.
///
/// Unparseable end times, past dates and non-pending statuses are dropped.
/// Otherwise a request dated after today is open, and a request dated
/// today is open while its end time is strictly after now. The result is
/// ordered by date, then start time with unparseable starts last; ties
/// keep input order.
pub fn open_ride_requests(requests: &[RideRequest], now: Now) -> Vec<RideRequest> {
    let mut open: Vec<RideRequest> = requests
        .iter()
        .filter(|r| is_open(r, &now))
        .cloned()
        .collect();

    open.sort_by_key(|r| {
        let start = r.start_time.parse().ok();
        (r.date, start.is_none(), start)
    });

    open
}

/// Whether a single request is still open at `now`.
pub fn is_open(request: &RideRequest, now: &Now) -> bool {
    if request.status != RideStatus::Pending {
        return false;
    }
    let Ok(end) = request.end_time.parse() else {
        return false;
    };
    match request.date.cmp(&now.date) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => end > now.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClockTime, SlotTime};
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn now(hhmm: &str) -> Now {
        Now::new(today(), ClockTime::parse(hhmm).unwrap())
    }

    fn request(id: &str, date: NaiveDate, start: &str, end: &str, status: RideStatus) -> RideRequest {
        RideRequest {
            id: id.to_string(),
            rider_id: "r".to_string(),
            rider_name: "Sam".to_string(),
            contact: "+44".to_string(),
            from_area: "Old Town".to_string(),
            to_area: "Harbour".to_string(),
            date,
            start_time: SlotTime::new(start),
            end_time: SlotTime::new(end),
            status,
        }
    }

    fn ids(requests: &[RideRequest]) -> Vec<&str> {
        requests.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn ended_today_is_dropped() {
        let reqs = vec![
            request("ended", today(), "08:00", "09:00:00", RideStatus::Pending),
            request("open", today(), "08:00", "09:30:00", RideStatus::Pending),
        ];
        assert_eq!(ids(&open_ride_requests(&reqs, now("09:00"))), vec!["open"]);
    }

    #[test]
    fn future_dates_always_open() {
        let tomorrow = today().succ_opt().unwrap();
        let reqs = vec![request("t", tomorrow, "01:00", "02:00", RideStatus::Pending)];
        assert_eq!(open_ride_requests(&reqs, now("23:59")).len(), 1);
    }

    #[test]
    fn past_dates_and_non_pending_dropped() {
        let yesterday = today().pred_opt().unwrap();
        let reqs = vec![
            request("past", yesterday, "10:00", "23:00", RideStatus::Pending),
            request("taken", today(), "10:00", "23:00", RideStatus::Accepted),
            request("done", today(), "10:00", "23:00", RideStatus::Completed),
        ];
        assert!(open_ride_requests(&reqs, now("09:00")).is_empty());
    }

    #[test]
    fn unparseable_end_dropped_on_any_date() {
        let tomorrow = today().succ_opt().unwrap();
        let reqs = vec![
            request("bad-today", today(), "10:00", "soon", RideStatus::Pending),
            request("bad-tomorrow", tomorrow, "10:00", "soon", RideStatus::Pending),
        ];
        assert!(open_ride_requests(&reqs, now("09:00")).is_empty());
    }

    #[test]
    fn ordered_by_date_then_start() {
        let tomorrow = today().succ_opt().unwrap();
        let reqs = vec![
            request("t-early", tomorrow, "07:00", "08:00", RideStatus::Pending),
            request("today-late", today(), "18:00", "19:00", RideStatus::Pending),
            request("today-early", today(), "10:00", "11:00", RideStatus::Pending),
        ];
        assert_eq!(
            ids(&open_ride_requests(&reqs, now("09:00"))),
            vec!["today-early", "today-late", "t-early"]
        );
    }

    #[test]
    fn unparseable_start_sorts_last_within_date() {
        let reqs = vec![
            request("tba", today(), "whenever", "23:00", RideStatus::Pending),
            request("late", today(), "18:00", "19:00", RideStatus::Pending),
            request("early", today(), "10:00", "11:00", RideStatus::Pending),
        ];
        assert_eq!(
            ids(&open_ride_requests(&reqs, now("09:00"))),
            vec!["early", "late", "tba"]
        );
    }
}
