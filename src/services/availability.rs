//! Availability engine: interval overlap, conflict scan, calendar
//! expansion and pricing. Everything here is pure — callers supply
//! "today" and the booking list, the engine holds no state.
//!
//! All dates are calendar days (`NaiveDate`). Wire strings are parsed
//! once at the handler boundary; no timestamp arithmetic happens here,
//! so there is no timezone to get wrong.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::Booking;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 30;

/// How far ahead an out-of-order room is shown as blocked, in days.
pub const BLOCKED_WINDOW_DAYS: usize = 365;

/// A half-open stay interval `[check_in, check_out)`. The check-out
/// day is not occupied: the next guest may check in that same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaySpan {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StaySpan {
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// `[a,b)` and `[c,d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &StaySpan) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Every occupied day: check-in up to but excluding check-out.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.check_in.iter_days().take_while(|d| *d < self.check_out)
    }
}

/// A booking request rejected by the engine, with a user-facing reason.
/// The HTTP boundary maps these to status codes; the engine never
/// decides codes itself.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("check-in date cannot be in the past")]
    PastCheckIn,

    #[error("check-out date must be after check-in date")]
    InvalidDateOrder,

    #[error("stay cannot exceed {MAX_STAY_NIGHTS} nights")]
    StayTooLong,

    #[error("room not found")]
    RoomNotFound,

    #[error("room is out of order")]
    RoomOutOfOrder,

    #[error("room is not available for booking")]
    RoomUnavailable,

    #[error("guest count must be between 1 and {capacity}")]
    GuestsOutOfRange { capacity: i64 },

    #[error("room is already booked for the selected dates")]
    DateConflict,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    #[error("stay has already started and can no longer be cancelled")]
    StayAlreadyStarted,

    #[error("booking cannot be completed before its check-out day")]
    StayNotEnded,

    #[error("cannot change a {from} booking to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("booking belongs to another user")]
    NotOwner,
}

/// Validate a candidate stay against "today" and the stay-length rules.
/// Checks run in order; each failure is a distinct reason.
pub fn validate_stay(
    today: NaiveDate,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<StaySpan, BookingError> {
    if check_in < today {
        return Err(BookingError::PastCheckIn);
    }
    if check_out <= check_in {
        return Err(BookingError::InvalidDateOrder);
    }
    let span = StaySpan { check_in, check_out };
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(BookingError::StayTooLong);
    }
    Ok(span)
}

/// Every existing booking whose interval overlaps the candidate span.
/// Cancelled and completed bookings never conflict; the filter lives
/// here so the property holds for arbitrary input lists.
pub fn find_conflicts<'a>(span: &StaySpan, bookings: &'a [Booking]) -> Vec<&'a Booking> {
    bookings
        .iter()
        .filter(|b| b.status.blocks_dates())
        .filter(|b| {
            span.overlaps(&StaySpan {
                check_in: b.check_in,
                check_out: b.check_out,
            })
        })
        .collect()
}

/// The one calendar-expansion algorithm. Both availability endpoints
/// call this; no consumer re-derives it.
///
/// An out-of-order room is fully blocked for the forward window
/// regardless of bookings. Otherwise every occupied day of each active
/// booking is collected, deduplicated and sorted ascending.
pub fn expand_unavailable_dates(
    bookings: &[Booking],
    out_of_order: bool,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    if out_of_order {
        return today.iter_days().take(BLOCKED_WINDOW_DAYS).collect();
    }

    let days: BTreeSet<NaiveDate> = bookings
        .iter()
        .filter(|b| b.status.blocks_dates())
        .flat_map(|b| {
            StaySpan {
                check_in: b.check_in,
                check_out: b.check_out,
            }
            .days()
            .collect::<Vec<_>>()
        })
        .collect();

    days.into_iter().collect()
}

/// Nights are whole by construction (check-out strictly after check-in,
/// both calendar days), so the price needs no rounding.
pub fn total_price(span: &StaySpan, nightly_price: f64) -> f64 {
    span.nights() as f64 * nightly_price
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::{Days, Utc};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn span(a: &str, b: &str) -> StaySpan {
        StaySpan {
            check_in: day(a),
            check_out: day(b),
        }
    }

    fn booking(check_in: &str, check_out: &str, status: BookingStatus) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: "b1".to_string(),
            room_id: "r1".to_string(),
            user_id: "u1".to_string(),
            check_in: day(check_in),
            check_out: day(check_out),
            guests: 2,
            total_price: 0.0,
            status,
            booking_code: "HBK-000001".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_overlap_truth_table() {
        let existing = span("2024-03-10", "2024-03-13");

        // Overlapping cases.
        assert!(span("2024-03-12", "2024-03-15").overlaps(&existing));
        assert!(span("2024-03-08", "2024-03-11").overlaps(&existing));
        assert!(span("2024-03-11", "2024-03-12").overlaps(&existing)); // contained
        assert!(span("2024-03-08", "2024-03-16").overlaps(&existing)); // containing
        assert!(span("2024-03-10", "2024-03-13").overlaps(&existing)); // identical

        // Adjacency is not overlap: check-out day hands off to the
        // next check-in.
        assert!(!span("2024-03-13", "2024-03-15").overlaps(&existing));
        assert!(!span("2024-03-08", "2024-03-10").overlaps(&existing));

        // Disjoint.
        assert!(!span("2024-03-20", "2024-03-22").overlaps(&existing));
    }

    #[test]
    fn test_conflicts_ignore_cancelled_and_completed() {
        let bookings = vec![
            booking("2024-03-10", "2024-03-13", BookingStatus::Cancelled),
            booking("2024-03-10", "2024-03-13", BookingStatus::Completed),
        ];
        let candidate = span("2024-03-11", "2024-03-14");
        assert!(find_conflicts(&candidate, &bookings).is_empty());
    }

    #[test]
    fn test_conflicts_include_pending_and_confirmed() {
        let bookings = vec![
            booking("2024-03-10", "2024-03-13", BookingStatus::Pending),
            booking("2024-03-20", "2024-03-22", BookingStatus::Confirmed),
            booking("2024-03-14", "2024-03-16", BookingStatus::Confirmed),
        ];
        let candidate = span("2024-03-12", "2024-03-21");
        let conflicts = find_conflicts(&candidate, &bookings);
        assert_eq!(conflicts.len(), 3);
    }

    #[test]
    fn test_conflict_scan_is_pure() {
        let bookings = vec![booking("2024-03-10", "2024-03-13", BookingStatus::Confirmed)];
        let candidate = span("2024-03-12", "2024-03-15");
        let first: Vec<String> = find_conflicts(&candidate, &bookings)
            .iter()
            .map(|b| b.id.clone())
            .collect();
        let second: Vec<String> = find_conflicts(&candidate, &bookings)
            .iter()
            .map(|b| b.id.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expansion_excludes_checkout_day() {
        let bookings = vec![booking("2024-03-10", "2024-03-13", BookingStatus::Confirmed)];
        let dates = expand_unavailable_dates(&bookings, false, day("2024-03-01"));
        assert_eq!(
            dates,
            vec![day("2024-03-10"), day("2024-03-11"), day("2024-03-12")]
        );
    }

    #[test]
    fn test_expansion_dedupes_and_sorts() {
        let bookings = vec![
            booking("2024-03-14", "2024-03-16", BookingStatus::Pending),
            booking("2024-03-10", "2024-03-13", BookingStatus::Confirmed),
            booking("2024-03-12", "2024-03-15", BookingStatus::Confirmed),
            booking("2024-03-11", "2024-03-20", BookingStatus::Cancelled),
        ];
        let dates = expand_unavailable_dates(&bookings, false, day("2024-03-01"));
        assert_eq!(
            dates,
            vec![
                day("2024-03-10"),
                day("2024-03-11"),
                day("2024-03-12"),
                day("2024-03-13"),
                day("2024-03-14"),
                day("2024-03-15"),
            ]
        );
    }

    #[test]
    fn test_out_of_order_blocks_full_window() {
        let today = Utc::now().date_naive();
        let dates = expand_unavailable_dates(&[], true, today);
        assert_eq!(dates.len(), BLOCKED_WINDOW_DAYS);
        assert_eq!(dates[0], today);
        // Consecutive days.
        for pair in dates.windows(2) {
            assert_eq!(pair[1], pair[0].checked_add_days(Days::new(1)).unwrap());
        }
    }

    #[test]
    fn test_validate_stay_rejects_past_checkin() {
        let today = day("2024-03-10");
        let err = validate_stay(today, day("2024-03-09"), day("2024-03-12")).unwrap_err();
        assert_eq!(err, BookingError::PastCheckIn);
        // Today itself is a valid check-in.
        assert!(validate_stay(today, today, day("2024-03-12")).is_ok());
    }

    #[test]
    fn test_validate_stay_rejects_zero_nights() {
        let today = day("2024-03-01");
        let err = validate_stay(today, day("2024-03-10"), day("2024-03-10")).unwrap_err();
        assert_eq!(err, BookingError::InvalidDateOrder);
        let err = validate_stay(today, day("2024-03-10"), day("2024-03-09")).unwrap_err();
        assert_eq!(err, BookingError::InvalidDateOrder);
    }

    #[test]
    fn test_validate_stay_length_limit() {
        let today = day("2024-03-01");
        // 30 nights is the maximum.
        assert!(validate_stay(today, day("2024-03-01"), day("2024-03-31")).is_ok());
        // 31 nights is rejected.
        let err = validate_stay(today, day("2024-03-01"), day("2024-04-01")).unwrap_err();
        assert_eq!(err, BookingError::StayTooLong);
    }

    #[test]
    fn test_pricing_scenario() {
        // $100/night, existing confirmed [2024-03-10, 2024-03-13).
        let existing = vec![booking("2024-03-10", "2024-03-13", BookingStatus::Confirmed)];

        // [2024-03-12, 2024-03-15) overlaps on 3/12.
        let candidate = span("2024-03-12", "2024-03-15");
        assert_eq!(find_conflicts(&candidate, &existing).len(), 1);

        // [2024-03-13, 2024-03-15) is adjacent: bookable, two nights.
        let candidate = span("2024-03-13", "2024-03-15");
        assert!(find_conflicts(&candidate, &existing).is_empty());
        assert_eq!(total_price(&candidate, 100.0), 200.0);
    }
}
