//! Booking orchestration: the engine's decisions wired to persistence.
//!
//! `create_booking` runs the full check-then-insert sequence against a
//! `&Connection` the caller already holds the state lock for, so two
//! concurrent requests on the same room cannot both pass the conflict
//! scan (spec'd at-most-one-valid-booking-per-slot).

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rusqlite::Connection;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::availability::{self, BookingError};

const CODE_RETRY_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
}

/// Human-readable code handed to the guest. Uniqueness is enforced by
/// the storage index; callers retry on collision.
fn generate_booking_code() -> String {
    format!("HBK-{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn create_booking(
    conn: &Connection,
    requester: &AuthUser,
    req: &CreateBooking,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let span = availability::validate_stay(today, req.check_in, req.check_out)?;

    let room = queries::get_room(conn, &req.room_id)?.ok_or(BookingError::RoomNotFound)?;
    if room.out_of_order {
        return Err(BookingError::RoomOutOfOrder.into());
    }
    if !room.available {
        return Err(BookingError::RoomUnavailable.into());
    }
    if req.guests < 1 || req.guests > room.capacity {
        return Err(BookingError::GuestsOutOfRange {
            capacity: room.capacity,
        }
        .into());
    }

    let existing = queries::list_active_bookings_for_room(conn, &req.room_id)?;
    if !availability::find_conflicts(&span, &existing).is_empty() {
        return Err(BookingError::DateConflict.into());
    }

    let now = Utc::now().naive_utc();
    let mut booking = Booking {
        id: Uuid::new_v4().to_string(),
        room_id: req.room_id.clone(),
        user_id: requester.id.clone(),
        check_in: span.check_in,
        check_out: span.check_out,
        guests: req.guests,
        total_price: availability::total_price(&span, room.price),
        status: BookingStatus::Confirmed,
        booking_code: generate_booking_code(),
        created_at: now,
        updated_at: now,
    };

    for attempt in 0.. {
        match queries::insert_booking(conn, &booking) {
            Ok(()) => break,
            Err(e) if queries::is_unique_violation(&e, "booking_code") => {
                if attempt + 1 >= CODE_RETRY_ATTEMPTS {
                    return Err(AppError::Database(anyhow::anyhow!(
                        "could not allocate a unique booking code"
                    )));
                }
                booking.booking_code = generate_booking_code();
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        booking_id = %booking.id,
        room_number = room.room_number,
        code = %booking.booking_code,
        nights = span.nights(),
        "booking created"
    );
    Ok(booking)
}

/// Cancel before the stay begins. The requester must own the booking
/// or hold admin privilege; admins also have the status endpoint for
/// overrides past check-in.
pub fn cancel_booking(
    conn: &Connection,
    booking_id: &str,
    requester: &AuthUser,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    if booking.user_id != requester.id && !requester.is_admin() {
        return Err(BookingError::NotOwner.into());
    }
    match booking.status {
        BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled.into()),
        BookingStatus::Completed => {
            return Err(BookingError::InvalidTransition {
                from: BookingStatus::Completed.as_str(),
                to: BookingStatus::Cancelled.as_str(),
            }
            .into())
        }
        _ => {}
    }
    if today >= booking.check_in {
        return Err(BookingError::StayAlreadyStarted.into());
    }

    queries::update_booking_status(conn, booking_id, BookingStatus::Cancelled)?;
    tracing::info!(booking_id, "booking cancelled");

    queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))
}

/// Administrative state-machine transition. Date rules: completion
/// only on or after the check-out day; cancellation here has no date
/// restriction (the override path).
pub fn set_status(
    conn: &Connection,
    booking_id: &str,
    next: BookingStatus,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    if !booking.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str(),
            to: next.as_str(),
        }
        .into());
    }
    if next == BookingStatus::Completed && today < booking.check_out {
        return Err(BookingError::StayNotEnded.into());
    }

    queries::update_booking_status(conn, booking_id, next)?;
    tracing::info!(booking_id, status = next.as_str(), "booking status changed");

    queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Room, RoomType};
    use chrono::Days;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn guest(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            name: "Guest".to_string(),
            role: "guest".to_string(),
        }
    }

    fn admin() -> AuthUser {
        AuthUser {
            id: "admin-1".to_string(),
            name: "Admin".to_string(),
            role: "admin".to_string(),
        }
    }

    fn seed_room(conn: &Connection, id: &str, price: f64, capacity: i64) -> Room {
        let room = Room {
            id: id.to_string(),
            room_number: 100 + id.len() as i64,
            room_type: RoomType::Double,
            price,
            capacity,
            description: "Garden view".to_string(),
            amenities: vec!["wifi".to_string()],
            available: true,
            out_of_order: false,
            created_at: Utc::now().naive_utc(),
        };
        queries::insert_room(conn, &room).unwrap();
        room
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn request(room_id: &str, from: u64, to: u64, guests: i64) -> CreateBooking {
        CreateBooking {
            room_id: room_id.to_string(),
            check_in: today().checked_add_days(Days::new(from)).unwrap(),
            check_out: today().checked_add_days(Days::new(to)).unwrap(),
            guests,
        }
    }

    #[test]
    fn test_create_booking_success() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);

        let booking =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.total_price, 300.0);
        assert!(booking.booking_code.starts_with("HBK-"));
        assert_eq!(booking.booking_code.len(), 10);

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_create_rejects_overlap_allows_adjacent() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);

        create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();

        // Overlaps the existing stay on its last night.
        let err = create_booking(&conn, &guest("u2"), &request("r1", 7, 10, 2), today())
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Checks in on the vacating day.
        let booking =
            create_booking(&conn, &guest("u2"), &request("r1", 8, 10, 2), today()).unwrap();
        assert_eq!(booking.total_price, 200.0);
    }

    #[test]
    fn test_cancelled_booking_frees_dates() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);

        let first =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();
        cancel_booking(&conn, &first.id, &guest("u1"), today()).unwrap();

        assert!(create_booking(&conn, &guest("u2"), &request("r1", 5, 8, 2), today()).is_ok());
    }

    #[test]
    fn test_create_room_checks() {
        let conn = setup_db();
        let room = seed_room(&conn, "r1", 100.0, 2);

        let err = create_booking(&conn, &guest("u1"), &request("missing", 5, 8, 2), today())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        conn.execute("UPDATE rooms SET out_of_order = 1 WHERE id = 'r1'", [])
            .unwrap();
        let err =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap_err();
        assert_eq!(err.to_string(), "room is out of order");

        conn.execute(
            "UPDATE rooms SET out_of_order = 0, available = 0 WHERE id = 'r1'",
            [],
        )
        .unwrap();
        let err =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap_err();
        assert_eq!(err.to_string(), "room is not available for booking");

        conn.execute("UPDATE rooms SET available = 1 WHERE id = 'r1'", [])
            .unwrap();
        let err = create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 3), today())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("guest count must be between 1 and {}", room.capacity)
        );
        let err = create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 0), today())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_date_checks() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);

        let past = CreateBooking {
            room_id: "r1".to_string(),
            check_in: today().checked_sub_days(Days::new(1)).unwrap(),
            check_out: today().checked_add_days(Days::new(2)).unwrap(),
            guests: 1,
        };
        let err = create_booking(&conn, &guest("u1"), &past, today()).unwrap_err();
        assert_eq!(err.to_string(), "check-in date cannot be in the past");

        let err =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 5, 1), today()).unwrap_err();
        assert_eq!(err.to_string(), "check-out date must be after check-in date");

        let err =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 36, 1), today()).unwrap_err();
        assert_eq!(err.to_string(), "stay cannot exceed 30 nights");
    }

    #[test]
    fn test_cancel_rules() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);
        let booking =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();

        // Another user cannot cancel it.
        let err = cancel_booking(&conn, &booking.id, &guest("u2"), today()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // An admin can.
        let cancelled = cancel_booking(&conn, &booking.id, &admin(), today()).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Double cancel is rejected.
        let err = cancel_booking(&conn, &booking.id, &guest("u1"), today()).unwrap_err();
        assert_eq!(err.to_string(), "booking is already cancelled");
    }

    #[test]
    fn test_cancel_after_checkin_rejected() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);
        let booking =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();

        // Pretend the stay began: "today" is the check-in day.
        let err =
            cancel_booking(&conn, &booking.id, &guest("u1"), booking.check_in).unwrap_err();
        assert_eq!(
            err.to_string(),
            "stay has already started and can no longer be cancelled"
        );
    }

    #[test]
    fn test_status_transitions() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);
        let booking =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();

        // Completion before the check-out day is rejected.
        let err =
            set_status(&conn, &booking.id, BookingStatus::Completed, today()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "booking cannot be completed before its check-out day"
        );

        // On the check-out day it goes through.
        let done =
            set_status(&conn, &booking.id, BookingStatus::Completed, booking.check_out)
                .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);

        // Terminal: no way back out.
        let err =
            set_status(&conn, &booking.id, BookingStatus::Cancelled, today()).unwrap_err();
        assert_eq!(err.to_string(), "cannot change a completed booking to cancelled");
    }

    #[test]
    fn test_admin_override_cancel_ignores_date() {
        let conn = setup_db();
        seed_room(&conn, "r1", 100.0, 2);
        let booking =
            create_booking(&conn, &guest("u1"), &request("r1", 5, 8, 2), today()).unwrap();

        // The status endpoint may cancel even after check-in.
        let cancelled =
            set_status(&conn, &booking.id, BookingStatus::Cancelled, booking.check_in)
                .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }
}
