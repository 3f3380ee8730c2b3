use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::booking::{self, CreateBooking};
use crate::state::AppState;

// POST /api/bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let user = auth::authenticate(&headers, &state.config.jwt_secret)?;
    let today = Local::now().date_naive();

    let request = CreateBooking {
        room_id: body.room_id,
        check_in: body.check_in,
        check_out: body.check_out,
        guests: body.guests,
    };

    // Conflict check and insert share one guard scope, so concurrent
    // requests on the same room serialize here.
    let booking = {
        let db = state.db.lock().unwrap();
        booking::create_booking(&db, &user, &request, today)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = auth::authenticate(&headers, &state.config.jwt_secret)?;

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking(&db, &id)?
    }
    .ok_or(AppError::NotFound("booking"))?;

    if booking.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "booking belongs to another user".to_string(),
        ));
    }
    Ok(Json(booking))
}

// GET /api/bookings/user/:user_id
#[derive(Deserialize)]
pub struct UserBookingsQuery {
    pub status: Option<String>,
}

pub async fn list_user_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<UserBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let user = auth::authenticate(&headers, &state.config.jwt_secret)?;
    if user.id != user_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "cannot read another user's bookings".to_string(),
        ));
    }

    let status = parse_status_filter(query.status.as_deref())?;
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings_for_user(&db, &user_id, status)?
    };
    Ok(Json(bookings))
}

// DELETE /api/bookings/:id
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let user = auth::authenticate(&headers, &state.config.jwt_secret)?;
    let today = Local::now().date_naive();

    let booking = {
        let db = state.db.lock().unwrap();
        booking::cancel_booking(&db, &id, &user, today)?
    };
    Ok(Json(booking))
}

// GET /api/bookings (admin)
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let status = parse_status_filter(query.status.as_deref())?;
    let limit = query.limit.unwrap_or(50);

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_all_bookings(&db, status, limit)?
    };
    Ok(Json(bookings))
}

// PATCH /api/bookings/:id/status (admin)
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let next = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status: {}", body.status)))?;
    let today = Local::now().date_naive();

    let booking = {
        let db = state.db.lock().unwrap();
        booking::set_status(&db, &id, next, today)?
    };
    Ok(Json(booking))
}

fn parse_status_filter(status: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    status
        .map(|s| {
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))
        })
        .transpose()
}
