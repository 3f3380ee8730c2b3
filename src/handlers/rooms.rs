use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::db::queries::{self, RoomFilters};
use crate::errors::AppError;
use crate::models::{Booking, Room, RoomType};
use crate::services::availability;
use crate::state::AppState;

// GET /api/rooms
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomsQuery {
    #[serde(rename = "type")]
    pub room_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub capacity: Option<i64>,
    pub search: Option<String>,
}

pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<Room>>, AppError> {
    let filters = RoomFilters {
        room_type: query.room_type,
        min_price: query.min_price,
        max_price: query.max_price,
        capacity: query.capacity,
        search: query.search,
    };

    let rooms = {
        let db = state.db.lock().unwrap();
        queries::list_rooms(&db, &filters)?
    };
    Ok(Json(rooms))
}

// GET /api/rooms/:id
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Room>, AppError> {
    let room = {
        let db = state.db.lock().unwrap();
        queries::get_room(&db, &id)?
    };
    room.map(Json).ok_or(AppError::NotFound("room"))
}

// GET /api/rooms/:id/unavailable-dates
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableDatesResponse {
    pub unavailable_dates: Vec<NaiveDate>,
    pub out_of_order: bool,
}

pub async fn unavailable_dates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UnavailableDatesResponse>, AppError> {
    let today = Local::now().date_naive();

    let (room, bookings) = {
        let db = state.db.lock().unwrap();
        let room = queries::get_room(&db, &id)?.ok_or(AppError::NotFound("room"))?;
        let bookings = queries::list_active_bookings_for_room(&db, &id)?;
        (room, bookings)
    };

    Ok(Json(UnavailableDatesResponse {
        unavailable_dates: availability::expand_unavailable_dates(
            &bookings,
            room.out_of_order,
            today,
        ),
        out_of_order: room.out_of_order,
    }))
}

// POST /api/rooms/check-availability
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityRequest {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAvailabilityResponse {
    pub available: bool,
    pub unavailable_dates: Vec<NaiveDate>,
    pub conflicting_bookings: Vec<Booking>,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckAvailabilityRequest>,
) -> Result<Json<CheckAvailabilityResponse>, AppError> {
    if body.check_out <= body.check_in {
        return Err(AppError::Validation(
            "check-out date must be after check-in date".to_string(),
        ));
    }
    let span = availability::StaySpan {
        check_in: body.check_in,
        check_out: body.check_out,
    };
    let today = Local::now().date_naive();

    let (room, bookings) = {
        let db = state.db.lock().unwrap();
        let room = queries::get_room(&db, &body.room_id)?.ok_or(AppError::NotFound("room"))?;
        let bookings = queries::list_active_bookings_for_room(&db, &body.room_id)?;
        (room, bookings)
    };

    let conflicting: Vec<Booking> = availability::find_conflicts(&span, &bookings)
        .into_iter()
        .cloned()
        .collect();
    let available = room.is_bookable() && conflicting.is_empty();

    // One expansion algorithm for every consumer: the calendar marks
    // exactly these days, derived from the conflicting bookings.
    let unavailable_dates =
        availability::expand_unavailable_dates(&conflicting, room.out_of_order, today);

    Ok(Json(CheckAvailabilityResponse {
        available,
        unavailable_dates,
        conflicting_bookings: conflicting,
    }))
}

// POST /api/rooms (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_number: i64,
    #[serde(rename = "type")]
    pub room_type: String,
    pub price: f64,
    pub capacity: i64,
    pub description: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub available: Option<bool>,
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let room_type = RoomType::parse(&body.room_type)
        .ok_or_else(|| AppError::Validation(format!("unknown room type: {}", body.room_type)))?;
    if body.price < 0.0 {
        return Err(AppError::Validation("price cannot be negative".to_string()));
    }
    if body.capacity < 1 {
        return Err(AppError::Validation("capacity must be at least 1".to_string()));
    }

    let room = Room {
        id: Uuid::new_v4().to_string(),
        room_number: body.room_number,
        room_type,
        price: body.price,
        capacity: body.capacity,
        description: body.description.unwrap_or_default(),
        amenities: body.amenities.unwrap_or_default(),
        available: body.available.unwrap_or(true),
        out_of_order: false,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_room(&db, &room).map_err(|e| {
            if queries::is_unique_violation(&e, "room_number") {
                AppError::Conflict(format!("room number {} already exists", room.room_number))
            } else {
                AppError::Database(e)
            }
        })?;
    }

    tracing::info!(room_id = %room.id, room_number = room.room_number, "room created");
    Ok((StatusCode::CREATED, Json(room)))
}

// PUT /api/rooms/:id (admin, partial update)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub room_number: Option<i64>,
    #[serde(rename = "type")]
    pub room_type: Option<String>,
    pub price: Option<f64>,
    pub capacity: Option<i64>,
    pub description: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub available: Option<bool>,
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let db = state.db.lock().unwrap();
    let mut room = queries::get_room(&db, &id)?.ok_or(AppError::NotFound("room"))?;

    if let Some(number) = body.room_number {
        room.room_number = number;
    }
    if let Some(t) = &body.room_type {
        room.room_type = RoomType::parse(t)
            .ok_or_else(|| AppError::Validation(format!("unknown room type: {t}")))?;
    }
    if let Some(price) = body.price {
        if price < 0.0 {
            return Err(AppError::Validation("price cannot be negative".to_string()));
        }
        room.price = price;
    }
    if let Some(capacity) = body.capacity {
        if capacity < 1 {
            return Err(AppError::Validation("capacity must be at least 1".to_string()));
        }
        room.capacity = capacity;
    }
    if let Some(description) = body.description {
        room.description = description;
    }
    if let Some(amenities) = body.amenities {
        room.amenities = amenities;
    }
    if let Some(available) = body.available {
        room.available = available;
    }

    queries::update_room(&db, &room).map_err(|e| {
        if queries::is_unique_violation(&e, "room_number") {
            AppError::Conflict(format!("room number {} already exists", room.room_number))
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(Json(room))
}

// PUT /api/rooms/:id/out-of-order (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfOrderRequest {
    pub out_of_order: bool,
}

pub async fn set_out_of_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<OutOfOrderRequest>,
) -> Result<Json<Room>, AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let db = state.db.lock().unwrap();
    if !queries::set_out_of_order(&db, &id, body.out_of_order)? {
        return Err(AppError::NotFound("room"));
    }
    tracing::info!(room_id = %id, out_of_order = body.out_of_order, "out-of-order flag set");

    queries::get_room(&db, &id)?
        .map(Json)
        .ok_or(AppError::NotFound("room"))
}

// DELETE /api/rooms/:id (admin)
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth::require_admin(&headers, &state.config.jwt_secret)?;

    let db = state.db.lock().unwrap();
    if queries::count_active_bookings_for_room(&db, &id)? > 0 {
        return Err(AppError::Conflict(
            "room has active bookings and cannot be deleted".to_string(),
        ));
    }
    match queries::delete_room(&db, &id) {
        Ok(true) => {}
        Ok(false) => return Err(AppError::NotFound("room")),
        // Terminal bookings keep their room row for reporting.
        Err(e) if queries::is_fk_violation(&e) => {
            return Err(AppError::Conflict(
                "room has booking history and cannot be deleted".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(room_id = %id, "room deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}
