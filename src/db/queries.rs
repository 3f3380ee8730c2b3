use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::models::{Booking, BookingStatus, Room, RoomType};

/// True when `err` is a storage-level unique-constraint rejection on
/// the given column (duplicate room number, booking-code collision).
pub fn is_unique_violation(err: &anyhow::Error, column: &str) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(column)
        }
        _ => false,
    }
}

/// True when `err` is a foreign-key rejection (deleting a room that
/// still has booking history).
pub fn is_fk_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("FOREIGN KEY")
        }
        _ => false,
    }
}

// ── Rooms ──

fn parse_room_row(row: &Row) -> anyhow::Result<Room> {
    let room_type_str: String = row.get(2)?;
    let amenities_json: String = row.get(6)?;
    let created_at_str: String = row.get(9)?;

    Ok(Room {
        id: row.get(0)?,
        room_number: row.get(1)?,
        room_type: RoomType::parse(&room_type_str)
            .ok_or_else(|| anyhow::anyhow!("unknown room type: {room_type_str}"))?,
        price: row.get(3)?,
        capacity: row.get(4)?,
        description: row.get(5)?,
        amenities: serde_json::from_str(&amenities_json).unwrap_or_default(),
        available: row.get(7)?,
        out_of_order: row.get(8)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

const ROOM_COLUMNS: &str = "id, room_number, room_type, price, capacity, description, amenities, available, out_of_order, created_at";

pub fn insert_room(conn: &Connection, room: &Room) -> anyhow::Result<()> {
    let amenities = serde_json::to_string(&room.amenities)?;
    let created_at = room.created_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO rooms (id, room_number, room_type, price, capacity, description, amenities, available, out_of_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            room.id,
            room.room_number,
            room.room_type.as_str(),
            room.price,
            room.capacity,
            room.description,
            amenities,
            room.available,
            room.out_of_order,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_room(conn: &Connection, id: &str) -> anyhow::Result<Option<Room>> {
    let mut stmt = conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"))?;

    let result = stmt.query_row(params![id], |row| Ok(parse_room_row(row)));
    match result {
        Ok(room) => Ok(Some(room?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct RoomFilters {
    pub room_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub capacity: Option<i64>,
    pub search: Option<String>,
}

pub fn list_rooms(conn: &Connection, filters: &RoomFilters) -> anyhow::Result<Vec<Room>> {
    let mut sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE 1=1");
    let mut args: Vec<Value> = vec![];

    if let Some(t) = &filters.room_type {
        sql.push_str(" AND room_type = ?");
        args.push(Value::Text(t.clone()));
    }
    if let Some(p) = filters.min_price {
        sql.push_str(" AND price >= ?");
        args.push(Value::Real(p));
    }
    if let Some(p) = filters.max_price {
        sql.push_str(" AND price <= ?");
        args.push(Value::Real(p));
    }
    if let Some(c) = filters.capacity {
        sql.push_str(" AND capacity >= ?");
        args.push(Value::Integer(c));
    }
    if let Some(s) = &filters.search {
        sql.push_str(" AND (room_type LIKE ? OR description LIKE ? OR amenities LIKE ?)");
        let pattern = format!("%{s}%");
        args.push(Value::Text(pattern.clone()));
        args.push(Value::Text(pattern.clone()));
        args.push(Value::Text(pattern));
    }
    sql.push_str(" ORDER BY room_number ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| Ok(parse_room_row(row)))?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row??);
    }
    Ok(rooms)
}

pub fn update_room(conn: &Connection, room: &Room) -> anyhow::Result<bool> {
    let amenities = serde_json::to_string(&room.amenities)?;
    let count = conn.execute(
        "UPDATE rooms SET room_number = ?1, room_type = ?2, price = ?3, capacity = ?4,
                          description = ?5, amenities = ?6, available = ?7
         WHERE id = ?8",
        params![
            room.room_number,
            room.room_type.as_str(),
            room.price,
            room.capacity,
            room.description,
            amenities,
            room.available,
            room.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_out_of_order(conn: &Connection, id: &str, out_of_order: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE rooms SET out_of_order = ?1 WHERE id = ?2",
        params![out_of_order, id],
    )?;
    Ok(count > 0)
}

pub fn delete_room(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM rooms WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bookings ──

fn parse_booking_row(row: &Row) -> anyhow::Result<Booking> {
    let check_in_str: String = row.get(3)?;
    let check_out_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    Ok(Booking {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        check_in: NaiveDate::parse_from_str(&check_in_str, "%Y-%m-%d")?,
        check_out: NaiveDate::parse_from_str(&check_out_str, "%Y-%m-%d")?,
        guests: row.get(5)?,
        total_price: row.get(6)?,
        status: BookingStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?,
        booking_code: row.get(8)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

const BOOKING_COLUMNS: &str = "id, room_id, user_id, check_in, check_out, guests, total_price, status, booking_code, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, room_id, user_id, check_in, check_out, guests, total_price, status, booking_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.room_id,
            booking.user_id,
            booking.check_in.format("%Y-%m-%d").to_string(),
            booking.check_out.format("%Y-%m-%d").to_string(),
            booking.guests,
            booking.total_price,
            booking.status.as_str(),
            booking.booking_code,
            booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            booking.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"))?;

    let result = stmt.query_row(params![id], |row| Ok(parse_booking_row(row)));
    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings that occupy dates on this room (pending or confirmed).
pub fn list_active_bookings_for_room(
    conn: &Connection,
    room_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE room_id = ?1 AND status IN ('pending', 'confirmed')
         ORDER BY check_in ASC"
    ))?;

    let rows = stmt.query_map(params![room_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_active_bookings_for_room(conn: &Connection, room_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE room_id = ?1 AND status IN ('pending', 'confirmed')",
        params![room_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    status: Option<BookingStatus>,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?");
    let mut args: Vec<Value> = vec![Value::Text(user_id.to_string())];

    if let Some(status) = status {
        sql.push_str(" AND status = ?");
        args.push(Value::Text(status.as_str().to_string()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_all_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1=1");
    let mut args: Vec<Value> = vec![];

    if let Some(status) = status {
        sql.push_str(" AND status = ?");
        args.push(Value::Text(status.as_str().to_string()));
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");
    args.push(Value::Integer(limit));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now()
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}
