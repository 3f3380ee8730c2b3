use anyhow::Context;
use rusqlite::Connection;

// Migrations are inlined so `:memory:` databases in tests get the full
// schema without touching the filesystem.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_rooms",
        "CREATE TABLE rooms (
            id TEXT PRIMARY KEY,
            room_number INTEGER NOT NULL UNIQUE,
            room_type TEXT NOT NULL,
            price REAL NOT NULL CHECK (price >= 0),
            capacity INTEGER NOT NULL CHECK (capacity >= 1),
            description TEXT NOT NULL DEFAULT '',
            amenities TEXT NOT NULL DEFAULT '[]',
            available INTEGER NOT NULL DEFAULT 1,
            out_of_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );",
    ),
    (
        "002_bookings",
        "CREATE TABLE bookings (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL REFERENCES rooms(id),
            user_id TEXT NOT NULL,
            check_in TEXT NOT NULL,
            check_out TEXT NOT NULL,
            guests INTEGER NOT NULL CHECK (guests >= 1),
            total_price REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'confirmed',
            booking_code TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX idx_bookings_room_status ON bookings(room_id, status);
        CREATE INDEX idx_bookings_user ON bookings(user_id);",
    ),
];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
