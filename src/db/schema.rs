use rusqlite::Connection;

use super::utils::query_wrapper;

pub const USERS: &str = "users";
pub const APARTMENTS: &str = "apartments";
pub const BOOKINGS: &str = "bookings";

pub const APARTMENT_COLUMNS: &str = "id, title, description, apartment_type, price, \
    square_meters, floor, address, photo, is_available, created_at, updated_at";
pub const BOOKING_COLUMNS: &str =
    "id, apartment_id, user_id, start_date, end_date, status, total_price, notes, created_at";
pub const USER_COLUMNS: &str = "id, username, is_staff";

pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    let query = query_wrapper(format!(
        "CREATE TABLE IF NOT EXISTS {USERS} (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            username  TEXT NOT NULL UNIQUE,
            is_staff  INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS {APARTMENTS} (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            title          TEXT NOT NULL,
            description    TEXT NOT NULL,
            apartment_type TEXT NOT NULL,
            price          TEXT NOT NULL,
            square_meters  REAL NOT NULL,
            floor          INTEGER NOT NULL,
            address        TEXT NOT NULL,
            photo          TEXT,
            is_available   INTEGER NOT NULL DEFAULT 1,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {BOOKINGS} (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            apartment_id INTEGER NOT NULL REFERENCES {APARTMENTS}(id) ON DELETE CASCADE,
            user_id      INTEGER NOT NULL REFERENCES {USERS}(id),
            start_date   TEXT NOT NULL,
            end_date     TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            total_price  TEXT NOT NULL,
            notes        TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_bookings_user ON {BOOKINGS}(user_id);
        CREATE INDEX IF NOT EXISTS idx_bookings_apartment ON {BOOKINGS}(apartment_id);"
    ));
    conn.execute_batch(&query)?;
    Ok(())
}
