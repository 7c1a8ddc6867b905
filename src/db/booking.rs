use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::booking::{total_price, Booking, BookingId, BookingStatus, NewBooking};
use crate::error::StoreError;
use crate::store::StoreResult;
use crate::user::UserId;

use super::schema::{APARTMENTS, BOOKINGS, BOOKING_COLUMNS};
use super::utils::{
    date_from_sql, date_to_sql, decimal_from_sql, enum_from_sql, query_wrapper,
    timestamp_from_sql, timestamp_to_sql,
};

struct BookingRow {
    id: BookingId,
    apartment_id: i64,
    user_id: UserId,
    start_date: String,
    end_date: String,
    status: String,
    total_price: String,
    notes: Option<String>,
    created_at: String,
}

impl BookingRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            apartment_id: row.get(1)?,
            user_id: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            status: row.get(5)?,
            total_price: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(value: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: value.id,
            apartment_id: value.apartment_id,
            user_id: value.user_id,
            start_date: date_from_sql("start_date", &value.start_date)?,
            end_date: date_from_sql("end_date", &value.end_date)?,
            status: enum_from_sql("status", value.status)?,
            total_price: decimal_from_sql("total_price", &value.total_price)?,
            notes: value.notes,
            created_at: timestamp_from_sql("created_at", &value.created_at)?,
        })
    }
}

pub fn select_one(conn: &Connection, id: BookingId) -> StoreResult<Option<Booking>> {
    let query = query_wrapper(format!(
        "SELECT {BOOKING_COLUMNS} FROM {BOOKINGS} WHERE id = ?1"
    ));
    let row = conn
        .query_row(&query, params![id], BookingRow::from_row)
        .optional()?;
    row.map(Booking::try_from).transpose()
}

pub fn select(conn: &Connection, owner: Option<UserId>) -> StoreResult<Vec<Booking>> {
    let query = query_wrapper(format!(
        "SELECT {BOOKING_COLUMNS} FROM {BOOKINGS}
        WHERE ?1 IS NULL OR user_id = ?1
        ORDER BY created_at DESC, id DESC"
    ));
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map(params![owner], BookingRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(Booking::try_from).collect()
}

/// Reads the apartment price and inserts the booking in one transaction,
/// so the frozen total always matches the price at creation time.
pub fn insert(
    conn: &mut Connection,
    booking: &NewBooking,
    now: DateTime<Utc>,
) -> StoreResult<Booking> {
    let tx = conn.transaction()?;
    let price: Option<String> = tx
        .query_row(
            &query_wrapper(format!("SELECT price FROM {APARTMENTS} WHERE id = ?1")),
            params![booking.apartment_id],
            |row| row.get(0),
        )
        .optional()?;
    let price = decimal_from_sql("price", &price.ok_or(StoreError::NotFound)?)?;
    let total = total_price(price, &booking.stay);

    let query = query_wrapper(format!(
        "INSERT INTO {BOOKINGS} (apartment_id, user_id, start_date, end_date, status,
            total_price, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    ));
    tx.execute(
        &query,
        params![
            booking.apartment_id,
            booking.user_id,
            date_to_sql(&booking.stay.start),
            date_to_sql(&booking.stay.end),
            BookingStatus::default().as_str(),
            total.to_string(),
            booking.notes,
            timestamp_to_sql(&now),
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    select_one(conn, id)?.ok_or(StoreError::NotFound)
}

pub fn update_status(
    conn: &Connection,
    id: BookingId,
    status: BookingStatus,
) -> StoreResult<Booking> {
    let query = query_wrapper(format!("UPDATE {BOOKINGS} SET status = ?1 WHERE id = ?2"));
    if conn.execute(&query, params![status.as_str(), id])? == 0 {
        return Err(StoreError::NotFound);
    }
    select_one(conn, id)?.ok_or(StoreError::NotFound)
}
