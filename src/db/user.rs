use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::store::StoreResult;
use crate::user::{User, UserId};

use super::schema::{USERS, USER_COLUMNS};
use super::utils::query_wrapper;

fn from_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_staff: row.get(2)?,
    })
}

pub fn select_one(conn: &Connection, id: UserId) -> StoreResult<Option<User>> {
    let query = query_wrapper(format!("SELECT {USER_COLUMNS} FROM {USERS} WHERE id = ?1"));
    Ok(conn.query_row(&query, params![id], from_row).optional()?)
}

pub fn select_by_name(conn: &Connection, username: &str) -> StoreResult<Option<User>> {
    let query = query_wrapper(format!(
        "SELECT {USER_COLUMNS} FROM {USERS} WHERE username = ?1"
    ));
    Ok(conn.query_row(&query, params![username], from_row).optional()?)
}

/// Reads the user and writes only if it is missing or its staff flag moved.
pub fn ensure(conn: &Connection, username: &str, is_staff: bool) -> StoreResult<User> {
    if let Some(user) = select_by_name(conn, username)? {
        if user.is_staff == is_staff {
            return Ok(user);
        }
    }
    let query = query_wrapper(format!(
        "INSERT INTO {USERS} (username, is_staff) VALUES (?1, ?2)
        ON CONFLICT(username) DO UPDATE SET is_staff = excluded.is_staff"
    ));
    conn.execute(&query, params![username, is_staff])?;
    log::info!("User '{}' stored, staff: {}", username, is_staff);
    select_by_name(conn, username)?.ok_or(StoreError::NotFound)
}
