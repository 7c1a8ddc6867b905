use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use crate::apartment::{Apartment, ApartmentDraft, ApartmentId};
use crate::error::StoreError;
use crate::store::{ApartmentFilter, StoreResult};

use super::schema::{APARTMENTS, APARTMENT_COLUMNS};
use super::utils::{
    decimal_from_sql, enum_from_sql, like_pattern, query_wrapper, timestamp_from_sql,
    timestamp_to_sql,
};

struct ApartmentRow {
    id: ApartmentId,
    title: String,
    description: String,
    apartment_type: String,
    price: String,
    square_meters: f64,
    floor: i32,
    address: String,
    photo: Option<String>,
    is_available: bool,
    created_at: String,
    updated_at: String,
}

impl ApartmentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            apartment_type: row.get(3)?,
            price: row.get(4)?,
            square_meters: row.get(5)?,
            floor: row.get(6)?,
            address: row.get(7)?,
            photo: row.get(8)?,
            is_available: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<ApartmentRow> for Apartment {
    type Error = StoreError;

    fn try_from(value: ApartmentRow) -> Result<Self, Self::Error> {
        Ok(Apartment {
            id: value.id,
            title: value.title,
            description: value.description,
            apartment_type: enum_from_sql("apartment_type", value.apartment_type)?,
            price: decimal_from_sql("price", &value.price)?,
            square_meters: value.square_meters,
            floor: value.floor,
            address: value.address,
            photo: value.photo,
            is_available: value.is_available,
            created_at: timestamp_from_sql("created_at", &value.created_at)?,
            updated_at: timestamp_from_sql("updated_at", &value.updated_at)?,
        })
    }
}

fn collect(rows: Vec<ApartmentRow>) -> StoreResult<Vec<Apartment>> {
    rows.into_iter().map(Apartment::try_from).collect()
}

pub fn select_one(conn: &Connection, id: ApartmentId) -> StoreResult<Option<Apartment>> {
    let query = query_wrapper(format!(
        "SELECT {APARTMENT_COLUMNS} FROM {APARTMENTS} WHERE id = ?1"
    ));
    let row = conn
        .query_row(&query, params![id], ApartmentRow::from_row)
        .optional()?;
    row.map(Apartment::try_from).transpose()
}

fn where_clause(filter: &ApartmentFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();
    if let Some(available) = filter.available {
        args.push(Value::Integer(available as i64));
        conditions.push(format!("is_available = ?{}", args.len()));
    }
    if let Some(apartment_type) = filter.apartment_type {
        args.push(Value::Text(apartment_type.code().to_string()));
        conditions.push(format!("apartment_type = ?{}", args.len()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        args.push(Value::Text(like_pattern(search)));
        let n = args.len();
        conditions.push(format!(
            "(casefold(title) LIKE ?{n} ESCAPE '\\' \
            OR casefold(description) LIKE ?{n} ESCAPE '\\' \
            OR casefold(address) LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if conditions.is_empty() {
        (String::new(), args)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), args)
    }
}

pub fn select(conn: &Connection, filter: &ApartmentFilter) -> StoreResult<Vec<Apartment>> {
    let (condition, args) = where_clause(filter);
    let order = if filter.newest_first {
        "ORDER BY created_at DESC, id DESC"
    } else {
        "ORDER BY id ASC"
    };
    let mut page = String::new();
    if filter.limit.is_some() || filter.offset.is_some() {
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        page = format!("LIMIT {} OFFSET {}", limit, filter.offset.unwrap_or(0));
    }
    let query = query_wrapper(format!(
        "SELECT {APARTMENT_COLUMNS} FROM {APARTMENTS} {condition} {order} {page}"
    ));
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map(params_from_iter(args), ApartmentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    collect(rows)
}

pub fn count(conn: &Connection, filter: &ApartmentFilter) -> StoreResult<usize> {
    let (condition, args) = where_clause(filter);
    let query = query_wrapper(format!("SELECT COUNT(*) FROM {APARTMENTS} {condition}"));
    let total: i64 = conn.query_row(&query, params_from_iter(args), |row| row.get(0))?;
    Ok(total as usize)
}

pub fn select_by_ids(conn: &Connection, ids: &[ApartmentId]) -> StoreResult<Vec<Apartment>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = (1..=ids.len())
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let query = query_wrapper(format!(
        "SELECT {APARTMENT_COLUMNS} FROM {APARTMENTS} WHERE id IN ({placeholders})"
    ));
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), ApartmentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let found = collect(rows)?;
    // Keep the caller's order.
    Ok(ids
        .iter()
        .filter_map(|id| found.iter().find(|a| a.id == *id).cloned())
        .collect())
}

pub fn insert(
    conn: &Connection,
    draft: &ApartmentDraft,
    now: DateTime<Utc>,
) -> StoreResult<Apartment> {
    let query = query_wrapper(format!(
        "INSERT INTO {APARTMENTS} (title, description, apartment_type, price, square_meters,
            floor, address, photo, is_available, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)"
    ));
    conn.execute(
        &query,
        params![
            draft.title,
            draft.description,
            draft.apartment_type.code(),
            draft.price.to_string(),
            draft.square_meters,
            draft.floor,
            draft.address,
            draft.photo,
            draft.is_available,
            timestamp_to_sql(&now),
        ],
    )?;
    let id = conn.last_insert_rowid();
    select_one(conn, id)?.ok_or(StoreError::NotFound)
}

pub fn update(
    conn: &Connection,
    id: ApartmentId,
    draft: &ApartmentDraft,
    now: DateTime<Utc>,
) -> StoreResult<Apartment> {
    let current = select_one(conn, id)?.ok_or(StoreError::NotFound)?;
    // A clock that steps backwards must not move updated_at backwards.
    let updated_at = now.max(current.updated_at);
    let query = query_wrapper(format!(
        "UPDATE {APARTMENTS} SET title = ?1, description = ?2, apartment_type = ?3, price = ?4,
            square_meters = ?5, floor = ?6, address = ?7, photo = ?8, is_available = ?9,
            updated_at = ?10
        WHERE id = ?11"
    ));
    conn.execute(
        &query,
        params![
            draft.title,
            draft.description,
            draft.apartment_type.code(),
            draft.price.to_string(),
            draft.square_meters,
            draft.floor,
            draft.address,
            draft.photo,
            draft.is_available,
            timestamp_to_sql(&updated_at),
            id,
        ],
    )?;
    select_one(conn, id)?.ok_or(StoreError::NotFound)
}

pub fn delete(conn: &Connection, id: ApartmentId) -> StoreResult<bool> {
    let query = query_wrapper(format!("DELETE FROM {APARTMENTS} WHERE id = ?1"));
    Ok(conn.execute(&query, params![id])? > 0)
}
