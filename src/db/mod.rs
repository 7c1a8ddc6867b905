pub mod apartment;
pub mod booking;
pub mod schema;
pub mod user;
pub mod utils;

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::apartment::{Apartment, ApartmentDraft, ApartmentId};
use crate::booking::{Booking, BookingId, BookingStatus, NewBooking};
use crate::error::StoreError;
use crate::store::{ApartmentFilter, Store, StoreResult};
use crate::user::{User, UserId};

use utils::DatabaseSource;

/// SQLite-backed store. One connection, serialised behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(src: &DatabaseSource) -> StoreResult<Self> {
        let conn = utils::open(src)?;
        schema::create_tables(&conn)?;
        log::info!("Database ready: {:?}", src);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::open(&DatabaseSource::Memory)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for SqliteStore {
    fn apartment(&self, id: ApartmentId) -> StoreResult<Option<Apartment>> {
        let conn = self.conn()?;
        apartment::select_one(&conn, id)
    }

    fn apartments(&self, filter: &ApartmentFilter) -> StoreResult<Vec<Apartment>> {
        let conn = self.conn()?;
        apartment::select(&conn, filter)
    }

    fn count_apartments(&self, filter: &ApartmentFilter) -> StoreResult<usize> {
        let conn = self.conn()?;
        apartment::count(&conn, filter)
    }

    fn apartments_by_ids(&self, ids: &[ApartmentId]) -> StoreResult<Vec<Apartment>> {
        let conn = self.conn()?;
        apartment::select_by_ids(&conn, ids)
    }

    fn insert_apartment(
        &self,
        draft: &ApartmentDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Apartment> {
        let conn = self.conn()?;
        apartment::insert(&conn, draft, now)
    }

    fn update_apartment(
        &self,
        id: ApartmentId,
        draft: &ApartmentDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Apartment> {
        let conn = self.conn()?;
        apartment::update(&conn, id, draft, now)
    }

    fn delete_apartment(&self, id: ApartmentId) -> StoreResult<bool> {
        let conn = self.conn()?;
        apartment::delete(&conn, id)
    }

    fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let conn = self.conn()?;
        booking::select_one(&conn, id)
    }

    fn bookings(&self, owner: Option<UserId>) -> StoreResult<Vec<Booking>> {
        let conn = self.conn()?;
        booking::select(&conn, owner)
    }

    fn create_booking(&self, new: &NewBooking, now: DateTime<Utc>) -> StoreResult<Booking> {
        let mut conn = self.conn()?;
        booking::insert(&mut conn, new, now)
    }

    fn set_booking_status(&self, id: BookingId, status: BookingStatus) -> StoreResult<Booking> {
        let conn = self.conn()?;
        booking::update_status(&conn, id, status)
    }

    fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        user::select_one(&conn, id)
    }

    fn ensure_user(&self, username: &str, is_staff: bool) -> StoreResult<User> {
        let conn = self.conn()?;
        user::ensure(&conn, username, is_staff)
    }
}
