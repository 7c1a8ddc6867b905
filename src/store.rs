//! Persistence collaborator used by the handlers.
//!
//! Records are plain data; everything that touches the database goes
//! through [`Store`], so handlers can be exercised against any backend.

use chrono::{DateTime, Utc};
use derive_builder::Builder;

use crate::apartment::{Apartment, ApartmentDraft, ApartmentId, ApartmentType};
use crate::booking::{Booking, BookingId, BookingStatus, NewBooking};
use crate::error::StoreError;
use crate::user::{User, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct ApartmentFilter {
    pub available: Option<bool>,
    pub apartment_type: Option<ApartmentType>,
    /// Case-insensitive match over title, description and address.
    pub search: Option<String>,
    pub newest_first: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub trait Store: Send + Sync {
    fn apartment(&self, id: ApartmentId) -> StoreResult<Option<Apartment>>;
    fn apartments(&self, filter: &ApartmentFilter) -> StoreResult<Vec<Apartment>>;
    /// Ignores `limit` and `offset`.
    fn count_apartments(&self, filter: &ApartmentFilter) -> StoreResult<usize>;
    /// Apartments for the given ids, in the order of `ids`; unknown ids are skipped.
    fn apartments_by_ids(&self, ids: &[ApartmentId]) -> StoreResult<Vec<Apartment>>;
    fn insert_apartment(
        &self,
        draft: &ApartmentDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Apartment>;
    /// Full-record replacement. `StoreError::NotFound` if the id is unknown.
    fn update_apartment(
        &self,
        id: ApartmentId,
        draft: &ApartmentDraft,
        now: DateTime<Utc>,
    ) -> StoreResult<Apartment>;
    /// Deletes the apartment and its bookings. Returns false if nothing was deleted.
    fn delete_apartment(&self, id: ApartmentId) -> StoreResult<bool>;

    fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;
    /// Newest first; all bookings when `owner` is `None`.
    fn bookings(&self, owner: Option<UserId>) -> StoreResult<Vec<Booking>>;
    /// Prices the stay from the apartment's current price and inserts it atomically.
    fn create_booking(&self, booking: &NewBooking, now: DateTime<Utc>) -> StoreResult<Booking>;
    fn set_booking_status(&self, id: BookingId, status: BookingStatus) -> StoreResult<Booking>;

    fn user(&self, id: UserId) -> StoreResult<Option<User>>;
    /// Finds the user by name, creating it if needed, and syncs the staff flag.
    fn ensure_user(&self, username: &str, is_staff: bool) -> StoreResult<User>;
}
