use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::apartment::ApartmentId;
use crate::error::FormErrors;
use crate::user::UserId;
use crate::validation;

pub type BookingId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Cancellation is one-way: nothing leaves `Cancelled`.
    pub fn can_become(&self, next: BookingStatus) -> bool {
        !matches!(self, BookingStatus::Cancelled) && *self != next
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub apartment_id: ApartmentId,
    pub user_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub total_price: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// A date range that passed the stay rules; `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stay {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub nights: i64,
}

/// Price of a stay, frozen into the booking when it is created.
pub fn total_price(unit_price: Decimal, stay: &Stay) -> Decimal {
    unit_price * Decimal::from(stay.nights)
}

/// Everything the store needs to create a booking except the price,
/// which it computes from the apartment inside the insert transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub apartment_id: ApartmentId,
    pub user_id: UserId,
    pub stay: Stay,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingForm {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingForm {
    pub fn validate(&self, today: NaiveDate) -> Result<(Stay, Option<String>), FormErrors> {
        let mut errors = FormErrors::new();
        let start = errors.collect(validation::clean_date("start_date", &self.start_date));
        let end = errors.collect(validation::clean_date("end_date", &self.end_date));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(errors);
        };
        let nights = validation::check_stay(start, end, today)?;
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok((Stay { start, end, nights }, notes))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusForm {
    pub status: String,
}
