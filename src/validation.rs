//! Field rules for apartment and booking submissions.
//!
//! Every rule is a pure function over the raw submitted text: it either
//! yields the cleaned value or a [`FieldError`] scoped to its field.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{FieldError, FormErrors, ValidationKind, NON_FIELD_ERRORS};

pub const TITLE_MIN_LEN: usize = 5;
pub const DESCRIPTION_MIN_LEN: usize = 20;
pub const ADDRESS_MIN_LEN: usize = 10;
pub const PRICE_MAX: i64 = 10_000_000;
pub const AREA_MIN: f64 = 10.0;
pub const AREA_MAX: f64 = 1000.0;
pub const FLOOR_MIN: i32 = 1;
pub const FLOOR_MAX: i32 = 100;
pub const MIN_STAY_DAYS: i64 = 1;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// max_digits=10, decimal_places=2
static PRICE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(\d{1,8})(\.\d{1,2})?$").expect("static price pattern"));

fn required(field: &'static str, value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(
            field,
            ValidationKind::Required,
            "This field is required",
        ));
    }
    Ok(value.to_string())
}

fn min_length(
    field: &'static str,
    value: &str,
    min: usize,
    message: &str,
) -> Result<String, FieldError> {
    let value = required(field, value)?;
    if value.chars().count() < min {
        return Err(FieldError::new(
            field,
            ValidationKind::FieldTooShort,
            message,
        ));
    }
    Ok(value)
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> Result<T, FieldError> {
    required(field, value)?
        .parse()
        .map_err(|_| FieldError::new(field, ValidationKind::Invalid, "Enter a number"))
}

pub fn clean_title(value: &str) -> Result<String, FieldError> {
    min_length(
        "title",
        value,
        TITLE_MIN_LEN,
        "Title must be at least 5 characters long",
    )
}

pub fn clean_description(value: &str) -> Result<String, FieldError> {
    min_length(
        "description",
        value,
        DESCRIPTION_MIN_LEN,
        "Description must be at least 20 characters long",
    )
}

pub fn clean_address(value: &str) -> Result<String, FieldError> {
    min_length(
        "address",
        value,
        ADDRESS_MIN_LEN,
        "Address must be at least 10 characters long",
    )
}

pub fn clean_price(value: &str) -> Result<Decimal, FieldError> {
    let value = required("price", value)?;
    if !PRICE_FORMAT.is_match(&value) {
        return Err(FieldError::new(
            "price",
            ValidationKind::Invalid,
            "Enter a number with at most 8 whole digits and 2 decimal places",
        ));
    }
    let price = Decimal::from_str(&value)
        .map_err(|_| FieldError::new("price", ValidationKind::Invalid, "Enter a number"))?;
    check_price(price)
}

pub fn check_price(price: Decimal) -> Result<Decimal, FieldError> {
    if price <= Decimal::ZERO {
        return Err(FieldError::new(
            "price",
            ValidationKind::OutOfRange,
            "Price must be greater than 0",
        ));
    }
    if price > Decimal::from(PRICE_MAX) {
        return Err(FieldError::new(
            "price",
            ValidationKind::OutOfRange,
            "Price cannot exceed 10,000,000$",
        ));
    }
    Ok(price)
}

pub fn clean_square_meters(value: &str) -> Result<f64, FieldError> {
    let area: f64 = parse_number("square_meters", value)?;
    if !area.is_finite() {
        return Err(FieldError::new(
            "square_meters",
            ValidationKind::Invalid,
            "Enter a number",
        ));
    }
    if area < AREA_MIN {
        return Err(FieldError::new(
            "square_meters",
            ValidationKind::OutOfRange,
            "Area must be at least 10 m²",
        ));
    }
    if area > AREA_MAX {
        return Err(FieldError::new(
            "square_meters",
            ValidationKind::OutOfRange,
            "Area cannot exceed 1000 m²",
        ));
    }
    Ok(area)
}

pub fn clean_floor(value: &str) -> Result<i32, FieldError> {
    let floor: i32 = parse_number("floor", value)?;
    if floor < FLOOR_MIN {
        return Err(FieldError::new(
            "floor",
            ValidationKind::OutOfRange,
            "Floor must be at least 1",
        ));
    }
    if floor > FLOOR_MAX {
        return Err(FieldError::new(
            "floor",
            ValidationKind::OutOfRange,
            "Floor cannot exceed 100",
        ));
    }
    Ok(floor)
}

pub fn clean_date(field: &'static str, value: &str) -> Result<NaiveDate, FieldError> {
    let value = required(field, value)?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| {
        FieldError::new(
            field,
            ValidationKind::Invalid,
            "Enter a valid date (YYYY-MM-DD)",
        )
    })
}

/// Cross-field booking rule, run once both dates parsed.
/// Returns the stay length in whole days.
pub fn check_stay(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<i64, FormErrors> {
    let mut errors = FormErrors::new();
    if start < today {
        errors.push(FieldError::new(
            "start_date",
            ValidationKind::PastDate,
            "Start date cannot be in the past",
        ));
    }
    if end <= start {
        errors.push(FieldError::new(
            "end_date",
            ValidationKind::InvalidRange,
            "End date must be after start date",
        ));
    }
    let days = (end - start).num_days();
    if days < MIN_STAY_DAYS {
        errors.push(FieldError::new(
            NON_FIELD_ERRORS,
            ValidationKind::MinimumStay,
            "Minimum stay is 1 day",
        ));
    }
    if errors.is_empty() {
        Ok(days)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn title_length_is_counted_in_characters() {
        assert_eq!(
            clean_title("Cozy").unwrap_err().kind,
            ValidationKind::FieldTooShort
        );
        assert_eq!(clean_title("  Loft!  ").unwrap(), "Loft!");
        // Cyrillic letters are two bytes each in UTF-8.
        assert_eq!(clean_title("Кварт").unwrap(), "Кварт");
        assert_eq!(clean_title("   ").unwrap_err().kind, ValidationKind::Required);
    }

    #[test]
    fn description_and_address_minimums() {
        assert!(clean_description("Too short to pass").is_err());
        assert!(clean_description("Exactly twenty chars").is_ok());
        assert!(clean_address("Main st 1").is_err());
        assert!(clean_address("Main st 10").is_ok());
    }

    #[test]
    fn price_bounds_share_one_kind_with_distinct_messages() {
        let zero = clean_price("0").unwrap_err();
        let huge = clean_price("10000000.01").unwrap_err();
        assert_eq!(zero.kind, ValidationKind::OutOfRange);
        assert_eq!(huge.kind, ValidationKind::OutOfRange);
        assert_ne!(zero.message, huge.message);
        assert_eq!(
            clean_price("-5").unwrap_err().kind,
            ValidationKind::OutOfRange
        );
        assert_eq!(clean_price("0.01").unwrap(), Decimal::new(1, 2));
        assert_eq!(clean_price("10000000").unwrap(), Decimal::from(PRICE_MAX));
    }

    #[test]
    fn malformed_price_is_invalid() {
        for raw in ["abc", "1.234", "1e5", "123456789", ""] {
            let err = clean_price(raw).unwrap_err();
            assert!(
                matches!(err.kind, ValidationKind::Invalid | ValidationKind::Required),
                "{raw}: {err:?}"
            );
        }
    }

    #[test]
    fn area_and_floor_are_inclusive_ranges() {
        assert_eq!(clean_square_meters("10").unwrap(), 10.0);
        assert_eq!(clean_square_meters("1000").unwrap(), 1000.0);
        assert!(clean_square_meters("9.99").is_err());
        assert!(clean_square_meters("1000.1").is_err());
        assert_eq!(
            clean_square_meters("NaN").unwrap_err().kind,
            ValidationKind::Invalid
        );
        assert_eq!(clean_floor("1").unwrap(), 1);
        assert_eq!(clean_floor("100").unwrap(), 100);
        assert_eq!(clean_floor("0").unwrap_err().kind, ValidationKind::OutOfRange);
        assert_eq!(
            clean_floor("101").unwrap_err().kind,
            ValidationKind::OutOfRange
        );
        assert_eq!(clean_floor("2.5").unwrap_err().kind, ValidationKind::Invalid);
    }

    #[test]
    fn stay_in_the_past_is_rejected() {
        let today = date("2025-01-10");
        let errors = check_stay(date("2025-01-09"), date("2025-01-12"), today).unwrap_err();
        assert!(errors.has("start_date", ValidationKind::PastDate));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn end_must_follow_start() {
        let today = date("2025-01-10");
        let same = check_stay(date("2025-01-12"), date("2025-01-12"), today).unwrap_err();
        assert!(same.has("end_date", ValidationKind::InvalidRange));
        assert!(same.has(NON_FIELD_ERRORS, ValidationKind::MinimumStay));
        let reversed = check_stay(date("2025-01-15"), date("2025-01-12"), today).unwrap_err();
        assert!(reversed.has("end_date", ValidationKind::InvalidRange));
    }

    #[test]
    fn valid_stay_counts_nights() {
        let today = date("2025-01-10");
        assert_eq!(
            check_stay(date("2025-01-10"), date("2025-01-15"), today).unwrap(),
            5
        );
        assert_eq!(
            check_stay(date("2025-01-10"), date("2025-01-11"), today).unwrap(),
            1
        );
    }

    #[test]
    fn dates_must_parse() {
        assert_eq!(
            clean_date("start_date", "10/01/2025").unwrap_err().kind,
            ValidationKind::Invalid
        );
        assert_eq!(
            clean_date("start_date", "").unwrap_err().kind,
            ValidationKind::Required
        );
        assert_eq!(
            clean_date("end_date", "2025-01-15").unwrap(),
            date("2025-01-15")
        );
    }
}
