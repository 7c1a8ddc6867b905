use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FormErrors, ValidationKind};
use crate::validation;

pub type ApartmentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApartmentType {
    #[serde(rename = "ST")]
    Studio,
    #[serde(rename = "1B")]
    OneBedroom,
    #[serde(rename = "2B")]
    TwoBedroom,
    #[serde(rename = "3B")]
    ThreeBedroom,
    #[serde(rename = "PH")]
    Penthouse,
}

impl ApartmentType {
    pub const ALL: [ApartmentType; 5] = [
        ApartmentType::Studio,
        ApartmentType::OneBedroom,
        ApartmentType::TwoBedroom,
        ApartmentType::ThreeBedroom,
        ApartmentType::Penthouse,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ApartmentType::Studio => "ST",
            ApartmentType::OneBedroom => "1B",
            ApartmentType::TwoBedroom => "2B",
            ApartmentType::ThreeBedroom => "3B",
            ApartmentType::Penthouse => "PH",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApartmentType::Studio => "Studio",
            ApartmentType::OneBedroom => "1 Bedroom",
            ApartmentType::TwoBedroom => "2 Bedrooms",
            ApartmentType::ThreeBedroom => "3 Bedrooms",
            ApartmentType::Penthouse => "Penthouse",
        }
    }
}

impl FromStr for ApartmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApartmentType::ALL
            .into_iter()
            .find(|t| t.code() == s)
            .ok_or_else(|| s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(setter(into))]
pub struct Apartment {
    pub id: ApartmentId,
    pub title: String,
    pub description: String,
    pub apartment_type: ApartmentType,
    pub price: Decimal,
    pub square_meters: f64,
    pub floor: i32,
    pub address: String,
    #[builder(default)]
    pub photo: Option<String>,
    #[builder(default = "true")]
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for Apartment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}$", self.title, self.price)
    }
}

/// Validated apartment fields. Only a draft can be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ApartmentDraft {
    pub title: String,
    pub description: String,
    pub apartment_type: ApartmentType,
    pub price: Decimal,
    pub square_meters: f64,
    pub floor: i32,
    pub address: String,
    pub photo: Option<String>,
    pub is_available: bool,
}

/// Raw apartment submission, as posted by the create/update form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApartmentForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub apartment_type: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub square_meters: String,
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub photo: Option<String>,
    // Checkbox: present ("on") when ticked, absent otherwise.
    #[serde(default)]
    pub is_available: Option<String>,
}

impl ApartmentForm {
    /// Runs every field rule and returns the draft only when all of them pass.
    pub fn validate(&self) -> Result<ApartmentDraft, FormErrors> {
        let mut errors = FormErrors::new();
        let title = errors.collect(validation::clean_title(&self.title));
        let description = errors.collect(validation::clean_description(&self.description));
        let apartment_type = errors.collect(clean_apartment_type(&self.apartment_type));
        let price = errors.collect(validation::clean_price(&self.price));
        let square_meters = errors.collect(validation::clean_square_meters(&self.square_meters));
        let floor = errors.collect(validation::clean_floor(&self.floor));
        let address = errors.collect(validation::clean_address(&self.address));

        match (
            title,
            description,
            apartment_type,
            price,
            square_meters,
            floor,
            address,
        ) {
            (
                Some(title),
                Some(description),
                Some(apartment_type),
                Some(price),
                Some(square_meters),
                Some(floor),
                Some(address),
            ) if errors.is_empty() => Ok(ApartmentDraft {
                title,
                description,
                apartment_type,
                price,
                square_meters,
                floor,
                address,
                photo: self
                    .photo
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                is_available: self.is_available.as_deref().is_some_and(is_checked),
            }),
            _ => Err(errors),
        }
    }
}

impl From<&Apartment> for ApartmentForm {
    fn from(value: &Apartment) -> Self {
        Self {
            title: value.title.clone(),
            description: value.description.clone(),
            apartment_type: value.apartment_type.code().to_string(),
            price: value.price.to_string(),
            square_meters: value.square_meters.to_string(),
            floor: value.floor.to_string(),
            address: value.address.clone(),
            photo: value.photo.clone(),
            is_available: value.is_available.then(|| "on".to_string()),
        }
    }
}

fn is_checked(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "" | "0" | "off" | "false")
}

fn clean_apartment_type(value: &str) -> Result<ApartmentType, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(
            "apartment_type",
            ValidationKind::Required,
            "This field is required",
        ));
    }
    value.parse().map_err(|code| {
        FieldError::new(
            "apartment_type",
            ValidationKind::Invalid,
            format!("'{}' is not one of the available apartment types", code),
        )
    })
}
