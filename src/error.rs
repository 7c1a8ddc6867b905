use std::fmt::Display;

use serde::Serialize;

use crate::route::Route;

/// Field name used for errors that are not bound to a single input.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Required,
    Invalid,
    FieldTooShort,
    OutOfRange,
    PastDate,
    InvalidRange,
    MinimumStay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: ValidationKind,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            message: message.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Rejections collected from one form submission, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| e.field == field)
    }

    pub fn has(&self, field: &str, kind: ValidationKind) -> bool {
        self.for_field(field).any(|e| e.kind == kind)
    }

    /// Keeps the accepted value, or records the rejection and yields `None`.
    pub fn collect<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }
}

impl From<FieldError> for FormErrors {
    fn from(value: FieldError) -> Self {
        Self(vec![value])
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("decimal column {column}: {source}")]
    Decimal {
        column: &'static str,
        source: rust_decimal::Error,
    },
    #[error("timestamp column {column}: {source}")]
    Timestamp {
        column: &'static str,
        source: chrono::ParseError,
    },
    #[error("unknown {column} value '{value}'")]
    Enum { column: &'static str, value: String },
    #[error("record not found")]
    NotFound,
    #[error("database connection lock poisoned")]
    Poisoned,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("forbidden: {message}")]
    Forbidden { message: String, fallback: Route },
    #[error("authentication required")]
    Unauthenticated,
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::from(StoreError::from(value))
    }
}
