use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::model::field::FieldValue;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$").unwrap());

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[12]\d{3}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").unwrap());

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.(jpe?g|png|gif|bmp|webp)$").unwrap());

const GENDERS: &[&str] = &["m", "f", "o"];

const CATEGORIES: &[&str] = &["nature", "people", "urban", "animals", "art", "other"];

/// One validation rule: a pure predicate over a typed value plus a stable
/// name and a human-readable description.
///
/// `Required` is special-cased by `Field::validate` because it concerns
/// absence, not value shape; `Unique` marks a field for the application-layer
/// duplicate probe and never fails on the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Required,
    Unique,
    NotEmpty,
    Length { min: usize, max: usize },
    Between { min: i64, max: i64 },
    ValidEmail,
    ValidPassword,
    IsoDate,
    ValidGender,
    ValidImageExtension,
    ValidCategory,
}

impl Constraint {
    /// Stable identifier, parametrized constraints include their bounds
    /// (e.g. `Length(1,20)`).
    pub fn name(&self) -> String {
        match self {
            Constraint::Required => "Required".to_string(),
            Constraint::Unique => "Unique".to_string(),
            Constraint::NotEmpty => "NotEmpty".to_string(),
            Constraint::Length { min, max } => format!("Length({},{})", min, max),
            Constraint::Between { min, max } => format!("Between({},{})", min, max),
            Constraint::ValidEmail => "ValidEmail".to_string(),
            Constraint::ValidPassword => "ValidPassword".to_string(),
            Constraint::IsoDate => "ISODate".to_string(),
            Constraint::ValidGender => "ValidGender".to_string(),
            Constraint::ValidImageExtension => "ValidImageExtension".to_string(),
            Constraint::ValidCategory => "ValidCategory".to_string(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Constraint::Required => "Field is required".to_string(),
            Constraint::Unique => "Value must not already be taken".to_string(),
            Constraint::NotEmpty => "Field must not be empty".to_string(),
            Constraint::Length { min, max } => {
                format!("Length should be from {} to {}", min, max)
            }
            Constraint::Between { min, max } => {
                format!("Value should be in range from {} to {}", min, max)
            }
            Constraint::ValidEmail => "Not a valid email address".to_string(),
            Constraint::ValidPassword => {
                "Password needs at least 8 characters with an uppercase letter, \
                 a lowercase letter and a digit"
                    .to_string()
            }
            Constraint::IsoDate => "Date format is yyyy-mm-dd".to_string(),
            Constraint::ValidGender => "Gender is one of: m, f, o".to_string(),
            Constraint::ValidImageExtension => {
                "Extension is one of: .jpg, .jpeg, .png, .gif, .bmp, .webp".to_string()
            }
            Constraint::ValidCategory => {
                format!("Category is one of: {}", CATEGORIES.join(", "))
            }
        }
    }

    /// Pure predicate over a present value. Constraints declared for a
    /// different value shape than the one supplied pass trivially; the
    /// schema definitions keep kinds and constraints aligned.
    pub fn is_satisfied(&self, value: &FieldValue) -> bool {
        match self {
            Constraint::Required => true,
            Constraint::Unique => true,
            Constraint::NotEmpty => value.as_text().map_or(true, |s| !s.is_empty()),
            Constraint::Length { min, max } => value
                .as_text()
                .map_or(true, |s| s.chars().count() >= *min && s.chars().count() <= *max),
            Constraint::Between { min, max } => {
                value.as_int().map_or(true, |x| x >= *min && x <= *max)
            }
            Constraint::ValidEmail => value.as_text().map_or(true, |s| EMAIL.is_match(s)),
            Constraint::ValidPassword => value.as_text().map_or(true, is_valid_password),
            Constraint::IsoDate => value.as_text().map_or(true, |s| ISO_DATE.is_match(s)),
            Constraint::ValidGender => value.as_text().map_or(true, |s| GENDERS.contains(&s)),
            Constraint::ValidImageExtension => {
                value.as_text().map_or(true, |s| IMAGE_EXTENSION.is_match(&s.to_lowercase()))
            }
            Constraint::ValidCategory => {
                value.as_text().map_or(true, |s| CATEGORIES.contains(&s))
            }
        }
    }

    pub fn to_error(&self) -> ValidationError {
        ValidationError { constraint: self.name(), description: self.description() }
    }
}

fn is_valid_password(s: &str) -> bool {
    s.len() >= 8
        && s.chars().any(|c| c.is_ascii_uppercase())
        && s.chars().any(|c| c.is_ascii_lowercase())
        && s.chars().any(|c| c.is_ascii_digit())
}

/// One failing constraint on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub constraint: String,
    pub description: String,
}
