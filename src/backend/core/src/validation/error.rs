//! Validation error types with field-level error support.
//!
//! Errors are keyed by field path (e.g. `ownerId`, `members[0].role`) and
//! kept in a sorted map so that responses and messages are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Validation Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// The kind of validation error that occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Field is required but was missing or empty.
    Required,
    /// Field is present but has the wrong primitive type.
    InvalidType { expected: String },
    /// String length is below the minimum.
    MinLength { min: usize, actual: usize },
    /// String length exceeds the maximum.
    MaxLength { max: usize, actual: usize },
    /// Value does not match the expected pattern.
    Pattern { pattern: String },
    /// Value is not in the allowed set.
    NotInSet { allowed: Vec<String> },
    /// Custom validation failed.
    Custom { code: String },
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "field is required"),
            Self::InvalidType { expected } => write!(f, "expected {}", expected),
            Self::MinLength { min, actual } => {
                write!(f, "must be at least {} characters (got {})", min, actual)
            }
            Self::MaxLength { max, actual } => {
                write!(f, "must be at most {} characters (got {})", max, actual)
            }
            Self::Pattern { pattern } => write!(f, "must match pattern: {}", pattern),
            Self::NotInSet { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
            Self::Custom { code } => write!(f, "validation failed: {}", code),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Field Error
// ═══════════════════════════════════════════════════════════════════════════════

/// A single validation error for a specific field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: ValidationErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl FieldError {
    pub fn new(kind: ValidationErrorKind) -> Self {
        let message = kind.to_string();
        Self { kind, message }
    }

    pub fn with_message(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Validation Errors Collection
// ═══════════════════════════════════════════════════════════════════════════════

/// A collection of validation errors organized by field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    #[serde(flatten)]
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of errors across all fields.
    pub fn error_count(&self) -> usize {
        self.errors.values().map(|v| v.len()).sum()
    }

    /// Number of fields with errors.
    pub fn field_count(&self) -> usize {
        self.errors.len()
    }

    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.errors.entry(field.into()).or_default().push(error);
    }

    pub fn add_error(&mut self, field: impl Into<String>, kind: ValidationErrorKind) {
        self.add(field, FieldError::new(kind));
    }

    pub fn add_with_message(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.add(field, FieldError::with_message(kind, message));
    }

    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add_error(field, ValidationErrorKind::Required);
    }

    pub fn get(&self, field: &str) -> Option<&Vec<FieldError>> {
        self.errors.get(field)
    }

    pub fn has_errors(&self, field: &str) -> bool {
        self.errors.get(field).map(|v| !v.is_empty()).unwrap_or(false)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    /// Merge errors under a field prefix (for nested validation).
    pub fn merge_with_prefix(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, errors) in other.errors {
            let prefixed_field = if field.is_empty() {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, field)
            };
            self.errors.entry(prefixed_field).or_default().extend(errors);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.errors.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<FieldError>)> {
        self.errors.iter()
    }

    /// Field -> messages, the shape returned to API clients.
    pub fn to_message_map(&self) -> BTreeMap<String, Vec<String>> {
        self.errors
            .iter()
            .map(|(field, errors)| {
                (
                    field.clone(),
                    errors.iter().map(|e| e.message.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn first_error(&self) -> Option<(&String, &FieldError)> {
        self.errors
            .iter()
            .next()
            .and_then(|(field, errors)| errors.first().map(|error| (field, error)))
    }

    pub fn to_flat_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| format!("{}: {}", field, e.message))
            })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_flat_messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ═══════════════════════════════════════════════════════════════════════════════
// Validation Result Type
// ═══════════════════════════════════════════════════════════════════════════════

/// Result type for validation operations.
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

/// Extension trait for converting Option to ValidationResult.
pub trait OptionExt<T> {
    /// Convert None to a required field error.
    fn required(self, field: &str) -> ValidationResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, field: &str) -> ValidationResult<T> {
        match self {
            Some(value) => Ok(value),
            None => {
                let mut errors = ValidationErrors::new();
                errors.add_required(field);
                Err(errors)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let error = FieldError::new(ValidationErrorKind::Required);
        assert_eq!(error.to_string(), "field is required");

        let error = FieldError::new(ValidationErrorKind::InvalidType {
            expected: "string or null".into(),
        });
        assert_eq!(error.to_string(), "expected string or null");
    }

    #[test]
    fn test_validation_errors_add_and_get() {
        let mut errors = ValidationErrors::new();
        errors.add_required("id");
        errors.add_error("ownerId", ValidationErrorKind::MinLength { min: 1, actual: 0 });

        assert_eq!(errors.field_count(), 2);
        assert_eq!(errors.error_count(), 2);
        assert!(errors.has_errors("id"));
        assert!(errors.has_errors("ownerId"));
        assert!(!errors.has_errors("name"));
    }

    #[test]
    fn test_validation_errors_multiple_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add_required("name");
        errors.add_error("name", ValidationErrorKind::MaxLength { max: 3, actual: 5 });
        assert_eq!(errors.field_count(), 1);
        assert_eq!(errors.get("name").unwrap().len(), 2);
    }

    #[test]
    fn test_validation_errors_merge_with_prefix() {
        let mut parent = ValidationErrors::new();
        let mut child = ValidationErrors::new();
        child.add_required("ownerId");
        child.add_required("");

        parent.merge_with_prefix("organization", child);

        assert!(parent.has_errors("organization.ownerId"));
        assert!(parent.has_errors("organization"));
    }

    #[test]
    fn test_message_map_and_first_error_are_ordered() {
        let mut errors = ValidationErrors::new();
        errors.add_required("ownerId");
        errors.add_required("id");

        let (field, error) = errors.first_error().unwrap();
        assert_eq!(field, "id");
        assert_eq!(error.kind, ValidationErrorKind::Required);

        let map = errors.to_message_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["id", "ownerId"]);
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add_required("name");
        let display = errors.to_string();
        assert!(display.contains("name"));
        assert!(display.contains("required"));
    }

    #[test]
    fn test_option_required() {
        let value: Option<&str> = Some("org-1");
        assert_eq!(value.required("id").unwrap(), "org-1");

        let none_value: Option<&str> = None;
        assert!(none_value.required("id").unwrap_err().has_errors("id"));
    }
}
