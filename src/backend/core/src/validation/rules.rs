//! Validation rules used by request bodies and policy schemas.
//!
//! - Required field validation
//! - String length constraints
//! - Opaque identifiers
//! - Slug and domain formats
//! - Set membership

use crate::validation::error::{FieldError, ValidationErrorKind};
use regex::Regex;
use std::sync::LazyLock;

/// Longest identifier accepted for users, organizations and resources.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

// ═══════════════════════════════════════════════════════════════════════════════
// Pre-compiled Regex Patterns
// ═══════════════════════════════════════════════════════════════════════════════

/// Slug validation regex (lowercase letters, numbers, hyphens).
static SLUG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Invalid slug regex")
});

/// Bare DNS domain, no scheme or path.
static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}$"
    ).expect("Invalid domain regex")
});

// ═══════════════════════════════════════════════════════════════════════════════
// Validation Rule Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A validation rule that can be applied to a value.
pub trait ValidationRule<T: ?Sized> {
    /// Validate the value and return any errors.
    fn validate(&self, value: &T) -> Option<FieldError>;

    /// Get a description of this rule.
    fn description(&self) -> String;
}

/// Lifts a string rule to optional strings; `None` passes.
macro_rules! impl_optional_string_rule {
    ($($rule:ty),* $(,)?) => {
        $(
            impl ValidationRule<Option<String>> for $rule {
                fn validate(&self, value: &Option<String>) -> Option<FieldError> {
                    value
                        .as_ref()
                        .and_then(|s| <$rule as ValidationRule<String>>::validate(self, s))
                }

                fn description(&self) -> String {
                    <$rule as ValidationRule<String>>::description(self)
                }
            }
        )*
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Required Field Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates a field is present and non-blank.
#[derive(Debug, Clone)]
pub struct Required;

impl ValidationRule<String> for Required {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if value.trim().is_empty() {
            Some(FieldError::new(ValidationErrorKind::Required))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        "field is required".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// String Length Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates string minimum length.
#[derive(Debug, Clone)]
pub struct MinLength(pub usize);

impl ValidationRule<String> for MinLength {
    fn validate(&self, value: &String) -> Option<FieldError> {
        let len = value.chars().count();
        if len < self.0 {
            Some(FieldError::new(ValidationErrorKind::MinLength {
                min: self.0,
                actual: len,
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("minimum length: {}", self.0)
    }
}

/// Rule that validates string maximum length.
#[derive(Debug, Clone)]
pub struct MaxLength(pub usize);

impl ValidationRule<String> for MaxLength {
    fn validate(&self, value: &String) -> Option<FieldError> {
        let len = value.chars().count();
        if len > self.0 {
            Some(FieldError::new(ValidationErrorKind::MaxLength {
                max: self.0,
                actual: len,
            }))
        } else {
            None
        }
    }

    fn description(&self) -> String {
        format!("maximum length: {}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Format Rules
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates an opaque identifier.
///
/// Ids come from upstream systems, so any non-blank string up to
/// [`MAX_IDENTIFIER_LENGTH`] characters is accepted, as long as it carries no
/// control characters.
#[derive(Debug, Clone, Default)]
pub struct Identifier;

impl ValidationRule<String> for Identifier {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if value.trim().is_empty() {
            return Some(FieldError::new(ValidationErrorKind::Required));
        }
        let len = value.chars().count();
        if len > MAX_IDENTIFIER_LENGTH {
            return Some(FieldError::new(ValidationErrorKind::MaxLength {
                max: MAX_IDENTIFIER_LENGTH,
                actual: len,
            }));
        }
        if value.chars().any(char::is_control) {
            return Some(FieldError::new(ValidationErrorKind::Pattern {
                pattern: "identifier without control characters".to_string(),
            }));
        }
        None
    }

    fn description(&self) -> String {
        "valid identifier".to_string()
    }
}

/// Rule that validates slug format (lowercase, numbers, hyphens).
#[derive(Debug, Clone, Default)]
pub struct Slug;

impl ValidationRule<String> for Slug {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if SLUG_REGEX.is_match(value) {
            None
        } else {
            Some(FieldError::new(ValidationErrorKind::Pattern {
                pattern: "slug (lowercase letters, numbers, hyphens)".to_string(),
            }))
        }
    }

    fn description(&self) -> String {
        "valid slug format".to_string()
    }
}

/// Rule that validates a bare domain name such as `acme.com`.
#[derive(Debug, Clone, Default)]
pub struct Domain;

impl ValidationRule<String> for Domain {
    fn validate(&self, value: &String) -> Option<FieldError> {
        if DOMAIN_REGEX.is_match(value) {
            None
        } else {
            Some(FieldError::new(ValidationErrorKind::Pattern {
                pattern: "domain (e.g. acme.com)".to_string(),
            }))
        }
    }

    fn description(&self) -> String {
        "valid domain".to_string()
    }
}

impl_optional_string_rule!(MinLength, MaxLength, Identifier, Domain);

// ═══════════════════════════════════════════════════════════════════════════════
// Set Membership Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule that validates a value is in a predefined set.
#[derive(Debug, Clone)]
pub struct OneOf<T> {
    allowed: Vec<T>,
}

impl<T> OneOf<T> {
    pub fn new(allowed: Vec<T>) -> Self {
        Self { allowed }
    }
}

impl<T: PartialEq + ToString> ValidationRule<T> for OneOf<T> {
    fn validate(&self, value: &T) -> Option<FieldError> {
        if self.allowed.contains(value) {
            None
        } else {
            Some(FieldError::new(ValidationErrorKind::NotInSet {
                allowed: self.allowed.iter().map(|v| v.to_string()).collect(),
            }))
        }
    }

    fn description(&self) -> String {
        format!(
            "one of: {:?}",
            self.allowed.iter().map(|v| v.to_string()).collect::<Vec<_>>()
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
