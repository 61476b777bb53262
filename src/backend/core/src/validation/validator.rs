//! Validator trait and builders.
//!
//! - `Validate` trait for synchronous validation
//! - `FieldValidator` for building field-level validation chains
//! - `RequestValidator` for validating entire request objects

use crate::validation::error::{FieldError, ValidationErrorKind, ValidationErrors, ValidationResult};
use crate::validation::rules::ValidationRule;

// ═══════════════════════════════════════════════════════════════════════════════
// Validate Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Trait for types that can be validated.
///
/// # Example
///
/// ```rust,ignore
/// use saas_core::validation::{validate_field, validate_request, Required, Validate};
///
/// struct RenameOrganization {
///     name: String,
/// }
///
/// impl Validate for RenameOrganization {
///     fn validate(&self) -> ValidationResult<()> {
///         validate_request()
///             .field(validate_field("name", &self.name).rule(Required))
///             .result()
///     }
/// }
/// ```
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;

    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate and return self if valid, otherwise return errors.
    fn validated(self) -> ValidationResult<Self>
    where
        Self: Sized,
    {
        self.validate()?;
        Ok(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Field Validator
// ═══════════════════════════════════════════════════════════════════════════════

/// A builder for validating a single field with multiple rules.
pub struct FieldValidator<'a, T> {
    field_name: &'a str,
    value: &'a T,
    errors: Vec<FieldError>,
    stop_on_first_error: bool,
}

impl<'a, T> FieldValidator<'a, T> {
    pub fn new(field_name: &'a str, value: &'a T) -> Self {
        Self {
            field_name,
            value,
            errors: Vec::new(),
            stop_on_first_error: false,
        }
    }

    /// Stop validation on the first error (fail-fast mode).
    pub fn stop_on_first(mut self) -> Self {
        self.stop_on_first_error = true;
        self
    }

    fn halted(&self) -> bool {
        self.stop_on_first_error && !self.errors.is_empty()
    }

    /// Apply a validation rule.
    pub fn rule<R: ValidationRule<T>>(mut self, rule: R) -> Self {
        if self.halted() {
            return self;
        }

        if let Some(error) = rule.validate(self.value) {
            self.errors.push(error);
        }
        self
    }

    /// Apply a boolean check.
    pub fn must<F>(mut self, predicate: F, error_kind: ValidationErrorKind) -> Self
    where
        F: FnOnce(&T) -> bool,
    {
        if self.halted() {
            return self;
        }

        if !predicate(self.value) {
            self.errors.push(FieldError::new(error_kind));
        }
        self
    }

    pub fn field_name(&self) -> &str {
        self.field_name
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    pub fn result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let mut validation_errors = ValidationErrors::new();
        for error in self.errors {
            validation_errors.add(self.field_name, error);
        }
        Err(validation_errors)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Validator
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects field validators into one result.
#[derive(Default)]
pub struct RequestValidator {
    errors: ValidationErrors,
}

impl RequestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a field and collect any errors.
    pub fn field<T>(mut self, validator: FieldValidator<'_, T>) -> Self {
        let field_name = validator.field_name().to_string();
        for error in validator.into_errors() {
            self.errors.add(&field_name, error);
        }
        self
    }

    /// Validate a nested object under a field prefix.
    pub fn nested<V: Validate>(mut self, prefix: &str, value: &V) -> Self {
        if let Err(nested_errors) = value.validate() {
            self.errors.merge_with_prefix(prefix, nested_errors);
        }
        self
    }

    /// Apply a custom validation function.
    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut ValidationErrors),
    {
        f(&mut self.errors);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn result(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helper Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Start validating a single field.
pub fn validate_field<'a, T>(field_name: &'a str, value: &'a T) -> FieldValidator<'a, T> {
    FieldValidator::new(field_name, value)
}

/// Start validating a request object.
pub fn validate_request() -> RequestValidator {
    RequestValidator::new()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::rules::{Identifier, MaxLength, Required};

    struct Membership {
        user_id: String,
        role: String,
    }

    impl Validate for Membership {
        fn validate(&self) -> ValidationResult<()> {
            validate_request()
                .field(validate_field("userId", &self.user_id).rule(Identifier))
                .field(
                    validate_field("role", &self.role)
                        .must(|r| r.chars().all(|c| c.is_ascii_uppercase()), ValidationErrorKind::Custom {
                            code: "role_case".into(),
                        }),
                )
                .result()
        }
    }

    #[test]
    fn test_field_validator_collects_all_errors() {
        let value = "   ".to_string();
        let errors = validate_field("name", &value)
            .rule(Required)
            .rule(MaxLength(2))
            .into_errors();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_field_validator_stop_on_first() {
        let value = "   ".to_string();
        let validator = validate_field("name", &value)
            .stop_on_first()
            .rule(Required)
            .rule(MaxLength(2));
        assert!(!validator.is_valid());
        assert_eq!(validator.into_errors().len(), 1);
    }

    #[test]
    fn test_request_validator_nested() {
        let membership = Membership {
            user_id: "".into(),
            role: "admin".into(),
        };

        let errors = validate_request()
            .nested("membership", &membership)
            .result()
            .unwrap_err();

        assert!(errors.has_errors("membership.userId"));
        assert!(errors.has_errors("membership.role"));
    }

    #[test]
    fn test_validated_returns_value() {
        let membership = Membership {
            user_id: "u-1".into(),
            role: "ADMIN".into(),
        };
        assert!(membership.is_valid());
        assert_eq!(membership.validated().unwrap().user_id, "u-1");
    }

    #[test]
    fn test_custom_rule_on_request() {
        let result = validate_request()
            .custom(|errors| errors.add_required("slug"))
            .result();
        assert!(result.unwrap_err().has_errors("slug"));
    }
}
