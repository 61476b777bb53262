//! Request and resource validation framework.
//!
//! - **Rules**: required fields, length limits, identifier/slug/domain
//!   formats, set membership
//! - **Validators**: the `Validate` trait plus `FieldValidator` and
//!   `RequestValidator` builders
//! - **Errors**: per-field error tracking with nested field paths
//!
//! Policy schemas validate resource instances with this module before any
//! conditional permission check, and handlers validate request bodies with it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use saas_core::validation::{validate_field, validate_request, Domain, Required, Validate};
//!
//! impl Validate for UpdateOrganizationRequest {
//!     fn validate(&self) -> ValidationResult<()> {
//!         validate_request()
//!             .field(validate_field("name", &self.name).rule(Required))
//!             .field(validate_field("domain", &self.domain).rule(Domain))
//!             .result()
//!     }
//! }
//! ```

pub mod error;
pub mod rules;
pub mod validator;

// ═══════════════════════════════════════════════════════════════════════════════
// Re-exports
// ═══════════════════════════════════════════════════════════════════════════════

pub use error::{FieldError, OptionExt, ValidationErrorKind, ValidationErrors, ValidationResult};

pub use rules::{
    Domain, Identifier, MaxLength, MinLength, OneOf, Required, Slug, ValidationRule,
    MAX_IDENTIFIER_LENGTH,
};

pub use validator::{validate_field, validate_request, FieldValidator, RequestValidator, Validate};

// ═══════════════════════════════════════════════════════════════════════════════
// Integration with the Application Error System
// ═══════════════════════════════════════════════════════════════════════════════

use crate::error::AppError;

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let internal = errors.to_string();
        AppError::validation("Validation error")
            .with_field_errors(errors.to_message_map())
            .with_internal_message(internal)
            .with_source(errors)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
