//! Policy schemas.
//!
//! Resource instances are validated against their type's declared shape
//! before they take part in conditional checks. Two entry points:
//! - typed subjects (`OrganizationSubject`, `ProjectSubject`, ...) used by handlers
//! - [`parse_subject`], which validates arbitrary JSON against the registry
//!
//! Both produce a [`ResourceInstance`], the only subject shape the ability
//! evaluator reads attributes from.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::subjects::{AttributeKind, ResourceType};
use crate::validation::{
    validate_field, validate_request, Identifier, OneOf, Validate, ValidationErrorKind,
    ValidationErrors, ValidationResult, ValidationRule,
};

/// Optional discriminator key accepted in JSON subjects.
pub const TYPENAME_KEY: &str = "__typename";

/// Error key used when the subject itself is not an object.
pub const ROOT_KEY: &str = "_root";

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Instance
// ═══════════════════════════════════════════════════════════════════════════════

/// A concrete resource: a type tag plus its declared attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInstance {
    resource_type: ResourceType,
    attributes: BTreeMap<String, Value>,
}

impl ResourceInstance {
    /// Build an instance without schema validation.
    ///
    /// Intended for tests and for callers that already hold trusted data;
    /// request-derived data should go through a schema.
    pub fn from_parts<I>(resource_type: ResourceType, attributes: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self {
            resource_type,
            attributes: attributes.into_iter().collect(),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Typed Subjects
// ═══════════════════════════════════════════════════════════════════════════════

/// A typed resource shape that validates into a [`ResourceInstance`].
pub trait SubjectSchema: Validate + Sized {
    const RESOURCE_TYPE: ResourceType;

    /// Attribute values in registry order.
    fn into_attributes(self) -> Vec<(&'static str, Value)>;

    /// Validate and convert.
    fn parse(self) -> ValidationResult<ResourceInstance> {
        self.validate()?;
        Ok(ResourceInstance::from_parts(
            Self::RESOURCE_TYPE,
            self.into_attributes()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value)),
        ))
    }
}

fn optional_id(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

/// With `deserialize_with` serde no longer defaults a missing key to `None`,
/// so the key must be present even when its value is `null`.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// `{ id, ownerId }` of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSubject {
    pub id: String,
    #[serde(deserialize_with = "required_nullable")]
    pub owner_id: Option<String>,
}

impl Validate for OrganizationSubject {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("id", &self.id).rule(Identifier))
            .field(validate_field("ownerId", &self.owner_id).rule(Identifier))
            .result()
    }
}

impl SubjectSchema for OrganizationSubject {
    const RESOURCE_TYPE: ResourceType = ResourceType::Organization;

    fn into_attributes(self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::String(self.id)),
            ("ownerId", optional_id(self.owner_id)),
        ]
    }
}

/// `{ id, ownerId }` of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSubject {
    pub id: String,
    #[serde(deserialize_with = "required_nullable")]
    pub owner_id: Option<String>,
}

impl Validate for ProjectSubject {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("id", &self.id).rule(Identifier))
            .field(validate_field("ownerId", &self.owner_id).rule(Identifier))
            .result()
    }
}

impl SubjectSchema for ProjectSubject {
    const RESOURCE_TYPE: ResourceType = ResourceType::Project;

    fn into_attributes(self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::String(self.id)),
            ("ownerId", optional_id(self.owner_id)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubject {
    pub id: String,
}

impl Validate for UserSubject {
    fn validate(&self) -> ValidationResult<()> {
        validate_field("id", &self.id).rule(Identifier).result()
    }
}

impl SubjectSchema for UserSubject {
    const RESOURCE_TYPE: ResourceType = ResourceType::User;

    fn into_attributes(self) -> Vec<(&'static str, Value)> {
        vec![("id", Value::String(self.id))]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteSubject {
    pub id: String,
}

impl Validate for InviteSubject {
    fn validate(&self) -> ValidationResult<()> {
        validate_field("id", &self.id).rule(Identifier).result()
    }
}

impl SubjectSchema for InviteSubject {
    const RESOURCE_TYPE: ResourceType = ResourceType::Invite;

    fn into_attributes(self) -> Vec<(&'static str, Value)> {
        vec![("id", Value::String(self.id))]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry-driven Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a JSON subject against `resource_type`'s declared attributes.
///
/// Undeclared keys are dropped. `all` is never a valid instance type.
pub fn parse_subject(resource_type: ResourceType, value: &Value) -> ValidationResult<ResourceInstance> {
    let mut errors = ValidationErrors::new();

    if resource_type.is_all() {
        errors.add_with_message(
            ROOT_KEY,
            ValidationErrorKind::Custom {
                code: "abstract_type".into(),
            },
            "'all' cannot describe a concrete resource",
        );
        return Err(errors);
    }

    let Some(object) = value.as_object() else {
        errors.add_error(
            ROOT_KEY,
            ValidationErrorKind::InvalidType {
                expected: "object".into(),
            },
        );
        return Err(errors);
    };

    check_typename(resource_type, object, &mut errors);

    let mut attributes = BTreeMap::new();
    for spec in resource_type.attributes() {
        match (spec.kind, object.get(spec.name)) {
            (_, None) => errors.add_required(spec.name),
            (AttributeKind::NullableIdentifier, Some(Value::Null)) => {
                attributes.insert(spec.name.to_string(), Value::Null);
            }
            (_, Some(Value::String(s))) => match Identifier.validate(s) {
                Some(error) => errors.add(spec.name, error),
                None => {
                    attributes.insert(spec.name.to_string(), Value::String(s.clone()));
                }
            },
            (kind, Some(_)) => errors.add_error(
                spec.name,
                ValidationErrorKind::InvalidType {
                    expected: match kind {
                        AttributeKind::Identifier => "string".into(),
                        AttributeKind::NullableIdentifier => "string or null".into(),
                    },
                },
            ),
        }
    }

    if errors.is_empty() {
        Ok(ResourceInstance {
            resource_type,
            attributes,
        })
    } else {
        Err(errors)
    }
}

fn check_typename(resource_type: ResourceType, object: &Map<String, Value>, errors: &mut ValidationErrors) {
    match object.get(TYPENAME_KEY) {
        None => {}
        Some(Value::String(name)) => {
            if let Some(error) = OneOf::new(vec![resource_type.as_str()]).validate(&name.as_str()) {
                errors.add(TYPENAME_KEY, error);
            }
        }
        Some(_) => errors.add_error(
            TYPENAME_KEY,
            ValidationErrorKind::InvalidType {
                expected: "string".into(),
            },
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_organization_subject_parse() {
        let org = OrganizationSubject {
            id: "o1".into(),
            owner_id: Some("123".into()),
        }
        .parse()
        .unwrap();

        assert_eq!(org.resource_type(), ResourceType::Organization);
        assert_eq!(org.attribute("ownerId"), Some(&json!("123")));
    }

    #[test]
    fn test_null_owner_is_kept_as_null() {
        let project = ProjectSubject {
            id: "p1".into(),
            owner_id: None,
        }
        .parse()
        .unwrap();
        assert_eq!(project.attribute("ownerId"), Some(&Value::Null));
    }

    #[test]
    fn test_typed_subject_rejects_blank_id() {
        let errors = OrganizationSubject {
            id: "".into(),
            owner_id: Some("".into()),
        }
        .parse()
        .unwrap_err();
        assert!(errors.has_errors("id"));
        assert!(errors.has_errors("ownerId"));
    }

    #[test]
    fn test_subject_deserializes_camel_case() {
        let subject: ProjectSubject =
            serde_json::from_value(json!({"id": "321", "ownerId": "123"})).unwrap();
        assert_eq!(subject.owner_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_typed_subject_requires_owner_key() {
        let err = serde_json::from_value::<OrganizationSubject>(json!({"id": "o1"})).unwrap_err();
        assert!(err.to_string().contains("ownerId"));
        assert!(serde_json::from_value::<ProjectSubject>(json!({"id": "p1"})).is_err());

        // Both entry points agree on the same payload.
        assert!(parse_subject(ResourceType::Organization, &json!({"id": "o1"})).is_err());
    }

    #[test]
    fn test_typed_subject_accepts_null_owner() {
        let org: OrganizationSubject =
            serde_json::from_value(json!({"id": "o1", "ownerId": null})).unwrap();
        assert_eq!(org.owner_id, None);
        let typed = org.parse().unwrap();
        let untyped =
            parse_subject(ResourceType::Organization, &json!({"id": "o1", "ownerId": null})).unwrap();
        assert_eq!(typed, untyped);

        let project: ProjectSubject =
            serde_json::from_value(json!({"id": "p1", "ownerId": null})).unwrap();
        assert_eq!(project.parse().unwrap().attribute("ownerId"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_subject_accepts_declared_shape() {
        let instance = parse_subject(
            ResourceType::Project,
            &json!({"__typename": "Project", "id": "p1", "ownerId": "123", "name": "x"}),
        )
        .unwrap();

        assert_eq!(instance.attributes().len(), 2);
        assert!(instance.attribute("name").is_none());
    }

    #[test]
    fn test_parse_subject_field_errors() {
        let errors = parse_subject(ResourceType::Organization, &json!({"id": 7})).unwrap_err();
        assert!(errors.has_errors("id"));
        assert!(errors.has_errors("ownerId"));
        assert_eq!(errors.get("ownerId").unwrap()[0].kind, ValidationErrorKind::Required);
    }

    #[test]
    fn test_parse_subject_nullable_owner() {
        let instance =
            parse_subject(ResourceType::Organization, &json!({"id": "o1", "ownerId": null})).unwrap();
        assert_eq!(instance.attribute("ownerId"), Some(&Value::Null));

        let errors = parse_subject(ResourceType::User, &json!({"id": null})).unwrap_err();
        assert!(errors.has_errors("id"));
    }

    #[test]
    fn test_parse_subject_typename_mismatch() {
        let errors = parse_subject(
            ResourceType::Project,
            &json!({"__typename": "Organization", "id": "p1", "ownerId": null}),
        )
        .unwrap_err();
        assert!(errors.has_errors(TYPENAME_KEY));
    }

    #[test]
    fn test_parse_subject_rejects_non_objects_and_all() {
        assert!(parse_subject(ResourceType::Project, &json!("p1"))
            .unwrap_err()
            .has_errors(ROOT_KEY));
        assert!(parse_subject(ResourceType::All, &json!({}))
            .unwrap_err()
            .has_errors(ROOT_KEY));
    }

    #[test]
    fn test_billing_has_no_attributes() {
        let instance = parse_subject(ResourceType::Billing, &json!({})).unwrap();
        assert!(instance.attributes().is_empty());
    }
}
