//! Data-described attribute conditions.
//!
//! A [`Condition`] is a conjunction of `(field, operator, value)` predicates
//! evaluated against a validated [`ResourceInstance`]. Values are JSON so the
//! same condition can be printed, serialized and compared across processes.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::policy::PolicyError;
use super::schemas::ResourceInstance;

// ═══════════════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════════════

/// Comparison applied between an instance attribute and a rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$in")]
    In,
    #[serde(rename = "$nin")]
    NotIn,
}

impl Operator {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::NotIn => "$nin",
        }
    }

    fn apply(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            Self::In => expected
                .as_array()
                .is_some_and(|candidates| candidates.contains(actual)),
            Self::NotIn => !expected
                .as_array()
                .is_some_and(|candidates| candidates.contains(actual)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What evaluation does when an instance lacks a referenced attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAttribute {
    /// Surface `PolicyError::MissingAttribute`.
    #[default]
    Reject,
    /// Treat the predicate as false, making the rule transparent.
    Fail,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════════════════════════

/// One `(field, operator, value)` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl FieldPredicate {
    pub fn matches(&self, actual: &Value) -> bool {
        self.operator.apply(actual, &self.value)
    }
}

impl fmt::Display for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Condition
// ═══════════════════════════════════════════════════════════════════════════════

/// A conjunction of field predicates.
///
/// ```rust,ignore
/// let owned = Condition::field("ownerId").eq(user.id.as_str());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    predicates: Vec<FieldPredicate>,
}

impl Condition {
    /// Start a condition on `field`.
    pub fn field(field: impl Into<String>) -> ConditionField {
        ConditionField {
            predicates: Vec::new(),
            field: field.into(),
        }
    }

    /// Add another predicate that must also hold.
    pub fn and(self, field: impl Into<String>) -> ConditionField {
        ConditionField {
            predicates: self.predicates,
            field: field.into(),
        }
    }

    pub fn predicates(&self) -> &[FieldPredicate] {
        &self.predicates
    }

    /// Names of the attributes this condition reads.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.field.as_str())
    }

    /// Evaluate every predicate against `instance`.
    ///
    /// Predicates short-circuit left to right, so a missing attribute after a
    /// failing predicate is not reported.
    pub fn evaluate(
        &self,
        instance: &ResourceInstance,
        on_missing: MissingAttribute,
    ) -> Result<bool, PolicyError> {
        for predicate in &self.predicates {
            let Some(actual) = instance.attribute(&predicate.field) else {
                return match on_missing {
                    MissingAttribute::Reject => Err(PolicyError::MissingAttribute {
                        resource_type: instance.resource_type(),
                        attribute: predicate.field.clone(),
                    }),
                    MissingAttribute::Fail => Ok(false),
                };
            };
            if !predicate.matches(actual) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

/// Serializes as a query document: `{"ownerId": {"$eq": "123"}}`.
impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, &Value>> = BTreeMap::new();
        for predicate in &self.predicates {
            grouped
                .entry(predicate.field.as_str())
                .or_default()
                .insert(predicate.operator.as_str(), &predicate.value);
        }
        let mut map = serializer.serialize_map(Some(grouped.len()))?;
        for (field, ops) in &grouped {
            map.serialize_entry(field, ops)?;
        }
        map.end()
    }
}

/// Pending predicate on one field; finish it with an operator.
#[derive(Debug, Clone)]
#[must_use = "a condition field does nothing until an operator is applied"]
pub struct ConditionField {
    predicates: Vec<FieldPredicate>,
    field: String,
}

impl ConditionField {
    fn finish(mut self, operator: Operator, value: Value) -> Condition {
        self.predicates.push(FieldPredicate {
            field: self.field,
            operator,
            value,
        });
        Condition {
            predicates: self.predicates,
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.finish(Operator::Eq, value.into())
    }

    pub fn ne(self, value: impl Into<Value>) -> Condition {
        self.finish(Operator::Ne, value.into())
    }

    pub fn in_list<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.finish(Operator::In, Value::Array(list))
    }

    pub fn not_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.finish(Operator::NotIn, Value::Array(list))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::subjects::ResourceType;
    use serde_json::json;

    fn project(owner: Value) -> ResourceInstance {
        ResourceInstance::from_parts(
            ResourceType::Project,
            [("id".to_string(), json!("p1")), ("ownerId".to_string(), owner)],
        )
    }

    #[test]
    fn test_eq_and_ne() {
        let owned = Condition::field("ownerId").eq("123");
        assert!(owned.evaluate(&project(json!("123")), MissingAttribute::Reject).unwrap());
        assert!(!owned.evaluate(&project(json!("999")), MissingAttribute::Reject).unwrap());

        let foreign = Condition::field("ownerId").ne("123");
        assert!(foreign.evaluate(&project(json!("999")), MissingAttribute::Reject).unwrap());
    }

    #[test]
    fn test_null_owner_never_equals_user() {
        let owned = Condition::field("ownerId").eq("123");
        assert!(!owned.evaluate(&project(Value::Null), MissingAttribute::Reject).unwrap());
    }

    #[test]
    fn test_in_and_not_in() {
        let team = Condition::field("ownerId").in_list(["1", "2"]);
        assert!(team.evaluate(&project(json!("2")), MissingAttribute::Reject).unwrap());
        assert!(!team.evaluate(&project(json!("3")), MissingAttribute::Reject).unwrap());

        let outsiders = Condition::field("ownerId").not_in(["1", "2"]);
        assert!(outsiders.evaluate(&project(json!("3")), MissingAttribute::Reject).unwrap());
    }

    #[test]
    fn test_conjunction_requires_every_predicate() {
        let condition = Condition::field("ownerId").eq("123").and("id").eq("p2");
        assert!(!condition.evaluate(&project(json!("123")), MissingAttribute::Reject).unwrap());
        assert_eq!(condition.fields().collect::<Vec<_>>(), vec!["ownerId", "id"]);
    }

    #[test]
    fn test_missing_attribute_policy() {
        let instance = ResourceInstance::from_parts(
            ResourceType::Project,
            [("id".to_string(), json!("p1"))],
        );
        let owned = Condition::field("ownerId").eq("123");

        let err = owned.evaluate(&instance, MissingAttribute::Reject).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::MissingAttribute { ref attribute, resource_type: ResourceType::Project }
                if attribute == "ownerId"
        ));
        assert!(!owned.evaluate(&instance, MissingAttribute::Fail).unwrap());
    }

    #[test]
    fn test_serializes_as_query_document() {
        let condition = Condition::field("ownerId").eq("123");
        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({"ownerId": {"$eq": "123"}})
        );
        assert_eq!(condition.to_string(), "ownerId $eq \"123\"");
    }
}
