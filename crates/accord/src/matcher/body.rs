use std::collections::BTreeMap;

use serde_json::Value;

use super::diff::MatchFailure;
use super::rule::MatchRule;

/// A tree of matching rules mirroring the shape of a JSON body.
///
/// Leaves carry a [`MatchRule`]; objects and arrays recurse into their
/// members. The tree is kept canonical: a literal object or array is
/// always expanded into an `Object`/`Array` node of literal leaves, so
/// two ways of writing the same expectation compare equal and survive a
/// save/load round trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyRule {
    Value(MatchRule),
    Object(BTreeMap<String, BodyRule>),
    Array(Vec<BodyRule>),
}

impl BodyRule {
    /// Builds a literal expectation for `value`, expanding composites.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => BodyRule::Object(
                map.into_iter()
                    .map(|(key, value)| (key, BodyRule::from_value(value)))
                    .collect(),
            ),
            Value::Array(items) => {
                BodyRule::Array(items.into_iter().map(BodyRule::from_value).collect())
            }
            other => BodyRule::Value(MatchRule::Literal(other)),
        }
    }

    pub fn object<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<BodyRule>,
    {
        BodyRule::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn array<V: Into<BodyRule>>(items: impl IntoIterator<Item = V>) -> Self {
        BodyRule::Array(items.into_iter().map(Into::into).collect())
    }

    /// The concrete body this tree stands in for, assembled from the
    /// examples of its leaves.
    pub fn example(&self) -> Value {
        match self {
            BodyRule::Value(rule) => rule.example(),
            BodyRule::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, node)| (key.clone(), node.example()))
                    .collect(),
            ),
            BodyRule::Array(items) => Value::Array(items.iter().map(BodyRule::example).collect()),
        }
    }

    pub fn matches(&self, actual: &Value) -> bool {
        let mut failures = Vec::new();
        self.check(actual, "$.body", &mut failures);
        failures.is_empty()
    }

    /// Walks the tree against `actual`, recording every violation.
    ///
    /// Object nodes require their declared fields to be present and
    /// matching; extra actual fields are ignored. Array nodes require
    /// the same length and pairwise matches.
    pub fn check(&self, actual: &Value, path: &str, failures: &mut Vec<MatchFailure>) {
        match self {
            BodyRule::Value(rule) => {
                if !rule.matches(actual) {
                    failures.push(MatchFailure::rule_violation(path, rule, actual));
                }
            }
            BodyRule::Object(expected) => match actual {
                Value::Object(actual) => {
                    for (key, node) in expected {
                        let field_path = format!("{path}.{key}");
                        match actual.get(key) {
                            Some(value) => node.check(value, &field_path, failures),
                            None => failures.push(MatchFailure::custom(
                                field_path,
                                "presence",
                                "a field",
                                "no such field",
                            )),
                        }
                    }
                }
                other => failures.push(MatchFailure::custom(
                    path,
                    "type",
                    "an object",
                    other.to_string(),
                )),
            },
            BodyRule::Array(expected) => match actual {
                Value::Array(actual) => {
                    if expected.len() != actual.len() {
                        failures.push(MatchFailure::custom(
                            path,
                            "length",
                            format!("{} element(s)", expected.len()),
                            format!("{} element(s)", actual.len()),
                        ));
                        return;
                    }
                    for (index, (node, value)) in expected.iter().zip(actual).enumerate() {
                        node.check(value, &format!("{path}[{index}]"), failures);
                    }
                }
                other => failures.push(MatchFailure::custom(
                    path,
                    "type",
                    "an array",
                    other.to_string(),
                )),
            },
        }
    }
}

impl From<MatchRule> for BodyRule {
    fn from(rule: MatchRule) -> Self {
        // Keeps the tree canonical: literal composites become nodes.
        match rule {
            MatchRule::Literal(value @ (Value::Object(_) | Value::Array(_))) => {
                BodyRule::from_value(value)
            }
            other => BodyRule::Value(other),
        }
    }
}

impl From<Value> for BodyRule {
    fn from(value: Value) -> Self {
        BodyRule::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_composites_expand_into_nodes() {
        let from_rule: BodyRule = MatchRule::literal(json!({"id": 1})).into();
        let from_value = BodyRule::from_value(json!({"id": 1}));
        assert_eq!(from_rule, from_value);
        assert!(matches!(from_rule, BodyRule::Object(_)));
    }

    #[test]
    fn extra_actual_fields_are_ignored() {
        let body = BodyRule::object([
            ("street", MatchRule::type_only(json!("Main Street"))),
            ("number", MatchRule::type_only(json!(123))),
        ]);
        assert!(body.matches(&json!({
            "street": "Second Street",
            "number": 42,
            "city": "Nothingville"
        })));
    }

    #[test]
    fn missing_field_is_reported_at_its_path() {
        let body = BodyRule::object([("zipCode", MatchRule::type_only(json!("54321")))]);
        let mut failures = Vec::new();
        body.check(&json!({"city": "Nothingville"}), "$.body", &mut failures);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "$.body.zipCode");
        assert_eq!(failures[0].actual, "no such field");
    }

    #[test]
    fn nested_failures_carry_full_paths() {
        let body = BodyRule::object([(
            "addresses",
            BodyRule::array([BodyRule::object([(
                "id",
                MatchRule::regex("0000", "^[0-9]{4}$").unwrap(),
            )])]),
        )]);
        let mut failures = Vec::new();
        body.check(
            &json!({"addresses": [{"id": "not-a-number"}]}),
            "$.body",
            &mut failures,
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "$.body.addresses[0].id");
    }

    #[test]
    fn array_length_must_match() {
        let body = BodyRule::array([MatchRule::type_only(json!(1)), MatchRule::type_only(json!(2))]);
        let mut failures = Vec::new();
        body.check(&json!([1]), "$.body", &mut failures);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].rule, "length");
    }

    #[test]
    fn example_reassembles_the_concrete_body() {
        let body = BodyRule::object([
            ("id", MatchRule::regex("abc-1", "^[a-z]+-[0-9]$").unwrap()),
            ("count", MatchRule::type_only(json!(7))),
        ]);
        assert_eq!(body.example(), json!({"id": "abc-1", "count": 7}));
    }
}
