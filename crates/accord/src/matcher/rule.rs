use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::Error;

/// The top-level JSON type of a value, used by type-only matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one expected value is compared against an actual value.
///
/// Every rule carries a concrete example. The example is what the mock
/// provider emits in responses and what the verifier replays in requests,
/// so a contract is executable even when its rules are loose.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchRule {
    /// Deep structural equality with the example.
    Literal(Value),
    /// The actual value has the same top-level JSON type as the example.
    TypeOnly(Value),
    /// The actual value is a string containing a match for the pattern.
    Regex { example: String, pattern: String },
}

impl MatchRule {
    pub fn literal(value: impl Into<Value>) -> Self {
        MatchRule::Literal(value.into())
    }

    pub fn type_only(example: impl Into<Value>) -> Self {
        MatchRule::TypeOnly(example.into())
    }

    /// Builds a regex rule, rejecting invalid patterns up front so that
    /// matching itself never fails.
    pub fn regex(example: impl Into<String>, pattern: impl Into<String>) -> Result<Self, Error> {
        let pattern = pattern.into();
        Regex::new(&pattern).map_err(|source| Error::InvalidRegex {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(MatchRule::Regex {
            example: example.into(),
            pattern,
        })
    }

    /// Total comparison: any JSON value yields a verdict, never an error.
    pub fn matches(&self, actual: &Value) -> bool {
        match self {
            MatchRule::Literal(expected) => values_equal(expected, actual),
            MatchRule::TypeOnly(example) => ValueKind::of(example) == ValueKind::of(actual),
            MatchRule::Regex { pattern, .. } => match actual {
                // Patterns are validated at construction, so the compile
                // here cannot fail for rules built through this API.
                Value::String(s) => Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false),
                _ => false,
            },
        }
    }

    /// The concrete value this rule stands in for.
    pub fn example(&self) -> Value {
        match self {
            MatchRule::Literal(value) | MatchRule::TypeOnly(value) => value.clone(),
            MatchRule::Regex { example, .. } => Value::String(example.clone()),
        }
    }

    /// The example rendered as a plain string, for paths and headers.
    pub fn example_string(&self) -> String {
        match self.example() {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MatchRule::Literal(_) => "equality",
            MatchRule::TypeOnly(_) => "type",
            MatchRule::Regex { .. } => "regex",
        }
    }

    /// Human-readable description of what the rule expects.
    pub(crate) fn describe(&self) -> String {
        match self {
            MatchRule::Literal(value) => value.to_string(),
            MatchRule::TypeOnly(example) => {
                format!("a value of type {}", ValueKind::of(example))
            }
            MatchRule::Regex { pattern, .. } => format!("a string matching '{pattern}'"),
        }
    }
}

impl From<&str> for MatchRule {
    fn from(value: &str) -> Self {
        MatchRule::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for MatchRule {
    fn from(value: String) -> Self {
        MatchRule::Literal(Value::String(value))
    }
}

impl From<Value> for MatchRule {
    fn from(value: Value) -> Self {
        MatchRule::Literal(value)
    }
}

/// Deep structural equality. Numbers compare by numeric value so `1`
/// and `1.0` are equal; objects must have the same key set; arrays the
/// same length and pairwise-equal elements.
pub(crate) fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_matches_structurally_equal_values() {
        let rule = MatchRule::literal(json!({"id": 1, "tags": ["a", "b"]}));
        assert!(rule.matches(&json!({"tags": ["a", "b"], "id": 1})));
        assert!(!rule.matches(&json!({"id": 1, "tags": ["a"]})));
        assert!(!rule.matches(&json!({"id": 1, "tags": ["a", "b"], "extra": true})));
    }

    #[test]
    fn literal_numbers_compare_by_value() {
        let rule = MatchRule::literal(json!(1));
        assert!(rule.matches(&json!(1.0)));
        assert!(!rule.matches(&json!(1.5)));
    }

    #[test]
    fn type_only_checks_top_level_kind() {
        let rule = MatchRule::type_only(json!("billing"));
        assert!(rule.matches(&json!("shipping")));
        assert!(!rule.matches(&json!(42)));

        let rule = MatchRule::type_only(json!(123));
        assert!(rule.matches(&json!(9.75)));
        assert!(!rule.matches(&json!(null)));
    }

    #[test]
    fn regex_matches_strings_only() {
        let rule = MatchRule::regex(
            "8aed8fad-d554-4af8-abf5-a65830b49a5f",
            "^[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}$",
        )
        .unwrap();
        assert!(rule.matches(&json!("8aed8fad-d554-4af8-abf5-a65830b49a5f")));
        assert!(!rule.matches(&json!("this_is_not_a_valid_address_id")));
        assert!(!rule.matches(&json!(42)));
        assert!(!rule.matches(&json!(null)));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        let err = MatchRule::regex("x", "[unclosed").unwrap_err();
        assert!(matches!(err, Error::InvalidRegex { .. }));
    }

    #[test]
    fn regex_example_is_the_emitted_value() {
        let rule = MatchRule::regex("abc-123", "^[a-z]+-[0-9]+$").unwrap();
        assert_eq!(rule.example(), json!("abc-123"));
        assert_eq!(rule.example_string(), "abc-123");
    }
}
