use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use super::rule::MatchRule;

/// One place where an actual value did not satisfy its rule.
///
/// `path` uses JSONPath-style notation rooted at the message part, e.g.
/// `$.body.address.id` or `$.headers.Accept`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFailure {
    pub path: String,
    pub rule: String,
    pub expected: String,
    pub actual: String,
}

impl MatchFailure {
    pub(crate) fn rule_violation(path: impl Into<String>, rule: &MatchRule, actual: &Value) -> Self {
        MatchFailure {
            path: path.into(),
            rule: rule.kind().to_string(),
            expected: rule.describe(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn custom(
        path: impl Into<String>,
        rule: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        MatchFailure {
            path: path.into(),
            rule: rule.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} mismatch, expected {} but got {}",
            self.path, self.rule, self.expected, self.actual
        )
    }
}

/// Checks every declared header rule against the actual headers.
/// Actual header names are expected lowercased; declared names are
/// compared case-insensitively. Undeclared actual headers are ignored.
pub(crate) fn check_headers(
    declared: &BTreeMap<String, MatchRule>,
    actual: &HashMap<String, String>,
    prefix: &str,
    failures: &mut Vec<MatchFailure>,
) {
    for (name, rule) in declared {
        let path = format!("{prefix}.{name}");
        match actual.get(&name.to_lowercase()) {
            Some(value) => {
                let value = Value::String(value.clone());
                if !rule.matches(&value) {
                    failures.push(MatchFailure::rule_violation(path, rule, &value));
                }
            }
            None => failures.push(MatchFailure::custom(
                path,
                rule.kind(),
                rule.describe(),
                "no such header",
            )),
        }
    }
}

/// Interprets a raw body as JSON, falling back to a JSON string for
/// payloads that do not parse (plain text, malformed JSON).
pub(crate) fn parse_body_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
