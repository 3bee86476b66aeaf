//! The interaction model: one expected request/response exchange.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::matcher::{check_headers, parse_body_text, BodyRule, MatchFailure, MatchRule};

/// Request methods understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

/// What the consumer expects to send.
///
/// Path and header expectations are single rules over strings; the body
/// is an optional rule tree. A request with no declared body ignores
/// whatever body actually arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedRequest {
    pub method: HttpMethod,
    pub path: MatchRule,
    pub headers: BTreeMap<String, MatchRule>,
    pub body: Option<BodyRule>,
}

impl ExpectedRequest {
    pub fn new(method: HttpMethod, path: impl Into<MatchRule>) -> Self {
        ExpectedRequest {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, rule: impl Into<MatchRule>) -> Self {
        self.headers.insert(name.into(), rule.into());
        self
    }

    pub fn body(mut self, body: impl Into<BodyRule>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn matches(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> bool {
        self.check(method, path, headers, body).is_empty()
    }

    /// Compares an incoming request against this expectation, returning
    /// every mismatch. Actual header names must already be lowercased.
    pub fn check(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Vec<MatchFailure> {
        let mut failures = Vec::new();

        if !method.eq_ignore_ascii_case(self.method.as_str()) {
            failures.push(MatchFailure::custom(
                "$.method",
                "equality",
                self.method.as_str(),
                method,
            ));
        }

        let actual_path = Value::String(path.to_string());
        if !self.path.matches(&actual_path) {
            failures.push(MatchFailure::rule_violation("$.path", &self.path, &actual_path));
        }

        check_headers(&self.headers, headers, "$.headers", &mut failures);

        if let Some(expected) = &self.body {
            match body {
                Some(raw) => expected.check(&parse_body_text(raw), "$.body", &mut failures),
                None => failures.push(MatchFailure::custom(
                    "$.body",
                    "presence",
                    "a request body",
                    "no body",
                )),
            }
        }

        failures
    }
}

/// What the provider is expected to answer with.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, MatchRule>,
    pub body: Option<BodyRule>,
}

impl ExpectedResponse {
    pub fn new(status: u16) -> Self {
        ExpectedResponse {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, rule: impl Into<MatchRule>) -> Self {
        self.headers.insert(name.into(), rule.into());
        self
    }

    pub fn body(mut self, body: impl Into<BodyRule>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Compares an actual provider response against this expectation.
    /// Status compares by equality; a declared body must be present and
    /// match, an undeclared one ignores the actual body entirely.
    pub fn check(
        &self,
        status: u16,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Vec<MatchFailure> {
        let mut failures = Vec::new();

        if status != self.status {
            failures.push(MatchFailure::custom(
                "$.status",
                "equality",
                self.status.to_string(),
                status.to_string(),
            ));
        }

        check_headers(&self.headers, headers, "$.headers", &mut failures);

        if let Some(expected) = &self.body {
            match body {
                Some(raw) => expected.check(&parse_body_text(raw), "$.body", &mut failures),
                None => failures.push(MatchFailure::custom(
                    "$.body",
                    "presence",
                    "a response body",
                    "no body",
                )),
            }
        }

        failures
    }
}

/// One recorded expectation: given an optional provider state, a request
/// shaped like `request` gets the response described by `response`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub description: String,
    pub provider_state: Option<String>,
    pub request: ExpectedRequest,
    pub response: ExpectedResponse,
}

impl Interaction {
    /// The identity of an interaction within a contract. Two
    /// interactions with the same description but different provider
    /// states are distinct.
    pub fn id(&self) -> InteractionId {
        InteractionId {
            description: self.description.clone(),
            provider_state: self.provider_state.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InteractionId {
    pub description: String,
    pub provider_state: Option<String>,
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider_state {
            Some(state) => write!(f, "\"{}\" (given \"{}\")", self.description, state),
            None => write!(f, "\"{}\"", self.description),
        }
    }
}
