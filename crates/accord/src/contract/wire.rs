//! On-disk contract representation.
//!
//! Contracts are stored as pact-v2-style JSON: interactions carry a
//! concrete example request and response, and a flat `matchingRules`
//! map from JSONPath-like locations (`$.path`, `$.headers.Accept`,
//! `$.body.address.id`, `$.body.items[0]`) to a rule. Locations with no
//! entry match by equality. Loading walks the example back into the
//! in-memory rule trees, so a saved contract round-trips unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Contract;
use crate::interaction::{
    ExpectedRequest, ExpectedResponse, HttpMethod, Interaction,
};
use crate::matcher::{BodyRule, MatchRule};

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ContractFile {
    pub consumer: Participant,
    pub provider: Participant,
    pub interactions: Vec<InteractionFile>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Participant {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct Metadata {
    #[serde(rename = "pactSpecification")]
    pub pact_specification: SpecificationVersion,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct SpecificationVersion {
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct InteractionFile {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    pub request: RequestFile,
    pub response: ResponseFile,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct RequestFile {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(
        rename = "matchingRules",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub matching_rules: Option<BTreeMap<String, RuleFile>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ResponseFile {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(
        rename = "matchingRules",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub matching_rules: Option<BTreeMap<String, RuleFile>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "match", rename_all = "lowercase")]
pub(super) enum RuleFile {
    Type,
    Regex { regex: String },
}

impl From<&Contract> for ContractFile {
    fn from(contract: &Contract) -> Self {
        ContractFile {
            consumer: Participant {
                name: contract.consumer.clone(),
            },
            provider: Participant {
                name: contract.provider.clone(),
            },
            interactions: contract
                .interactions()
                .iter()
                .map(interaction_to_wire)
                .collect(),
            metadata: Metadata {
                pact_specification: SpecificationVersion {
                    version: contract.specification_version.clone(),
                },
            },
        }
    }
}

impl TryFrom<ContractFile> for Contract {
    type Error = String;

    fn try_from(file: ContractFile) -> Result<Self, Self::Error> {
        let mut contract = Contract::new(file.consumer.name, file.provider.name);
        contract.specification_version = file.metadata.pact_specification.version;
        for interaction in file.interactions {
            contract.add_interaction(interaction_from_wire(interaction)?);
        }
        Ok(contract)
    }
}

fn interaction_to_wire(interaction: &Interaction) -> InteractionFile {
    InteractionFile {
        description: interaction.description.clone(),
        provider_state: interaction.provider_state.clone(),
        request: request_to_wire(&interaction.request),
        response: response_to_wire(&interaction.response),
    }
}

fn interaction_from_wire(file: InteractionFile) -> Result<Interaction, String> {
    Ok(Interaction {
        request: request_from_wire(&file.description, file.request)?,
        response: response_from_wire(&file.description, file.response)?,
        description: file.description,
        provider_state: file.provider_state,
    })
}

fn request_to_wire(request: &ExpectedRequest) -> RequestFile {
    let mut rules = BTreeMap::new();
    record_rule(&mut rules, "$.path".to_string(), &request.path);
    let headers = headers_to_wire(&request.headers, &mut rules);
    let body = request
        .body
        .as_ref()
        .map(|body| body_to_wire(body, "$.body", &mut rules));
    RequestFile {
        method: request.method.to_string(),
        path: request.path.example_string(),
        headers,
        body,
        matching_rules: none_if_empty(rules),
    }
}

fn response_to_wire(response: &ExpectedResponse) -> ResponseFile {
    let mut rules = BTreeMap::new();
    let headers = headers_to_wire(&response.headers, &mut rules);
    let body = response
        .body
        .as_ref()
        .map(|body| body_to_wire(body, "$.body", &mut rules));
    ResponseFile {
        status: response.status,
        headers,
        body,
        matching_rules: none_if_empty(rules),
    }
}

fn headers_to_wire(
    headers: &BTreeMap<String, MatchRule>,
    rules: &mut BTreeMap<String, RuleFile>,
) -> Option<BTreeMap<String, String>> {
    if headers.is_empty() {
        return None;
    }
    Some(
        headers
            .iter()
            .map(|(name, rule)| {
                record_rule(rules, format!("$.headers.{name}"), rule);
                (name.clone(), rule.example_string())
            })
            .collect(),
    )
}

/// Flattens a rule tree into its example value, recording non-equality
/// leaves in the rules map under the path they occupy.
fn body_to_wire(body: &BodyRule, path: &str, rules: &mut BTreeMap<String, RuleFile>) -> Value {
    match body {
        BodyRule::Value(rule) => {
            record_rule(rules, path.to_string(), rule);
            rule.example()
        }
        BodyRule::Object(map) => Value::Object(
            map.iter()
                .map(|(key, node)| {
                    (
                        key.clone(),
                        body_to_wire(node, &format!("{path}.{key}"), rules),
                    )
                })
                .collect(),
        ),
        BodyRule::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, node)| body_to_wire(node, &format!("{path}[{index}]"), rules))
                .collect(),
        ),
    }
}

fn record_rule(rules: &mut BTreeMap<String, RuleFile>, path: String, rule: &MatchRule) {
    match rule {
        MatchRule::Literal(_) => {}
        MatchRule::TypeOnly(_) => {
            rules.insert(path, RuleFile::Type);
        }
        MatchRule::Regex { pattern, .. } => {
            rules.insert(
                path,
                RuleFile::Regex {
                    regex: pattern.clone(),
                },
            );
        }
    }
}

fn none_if_empty(rules: BTreeMap<String, RuleFile>) -> Option<BTreeMap<String, RuleFile>> {
    if rules.is_empty() {
        None
    } else {
        Some(rules)
    }
}

fn request_from_wire(description: &str, file: RequestFile) -> Result<ExpectedRequest, String> {
    let method: HttpMethod = file
        .method
        .parse()
        .map_err(|err| format!("interaction '{description}': {err}"))?;
    let rules = file.matching_rules.unwrap_or_default();
    Ok(ExpectedRequest {
        method,
        path: string_rule_at(&rules, "$.path", &file.path)
            .map_err(|err| format!("interaction '{description}': {err}"))?,
        headers: headers_from_wire(file.headers, &rules)
            .map_err(|err| format!("interaction '{description}': {err}"))?,
        body: file
            .body
            .map(|example| body_from_wire(&example, "$.body", &rules))
            .transpose()
            .map_err(|err| format!("interaction '{description}': {err}"))?,
    })
}

fn response_from_wire(description: &str, file: ResponseFile) -> Result<ExpectedResponse, String> {
    let rules = file.matching_rules.unwrap_or_default();
    Ok(ExpectedResponse {
        status: file.status,
        headers: headers_from_wire(file.headers, &rules)
            .map_err(|err| format!("interaction '{description}': {err}"))?,
        body: file
            .body
            .map(|example| body_from_wire(&example, "$.body", &rules))
            .transpose()
            .map_err(|err| format!("interaction '{description}': {err}"))?,
    })
}

fn headers_from_wire(
    headers: Option<BTreeMap<String, String>>,
    rules: &BTreeMap<String, RuleFile>,
) -> Result<BTreeMap<String, MatchRule>, String> {
    headers
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let rule = string_rule_at(rules, &format!("$.headers.{name}"), &value)?;
            Ok((name, rule))
        })
        .collect()
}

/// Reconstructs the rule governing a string-valued location.
fn string_rule_at(
    rules: &BTreeMap<String, RuleFile>,
    path: &str,
    example: &str,
) -> Result<MatchRule, String> {
    match rules.get(path) {
        None => Ok(MatchRule::Literal(Value::String(example.to_string()))),
        Some(RuleFile::Type) => Ok(MatchRule::TypeOnly(Value::String(example.to_string()))),
        Some(RuleFile::Regex { regex }) => MatchRule::regex(example, regex.clone())
            .map_err(|err| format!("rule at {path}: {err}")),
    }
}

/// Walks a wire example, looking up each location in the rules map to
/// rebuild the rule tree. A rule on a composite node takes effect at
/// that node and suppresses any deeper rules under it.
fn body_from_wire(
    example: &Value,
    path: &str,
    rules: &BTreeMap<String, RuleFile>,
) -> Result<BodyRule, String> {
    match rules.get(path) {
        Some(RuleFile::Type) => return Ok(BodyRule::Value(MatchRule::TypeOnly(example.clone()))),
        Some(RuleFile::Regex { regex }) => {
            let example = example
                .as_str()
                .ok_or_else(|| format!("rule at {path}: regex rules require a string example"))?;
            let rule = MatchRule::regex(example, regex.clone())
                .map_err(|err| format!("rule at {path}: {err}"))?;
            return Ok(BodyRule::Value(rule));
        }
        None => {}
    }
    Ok(match example {
        Value::Object(map) => BodyRule::Object(
            map.iter()
                .map(|(key, value)| {
                    let node = body_from_wire(value, &format!("{path}.{key}"), rules)?;
                    Ok((key.clone(), node))
                })
                .collect::<Result<_, String>>()?,
        ),
        Value::Array(items) => BodyRule::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, value)| body_from_wire(value, &format!("{path}[{index}]"), rules))
                .collect::<Result<_, String>>()?,
        ),
        other => BodyRule::Value(MatchRule::Literal(other.clone())),
    })
}
