//! Provider-side verification: replaying a contract against a real
//! provider and comparing its responses with the recorded expectations.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::contract::Contract;
use crate::error::Error;
use crate::interaction::{HttpMethod, Interaction, InteractionId};
use crate::matcher::MatchFailure;

/// Default per-request timeout; a hung provider fails the interaction
/// instead of hanging the run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Replays every interaction of a contract against a running provider.
///
/// Interactions run sequentially in contract order. Before each one
/// with a provider state, the state is posted to the configured state
/// endpoint as `{"state": "..."}`. Requests are sent exactly as the
/// contract records them, with no rewriting beyond the base URL.
pub struct VerificationRunner {
    provider_url: String,
    provider_states_url: Option<String>,
    timeout: Duration,
}

impl VerificationRunner {
    pub fn new(provider_url: impl Into<String>) -> Self {
        VerificationRunner {
            provider_url: provider_url.into(),
            provider_states_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the endpoint that receives provider-state setup callbacks.
    pub fn provider_states(mut self, url: impl Into<String>) -> Self {
        self.provider_states_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Verifies the whole contract. A state setup failure aborts the
    /// remaining interactions, since later expectations may depend on
    /// the missing state; any other failure only fails its own
    /// interaction.
    pub async fn verify(&self, contract: &Contract) -> Result<VerificationReport, Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        info!(
            "verifying contract between '{}' and '{}' against {}",
            contract.consumer, contract.provider, self.provider_url
        );

        let mut results = Vec::new();
        let mut aborted = 0;
        for (index, interaction) in contract.interactions().iter().enumerate() {
            let outcome = self.verify_interaction(&client, interaction).await;
            let fatal = matches!(outcome, InteractionOutcome::StateSetupFailed(_));
            results.push(InteractionResult {
                id: interaction.id(),
                outcome,
            });
            if fatal {
                aborted = contract.interactions().len() - index - 1;
                warn!(
                    "state setup failed; skipping {} remaining interaction(s)",
                    aborted
                );
                break;
            }
        }

        Ok(VerificationReport {
            consumer: contract.consumer.clone(),
            provider: contract.provider.clone(),
            results,
            skipped: aborted,
        })
    }

    async fn verify_interaction(
        &self,
        client: &reqwest::Client,
        interaction: &Interaction,
    ) -> InteractionOutcome {
        if let Some(state) = &interaction.provider_state {
            match &self.provider_states_url {
                Some(url) => {
                    if let Err(reason) = self.setup_state(client, url, state).await {
                        return InteractionOutcome::StateSetupFailed(reason);
                    }
                }
                None => warn!(
                    "no provider state endpoint configured; skipping setup for '{}'",
                    state
                ),
            }
        }

        let request = &interaction.request;
        let url = format!(
            "{}{}",
            self.provider_url.trim_end_matches('/'),
            request.path.example_string()
        );
        debug!("replaying {} {}", request.method, url);

        let mut builder = client.request(reqwest_method(request.method), &url);
        for (name, rule) in &request.headers {
            builder = builder.header(name, rule.example_string());
        }
        if let Some(body) = &request.body {
            builder = match body.example() {
                Value::String(text) => builder.body(text),
                other => builder.json(&other),
            };
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return InteractionOutcome::TransportFailed(err.to_string()),
        };
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        let body = match response.text().await {
            Ok(text) if text.is_empty() => None,
            Ok(text) => Some(text),
            Err(err) => return InteractionOutcome::TransportFailed(err.to_string()),
        };

        let failures = interaction.response.check(status, &headers, body.as_deref());
        if failures.is_empty() {
            InteractionOutcome::Passed
        } else {
            InteractionOutcome::Failed(failures)
        }
    }

    async fn setup_state(
        &self,
        client: &reqwest::Client,
        url: &str,
        state: &str,
    ) -> Result<(), String> {
        debug!("setting up provider state '{}'", state);
        let response = client
            .post(url)
            .json(&json!({ "state": state }))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!(
                "state endpoint returned {} for '{}'",
                response.status(),
                state
            ))
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// How a single replayed interaction fared.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    Passed,
    /// The provider answered, but the response violated the contract.
    Failed(Vec<MatchFailure>),
    /// The state callback failed; the interaction was not replayed.
    StateSetupFailed(String),
    /// The request never completed (connection refused, timeout).
    TransportFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResult {
    pub id: InteractionId,
    pub outcome: InteractionOutcome,
}

impl InteractionResult {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, InteractionOutcome::Passed)
    }
}

/// Per-interaction results for one contract run.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub consumer: String,
    pub provider: String,
    pub results: Vec<InteractionResult>,
    /// Interactions never attempted because a state setup failed.
    pub skipped: usize,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.skipped == 0 && self.results.iter().all(InteractionResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|result| !result.passed())
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "verification of '{}' against '{}':",
            self.provider, self.consumer
        )?;
        for result in &self.results {
            match &result.outcome {
                InteractionOutcome::Passed => writeln!(f, "  passed: {}", result.id)?,
                InteractionOutcome::Failed(failures) => {
                    writeln!(f, "  failed: {}", result.id)?;
                    for failure in failures {
                        writeln!(f, "    - {failure}")?;
                    }
                }
                InteractionOutcome::StateSetupFailed(reason) => {
                    writeln!(f, "  state setup failed: {} ({reason})", result.id)?;
                }
                InteractionOutcome::TransportFailed(reason) => {
                    writeln!(f, "  transport failed: {} ({reason})", result.id)?;
                }
            }
        }
        if self.skipped > 0 {
            writeln!(f, "  {} interaction(s) skipped after state failure", self.skipped)?;
        }
        Ok(())
    }
}
