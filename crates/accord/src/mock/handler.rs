//! Request handling for the mock provider server.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{InteractionRecord, MockSession, RecordedRequest};
use crate::interaction::{ExpectedResponse, Interaction};
use crate::matcher::BodyRule;

/// Scans registered interactions in order and serves the first match.
/// Unmatched requests get a 500 carrying a diagnostic body, never a
/// provider-shaped response.
pub(super) async fn handle_request(
    req: Request<Incoming>,
    session: Arc<MockSession>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let actual = match read_request(req).await {
        Ok(actual) => actual,
        Err(reason) => {
            warn!("failed to read incoming request: {}", reason);
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "unreadable request", "reason": reason}),
            ));
        }
    };

    let matched = {
        let interactions = session.interactions.read();
        interactions
            .iter()
            .find(|interaction| {
                interaction.request.matches(
                    &actual.method,
                    &actual.path,
                    &actual.headers,
                    actual.body.as_deref(),
                )
            })
            .cloned()
    };

    match matched {
        Some(interaction) => {
            debug!(
                "{} {} matched interaction {}",
                actual.method,
                actual.path,
                interaction.id()
            );
            session.invocations.write().push(InteractionRecord {
                id: interaction.id(),
                request: actual,
                received_at: chrono::Utc::now().to_rfc3339(),
            });
            Ok(expectation_response(&interaction.response))
        }
        None => {
            warn!("unmatched request: {} {}", actual.method, actual.path);
            let interactions = session.interactions.read();
            Ok(unmatched_response(&actual, &interactions))
        }
    }
}

async fn read_request(req: Request<Incoming>) -> Result<RecordedRequest, String> {
    let method = req.method().to_string();
    let uri = req.uri().clone();
    let headers = extract_headers(req.headers());

    let raw_path = uri.path();
    let path = urlencoding::decode(raw_path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());
    let query = uri.query().map(str::to_string);

    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|err| err.to_string())?
        .to_bytes();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&bytes).into_owned())
    };

    Ok(RecordedRequest {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn extract_headers(headers: &HeaderMap) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

/// Builds the concrete response an expectation stands for: its status,
/// its declared headers, and the example body. A JSON body gets a
/// content-type only when the expectation does not declare one itself.
fn expectation_response(response: &ExpectedResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    let mut has_content_type = false;
    for (name, rule) in &response.headers {
        if name.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        builder = builder.header(name.as_str(), rule.example_string());
    }

    let bytes = match response.body.as_ref().map(BodyRule::example) {
        None => Bytes::new(),
        Some(Value::String(text)) => Bytes::from(text),
        Some(other) => {
            if !has_content_type {
                builder = builder.header("content-type", "application/json");
            }
            Bytes::from(other.to_string())
        }
    };

    builder.body(Full::new(bytes)).unwrap_or_else(|err| {
        warn!("failed to build response from expectation: {}", err);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "invalid response expectation", "reason": err.to_string()}),
        )
    })
}

/// The diagnostic for an unmatched request: what arrived, plus the
/// closest registered interaction and the rules it failed.
fn unmatched_response(actual: &RecordedRequest, interactions: &[Interaction]) -> Response<Full<Bytes>> {
    let mut body = json!({
        "error": "unmatched request",
        "method": actual.method,
        "path": actual.path,
        "query": actual.query,
    });

    let nearest = interactions
        .iter()
        .map(|interaction| {
            let failures = interaction.request.check(
                &actual.method,
                &actual.path,
                &actual.headers,
                actual.body.as_deref(),
            );
            (interaction, failures)
        })
        .min_by_key(|(_, failures)| failures.len());

    match nearest {
        Some((interaction, failures)) => {
            body["nearestMiss"] = json!({
                "description": interaction.description,
                "providerState": interaction.provider_state,
                "mismatches": failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            });
        }
        None => {
            body["hint"] = json!("no interactions are registered");
        }
    }

    error_response(StatusCode::INTERNAL_SERVER_ERROR, body)
}

fn error_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    // Static parts only, so the build cannot fail.
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
