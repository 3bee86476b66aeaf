//! Shared test fixtures: a small real address service and the typed
//! client a consumer would ship, used to exercise both sides of a
//! contract end to end.

#![allow(dead_code)]

use std::collections::HashSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const EXISTING_ADDRESS_ID: &str = "8aed8fad-d554-4af8-abf5-a65830b49a5f";
pub const MISSING_ADDRESS_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const INVALID_ADDRESS_ID: &str = "this_is_not_a_valid_address_id";
pub const UUID_PATTERN: &str = "^[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}$";
pub const ADDRESS_PATH_PATTERN: &str = "^/address/[0-9a-f]{8}(-[0-9a-f]{4}){3}-[0-9a-f]{12}$";

/// A real provider implementation of the address API:
/// `GET /address/{id}`, `DELETE /address/{id}` and a
/// `POST /provider-states` setup endpoint. States listed in
/// `failing_states` make the setup endpoint answer 500.
pub struct AddressProvider {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl AddressProvider {
    pub async fn start() -> Self {
        Self::start_with_failing_states(&[]).await
    }

    pub async fn start_with_failing_states(failing_states: &[&str]) -> Self {
        let failing: Arc<HashSet<String>> =
            Arc::new(failing_states.iter().map(|s| s.to_string()).collect());
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind address provider");
        let addr = listener.local_addr().expect("provider local addr");
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let failing = Arc::clone(&failing);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let failing = Arc::clone(&failing);
                                async move { handle(req, failing).await }
                            });
                            let _ = http1::Builder::new().serve_connection(io, service).await;
                        });
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        AddressProvider { addr, shutdown_tx }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn states_url(&self) -> String {
        format!("{}/provider-states", self.base_url())
    }
}

impl Drop for AddressProvider {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn handle(
    req: Request<Incoming>,
    failing_states: Arc<HashSet<String>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == hyper::Method::POST && path == "/provider-states" {
        let bytes = req
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let state = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|v| v["state"].as_str().map(str::to_string))
            .unwrap_or_default();
        if failing_states.contains(&state) {
            return Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "state setup broke"));
        }
        return Ok(plain(StatusCode::OK, "ok"));
    }

    let Some(id) = path.strip_prefix("/address/") else {
        return Ok(plain(StatusCode::NOT_FOUND, "unknown route"));
    };
    let uuid = Regex::new(UUID_PATTERN).expect("uuid pattern");
    if !uuid.is_match(id) {
        return Ok(plain(StatusCode::BAD_REQUEST, "invalid address id"));
    }

    if method == hyper::Method::GET {
        if id == MISSING_ADDRESS_ID {
            return Ok(plain(StatusCode::NOT_FOUND, "no such address"));
        }
        let body = json!({
            "id": id,
            "addressType": "billing",
            "street": "Main Street",
            "number": 123,
            "city": "Nothingville",
            "zipCode": "54321",
            "state": "Tennessee",
            "country": "United States"
        });
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap())
    } else if method == hyper::Method::DELETE {
        Ok(Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(Bytes::new()))
            .unwrap())
    } else {
        Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"))
    }
}

fn plain(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}

/// The HTTP client a consumer service would actually ship. Errors are
/// values, so tests assert on results instead of catching panics.
pub struct AddressClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub address_type: String,
    pub street: String,
    pub number: i64,
    pub city: String,
    pub zip_code: String,
    pub state: String,
    pub country: String,
}

#[derive(Debug)]
pub enum AddressApiError {
    /// The service answered with a non-success status.
    Status(u16),
    Transport(String),
}

impl AddressClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        AddressClient {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn get_address(&self, id: &str) -> Result<Address, AddressApiError> {
        let response = self
            .client
            .get(format!("{}/address/{id}", self.base_url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|err| AddressApiError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AddressApiError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|err| AddressApiError::Transport(err.to_string()))
    }

    pub async fn delete_address(&self, id: &str) -> Result<(), AddressApiError> {
        let response = self
            .client
            .delete(format!("{}/address/{id}", self.base_url))
            .send()
            .await
            .map_err(|err| AddressApiError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AddressApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
