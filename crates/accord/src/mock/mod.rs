//! The mock provider server used by consumer tests.
//!
//! Each test starts its own server on an ephemeral port, registers
//! interactions through the fluent builder, points the consumer's real
//! client at [`MockProviderServer::base_url`], and finally calls
//! [`MockProviderServer::verify_interactions`] to assert that every
//! expectation was exercised.

mod handler;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::interaction::{ExpectedRequest, ExpectedResponse, Interaction, InteractionId};

/// A request the mock actually served, kept for verification and
/// diagnostics.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub id: InteractionId,
    pub request: RecordedRequest,
    /// RFC 3339 timestamp of when the request arrived.
    pub received_at: String,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Percent-decoded request path, without the query string.
    pub path: String,
    pub query: Option<String>,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// Shared between the accept loop and the test's server handle.
#[derive(Default)]
pub(crate) struct MockSession {
    pub(crate) interactions: RwLock<Vec<Interaction>>,
    pub(crate) invocations: RwLock<Vec<InteractionRecord>>,
}

impl MockSession {
    /// Registering an interaction with an existing identity replaces it.
    fn add_interaction(&self, interaction: Interaction) {
        let mut interactions = self.interactions.write();
        match interactions
            .iter_mut()
            .find(|existing| existing.id() == interaction.id())
        {
            Some(existing) => *existing = interaction,
            None => interactions.push(interaction),
        }
    }
}

/// An in-process HTTP server that answers requests according to the
/// registered interactions and records every match it serves.
pub struct MockProviderServer {
    addr: SocketAddr,
    session: Arc<MockSession>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MockProviderServer {
    /// Starts a server on an ephemeral loopback port. Parallel tests
    /// never contend for an address.
    pub async fn start() -> Result<Self, Error> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let session = Arc::new(MockSession::default());
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let accept_session = Arc::clone(&session);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => match result {
                        Ok((stream, _)) => {
                            let session = Arc::clone(&accept_session);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let session = Arc::clone(&session);
                                    async move { handler::handle_request(req, session).await }
                                });
                                if let Err(err) =
                                    http1::Builder::new().serve_connection(io, service).await
                                {
                                    debug!("mock provider connection error: {}", err);
                                }
                            });
                        }
                        Err(err) => {
                            error!("mock provider accept error on {}: {}", addr, err);
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        debug!("mock provider server on {} shutting down", addr);
                        break;
                    }
                }
            }
        });

        info!("mock provider server listening on {}", addr);
        Ok(MockProviderServer {
            addr,
            session,
            shutdown_tx,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Begins an interaction under the given provider state.
    pub fn given(&self, state: impl Into<String>) -> InteractionBuilder {
        InteractionBuilder {
            session: Arc::clone(&self.session),
            description: None,
            provider_state: Some(state.into()),
            request: None,
        }
    }

    /// Begins a stateless interaction.
    pub fn upon_receiving(&self, description: impl Into<String>) -> InteractionBuilder {
        InteractionBuilder {
            session: Arc::clone(&self.session),
            description: Some(description.into()),
            provider_state: None,
            request: None,
        }
    }

    pub fn add_interaction(&self, interaction: Interaction) {
        self.session.add_interaction(interaction);
    }

    /// Drops all registered interactions and recorded invocations.
    pub fn clear_interactions(&self) {
        self.session.interactions.write().clear();
        self.session.invocations.write().clear();
    }

    /// Registered interactions in registration order.
    pub fn interactions(&self) -> Vec<Interaction> {
        self.session.interactions.read().clone()
    }

    /// Every request served so far, in arrival order.
    pub fn invocations(&self) -> Vec<InteractionRecord> {
        self.session.invocations.read().clone()
    }

    /// Succeeds only if every registered interaction was invoked at
    /// least once.
    pub fn verify_interactions(&self) -> Result<(), Error> {
        let invoked: HashSet<InteractionId> = self
            .session
            .invocations
            .read()
            .iter()
            .map(|record| record.id.clone())
            .collect();
        let missing: Vec<InteractionId> = self
            .session
            .interactions
            .read()
            .iter()
            .map(Interaction::id)
            .filter(|id| !invoked.contains(id))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::UnverifiedInteractions(missing))
        }
    }
}

impl Drop for MockProviderServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Fluent registration of one interaction. The terminal
/// [`will_respond_with`](InteractionBuilder::will_respond_with) call
/// validates completeness and registers the interaction atomically, so
/// the server never observes a half-built expectation.
pub struct InteractionBuilder {
    session: Arc<MockSession>,
    description: Option<String>,
    provider_state: Option<String>,
    request: Option<ExpectedRequest>,
}

impl InteractionBuilder {
    pub fn upon_receiving(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_request(mut self, request: ExpectedRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn will_respond_with(self, response: ExpectedResponse) -> Result<Interaction, Error> {
        let description = match self.description {
            Some(description) if !description.is_empty() => description,
            _ => {
                return Err(Error::IncompleteInteraction {
                    description: "<unnamed>".to_string(),
                    missing: "a description",
                })
            }
        };
        let request = self.request.ok_or_else(|| Error::IncompleteInteraction {
            description: description.clone(),
            missing: "a request expectation",
        })?;
        let interaction = Interaction {
            description,
            provider_state: self.provider_state,
            request,
            response,
        };
        debug!("registering interaction {}", interaction.id());
        self.session.add_interaction(interaction.clone());
        Ok(interaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::HttpMethod;

    fn request() -> ExpectedRequest {
        ExpectedRequest::new(HttpMethod::Get, "/status")
    }

    #[tokio::test]
    async fn builder_requires_a_description() {
        let server = MockProviderServer::start().await.unwrap();
        let err = server
            .given("some state")
            .with_request(request())
            .will_respond_with(ExpectedResponse::new(200))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteInteraction {
                missing: "a description",
                ..
            }
        ));
        assert!(server.interactions().is_empty());
    }

    #[tokio::test]
    async fn builder_requires_a_request() {
        let server = MockProviderServer::start().await.unwrap();
        let err = server
            .upon_receiving("a request for status")
            .will_respond_with(ExpectedResponse::new(200))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteInteraction {
                missing: "a request expectation",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn reregistering_an_identity_replaces_it() {
        let server = MockProviderServer::start().await.unwrap();
        server
            .upon_receiving("a request for status")
            .with_request(request())
            .will_respond_with(ExpectedResponse::new(200))
            .unwrap();
        server
            .upon_receiving("a request for status")
            .with_request(request())
            .will_respond_with(ExpectedResponse::new(503))
            .unwrap();
        let interactions = server.interactions();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].response.status, 503);
    }

    #[tokio::test]
    async fn verification_fails_until_every_interaction_runs() {
        let server = MockProviderServer::start().await.unwrap();
        let interaction = server
            .upon_receiving("a request for status")
            .with_request(request())
            .will_respond_with(ExpectedResponse::new(200))
            .unwrap();

        let err = server.verify_interactions().unwrap_err();
        match err {
            Error::UnverifiedInteractions(ids) => assert_eq!(ids, vec![interaction.id()]),
            other => panic!("unexpected error: {other}"),
        }

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/status", server.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        server.verify_interactions().unwrap();
    }

    #[tokio::test]
    async fn clearing_resets_interactions_and_invocations() {
        let server = MockProviderServer::start().await.unwrap();
        server
            .upon_receiving("a request for status")
            .with_request(request())
            .will_respond_with(ExpectedResponse::new(200))
            .unwrap();
        server.clear_interactions();
        assert!(server.interactions().is_empty());
        assert!(server.invocations().is_empty());
        server.verify_interactions().unwrap();
    }

    #[tokio::test]
    async fn servers_get_distinct_ephemeral_ports() {
        let a = MockProviderServer::start().await.unwrap();
        let b = MockProviderServer::start().await.unwrap();
        assert_ne!(a.addr().port(), 0);
        assert_ne!(a.addr(), b.addr());
    }
}
