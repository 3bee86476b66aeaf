//! Accord: consumer-driven contract testing for HTTP APIs.
//!
//! A consumer test registers the interactions it expects with a
//! [`MockProviderServer`], exercises its real HTTP client against the
//! mock, and writes the resulting [`Contract`] through a
//! [`ContractStore`]. The provider side loads that contract and replays
//! it against the real service with a [`VerificationRunner`], so both
//! parties can evolve independently while a shared file keeps them
//! honest.
//!
//! ```no_run
//! use accord::{
//!     Contract, ContractStore, ExpectedRequest, ExpectedResponse, HttpMethod, MatchRule,
//!     MockProviderServer,
//! };
//!
//! # async fn demo() -> Result<(), accord::Error> {
//! let server = MockProviderServer::start().await?;
//! let interaction = server
//!     .given("there is an address")
//!     .upon_receiving("a request for an address")
//!     .with_request(ExpectedRequest::new(
//!         HttpMethod::Get,
//!         MatchRule::regex("/address/42", "^/address/[0-9]+$")?,
//!     ))
//!     .will_respond_with(ExpectedResponse::new(200))?;
//!
//! // ... drive the consumer's client against server.base_url() ...
//!
//! server.verify_interactions()?;
//!
//! let mut contract = Contract::new("order_consumer", "address_provider");
//! contract.add_interaction(interaction);
//! ContractStore::new("pacts").save(&contract)?;
//! # Ok(())
//! # }
//! ```

pub mod contract;
pub mod error;
pub mod interaction;
pub mod matcher;
pub mod mock;
pub mod verifier;

pub use contract::{Contract, ContractStore, SPECIFICATION_VERSION};
pub use error::Error;
pub use interaction::{
    ExpectedRequest, ExpectedResponse, HttpMethod, Interaction, InteractionId,
};
pub use matcher::{BodyRule, MatchFailure, MatchRule, ValueKind};
pub use mock::{InteractionBuilder, InteractionRecord, MockProviderServer, RecordedRequest};
pub use verifier::{
    InteractionOutcome, InteractionResult, VerificationReport, VerificationRunner,
    DEFAULT_TIMEOUT,
};
