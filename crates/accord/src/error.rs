//! Error types for the contract testing engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::interaction::InteractionId;

/// Errors surfaced by the consumer mock, the contract store and the
/// provider verifier.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("interaction '{description}' is missing {missing}")]
    IncompleteInteraction {
        description: String,
        missing: &'static str,
    },

    #[error("contract file not found: {}", .path.display())]
    ContractNotFound { path: PathBuf },

    #[error("malformed contract file {}: {reason}", .path.display())]
    ContractFormat { path: PathBuf, reason: String },

    #[error("failed to bind mock provider server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{} interaction(s) were never invoked: {}", .0.len(), format_unverified(.0))]
    UnverifiedInteractions(Vec<InteractionId>),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn format_unverified(ids: &[InteractionId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unverified_interactions_lists_identities() {
        let err = Error::UnverifiedInteractions(vec![
            InteractionId {
                description: "a request for an address".to_string(),
                provider_state: Some("there is an address".to_string()),
            },
            InteractionId {
                description: "a request to delete an address".to_string(),
                provider_state: None,
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 interaction(s) were never invoked"));
        assert!(message.contains("a request for an address"));
        assert!(message.contains("there is an address"));
    }
}
