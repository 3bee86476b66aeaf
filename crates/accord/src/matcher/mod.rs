//! Matching rules and body matchers.
//!
//! A [`MatchRule`] describes how a single expected value is compared
//! against an actual value: exact equality, same JSON type, or a regex
//! over strings. [`BodyRule`] composes rules into a tree mirroring the
//! shape of a JSON body. [`MatchFailure`] is the diagnostic produced
//! when a comparison does not hold.

mod body;
mod diff;
mod rule;

pub use body::BodyRule;
pub use diff::MatchFailure;
pub(crate) use diff::{check_headers, parse_body_text};
pub use rule::{MatchRule, ValueKind};
