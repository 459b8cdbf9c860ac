//! Token acquisition and request authentication.
//!
//! [`InteractiveFallbackProvider`] turns the identity library into a
//! [`TokenProvider`]; [`RequestAuthenticator`] applies the token to every
//! outgoing Graph request.

mod authenticator;
mod provider;

pub use authenticator::{RequestAuthenticator, bearer_header};
pub use provider::{IdentityClient, InteractiveFallbackProvider, TokenProvider};

#[cfg(test)]
pub(crate) use provider::tests::{FakeIdentity, account, result};
