//! # Authhub Core
//!
//! `authhub-core` provides the foundational types shared by every authhub crate:
//! provider profiles and the registry that holds them, the token and identity records
//! produced by a login, and the error taxonomy used across the gateway.

#![warn(missing_docs)]

/// Errors that can occur during the authentication process.
pub mod error;
pub use crate::error::{AuthError, ResolveError, StatusClass, TokenError};

/// Identity provider profiles and the process-wide registry.
pub mod provider;
pub use crate::provider::{ProviderKind, ProviderProfile, ProviderRegistry};

/// Token sets and normalized identities produced by a successful login.
pub mod state;
pub use crate::state::{IdentityRecord, TokenSet};

use serde::{Deserialize, Serialize};

/// Controls whether a cookie is sent with cross-site requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Sent with top-level cross-site navigations. Required for the provider redirect
    /// back to the callback to carry the session cookie.
    Lax,
    /// Only sent for same-site requests.
    Strict,
    /// Sent with all requests. Requires `Secure`.
    None,
}

/// Receives a freshly minted CSRF state token so it can be verified on callback.
///
/// The session is the only implementor in the gateway; the trait keeps the URL
/// builder free of any storage concerns.
pub trait PendingStateSink {
    /// Record `state` as the pending token, replacing any earlier one.
    fn store_pending_state(&mut self, state: String);
}

/// Generate an unguessable state token: 128 random bits rendered as 32 lowercase hex chars.
pub fn generate_state_token() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
