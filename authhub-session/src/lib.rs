//! # Authhub Session
//!
//! Server-side sessions for the gateway. A [`Session`] is addressed by an opaque id carried
//! in a cookie and holds exactly the keys the login flows read and write: the pending
//! `oauth2_state`, the `login_type`, the provider tokens and the resolved `user`.

use async_trait::async_trait;
use authhub_core::{AuthError, IdentityRecord, PendingStateSink, ProviderKind, SameSite, TokenSet};
use serde::{Deserialize, Serialize};

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "store-sqlx")]
pub mod sql_store;
#[cfg(feature = "store-sqlx")]
pub use sql_store::SqlStore;

/// The enumerated per-user keys stored in a session.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// CSRF token awaiting verification on the callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2_state: Option<String>,
    /// The provider that produced the logged-in identity. Drives logout routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_type: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// The normalized identity, present once login completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityRecord>,
}

impl SessionData {
    /// Remove and return the pending CSRF token.
    pub fn take_pending_state(&mut self) -> Option<String> {
        self.oauth2_state.take()
    }

    /// Record a completed login.
    pub fn store_auth_data(&mut self, kind: ProviderKind, tokens: TokenSet, user: IdentityRecord) {
        self.login_type = Some(kind);
        self.access_token = Some(tokens.access_token);
        self.refresh_token = tokens.refresh_token;
        self.id_token = tokens.id_token;
        self.user = Some(user);
    }

    /// Replace the stored tokens after a refresh grant.
    ///
    /// Providers may omit the refresh or ID token on refresh; the previous values are kept then.
    pub fn update_tokens(&mut self, tokens: TokenSet) {
        self.access_token = Some(tokens.access_token);
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token;
        }
        if tokens.id_token.is_some() {
            self.id_token = tokens.id_token;
        }
    }

    /// Whether a login completed in this session.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl PendingStateSink for SessionData {
    fn store_pending_state(&mut self, state: String) {
        // Last write wins: only one login attempt per session is tracked.
        self.oauth2_state = Some(state);
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("oauth2_state", &self.oauth2_state.is_some())
            .field("login_type", &self.login_type)
            .field("access_token", &self.access_token.is_some())
            .field("refresh_token", &self.refresh_token.is_some())
            .field("id_token", &self.id_token.is_some())
            .field("user", &self.user)
            .finish()
    }
}

/// A stored session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    /// Create an empty session with a fresh id that lives for `ttl`.
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data: SessionData::default(),
            expires_at: chrono::Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= chrono::Utc::now()
    }

    /// Move the session to a fresh id and return the old one so the caller can delete it.
    pub fn rotate_id(&mut self) -> String {
        std::mem::replace(&mut self.id, uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load a live session. Expired sessions are reported as absent.
    async fn load_session(&self, id: &str) -> Result<Option<Session>, AuthError>;
    async fn save_session(&self, session: &Session) -> Result<(), AuthError>;
    async fn delete_session(&self, id: &str) -> Result<(), AuthError>;
    /// Remove every expired session, returning how many were dropped.
    async fn delete_expired(&self) -> Result<u64, AuthError>;
}

/// Configuration for the session cookie.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Lifetime of both the cookie and the stored session. `None` means 24 hours.
    pub max_age: Option<chrono::Duration>,
}

impl SessionConfig {
    /// The effective session lifetime.
    pub fn ttl(&self) -> chrono::Duration {
        self.max_age.unwrap_or_else(|| chrono::Duration::hours(24))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "authhub_session".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Some(chrono::Duration::hours(24)),
        }
    }
}
