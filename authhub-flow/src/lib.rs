//! # Authhub Flow
//!
//! `authhub-flow` orchestrates the login flows of the gateway. It sits between the provider
//! profiles in `authhub-core` and the HTTP adapter in `authhub-axum`.
//!
//! ## Key Components
//!
//! - **[`build_authorization_url`]**: assembles a provider's `/authorize` redirect and mints CSRF state.
//! - **[`verify_state`]**: single-use CSRF check on the callback.
//! - **[`TokenClient`]**: authorization-code and refresh-token grants.
//! - **[`IdentityResolver`]**: userinfo, ID-token claims or placeholder identity.
//! - **[`complete_callback`]**: the callback pipeline tying the above together.
//! - **[`build_logout_url`]** / **[`plan_logout`]**: single and two-step logout.
//! - **[`Gateway`]**: the service holding the registry, clients and session store.

use std::sync::Arc;
use std::time::Duration;

use authhub_core::{AuthError, ProviderKind, ProviderProfile, ProviderRegistry, TokenSet};
pub use authhub_providers::LoginVariant;
pub use authhub_session::{Session, SessionConfig, SessionData, SessionStore};
use url::Url;

/// Authorization URL construction.
pub mod authorize;
/// The callback state machine.
pub mod callback;
/// ID-token claim extraction and userinfo lookup.
pub mod identity;
/// Cached provider key sets for ID-token verification.
pub mod jwks;
/// RP-initiated and broker logout URLs.
pub mod logout;
/// CSRF state verification.
pub mod state;
/// Token endpoint client.
pub mod token;

#[cfg(test)]
mod test_support;

pub use authorize::{build_authorization_url, AuthorizationRequest};
pub use callback::{complete_callback, CallbackParams, CallbackState};
pub use identity::{decode_id_token_claims, IdentityResolver};
pub use logout::{app_url, build_broker_logout_url, build_logout_url, plan_logout};
pub use state::verify_state;
pub use token::TokenClient;

/// Marker for a missing component in the typestate pattern.
#[derive(Clone, Default)]
pub struct Missing;

/// Marker for a configured component in the typestate pattern.
#[derive(Clone)]
pub struct Configured<T>(pub T);

/// The unified gateway service. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    /// Read-only provider profiles.
    pub registry: Arc<ProviderRegistry>,
    /// Token endpoint client.
    pub tokens: Arc<TokenClient>,
    /// Identity resolution.
    pub identities: Arc<IdentityResolver>,
    /// The session storage backend.
    pub session_store: Arc<dyn SessionStore>,
    /// Configuration for session cookies.
    pub session_config: SessionConfig,
    /// Public base URL of this application.
    pub base_url: Url,
    /// The `/<name>-login` routes to expose.
    pub login_variants: Arc<Vec<LoginVariant>>,
}

impl Gateway {
    /// Create a new [`GatewayBuilder`] to configure the service.
    pub fn builder() -> GatewayBuilder<Missing> {
        GatewayBuilder::default()
    }

    /// The home page, where every flow ends.
    pub fn home_url(&self) -> Result<Url, AuthError> {
        app_url(&self.base_url, "/")
    }

    /// A fresh, empty session.
    pub fn new_session(&self) -> Session {
        Session::new(self.session_config.ttl())
    }

    fn profile(&self, kind: ProviderKind) -> Result<&Arc<ProviderProfile>, AuthError> {
        self.registry.require(kind)
    }

    /// Start a login through `variant`, recording any CSRF state in `session`.
    pub fn begin_login(
        &self,
        variant: &LoginVariant,
        session: &mut SessionData,
    ) -> Result<Url, AuthError> {
        let profile = self.profile(variant.provider)?;
        log::info!("starting {} login via {}", profile.kind, variant.path);
        Ok(build_authorization_url(profile, variant.idp_hint.as_deref(), session).url)
    }

    /// Finish a login for the provider whose callback route was hit.
    pub async fn complete_callback(
        &self,
        kind: ProviderKind,
        session: &mut SessionData,
        params: CallbackParams,
    ) -> Result<CallbackState, AuthError> {
        let profile = self.profile(kind)?;
        complete_callback(profile, &self.tokens, &self.identities, session, params).await
    }

    /// Refresh the session's access token with its stored refresh token.
    pub async fn refresh(&self, session: &mut SessionData) -> Result<TokenSet, AuthError> {
        let (Some(kind), Some(refresh_token)) = (session.login_type, session.refresh_token.clone())
        else {
            return Err(AuthError::NotAuthenticated);
        };
        if !session.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let profile = self.profile(kind)?;
        let tokens = self
            .tokens
            .refresh_access_token(profile, &refresh_token)
            .await?;
        log::info!("{kind}: access token refreshed");
        session.update_tokens(tokens.clone());
        Ok(tokens)
    }

    /// The first logout redirect for `session`.
    pub fn logout_url(&self, session: &SessionData) -> Result<Url, AuthError> {
        plan_logout(
            &self.registry,
            session.login_type,
            session.id_token.as_deref(),
            &self.base_url,
            &self.home_url()?,
        )
    }

    /// The second logout hop for a brokered realm, named by its route slug.
    ///
    /// `None` when the provider is unknown or has no upstream to notify.
    pub fn idp_logout_url(&self, provider: Option<&str>) -> Result<Option<Url>, AuthError> {
        let profile = provider
            .and_then(ProviderKind::from_route_slug)
            .and_then(|kind| self.registry.get(kind));
        match profile {
            Some(profile) => Ok(build_broker_logout_url(profile, &self.home_url()?)),
            None => Ok(None),
        }
    }
}

/// A builder for configuring and creating a [`Gateway`] instance.
pub struct GatewayBuilder<S> {
    profiles: Vec<ProviderProfile>,
    default_logout: ProviderKind,
    session_store: S,
    session_config: SessionConfig,
    base_url: Option<Url>,
    http_timeout: Duration,
    login_variants: Option<Vec<LoginVariant>>,
}

impl Default for GatewayBuilder<Missing> {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            default_logout: ProviderKind::Keycloak,
            session_store: Missing,
            session_config: SessionConfig::default(),
            base_url: None,
            http_timeout: Duration::from_secs(10),
            login_variants: None,
        }
    }
}

impl<S> GatewayBuilder<S> {
    /// Register a provider profile.
    pub fn provider(mut self, profile: ProviderProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// The provider used for logout when a session lost its login type.
    pub fn default_logout(mut self, kind: ProviderKind) -> Self {
        self.default_logout = kind;
        self
    }

    /// Set the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Public base URL used to compose redirect targets.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Upper bound for every call to a provider.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Override the login routes. Defaults to one route per registered provider.
    pub fn login_variants(mut self, variants: Vec<LoginVariant>) -> Self {
        self.login_variants = Some(variants);
        self
    }

    /// Set the session store.
    pub fn session_store(
        self,
        store: Arc<dyn SessionStore>,
    ) -> GatewayBuilder<Configured<Arc<dyn SessionStore>>> {
        GatewayBuilder {
            profiles: self.profiles,
            default_logout: self.default_logout,
            session_store: Configured(store),
            session_config: self.session_config,
            base_url: self.base_url,
            http_timeout: self.http_timeout,
            login_variants: self.login_variants,
        }
    }
}

impl GatewayBuilder<Configured<Arc<dyn SessionStore>>> {
    /// Validate the configuration and build the [`Gateway`].
    pub fn build(self) -> Result<Gateway, AuthError> {
        let registry = ProviderRegistry::new(self.profiles, self.default_logout)?;
        let base_url = self
            .base_url
            .ok_or_else(|| AuthError::Config("base_url is required".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("http client: {e}")))?;

        let login_variants = match self.login_variants {
            Some(variants) => variants,
            None => registry
                .kinds()
                .map(|kind| {
                    LoginVariant::new(format!("/{}-login", kind.route_slug()), kind, None)
                })
                .collect(),
        };
        for variant in &login_variants {
            registry.require(variant.provider)?;
        }

        Ok(Gateway {
            identities: Arc::new(IdentityResolver::new(http.clone(), &registry)),
            tokens: Arc::new(TokenClient::with_client(http)),
            registry: Arc::new(registry),
            session_store: self.session_store.0,
            session_config: self.session_config,
            base_url,
            login_variants: Arc::new(login_variants),
        })
    }
}
