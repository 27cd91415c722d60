use thiserror::Error;

/// Failure of an authorization-code or refresh-token grant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token endpoint answered with a parseable body that carried no access token.
    /// Holds the provider's `error_description`, `error`, or a generic message.
    #[error("{0}")]
    Provider(String),
    /// The request never produced a usable response (network failure, timeout,
    /// non-2xx with an unparseable body).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure to obtain the end-user identity after a successful token exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The userinfo endpoint failed or returned neither `sub` nor `preferred_username`.
    #[error("failed to retrieve user information")]
    UserInfo,
    /// A profile with a configured JWKS rejected the ID token signature.
    #[error("ID token verification failed: {0}")]
    Verification(String),
}

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Bad input from the browser (400).
    BadRequest,
    /// No authenticated session where one is required (401).
    Unauthenticated,
    /// Unknown route parameter such as an unregistered provider (404).
    NotFound,
    /// Upstream or internal failure (500).
    Upstream,
}

/// Errors raised while driving a login, callback, refresh or logout.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The callback carried no `code` parameter.
    #[error("No authorization code received")]
    MissingCode,
    /// The `state` parameter was missing, unknown or did not match.
    #[error("Invalid state parameter. Possible CSRF attack.")]
    CsrfMismatch,
    /// The provider redirected back with an `error` instead of a code.
    #[error("Provider denied the request: {0}")]
    ProviderDenied(String),
    /// The token endpoint call failed.
    #[error("Token exchange failed: {0}")]
    Token(#[from] TokenError),
    /// The identity could not be resolved.
    #[error("Identity resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    /// The session store failed.
    #[error("Session error: {0}")]
    Session(String),
    /// Invalid provider or process configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A route referenced a provider that is not registered.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    /// The operation needs a logged-in session.
    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Classify the error for the HTTP layer.
    pub fn status_class(&self) -> StatusClass {
        match self {
            AuthError::MissingCode | AuthError::CsrfMismatch | AuthError::ProviderDenied(_) => {
                StatusClass::BadRequest
            }
            AuthError::NotAuthenticated => StatusClass::Unauthenticated,
            AuthError::UnknownProvider(_) => StatusClass::NotFound,
            AuthError::Token(_)
            | AuthError::Resolve(_)
            | AuthError::Session(_)
            | AuthError::Config(_) => StatusClass::Upstream,
        }
    }

    /// Text that is safe to show to the end user.
    ///
    /// Only provider-supplied `error`/`error_description` text and static messages
    /// are returned; transport details, secrets and tokens stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::MissingCode => {
                "No authorization code received. Please try logging in again.".to_string()
            }
            AuthError::CsrfMismatch => "Invalid state parameter. Possible CSRF attack.".to_string(),
            AuthError::ProviderDenied(msg) => msg.clone(),
            AuthError::Token(TokenError::Provider(msg)) => msg.clone(),
            AuthError::Token(TokenError::Transport(_)) => {
                "The identity provider could not be reached. Please try again later.".to_string()
            }
            AuthError::Resolve(ResolveError::UserInfo) => {
                "Failed to retrieve user information".to_string()
            }
            AuthError::Resolve(ResolveError::Verification(_)) => {
                "The identity token could not be verified".to_string()
            }
            AuthError::Session(_) | AuthError::Config(_) => {
                "An unexpected error occurred".to_string()
            }
            AuthError::UnknownProvider(name) => format!("Provider {name} not found"),
            AuthError::NotAuthenticated => "You are not logged in".to_string(),
        }
    }
}
