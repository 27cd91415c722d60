use std::fmt;

use authhub_core::{AuthError, ProviderProfile};
use authhub_session::SessionData;
use serde::Deserialize;

use crate::identity::IdentityResolver;
use crate::state::verify_state;
use crate::token::TokenClient;

/// Query parameters a provider sends back to the redirect URI.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Progress of one callback through the login pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    AwaitingCode,
    ExchangingToken,
    ResolvingIdentity,
    SessionWritten,
    Failed,
}

impl fmt::Display for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackState::AwaitingCode => "AWAITING_CODE",
            CallbackState::ExchangingToken => "EXCHANGING_TOKEN",
            CallbackState::ResolvingIdentity => "RESOLVING_IDENTITY",
            CallbackState::SessionWritten => "SESSION_WRITTEN",
            CallbackState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

struct Tracker<'a> {
    profile: &'a ProviderProfile,
    state: CallbackState,
}

impl Tracker<'_> {
    fn advance(&mut self, next: CallbackState) {
        log::debug!("{}: callback {} -> {}", self.profile.kind, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        log::warn!(
            "{}: callback failed in {}: {err}",
            self.profile.kind,
            self.state
        );
        self.state = CallbackState::Failed;
        err
    }
}

/// Drive one callback from the provider redirect to a written session.
///
/// Any pending state in `session` is consumed whatever the outcome. On failure the identity
/// keys are left untouched.
pub async fn complete_callback(
    profile: &ProviderProfile,
    tokens: &TokenClient,
    identities: &IdentityResolver,
    session: &mut SessionData,
    params: CallbackParams,
) -> Result<CallbackState, AuthError> {
    let mut tracker = Tracker {
        profile,
        state: CallbackState::AwaitingCode,
    };

    if profile.requires_state && !verify_state(session, params.state.as_deref()) {
        return Err(tracker.fail(AuthError::CsrfMismatch));
    }

    if let Some(error) = params.error {
        let message = params.error_description.unwrap_or(error);
        return Err(tracker.fail(AuthError::ProviderDenied(message)));
    }

    let code = match params.code.filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => return Err(tracker.fail(AuthError::MissingCode)),
    };

    tracker.advance(CallbackState::ExchangingToken);
    let token_set = tokens
        .exchange_authorization_code(profile, &code)
        .await
        .map_err(|e| tracker.fail(e.into()))?;

    tracker.advance(CallbackState::ResolvingIdentity);
    let identity = identities
        .resolve_identity(profile, &token_set)
        .await
        .map_err(|e| tracker.fail(e.into()))?;

    log::info!(
        "{}: login completed for {}",
        profile.kind,
        identity.greeting_name()
    );
    session.store_auth_data(profile.kind, token_set, identity);
    tracker.advance(CallbackState::SessionWritten);
    Ok(tracker.state)
}
