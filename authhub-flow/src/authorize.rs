use authhub_core::{generate_state_token, PendingStateSink, ProviderProfile};
use url::Url;

/// The redirect target for a login attempt.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Where the browser is sent: the provider's authorize endpoint with the query attached.
    pub url: Url,
    /// The CSRF token placed in the URL, when the profile requires one.
    pub state: Option<String>,
}

/// Assemble the provider's authorization URL.
///
/// An explicit `idp_hint` wins over the profile's own. When the profile requires client
/// state, a fresh token is handed to `sink` before it is placed in the URL. No I/O.
pub fn build_authorization_url(
    profile: &ProviderProfile,
    idp_hint: Option<&str>,
    sink: &mut dyn PendingStateSink,
) -> AuthorizationRequest {
    let mut url = profile.authorization_endpoint.clone();
    let state = profile.requires_state.then(generate_state_token);

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("scope", &profile.default_scope)
            .append_pair("client_id", &profile.client_id)
            .append_pair("redirect_uri", profile.redirect_uri.as_str());

        if let Some(hint) = idp_hint.or(profile.idp_hint.as_deref()) {
            query.append_pair("kc_idp_hint", hint);
        }
        if let Some(state) = &state {
            query.append_pair("state", state);
        }
    }

    if let Some(state) = &state {
        sink.store_pending_state(state.clone());
    }

    log::debug!(
        "built authorization url for {} (state: {})",
        profile.kind,
        state.is_some()
    );
    AuthorizationRequest { url, state }
}
