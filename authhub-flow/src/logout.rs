use authhub_core::{AuthError, ProviderKind, ProviderProfile, ProviderRegistry};
use url::Url;

/// Path of the second logout hop for brokered realms.
pub const IDP_LOGOUT_PATH: &str = "/logout-idp";

/// Build the RP-initiated logout URL for the provider that produced the session.
///
/// An absent or unconfigured `login_type` falls back to the registry's default profile so
/// logout always has somewhere to go.
pub fn build_logout_url(
    registry: &ProviderRegistry,
    login_type: Option<ProviderKind>,
    id_token: Option<&str>,
    post_logout_redirect_uri: &Url,
) -> Url {
    let profile = registry.resolve_or_default(login_type);
    if login_type != Some(profile.kind) {
        log::info!(
            "no logout profile for {:?}, using default {}",
            login_type,
            profile.kind
        );
    }
    logout_url_for(profile, id_token, post_logout_redirect_uri)
}

fn logout_url_for(profile: &ProviderProfile, id_token: Option<&str>, redirect: &Url) -> Url {
    let mut url = profile.logout_endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("post_logout_redirect_uri", redirect.as_str())
            .append_pair("client_id", &profile.client_id);
        if let Some(token) = id_token {
            query.append_pair("id_token_hint", token);
        }
    }
    url
}

/// Plan the first logout redirect.
///
/// For a brokered realm the realm sends the browser back to [`IDP_LOGOUT_PATH`] on
/// `app_base`, naming the provider, instead of straight to `home`.
pub fn plan_logout(
    registry: &ProviderRegistry,
    login_type: Option<ProviderKind>,
    id_token: Option<&str>,
    app_base: &Url,
    home: &Url,
) -> Result<Url, AuthError> {
    let profile = registry.resolve_or_default(login_type);
    if profile.broker_logout_endpoint.is_none() {
        return Ok(build_logout_url(registry, login_type, id_token, home));
    }

    let mut second_hop = app_url(app_base, IDP_LOGOUT_PATH)?;
    second_hop
        .query_pairs_mut()
        .append_pair("provider", profile.kind.route_slug());
    Ok(logout_url_for(profile, id_token, &second_hop))
}

/// The upstream broker logout, sending the browser to `final_redirect` afterwards.
///
/// `None` when the profile has no upstream to notify.
pub fn build_broker_logout_url(profile: &ProviderProfile, final_redirect: &Url) -> Option<Url> {
    let mut url = profile.broker_logout_endpoint.clone()?;
    url.query_pairs_mut()
        .append_pair("redirect_uri", final_redirect.as_str());
    Some(url)
}

/// Resolve `path` against the application's base URL, keeping any base path prefix.
pub fn app_url(base: &Url, path: &str) -> Result<Url, AuthError> {
    let raw = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|e| AuthError::Config(format!("invalid application url {raw}: {e}")))
}
