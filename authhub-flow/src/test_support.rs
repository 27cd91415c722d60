use authhub_core::{ProviderKind, ProviderProfile};
use url::Url;

pub(crate) fn profile(kind: ProviderKind, requires_state: bool) -> ProviderProfile {
    profile_at("https://idp.example.test", kind, requires_state)
}

pub(crate) fn profile_at(base: &str, kind: ProviderKind, requires_state: bool) -> ProviderProfile {
    let at = |path: &str| Url::parse(&format!("{base}/{}/{path}", kind.route_slug())).unwrap();
    ProviderProfile {
        kind,
        authorization_endpoint: at("auth"),
        token_endpoint: at("token"),
        userinfo_endpoint: None,
        logout_endpoint: at("logout"),
        broker_logout_endpoint: None,
        jwks_uri: None,
        issuer: None,
        client_id: "client-1".into(),
        client_secret: "secret".into(),
        redirect_uri: Url::parse("http://localhost:8010/cb").unwrap(),
        default_scope: "openid profile email".into(),
        idp_hint: None,
        requires_state,
        identity_label: None,
    }
}
