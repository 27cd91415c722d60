use authhub_core::{AuthError, ProviderKind, ProviderProfile};
use url::Url;

use crate::{endpoint, finish};

/// Label recorded on identities that came straight from OSSPID.
pub const OSSPID_LABEL: &str = "Direct OSSPID";

/// The OSSPID IdP reached without a broker.
///
/// OSSPID has no userinfo endpoint; identity is read from the ID token. With no broker in
/// between, the gateway mints its own `state`.
#[derive(Debug, Clone)]
pub struct OsspidDirect {
    host: String,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    scope: String,
    jwks_uri: Option<Url>,
    issuer: Option<String>,
}

impl OsspidDirect {
    pub fn new(
        host: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            host: host.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            scope: "openid profile email".to_string(),
            jwks_uri: None,
            issuer: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Verify ID tokens against this key set instead of decoding them blindly.
    pub fn with_jwks_uri(mut self, jwks_uri: Url) -> Self {
        self.jwks_uri = Some(jwks_uri);
        self
    }

    /// Require verified ID tokens to carry this `iss`.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn into_profile(self) -> Result<ProviderProfile, AuthError> {
        let base = "osspid-client/openid/v2";
        if self.issuer.is_some() && self.jwks_uri.is_none() {
            return Err(AuthError::Config(format!(
                "{}: an issuer needs a jwks_uri to check it against",
                ProviderKind::OsspidDirect
            )));
        }
        finish(ProviderProfile {
            kind: ProviderKind::OsspidDirect,
            authorization_endpoint: endpoint(&self.host, &format!("{base}/authorize"))?,
            token_endpoint: endpoint(&self.host, &format!("{base}/token"))?,
            userinfo_endpoint: None,
            logout_endpoint: endpoint(&self.host, &format!("{base}/logout"))?,
            broker_logout_endpoint: None,
            jwks_uri: self.jwks_uri,
            issuer: self.issuer,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            default_scope: self.scope,
            idp_hint: None,
            requires_state: true,
            identity_label: Some(OSSPID_LABEL.to_string()),
        })
    }
}
