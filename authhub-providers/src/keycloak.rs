use authhub_core::{AuthError, ProviderKind, ProviderProfile};
use url::Url;

use crate::{endpoint, finish};

/// A Keycloak realm acting as an OIDC broker.
///
/// Endpoints follow Keycloak's layout under `{host}/realms/{realm}/protocol/openid-connect/`.
/// Identity comes from the realm's userinfo endpoint.
#[derive(Debug, Clone)]
pub struct KeycloakRealm {
    kind: ProviderKind,
    host: String,
    realm: String,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    scope: String,
    idp_hint: Option<String>,
    broker_logout: bool,
    verify_id_tokens: bool,
}

impl KeycloakRealm {
    /// The primary realm. Upstream IdPs are picked per login route via `kc_idp_hint`.
    pub fn new(
        host: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            kind: ProviderKind::Keycloak,
            host: host.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            scope: "openid email".to_string(),
            idp_hint: None,
            broker_logout: false,
            verify_id_tokens: false,
        }
    }

    /// The separate UATID tenant realm.
    ///
    /// Its upstream IdP session is terminated with a second logout hop through the realm's
    /// broker endpoint, so an `idp_hint` is required.
    pub fn uatid(
        host: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
        idp_hint: impl Into<String>,
    ) -> Self {
        Self {
            kind: ProviderKind::Uatid,
            scope: "openid profile email".to_string(),
            idp_hint: Some(idp_hint.into()),
            broker_logout: true,
            ..Self::new(host, realm, client_id, client_secret, redirect_uri)
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Upstream IdP used when the login route does not name one.
    pub fn with_idp_hint(mut self, hint: impl Into<String>) -> Self {
        self.idp_hint = Some(hint.into());
        self
    }

    /// Verify ID tokens against the realm's published certificates.
    pub fn verify_id_tokens(mut self, enabled: bool) -> Self {
        self.verify_id_tokens = enabled;
        self
    }

    fn protocol_endpoint(&self, name: &str) -> Result<Url, AuthError> {
        endpoint(
            &self.host,
            &format!("realms/{}/protocol/openid-connect/{}", self.realm, name),
        )
    }

    /// Build and validate the profile.
    pub fn into_profile(self) -> Result<ProviderProfile, AuthError> {
        let broker_logout_endpoint = if self.broker_logout {
            let hint = self.idp_hint.as_deref().ok_or_else(|| {
                AuthError::Config(format!("{}: broker logout needs an idp_hint", self.kind))
            })?;
            Some(endpoint(
                &self.host,
                &format!("realms/{}/broker/{}/logout", self.realm, hint),
            )?)
        } else {
            None
        };

        let (jwks_uri, issuer) = if self.verify_id_tokens {
            let issuer = endpoint(&self.host, &format!("realms/{}", self.realm))?;
            (Some(self.protocol_endpoint("certs")?), Some(issuer.to_string()))
        } else {
            (None, None)
        };

        finish(ProviderProfile {
            kind: self.kind,
            authorization_endpoint: self.protocol_endpoint("auth")?,
            token_endpoint: self.protocol_endpoint("token")?,
            userinfo_endpoint: Some(self.protocol_endpoint("userinfo")?),
            logout_endpoint: self.protocol_endpoint("logout")?,
            broker_logout_endpoint,
            jwks_uri,
            issuer,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            default_scope: self.scope,
            idp_hint: self.idp_hint,
            requires_state: false,
            identity_label: None,
        })
    }
}
