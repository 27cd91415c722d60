use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AuthError;

/// The identity providers the gateway knows how to talk to.
///
/// The serialized form is the `login_type` value recorded in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// The primary Keycloak realm brokering several upstream IdPs.
    Keycloak,
    /// The proprietary OSSPID IdP contacted directly.
    OsspidDirect,
    /// A second Keycloak realm for the UATID tenant.
    Uatid,
}

impl ProviderKind {
    /// Every known provider.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Keycloak,
        ProviderKind::OsspidDirect,
        ProviderKind::Uatid,
    ];

    /// The `login_type` value stored in the session.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Keycloak => "keycloak",
            ProviderKind::OsspidDirect => "osspid_direct",
            ProviderKind::Uatid => "uatid",
        }
    }

    /// The path segment used in `/<slug>/callback`.
    pub fn route_slug(&self) -> &'static str {
        match self {
            ProviderKind::Keycloak => "keycloak",
            ProviderKind::OsspidDirect => "osspid-direct",
            ProviderKind::Uatid => "uatid",
        }
    }

    /// Look a provider up by its callback path segment.
    pub fn from_route_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.route_slug() == slug)
    }

    /// Subject assigned when the provider supplied no decodable identity.
    pub fn placeholder_subject(&self) -> &'static str {
        match self {
            ProviderKind::Keycloak => "keycloak_user",
            ProviderKind::OsspidDirect => "osspid_user",
            ProviderKind::Uatid => "uatid_user",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AuthError::UnknownProvider(s.to_string()))
    }
}

/// Static description of one identity provider.
///
/// Profiles are built once at startup, validated, and shared read-only through the
/// [`ProviderRegistry`].
#[derive(Clone)]
pub struct ProviderProfile {
    /// Which provider this profile describes.
    pub kind: ProviderKind,
    /// The `/authorize` endpoint.
    pub authorization_endpoint: Url,
    /// The token endpoint for code and refresh grants.
    pub token_endpoint: Url,
    /// The userinfo endpoint; absent when identity comes from ID-token claims.
    pub userinfo_endpoint: Option<Url>,
    /// The RP-initiated logout endpoint.
    pub logout_endpoint: Url,
    /// Logout endpoint of the upstream IdP behind a brokered realm. When set,
    /// logout takes two hops.
    pub broker_logout_endpoint: Option<Url>,
    /// JWKS used to verify ID-token signatures. When absent, claims are decoded unverified.
    pub jwks_uri: Option<Url>,
    /// Expected `iss` claim of verified ID tokens; unchecked when absent.
    pub issuer: Option<String>,
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: Url,
    /// Space-delimited scope string.
    pub default_scope: String,
    /// Upstream IdP selected within a brokered realm.
    pub idp_hint: Option<String>,
    /// Whether the flow needs a client-generated CSRF `state`.
    pub requires_state: bool,
    /// Label shown as the identity's origin when the claims carry none.
    pub identity_label: Option<String>,
}

impl ProviderProfile {
    /// Check the invariants every flow relies on.
    pub fn validate(&self) -> Result<(), AuthError> {
        let required = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("default_scope", self.default_scope.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::Config(format!("{}: {field} is required", self.kind)));
            }
        }
        if matches!(self.idp_hint.as_deref(), Some(hint) if hint.trim().is_empty()) {
            return Err(AuthError::Config(format!(
                "{}: idp_hint must not be empty when set",
                self.kind
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("kind", &self.kind)
            .field("authorization_endpoint", &self.authorization_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("userinfo_endpoint", &self.userinfo_endpoint.as_ref().map(Url::as_str))
            .field("logout_endpoint", &self.logout_endpoint.as_str())
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("default_scope", &self.default_scope)
            .field("idp_hint", &self.idp_hint)
            .field("requires_state", &self.requires_state)
            .finish_non_exhaustive()
    }
}

/// The process-wide, read-only set of provider profiles.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    profiles: HashMap<ProviderKind, Arc<ProviderProfile>>,
    default_kind: ProviderKind,
}

impl ProviderRegistry {
    /// Validate and register `profiles`.
    ///
    /// `default_kind` is used for logout when the session lost its login type and
    /// must itself be registered.
    pub fn new(
        profiles: impl IntoIterator<Item = ProviderProfile>,
        default_kind: ProviderKind,
    ) -> Result<Self, AuthError> {
        let mut map = HashMap::new();
        for profile in profiles {
            profile.validate()?;
            if map.insert(profile.kind, Arc::new(profile)).is_some() {
                return Err(AuthError::Config("duplicate provider profile".to_string()));
            }
        }
        if !map.contains_key(&default_kind) {
            return Err(AuthError::Config(format!(
                "default provider {default_kind} is not configured"
            )));
        }
        Ok(Self {
            profiles: map,
            default_kind,
        })
    }

    /// The profile for `kind`, if configured.
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<ProviderProfile>> {
        self.profiles.get(&kind)
    }

    /// The profile for `kind`, or an [`AuthError::UnknownProvider`].
    pub fn require(&self, kind: ProviderKind) -> Result<&Arc<ProviderProfile>, AuthError> {
        self.get(kind)
            .ok_or_else(|| AuthError::UnknownProvider(kind.to_string()))
    }

    /// The default profile used when no login type is known.
    pub fn default_profile(&self) -> &Arc<ProviderProfile> {
        // `new` guarantees the default is present.
        &self.profiles[&self.default_kind]
    }

    /// The profile matching `kind`, falling back to the default profile when the
    /// kind is absent or not configured.
    pub fn resolve_or_default(&self, kind: Option<ProviderKind>) -> &Arc<ProviderProfile> {
        kind.and_then(|k| self.get(k))
            .unwrap_or_else(|| self.default_profile())
    }

    /// Configured provider kinds.
    pub fn kinds(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        self.profiles.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(kind: ProviderKind) -> ProviderProfile {
        let base = Url::parse("https://idp.example.test/").unwrap();
        ProviderProfile {
            kind,
            authorization_endpoint: base.join("auth").unwrap(),
            token_endpoint: base.join("token").unwrap(),
            userinfo_endpoint: None,
            logout_endpoint: base.join("logout").unwrap(),
            broker_logout_endpoint: None,
            jwks_uri: None,
            issuer: None,
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: Url::parse("https://app.example.test/cb").unwrap(),
            default_scope: "openid".into(),
            idp_hint: None,
            requires_state: false,
            identity_label: None,
        }
    }

    #[test]
    fn login_type_round_trips_through_str() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("github".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn route_slugs_resolve() {
        assert_eq!(
            ProviderKind::from_route_slug("osspid-direct"),
            Some(ProviderKind::OsspidDirect)
        );
        assert_eq!(ProviderKind::from_route_slug("osspid_direct"), None);
    }

    #[test]
    fn serde_uses_login_type_strings() {
        let json = serde_json::to_string(&ProviderKind::OsspidDirect).unwrap();
        assert_eq!(json, "\"osspid_direct\"");
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut p = profile(ProviderKind::Keycloak);
        p.client_secret = " ".into();
        assert!(matches!(p.validate(), Err(AuthError::Config(_))));
    }

    #[test]
    fn registry_requires_default() {
        let err = ProviderRegistry::new([profile(ProviderKind::Uatid)], ProviderKind::Keycloak);
        assert!(err.is_err());
    }

    #[test]
    fn unknown_kind_falls_back_to_default() {
        let registry = ProviderRegistry::new(
            [profile(ProviderKind::Keycloak), profile(ProviderKind::OsspidDirect)],
            ProviderKind::Keycloak,
        )
        .unwrap();

        assert_eq!(registry.resolve_or_default(None).kind, ProviderKind::Keycloak);
        assert_eq!(
            registry.resolve_or_default(Some(ProviderKind::Uatid)).kind,
            ProviderKind::Keycloak
        );
        assert_eq!(
            registry
                .resolve_or_default(Some(ProviderKind::OsspidDirect))
                .kind,
            ProviderKind::OsspidDirect
        );
    }

    #[test]
    fn debug_hides_secret() {
        let out = format!("{:?}", profile(ProviderKind::Keycloak));
        assert!(!out.contains("secret\""));
        assert!(out.contains("<redacted>"));
    }
}
