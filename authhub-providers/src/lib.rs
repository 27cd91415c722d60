//! # Authhub Providers
//!
//! Builders that turn deployment settings into validated [`ProviderProfile`]s:
//!
//! - **[`KeycloakRealm`]**: a Keycloak realm, either the primary broker or the UATID tenant.
//! - **[`OsspidDirect`]**: the OSSPID IdP contacted without a broker.
//!
//! The login routes exposed for each profile are described by [`LoginVariant`].

use authhub_core::{AuthError, ProviderKind, ProviderProfile};
use url::Url;

pub mod keycloak;
pub mod osspid;

pub use keycloak::KeycloakRealm;
pub use osspid::OsspidDirect;

/// One `GET /<name>-login` route: which profile it targets and which upstream IdP it pre-selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginVariant {
    /// Route path, e.g. `/osspid-login`.
    pub path: String,
    pub provider: ProviderKind,
    /// Overrides the profile's own `idp_hint` when set.
    pub idp_hint: Option<String>,
}

impl LoginVariant {
    pub fn new(path: impl Into<String>, provider: ProviderKind, idp_hint: Option<&str>) -> Self {
        Self {
            path: path.into(),
            provider,
            idp_hint: idp_hint.map(str::to_string),
        }
    }
}

/// The login routes of a standard deployment.
///
/// `keycloak_idp` is the upstream selected by `/osspid-login`. The UATID route is only
/// listed when that tenant is configured.
pub fn default_login_variants(keycloak_idp: &str, uatid_enabled: bool) -> Vec<LoginVariant> {
    let mut variants = vec![
        LoginVariant::new("/osspid-login", ProviderKind::Keycloak, Some(keycloak_idp)),
        LoginVariant::new("/banglabiz-login", ProviderKind::Keycloak, Some("banglabizz")),
        LoginVariant::new("/helloapp-login", ProviderKind::Keycloak, Some("helloapp")),
        LoginVariant::new("/all-login", ProviderKind::Keycloak, None),
        LoginVariant::new("/oidc-login", ProviderKind::Keycloak, None),
        LoginVariant::new("/osspid-direct-login", ProviderKind::OsspidDirect, None),
    ];
    if uatid_enabled {
        variants.push(LoginVariant::new("/uatid-login", ProviderKind::Uatid, None));
    }
    variants
}

pub(crate) fn endpoint(host: &str, path: &str) -> Result<Url, AuthError> {
    let raw = format!("{}/{}", host.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|e| AuthError::Config(format!("invalid endpoint {raw}: {e}")))
}

pub(crate) fn finish(profile: ProviderProfile) -> Result<ProviderProfile, AuthError> {
    profile.validate()?;
    Ok(profile)
}
