use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::provider::ProviderKind;

/// The tokens returned by a successful code exchange or refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// The access token used against the provider's APIs.
    pub access_token: String,
    /// The refresh token, when the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// The OIDC ID token in compact serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Seconds until the access token expires, as declared by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// A user identity normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Stable unique identifier; a synthetic placeholder when the provider supplied none.
    pub subject: String,
    /// The `preferred_username` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// The `name` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// The `email` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Human-readable origin of the identity, e.g. "Direct OSSPID".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_provider_label: Option<String>,
}

impl IdentityRecord {
    /// Build a record from userinfo or ID-token claims.
    ///
    /// `idp_denotation` wins over `default_label`. Returns `None` when the claims
    /// carry neither `sub` nor `preferred_username`.
    pub fn from_claims(claims: &Map<String, Value>, default_label: Option<&str>) -> Option<Self> {
        let preferred_username = string_claim(claims, "preferred_username");
        let subject = string_claim(claims, "sub").or_else(|| preferred_username.clone())?;

        Some(Self {
            subject,
            preferred_username,
            display_name: string_claim(claims, "name"),
            email: string_claim(claims, "email"),
            identity_provider_label: string_claim(claims, "idp_denotation")
                .or_else(|| default_label.map(str::to_string)),
        })
    }

    /// The degraded identity used when a provider supplied nothing decodable.
    pub fn placeholder(kind: ProviderKind, label: Option<&str>) -> Self {
        Self {
            subject: kind.placeholder_subject().to_string(),
            preferred_username: None,
            display_name: None,
            email: None,
            identity_provider_label: label.map(str::to_string),
        }
    }

    /// The best name to greet the user with.
    pub fn greeting_name(&self) -> &str {
        self.preferred_username.as_deref().unwrap_or(&self.subject)
    }
}

fn string_claim(claims: &Map<String, Value>, name: &str) -> Option<String> {
    match claims.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
