use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use authhub_core::{
    IdentityRecord, ProviderKind, ProviderProfile, ProviderRegistry, ResolveError, TokenSet,
};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::{Map, Value};

use crate::jwks::JwksCache;

const JWKS_TTL: Duration = Duration::from_secs(3600);

// Compact JWTs drop padding; accept it either way.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Turns a token response into an [`IdentityRecord`].
///
/// Profiles with a userinfo endpoint must answer it; everything else degrades to ID-token
/// claims and finally to a placeholder identity.
pub struct IdentityResolver {
    http: reqwest::Client,
    verifiers: HashMap<ProviderKind, Arc<JwksCache>>,
}

impl IdentityResolver {
    /// Prepare a key-set cache for every profile that publishes one.
    pub fn new(http: reqwest::Client, registry: &ProviderRegistry) -> Self {
        let verifiers = registry
            .kinds()
            .filter_map(|kind| {
                let uri = registry.get(kind)?.jwks_uri.clone()?;
                Some((kind, Arc::new(JwksCache::new(http.clone(), uri, JWKS_TTL))))
            })
            .collect();
        Self { http, verifiers }
    }

    /// Resolve who logged in: userinfo when the profile has one, otherwise the ID-token
    /// claims (verified first when a key set is configured), otherwise a placeholder.
    pub async fn resolve_identity(
        &self,
        profile: &ProviderProfile,
        tokens: &TokenSet,
    ) -> Result<IdentityRecord, ResolveError> {
        let label = profile.identity_label.as_deref();

        if let Some(userinfo) = &profile.userinfo_endpoint {
            let claims = self.fetch_userinfo(profile, userinfo, &tokens.access_token).await?;
            return IdentityRecord::from_claims(&claims, label).ok_or_else(|| {
                log::error!("{}: userinfo carried neither sub nor preferred_username", profile.kind);
                ResolveError::UserInfo
            });
        }

        if let Some(id_token) = &tokens.id_token {
            let claims = match self.verifiers.get(&profile.kind) {
                Some(cache) => Some(
                    cache
                        .verify_id_token(id_token, &profile.client_id, profile.issuer.as_deref())
                        .await
                        .map_err(|e| {
                            log::error!("{}: ID token rejected: {e}", profile.kind);
                            ResolveError::Verification(e.to_string())
                        })?,
                ),
                None => decode_id_token_claims(id_token),
            };
            if let Some(record) = claims.and_then(|c| IdentityRecord::from_claims(&c, label)) {
                return Ok(record);
            }
            log::warn!("{}: ID token carried no usable identity", profile.kind);
        }

        log::info!("{}: falling back to placeholder identity", profile.kind);
        Ok(IdentityRecord::placeholder(profile.kind, label))
    }

    async fn fetch_userinfo(
        &self,
        profile: &ProviderProfile,
        endpoint: &url::Url,
        access_token: &str,
    ) -> Result<Map<String, Value>, ResolveError> {
        let response = self
            .http
            .get(endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                log::error!("{}: userinfo request failed: {e}", profile.kind);
                ResolveError::UserInfo
            })?;

        if !response.status().is_success() {
            log::error!("{}: userinfo returned {}", profile.kind, response.status());
            return Err(ResolveError::UserInfo);
        }

        response.json::<Map<String, Value>>().await.map_err(|e| {
            log::error!("{}: userinfo body is not a JSON object: {e}", profile.kind);
            ResolveError::UserInfo
        })
    }
}

/// Read the claims of a compact JWT without checking its signature.
///
/// Returns `None` unless the token has exactly three segments and the middle one decodes
/// to a JSON object.
pub fn decode_id_token_claims(token: &str) -> Option<Map<String, Value>> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return None;
    };
    let standard = payload.replace('-', "+").replace('_', "/");
    let bytes = LENIENT_BASE64.decode(standard).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}
