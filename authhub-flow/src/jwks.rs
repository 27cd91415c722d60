use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Errors raised while verifying an ID token against a key set.
#[derive(Debug, Error)]
pub enum JwksError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Key not found in JWKS")]
    KeyNotFound,
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: Option<String>,
    pub kty: String,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

impl Jwk {
    fn to_decoding_key(&self) -> Result<DecodingKey, JwksError> {
        if self.kty != "RSA" {
            return Err(JwksError::UnsupportedKey(format!("kty {}", self.kty)));
        }
        let n = self
            .n
            .as_deref()
            .ok_or_else(|| JwksError::UnsupportedKey("missing 'n'".to_string()))?;
        let e = self
            .e
            .as_deref()
            .ok_or_else(|| JwksError::UnsupportedKey("missing 'e'".to_string()))?;
        Ok(DecodingKey::from_rsa_components(n, e)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    fn find_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(id) => self.keys.iter().find(|k| k.kid.as_deref() == Some(id)),
            None => self.keys.first(),
        }
    }
}

/// A provider's key set, fetched on first use and refreshed after `ttl` or on an unknown `kid`.
pub struct JwksCache {
    http: reqwest::Client,
    jwks_uri: Url,
    ttl: Duration,
    cached: RwLock<Option<CachedKeys>>,
}

struct CachedKeys {
    keys: Jwks,
    fetched_at: Instant,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, jwks_uri: Url, ttl: Duration) -> Self {
        Self {
            http,
            jwks_uri,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Resolve `kid` from the cached set, refetching once when the set is stale or lacks it.
    async fn key_for(&self, kid: Option<&str>) -> Result<Jwk, JwksError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            let fresh = cached.fetched_at.elapsed() < self.ttl;
            if let Some(key) = cached.keys.find_key(kid).filter(|_| fresh) {
                return Ok(key.clone());
            }
        }

        let keys = self.fetch().await?;
        let key = keys.find_key(kid).cloned();
        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.ok_or(JwksError::KeyNotFound)
    }

    async fn fetch(&self) -> Result<Jwks, JwksError> {
        log::debug!("fetching JWKS from {}", self.jwks_uri);
        Ok(self
            .http
            .get(self.jwks_uri.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<Jwks>()
            .await?)
    }

    /// Verify an RS256 ID token issued to `audience` and return its claims.
    ///
    /// When `issuer` is given the token's `iss` must match it exactly.
    pub async fn verify_id_token(
        &self,
        token: &str,
        audience: &str,
        issuer: Option<&str>,
    ) -> Result<Map<String, Value>, JwksError> {
        let header = decode_header(token)?;
        let key = self.key_for(header.kid.as_deref()).await?.to_decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
            validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        }

        Ok(decode::<Map<String, Value>>(token, &key, &validation)?.claims)
    }
}
