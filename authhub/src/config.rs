use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use authhub_core::AuthError;
use authhub_flow::app_url;
use url::Url;

/// Credentials and routing for the primary Keycloak realm.
#[derive(Debug, Clone)]
pub struct KeycloakSettings {
    pub host: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    /// Upstream IdP selected by `/osspid-login`.
    pub idp: String,
}

#[derive(Debug, Clone)]
pub struct OsspidSettings {
    pub host: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    pub jwks_url: Option<Url>,
    /// Expected `iss` of verified ID tokens.
    pub issuer: Option<String>,
}

/// The optional UATID tenant realm.
#[derive(Debug, Clone)]
pub struct UatidSettings {
    pub host: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
    pub idp_hint: String,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub base_url: Url,
    pub http_timeout: Duration,
    pub session_ttl: chrono::Duration,
    /// How often expired sessions are purged from the store.
    pub session_sweep: Duration,
    pub cookie_secure: bool,
    /// sqlite URL for persistent sessions; in-memory when unset.
    pub session_db: Option<String>,
    pub keycloak: KeycloakSettings,
    pub osspid: OsspidSettings,
    pub uatid: Option<UatidSettings>,
}

impl GatewayConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let base_url = env.url_or("AUTHHUB_BASE_URL", "http://localhost:8010")?;
        let callback = |slug: &str| app_url(&base_url, &format!("/{slug}/callback"));

        let keycloak = KeycloakSettings {
            host: env.required("KEYCLOAK_HOST")?,
            realm: env.required("KEYCLOAK_REALM")?,
            client_id: env.required("KEYCLOAK_CLIENT_ID")?,
            client_secret: env.required("KEYCLOAK_CLIENT_SECRET")?,
            redirect_url: env.url_or_else("KEYCLOAK_REDIRECT_URL", || callback("keycloak"))?,
            idp: env.or("KEYCLOAK_IDP", "osspid"),
        };

        let osspid = OsspidSettings {
            host: env.required("OSSPID_HOST")?,
            client_id: env.required("OSSPID_CLIENT_ID")?,
            client_secret: env.required("OSSPID_CLIENT_SECRET")?,
            redirect_url: env.url_or_else("OSSPID_REDIRECT_URL", || callback("osspid-direct"))?,
            jwks_url: env.optional_url("OSSPID_JWKS_URL")?,
            issuer: env.get("OSSPID_ISSUER"),
        };

        let uatid = match env.get("UATID_CLIENT_ID") {
            Some(client_id) => Some(UatidSettings {
                host: env.or("UATID_HOST", &keycloak.host),
                realm: env.or("UATID_REALM", "osspid"),
                client_id,
                client_secret: env.required("UATID_CLIENT_SECRET")?,
                redirect_url: env.url_or_else("UATID_REDIRECT_URL", || callback("uatid"))?,
                idp_hint: env.or("UATID_IDP_HINT", "uatid"),
            }),
            None => None,
        };

        Ok(Self {
            bind_addr: env.parse_or("AUTHHUB_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8010)))?,
            http_timeout: Duration::from_secs(env.parse_or("AUTHHUB_HTTP_TIMEOUT_SECS", 10)?),
            session_ttl: chrono::Duration::hours(env.parse_or("AUTHHUB_SESSION_TTL_HOURS", 24)?),
            session_sweep: Duration::from_secs(env.parse_or("AUTHHUB_SESSION_SWEEP_SECS", 300)?),
            cookie_secure: env.flag("AUTHHUB_COOKIE_SECURE")?,
            session_db: env.get("AUTHHUB_SESSION_DB"),
            base_url,
            keycloak,
            osspid,
            uatid,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, AuthError> {
        self.get(key)
            .ok_or_else(|| AuthError::Config(format!("{key} is required")))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, AuthError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| AuthError::Config(format!("{key}: {e}"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, AuthError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("false") | Some("0") | Some("no") => Ok(false),
            Some("true") | Some("1") | Some("yes") => Ok(true),
            Some(other) => Err(AuthError::Config(format!("{key}: not a boolean: {other}"))),
        }
    }

    fn optional_url(&self, key: &str) -> Result<Option<Url>, AuthError> {
        self.get(key)
            .map(|raw| Url::parse(&raw).map_err(|e| AuthError::Config(format!("{key}: {e}"))))
            .transpose()
    }

    fn url_or(&self, key: &str, default: &str) -> Result<Url, AuthError> {
        self.url_or_else(key, || {
            Url::parse(default).map_err(|e| AuthError::Config(format!("{key}: {e}")))
        })
    }

    fn url_or_else(
        &self,
        key: &str,
        default: impl FnOnce() -> Result<Url, AuthError>,
    ) -> Result<Url, AuthError> {
        match self.optional_url(key)? {
            Some(url) => Ok(url),
            None => default(),
        }
    }
}
