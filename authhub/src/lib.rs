//! # Authhub
//!
//! Assembles the login gateway from [`config::GatewayConfig`]: the Keycloak realm with its
//! `kc_idp_hint` login routes, direct OSSPID, the optional UATID tenant and the session
//! store, mounted on an axum router.

use std::sync::Arc;
use std::time::Duration;

use authhub_axum::{GatewayAxumExt, GatewayState};
use authhub_core::AuthError;
use authhub_flow::{Gateway, SessionConfig, SessionStore};
use authhub_providers::{default_login_variants, KeycloakRealm, OsspidDirect};
use authhub_session::{MemoryStore, SqlStore};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_cookies::CookieManagerLayer;

pub mod config;

use config::GatewayConfig;

/// Open the configured session store, running the SQL migration when one is used.
pub async fn session_store(config: &GatewayConfig) -> Result<Arc<dyn SessionStore>, AuthError> {
    let Some(url) = &config.session_db else {
        log::info!("using in-memory session store");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = SqlitePoolOptions::new()
        .connect(url)
        .await
        .map_err(|e| AuthError::Config(format!("session database: {e}")))?;
    let store = SqlStore::new(pool);
    store.migrate().await?;
    log::info!("using sqlite session store");
    Ok(Arc::new(store))
}

/// Purge expired sessions from `store` every `every` until the task is aborted.
pub fn spawn_session_sweeper(
    store: Arc<dyn SessionStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.delete_expired().await {
                Ok(0) => {}
                Ok(n) => log::debug!("purged {n} expired sessions"),
                Err(e) => log::warn!("session purge failed: {e}"),
            }
        }
    })
}

/// Build the gateway for every configured provider.
pub fn build_gateway(
    config: &GatewayConfig,
    store: Arc<dyn SessionStore>,
) -> Result<Gateway, AuthError> {
    let kc = &config.keycloak;
    let keycloak = KeycloakRealm::new(
        kc.host.as_str(),
        kc.realm.as_str(),
        kc.client_id.as_str(),
        kc.client_secret.as_str(),
        kc.redirect_url.clone(),
    );

    let os = &config.osspid;
    let mut osspid = OsspidDirect::new(
        os.host.as_str(),
        os.client_id.as_str(),
        os.client_secret.as_str(),
        os.redirect_url.clone(),
    );
    if let Some(jwks) = &os.jwks_url {
        osspid = osspid.with_jwks_uri(jwks.clone());
    }
    if let Some(issuer) = &os.issuer {
        osspid = osspid.with_issuer(issuer.as_str());
    }

    let mut builder = Gateway::builder()
        .provider(keycloak.into_profile()?)
        .provider(osspid.into_profile()?);

    if let Some(ut) = &config.uatid {
        let uatid = KeycloakRealm::uatid(
            ut.host.as_str(),
            ut.realm.as_str(),
            ut.client_id.as_str(),
            ut.client_secret.as_str(),
            ut.redirect_url.clone(),
            ut.idp_hint.as_str(),
        );
        builder = builder.provider(uatid.into_profile()?);
    }

    builder
        .base_url(config.base_url.clone())
        .http_timeout(config.http_timeout)
        .session_config(SessionConfig {
            secure: config.cookie_secure,
            max_age: Some(config.session_ttl),
            ..Default::default()
        })
        .login_variants(default_login_variants(&kc.idp, config.uatid.is_some()))
        .session_store(store)
        .build()
}

/// The complete HTTP application.
pub fn app(gateway: Gateway) -> Router {
    let routes = gateway.axum_router();
    routes
        .with_state(GatewayState::from(gateway))
        .layer(CookieManagerLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn config(uatid: bool) -> GatewayConfig {
        let mut env = HashMap::from([
            ("KEYCLOAK_HOST", "https://sso.example.test"),
            ("KEYCLOAK_REALM", "main"),
            ("KEYCLOAK_CLIENT_ID", "kc-app"),
            ("KEYCLOAK_CLIENT_SECRET", "kc-secret"),
            ("OSSPID_HOST", "https://osspid.example.test"),
            ("OSSPID_CLIENT_ID", "osspid-app"),
            ("OSSPID_CLIENT_SECRET", "osspid-secret"),
        ]);
        if uatid {
            env.insert("UATID_CLIENT_ID", "uatid-app");
            env.insert("UATID_CLIENT_SECRET", "uatid-secret");
        }
        GatewayConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
    }

    #[tokio::test]
    async fn routes_follow_configured_tenants() {
        let store = session_store(&config(false)).await.unwrap();
        let gateway = build_gateway(&config(false), store.clone()).unwrap();
        assert!(!gateway.login_variants.iter().any(|v| v.path == "/uatid-login"));

        let gateway = build_gateway(&config(true), store).unwrap();
        let uatid = gateway
            .login_variants
            .iter()
            .find(|v| v.path == "/uatid-login")
            .unwrap();
        let url = gateway
            .begin_login(uatid, &mut Default::default())
            .unwrap();
        assert!(url.as_str().starts_with(
            "https://sso.example.test/realms/osspid/protocol/openid-connect/auth?"
        ));
        assert!(url.as_str().contains("kc_idp_hint=uatid"));
    }

    #[tokio::test]
    async fn osspid_login_route_uses_keycloak_idp() {
        let config = config(false);
        let store = session_store(&config).await.unwrap();
        let response = app(build_gateway(&config, store).unwrap())
            .oneshot(
                Request::builder()
                    .uri("/osspid-login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://sso.example.test/realms/main/"));
        assert!(location.contains("kc_idp_hint=osspid"));
        assert!(response.headers().get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn session_cookie_follows_secure_setting() {
        let config = config(false);
        let store = session_store(&config).await.unwrap();
        let response = app(build_gateway(&config, store).unwrap())
            .oneshot(
                Request::builder()
                    .uri("/osspid-direct-login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("authhub_session="));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn sweeper_reclaims_abandoned_sessions() {
        let memory = Arc::new(MemoryStore::new());
        for _ in 0..5 {
            memory
                .save_session(&authhub_flow::Session::new(chrono::Duration::seconds(-1)))
                .await
                .unwrap();
        }
        let live = authhub_flow::Session::new(chrono::Duration::hours(1));
        memory.save_session(&live).await.unwrap();

        let sweeper = spawn_session_sweeper(memory.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert_eq!(memory.len().await, 1);
        assert!(memory.load_session(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn health_is_served() {
        let config = config(false);
        let store = session_store(&config).await.unwrap();
        let response = app(build_gateway(&config, store).unwrap())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }
}
