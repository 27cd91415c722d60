//! # Authhub Axum
//!
//! Mounts the gateway on an axum router: one route per login variant, the provider
//! callbacks, logout (including the broker hop), token refresh, the home page and the
//! liveness endpoints. Requires a `tower_cookies::CookieManagerLayer` on the router.

pub use authhub_flow::{Gateway, SessionConfig, SessionStore};
use axum::extract::{FromRef, State};
use std::sync::Arc;
use std::time::Instant;
use tower_cookies::Cookies;

pub mod error;
pub mod helpers;
pub mod pages;

pub use error::{GatewayAxumError, JsonError};
pub use helpers::*;

/// When the process started serving, for `/health` uptime.
#[derive(Debug, Clone, Copy)]
pub struct StartedAt(pub Instant);

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Gateway,
    pub started_at: StartedAt,
}

impl From<Gateway> for GatewayState {
    fn from(gateway: Gateway) -> Self {
        Self {
            gateway,
            started_at: StartedAt(Instant::now()),
        }
    }
}

impl FromRef<GatewayState> for Gateway {
    fn from_ref(state: &GatewayState) -> Self {
        state.gateway.clone()
    }
}

impl FromRef<GatewayState> for StartedAt {
    fn from_ref(state: &GatewayState) -> Self {
        state.started_at
    }
}

impl FromRef<GatewayState> for Arc<dyn SessionStore> {
    fn from_ref(state: &GatewayState) -> Self {
        state.gateway.session_store.clone()
    }
}

impl FromRef<GatewayState> for SessionConfig {
    fn from_ref(state: &GatewayState) -> Self {
        state.gateway.session_config.clone()
    }
}

pub trait GatewayAxumExt {
    fn axum_router<S>(&self) -> axum::Router<S>
    where
        S: Clone + Send + Sync + 'static,
        Gateway: FromRef<S>,
        StartedAt: FromRef<S>;
}

impl GatewayAxumExt for Gateway {
    fn axum_router<S>(&self) -> axum::Router<S>
    where
        S: Clone + Send + Sync + 'static,
        Gateway: FromRef<S>,
        StartedAt: FromRef<S>,
    {
        use axum::routing::{get, post};

        let mut router = axum::Router::new()
            .route("/", get(helpers::home_handler))
            .route("/{provider}/callback", get(helpers::callback_handler))
            .route("/logout", get(helpers::logout_handler))
            .route("/logout-idp", get(helpers::idp_logout_handler))
            .route("/refresh", post(helpers::refresh_handler))
            .route("/health", get(helpers::health_handler))
            .route("/api/status", get(helpers::status_handler));

        for variant in self.login_variants.iter().cloned() {
            let path = variant.path.clone();
            router = router.route(
                &path,
                get(move |State(gateway): State<Gateway>, cookies: Cookies| {
                    helpers::login_handler(gateway, cookies, variant.clone())
                }),
            );
        }
        router
    }
}
