use std::sync::Arc;

use authhub_core::{AuthError, ProviderKind, SameSite};
use authhub_flow::{CallbackParams, Gateway, LoginVariant, Session, SessionConfig, SessionStore};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tower_cookies::cookie::time;
use tower_cookies::{Cookie, Cookies};

use crate::error::{GatewayAxumError, JsonError};
use crate::pages;
use crate::StartedAt;

#[derive(Debug, Deserialize)]
pub struct IdpLogoutParams {
    pub provider: Option<String>,
}

pub fn to_cookie_same_site(same_site: SameSite) -> tower_cookies::cookie::SameSite {
    match same_site {
        SameSite::Lax => tower_cookies::cookie::SameSite::Lax,
        SameSite::Strict => tower_cookies::cookie::SameSite::Strict,
        SameSite::None => tower_cookies::cookie::SameSite::None,
    }
}

/// Build the session cookie for `value` according to `config`.
pub fn create_cookie(config: &SessionConfig, value: String) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), value))
        .path(config.path.clone())
        .secure(config.secure)
        .http_only(config.http_only)
        .same_site(to_cookie_same_site(config.same_site));

    if let Some(max_age) = config.max_age {
        builder = builder.max_age(time::Duration::seconds(max_age.num_seconds()));
    }
    builder.build()
}

fn remove_cookie(config: &SessionConfig, cookies: &Cookies) {
    cookies.remove(
        Cookie::build((config.cookie_name.clone(), ""))
            .path(config.path.clone())
            .build(),
    );
}

/// Load the session named by the request's cookie, if it is still live.
pub async fn get_session(
    store: &Arc<dyn SessionStore>,
    config: &SessionConfig,
    cookies: &Cookies,
) -> Result<Option<Session>, GatewayAxumError> {
    let Some(id) = cookies
        .get(&config.cookie_name)
        .map(|c| c.value().to_string())
    else {
        return Ok(None);
    };
    Ok(store.load_session(&id).await?)
}

async fn save_session(
    gateway: &Gateway,
    cookies: &Cookies,
    session: &Session,
) -> Result<(), GatewayAxumError> {
    gateway.session_store.save_session(session).await?;
    cookies.add(create_cookie(&gateway.session_config, session.id.clone()));
    Ok(())
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `GET /<name>-login`: redirect to the provider, remembering any CSRF state.
pub async fn login_handler(
    gateway: Gateway,
    cookies: Cookies,
    variant: LoginVariant,
) -> Result<Response, GatewayAxumError> {
    let existing = get_session(&gateway.session_store, &gateway.session_config, &cookies).await?;
    let existed = existing.is_some();
    let mut session = existing.unwrap_or_else(|| gateway.new_session());

    let url = gateway.begin_login(&variant, &mut session.data)?;
    // Anonymous logins without CSRF state leave nothing worth storing.
    if existed || session.data.oauth2_state.is_some() {
        save_session(&gateway, &cookies, &session).await?;
    }
    Ok(found(url.as_str()))
}

/// `GET /{provider}/callback`: finish the login and move the session to a fresh id.
pub async fn callback_handler(
    State(gateway): State<Gateway>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    cookies: Cookies,
) -> Result<Response, GatewayAxumError> {
    let kind = ProviderKind::from_route_slug(&provider)
        .ok_or_else(|| AuthError::UnknownProvider(provider.clone()))?;

    let existing = get_session(&gateway.session_store, &gateway.session_config, &cookies).await?;
    let existed = existing.is_some();
    let mut session = existing.unwrap_or_else(|| gateway.new_session());

    match gateway
        .complete_callback(kind, &mut session.data, params)
        .await
    {
        Ok(_) => {
            let previous = session.rotate_id();
            if existed {
                gateway.session_store.delete_session(&previous).await?;
            }
            save_session(&gateway, &cookies, &session).await?;
            Ok(found("/"))
        }
        Err(err) => {
            // Persist the consumed CSRF state.
            if existed {
                gateway.session_store.save_session(&session).await?;
            }
            Err(err.into())
        }
    }
}

/// `GET /logout`: destroy the session and hand the browser to the provider's logout.
pub async fn logout_handler(
    State(gateway): State<Gateway>,
    cookies: Cookies,
) -> Result<Response, GatewayAxumError> {
    let session = get_session(&gateway.session_store, &gateway.session_config, &cookies).await?;
    let data = session.as_ref().map(|s| s.data.clone()).unwrap_or_default();
    let url = gateway.logout_url(&data)?;

    if let Some(session) = session {
        gateway.session_store.delete_session(&session.id).await?;
        log::info!("session closed ({:?})", data.login_type);
    }
    remove_cookie(&gateway.session_config, &cookies);
    Ok(found(url.as_str()))
}

/// `GET /logout-idp`: the second hop of a brokered logout.
pub async fn idp_logout_handler(
    State(gateway): State<Gateway>,
    Query(params): Query<IdpLogoutParams>,
) -> Result<Response, GatewayAxumError> {
    match gateway.idp_logout_url(params.provider.as_deref())? {
        Some(url) => Ok(found(url.as_str())),
        None => Ok(found("/")),
    }
}

/// `POST /refresh`: renew the access token with the stored refresh token.
pub async fn refresh_handler(
    State(gateway): State<Gateway>,
    cookies: Cookies,
) -> Result<Json<serde_json::Value>, JsonError> {
    let mut session = get_session(&gateway.session_store, &gateway.session_config, &cookies)
        .await?
        .ok_or(AuthError::NotAuthenticated)?;

    let tokens = gateway.refresh(&mut session.data).await?;
    gateway.session_store.save_session(&session).await?;

    Ok(Json(serde_json::json!({
        "status": "refreshed",
        "expires_in": tokens.expires_in,
    })))
}

/// `GET /`: login links, or the current identity.
pub async fn home_handler(
    State(gateway): State<Gateway>,
    cookies: Cookies,
) -> Result<Html<String>, GatewayAxumError> {
    let session = get_session(&gateway.session_store, &gateway.session_config, &cookies).await?;
    let data = session.map(|s| s.data).unwrap_or_default();
    Ok(Html(pages::home_page(
        data.user.as_ref(),
        data.login_type,
        &gateway.login_variants,
    )))
}

pub async fn health_handler(State(started): State<StartedAt>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": started.0.elapsed().as_secs_f64(),
    }))
}

pub async fn status_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
