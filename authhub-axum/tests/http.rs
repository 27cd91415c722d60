use std::sync::Arc;

use authhub_axum::{GatewayAxumExt, GatewayState};
use authhub_core::{IdentityRecord, ProviderKind, TokenSet};
use authhub_flow::{Gateway, Session, SessionStore};
use authhub_providers::{default_login_variants, KeycloakRealm, OsspidDirect};
use authhub_session::MemoryStore;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;
use tower_cookies::CookieManagerLayer;
use url::Url;
use wiremock::matchers::{body_string_contains, header as has_header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// {"sub":"abc123","name":"Ada"}
const ADA: &str = "header.eyJzdWIiOiJhYmMxMjMiLCJuYW1lIjoiQWRhIn0.sig";
const COOKIE: &str = "authhub_session";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    server: MockServer,
}

impl TestApp {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let redirect = |slug: &str| {
            Url::parse(&format!("http://localhost:8010/{slug}/callback")).unwrap()
        };

        let gateway = Gateway::builder()
            .provider(
                KeycloakRealm::new(server.uri(), "main", "kc-app", "kc-secret", redirect("keycloak"))
                    .into_profile()
                    .unwrap(),
            )
            .provider(
                OsspidDirect::new(server.uri(), "osspid-app", "osspid-secret", redirect("osspid-direct"))
                    .into_profile()
                    .unwrap(),
            )
            .provider(
                KeycloakRealm::uatid(
                    server.uri(),
                    "uatid",
                    "uatid-app",
                    "uatid-secret",
                    redirect("uatid"),
                    "osspid",
                )
                .into_profile()
                .unwrap(),
            )
            .base_url(Url::parse("http://localhost:8010").unwrap())
            .login_variants(default_login_variants("osspid", true))
            .session_store(store.clone())
            .build()
            .unwrap();

        let app = gateway
            .axum_router()
            .with_state(GatewayState::from(gateway.clone()))
            .layer(CookieManagerLayer::new());

        Self { app, store, server }
    }

    async fn get(&self, uri: &str, session: Option<&str>) -> Response<Body> {
        self.send("GET", uri, session).await
    }

    async fn send(&self, method: &str, uri: &str, session: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(id) = session {
            request = request.header(header::COOKIE, format!("{COOKIE}={id}"));
        }
        self.app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn seed(&self, kind: ProviderKind, refresh_token: Option<&str>) -> String {
        let mut session = Session::new(chrono::Duration::hours(1));
        session.data.store_auth_data(
            kind,
            TokenSet {
                access_token: "AT1".into(),
                refresh_token: refresh_token.map(str::to_string),
                id_token: Some("IDT1".into()),
                expires_in: Some(300),
            },
            IdentityRecord::placeholder(kind, None),
        );
        self.store.save_session(&session).await.unwrap();
        session.id
    }
}

fn location(response: &Response<Body>) -> Url {
    let raw = response.headers()[header::LOCATION].to_str().unwrap();
    Url::parse(raw).unwrap_or_else(|_| Url::parse("http://localhost:8010").unwrap().join(raw).unwrap())
}

fn query(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.strip_prefix(&format!("{COOKIE}=")))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
        .find(|v| !v.is_empty())
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn token_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "AT1",
        "refresh_token": "RT1",
        "id_token": ADA,
        "expires_in": 300,
    }))
}

#[tokio::test]
async fn keycloak_variant_redirects_with_idp_hint() {
    let app = TestApp::new().await;
    let response = app.get("/helloapp-login", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let url = location(&response);
    assert_eq!(url.path(), "/realms/main/protocol/openid-connect/auth");
    assert_eq!(query(&url, "kc_idp_hint").as_deref(), Some("helloapp"));
    assert_eq!(query(&url, "client_id").as_deref(), Some("kc-app"));
    assert_eq!(query(&url, "state"), None);
}

#[tokio::test]
async fn all_login_leaves_idp_choice_to_keycloak() {
    let app = TestApp::new().await;
    let url = location(&app.get("/all-login", None).await);
    assert_eq!(query(&url, "kc_idp_hint"), None);
}

#[tokio::test]
async fn osspid_direct_login_stores_state() {
    let app = TestApp::new().await;
    let response = app.get("/osspid-direct-login", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let id = session_cookie(&response).unwrap();
    let url = location(&response);
    assert_eq!(url.path(), "/osspid-client/openid/v2/authorize");

    let state = query(&url, "state").unwrap();
    assert_eq!(state.len(), 32);
    assert!(state.chars().all(|c| c.is_ascii_hexdigit()));

    let session = app.store.load_session(&id).await.unwrap().unwrap();
    assert_eq!(session.data.oauth2_state.as_deref(), Some(state.as_str()));
}

#[tokio::test]
async fn osspid_callback_logs_the_user_in() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/osspid-client/openid/v2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=c1"))
        .respond_with(token_response())
        .expect(1)
        .mount(&app.server)
        .await;

    let login = app.get("/osspid-direct-login", None).await;
    let first_id = session_cookie(&login).unwrap();
    let state = query(&location(&login), "state").unwrap();

    let response = app
        .get(
            &format!("/osspid-direct/callback?code=c1&state={state}"),
            Some(&first_id),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let new_id = session_cookie(&response).unwrap();
    assert_ne!(new_id, first_id);
    assert!(app.store.load_session(&first_id).await.unwrap().is_none());

    let session = app.store.load_session(&new_id).await.unwrap().unwrap();
    assert_eq!(session.data.login_type, Some(ProviderKind::OsspidDirect));
    assert_eq!(session.data.access_token.as_deref(), Some("AT1"));
    assert_eq!(session.data.oauth2_state, None);
    let user = session.data.user.unwrap();
    assert_eq!(user.subject, "abc123");
    assert_eq!(user.identity_provider_label.as_deref(), Some("Direct OSSPID"));

    let home = body_text(app.get("/", Some(&new_id)).await).await;
    assert!(home.contains("Welcome, abc123!"));
    assert!(home.contains("Name: Ada"));
    assert!(home.contains("osspid_direct"));
}

#[tokio::test]
async fn osspid_callback_without_state_is_rejected() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .expect(0)
        .mount(&app.server)
        .await;

    let login = app.get("/osspid-direct-login", None).await;
    let id = session_cookie(&login).unwrap();

    let response = app.get("/osspid-direct/callback?code=c1", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Invalid state parameter"));

    let session = app.store.load_session(&id).await.unwrap().unwrap();
    assert!(session.data.user.is_none());
    assert_eq!(session.data.oauth2_state, None);
}

#[tokio::test]
async fn state_cannot_be_replayed() {
    let app = TestApp::new().await;
    let login = app.get("/osspid-direct-login", None).await;
    let id = session_cookie(&login).unwrap();
    let state = query(&location(&login), "state").unwrap();

    let uri = format!("/osspid-direct/callback?state={state}&error=access_denied");
    assert_eq!(app.get(&uri, Some(&id)).await.status(), StatusCode::BAD_REQUEST);

    let replay = app
        .get(&format!("/osspid-direct/callback?code=c1&state={state}"), Some(&id))
        .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(replay).await.contains("Invalid state parameter"));
}

#[tokio::test]
async fn provider_error_is_shown_to_the_user() {
    let app = TestApp::new().await;
    let response = app
        .get(
            "/keycloak/callback?error=access_denied&error_description=User%20cancelled",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("Invalid Request"));
    assert!(html.contains("User cancelled"));
}

#[tokio::test]
async fn missing_code_is_rejected() {
    let app = TestApp::new().await;
    let response = app.get("/keycloak/callback", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_provider_callback_is_not_found() {
    let app = TestApp::new().await;
    let response = app.get("/github/callback?code=c1", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn keycloak_callback_uses_userinfo() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/realms/main/protocol/openid-connect/token"))
        .respond_with(token_response())
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/realms/main/protocol/openid-connect/userinfo"))
        .and(has_header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sub": "kc-42",
            "preferred_username": "grace",
            "email": "grace@example.test",
            "idp_denotation": "HelloApp",
        })))
        .mount(&app.server)
        .await;

    let response = app.get("/keycloak/callback?code=c1", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let id = session_cookie(&response).unwrap();
    let session = app.store.load_session(&id).await.unwrap().unwrap();
    let user = session.data.user.unwrap();
    assert_eq!(user.subject, "kc-42");
    assert_eq!(user.identity_provider_label.as_deref(), Some("HelloApp"));
    assert_eq!(session.data.login_type, Some(ProviderKind::Keycloak));
}

#[tokio::test]
async fn userinfo_failure_is_an_authentication_error() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/realms/main/protocol/openid-connect/token"))
        .respond_with(token_response())
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/realms/main/protocol/openid-connect/userinfo"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.server)
        .await;

    let response = app.get("/keycloak/callback?code=c1", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&response).is_none());
    let html = body_text(response).await;
    assert!(html.contains("Authentication Error"));
    assert!(html.contains("Failed to retrieve user information"));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn token_error_description_is_surfaced() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/realms/main/protocol/openid-connect/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Code not valid",
        })))
        .mount(&app.server)
        .await;

    let response = app.get("/keycloak/callback?code=stale", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Code not valid"));
}

#[tokio::test]
async fn logout_without_session_uses_keycloak() {
    let app = TestApp::new().await;
    let response = app.get("/logout", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let url = location(&response);
    assert_eq!(url.path(), "/realms/main/protocol/openid-connect/logout");
    assert_eq!(
        query(&url, "post_logout_redirect_uri").as_deref(),
        Some("http://localhost:8010/")
    );
    assert_eq!(query(&url, "client_id").as_deref(), Some("kc-app"));
    assert_eq!(query(&url, "id_token_hint"), None);
}

#[tokio::test]
async fn osspid_logout_destroys_the_session() {
    let app = TestApp::new().await;
    let id = app.seed(ProviderKind::OsspidDirect, None).await;

    let response = app.get("/logout", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let url = location(&response);
    assert_eq!(url.path(), "/osspid-client/openid/v2/logout");
    assert_eq!(query(&url, "id_token_hint").as_deref(), Some("IDT1"));
    assert_eq!(query(&url, "client_id").as_deref(), Some("osspid-app"));
    assert!(app.store.load_session(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn uatid_logout_takes_two_hops() {
    let app = TestApp::new().await;
    let id = app.seed(ProviderKind::Uatid, None).await;

    let first = location(&app.get("/logout", Some(&id)).await);
    assert_eq!(first.path(), "/realms/uatid/protocol/openid-connect/logout");
    assert_eq!(
        query(&first, "post_logout_redirect_uri").as_deref(),
        Some("http://localhost:8010/logout-idp?provider=uatid")
    );
    assert!(app.store.load_session(&id).await.unwrap().is_none());

    let second = app.get("/logout-idp?provider=uatid", None).await;
    assert_eq!(second.status(), StatusCode::FOUND);
    let second = location(&second);
    assert_eq!(second.path(), "/realms/uatid/broker/osspid/logout");
    assert_eq!(
        query(&second, "redirect_uri").as_deref(),
        Some("http://localhost:8010/")
    );
}

#[tokio::test]
async fn idp_logout_for_unbrokered_provider_goes_home() {
    let app = TestApp::new().await;
    for uri in ["/logout-idp?provider=keycloak", "/logout-idp?provider=nope", "/logout-idp"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }
}

#[tokio::test]
async fn refresh_requires_a_logged_in_session() {
    let app = TestApp::new().await;
    let response = app.send("POST", "/refresh", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "You are not logged in" })
    );

    let id = app.seed(ProviderKind::Keycloak, None).await;
    let response = app.send("POST", "/refresh", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_replaces_the_access_token() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/realms/main/protocol/openid-connect/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=RT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT2",
            "expires_in": 600,
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let id = app.seed(ProviderKind::Keycloak, Some("RT1")).await;
    let response = app.send("POST", "/refresh", Some(&id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "status": "refreshed", "expires_in": 600 })
    );

    let session = app.store.load_session(&id).await.unwrap().unwrap();
    assert_eq!(session.data.access_token.as_deref(), Some("AT2"));
    assert_eq!(session.data.refresh_token.as_deref(), Some("RT1"));
    assert_eq!(session.data.id_token.as_deref(), Some("IDT1"));
}

#[tokio::test]
async fn anonymous_home_lists_login_routes() {
    let app = TestApp::new().await;
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    for route in ["/osspid-login", "/helloapp-login", "/osspid-direct-login", "/uatid-login"] {
        assert!(html.contains(&format!("href=\"{route}\"")), "{route} missing");
    }
}

#[tokio::test]
async fn health_and_status_report_json() {
    let app = TestApp::new().await;

    let health = body_json(app.get("/health", None).await).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["uptime"].as_f64().unwrap() >= 0.0);
    assert!(health["timestamp"].is_string());

    let status = body_json(app.get("/api/status", None).await).await;
    assert_eq!(status["status"], "OK");
    assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn anonymous_stateless_logins_do_not_fill_the_store() {
    let app = TestApp::new().await;
    for _ in 0..50 {
        let response = app.get("/all-login", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(session_cookie(&response).is_none());
    }
    assert!(app.store.is_empty().await);

    app.get("/osspid-direct-login", None).await;
    assert_eq!(app.store.len().await, 1);
}
