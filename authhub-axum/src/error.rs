use authhub_core::{AuthError, StatusClass};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::pages;

/// Errors surfaced by the gateway's HTTP handlers.
#[derive(Debug, Error)]
pub enum GatewayAxumError {
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl GatewayAxumError {
    pub fn status(&self) -> StatusCode {
        let GatewayAxumError::Auth(err) = self;
        match err.status_class() {
            StatusClass::BadRequest => StatusCode::BAD_REQUEST,
            StatusClass::Unauthenticated => StatusCode::UNAUTHORIZED,
            StatusClass::NotFound => StatusCode::NOT_FOUND,
            StatusClass::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        let GatewayAxumError::Auth(err) = self;
        err.public_message()
    }

    fn log(&self) {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed ({status}): {self}");
        } else {
            log::warn!("request rejected ({status}): {self}");
        }
    }
}

impl IntoResponse for GatewayAxumError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let title = if status.is_server_error() {
            "Authentication Error"
        } else {
            "Invalid Request"
        };
        (status, Html(pages::error_page(title, &self.public_message()))).into_response()
    }
}

/// The JSON rendering of [`GatewayAxumError`] for API routes.
#[derive(Debug)]
pub struct JsonError(pub GatewayAxumError);

impl From<GatewayAxumError> for JsonError {
    fn from(err: GatewayAxumError) -> Self {
        JsonError(err)
    }
}

impl From<AuthError> for JsonError {
    fn from(err: AuthError) -> Self {
        JsonError(err.into())
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        self.0.log();
        let body = serde_json::json!({ "error": self.0.public_message() });
        (self.0.status(), Json(body)).into_response()
    }
}
