//! Error responses for the HTTP surface.
//!
//! The same protocol error renders two ways: machine-facing routes return
//! the OAuth JSON shape (`{error, error_description}`), browser-facing
//! routes render an HTML page. Handlers pick explicitly — the split is
//! part of the endpoint contract, not content negotiation.

use axum::{
    Json,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;

use tollgate_oauth::OAuthError;

use crate::views;

/// JSON error response body, the standard OAuth shape.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Wrapper that renders an [`OAuthError`] as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub OAuthError);

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        Self(e)
    }
}

fn status_for(error: &OAuthError) -> StatusCode {
    match error {
        OAuthError::Unauthorized { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::FORBIDDEN)
        }
        OAuthError::Store(_) | OAuthError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);

        match &self.0 {
            OAuthError::Store(_)
            | OAuthError::Config(_)
            | OAuthError::Upstream(_)
            | OAuthError::Network(_) => {
                tracing::error!(status = %status, error = %self.0, "Request failed");
            }
            _ => {
                tracing::warn!(status = %status, error = %self.0, "Client error");
            }
        }

        let body = ErrorResponse {
            error: self.0.error_code().to_string(),
            error_description: self.0.error_description(),
        };

        (status, Json(body)).into_response()
    }
}

/// Render a protocol error as an HTML page for the browser-facing routes.
pub fn html_error(error: &OAuthError) -> Response {
    let status = status_for(error);
    let (title, description) = match error {
        OAuthError::InvalidState(msg) => ("Invalid State".to_string(), msg.clone()),
        OAuthError::InvalidRequest(msg) => ("Invalid Request".to_string(), msg.clone()),
        OAuthError::Upstream(body) => (
            "Error Logging In".to_string(),
            format!("The authorization server did not return an access token: {body}"),
        ),
        OAuthError::UpstreamDenied { error, description } => (error.clone(), description.clone()),
        other => (
            other.error_code().to_string(),
            other.error_description().unwrap_or_default(),
        ),
    };

    tracing::warn!(status = %status, title = %title, "Browser flow failed");

    (status, Html(views::error_page(&title, &description))).into_response()
}
