//! Device-facing routes: code generation, the entry page, the token
//! endpoint, and the opaque token-endpoint pass-through.

use axum::{
    Form, Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, Response},
};
use serde::Deserialize;

use tollgate_oauth::{DeviceGrant, TokenRequest, device, token};

use crate::error::ApiError;
use crate::routes::{client_ip, relay};
use crate::state::AppState;
use crate::version::check_client_version;
use crate::views;

/// `POST /device/code` form body.
#[derive(Debug, Deserialize)]
pub struct DeviceCodeForm {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// `POST /device/code` — start a device authorization attempt.
pub async fn generate_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DeviceCodeForm>,
) -> Result<Json<DeviceGrant>, ApiError> {
    check_client_version(&state.config, &headers)?;

    let grant = device::begin(
        state.store.as_ref(),
        &state.config,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
        form.scope.as_deref(),
    )
    .await?;

    Ok(Json(grant))
}

/// `GET /device` query parameters.
#[derive(Debug, Deserialize)]
pub struct DevicePageQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /device` — the human's code-entry page.
pub async fn device_page_handler(
    State(state): State<AppState>,
    Query(query): Query<DevicePageQuery>,
) -> Html<String> {
    Html(views::device_page(
        &state.config.base_url,
        query.code.as_deref(),
        query.state.as_deref(),
    ))
}

/// `GET /` — landing page.
pub async fn index_handler() -> Html<String> {
    Html(views::index_page())
}

/// `POST /device/token` form body. Unknown fields are ignored so clients
/// can send the full RFC 8628 shape.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub client_id: Option<String>,
    pub grant_type: Option<String>,
    pub device_code: Option<String>,
    pub usage_points_id: Option<String>,
    pub refresh_token: Option<String>,
}

/// `POST /device/token` — the device's polling and refresh endpoint.
pub async fn access_token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_client_version(&state.config, &headers)?;

    let request = TokenRequest {
        client_id: form.client_id,
        grant_type: form.grant_type,
        device_code: form.device_code,
        usage_points_id: form.usage_points_id,
        refresh_token: form.refresh_token,
    };

    let token = token::handle(
        state.store.as_ref(),
        &state.limiter,
        &state.config,
        request,
        &client_ip(&headers),
    )
    .await?;

    Ok(Json(token))
}

/// `POST /device/proxy` — opaque pass-through to the upstream token
/// endpoint, for clients that want to talk to it directly but cannot
/// reach it. The server's secret and redirect URI are injected.
pub async fn proxy_token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    check_client_version(&state.config, &headers)?;

    let mut params = form;
    if let Some(secret) = &state.config.client_secret {
        params.retain(|(k, _)| k != "client_secret");
        params.push(("client_secret".to_string(), secret.clone()));
    }

    let url = match &state.config.redirect_uri {
        Some(redirect_uri) => format!(
            "{}?redirect_uri={}",
            state.config.token_endpoint,
            urlencoding::encode(redirect_uri)
        ),
        None => state.config.token_endpoint.clone(),
    };

    let response = state.upstream.post_form(&url, &params).await?;
    Ok(relay(response))
}
