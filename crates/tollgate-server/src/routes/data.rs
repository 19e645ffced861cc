//! The data proxy route.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Response,
};

use tollgate_oauth::{DataRequest, forward};

use crate::error::ApiError;
use crate::routes::{client_ip, relay};
use crate::state::AppState;
use crate::version::check_client_version;

/// `GET /data/proxy/{*path}` — forward a data request downstream after
/// validating the caller's bearer token.
pub async fn data_proxy_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    check_client_version(&state.config, &headers)?;

    let usage_point_id = query
        .iter()
        .find(|(k, _)| k == "usage_point_id")
        .map(|(_, v)| v.clone());
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let request = DataRequest {
        path,
        usage_point_id,
        authorization,
        query,
        client_ip: client_ip(&headers),
    };

    let response = forward::forward(
        state.store.as_ref(),
        &state.limiter,
        &state.credentials,
        state.upstream.as_ref(),
        &state.config,
        request,
    )
    .await?;

    Ok(relay(response))
}
