//! Browser-facing routes: user-code verification and the upstream
//! redirect callback. Errors on these routes render HTML, not JSON — a
//! human is on the other end.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use tollgate_oauth::{CallbackParams, authorize};

use crate::error::html_error;
use crate::state::AppState;
use crate::views;

/// `GET /auth/verify_code` query parameters.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /auth/verify_code` — validate the entered code and bounce the
/// browser to the upstream authorization server.
pub async fn verify_code_handler(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match authorize::verify(
        state.store.as_ref(),
        &state.config,
        query.code.as_deref(),
        query.state.as_deref(),
    )
    .await
    {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => html_error(&e),
    }
}

/// `GET /auth/redirect` — the upstream authorization server sends the
/// browser back here after consent.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let params = callback_params(query);

    match authorize::complete(
        state.store.as_ref(),
        &state.config,
        state.upstream.as_ref(),
        params,
    )
    .await
    {
        Ok(()) => Html(views::signed_in_page()).into_response(),
        Err(e) => html_error(&e),
    }
}

/// Split the redirect's query string into the named protocol parameters
/// and the pass-through remainder.
fn callback_params(mut query: HashMap<String, String>) -> CallbackParams {
    let code = query.remove("code");
    let state = query.remove("state");
    let error = query.remove("error");
    let error_description = query.remove("error_description");
    let usage_point_id = query.remove("usage_point_id");

    let mut extra: Vec<(String, String)> = query.into_iter().collect();
    // Deterministic order for the folded-in attributes
    extra.sort();
    if let Some(usage_point) = &usage_point_id {
        extra.push(("usage_point_id".to_string(), usage_point.clone()));
    }

    CallbackParams {
        code,
        state,
        error,
        error_description,
        usage_point_id,
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_split() {
        let mut query = HashMap::new();
        query.insert("code".to_string(), "c1".to_string());
        query.insert("state".to_string(), "s1".to_string());
        query.insert("usage_point_id".to_string(), "123".to_string());
        query.insert("custom".to_string(), "x".to_string());

        let params = callback_params(query);
        assert_eq!(params.code.as_deref(), Some("c1"));
        assert_eq!(params.state.as_deref(), Some("s1"));
        assert_eq!(params.usage_point_id.as_deref(), Some("123"));
        // state/code never reach extra; usage_point_id does, so exchange
        // mode folds it into the token object
        assert!(params.extra.iter().any(|(k, _)| k == "custom"));
        assert!(params.extra.iter().any(|(k, _)| k == "usage_point_id"));
        assert!(!params.extra.iter().any(|(k, _)| k == "code"));
    }
}
