//! Shared helpers for the black-box route tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use serde_json::Value;

use tollgate_config::ProxyConfig;
use tollgate_oauth::ScriptedUpstream;
use tollgate_server::{AppState, Server};
use tollgate_store::MemoryStore;

/// A router wired to an in-memory store and a scripted upstream.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub upstream: Arc<ScriptedUpstream>,
}

pub fn test_app(config: ProxyConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let upstream = Arc::new(ScriptedUpstream::new());
    let state = AppState::new(config, store.clone(), upstream.clone());

    TestApp {
        router: Server::new(state).router(),
        store,
        upstream,
    }
}

/// Build a form-encoded POST.
pub fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = serde_urlencoded::to_string(pairs).expect("form body encodes");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request builds")
}

/// Build a GET.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Read a response body as text.
pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is UTF-8")
}

/// Pull one query parameter out of a URL.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}
