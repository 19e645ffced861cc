//! Outbound HTTP client for the upstream authorization and data servers.
//!
//! All outbound calls go through the [`UpstreamClient`] trait so the
//! protocol steps can be exercised against a scripted fake. Responses carry
//! their status and content type alongside the body — headers travel with
//! the value, never through shared state, so concurrent outbound calls
//! cannot observe each other's headers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;

use crate::error::{OAuthError, Result};

/// An upstream response: status, content type, and raw body together.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl UpstreamResponse {
    /// Build a JSON response for tests and fakes.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.into(),
        }
    }

    /// Parse the body as JSON.
    pub fn json_body(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body)
            .map_err(|_| OAuthError::Upstream(self.body.clone()))
    }
}

/// Outbound calls the protocol makes on its own behalf.
#[async_trait]
pub trait UpstreamClient: Send + Sync + std::fmt::Debug {
    /// POST a form body (token exchange, client-credentials grant, and the
    /// opaque token-endpoint pass-through all take this shape).
    async fn post_form(&self, url: &str, params: &[(String, String)]) -> Result<UpstreamResponse>;

    /// GET a data resource with an authorization header.
    async fn get_data(
        &self,
        url: &str,
        query: &[(String, String)],
        authorization: &str,
    ) -> Result<UpstreamResponse>;
}

/// Production client backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Build a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OAuthError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn post_form(&self, url: &str, params: &[(String, String)]) -> Result<UpstreamResponse> {
        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        read_response(response).await
    }

    async fn get_data(
        &self,
        url: &str,
        query: &[(String, String)],
        authorization: &str,
    ) -> Result<UpstreamResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<UpstreamResponse> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = response.text().await?;

    Ok(UpstreamResponse {
        status,
        content_type,
        body,
    })
}

/// Scripted upstream for tests: pops queued responses and records calls.
#[derive(Debug, Default)]
pub struct ScriptedUpstream {
    responses: Mutex<VecDeque<Result<UpstreamResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// One call observed by [`ScriptedUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response; calls consume the queue front-to-back.
    pub fn push_response(&self, response: Result<UpstreamResponse>) {
        self.responses
            .lock()
            .expect("response queue poisoned")
            .push_back(response);
    }

    /// Calls observed so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn pop(&self) -> Result<UpstreamResponse> {
        self.responses
            .lock()
            .expect("response queue poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(OAuthError::Network(
                    "scripted upstream has no response queued".to_string(),
                ))
            })
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn post_form(&self, url: &str, params: &[(String, String)]) -> Result<UpstreamResponse> {
        self.calls.lock().expect("call log poisoned").push(RecordedCall {
            url: url.to_string(),
            params: params.to_vec(),
            authorization: None,
        });
        self.pop()
    }

    async fn get_data(
        &self,
        url: &str,
        query: &[(String, String)],
        authorization: &str,
    ) -> Result<UpstreamResponse> {
        self.calls.lock().expect("call log poisoned").push(RecordedCall {
            url: url.to_string(),
            params: query.to_vec(),
            authorization: Some(authorization.to_string()),
        });
        self.pop()
    }
}
