//! Minimum-client-version gate.
//!
//! Devices embed their version in the user agent as `<name>/<version>`.
//! When `VERSION_MIN` is configured, stale clients are turned away with
//! `version_mismatch` before any other validation runs, so an outdated
//! fleet fails fast instead of half-working.

use std::cmp::Ordering;

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;

use tollgate_config::ProxyConfig;
use tollgate_oauth::OAuthError;

/// Reject the request when the caller's user-agent version is below the
/// configured minimum. No-op when the gate is not configured.
pub fn check_client_version(
    config: &ProxyConfig,
    headers: &HeaderMap,
) -> Result<(), OAuthError> {
    let Some(version_min) = config.version_min.as_deref() else {
        return Ok(());
    };

    let version = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_version);

    match version {
        Some(v) if compare_versions(&v, version_min) != Ordering::Less => Ok(()),
        _ => Err(OAuthError::VersionMismatch),
    }
}

/// Pull the version token out of a `name/version [comment]` user agent.
fn extract_version(user_agent: &str) -> Option<String> {
    let (_, rest) = user_agent.split_once('/')?;
    rest.split_whitespace().next().map(str::to_string)
}

/// Compare dotted numeric versions segment by segment; missing segments
/// count as zero, non-numeric segments as zero.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|s| s.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());

    for i in 0..len {
        let (x, y) = (
            a.get(i).copied().unwrap_or(0),
            b.get(i).copied().unwrap_or(0),
        );
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
