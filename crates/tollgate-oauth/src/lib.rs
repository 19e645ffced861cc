//! Device-authorization-grant protocol state machine for tollgate.
//!
//! A constrained device with no browser asks this proxy for a device/user
//! code pair, a human enters the user code in a real browser and consents
//! at the upstream authorization server, and the device polls until its
//! token is ready. Every step lands on an independent HTTP connection; the
//! only thing tying them together is the expiring record store.
//!
//! # Components
//!
//! - [`device`] — device/user code generation and the session records
//! - [`authorize`] — user-code verification, CSRF state, redirect completion
//! - [`token`] — device polling and refresh-token exchange
//! - [`credentials`] — the proxy's own client-credentials token
//! - [`forward`] — bearer-validated pass-through to the data API
//! - [`ratelimit`] — store-backed fixed-window request counter
//! - [`upstream`] — outbound HTTP behind a swappable trait

pub mod authorize;
pub mod credentials;
pub mod device;
pub mod error;
pub mod forward;
pub mod ratelimit;
pub mod token;
pub mod upstream;

pub use authorize::CallbackParams;
pub use credentials::CredentialManager;
pub use device::{DeviceGrant, DeviceRequest, DeviceSession, DeviceStatus};
pub use error::{OAuthError, Result};
pub use forward::DataRequest;
pub use ratelimit::RateLimiter;
pub use token::{DEVICE_CODE_GRANT, TokenRequest};
pub use upstream::{HttpUpstream, ScriptedUpstream, UpstreamClient, UpstreamResponse};
