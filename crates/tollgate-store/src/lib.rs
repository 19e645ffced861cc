//! Expiring key-value store backing the tollgate protocol state.
//!
//! Every protocol record — device requests, user sessions, CSRF state,
//! issued tokens, rate-limit buckets, the cached service credential — lives
//! in this store under a string key with an absolute expiry deadline.
//! Requests from the device, the browser, and the upstream redirect arrive
//! on independent connections, so nothing holds a record across requests;
//! every access round-trips through the store.
//!
//! The [`Store`] trait is a capability interface with interchangeable
//! backends. [`MemoryStore`] is the in-process backend: lazy expiry on read
//! plus an optional background reaper.

mod error;
mod memory;
mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use store::{DEFAULT_INCREMENT_TTL, SharedStore, Store};
