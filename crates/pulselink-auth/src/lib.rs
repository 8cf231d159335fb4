//! # PulseLink Auth
//!
//! Shared bearer-token state and the refresh coordinator for the PulseLink
//! access layer.
//!
//! The backend issues short-lived access tokens alongside longer-lived
//! refresh tokens. Rather than letting every request discover expiry the hard
//! way (a 401 over a 700 ms satellite round trip), the [`TokenStore`] decodes
//! the access token's self-reported `exp` claim and refreshes proactively
//! when it is about to lapse. The claim is read, not verified; signature
//! verification belongs to the backend.
//!
//! Refresh is deliberately a single best-effort attempt per request cycle
//! and never goes through the retry executor: piling backoff retries onto an
//! already-failing auth backend would only compound the storm. A failed
//! refresh leaves the stale pair in place and the backend's eventual 401 is
//! the caller-visible symptom.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod store;
pub mod token;

pub use store::{TokenConfig, TokenStore};
pub use token::{TokenPair, decode_expiry};
