//! # PulseLink Core
//!
//! Shared foundation for the PulseLink resilient API access layer: the
//! request/response types that move through the pipeline, the error taxonomy
//! with its retry classification, the exponential-backoff retry policy, and
//! the connection-status types published to subscribers.
//!
//! Field deployments of the PulseLogic medical system talk to their backend
//! over radio and satellite links that drop without warning. Everything in
//! this crate exists so the higher layers (`pulselink-client`,
//! `pulselink-duplex`, `pulselink-auth`) can agree on what a request is, what
//! failed, and whether a failure is worth retrying.
//!
//! ## Architecture
//!
//! ```text
//! pulselink-core/
//! ├── config.rs  # LinkConfig and tuning knobs
//! ├── error.rs   # LinkError taxonomy with retry classification
//! ├── request.rs # RequestDescriptor and ApiResponse
//! ├── retry.rs   # RetryPolicy (exponential backoff + jitter)
//! └── status.rs  # ConnectionStatus and StatusEmitter
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod request;
pub mod retry;
pub mod status;

pub use config::LinkConfig;
pub use error::{LinkError, LinkResult};
pub use request::{ApiResponse, Method, RequestDescriptor};
pub use retry::RetryPolicy;
pub use status::{ConnectionStatus, StatusEmitter};
