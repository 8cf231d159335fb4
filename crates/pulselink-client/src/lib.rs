//! # PulseLink Client
//!
//! Resilient HTTP request pipeline for field units talking to a PulseLogic
//! backend over unreliable radio/satellite links.
//!
//! The pipeline survives three distinct failure modes without losing request
//! intent:
//!
//! - **Transient backend failures** (5xx, 408, 429, dropped connections) are
//!   absorbed by the backoff executor, which retries with exponential delays
//!   and jitter.
//! - **Connectivity loss** parks requests in a FIFO offline queue; they
//!   replay in order, each through the executor, once the link returns.
//! - **Backend outages** are detected by a background health monitor probing
//!   `/health` independently of user traffic; its verdict feeds the
//!   connection status publisher.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulselink_client::{LinkConfig, RequestDescriptor, ResilientClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ResilientClient::new(LinkConfig::new("https://ops.example.mil/api"));
//! client.start_health_monitor();
//!
//! // Wire platform connectivity events to set_online(); headless hosts
//! // simply never call it and stay online.
//! let response = client.request(RequestDescriptor::get("/patients")).await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! pulselink-client/
//! ├── transport.rs # HttpTransport trait + reqwest implementation
//! ├── executor.rs  # Backoff executor (retry loop)
//! ├── queue.rs     # Offline queue (FIFO replay)
//! ├── health.rs    # Background health monitor
//! ├── publisher.rs # Connection status publisher
//! └── facade.rs    # ResilientClient entry point
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod executor;
pub mod facade;
pub mod health;
pub mod publisher;
pub mod queue;
pub mod transport;

pub use executor::execute_with_retry;
pub use facade::ResilientClient;
pub use health::HealthMonitor;
pub use publisher::{StatusPublisher, SubscriptionGuard};
pub use queue::OfflineQueue;
pub use transport::{HttpTransport, ReqwestTransport};

// Re-export the foundation types callers interact with directly.
pub use pulselink_core::{
    ApiResponse, ConnectionStatus, LinkConfig, LinkError, LinkResult, Method, RequestDescriptor,
    RetryPolicy,
};
