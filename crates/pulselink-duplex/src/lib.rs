//! # PulseLink Duplex
//!
//! One persistent bidirectional channel with independent exponential-backoff
//! reconnection, decoupled from the request/response pipeline in
//! `pulselink-client`.
//!
//! Streaming channels (live vitals, chat relays) cannot be replayed from an
//! offline queue the way one-shot requests can, so this manager takes the
//! opposite stance: outbound frames sent while the link is down are silently
//! dropped, and the manager's whole job is to get the link back up quickly
//! without hammering the uplink.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pulselink_duplex::{DuplexConfig, DuplexEvent, DuplexManager};
//!
//! # async fn example() {
//! let config = DuplexConfig::new("wss://ops.example.mil/ws/vitals");
//! let (manager, mut events) = DuplexManager::new(config);
//! manager.connect();
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         DuplexEvent::Open => manager.send_text("ready"),
//!         DuplexEvent::Text(msg) => println!("<- {msg}"),
//!         _ => {}
//!     }
//! }
//! # }
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
pub mod dial;
pub mod manager;

pub use config::{DuplexConfig, ReconnectPolicy};
pub use dial::{Dialer, Frame, FrameSink, FrameSource, TungsteniteDialer};
pub use manager::{DuplexEvent, DuplexManager, DuplexState};
