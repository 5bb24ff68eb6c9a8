//! # Drift Node
//!
//! Relay service that helps Drift peers discover each other.
//!
//! ## Routes
//!
//! - `GET /` - liveness text
//! - `GET /signal?dft_id=<id>` - WebSocket upgrade; every frame is relayed
//!   verbatim to the other members of session `<id>`
//! - `GET /signal/stats?dft_id=<id>` - `{"total": <members>}`
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin drift-node -- --listen 127.0.0.1:8080
//! ```
//!
//! ## Modules
//!
//! - [`api`] - Router assembly and shared state
//! - [`signal_api`] - Signaling WebSocket and stats endpoints
//! - [`config`] - Node configuration (YAML file plus flags)
//! - [`observability`] - Structured logging

pub mod api;
pub mod config;
pub mod observability;
pub mod signal_api;
