//! # Observability Module
//!
//! Structured logging for the relay node, in pretty or JSON format.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drift_node::observability::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::Json).unwrap();
//! ```

mod logging;

pub use logging::{init_logging, LogFormat};
