//! # evmbridge-observability
//!
//! Structured-logging initialisation for EVMBridge hosts.
//!
//! JSON-structured logs compatible with ELK, Loki, CloudWatch; levels
//! configurable per component. Metrics emission is not part of this
//! crate: the host owns its metrics pipeline.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
