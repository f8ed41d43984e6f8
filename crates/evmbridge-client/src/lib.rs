//! # evmbridge-client
//!
//! The HTTP half of the gateway protocol: event-stream and subscription
//! resource management, command submission (invoke / query / deploy /
//! network action / batch pin), wire-error classification with the
//! submission-rejected taxonomy, and network version negotiation.
//!
//! Nothing here retries internally; errors carry enough context
//! (`SubmissionError::rejected`, transport vs wire classification) for
//! the caller to own the retry policy.

pub mod client;
pub mod commands;
pub mod streams;
pub mod version;
pub mod wire;

pub use client::GatewayClient;
pub use commands::TransactionOps;
pub use streams::{EventStream, StreamManager, Subscription};
pub use version::NetworkVersionCache;
