//! # evmbridge-core
//!
//! Core types, error taxonomy, and plugin traits shared across all
//! EVMBridge crates. The gateway client, ABI codec, and streaming
//! engine are all built on top of the definitions here.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod location;
pub mod schema;
pub mod types;

pub use callbacks::{CallbackRegistry, NamespaceEvents, OperationUpdates};
pub use config::ConnectorConfig;
pub use error::{ConnectorError, SubmissionError};
pub use location::ContractLocation;
pub use types::{
    BatchPin, BatchPinEvent, Bytes32, InboundEvent, ListenerCheckpoint, ListenerStatus,
    NamespaceEvent, OperationStatus, OperationUpdate, VerifierRef,
};
