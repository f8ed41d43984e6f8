//! # evmbridge-stream
//!
//! The WebSocket half of the gateway protocol: one strictly sequential
//! event loop per namespace, inbound frame classification, the
//! ack/nack reply protocol, per-namespace batch dispatch, and the
//! top-level `Connector` that owns namespace lifecycle.

pub mod connector;
pub mod dispatch;
pub mod event_loop;
pub mod frame;
pub mod receipts;
pub mod registry;
pub mod subname;

pub use connector::{Connector, ResolveKeyIntent};
pub use dispatch::BatchDispatcher;
pub use event_loop::{EventLoop, WsChannel, WsConnection};
pub use frame::InboundFrame;
pub use registry::{SubscriptionFetcher, SubscriptionInfo, SubscriptionRegistry};
