//! Batch dispatch: classify, group, deliver.
//!
//! Each event in a frame is classified as a system event (batch pin or
//! network action), or resolved to a namespace through the
//! subscription registry. Resolved events are grouped by destination
//! namespace preserving original order, and each group is delivered as
//! one callback invocation, in the order namespaces first appear in
//! the frame.
//!
//! The abort-vs-drop split is load-bearing: payload decode failures
//! and unroutable subscription names abort the whole frame (negative
//! acknowledgement, the gateway redelivers), while routing misses (a
//! subscription the gateway no longer knows, a namespace with no
//! registered callback) drop the event silently.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use evmbridge_abi::batchpin::{is_batch_pin_signature, NETWORK_ACTION_PREFIX};
use evmbridge_abi::address::author_verifier;
use evmbridge_core::callbacks::CallbackRegistry;
use evmbridge_core::error::ConnectorError;
use evmbridge_core::types::{
    BatchPin, BatchPinEvent, Bytes32, InboundEvent, NamespaceEvent, VerifierRef,
};

use crate::registry::{SubscriptionFetcher, SubscriptionRegistry};

/// Outcome of classifying one reserved-subscription event.
enum SystemEvent {
    /// Empty or partial payload; skipped without error.
    Ignored,
    NetworkAction { action: String, signing_key: VerifierRef },
    BatchPin(Box<BatchPinEvent>),
}

/// Classifies and routes the events of one frame.
pub struct BatchDispatcher {
    registry: Arc<SubscriptionRegistry>,
    callbacks: Arc<CallbackRegistry>,
    fetcher: Arc<dyn SubscriptionFetcher>,
}

impl BatchDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        callbacks: Arc<CallbackRegistry>,
        fetcher: Arc<dyn SubscriptionFetcher>,
    ) -> Self {
        Self {
            registry,
            callbacks,
            fetcher,
        }
    }

    /// Dispatch one frame's events. An `Err` is the whole frame's
    /// outcome: the caller nacks and nothing is partially
    /// acknowledged.
    pub async fn dispatch_events(&self, events: Vec<Value>) -> Result<(), ConnectorError> {
        let mut groups: IndexMap<Option<String>, Vec<NamespaceEvent>> = IndexMap::new();

        for raw in &events {
            let Some(event) = InboundEvent::from_wire(raw) else {
                warn!("discarding non-event entry in batch");
                continue;
            };

            if let Some(multiparty) = self.registry.multiparty(&event.subscription_id) {
                if is_batch_pin_signature(&event.signature, multiparty.network_version) {
                    match classify_system_event(&event)? {
                        SystemEvent::Ignored => {}
                        SystemEvent::NetworkAction { action, signing_key } => {
                            groups
                                .entry(Some(multiparty.namespace.clone()))
                                .or_default()
                                .push(NamespaceEvent::NetworkAction { action, signing_key });
                        }
                        SystemEvent::BatchPin(pin) => {
                            groups
                                .entry(Some(multiparty.namespace.clone()))
                                .or_default()
                                .push(NamespaceEvent::BatchPinComplete(*pin));
                        }
                    }
                    continue;
                }
            } else if is_batch_pin_signature(&event.signature, 2) {
                // The reserved event, but for a subscription this
                // connector has not registered: another party's pin.
                debug!(subscription = %event.subscription_id, "batch pin from unregistered subscription");
                continue;
            }

            let Some(info) = self
                .registry
                .resolve(&event.subscription_id, self.fetcher.as_ref())
                .await?
            else {
                continue;
            };

            let name = event
                .signature
                .split('(')
                .next()
                .unwrap_or(&event.signature)
                .to_string();
            groups
                .entry(info.namespace.clone())
                .or_default()
                .push(NamespaceEvent::ContractEvent {
                    listener_id: info.id.clone(),
                    protocol_id: event.protocol_id(),
                    name,
                    signature: event.signature.clone(),
                    transaction_hash: event.transaction_hash.clone(),
                    output: event.data.clone(),
                    info: event.info.clone(),
                });
        }

        for (namespace, batch) in groups {
            self.callbacks
                .dispatch_event_batch(namespace.as_deref(), batch)?;
        }
        Ok(())
    }
}

/// Decode a reserved-subscription event payload.
///
/// Empty payloads are skipped; a missing event address or a malformed
/// identity/uuids/hash/context is a hard decode error that aborts the
/// frame.
fn classify_system_event(event: &InboundEvent) -> Result<SystemEvent, ConnectorError> {
    if event.data.is_empty() {
        debug!(subscription = %event.subscription_id, "batch pin event with no data, ignoring");
        return Ok(SystemEvent::Ignored);
    }

    let field = |key: &str| event.data.get(key).and_then(Value::as_str);

    let Some(namespace) = field("namespace") else {
        debug!("batch pin event missing namespace, ignoring");
        return Ok(SystemEvent::Ignored);
    };

    if event.address.is_none() {
        return Err(ConnectorError::Decode {
            reason: "batch pin event missing contract address".into(),
        });
    }

    let author = field("author").ok_or_else(|| ConnectorError::Decode {
        reason: "batch pin event missing author".into(),
    })?;
    let signing_key = VerifierRef {
        address: author_verifier(author).map_err(|e| ConnectorError::Decode {
            reason: format!("batch pin author: {e}"),
        })?,
    };

    if let Some(action) = namespace.strip_prefix(NETWORK_ACTION_PREFIX) {
        return Ok(SystemEvent::NetworkAction {
            action: action.to_string(),
            signing_key,
        });
    }

    let decode_b32 = |key: &str| -> Result<Bytes32, ConnectorError> {
        let raw = field(key).ok_or_else(|| ConnectorError::Decode {
            reason: format!("batch pin event missing {key}"),
        })?;
        Bytes32::from_hex(raw)
    };

    let uuids = decode_b32("uuids")?;
    let batch_hash = decode_b32("batchHash")?;
    let (transaction_id, batch_id) = evmbridge_abi::split_uuids(&uuids);

    let contexts = match event.data.get("contexts") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|c| {
                c.as_str()
                    .ok_or_else(|| ConnectorError::Decode {
                        reason: "batch pin context is not a string".into(),
                    })
                    .and_then(Bytes32::from_hex)
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => vec![],
    };

    Ok(SystemEvent::BatchPin(Box::new(BatchPinEvent {
        batch: BatchPin {
            transaction_id,
            batch_id,
            batch_hash,
            payload_ref: field("payloadRef").unwrap_or_default().to_string(),
            contexts,
        },
        signing_key,
        protocol_id: event.protocol_id(),
        transaction_hash: event.transaction_hash.clone(),
        info: event.info.clone(),
    })))
}
