//! Per-namespace callback registration and dispatch.
//!
//! The connector serves multiple independent namespaces over shared
//! infrastructure. Each namespace registers one event handler and one
//! operation-update handler; events for namespaces with no handler are
//! dropped without error (another tenant's traffic on a shared chain).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::ConnectorError;
use crate::types::{NamespaceEvent, OperationUpdate};

/// Receiver for ordered batches of blockchain events, one per
/// namespace.
pub trait NamespaceEvents: Send + Sync {
    /// Handle one ordered batch. An error aborts the surrounding
    /// frame's dispatch and causes a negative acknowledgement, so the
    /// gateway redelivers.
    fn event_batch(&self, events: Vec<NamespaceEvent>) -> Result<(), ConnectorError>;
}

/// Receiver for asynchronous operation status updates.
pub trait OperationUpdates: Send + Sync {
    fn operation_update(&self, update: OperationUpdate);
}

/// Registry of per-namespace handlers.
#[derive(Default)]
pub struct CallbackRegistry {
    events: RwLock<HashMap<String, Arc<dyn NamespaceEvents>>>,
    operations: RwLock<HashMap<String, Arc<dyn OperationUpdates>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler(&self, namespace: &str, handler: Arc<dyn NamespaceEvents>) {
        self.events
            .write()
            .unwrap()
            .insert(namespace.to_string(), handler);
    }

    pub fn set_operation_handler(&self, namespace: &str, handler: Arc<dyn OperationUpdates>) {
        self.operations
            .write()
            .unwrap()
            .insert(namespace.to_string(), handler);
    }

    pub fn remove_namespace(&self, namespace: &str) {
        self.events.write().unwrap().remove(namespace);
        self.operations.write().unwrap().remove(namespace);
    }

    pub fn registered_namespaces(&self) -> Vec<String> {
        self.events.read().unwrap().keys().cloned().collect()
    }

    /// Deliver a batch to one namespace, or to every registered
    /// namespace when none is given (legacy namespace-less listeners).
    /// A missing handler is not an error; the events are dropped.
    pub fn dispatch_event_batch(
        &self,
        namespace: Option<&str>,
        events: Vec<NamespaceEvent>,
    ) -> Result<(), ConnectorError> {
        match namespace {
            Some(ns) => {
                let handler = self.events.read().unwrap().get(ns).cloned();
                match handler {
                    Some(h) => h.event_batch(events),
                    None => {
                        debug!(namespace = ns, "no handler registered, dropping events");
                        Ok(())
                    }
                }
            }
            None => {
                let handlers: Vec<_> =
                    self.events.read().unwrap().values().cloned().collect();
                for handler in handlers {
                    handler.event_batch(events.clone())?;
                }
                Ok(())
            }
        }
    }

    /// Route an operation update by its `namespace:opID` key. Failures
    /// to route are logged and swallowed; receipts never fail a
    /// connection.
    pub fn dispatch_operation_update(&self, update: OperationUpdate) {
        let Some((namespace, _)) = update.namespaced_op_id.split_once(':') else {
            warn!(id = %update.namespaced_op_id, "receipt with unroutable request ID");
            return;
        };
        let handler = self.operations.read().unwrap().get(namespace).cloned();
        match handler {
            Some(h) => h.operation_update(update),
            None => debug!(namespace, "no operation handler registered"),
        }
    }
}
