//! The connector: namespace lifecycle plus the plugin surface exposed
//! to upstream namespace logic.
//!
//! Each started namespace owns one remote event stream, one websocket
//! connection, and one dedicated sequential event-loop task.
//! Cross-namespace loops are fully independent; shutdown is a
//! cancellation signal plus a per-namespace completion handshake.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

use evmbridge_abi::interface::{AbiCache, ParsedInterface};
use evmbridge_abi::{error_signature, signature_with_location};
use evmbridge_client::client::GatewayClient;
use evmbridge_client::commands::TransactionOps;
use evmbridge_client::streams::{ListenerStatusResult, StreamManager};
use evmbridge_client::version::NetworkVersionCache;
use evmbridge_core::callbacks::{CallbackRegistry, NamespaceEvents, OperationUpdates};
use evmbridge_core::config::ConnectorConfig;
use evmbridge_core::error::{ConnectorError, SubmissionError};
use evmbridge_core::location::{canonical_address, ContractLocation};
use evmbridge_core::schema::{ContractListener, ErrorDef, EventDef, MethodDef};
use evmbridge_core::types::BatchPin;

use crate::dispatch::BatchDispatcher;
use crate::event_loop::{EventLoop, WsConnection};
use crate::registry::{SubscriptionInfo, SubscriptionRegistry};
use crate::subname;

/// Why a signing key is being resolved; queries tolerate an absent
/// key, signing does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKeyIntent {
    Sign,
    Query,
}

struct NamespaceHandle {
    cancel: CancellationToken,
    closed: oneshot::Receiver<()>,
}

/// One connector instance bridging many namespaces to one gateway.
pub struct Connector {
    config: ConnectorConfig,
    client: Arc<GatewayClient>,
    streams: Arc<StreamManager>,
    ops: TransactionOps,
    callbacks: Arc<CallbackRegistry>,
    registry: Arc<SubscriptionRegistry>,
    abi_cache: AbiCache,
    cancel: CancellationToken,
    stream_ids: RwLock<HashMap<String, String>>,
    namespaces: Mutex<HashMap<String, NamespaceHandle>>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Connector {
    pub fn new(config: ConnectorConfig) -> Result<Self, ConnectorError> {
        config.validate()?;
        let client = Arc::new(GatewayClient::new(&config.http_url)?);
        let streams = Arc::new(StreamManager::new(
            client.clone(),
            config.batch_size,
            config.batch_timeout_ms,
        ));
        let versions = Arc::new(NetworkVersionCache::new(client.clone()));
        let ops = TransactionOps::new(client.clone(), versions);
        let registry = Arc::new(SubscriptionRegistry::new(config.name_prefix.clone()));
        Ok(Self {
            config,
            client,
            streams,
            ops,
            callbacks: Arc::new(CallbackRegistry::new()),
            registry,
            abi_cache: AbiCache::new(),
            cancel: CancellationToken::new(),
            stream_ids: RwLock::new(HashMap::new()),
            namespaces: Mutex::new(HashMap::new()),
        })
    }

    // ─── Handler registration ───────────────────────────────────────────

    pub fn set_handler(&self, namespace: &str, handler: Arc<dyn NamespaceEvents>) {
        self.callbacks.set_handler(namespace, handler);
    }

    pub fn set_operation_handler(&self, namespace: &str, handler: Arc<dyn OperationUpdates>) {
        self.callbacks.set_operation_handler(namespace, handler);
    }

    // ─── Namespace lifecycle ────────────────────────────────────────────

    /// Establish the namespace's remote stream, open its socket, and
    /// start its event loop.
    pub async fn start_namespace(&self, namespace: &str) -> Result<(), ConnectorError> {
        let stream_name = self.config.stream_name(namespace);
        let stream = self
            .streams
            .ensure_event_stream(&stream_name, &self.config.topic)
            .await?;
        self.stream_ids
            .write()
            .unwrap()
            .insert(namespace.to_string(), stream.id.clone());

        let conn = WsConnection::connect(&self.config.ws_url).await?;
        let dispatcher = Arc::new(BatchDispatcher::new(
            self.registry.clone(),
            self.callbacks.clone(),
            self.streams.clone(),
        ));

        let cancel = self.cancel.child_token();
        let (closed_tx, closed_rx) = oneshot::channel();
        let event_loop = EventLoop::new(
            namespace,
            stream_name,
            conn,
            dispatcher,
            self.callbacks.clone(),
            cancel.clone(),
        );
        tokio::spawn(event_loop.run(closed_tx));

        self.namespaces.lock().unwrap().insert(
            namespace.to_string(),
            NamespaceHandle {
                cancel,
                closed: closed_rx,
            },
        );
        info!(namespace, stream = %stream.id, "namespace started");
        Ok(())
    }

    /// Stop a namespace's loop and wait for it to release the socket.
    pub async fn stop_namespace(&self, namespace: &str) -> Result<(), ConnectorError> {
        let handle = self.namespaces.lock().unwrap().remove(namespace);
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.closed.await;
        }
        self.stream_ids.write().unwrap().remove(namespace);
        self.callbacks.remove_namespace(namespace);
        info!(namespace, "namespace stopped");
        Ok(())
    }

    /// Cooperative shutdown of every namespace loop.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<NamespaceHandle> = {
            let mut namespaces = self.namespaces.lock().unwrap();
            namespaces.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let _ = handle.closed.await;
        }
    }

    fn stream_id(&self, namespace: &str) -> Result<String, ConnectorError> {
        self.stream_ids
            .read()
            .unwrap()
            .get(namespace)
            .cloned()
            .ok_or_else(|| ConnectorError::Config {
                reason: format!("namespace '{namespace}' has not been started"),
            })
    }

    // ─── Multiparty (batch pin) subscriptions ───────────────────────────

    /// Ensure the reserved batch-pin subscription for a namespace and
    /// register it for dispatch. Returns the subscription ID.
    pub async fn add_multiparty_subscription(
        &self,
        namespace: &str,
        location: &Value,
        first_event: Option<&str>,
        last_protocol_id: Option<&str>,
    ) -> Result<String, ConnectorError> {
        let parsed = ContractLocation::parse(location)?;
        let version = self.ops.versions().get(&parsed.to_value()).await?;
        let stream_id = self.stream_id(namespace)?;
        let sub = self
            .streams
            .ensure_multiparty_subscription(
                &stream_id,
                namespace,
                &parsed,
                version,
                last_protocol_id,
                first_event,
            )
            .await?;
        self.registry.add_multiparty(&sub.id, namespace, version);
        Ok(sub.id)
    }

    pub fn remove_multiparty_subscription(&self, subscription_id: &str) {
        self.registry.remove_multiparty(subscription_id);
    }

    // ─── Contract listeners ─────────────────────────────────────────────

    /// Add a contract listener; returns the backing subscription ID.
    pub async fn add_contract_listener(
        &self,
        listener: &ContractListener,
    ) -> Result<String, ConnectorError> {
        let stream_id = self.stream_id(&listener.namespace)?;
        let sub = self
            .streams
            .create_listener_subscription(&stream_id, &self.config.name_prefix, listener)
            .await?;
        self.registry.insert_listener(SubscriptionInfo {
            id: sub.id.clone(),
            name: sub.name.clone(),
            namespace: Some(listener.namespace.clone()),
            listener_id: listener.id.to_string(),
        });
        Ok(sub.id)
    }

    /// Remove a listener's subscription; already-gone is not an error.
    pub async fn remove_contract_listener(
        &self,
        subscription_id: &str,
    ) -> Result<(), ConnectorError> {
        self.streams.delete_subscription(subscription_id, true).await?;
        self.registry.remove_listener(subscription_id);
        Ok(())
    }

    pub async fn contract_listener_status(
        &self,
        subscription_id: &str,
    ) -> Result<ListenerStatusResult, ConnectorError> {
        self.streams.listener_status(subscription_id).await
    }

    // ─── Submission surface ─────────────────────────────────────────────

    pub async fn submit_batch_pin(
        &self,
        ns_op_id: &str,
        namespace: &str,
        signing_key: &str,
        batch: &BatchPin,
        location: &Value,
    ) -> Result<(), SubmissionError> {
        self.ops
            .submit_batch_pin(ns_op_id, namespace, signing_key, batch, location)
            .await
    }

    pub async fn submit_network_action(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        action: &str,
        location: &Value,
    ) -> Result<(), SubmissionError> {
        self.ops
            .submit_network_action(ns_op_id, signing_key, action, location)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn invoke_contract(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        location: &Value,
        interface: &ParsedInterface,
        args: &Map<String, Value>,
        options: &Map<String, Value>,
        batch: Option<&BatchPin>,
    ) -> Result<(), SubmissionError> {
        self.ops
            .invoke_contract(
                ns_op_id,
                signing_key,
                location,
                &interface.method,
                args,
                options,
                batch,
            )
            .await
    }

    pub async fn query_contract(
        &self,
        signing_key: &str,
        location: &Value,
        interface: &ParsedInterface,
        args: &Map<String, Value>,
        options: &Map<String, Value>,
    ) -> Result<Value, ConnectorError> {
        self.ops
            .query_contract(signing_key, location, &interface.method, args, options)
            .await
    }

    pub async fn deploy_contract(
        &self,
        ns_op_id: &str,
        signing_key: &str,
        definition: Value,
        contract: Value,
        input: Vec<Value>,
        options: &Map<String, Value>,
    ) -> Result<(), SubmissionError> {
        self.ops
            .deploy_contract(ns_op_id, signing_key, definition, contract, input, options)
            .await
    }

    pub async fn get_network_version(&self, location: &Value) -> Result<i64, ConnectorError> {
        self.ops.versions().get(location).await
    }

    pub async fn get_transaction_status(
        &self,
        namespace: &str,
        operation_id: &str,
    ) -> Result<Option<Value>, ConnectorError> {
        self.client.transaction_status(namespace, operation_id).await
    }

    // ─── Identity / location / signature helpers ────────────────────────

    /// Validate and canonicalize a signing key. Queries may run
    /// unsigned; signing requires a key.
    pub fn resolve_signing_key(
        &self,
        key: &str,
        intent: ResolveKeyIntent,
    ) -> Result<String, ConnectorError> {
        if key.is_empty() {
            return match intent {
                ResolveKeyIntent::Query => Ok(String::new()),
                ResolveKeyIntent::Sign => Err(ConnectorError::MissingSigningKey),
            };
        }
        canonical_address(key)
    }

    /// Canonicalize a location descriptor to its stored form.
    pub fn normalize_location(&self, location: &Value) -> Result<Value, ConnectorError> {
        Ok(ContractLocation::parse(location)?.to_value())
    }

    /// Do two location descriptors cover the same contract? Two empty
    /// locations trivially overlap; otherwise both must parse.
    pub fn check_overlapping_locations(
        &self,
        a: Option<&Value>,
        b: Option<&Value>,
    ) -> Result<bool, ConnectorError> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => {
                Ok(ContractLocation::parse(a)? == ContractLocation::parse(b)?)
            }
            _ => Ok(false),
        }
    }

    pub fn parse_interface(
        &self,
        method: &MethodDef,
        errors: &[ErrorDef],
    ) -> Result<ParsedInterface, ConnectorError> {
        ParsedInterface::parse(method, errors)
    }

    pub fn generate_event_signature(&self, event: &EventDef) -> Result<String, ConnectorError> {
        Ok(self.abi_cache.parsed_event(event)?.signature.clone())
    }

    pub fn generate_event_signature_with_location(
        &self,
        event: &EventDef,
        location: Option<&Value>,
    ) -> Result<String, ConnectorError> {
        let signature = self.abi_cache.parsed_event(event)?.signature.clone();
        let location = match location {
            Some(raw) => Some(ContractLocation::parse(raw)?),
            None => None,
        };
        Ok(signature_with_location(&signature, location.as_ref()))
    }

    pub fn generate_error_signature(&self, def: &ErrorDef) -> Result<String, ConnectorError> {
        error_signature(def)
    }

    /// Parse a subscription name the way the dispatcher will.
    pub fn parse_listener_name(
        &self,
        name: &str,
    ) -> Result<subname::ParsedSubscriptionName, ConnectorError> {
        subname::parse_subscription_name(&self.config.name_prefix, name)
    }

    /// Resolve the deprecated single-contract instance path from the
    /// configuration, when one is set.
    pub async fn resolve_configured_instance(
        &self,
    ) -> Result<Option<(Value, String)>, ConnectorError> {
        match &self.config.instance_path {
            None => Ok(None),
            Some(path) => {
                let location = self.client.resolve_instance_path(path).await?;
                Ok(Some((location.to_value(), "0".to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmbridge_core::schema::ParamDef;

    fn connector() -> Connector {
        Connector::new(ConnectorConfig {
            topic: "topic1".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn bad_config_fails_construction() {
        let err = Connector::new(ConnectorConfig {
            http_url: "!!!://".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConnectorError::Config { .. }));
    }

    #[test]
    fn signing_key_resolution_by_intent() {
        let c = connector();
        assert_eq!(c.resolve_signing_key("", ResolveKeyIntent::Query).unwrap(), "");
        assert!(matches!(
            c.resolve_signing_key("", ResolveKeyIntent::Sign),
            Err(ConnectorError::MissingSigningKey)
        ));
        assert!(c.resolve_signing_key("0x12345", ResolveKeyIntent::Sign).is_err());
        assert_eq!(
            c.resolve_signing_key(
                "0x2a7c9D5248681CE6c393117E641aD037F5C079F6",
                ResolveKeyIntent::Sign
            )
            .unwrap(),
            "0x2a7c9d5248681ce6c393117e641ad037f5c079f6"
        );
    }

    #[test]
    fn normalize_location_round_trips() {
        let c = connector();
        let normalized = c
            .normalize_location(&serde_json::json!({
                "address": "3081D84FD367044F4ED453F2024709242470388C"
            }))
            .unwrap();
        assert_eq!(
            normalized,
            serde_json::json!({"address": "0x3081d84fd367044f4ed453f2024709242470388c"})
        );
        assert!(c.normalize_location(&serde_json::json!({"bad": "bad"})).is_err());
    }

    #[test]
    fn overlapping_locations() {
        let c = connector();
        assert!(c.check_overlapping_locations(None, None).unwrap());

        let a = serde_json::json!({"address": "3081D84FD367044F4ED453F2024709242470388C"});
        let b = serde_json::json!({"address": "0x3081d84fd367044f4ed453f2024709242470388c"});
        assert!(c.check_overlapping_locations(Some(&a), Some(&b)).unwrap());

        let other = serde_json::json!({"address": "0x2a7c9d5248681ce6c393117e641ad037f5c079f6"});
        assert!(!c.check_overlapping_locations(Some(&a), Some(&other)).unwrap());

        let bad = serde_json::json!("{}");
        assert!(c.check_overlapping_locations(Some(&a), Some(&bad)).is_err());
    }

    #[test]
    fn signature_surface_uses_cache_and_locations() {
        let c = connector();
        let event = EventDef {
            name: "Changed".into(),
            params: vec![
                ParamDef::new("x", serde_json::json!({"type": "integer", "details": {"type": "uint256"}})),
                ParamDef::new("y", serde_json::json!({"type": "integer", "details": {"type": "uint256"}})),
            ],
        };
        assert_eq!(
            c.generate_event_signature(&event).unwrap(),
            "Changed(uint256,uint256)"
        );
        let qualified = c
            .generate_event_signature_with_location(
                &event,
                Some(&serde_json::json!({"address": "3081D84FD367044F4ED453F2024709242470388C"})),
            )
            .unwrap();
        assert_eq!(
            qualified,
            "0x3081d84fd367044f4ed453f2024709242470388c:Changed(uint256,uint256)"
        );
        let wildcard = c
            .generate_event_signature_with_location(&event, None)
            .unwrap();
        assert_eq!(wildcard, "*:Changed(uint256,uint256)");
        assert!(c
            .generate_event_signature_with_location(&event, Some(&serde_json::json!("{}")))
            .is_err());
    }

    #[test]
    fn listener_name_parsing_is_exposed() {
        let c = connector();
        let parsed = c.parse_listener_name("eb-sub-ns1-abc").unwrap();
        assert_eq!(parsed.namespace.as_deref(), Some("ns1"));
        assert!(c.parse_listener_name("BatchPin").is_err());
    }

    #[tokio::test]
    async fn unstarted_namespace_has_no_stream() {
        let c = connector();
        let err = c
            .add_contract_listener(&ContractListener {
                id: uuid::Uuid::new_v4(),
                namespace: "ns1".into(),
                filters: vec![],
                first_event: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not been started"));
    }
}
