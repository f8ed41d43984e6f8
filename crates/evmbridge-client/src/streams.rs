//! Event-stream and subscription resource management.
//!
//! The gateway owns the durable state; this module's job is to make
//! "ensure" operations idempotent against it: match by exact name,
//! create when absent, update in place when the delivery configuration
//! drifted, and migrate resources created under deprecated naming
//! schemes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use evmbridge_abi::batchpin;
use evmbridge_abi::interface::ParsedEvent;
use evmbridge_core::error::ConnectorError;
use evmbridge_core::location::ContractLocation;
use evmbridge_core::schema::ContractListener;
use evmbridge_core::types::{ListenerCheckpoint, ListenerStatus};

use crate::client::GatewayClient;

/// A server-side event stream (namespace-scoped delivery channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStream {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "batchSize", default)]
    pub batch_size: u32,
    #[serde(rename = "batchTimeoutMS", default)]
    pub batch_timeout_ms: u32,
}

/// A server-side subscription (listener) resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream: String,
    #[serde(rename = "fromBlock", default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<String>,
    #[serde(default)]
    pub catchup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<ListenerCheckpoint>,
}

/// Result of a listener status query.
#[derive(Debug, Clone)]
pub struct ListenerStatusResult {
    pub found: bool,
    pub catchup: bool,
    pub checkpoint: Option<ListenerCheckpoint>,
    pub status: ListenerStatus,
}

/// Manager for the remote stream/subscription resources.
pub struct StreamManager {
    client: Arc<GatewayClient>,
    batch_size: u32,
    batch_timeout_ms: u32,
}

impl StreamManager {
    pub fn new(client: Arc<GatewayClient>, batch_size: u32, batch_timeout_ms: u32) -> Self {
        Self {
            client,
            batch_size,
            batch_timeout_ms,
        }
    }

    fn stream_body(&self, name: &str) -> Value {
        json!({
            "name": name,
            "errorHandling": "block",
            "batchSize": self.batch_size,
            "batchTimeoutMS": self.batch_timeout_ms,
            "type": "websocket",
            "websocket": { "topic": name },
        })
    }

    /// Ensure the stream `name` exists with the desired delivery
    /// configuration. A stream still carrying the deprecated
    /// `legacy_name` is deleted and recreated under the new name.
    pub async fn ensure_event_stream(
        &self,
        name: &str,
        legacy_name: &str,
    ) -> Result<EventStream, ConnectorError> {
        let existing: Vec<EventStream> = self.client.get_json("/eventstreams").await?;

        if let Some(stream) = existing.iter().find(|s| s.name == name) {
            if stream.batch_size != self.batch_size || stream.batch_timeout_ms != self.batch_timeout_ms
            {
                debug!(stream = %stream.id, "stream configuration drifted, updating");
                return self
                    .client
                    .patch_json(&format!("/eventstreams/{}", stream.id), &self.stream_body(name))
                    .await;
            }
            return Ok(stream.clone());
        }

        if let Some(old) = existing.iter().find(|s| s.name == legacy_name) {
            info!(stream = %old.id, name = legacy_name, "migrating deprecated event stream");
            self.delete_event_stream(&old.id, false).await?;
        }

        info!(name, "creating event stream");
        self.client.post_json("/eventstreams", &self.stream_body(name)).await
    }

    /// Delete a stream. With `optional`, a 404 means it is already
    /// gone and is not an error.
    pub async fn delete_event_stream(
        &self,
        stream_id: &str,
        optional: bool,
    ) -> Result<(), ConnectorError> {
        self.client
            .delete(&format!("/eventstreams/{stream_id}"), optional)
            .await
    }

    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ConnectorError> {
        self.client.get_json("/subscriptions").await
    }

    /// Fetch one subscription; `None` when the gateway does not know
    /// the ID.
    pub async fn subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, ConnectorError> {
        self.client
            .get_json_opt(&format!("/subscriptions/{subscription_id}"))
            .await
    }

    /// Delete a subscription; 404 is treated as already removed.
    pub async fn delete_subscription(
        &self,
        subscription_id: &str,
        optional: bool,
    ) -> Result<(), ConnectorError> {
        self.client
            .delete(&format!("/subscriptions/{subscription_id}"), optional)
            .await
    }

    /// Ensure the reserved batch-pin subscription for a namespace.
    ///
    /// The current naming scheme is `<ns>_BatchPin_<tag>`; version-1
    /// deployments are adopted under their legacy names
    /// (`BatchPin_<tag>`, bare `BatchPin`). A legacy-form name found
    /// under a version ≥ 2 deployment is an invalid-name error, forcing
    /// an explicit migration rather than silently mixing schemes.
    pub async fn ensure_multiparty_subscription(
        &self,
        stream_id: &str,
        namespace: &str,
        location: &ContractLocation,
        network_version: i64,
        last_protocol_id: Option<&str>,
        first_event: Option<&str>,
    ) -> Result<Subscription, ConnectorError> {
        let tag = location.short_tag();
        let current_name = format!("{namespace}_BatchPin_{tag}");
        let legacy_names = [format!("BatchPin_{tag}"), "BatchPin".to_string()];

        let existing = self.subscriptions().await?;
        for sub in &existing {
            if network_version >= 2 {
                if sub.name == current_name {
                    return Ok(sub.clone());
                }
                if legacy_names.contains(&sub.name) {
                    return Err(ConnectorError::SubscriptionName {
                        name: sub.name.clone(),
                    });
                }
            } else if sub.name == current_name || legacy_names.contains(&sub.name) {
                return Ok(sub.clone());
            }
        }

        let name = if network_version >= 2 {
            current_name
        } else {
            legacy_names[0].clone()
        };
        let from_block = from_block_for(last_protocol_id, first_event);
        info!(name, %from_block, "creating batch-pin subscription");
        self.client
            .post_json(
                "/subscriptions",
                &json!({
                    "name": name,
                    "stream": stream_id,
                    "fromBlock": from_block,
                    "event": batchpin::batch_pin_event_abi(),
                    "address": location.address,
                }),
            )
            .await
    }

    /// Create the subscription backing a contract listener.
    ///
    /// Validation is all-or-nothing: every filter's schema must
    /// translate, every supplied location must parse, and when more
    /// than one filter is present each must carry a location.
    pub async fn create_listener_subscription(
        &self,
        stream_id: &str,
        prefix: &str,
        listener: &ContractListener,
    ) -> Result<Subscription, ConnectorError> {
        if listener.filters.is_empty() {
            return Err(ConnectorError::NoListenerFilters);
        }

        let mut filters: Vec<Value> = Vec::with_capacity(listener.filters.len());
        for filter in &listener.filters {
            let event = ParsedEvent::parse(&filter.event)?;
            let location = match &filter.location {
                Some(raw) => Some(ContractLocation::parse(raw)?),
                None if listener.filters.len() > 1 => {
                    return Err(ConnectorError::FilterMissingLocation)
                }
                None => None,
            };
            let signature = evmbridge_abi::signature_with_location(
                &event.signature,
                location.as_ref(),
            );
            debug!(signature, "adding listener filter");
            let mut entry = json!({ "event": event.abi_json(), "signature": signature });
            if let Some(loc) = location {
                entry["address"] = json!(loc.address);
            }
            filters.push(entry);
        }

        let name = listener_subscription_name(prefix, &listener.namespace, &listener.id);
        let from_block = from_block_for(None, listener.first_event.as_deref());

        let mut body = json!({
            "name": name,
            "stream": stream_id,
            "fromBlock": from_block,
        });
        if filters.len() == 1 {
            let mut only = filters.remove(0);
            body["event"] = only["event"].take();
            if let Some(address) = only.get("address") {
                body["address"] = address.clone();
            }
        } else {
            body["filters"] = Value::Array(filters);
        }

        self.client.post_json("/subscriptions", &body).await
    }

    /// Query the checkpoint/catch-up status of a listener.
    ///
    /// 404 reports not-found without error; other failures surface as
    /// status-unknown plus the error.
    pub async fn listener_status(
        &self,
        subscription_id: &str,
    ) -> Result<ListenerStatusResult, ConnectorError> {
        match self.subscription(subscription_id).await? {
            None => Ok(ListenerStatusResult {
                found: false,
                catchup: false,
                checkpoint: None,
                status: ListenerStatus::Unknown,
            }),
            Some(sub) => Ok(ListenerStatusResult {
                found: true,
                catchup: sub.catchup,
                checkpoint: sub.checkpoint.clone(),
                status: ListenerStatus::from_catchup(sub.catchup),
            }),
        }
    }
}

/// The subscription name backing a contract listener.
pub fn listener_subscription_name(prefix: &str, namespace: &str, listener_id: &Uuid) -> String {
    format!("{prefix}-sub-{namespace}-{listener_id}")
}

/// Map a dispatch checkpoint or first-event option onto the gateway's
/// `fromBlock`. A checkpoint wins, rewound by one block so the
/// boundary block is redelivered rather than skipped.
fn from_block_for(last_protocol_id: Option<&str>, first_event: Option<&str>) -> String {
    if let Some(protocol_id) = last_protocol_id.filter(|p| !p.is_empty()) {
        if let Some(block) = protocol_id
            .split('/')
            .next()
            .and_then(|b| b.parse::<u64>().ok())
        {
            return block.saturating_sub(1).to_string();
        }
    }
    match first_event {
        None | Some("oldest") => "0".to_string(),
        Some("newest") => "latest".to_string(),
        Some(block) => block.to_string(),
    }
}
