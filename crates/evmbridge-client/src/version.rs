//! Network version negotiation.
//!
//! The deployed contract self-reports a protocol version through a
//! read-only `networkVersion()` call. Contracts that predate the
//! method signal "method not found" at the gateway, which is the
//! capability-probe outcome for version 1, not a failure. The result
//! is cached per canonical address for the connector's lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::debug;

use evmbridge_core::error::ConnectorError;
use evmbridge_core::location::ContractLocation;

use evmbridge_abi::batchpin::network_version_method_abi;

use crate::client::GatewayClient;

pub struct NetworkVersionCache {
    client: Arc<GatewayClient>,
    cache: Mutex<HashMap<String, i64>>,
}

impl NetworkVersionCache {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the network version for a contract location.
    pub async fn get(&self, location: &Value) -> Result<i64, ConnectorError> {
        let location = ContractLocation::parse(location)?;
        if let Some(version) = self.cache.lock().unwrap().get(&location.address) {
            return Ok(*version);
        }

        let body = json!({
            "headers": { "type": "Query" },
            "to": location.address,
            "method": network_version_method_abi(),
            "params": [],
        });

        let version = match self.client.post_command(&body).await {
            Ok(output) => parse_version(&output)?,
            Err(fault) if fault.is_method_not_found() => {
                debug!(address = %location.address, "no version method on contract, assuming 1");
                1
            }
            Err(fault) => return Err(fault.into_error()),
        };

        self.cache
            .lock()
            .unwrap()
            .insert(location.address, version);
        Ok(version)
    }
}

fn parse_version(output: &Value) -> Result<i64, ConnectorError> {
    let field = output.get("output").ok_or_else(|| ConnectorError::Decode {
        reason: format!("cannot unmarshal version response: {output}"),
    })?;
    match field {
        Value::Number(n) => n.as_i64().ok_or_else(|| ConnectorError::BadNetworkVersion {
            value: n.to_string(),
        }),
        Value::String(s) => s.parse().map_err(|_| ConnectorError::BadNetworkVersion {
            value: s.clone(),
        }),
        other => Err(ConnectorError::BadNetworkVersion {
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn location() -> Value {
        json!({"address": "0x1234567890123456789012345678901234567890"})
    }

    async fn cache_for(server: &MockServer) -> NetworkVersionCache {
        NetworkVersionCache::new(Arc::new(GatewayClient::new(&server.uri()).unwrap()))
    }

    #[tokio::test]
    async fn version_is_cached_per_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({"headers": {"type": "Query"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        assert_eq!(cache.get(&location()).await.unwrap(), 1);
        assert_eq!(cache.get(&location()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn method_not_found_negotiates_version_1() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "FFEC100148"})),
            )
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        assert_eq!(cache.get(&location()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "pop"})))
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        let err = cache.get(&location()).await.unwrap_err();
        assert!(err.to_string().contains("pop"));
    }

    #[tokio::test]
    async fn unparseable_version_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": null})))
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        assert!(cache.get(&location()).await.is_err());
    }

    #[tokio::test]
    async fn missing_output_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("")))
            .mount(&server)
            .await;

        let cache = cache_for(&server).await;
        let err = cache.get(&location()).await.unwrap_err();
        assert!(err.to_string().contains("cannot unmarshal"));
    }

    #[tokio::test]
    async fn bad_location_fails_before_any_request() {
        let server = MockServer::start().await;
        let cache = cache_for(&server).await;
        let err = cache.get(&json!({"bad": "pop"})).await.unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidLocation { .. }));
    }
}
