//! Thin HTTP client over the gateway's resource and command API.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use evmbridge_core::error::ConnectorError;
use evmbridge_core::location::ContractLocation;

use crate::wire::GatewayFault;

/// Client for the gateway HTTP API.
///
/// Owns the base URL and the single point where non-2xx responses are
/// classified. TLS and timeout construction is the host's concern;
/// pass a pre-built `reqwest::Client` via `with_http` when defaults
/// are not enough.
pub struct GatewayClient {
    http: Client,
    base: Url,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Result<Self, ConnectorError> {
        let base = Url::parse(base_url).map_err(|e| ConnectorError::Config {
            reason: format!("invalid gateway url '{base_url}': {e}"),
        })?;
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    pub fn with_http(base_url: &str, http: Client) -> Result<Self, ConnectorError> {
        let mut client = Self::new(base_url)?;
        client.http = http;
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ConnectorError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConnectorError::Config {
                reason: format!("invalid request path '{path}': {e}"),
            })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ConnectorError> {
        let url = self.url(path)?;
        debug!(%method, %url, "gateway request");
        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Transport {
                    status: None,
                    message: format!("request timed out: {e}"),
                }
            } else {
                ConnectorError::Transport {
                    status: None,
                    message: e.to_string(),
                }
            }
        })
    }

    /// Classify a non-2xx response. The returned fault keeps the wire
    /// code and rejected flag for callers that branch on them.
    async fn fault(resp: reqwest::Response) -> GatewayFault {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        GatewayFault::parse(status, &body)
    }

    /// GET a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConnectorError> {
        let resp = self.send(Method::GET, path, None).await?;
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await.into_error());
        }
        resp.json().await.map_err(|e| ConnectorError::Transport {
            status: None,
            message: format!("invalid response body: {e}"),
        })
    }

    /// GET a JSON resource, mapping 404 to `None`.
    pub async fn get_json_opt<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ConnectorError> {
        let resp = self.send(Method::GET, path, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await.into_error());
        }
        let value = resp.json().await.map_err(|e| ConnectorError::Transport {
            status: None,
            message: format!("invalid response body: {e}"),
        })?;
        Ok(Some(value))
    }

    /// POST a JSON body, parsing the JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ConnectorError> {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::POST, path, Some(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await.into_error());
        }
        resp.json().await.map_err(|e| ConnectorError::Transport {
            status: None,
            message: format!("invalid response body: {e}"),
        })
    }

    /// PATCH a JSON body, parsing the JSON response.
    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ConnectorError> {
        let body = serde_json::to_value(body)?;
        let resp = self.send(Method::PATCH, path, Some(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await.into_error());
        }
        resp.json().await.map_err(|e| ConnectorError::Transport {
            status: None,
            message: format!("invalid response body: {e}"),
        })
    }

    /// DELETE a resource. With `optional`, a 404 is success (the
    /// resource is already gone).
    pub async fn delete(&self, path: &str, optional: bool) -> Result<(), ConnectorError> {
        let resp = self.send(Method::DELETE, path, None).await?;
        if optional && resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await.into_error());
        }
        Ok(())
    }

    /// POST a command body to the gateway root, returning either the
    /// parsed response or the classified fault.
    pub async fn post_command(&self, body: &Value) -> Result<Value, GatewayFault> {
        let resp = self
            .send(Method::POST, "/", Some(body))
            .await
            .map_err(|e| GatewayFault::parse(0, &e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Self::fault(resp).await);
        }
        // Some commands return an empty or non-JSON acknowledgement.
        let text = resp.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    /// Synchronous status poll for a previously submitted operation.
    /// 404 means the gateway no longer knows the transaction: `None`,
    /// not an error.
    pub async fn transaction_status(
        &self,
        namespace: &str,
        operation_id: &str,
    ) -> Result<Option<Value>, ConnectorError> {
        self.get_json_opt(&format!("/transactions/{namespace}:{operation_id}"))
            .await
    }

    /// Resolve a deprecated single-contract instance path into a
    /// location. `/instances/0x...` parses directly;
    /// `/contracts/<name>` is looked up on the gateway.
    pub async fn resolve_instance_path(
        &self,
        path: &str,
    ) -> Result<ContractLocation, ConnectorError> {
        if let Some(address) = path.strip_prefix("/instances/") {
            return Ok(ContractLocation {
                address: evmbridge_core::location::canonical_address(address)?,
            });
        }
        if path.starts_with("/contracts/") {
            let info: Value = self.get_json(path).await?;
            let address = info
                .get("address")
                .and_then(Value::as_str)
                .ok_or_else(|| ConnectorError::InvalidLocation {
                    reason: format!("no address registered at '{path}'"),
                })?;
            return Ok(ContractLocation {
                address: evmbridge_core::location::canonical_address(address)?,
            });
        }
        // A bare address is accepted for compatibility.
        Ok(ContractLocation {
            address: evmbridge_core::location::canonical_address(path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn optional_delete_tolerates_404() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/eventstreams/es12345"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = GatewayClient::new(&server.uri()).unwrap();
        assert!(client.delete("/eventstreams/es12345", true).await.is_ok());
        assert!(client.delete("/eventstreams/es12345", false).await.is_err());
    }

    #[tokio::test]
    async fn transaction_status_maps_404_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transactions/ns1:9ffc50ff-6bfe-4502-adc7-93aea54cc059"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = GatewayClient::new(&server.uri()).unwrap();
        let status = client
            .transaction_status("ns1", "9ffc50ff-6bfe-4502-adc7-93aea54cc059")
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn transaction_status_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/transactions/ns1:op1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "Succeeded"})),
            )
            .mount(&server)
            .await;
        let client = GatewayClient::new(&server.uri()).unwrap();
        let status = client.transaction_status("ns1", "op1").await.unwrap().unwrap();
        assert_eq!(status["status"], "Succeeded");
    }

    #[tokio::test]
    async fn instance_path_resolution() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contracts/registered"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": "0x71C7656EC7ab88b098defB751B7401B5f6d8976F",
                "registeredAs": "registered"
            })))
            .mount(&server)
            .await;
        let client = GatewayClient::new(&server.uri()).unwrap();

        let direct = client
            .resolve_instance_path("/instances/0x71C7656EC7ab88b098defB751B7401B5f6d8976F")
            .await
            .unwrap();
        assert_eq!(direct.address, "0x71c7656ec7ab88b098defb751b7401b5f6d8976f");

        let looked_up = client.resolve_instance_path("/contracts/registered").await.unwrap();
        assert_eq!(looked_up.address, direct.address);

        assert!(client.resolve_instance_path("/instances/bad").await.is_err());
    }
}
