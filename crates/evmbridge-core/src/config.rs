//! Connector configuration.
//!
//! One explicit struct passed into the connector constructor; there is
//! no process-wide configuration state. Validation is eager: a bad URL
//! or missing topic fails construction, not the first request.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConnectorError;

fn default_batch_size() -> u32 {
    50
}
fn default_batch_timeout_ms() -> u32 {
    500
}
fn default_prefix() -> String {
    "eb".into()
}

/// Configuration for one connector instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Base URL of the gateway HTTP API.
    pub http_url: String,
    /// URL of the gateway WebSocket endpoint.
    pub ws_url: String,
    /// Topic shared by all of this connector's event streams; each
    /// namespace gets the stream `topic/namespace`.
    pub topic: String,
    /// Event-stream delivery batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Event-stream delivery batch timeout in milliseconds.
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u32,
    /// Prefix for listener subscription names (`<prefix>-sub-...`).
    #[serde(default = "default_prefix")]
    pub name_prefix: String,
    /// Deprecated single-contract instance path (`/instances/0x...` or
    /// `/contracts/<name>`), resolved at startup when set.
    #[serde(default)]
    pub instance_path: Option<String>,
}

impl ConnectorConfig {
    /// Validate endpoint URLs and required fields.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        Url::parse(&self.http_url).map_err(|e| ConnectorError::Config {
            reason: format!("invalid http url '{}': {e}", self.http_url),
        })?;
        Url::parse(&self.ws_url).map_err(|e| ConnectorError::Config {
            reason: format!("invalid ws url '{}': {e}", self.ws_url),
        })?;
        if self.topic.is_empty() {
            return Err(ConnectorError::Config {
                reason: "topic must be set".into(),
            });
        }
        if self.name_prefix.is_empty() || self.name_prefix.contains('-') {
            return Err(ConnectorError::Config {
                reason: "name_prefix must be non-empty and contain no '-'".into(),
            });
        }
        Ok(())
    }

    /// The event-stream name for a namespace.
    pub fn stream_name(&self, namespace: &str) -> String {
        format!("{}/{}", self.topic, namespace)
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            http_url: "http://127.0.0.1:5102".into(),
            ws_url: "ws://127.0.0.1:5102/ws".into(),
            topic: "evmbridge".into(),
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            name_prefix: default_prefix(),
            instance_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConnectorConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_url_is_a_config_error() {
        let cfg = ConnectorConfig {
            http_url: "!!!://".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConnectorError::Config { .. })
        ));
    }

    #[test]
    fn empty_topic_is_rejected() {
        let cfg = ConnectorConfig {
            topic: String::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stream_name_is_topic_scoped() {
        let cfg = ConnectorConfig {
            topic: "topic1".into(),
            ..Default::default()
        };
        assert_eq!(cfg.stream_name("ns1"), "topic1/ns1");
    }
}
