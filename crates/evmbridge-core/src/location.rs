//! Chain-location descriptors.
//!
//! The only location shape this connector understands is a single
//! contract address: `{"address": "<hex>"}`. Everything else is a hard
//! validation error. Locations come from persisted configuration and
//! from other parties, so they are never trusted as-is.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectorError;

/// A parsed, canonicalized contract location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractLocation {
    pub address: String,
}

impl ContractLocation {
    /// Parse a location from its wire/persisted JSON form.
    ///
    /// The address is canonicalized to lowercase with a `0x` prefix and
    /// must be exactly 20 bytes of hex.
    pub fn parse(value: &Value) -> Result<Self, ConnectorError> {
        let obj = value.as_object().ok_or_else(|| ConnectorError::InvalidLocation {
            reason: "location must be a JSON object".into(),
        })?;
        let address = obj
            .get("address")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConnectorError::InvalidLocation {
                reason: "'address' not set".into(),
            })?;
        Ok(Self {
            address: canonical_address(address)?,
        })
    }

    /// Parse from raw JSON bytes.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ConnectorError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ConnectorError::InvalidLocation {
                reason: format!("invalid location JSON: {e}"),
            })?;
        Self::parse(&value)
    }

    /// The canonical JSON form of this location.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "address": self.address })
    }

    /// A short stable tag for this location, used in resource names.
    ///
    /// Hex encoding of the first 8 characters of the canonical address
    /// string, so distinct contracts on a shared stream get distinct
    /// subscription names without embedding the full address.
    pub fn short_tag(&self) -> String {
        let prefix: String = self.address.chars().take(8).collect();
        hex::encode(prefix.as_bytes())
    }
}

/// Canonicalize an EVM address: lowercase hex with a `0x` prefix.
///
/// Accepts input with or without the prefix. Anything that is not
/// exactly 20 bytes of hex is a hard validation error.
pub fn canonical_address(address: &str) -> Result<String, ConnectorError> {
    let stripped = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if stripped.len() != 40 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConnectorError::InvalidAddress {
            address: address.to_string(),
        });
    }
    Ok(format!("0x{}", stripped.to_lowercase()))
}
