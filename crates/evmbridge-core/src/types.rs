//! Shared wire and domain types for the connector.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ConnectorError;

/// A 32-byte value (batch hash, pin context), hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ConnectorError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| ConnectorError::Decode {
            reason: format!("invalid 32-byte hex '{s}': {e}"),
        })?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| ConnectorError::Decode {
            reason: format!("expected 32 bytes in '{s}'"),
        })?;
        Ok(Self(arr))
    }

    /// Hex with a `0x` prefix, the form used in command parameters.
    pub fn to_hex_prefixed(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Displays as bare hex (no prefix), the form used in logs and IDs.
impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_prefixed())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An off-chain batch identity to be anchored on-chain.
///
/// Produced by upstream namespace logic, consumed once per submission;
/// never persisted by the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPin {
    pub transaction_id: Uuid,
    pub batch_id: Uuid,
    pub batch_hash: Bytes32,
    /// Content-address payload reference; may be empty.
    pub payload_ref: String,
    pub contexts: Vec<Bytes32>,
}

/// A signing identity observed on or submitted to the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierRef {
    /// Canonicalized EVM address of the signer.
    pub address: String,
}

/// One blockchain log entry as delivered by the gateway.
///
/// Numeric fields arrive as strings on the wire; they are parsed once
/// here and the raw strings retained for the event info block.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub address: Option<String>,
    pub block_number: u64,
    pub transaction_index: String,
    pub transaction_hash: String,
    pub log_index: u64,
    pub timestamp: Option<String>,
    pub signature: String,
    pub subscription_id: String,
    pub data: Map<String, Value>,
    /// The original wire fields, minus `data`, for the info block.
    pub info: Map<String, Value>,
}

impl InboundEvent {
    /// Parse one entry of an event frame. Returns `None` for entries
    /// that are not event objects (logged and skipped by the caller).
    pub fn from_wire(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let signature = obj.get("signature")?.as_str()?.to_string();
        let subscription_id = obj.get("subId")?.as_str()?.to_string();

        let str_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let num_field = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<u64>().ok())
        };

        let mut info = obj.clone();
        info.remove("data");

        Some(Self {
            address: str_field("address"),
            block_number: num_field("blockNumber").unwrap_or(0),
            transaction_index: str_field("transactionIndex").unwrap_or_default(),
            transaction_hash: str_field("transactionHash").unwrap_or_default(),
            log_index: num_field("logIndex").unwrap_or(0),
            timestamp: str_field("timestamp"),
            signature,
            subscription_id,
            data: obj
                .get("data")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            info,
        })
    }

    /// The sortable protocol ID for this event:
    /// zero-padded block / transaction index / log index.
    pub fn protocol_id(&self) -> String {
        let tx_index = parse_index(&self.transaction_index);
        format!(
            "{:012}/{:06}/{:06}",
            self.block_number, tx_index, self.log_index
        )
    }
}

/// Transaction indexes arrive either decimal or `0x`-hex.
fn parse_index(s: &str) -> u64 {
    if let Some(hex_part) = s.strip_prefix("0x") {
        u64::from_str_radix(hex_part, 16).unwrap_or(0)
    } else {
        s.parse().unwrap_or(0)
    }
}

/// A decoded batch-pin event delivered to a namespace.
#[derive(Debug, Clone)]
pub struct BatchPinEvent {
    pub batch: BatchPin,
    pub signing_key: VerifierRef,
    pub protocol_id: String,
    pub transaction_hash: String,
    pub info: Map<String, Value>,
}

/// One event as dispatched to a namespace callback.
#[derive(Debug, Clone)]
pub enum NamespaceEvent {
    BatchPinComplete(BatchPinEvent),
    NetworkAction {
        action: String,
        signing_key: VerifierRef,
    },
    ContractEvent {
        listener_id: String,
        protocol_id: String,
        name: String,
        signature: String,
        transaction_hash: String,
        output: Map<String, Value>,
        info: Map<String, Value>,
    },
}

/// The read checkpoint of a listener, as reported by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenerCheckpoint {
    #[serde(default)]
    pub block: i64,
    #[serde(rename = "transactionIndex", default)]
    pub transaction_index: i64,
    #[serde(rename = "logIndex", default)]
    pub log_index: i64,
}

/// Derived listener lifecycle status.
///
/// Derived solely from the gateway's catch-up flag; the checkpoint
/// fields are informational detail only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Syncing,
    Synced,
    Unknown,
}

impl ListenerStatus {
    pub fn from_catchup(catchup: bool) -> Self {
        if catchup {
            Self::Syncing
        } else {
            Self::Synced
        }
    }
}

/// Status carried on an asynchronous operation update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Succeeded,
    Failed,
}

/// An asynchronous status update for a previously submitted operation,
/// correlated through the `namespace:operationUUID` receipt key.
#[derive(Debug, Clone)]
pub struct OperationUpdate {
    pub namespaced_op_id: String,
    pub status: OperationStatus,
    pub blockchain_tx_id: String,
    pub error_message: String,
    pub output: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes32_hex_round_trip() {
        let b = Bytes32::from_hex(
            "0xd71eb138d74c229a388eb0e1abc03f4c7cbb21d4fc4b839fbf0ec73e4263f6be",
        )
        .unwrap();
        assert_eq!(
            b.to_hex_prefixed(),
            "0xd71eb138d74c229a388eb0e1abc03f4c7cbb21d4fc4b839fbf0ec73e4263f6be"
        );
        assert_eq!(
            b.to_string(),
            "d71eb138d74c229a388eb0e1abc03f4c7cbb21d4fc4b839fbf0ec73e4263f6be"
        );
    }

    #[test]
    fn bytes32_rejects_wrong_length() {
        assert!(Bytes32::from_hex("0x1234").is_err());
        assert!(Bytes32::from_hex("!good").is_err());
    }

    #[test]
    fn protocol_id_is_zero_padded() {
        let ev = InboundEvent::from_wire(&serde_json::json!({
            "address": "0x1C197604587F046FD40684A8f21f4609FB811A7b",
            "blockNumber": "38011",
            "transactionIndex": "0x0",
            "transactionHash": "0xc26df2bf1a733e9249372d61eb11bd8662d26c8129df76890b1beb2f6fa72628",
            "logIndex": "50",
            "subId": "sub2",
            "signature": "Changed(address,uint256)",
            "data": {"from": "0x91D2B4381A4CD5C7C0F27565A7D4B829844C8635", "value": "1"}
        }))
        .unwrap();
        assert_eq!(ev.protocol_id(), "000000038011/000000/000050");
        assert!(ev.info.get("data").is_none());
        assert_eq!(ev.data.get("value").unwrap(), "1");
    }

    #[test]
    fn non_event_entries_are_rejected() {
        assert!(InboundEvent::from_wire(&serde_json::json!(10)).is_none());
        assert!(InboundEvent::from_wire(&serde_json::json!({"bad": "batch"})).is_none());
    }
}
