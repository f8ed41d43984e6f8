//! Batch-pin wire formats.
//!
//! The reserved system event anchors an off-chain batch on-chain. Two
//! wire formats exist for submitting one through a contract method:
//!
//! - network version 1: the pin fields travel as four positional
//!   parameters (uuids, batch hash, payload ref, contexts);
//! - network version ≥ 2: the fields are ABI-encoded together as the
//!   tuple `(bytes32,bytes32,string,bytes32[])` and travel as a single
//!   hex-encoded blob parameter.
//!
//! The transaction and batch UUIDs are packed into one 32-byte value,
//! transaction ID first.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use serde_json::{json, Value};
use uuid::Uuid;

use evmbridge_core::error::ConnectorError;
use evmbridge_core::types::{BatchPin, Bytes32};

use crate::interface::ParsedMethod;

/// Canonical signature of the reserved batch-pin event.
pub const BATCH_PIN_SIGNATURE: &str =
    "BatchPin(address,uint256,string,bytes32,bytes32,string,bytes32[])";

/// Reserved marker prefix carried in the event's namespace field for
/// network control actions.
pub const NETWORK_ACTION_PREFIX: &str = "network:";

/// Does a delivered signature refer to the reserved event?
///
/// Version-1 deployments emit the bare signature only; version ≥ 2
/// deployments may share a stream across contract instances, so the
/// address-qualified form (`<address>:<sig>`) is accepted as well.
pub fn is_batch_pin_signature(signature: &str, network_version: i64) -> bool {
    if signature == BATCH_PIN_SIGNATURE {
        return true;
    }
    network_version >= 2
        && signature
            .rsplit_once(':')
            .is_some_and(|(_, sig)| sig == BATCH_PIN_SIGNATURE)
}

/// ABI JSON of the reserved batch-pin event, for subscription bodies.
pub fn batch_pin_event_abi() -> Value {
    json!({
        "name": "BatchPin",
        "type": "event",
        "anonymous": false,
        "inputs": [
            {"name": "author", "type": "address", "indexed": false},
            {"name": "timestamp", "type": "uint256", "indexed": false},
            {"name": "namespace", "type": "string", "indexed": false},
            {"name": "uuids", "type": "bytes32", "indexed": false},
            {"name": "batchHash", "type": "bytes32", "indexed": false},
            {"name": "payloadRef", "type": "string", "indexed": false},
            {"name": "contexts", "type": "bytes32[]", "indexed": false}
        ]
    })
}

/// ABI JSON of the reserved contract's pin method for the given
/// network version. Version 1 carries the namespace as a leading
/// parameter; version ≥ 2 drops it.
pub fn pin_batch_method_abi(network_version: i64) -> Value {
    let mut inputs = vec![];
    if network_version == 1 {
        inputs.push(json!({"name": "namespace", "type": "string"}));
    }
    inputs.extend([
        json!({"name": "uuids", "type": "bytes32"}),
        json!({"name": "batchHash", "type": "bytes32"}),
        json!({"name": "payloadRef", "type": "string"}),
        json!({"name": "contexts", "type": "bytes32[]"}),
    ]);
    json!({
        "name": "pinBatch",
        "type": "function",
        "stateMutability": "nonpayable",
        "inputs": inputs,
        "outputs": []
    })
}

/// ABI JSON of the version ≥ 2 network-action method.
pub fn network_action_method_abi() -> Value {
    json!({
        "name": "networkAction",
        "type": "function",
        "stateMutability": "nonpayable",
        "inputs": [
            {"name": "action", "type": "string"},
            {"name": "payload", "type": "string"}
        ],
        "outputs": []
    })
}

/// ABI JSON of the version-probe method.
pub fn network_version_method_abi() -> Value {
    json!({
        "name": "networkVersion",
        "type": "function",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [{"name": "", "type": "uint8"}]
    })
}

/// Pack transaction and batch UUIDs into one 32-byte value.
pub fn pack_uuids(transaction_id: &Uuid, batch_id: &Uuid) -> Bytes32 {
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(transaction_id.as_bytes());
    out[16..].copy_from_slice(batch_id.as_bytes());
    Bytes32(out)
}

/// Split a packed uuids value back into (transaction ID, batch ID).
pub fn split_uuids(uuids: &Bytes32) -> (Uuid, Uuid) {
    let mut tx = [0u8; 16];
    let mut batch = [0u8; 16];
    tx.copy_from_slice(&uuids.0[..16]);
    batch.copy_from_slice(&uuids.0[16..]);
    (Uuid::from_bytes(tx), Uuid::from_bytes(batch))
}

/// The four pin fields as positional wire parameters.
fn pin_field_params(batch: &BatchPin) -> Vec<Value> {
    vec![
        json!(pack_uuids(&batch.transaction_id, &batch.batch_id).to_hex_prefixed()),
        json!(batch.batch_hash.to_hex_prefixed()),
        json!(batch.payload_ref),
        json!(batch
            .contexts
            .iter()
            .map(Bytes32::to_hex_prefixed)
            .collect::<Vec<_>>()),
    ]
}

/// Positional parameters for the reserved pin method.
pub fn pin_batch_params(network_version: i64, namespace: &str, batch: &BatchPin) -> Vec<Value> {
    let mut params = Vec::with_capacity(5);
    if network_version == 1 {
        params.push(json!(namespace));
    }
    params.extend(pin_field_params(batch));
    params
}

fn pin_tuple_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::FixedBytes(32),
        DynSolType::FixedBytes(32),
        DynSolType::String,
        DynSolType::Array(Box::new(DynSolType::FixedBytes(32))),
    ])
}

/// ABI-encode the pin fields into the single version-≥2 blob: the
/// tuple `(bytes32,bytes32,string,bytes32[])`, hex, no prefix.
pub fn encode_pin_blob(batch: &BatchPin) -> String {
    let uuids = pack_uuids(&batch.transaction_id, &batch.batch_id);
    let value = DynSolValue::Tuple(vec![
        DynSolValue::FixedBytes(uuids.0.into(), 32),
        DynSolValue::FixedBytes(batch.batch_hash.0.into(), 32),
        DynSolValue::String(batch.payload_ref.clone()),
        DynSolValue::Array(
            batch
                .contexts
                .iter()
                .map(|c| DynSolValue::FixedBytes(c.0.into(), 32))
                .collect(),
        ),
    ]);
    hex::encode(value.abi_encode())
}

/// Decode a version-≥2 blob back into its pin fields (reference
/// decoder, used by round-trip verification).
pub fn decode_pin_blob(blob_hex: &str) -> Result<BatchPin, ConnectorError> {
    let bytes = hex::decode(blob_hex.strip_prefix("0x").unwrap_or(blob_hex)).map_err(|e| {
        ConnectorError::Decode {
            reason: format!("pin blob hex: {e}"),
        }
    })?;
    let decoded = pin_tuple_type()
        .abi_decode(&bytes)
        .map_err(|e| ConnectorError::Decode {
            reason: format!("pin blob ABI decode: {e}"),
        })?;
    let DynSolValue::Tuple(fields) = decoded else {
        return Err(ConnectorError::Decode {
            reason: "pin blob is not a tuple".into(),
        });
    };
    let word = |v: &DynSolValue| -> Result<Bytes32, ConnectorError> {
        match v {
            DynSolValue::FixedBytes(b, 32) => Ok(Bytes32(b.0)),
            _ => Err(ConnectorError::Decode {
                reason: "expected bytes32".into(),
            }),
        }
    };
    let uuids = word(&fields[0])?;
    let batch_hash = word(&fields[1])?;
    let payload_ref = match &fields[2] {
        DynSolValue::String(s) => s.clone(),
        _ => {
            return Err(ConnectorError::Decode {
                reason: "expected string payloadRef".into(),
            })
        }
    };
    let contexts = match &fields[3] {
        DynSolValue::Array(items) => items.iter().map(word).collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ConnectorError::Decode {
                reason: "expected contexts array".into(),
            })
        }
    };
    let (transaction_id, batch_id) = split_uuids(&uuids);
    Ok(BatchPin {
        transaction_id,
        batch_id,
        batch_hash,
        payload_ref,
        contexts,
    })
}

/// Check that a custom method can carry pin data for the given network
/// version, and build the parameters to append.
///
/// Version ≥ 2 requires exactly one `bytes` parameter (the blob);
/// version 1 requires the four positional pin parameters.
pub fn custom_pin_params(
    method: &ParsedMethod,
    network_version: i64,
    batch: &BatchPin,
) -> Result<Vec<Value>, ConnectorError> {
    let unsupported = || ConnectorError::BatchPinNotSupported {
        method: method.name.clone(),
    };
    if network_version >= 2 {
        match method.params.as_slice() {
            [only] if only.sol_type == DynSolType::Bytes => {
                Ok(vec![json!(encode_pin_blob(batch))])
            }
            _ => Err(unsupported()),
        }
    } else {
        if method.params.len() != 4 {
            return Err(unsupported());
        }
        Ok(pin_field_params(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pin() -> BatchPin {
        BatchPin {
            transaction_id: Uuid::parse_str("9ffc50ff-6bfe-4502-adc7-93aea54cc059").unwrap(),
            batch_id: Uuid::parse_str("c5df767c-fe44-4e03-8eb5-1c5523097db5").unwrap(),
            batch_hash: Bytes32::from_hex(
                "0xd71eb138d74c229a388eb0e1abc03f4c7cbb21d4fc4b839fbf0ec73e4263f6be",
            )
            .unwrap(),
            payload_ref: "Qmf412jQZiuVUtdgnB36FXFX7xg5V6KEbSJ4dpQuhkLyfD".into(),
            contexts: vec![
                Bytes32::from_hex(
                    "0x68e4da79f805bca5b912bcda9c63d03e6e867108dabb9b944109aea541ef522a",
                )
                .unwrap(),
            ],
        }
    }

    #[test]
    fn uuids_pack_transaction_first() {
        let pin = test_pin();
        let packed = pack_uuids(&pin.transaction_id, &pin.batch_id);
        assert_eq!(
            packed.to_hex_prefixed(),
            "0x9ffc50ff6bfe4502adc793aea54cc059c5df767cfe444e038eb51c5523097db5"
        );
        let (tx, batch) = split_uuids(&packed);
        assert_eq!(tx, pin.transaction_id);
        assert_eq!(batch, pin.batch_id);
    }

    #[test]
    fn uuids_split_golden() {
        let packed = Bytes32::from_hex(
            "0xe19af8b390604051812d7597d19adfb9847d3bfd074249efb65d3fed15f5b0a6",
        )
        .unwrap();
        let (tx, batch) = split_uuids(&packed);
        assert_eq!(tx.to_string(), "e19af8b3-9060-4051-812d-7597d19adfb9");
        assert_eq!(batch.to_string(), "847d3bfd-0742-49ef-b65d-3fed15f5b0a6");
    }

    #[test]
    fn v1_params_lead_with_namespace() {
        let pin = test_pin();
        let params = pin_batch_params(1, "ns1", &pin);
        assert_eq!(params.len(), 5);
        assert_eq!(params[0], "ns1");
        assert_eq!(
            params[1],
            "0x9ffc50ff6bfe4502adc793aea54cc059c5df767cfe444e038eb51c5523097db5"
        );
        assert_eq!(params[3], "Qmf412jQZiuVUtdgnB36FXFX7xg5V6KEbSJ4dpQuhkLyfD");
    }

    #[test]
    fn v2_params_drop_namespace() {
        let pin = test_pin();
        let params = pin_batch_params(2, "ns1", &pin);
        assert_eq!(params.len(), 4);
        assert_eq!(
            params[0],
            "0x9ffc50ff6bfe4502adc793aea54cc059c5df767cfe444e038eb51c5523097db5"
        );
    }

    #[test]
    fn blob_round_trip() {
        let pin = test_pin();
        let blob = encode_pin_blob(&pin);
        let back = decode_pin_blob(&blob).unwrap();
        assert_eq!(back, pin);
    }

    #[test]
    fn signature_matching_by_version() {
        let qualified = format!(
            "0x1C197604587F046FD40684A8f21f4609FB811A7b:{BATCH_PIN_SIGNATURE}"
        );
        assert!(is_batch_pin_signature(BATCH_PIN_SIGNATURE, 1));
        assert!(is_batch_pin_signature(BATCH_PIN_SIGNATURE, 2));
        assert!(!is_batch_pin_signature(&qualified, 1));
        assert!(is_batch_pin_signature(&qualified, 2));
        assert!(!is_batch_pin_signature("Random(address)", 2));
    }
}
