//! Receipt / transaction-update correlation.
//!
//! The gateway multiplexes asynchronous status updates for submitted
//! operations over the same socket as event batches. The
//! `headers.requestId` carries the `namespace:operationUUID` key the
//! update is routed by. Receipts never produce a websocket reply and
//! never fail the loop.

use serde_json::Value;
use tracing::debug;

use evmbridge_core::types::{OperationStatus, OperationUpdate};

/// Parse a classified receipt frame into an operation update. Returns
/// `None` for receipts that cannot be routed (missing request ID or
/// unknown type); these are logged and swallowed.
pub fn parse_receipt(value: &Value) -> Option<OperationUpdate> {
    let headers = value.get("headers")?;
    let request_id = headers.get("requestId").and_then(Value::as_str)?;
    let update_type = headers.get("type").and_then(Value::as_str)?;

    let status = match update_type {
        "TransactionSuccess" => OperationStatus::Succeeded,
        // An update is informational; the operation remains pending
        // regardless of the interim receipt contents.
        "TransactionUpdate" => OperationStatus::Pending,
        "TransactionFailed" | "Error" => OperationStatus::Failed,
        other => {
            debug!(update_type = other, "unrecognized receipt type");
            return None;
        }
    };

    Some(OperationUpdate {
        namespaced_op_id: request_id.to_string(),
        status,
        blockchain_tx_id: value
            .get("transactionHash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        error_message: value
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        output: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_receipt_parses() {
        let receipt = serde_json::json!({
            "headers": {
                "requestId": "ns1:9ffc50ff-6bfe-4502-adc7-93aea54cc059",
                "type": "TransactionSuccess"
            },
            "status": "1",
            "transactionHash": "0x71a38acb7a5d4a970854f6d638ceb1fa10a4b59cbf4ed7674273a1a8dc8b36b8"
        });
        let update = parse_receipt(&receipt).unwrap();
        assert_eq!(update.status, OperationStatus::Succeeded);
        assert_eq!(
            update.namespaced_op_id,
            "ns1:9ffc50ff-6bfe-4502-adc7-93aea54cc059"
        );
        assert_eq!(
            update.blockchain_tx_id,
            "0x71a38acb7a5d4a970854f6d638ceb1fa10a4b59cbf4ed7674273a1a8dc8b36b8"
        );
    }

    #[test]
    fn update_receipt_stays_pending() {
        let receipt = serde_json::json!({
            "headers": {"requestId": "ns1:op1", "type": "TransactionUpdate"},
            "status": "Succeeded",
            "transactionHash": "0x929c"
        });
        let update = parse_receipt(&receipt).unwrap();
        assert_eq!(update.status, OperationStatus::Pending);
    }

    #[test]
    fn error_receipt_carries_message() {
        let receipt = serde_json::json!({
            "headers": {"requestId": "ns1:op1", "type": "Error"},
            "errorMessage": "Packing arguments for method 'broadcastBatch': bad argument"
        });
        let update = parse_receipt(&receipt).unwrap();
        assert_eq!(update.status, OperationStatus::Failed);
        assert!(update.error_message.contains("broadcastBatch"));
    }

    #[test]
    fn unroutable_receipts_are_dropped() {
        assert!(parse_receipt(&serde_json::json!({})).is_none());
        assert!(parse_receipt(&serde_json::json!({
            "headers": {"type": "TransactionSuccess"}
        }))
        .is_none());
        assert!(parse_receipt(&serde_json::json!({
            "headers": {"requestId": "ns1:op1", "type": "SomethingElse"}
        }))
        .is_none());
    }
}
