//! Inbound frame classification.
//!
//! Every payload read from the socket is parsed exactly once into a
//! closed set of frame kinds; downstream code never re-probes raw
//! JSON. The gateway sends event batches (a bare array in the legacy
//! shape, or an object with `batchNumber` + `events`) and receipt
//! notifications (an object with a `headers.type`). Anything else is
//! noise and is discarded without a reply.

use serde_json::Value;

/// One classified inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// An ordered batch of events. Only frames that carried a batch
    /// number get one echoed in the reply.
    EventBatch {
        batch_number: Option<u64>,
        events: Vec<Value>,
    },
    /// A receipt / transaction-update notification, unparsed beyond
    /// classification.
    Receipt(Value),
    /// Malformed or unrecognizable payload; dropped silently.
    Unrecognized,
}

/// Classify one payload.
pub fn classify_frame(data: &[u8]) -> InboundFrame {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return InboundFrame::Unrecognized;
    };
    match value {
        Value::Array(events) => InboundFrame::EventBatch {
            batch_number: None,
            events,
        },
        Value::Object(obj) => {
            let batch_number = obj.get("batchNumber").and_then(Value::as_u64);
            if let (Some(batch_number), Some(events)) =
                (batch_number, obj.get("events").and_then(Value::as_array))
            {
                return InboundFrame::EventBatch {
                    batch_number: Some(batch_number),
                    events: events.clone(),
                };
            }
            let has_receipt_headers = obj
                .get("headers")
                .and_then(|h| h.get("type"))
                .and_then(Value::as_str)
                .is_some();
            if has_receipt_headers {
                InboundFrame::Receipt(Value::Object(obj))
            } else {
                InboundFrame::Unrecognized
            }
        }
        _ => InboundFrame::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_is_unrecognized() {
        assert!(matches!(classify_frame(b"!json"), InboundFrame::Unrecognized));
        assert!(matches!(classify_frame(b"42"), InboundFrame::Unrecognized));
        assert!(matches!(
            classify_frame(br#""not an object""#),
            InboundFrame::Unrecognized
        ));
        assert!(matches!(
            classify_frame(br#"{"not": "a reply"}"#),
            InboundFrame::Unrecognized
        ));
        assert!(matches!(
            classify_frame(br#"{"bad": "receipt"}"#),
            InboundFrame::Unrecognized
        ));
    }

    #[test]
    fn legacy_array_has_no_batch_number() {
        match classify_frame(b"[]") {
            InboundFrame::EventBatch {
                batch_number: None,
                events,
            } => assert!(events.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn batch_object_carries_number() {
        match classify_frame(br#"{"batchNumber":12345,"events":[{"a":1}]}"#) {
            InboundFrame::EventBatch {
                batch_number: Some(12345),
                events,
            } => assert_eq!(events.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn receipt_objects_are_classified_by_headers() {
        let receipt = br#"{"headers":{"type":"TransactionSuccess","requestId":"ns1:op1"},"status":"1"}"#;
        assert!(matches!(classify_frame(receipt), InboundFrame::Receipt(_)));
    }
}
