//! Gateway wire-error classification.
//!
//! Every non-2xx gateway response is checked for a recognizable wire
//! error code before being wrapped. Known codes remap to specific
//! connector errors and decide the submission-rejected flag; anything
//! unrecognized stays a plain transport error, eligible for retry by
//! the caller.

use serde_json::Value;

use evmbridge_core::error::ConnectorError;

/// The queried method does not exist on the target contract. Treated
/// as a capability-probe outcome by the version negotiator, not a
/// failure.
pub const WIRE_METHOD_NOT_FOUND: &str = "FFEC100148";

/// The gateway determined execution would fail (e.g. gas estimation).
pub const WIRE_EXECUTION_FAILED: &str = "FFEC100130";

/// The EVM reverted the call.
pub const WIRE_EVM_REVERTED: &str = "FF23021";

/// A classified gateway failure.
#[derive(Debug, Clone)]
pub struct GatewayFault {
    pub status: u16,
    /// Recognized wire code, when the body carried one.
    pub code: Option<String>,
    /// The gateway's error message, or the raw body when unparseable.
    pub message: String,
    /// The gateway's own submission-rejected marker.
    rejected_flag: bool,
}

impl GatewayFault {
    /// Parse a non-2xx response body into a classified fault.
    ///
    /// Bodies are expected to look like
    /// `{"error": "<code>: <detail>", "submissionRejected": bool}` but
    /// anything is tolerated: an unparseable body simply yields no
    /// code.
    pub fn parse(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let obj = parsed.as_ref().and_then(Value::as_object);

        let message = obj
            .and_then(|o| o.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());

        let rejected_flag = obj
            .and_then(|o| o.get("submissionRejected"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            status,
            code: extract_code(&message),
            message,
            rejected_flag,
        }
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code.as_deref() == Some(WIRE_METHOD_NOT_FOUND)
    }

    /// Is this failure inherent to the submitted content?
    pub fn submission_rejected(&self) -> bool {
        self.rejected_flag
            || matches!(
                self.code.as_deref(),
                Some(WIRE_METHOD_NOT_FOUND) | Some(WIRE_EXECUTION_FAILED) | Some(WIRE_EVM_REVERTED)
            )
    }

    /// Remap onto the connector error taxonomy: recognized codes become
    /// wire errors, everything else a transport error.
    pub fn into_error(self) -> ConnectorError {
        match self.code {
            Some(code) => ConnectorError::Wire {
                code: Some(code),
                message: self.message,
            },
            None => ConnectorError::Transport {
                status: Some(self.status),
                message: self.message,
            },
        }
    }
}

/// Pull a leading `FF...` code out of a gateway error message
/// (`"FFEC100130: failure"` or a bare `"FFEC100148"`).
fn extract_code(message: &str) -> Option<String> {
    let token = message.split(':').next()?.trim();
    let looks_like_code = token.len() >= 6
        && token.starts_with("FF")
        && token[2..].chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_digit());
    looks_like_code.then(|| token.to_string())
}
