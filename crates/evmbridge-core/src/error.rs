//! Error types for the EVMBridge connector.

use thiserror::Error;

/// Errors surfaced by the connector.
///
/// The taxonomy matters more than the messages: configuration and
/// validation problems are local and never retryable; transport
/// problems leave retryability to the caller; recognized gateway wire
/// errors are remapped onto their own variants so upstream logic can
/// branch on them.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connector configuration: {reason}")]
    Config { reason: String },

    #[error("Invalid contract location: {reason}")]
    InvalidLocation { reason: String },

    #[error("Invalid address '{address}': must be 20 bytes of hex")]
    InvalidAddress { address: String },

    #[error("Parameter schema cannot be mapped to ABI types: {reason}")]
    InvalidSchema { reason: String },

    #[error("Option key '{key}' conflicts with a reserved protocol field")]
    ReservedOption { key: String },

    #[error("A contract listener requires at least one filter")]
    NoListenerFilters,

    #[error("A filter without a location is not allowed alongside located filters")]
    FilterMissingLocation,

    #[error("Method '{method}' does not support batch pin data")]
    BatchPinNotSupported { method: String },

    #[error("Signing key required for this operation")]
    MissingSigningKey,

    #[error("Gateway error: {message}")]
    Wire {
        code: Option<String>,
        message: String,
    },

    #[error("Gateway request failed: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("WebSocket failure: {reason}")]
    WebSocket { reason: String },

    #[error("Subscription name '{name}' is not in a recognized format")]
    SubscriptionName { name: String },

    #[error("Unable to decode event payload: {reason}")]
    Decode { reason: String },

    #[error("Unexpected network version '{value}'")]
    BadNetworkVersion { value: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ConnectorError {
    /// True when this failure is inherent to the request content and
    /// must not be retried verbatim.
    pub fn is_request_fault(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidLocation { .. }
                | Self::InvalidAddress { .. }
                | Self::InvalidSchema { .. }
                | Self::ReservedOption { .. }
                | Self::NoListenerFilters
                | Self::FilterMissingLocation
                | Self::BatchPinNotSupported { .. }
                | Self::MissingSigningKey
        )
    }
}

/// Outcome of a submission call (invoke / query / deploy / batch pin).
///
/// Carries the underlying error plus the gateway's verdict on whether
/// the submission was rejected outright. `rejected == true` means the
/// request content is at fault and resubmitting verbatim is pointless;
/// `rejected == false` leaves the retry decision with the caller.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SubmissionError {
    #[source]
    pub source: ConnectorError,
    pub rejected: bool,
}

impl SubmissionError {
    /// A failure inherent to the request; never retry verbatim.
    pub fn rejected(source: ConnectorError) -> Self {
        Self {
            source,
            rejected: true,
        }
    }

    /// A failure the caller may retry.
    pub fn retryable(source: ConnectorError) -> Self {
        Self {
            source,
            rejected: false,
        }
    }
}

impl From<ConnectorError> for SubmissionError {
    fn from(source: ConnectorError) -> Self {
        let rejected = source.is_request_fault();
        Self { source, rejected }
    }
}
