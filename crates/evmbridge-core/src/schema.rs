//! Abstract typed-parameter schema.
//!
//! Upstream namespace logic describes contract methods, events, and
//! errors in a chain-neutral form: a name plus ordered parameters, each
//! carrying a JSON schema whose `details` block holds the concrete ABI
//! type (and, for events, the `indexed` flag). Translation to actual
//! ABI types lives in `evmbridge-abi`; this module only defines the
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named parameter with its JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    /// JSON schema; `details.type` holds the ABI type string,
    /// `details.indexed` the event topic flag, `details.index` the
    /// position of a tuple property.
    pub schema: Value,
}

/// A contract method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub returns: Vec<ParamDef>,
}

/// A contract event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

/// A contract custom-error definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

/// One filter of a contract listener: an event plus an optional
/// location and starting point.
#[derive(Debug, Clone)]
pub struct ListenerFilter {
    pub event: EventDef,
    /// Raw location JSON; parsed and canonicalized at add time.
    pub location: Option<Value>,
}

/// A contract listener request: one or more filters plus delivery
/// options.
#[derive(Debug, Clone)]
pub struct ContractListener {
    pub id: uuid::Uuid,
    pub namespace: String,
    pub filters: Vec<ListenerFilter>,
    /// "oldest", "newest", or a block number.
    pub first_event: Option<String>,
}

impl ParamDef {
    /// Convenience constructor used widely in tests.
    pub fn new(name: &str, schema: Value) -> Self {
        Self {
            name: name.to_string(),
            schema,
        }
    }
}
