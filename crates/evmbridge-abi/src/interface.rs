//! Parsed-interface representation and cache.
//!
//! Definitions are translated once into `Parsed*` values holding both
//! the resolved `DynSolType` tree and the ABI JSON element sent to the
//! gateway; every encode/decode afterwards consumes the parsed form.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_dyn_abi::DynSolType;
use alloy_json_abi::{Event, Function, StateMutability};
use serde_json::Value;

use evmbridge_core::error::ConnectorError;
use evmbridge_core::schema::{ErrorDef, EventDef, MethodDef};

use crate::signature;
use crate::translate::{to_abi_event_param, to_abi_param, translate_params};

/// One translated parameter.
#[derive(Debug, Clone)]
pub struct AbiParam {
    pub name: String,
    /// Canonical type string (`uint256`, `(uint256,string)`, ...).
    pub type_string: String,
    pub sol_type: DynSolType,
    pub indexed: bool,
    /// Tuple members, in ABI order; empty for non-tuples.
    pub components: Vec<AbiParam>,
}

/// A method parsed for submission.
#[derive(Debug, Clone)]
pub struct ParsedMethod {
    pub name: String,
    pub params: Vec<AbiParam>,
    pub returns: Vec<AbiParam>,
    abi: Function,
}

impl ParsedMethod {
    pub fn parse(def: &MethodDef) -> Result<Self, ConnectorError> {
        let params = translate_params(&def.params)?;
        let returns = translate_params(&def.returns)?;
        let abi = Function {
            name: def.name.clone(),
            inputs: params.iter().map(to_abi_param).collect(),
            outputs: returns.iter().map(to_abi_param).collect(),
            state_mutability: StateMutability::NonPayable,
        };
        Ok(Self {
            name: def.name.clone(),
            params,
            returns,
            abi,
        })
    }

    /// The ABI JSON element placed in command bodies.
    pub fn abi_json(&self) -> Value {
        let mut value = serde_json::to_value(&self.abi).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("type".into(), Value::String("function".into()));
        }
        value
    }
}

/// An event parsed for subscription and matching.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub name: String,
    pub params: Vec<AbiParam>,
    /// Canonical signature including any indexed suffix.
    pub signature: String,
    abi: Event,
}

impl ParsedEvent {
    pub fn parse(def: &EventDef) -> Result<Self, ConnectorError> {
        let params = translate_params(&def.params)?;
        let signature = signature::event_signature(def)?;
        let abi = Event {
            name: def.name.clone(),
            inputs: params.iter().map(to_abi_event_param).collect(),
            anonymous: false,
        };
        Ok(Self {
            name: def.name.clone(),
            params,
            signature,
            abi,
        })
    }

    /// The ABI JSON element placed in subscription bodies.
    pub fn abi_json(&self) -> Value {
        let mut value = serde_json::to_value(&self.abi).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("type".into(), Value::String("event".into()));
        }
        value
    }
}

/// A custom error parsed for signature generation.
#[derive(Debug, Clone)]
pub struct ParsedError {
    pub name: String,
    pub params: Vec<AbiParam>,
    pub signature: String,
}

impl ParsedError {
    pub fn parse(def: &ErrorDef) -> Result<Self, ConnectorError> {
        Ok(Self {
            name: def.name.clone(),
            params: translate_params(&def.params)?,
            signature: signature::error_signature(def)?,
        })
    }
}

/// A method plus the custom errors declared alongside it. Parsing is
/// all-or-nothing: one bad error schema fails the whole interface.
#[derive(Debug, Clone)]
pub struct ParsedInterface {
    pub method: ParsedMethod,
    pub errors: Vec<ParsedError>,
}

impl ParsedInterface {
    pub fn parse(method: &MethodDef, errors: &[ErrorDef]) -> Result<Self, ConnectorError> {
        Ok(Self {
            method: ParsedMethod::parse(method)?,
            errors: errors.iter().map(ParsedError::parse).collect::<Result<_, _>>()?,
        })
    }
}

/// Definition-keyed cache of parsed events.
///
/// Scoped to the connector lifetime; the key is the serialized
/// definition so equal definitions share one parse.
#[derive(Default)]
pub struct AbiCache {
    events: Mutex<HashMap<String, Arc<ParsedEvent>>>,
}

impl AbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parsed_event(&self, def: &EventDef) -> Result<Arc<ParsedEvent>, ConnectorError> {
        let key = serde_json::to_string(def)?;
        if let Some(hit) = self.events.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }
        let parsed = Arc::new(ParsedEvent::parse(def)?);
        self.events
            .lock()
            .unwrap()
            .insert(key, parsed.clone());
        Ok(parsed)
    }
}
