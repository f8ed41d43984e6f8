//! Canonical signature generation.
//!
//! Signatures are the matching key between listener filters and
//! delivered events, so their text form is normative:
//! `Name(type,type,...)`, tuples parenthesized, plus a ` [i=..]`
//! suffix listing indexed parameter positions for events, and an
//! optional `address:` / `*:` location qualifier.

use evmbridge_core::error::ConnectorError;
use evmbridge_core::location::ContractLocation;
use evmbridge_core::schema::{ErrorDef, EventDef, MethodDef};

use crate::translate::translate_params;

fn joined_types(params: &[crate::interface::AbiParam]) -> String {
    params
        .iter()
        .map(|p| p.type_string.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Canonical event signature, with indexed positions appended when any
/// parameter is indexed: `Changed(uint256,uint256) [i=1]`.
pub fn event_signature(event: &EventDef) -> Result<String, ConnectorError> {
    let params = translate_params(&event.params)?;
    let mut signature = format!("{}({})", event.name, joined_types(&params));
    let indexed: Vec<String> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.indexed)
        .map(|(i, _)| i.to_string())
        .collect();
    if !indexed.is_empty() {
        signature.push_str(&format!(" [i={}]", indexed.join(",")));
    }
    Ok(signature)
}

/// Canonical error signature: `CustomError(uint256,uint256)`.
pub fn error_signature(def: &ErrorDef) -> Result<String, ConnectorError> {
    let params = translate_params(&def.params)?;
    Ok(format!("{}({})", def.name, joined_types(&params)))
}

/// Canonical method signature, used in logs and cache keys.
pub fn method_signature(def: &MethodDef) -> Result<String, ConnectorError> {
    let params = translate_params(&def.params)?;
    Ok(format!("{}({})", def.name, joined_types(&params)))
}

/// Qualify a signature with a contract location, or `*` for a
/// wildcard (any-address) filter.
pub fn signature_with_location(signature: &str, location: Option<&ContractLocation>) -> String {
    match location {
        Some(loc) => format!("{}:{}", loc.address, signature),
        None => format!("*:{signature}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmbridge_core::schema::ParamDef;

    fn uint(name: &str) -> ParamDef {
        ParamDef::new(
            name,
            serde_json::json!({"type": "integer", "details": {"type": "uint256"}}),
        )
    }

    fn uint_indexed(name: &str) -> ParamDef {
        ParamDef::new(
            name,
            serde_json::json!({"type": "integer", "details": {"type": "uint256", "indexed": true}}),
        )
    }

    fn tuple_param(name: &str) -> ParamDef {
        ParamDef::new(
            name,
            serde_json::json!({
                "type": "object",
                "details": {"type": "tuple"},
                "properties": {
                    "prop1": {"type": "integer", "details": {"type": "uint256", "index": 0}},
                    "prop2": {"type": "integer", "details": {"type": "uint256", "index": 1}}
                }
            }),
        )
    }

    #[test]
    fn plain_event_signature() {
        let event = EventDef {
            name: "Changed".into(),
            params: vec![uint("x"), uint("y"), tuple_param("z")],
        };
        assert_eq!(
            event_signature(&event).unwrap(),
            "Changed(uint256,uint256,(uint256,uint256))"
        );
    }

    #[test]
    fn indexed_positions_are_appended() {
        let event = EventDef {
            name: "Changed".into(),
            params: vec![uint("x"), uint_indexed("y"), tuple_param("z")],
        };
        assert_eq!(
            event_signature(&event).unwrap(),
            "Changed(uint256,uint256,(uint256,uint256)) [i=1]"
        );
    }

    #[test]
    fn empty_event_signature() {
        let event = EventDef {
            name: "Empty".into(),
            params: vec![],
        };
        assert_eq!(event_signature(&event).unwrap(), "Empty()");
    }

    #[test]
    fn invalid_schema_fails_signature() {
        let event = EventDef {
            name: "Changed".into(),
            params: vec![ParamDef::new("x", serde_json::json!({"!bad": "bad"}))],
        };
        assert!(event_signature(&event).is_err());
    }

    #[test]
    fn error_signature_matches_event_form() {
        let def = ErrorDef {
            name: "CustomError".into(),
            params: vec![uint("x"), uint("y"), tuple_param("z")],
        };
        assert_eq!(
            error_signature(&def).unwrap(),
            "CustomError(uint256,uint256,(uint256,uint256))"
        );
    }

    #[test]
    fn location_qualification() {
        let sig = "Changed(uint256,uint256)";
        let loc = ContractLocation {
            address: "0x3081d84fd367044f4ed453f2024709242470388c".into(),
        };
        assert_eq!(
            signature_with_location(sig, Some(&loc)),
            "0x3081d84fd367044f4ed453f2024709242470388c:Changed(uint256,uint256)"
        );
        assert_eq!(
            signature_with_location(sig, None),
            "*:Changed(uint256,uint256)"
        );
    }
}
