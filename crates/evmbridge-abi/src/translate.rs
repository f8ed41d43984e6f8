//! Translation of the abstract typed-parameter schema onto ABI types.
//!
//! Each parameter carries a JSON schema whose `details.type` names the
//! concrete ABI type (`uint256`, `bytes32`, `address`, `tuple`, ...).
//! Tuples list their members under `properties`, ordered by
//! `details.index`. Translation failures are schema errors: the whole
//! surrounding operation (listener add, interface parse) fails.

use alloy_dyn_abi::DynSolType;
use alloy_json_abi::{EventParam, Param};
use serde_json::Value;

use evmbridge_core::error::ConnectorError;
use evmbridge_core::schema::ParamDef;

use crate::interface::AbiParam;

fn schema_err(reason: impl Into<String>) -> ConnectorError {
    ConnectorError::InvalidSchema {
        reason: reason.into(),
    }
}

/// Translate one parameter definition.
pub fn translate_param(def: &ParamDef) -> Result<AbiParam, ConnectorError> {
    let schema = def
        .schema
        .as_object()
        .ok_or_else(|| schema_err(format!("parameter '{}': schema is not an object", def.name)))?;
    let details = schema
        .get("details")
        .and_then(Value::as_object)
        .ok_or_else(|| schema_err(format!("parameter '{}': missing details", def.name)))?;
    let ty = details
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| schema_err(format!("parameter '{}': missing details.type", def.name)))?;
    let indexed = details
        .get("indexed")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let (type_string, components) = if is_tuple_type(ty) {
        let members = tuple_members(&def.name, schema)?;
        let inner: Vec<&str> = members.iter().map(|m| m.type_string.as_str()).collect();
        // Preserve any array suffix on the tuple itself.
        let suffix = &ty["tuple".len()..];
        (format!("({}){}", inner.join(","), suffix), members)
    } else {
        (ty.to_string(), Vec::new())
    };

    let sol_type: DynSolType = type_string
        .parse()
        .map_err(|e| schema_err(format!("parameter '{}': invalid ABI type '{type_string}': {e}", def.name)))?;

    Ok(AbiParam {
        name: def.name.clone(),
        type_string,
        sol_type,
        indexed,
        components,
    })
}

fn is_tuple_type(ty: &str) -> bool {
    ty == "tuple" || ty.starts_with("tuple[")
}

/// Collect tuple members from `properties`, ordered by `details.index`.
fn tuple_members(
    name: &str,
    schema: &serde_json::Map<String, Value>,
) -> Result<Vec<AbiParam>, ConnectorError> {
    let props = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| schema_err(format!("tuple parameter '{name}': missing properties")))?;

    let mut ordered: Vec<(u64, AbiParam)> = Vec::with_capacity(props.len());
    for (prop_name, prop_schema) in props {
        let index = prop_schema
            .get("details")
            .and_then(|d| d.get("index"))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                schema_err(format!("tuple parameter '{name}': property '{prop_name}' missing details.index"))
            })?;
        let member = translate_param(&ParamDef {
            name: prop_name.clone(),
            schema: prop_schema.clone(),
        })?;
        ordered.push((index, member));
    }
    ordered.sort_by_key(|(i, _)| *i);
    Ok(ordered.into_iter().map(|(_, m)| m).collect())
}

/// Translate a full parameter list.
pub fn translate_params(defs: &[ParamDef]) -> Result<Vec<AbiParam>, ConnectorError> {
    defs.iter().map(translate_param).collect()
}

/// Build the ABI JSON `Param` for a translated parameter (function
/// inputs/outputs).
pub fn to_abi_param(param: &AbiParam) -> Param {
    Param {
        ty: base_type_string(param),
        name: param.name.clone(),
        components: param.components.iter().map(to_abi_param).collect(),
        internal_type: None,
    }
}

/// Build the ABI JSON `EventParam` for a translated parameter.
pub fn to_abi_event_param(param: &AbiParam) -> EventParam {
    EventParam {
        ty: base_type_string(param),
        name: param.name.clone(),
        indexed: param.indexed,
        components: param.components.iter().map(to_abi_param).collect(),
        internal_type: None,
    }
}

/// ABI JSON uses `tuple`/`tuple[]` with components rather than the
/// parenthesized canonical form.
fn base_type_string(param: &AbiParam) -> String {
    if param.components.is_empty() {
        param.type_string.clone()
    } else {
        let open = param.type_string.rfind(')').map(|i| i + 1).unwrap_or(0);
        format!("tuple{}", &param.type_string[open..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint_param(name: &str) -> ParamDef {
        ParamDef::new(
            name,
            serde_json::json!({"type": "integer", "details": {"type": "uint256"}}),
        )
    }

    #[test]
    fn translates_primitives() {
        let p = translate_param(&uint_param("x")).unwrap();
        assert_eq!(p.type_string, "uint256");
        assert_eq!(p.sol_type, DynSolType::Uint(256));
        assert!(!p.indexed);
    }

    #[test]
    fn translates_indexed_flag() {
        let p = translate_param(&ParamDef::new(
            "y",
            serde_json::json!({"type": "integer", "details": {"type": "uint256", "indexed": true}}),
        ))
        .unwrap();
        assert!(p.indexed);
    }

    #[test]
    fn translates_tuples_ordered_by_index() {
        let p = translate_param(&ParamDef::new(
            "z",
            serde_json::json!({
                "type": "object",
                "details": {"type": "tuple"},
                "properties": {
                    "prop2": {"type": "integer", "details": {"type": "uint128", "index": 1}},
                    "prop1": {"type": "integer", "details": {"type": "uint256", "index": 0}}
                }
            }),
        ))
        .unwrap();
        assert_eq!(p.type_string, "(uint256,uint128)");
        assert_eq!(p.components[0].name, "prop1");
        assert_eq!(base_type_string(&p), "tuple");
    }

    #[test]
    fn empty_type_is_a_schema_error() {
        let err = translate_param(&ParamDef::new(
            "v",
            serde_json::json!({"type": "string", "details": {"type": ""}}),
        ))
        .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidSchema { .. }));
    }

    #[test]
    fn non_object_schema_is_a_schema_error() {
        let err =
            translate_param(&ParamDef::new("v", serde_json::json!("not an abi"))).unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidSchema { .. }));
    }

    #[test]
    fn array_types_parse() {
        let p = translate_param(&ParamDef::new(
            "ctx",
            serde_json::json!({"type": "array", "details": {"type": "bytes32[]"}}),
        ))
        .unwrap();
        assert_eq!(
            p.sol_type,
            DynSolType::Array(Box::new(DynSolType::FixedBytes(32)))
        );
    }
}
