//! JSON argument coercion against ABI types.
//!
//! The gateway accepts positional JSON parameters and performs the
//! final ABI packing itself, so submission-side coercion validates
//! shape rather than producing calldata: an argument whose JSON form
//! cannot represent the declared ABI type is a hard error. Conversion
//! to `DynSolValue` is still needed locally for the packed batch-pin
//! blob and for reference decoding in tests.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, FixedBytes, I256, U256};
use serde_json::Value;
use std::str::FromStr;

use evmbridge_core::error::ConnectorError;

use crate::interface::AbiParam;

fn coercion_err(param: &str, detail: impl Into<String>) -> ConnectorError {
    ConnectorError::InvalidSchema {
        reason: format!("unsupported type for parameter '{param}': {}", detail.into()),
    }
}

/// Validate one named argument against its declared type, returning the
/// wire JSON value to place in the positional `params` array.
pub fn coerce_arg(param: &AbiParam, value: &Value) -> Result<Value, ConnectorError> {
    coerce_inner(&param.name, &param.sol_type, value)
}

fn coerce_inner(name: &str, ty: &DynSolType, value: &Value) -> Result<Value, ConnectorError> {
    match ty {
        DynSolType::Uint(_) | DynSolType::Int(_) => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) if !s.is_empty() => Ok(value.clone()),
            other => Err(coercion_err(name, format!("{other} as {ty}"))),
        },
        DynSolType::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(coercion_err(name, format!("{other} as bool"))),
        },
        DynSolType::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(coercion_err(name, format!("{other} as string"))),
        },
        DynSolType::Address | DynSolType::Bytes | DynSolType::FixedBytes(_) => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(coercion_err(name, format!("{other} as {ty}"))),
        },
        DynSolType::Array(inner) | DynSolType::FixedArray(inner, _) => match value {
            Value::Array(items) => {
                let coerced: Result<Vec<Value>, _> = items
                    .iter()
                    .map(|item| coerce_inner(name, inner, item))
                    .collect();
                Ok(Value::Array(coerced?))
            }
            other => Err(coercion_err(name, format!("{other} as {ty}"))),
        },
        DynSolType::Tuple(members) => match value {
            // Tuples arrive positionally.
            Value::Array(items) if items.len() == members.len() => {
                let coerced: Result<Vec<Value>, _> = items
                    .iter()
                    .zip(members)
                    .map(|(item, member)| coerce_inner(name, member, item))
                    .collect();
                Ok(Value::Array(coerced?))
            }
            // Or as an object, passed through for the gateway to match
            // by component name.
            Value::Object(_) => Ok(value.clone()),
            other => Err(coercion_err(name, format!("{other} as tuple"))),
        },
        other => Err(coercion_err(name, format!("unhandled ABI type {other}"))),
    }
}

/// Convert a JSON value to the `DynSolValue` for local ABI encoding.
pub fn json_to_sol_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue, ConnectorError> {
    let err = |detail: String| ConnectorError::Decode { reason: detail };
    match ty {
        DynSolType::Uint(bits) => {
            let u = match value {
                Value::Number(n) => U256::from(n.as_u64().ok_or_else(|| err("negative uint".into()))?),
                Value::String(s) => {
                    U256::from_str(s).map_err(|e| err(format!("uint parse '{s}': {e}")))?
                }
                other => return Err(err(format!("{other} as uint"))),
            };
            Ok(DynSolValue::Uint(u, *bits))
        }
        DynSolType::Int(bits) => {
            let i = match value {
                Value::Number(n) => I256::try_from(n.as_i64().ok_or_else(|| err("bad int".into()))?)
                    .map_err(|e| err(e.to_string()))?,
                Value::String(s) => {
                    I256::from_str(s).map_err(|e| err(format!("int parse '{s}': {e}")))?
                }
                other => return Err(err(format!("{other} as int"))),
            };
            Ok(DynSolValue::Int(i, *bits))
        }
        DynSolType::Bool => Ok(DynSolValue::Bool(
            value.as_bool().ok_or_else(|| err("expected bool".into()))?,
        )),
        DynSolType::String => Ok(DynSolValue::String(
            value
                .as_str()
                .ok_or_else(|| err("expected string".into()))?
                .to_string(),
        )),
        DynSolType::Address => {
            let s = value.as_str().ok_or_else(|| err("expected address".into()))?;
            let addr = Address::from_str(s).map_err(|e| err(format!("address parse: {e}")))?;
            Ok(DynSolValue::Address(addr))
        }
        DynSolType::Bytes => {
            let s = value.as_str().ok_or_else(|| err("expected bytes hex".into()))?;
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map_err(|e| err(format!("bytes hex: {e}")))?;
            Ok(DynSolValue::Bytes(bytes))
        }
        DynSolType::FixedBytes(n) => {
            let s = value.as_str().ok_or_else(|| err("expected fixed bytes hex".into()))?;
            let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
                .map_err(|e| err(format!("fixed bytes hex: {e}")))?;
            if bytes.len() != *n {
                return Err(err(format!("bytes{n}: got {} bytes", bytes.len())));
            }
            let mut arr = [0u8; 32];
            arr[..*n].copy_from_slice(&bytes);
            Ok(DynSolValue::FixedBytes(FixedBytes::from_slice(&arr), *n))
        }
        DynSolType::Array(inner) => {
            let items = value.as_array().ok_or_else(|| err("expected array".into()))?;
            let converted: Result<Vec<_>, _> =
                items.iter().map(|v| json_to_sol_value(inner, v)).collect();
            Ok(DynSolValue::Array(converted?))
        }
        DynSolType::FixedArray(inner, len) => {
            let items = value.as_array().ok_or_else(|| err("expected array".into()))?;
            if items.len() != *len {
                return Err(err(format!("fixed array: expected {len}, got {}", items.len())));
            }
            let converted: Result<Vec<_>, _> =
                items.iter().map(|v| json_to_sol_value(inner, v)).collect();
            Ok(DynSolValue::FixedArray(converted?))
        }
        DynSolType::Tuple(members) => {
            let items = value.as_array().ok_or_else(|| err("expected tuple array".into()))?;
            if items.len() != members.len() {
                return Err(err("tuple arity mismatch".into()));
            }
            let converted: Result<Vec<_>, _> = items
                .iter()
                .zip(members)
                .map(|(v, t)| json_to_sol_value(t, v))
                .collect();
            Ok(DynSolValue::Tuple(converted?))
        }
        other => Err(err(format!("unhandled ABI type {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::translate_param;
    use evmbridge_core::schema::ParamDef;

    fn param(ty: &str) -> AbiParam {
        translate_param(&ParamDef::new(
            "p",
            serde_json::json!({"details": {"type": ty}}),
        ))
        .unwrap()
    }

    #[test]
    fn numbers_and_decimal_strings_pass_for_uints() {
        let p = param("uint256");
        assert!(coerce_arg(&p, &serde_json::json!(1)).is_ok());
        assert!(coerce_arg(&p, &serde_json::json!("1000000000000000000000000")).is_ok());
    }

    #[test]
    fn object_for_uint_is_unsupported() {
        let p = param("uint256");
        let err = coerce_arg(&p, &serde_json::json!({"true": false})).unwrap_err();
        assert!(err.to_string().contains("unsupported type"));
    }

    #[test]
    fn arrays_recurse() {
        let p = param("bytes32[]");
        assert!(coerce_arg(&p, &serde_json::json!(["0xabc"])).is_ok());
        assert!(coerce_arg(&p, &serde_json::json!("0xabc")).is_err());
    }

    #[test]
    fn sol_value_uint_from_string() {
        let v = json_to_sol_value(&DynSolType::Uint(256), &serde_json::json!("12")).unwrap();
        assert_eq!(v, DynSolValue::Uint(U256::from(12u64), 256));
    }

    #[test]
    fn sol_value_fixed_bytes_length_checked() {
        let err = json_to_sol_value(&DynSolType::FixedBytes(32), &serde_json::json!("0x1234"))
            .unwrap_err();
        assert!(err.to_string().contains("bytes32"));
    }
}
