//! Invocation argument and signer parsing.
//!
//! Arguments arrive as JSON. Each one is either a typed envelope
//! (`{"type": "Integer", "value": "42"}`) as used by NeoVM RPC clients, or a
//! bare JSON scalar/array that is mapped to the obvious parameter type.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::types::ContractHash;
use crate::vm::{ContractParameter, Signer};
use crate::{DebuggerError, Result};

/// Parse a JSON array of arguments.
pub fn parse_args(args_json: &str) -> Result<Vec<ContractParameter>> {
    let value: JsonValue = serde_json::from_str(args_json)
        .map_err(|e| DebuggerError::InvalidArguments(format!("Invalid JSON in arguments: {e}")))?;
    let JsonValue::Array(items) = value else {
        return Err(DebuggerError::InvalidArguments(format!(
            "arguments must be a JSON array, got {}",
            json_type_name(&value)
        ))
        .into());
    };
    items.iter().map(parse_parameter).collect()
}

/// Parse one argument.
pub fn parse_parameter(value: &JsonValue) -> Result<ContractParameter> {
    if let Some((kind, inner)) = typed_annotation(value) {
        return parse_typed(kind, inner).inspect_err(|e| warn!("Failed to parse argument: {e}"));
    }
    match value {
        JsonValue::Null => Ok(ContractParameter::Any),
        JsonValue::Bool(b) => Ok(ContractParameter::Boolean(*b)),
        JsonValue::Number(n) => parse_integer(&n.to_string()).map(ContractParameter::Integer),
        JsonValue::String(s) => Ok(ContractParameter::String(s.clone())),
        JsonValue::Array(items) => items
            .iter()
            .map(parse_parameter)
            .collect::<Result<Vec<_>>>()
            .map(ContractParameter::Array),
        JsonValue::Object(_) => Err(DebuggerError::InvalidArguments(
            "objects must be {\"type\", \"value\"} envelopes".to_string(),
        )
        .into()),
    }
}

/// Parse a JSON array of signers. An empty or absent document means no signers.
pub fn parse_signers(signers_json: Option<&str>) -> Result<Vec<Signer>> {
    let Some(text) = signers_json.filter(|t| !t.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    serde_json::from_str(text)
        .map_err(|e| DebuggerError::InvalidArguments(format!("Invalid signers: {e}")).into())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_typed(kind: &str, value: &JsonValue) -> Result<ContractParameter> {
    let parameter = match kind {
        "Any" => ContractParameter::Any,
        "Boolean" => match value {
            JsonValue::Bool(b) => ContractParameter::Boolean(*b),
            JsonValue::String(s) => ContractParameter::Boolean(s.parse().map_err(|_| {
                DebuggerError::InvalidArguments(format!("invalid Boolean '{s}'"))
            })?),
            other => return Err(mismatch(kind, other)),
        },
        "Integer" => match value {
            JsonValue::Number(n) => ContractParameter::Integer(parse_integer(&n.to_string())?),
            JsonValue::String(s) => ContractParameter::Integer(parse_integer(s)?),
            other => return Err(mismatch(kind, other)),
        },
        "String" => match value {
            JsonValue::String(s) => ContractParameter::String(s.clone()),
            other => return Err(mismatch(kind, other)),
        },
        "ByteArray" => match value {
            JsonValue::String(s) => ContractParameter::ByteArray(BASE64.decode(s).map_err(|e| {
                DebuggerError::InvalidArguments(format!("invalid base64 ByteArray: {e}"))
            })?),
            other => return Err(mismatch(kind, other)),
        },
        "Hash160" => match value {
            JsonValue::String(s) => ContractParameter::Hash160(s.parse::<ContractHash>()?),
            other => return Err(mismatch(kind, other)),
        },
        "Array" => match value {
            JsonValue::Array(items) => ContractParameter::Array(
                items.iter().map(parse_parameter).collect::<Result<Vec<_>>>()?,
            ),
            other => return Err(mismatch(kind, other)),
        },
        other => {
            return Err(DebuggerError::InvalidArguments(format!(
                "unsupported parameter type '{other}'"
            ))
            .into())
        }
    };
    Ok(parameter)
}

fn typed_annotation(value: &JsonValue) -> Option<(&str, &JsonValue)> {
    let object = value.as_object()?;
    let kind = object.get("type")?.as_str()?;
    Some((kind, object.get("value").unwrap_or(&JsonValue::Null)))
}

fn parse_integer(raw: &str) -> Result<i128> {
    raw.trim()
        .parse::<i128>()
        .map_err(|e| DebuggerError::InvalidArguments(format!("invalid Integer '{raw}': {e}")).into())
}

fn mismatch(kind: &str, value: &JsonValue) -> anyhow::Error {
    DebuggerError::InvalidArguments(format!(
        "{kind} parameter cannot be built from a JSON {}",
        json_type_name(value)
    ))
    .into()
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_scalars_map_to_obvious_types() {
        let args = parse_args(r#"[1, "a", true, null, [2]]"#).unwrap();
        assert_eq!(
            args,
            vec![
                ContractParameter::Integer(1),
                ContractParameter::String("a".to_string()),
                ContractParameter::Boolean(true),
                ContractParameter::Any,
                ContractParameter::Array(vec![ContractParameter::Integer(2)]),
            ]
        );
    }

    #[test]
    fn typed_envelopes() {
        let args = parse_args(
            r#"[
                {"type": "Integer", "value": "-170141183460469231731687303715884105728"},
                {"type": "ByteArray", "value": "AQI="},
                {"type": "Hash160", "value": "0x0102030405060708090a0b0c0d0e0f1011121314"}
            ]"#,
        )
        .unwrap();
        assert_eq!(args[0], ContractParameter::Integer(i128::MIN));
        assert_eq!(args[1], ContractParameter::ByteArray(vec![1, 2]));
        assert!(matches!(args[2], ContractParameter::Hash160(_)));
    }

    #[test]
    fn rejects_non_array_documents() {
        let err = parse_args(r#"{"type": "Integer", "value": 1}"#).unwrap_err();
        assert!(err.to_string().contains("JSON array"));
    }

    #[test]
    fn rejects_type_mismatch() {
        let err = parse_args(r#"[{"type": "Integer", "value": true}]"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebuggerError>(),
            Some(DebuggerError::InvalidArguments(_))
        ));
    }

    #[test]
    fn signers_default_scope() {
        let signers = parse_signers(Some(
            r#"[{"account": "0x0102030405060708090a0b0c0d0e0f1011121314"}]"#,
        ))
        .unwrap();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].scopes, "CalledByEntry");
        assert!(parse_signers(None).unwrap().is_empty());
    }
}
