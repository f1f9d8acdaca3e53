//! Host type descriptors.
//!
//! A descriptor is either a primitive name (`"int"`, `"timestamp"`, ...) or an
//! object: `{"kind": "list", "elementType": D}`, `{"kind": "map", "keyType":
//! D, "valueType": D}`, or `{"type": name}` / `{"name": name}` for a named
//! type. Resolution is permissive: anything unrecognized resolves to `dyn`.

use celrt_core::Type;
use serde_json::{Value as Json, json};

use crate::error::{Error, Result};

/// Resolve a descriptor to an engine type.
///
/// The only rejected descriptor is a map whose key type can never be a CEL
/// map key, such as `double`.
pub fn resolve(descriptor: &Json) -> Result<Type> {
    match descriptor {
        Json::String(name) => Ok(primitive(name)),
        Json::Object(fields) => {
            let kind = fields.get("kind").and_then(Json::as_str);
            match kind {
                Some("list") => {
                    let elem = optional_field(fields.get("elementType"), Type::Dyn)?;
                    Ok(Type::list(elem))
                }
                Some("map") => {
                    let key = optional_field(fields.get("keyType"), Type::String)?;
                    let value = optional_field(fields.get("valueType"), Type::Dyn)?;
                    if !key.is_valid_map_key() {
                        return Err(Error::InvalidType(format!("unsupported map key type '{}'", key)));
                    }
                    Ok(Type::map(key, value))
                }
                _ => {
                    let named = ["type", "name"]
                        .iter()
                        .find_map(|field| fields.get(*field).and_then(Json::as_str));
                    Ok(named.map_or(Type::Dyn, primitive))
                }
            }
        }
        _ => Ok(Type::Dyn),
    }
}

fn optional_field(descriptor: Option<&Json>, default: Type) -> Result<Type> {
    match descriptor {
        None | Some(Json::Null) => Ok(default),
        Some(descriptor) => resolve(descriptor),
    }
}

fn primitive(name: &str) -> Type {
    match name {
        "bool" => Type::Bool,
        "int" => Type::Int,
        "uint" => Type::Uint,
        "double" => Type::Double,
        "string" => Type::String,
        "bytes" => Type::Bytes,
        "null" => Type::Null,
        "timestamp" => Type::Timestamp,
        "duration" => Type::Duration,
        _ => Type::Dyn,
    }
}

/// Describe an engine type as a host descriptor.
///
/// Inverse of [`resolve`] for the types it produces. Optionals are described
/// by their inner type and `type(T)` values as `"type"`.
pub fn describe(ty: &Type) -> Json {
    match ty {
        Type::Bool => json!("bool"),
        Type::Int => json!("int"),
        Type::Uint => json!("uint"),
        Type::Double => json!("double"),
        Type::String => json!("string"),
        Type::Bytes => json!("bytes"),
        Type::Null => json!("null"),
        Type::Timestamp => json!("timestamp"),
        Type::Duration => json!("duration"),
        Type::List(elem) => json!({"kind": "list", "elementType": describe(elem)}),
        Type::Map(key, value) => json!({
            "kind": "map",
            "keyType": describe(key),
            "valueType": describe(value),
        }),
        Type::Optional(inner) => describe(inner),
        Type::Type(_) => json!("type"),
        Type::Dyn | Type::Error => json!("dyn"),
    }
}

/// Parse the short `name:type` form used on the command line, where `type`
/// is a primitive name or `list(T)` / `map(K, V)`.
pub fn parse_short(text: &str) -> Result<Type> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("list(").and_then(|t| t.strip_suffix(')')) {
        return Ok(Type::list(parse_short(inner)?));
    }
    if let Some(inner) = text.strip_prefix("map(").and_then(|t| t.strip_suffix(')')) {
        let (key, value) = split_top_level(inner)
            .ok_or_else(|| Error::InvalidType(format!("expected map(K, V), got '{}'", text)))?;
        return resolve(&json!({
            "kind": "map",
            "keyType": describe(&parse_short(key)?),
            "valueType": describe(&parse_short(value)?),
        }));
    }
    Ok(primitive(text))
}

/// Split `K, V` at the comma that is not nested inside parentheses.
fn split_top_level(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&text[..i], &text[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitives() {
        assert_eq!(resolve(&json!("int")).unwrap(), Type::Int);
        assert_eq!(resolve(&json!("any")).unwrap(), Type::Dyn);
        assert_eq!(resolve(&json!("dyn")).unwrap(), Type::Dyn);
        assert_eq!(resolve(&json!("null")).unwrap(), Type::Null);
        assert_eq!(resolve(&json!("timestamp")).unwrap(), Type::Timestamp);
    }

    #[test]
    fn test_unknown_resolves_to_dyn() {
        assert_eq!(resolve(&json!("quaternion")).unwrap(), Type::Dyn);
        assert_eq!(resolve(&json!(42)).unwrap(), Type::Dyn);
        assert_eq!(resolve(&json!({"kind": "tuple"})).unwrap(), Type::Dyn);
    }

    #[test]
    fn test_composites() {
        assert_eq!(
            resolve(&json!({"kind": "list", "elementType": "string"})).unwrap(),
            Type::list(Type::String)
        );
        assert_eq!(
            resolve(&json!({"kind": "map"})).unwrap(),
            Type::map(Type::String, Type::Dyn)
        );
        assert_eq!(
            resolve(&json!({"kind": "map", "keyType": "int", "valueType": {"kind": "list"}})).unwrap(),
            Type::map(Type::Int, Type::list(Type::Dyn))
        );
        assert_eq!(resolve(&json!({"type": "bool"})).unwrap(), Type::Bool);
        assert_eq!(resolve(&json!({"name": "uint"})).unwrap(), Type::Uint);
    }

    #[test]
    fn test_invalid_map_key() {
        assert!(matches!(
            resolve(&json!({"kind": "map", "keyType": "double"})),
            Err(Error::InvalidType(_))
        ));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&Type::list(Type::Int)),
            json!({"kind": "list", "elementType": "int"})
        );
        assert_eq!(
            describe(&Type::map(Type::String, Type::String)),
            json!({"kind": "map", "keyType": "string", "valueType": "string"})
        );
        assert_eq!(describe(&Type::Null), json!("null"));
        assert_eq!(describe(&Type::optional(Type::Int)), json!("int"));
    }

    #[test]
    fn test_describe_inverts_resolve() {
        for descriptor in [
            json!("bytes"),
            json!("duration"),
            json!({"kind": "list", "elementType": {"kind": "map", "keyType": "bool", "valueType": "double"}}),
        ] {
            assert_eq!(describe(&resolve(&descriptor).unwrap()), descriptor);
        }
    }

    #[test]
    fn test_parse_short() {
        assert_eq!(parse_short("int").unwrap(), Type::Int);
        assert_eq!(parse_short("list(string)").unwrap(), Type::list(Type::String));
        assert_eq!(
            parse_short("map(string, list(int))").unwrap(),
            Type::map(Type::String, Type::list(Type::Int))
        );
        assert!(parse_short("map(double, int)").is_err());
    }
}
