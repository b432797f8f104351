//! Primitive type coercion for the cast action.

use nexl_parser::CastKind;
use nexl_value::Value;

/// Coerces a primitive value to the requested kind. A coercion that cannot
/// be performed yields `Undefined`; non-primitive input passes through
/// unchanged.
pub fn cast(value: Value, kind: CastKind) -> Value {
    if !value.is_primitive() {
        return value;
    }
    match kind {
        CastKind::Str => Value::String(value.to_string()),
        CastKind::Num => match &value {
            Value::Number(_) => value,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        },
        CastKind::Bool => match &value {
            Value::Bool(_) => value,
            Value::String(s) => match s.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        },
    }
}
