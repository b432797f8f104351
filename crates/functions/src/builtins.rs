//! Built-in function implementations.
//!
//! Most functions are deliberately forgiving: handed a value of the wrong
//! type, they return it unchanged instead of failing, so expressions keep
//! flowing. The few hard errors (like a non-primitive object key) mirror the
//! places where silently continuing would corrupt data.

use log::debug;
use nexl_value::{CallError, Mapping, Value, deep_merge};
use regex::Regex;

use crate::FunctionRegistry;

pub fn register_all(registry: &mut FunctionRegistry) {
    registry.register("setArr", set_arr);
    registry.register("keys", keys);
    registry.register("vals", vals);
    registry.register("obj", obj);
    registry.register("arr", arr);
    registry.register("concat", concat);
    registry.register("setVal", set_val);
    registry.register("setKey", set_key);
    registry.register("makeObj", make_obj);
    registry.register("replaceAll", replace_all);
    registry.register("not", not);

    registry.register("isMatch", is_match);
    registry.register("isContains", is_contains);
    registry.register("isEquals", is_equals);
    registry.register("isEq", is_equals);
    registry.register("isGT", is_gt);
    registry.register("isLT", is_lt);
    registry.register("isGE", is_ge);
    registry.register("isLE", is_le);
    registry.register("isBool", is_bool);
    registry.register("isStr", is_str);
    registry.register("isNum", is_num);
    registry.register("isNull", is_null);
    registry.register("isUndefined", is_undefined);
    registry.register("isNaN", is_nan);
    registry.register("isPrimitive", is_primitive);
    registry.register("isArray", is_array);
    registry.register("isObject", is_object);

    registry.register("ifMatch", if_match);
    registry.register("ifNMatch", if_n_match);
    registry.register("ifMatchEx", if_match_ex);
    registry.register("ifNMatchEx", if_n_match_ex);
    registry.register("ifContains", if_contains);
    registry.register("ifNContains", if_n_contains);
    registry.register("ifEquals", if_equals);
    registry.register("ifNEquals", if_n_equals);
    registry.register("ifEq", if_equals);
    registry.register("ifNEq", if_n_equals);
    registry.register("ifGT", if_gt);
    registry.register("ifLT", if_lt);
    registry.register("ifGE", if_ge);
    registry.register("ifLE", if_le);
    registry.register("ifBool", if_bool);
    registry.register("ifNBool", if_n_bool);
    registry.register("ifStr", if_str);
    registry.register("ifNStr", if_n_str);
    registry.register("ifNum", if_num);
    registry.register("ifNNum", if_n_num);
    registry.register("ifNull", if_null);
    registry.register("ifNNull", if_n_null);
    registry.register("ifUndefined", if_undefined);
    registry.register("ifNUndefined", if_n_undefined);
    registry.register("ifNaN", if_nan);
    registry.register("ifNNaN", if_n_nan);
    registry.register("ifPrimitive", if_primitive);
    registry.register("ifNPrimitive", if_n_primitive);
    registry.register("ifArray", if_array);
    registry.register("ifNArray", if_n_array);
    registry.register("ifObject", if_object);
    registry.register("ifNObject", if_n_object);

    registry.register("inc", inc);
    registry.register("dec", dec);
    registry.register("div", div);
    registry.register("mult", mult);
    registry.register("mod", modulo);
}

// --- helpers ---

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn int_arg(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn build_regex(pattern: &str, flags: Option<&Value>) -> Result<Regex, CallError> {
    let mut prefix = String::new();
    if let Some(Value::String(flags)) = flags {
        let supported: String = flags
            .chars()
            .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
            .collect();
        if !supported.is_empty() {
            prefix = format!("(?{supported})");
        }
    }
    Regex::new(&format!("{prefix}{pattern}"))
        .map_err(|e| CallError::new(format!("Invalid regular expression [{pattern}]: {e}")))
}

/// Ordering used by the comparison functions: numeric when both sides are
/// numbers, lexicographic on the text form otherwise.
fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn branch(condition: bool, args: &[Value], then_idx: usize, else_idx: usize) -> Value {
    if condition {
        arg(args, then_idx)
    } else {
        arg(args, else_idx)
    }
}

// --- collection builders and editors ---

fn set_arr(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::Sequence(mut items) = entity else {
        return Ok(entity);
    };
    let Some(index) = int_arg(&arg(args, 1)).filter(|i| *i >= 0) else {
        return Ok(Value::Sequence(items));
    };
    let index = index as usize;
    while items.len() <= index {
        items.push(Value::Undefined);
    }
    items[index] = arg(args, 2);
    Ok(Value::Sequence(items))
}

fn keys_at_level(obj: &Mapping, level: i64) -> Vec<Value> {
    if level <= 0 {
        return obj.keys().map(|k| Value::String(k.clone())).collect();
    }
    let mut result = Vec::new();
    for value in obj.values() {
        if let Value::Mapping(nested) = value {
            result.extend(keys_at_level(nested, level - 1));
        }
    }
    result
}

fn vals_at_level(obj: &Mapping, level: i64) -> Vec<Value> {
    if level <= 0 {
        return obj.values().cloned().collect();
    }
    let mut result = Vec::new();
    for value in obj.values() {
        if let Value::Mapping(nested) = value {
            result.extend(vals_at_level(nested, level - 1));
        }
    }
    result
}

/// Key set of an object, optionally descending `level` nesting levels first.
fn keys(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::Mapping(obj) = &entity else {
        return Ok(entity);
    };
    let level = int_arg(&arg(args, 1)).unwrap_or(0);
    Ok(Value::Sequence(keys_at_level(obj, level)))
}

fn vals(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::Mapping(obj) = &entity else {
        return Ok(entity);
    };
    let level = int_arg(&arg(args, 1)).unwrap_or(0);
    Ok(Value::Sequence(vals_at_level(obj, level)))
}

/// Builds an object from alternating key/value arguments.
fn obj(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let mut result = Mapping::new();
    for (index, pair) in args.chunks(2).enumerate() {
        let key = &pair[0];
        if !key.is_primitive() {
            return Err(CallError::new(format!(
                "Object key must be a primitive type at [{}] position",
                index * 2
            )));
        }
        let value = pair.get(1).cloned().unwrap_or(Value::Undefined);
        result.insert(key.to_string(), value);
    }
    Ok(Value::Mapping(result))
}

fn arr(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Sequence(args.to_vec()))
}

fn concat(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let Some(first) = args.first() else {
        return Ok(Value::Undefined);
    };

    match first {
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            let mut result = String::new();
            for item in args {
                if !item.is_primitive() {
                    debug!("skipping non-primitive value in concat()");
                    continue;
                }
                result.push_str(&item.to_string());
            }
            Ok(Value::String(result))
        }
        Value::Sequence(_) => {
            let mut result = Vec::new();
            for item in args {
                match item {
                    Value::Sequence(items) => result.extend(items.iter().cloned()),
                    _ => debug!("skipping non-array value in concat()"),
                }
            }
            Ok(Value::Sequence(result))
        }
        Value::Mapping(_) => {
            let mut result = Mapping::new();
            for item in args {
                match item {
                    Value::Mapping(obj) => deep_merge(&mut result, obj),
                    _ => debug!("skipping non-object value in concat()"),
                }
            }
            Ok(Value::Mapping(result))
        }
        _ => Ok(Value::Undefined),
    }
}

fn set_val(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::Mapping(mut obj) = entity else {
        return Ok(entity);
    };
    obj.insert(arg(args, 1).to_string(), arg(args, 2));
    Ok(Value::Mapping(obj))
}

fn set_key(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::Mapping(mut obj) = entity else {
        return Ok(entity);
    };
    let current = arg(args, 1).to_string();
    if let Some(value) = obj.shift_remove(&current) {
        obj.insert(arg(args, 2).to_string(), value);
    }
    Ok(Value::Mapping(obj))
}

fn make_obj(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let key = arg(args, 0);
    let value = arg(args, 1);
    let mut result = Mapping::new();

    if key.is_primitive() {
        result.insert(key.to_string(), value);
    } else if let Value::Sequence(keys) = &key {
        for k in keys {
            if k.is_primitive() {
                result.insert(k.to_string(), value.clone());
            }
        }
    }

    Ok(Value::Mapping(result))
}

/// Replaces occurrences in a string (regex search) or array (exact match).
fn replace_all(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let search = arg(args, 1);
    let replacement = arg(args, 2);

    match entity {
        Value::Sequence(items) => Ok(Value::Sequence(
            items
                .into_iter()
                .map(|item| if item == search { replacement.clone() } else { item })
                .collect(),
        )),
        Value::String(s) => {
            let regex = build_regex(&search.to_string(), None)?;
            Ok(Value::String(
                regex.replace_all(&s, replacement.to_string()).into_owned(),
            ))
        }
        other => Ok(other),
    }
}

fn not(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    match arg(args, 0) {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

// --- predicates ---

fn is_match(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let Value::String(s) = &entity else {
        return Ok(entity);
    };
    let regex = build_regex(&arg(args, 1).to_string(), args.get(2))?;
    Ok(Value::Bool(regex.is_match(s)))
}

fn is_contains(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    let item = arg(args, 1);
    match &entity {
        Value::Sequence(items) => Ok(Value::Bool(items.contains(&item))),
        Value::String(s) => Ok(Value::Bool(s.contains(&item.to_string()))),
        _ => Ok(entity),
    }
}

fn is_equals(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(arg(args, 0) == arg(args, 1)))
}

fn is_gt(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(compare(&arg(args, 0), &arg(args, 1)).is_gt()))
}

fn is_lt(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(compare(&arg(args, 0), &arg(args, 1)).is_lt()))
}

fn is_ge(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(compare(&arg(args, 0), &arg(args, 1)).is_ge()))
}

fn is_le(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(compare(&arg(args, 0), &arg(args, 1)).is_le()))
}

fn is_bool(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Bool(_))))
}

fn is_str(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::String(_))))
}

fn is_num(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(_))))
}

fn is_null(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Null)))
}

fn is_undefined(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(arg(args, 0).is_undefined()))
}

fn is_nan(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
}

fn is_primitive(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(arg(args, 0).is_primitive()))
}

fn is_array(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(arg(args, 0).is_sequence()))
}

fn is_object(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(Value::Bool(arg(args, 0).is_mapping()))
}

// --- if* counterparts ---

fn if_match(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    if !matches!(entity, Value::String(_)) {
        return Ok(entity);
    }
    match is_match(recv, &args[..2.min(args.len())])? {
        Value::Bool(matched) => Ok(branch(matched, args, 2, 3)),
        other => Ok(other),
    }
}

fn if_n_match(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    if_match(recv, &swap_branches(args, 2, 3))
}

fn if_match_ex(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    if !matches!(entity, Value::String(_)) {
        return Ok(entity);
    }
    match is_match(recv, &args[..3.min(args.len())])? {
        Value::Bool(matched) => Ok(branch(matched, args, 3, 4)),
        other => Ok(other),
    }
}

fn if_n_match_ex(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    if_match_ex(recv, &swap_branches(args, 3, 4))
}

fn if_contains(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let entity = arg(args, 0);
    if !matches!(entity, Value::Sequence(_) | Value::String(_)) {
        return Ok(entity);
    }
    match is_contains(recv, &args[..2.min(args.len())])? {
        Value::Bool(contained) => Ok(branch(contained, args, 2, 3)),
        other => Ok(other),
    }
}

fn if_n_contains(recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    if_contains(recv, &swap_branches(args, 2, 3))
}

fn if_equals(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0) == arg(args, 1), args, 2, 3))
}

fn if_n_equals(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0) != arg(args, 1), args, 2, 3))
}

fn if_gt(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(compare(&arg(args, 0), &arg(args, 1)).is_gt(), args, 2, 3))
}

fn if_lt(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(compare(&arg(args, 0), &arg(args, 1)).is_lt(), args, 2, 3))
}

fn if_ge(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(compare(&arg(args, 0), &arg(args, 1)).is_ge(), args, 2, 3))
}

fn if_le(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(compare(&arg(args, 0), &arg(args, 1)).is_le(), args, 2, 3))
}

fn if_bool(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(matches!(arg(args, 0), Value::Bool(_)), args, 1, 2))
}

fn if_n_bool(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!matches!(arg(args, 0), Value::Bool(_)), args, 1, 2))
}

fn if_str(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(matches!(arg(args, 0), Value::String(_)), args, 1, 2))
}

fn if_n_str(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!matches!(arg(args, 0), Value::String(_)), args, 1, 2))
}

fn if_num(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(matches!(arg(args, 0), Value::Number(_)), args, 1, 2))
}

fn if_n_num(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!matches!(arg(args, 0), Value::Number(_)), args, 1, 2))
}

fn if_null(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(matches!(arg(args, 0), Value::Null), args, 1, 2))
}

fn if_n_null(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!matches!(arg(args, 0), Value::Null), args, 1, 2))
}

fn if_undefined(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0).is_undefined(), args, 1, 2))
}

fn if_n_undefined(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!arg(args, 0).is_undefined(), args, 1, 2))
}

fn if_nan(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let nan = matches!(arg(args, 0), Value::Number(n) if n.is_nan());
    Ok(branch(nan, args, 1, 2))
}

fn if_n_nan(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    let nan = matches!(arg(args, 0), Value::Number(n) if n.is_nan());
    Ok(branch(!nan, args, 1, 2))
}

fn if_primitive(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0).is_primitive(), args, 1, 2))
}

fn if_n_primitive(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!arg(args, 0).is_primitive(), args, 1, 2))
}

fn if_array(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0).is_sequence(), args, 1, 2))
}

fn if_n_array(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!arg(args, 0).is_sequence(), args, 1, 2))
}

fn if_object(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(arg(args, 0).is_mapping(), args, 1, 2))
}

fn if_n_object(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(branch(!arg(args, 0).is_mapping(), args, 1, 2))
}

fn swap_branches(args: &[Value], a: usize, b: usize) -> Vec<Value> {
    let mut swapped: Vec<Value> = args.to_vec();
    while swapped.len() <= b {
        swapped.push(Value::Undefined);
    }
    swapped.swap(a, b);
    swapped
}

// --- math ---

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn fold_numeric(args: &[Value], default_delta: Option<f64>, op: fn(f64, f64) -> f64) -> Value {
    let first = arg(args, 0);
    let Value::Number(start) = first else {
        return first;
    };

    let deltas: Vec<f64> = args[1..].iter().filter_map(numeric).collect();
    if deltas.is_empty() {
        return match default_delta {
            Some(delta) => Value::Number(op(start, delta)),
            None => Value::Number(start),
        };
    }

    Value::Number(deltas.into_iter().fold(start, op))
}

fn inc(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(fold_numeric(args, Some(1.0), |a, b| a + b))
}

fn dec(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(fold_numeric(args, Some(1.0), |a, b| a - b))
}

fn div(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(fold_numeric(args, None, |a, b| a / b))
}

fn mult(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(fold_numeric(args, None, |a, b| a * b))
}

fn modulo(_recv: &Value, args: &[Value]) -> Result<Value, CallError> {
    Ok(fold_numeric(args, None, |a, b| a % b))
}
