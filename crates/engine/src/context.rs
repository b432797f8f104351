//! Context construction and the reserved `nexl` namespace.
//!
//! The context is built once per top-level evaluation: caller-supplied
//! external arguments are deep-merged over the loaded source data, then the
//! reserved namespace is installed carrying the function library under
//! `nexl.funcs.sys` and the engine re-entry hook under `nexl.processItem`.
//! Pre-existing `nexl.defaultExpression` and `nexl.EVALUATE_AS_UNDEFINED`
//! entries are left untouched so sources can configure them.

use nexl_functions::FunctionRegistry;
use nexl_value::{CallError, Callable, Mapping, Value, deep_merge};

use crate::walker;

pub const NAMESPACE: &str = "nexl";
const FUNCS_KEY: &str = "funcs";
const SYS_KEY: &str = "sys";
const PROCESS_ITEM_KEY: &str = "processItem";
const DEFAULT_EXPRESSION_KEY: &str = "defaultExpression";
const EVALUATE_AS_UNDEFINED_KEY: &str = "EVALUATE_AS_UNDEFINED";

/// The item evaluated when the caller supplies none and the source does not
/// configure `nexl.defaultExpression`.
pub const DEFAULT_EXPRESSION: &str = "${}";

pub fn build(source: Mapping, external_args: Option<Mapping>, registry: &FunctionRegistry) -> Value {
    let mut context = source;
    if let Some(args) = &external_args {
        deep_merge(&mut context, args);
    }

    if !matches!(context.get(NAMESPACE), Some(Value::Mapping(_))) {
        context.insert(NAMESPACE.to_string(), Value::Mapping(Mapping::new()));
    }
    if let Some(Value::Mapping(nexl)) = context.get_mut(NAMESPACE) {
        if !matches!(nexl.get(FUNCS_KEY), Some(Value::Mapping(_))) {
            nexl.insert(FUNCS_KEY.to_string(), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(funcs)) = nexl.get_mut(FUNCS_KEY) {
            funcs.insert(SYS_KEY.to_string(), Value::Mapping(registry.as_mapping()));
        }
        nexl.insert(
            PROCESS_ITEM_KEY.to_string(),
            Value::Callable(Callable::new(reentry_hook)),
        );
    }

    Value::Mapping(context)
}

/// The `nexl.processItem` callable: evaluates an item against a scoped clone
/// of the calling context, optionally extended with extra arguments. The
/// overlay is never visible outside the call.
fn reentry_hook(receiver: &Value, args: &[Value]) -> Result<Value, CallError> {
    let Value::Mapping(base) = receiver else {
        return Ok(Value::Undefined);
    };
    let mut scoped = base.clone();
    if let Some(Value::Mapping(extra)) = args.get(1) {
        deep_merge(&mut scoped, extra);
    }
    let context = Value::Mapping(scoped);

    let item = match args.first() {
        Some(Value::String(text)) => Value::String(replace_special_chars(text)),
        Some(other) => other.clone(),
        None => Value::String(default_expression(&context)),
    };

    walker::process(&context, evaluate_as_undefined(&context), &item)
        .map_err(|e| CallError::new(e.to_string()))
}

pub fn default_expression(context: &Value) -> String {
    nexl_entry(context, DEFAULT_EXPRESSION_KEY)
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_EXPRESSION)
        .to_string()
}

pub fn evaluate_as_undefined(context: &Value) -> bool {
    matches!(
        nexl_entry(context, EVALUATE_AS_UNDEFINED_KEY),
        Some(Value::Bool(true))
    )
}

/// Replaces the literal two-character escape sequences `\n` and `\t` in an
/// item string with the characters they denote.
pub fn replace_special_chars(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\t", "\t")
}

fn nexl_entry<'a>(context: &'a Value, key: &str) -> Option<&'a Value> {
    context.as_mapping()?.get(NAMESPACE)?.as_mapping()?.get(key)
}
