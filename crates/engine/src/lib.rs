//! The nexl evaluation engine.
//!
//! Three components drive every evaluation: the tree walker recurses through
//! a value tree and hands string leaves to the chunk assembler; the assembler
//! evaluates each embedded `${...}` expression and cartesian-expands
//! multi-valued substitutions; the action evaluator reduces one expression's
//! action pipeline over a mutable current result, re-entering the walker for
//! deep resolution. Evaluation is synchronous and performs no I/O.

pub mod assemble;
pub mod cast;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod walker;

pub use error::NexlError;
pub use evaluator::ExpressionEvaluator;

use log::debug;
use nexl_functions::FunctionRegistry;
use nexl_value::{Mapping, Value};

/// Evaluates `item` against a context built from `source` merged with
/// `external_args`, using the default function library. When `item` is
/// `None`, the context's configured default expression is evaluated instead.
pub fn process_item(
    source: Mapping,
    item: Option<Value>,
    external_args: Option<Mapping>,
) -> Result<Value, NexlError> {
    process_item_with(source, item, external_args, &FunctionRegistry::default())
}

/// Same as [`process_item`] but with a caller-supplied function registry.
pub fn process_item_with(
    source: Mapping,
    item: Option<Value>,
    external_args: Option<Mapping>,
    registry: &FunctionRegistry,
) -> Result<Value, NexlError> {
    let context = context::build(source, external_args, registry);
    let item = match item {
        Some(Value::String(text)) => Value::String(context::replace_special_chars(&text)),
        Some(other) => other,
        None => Value::String(context::default_expression(&context)),
    };
    debug!("processing item [{item}]");
    walker::process(&context, context::evaluate_as_undefined(&context), &item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(json: &str) -> Mapping {
        match Value::from_json(&serde_json::from_str(json).unwrap()) {
            Value::Mapping(m) => m,
            other => panic!("expected an object source, got {other:?}"),
        }
    }

    #[test]
    fn test_process_item_end_to_end() {
        let result = process_item(
            source(r#"{"name": "world"}"#),
            Some(Value::String("hello ${name}".into())),
            None,
        )
        .unwrap();
        assert_eq!(result, Value::String("hello world".into()));
    }

    #[test]
    fn test_missing_item_uses_default_expression() {
        let result = process_item(
            source(r#"{"nexl": {"defaultExpression": "${greeting}"}, "greeting": "hi"}"#),
            None,
            None,
        )
        .unwrap();
        assert_eq!(result, Value::String("hi".into()));
    }

    #[test]
    fn test_special_chars_in_item_are_replaced() {
        let result = process_item(
            source(r#"{"a": "x"}"#),
            Some(Value::String(r"${a}\n${a}".into())),
            None,
        )
        .unwrap();
        assert_eq!(result, Value::String("x\nx".into()));
    }

    #[test]
    fn test_external_args_visible_to_expressions() {
        let mut args = Mapping::new();
        args.insert("env".into(), Value::String("prod".into()));
        let result = process_item(
            source("{}"),
            Some(Value::String("${env}".into())),
            Some(args),
        )
        .unwrap();
        assert_eq!(result, Value::String("prod".into()));
    }
}
