//! The tree walker: the top-level recursive dispatcher over a value tree.
//!
//! Strings are handed to the chunk assembler; sequences and mappings are
//! rebuilt entry by entry with the evaluate-as-undefined drop and one-level
//! flattening rules applied; everything else passes through unchanged.

use nexl_value::{Mapping, Value};

use crate::assemble;
use crate::error::NexlError;

pub fn process(
    context: &Value,
    evaluate_as_undefined: bool,
    value: &Value,
) -> Result<Value, NexlError> {
    match value {
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match process(context, evaluate_as_undefined, item)? {
                    Value::Undefined if evaluate_as_undefined => {}
                    // One level of flattening: a sequence-producing element
                    // splices its members into the parent.
                    Value::Sequence(nested) => out.extend(nested),
                    single => out.push(single),
                }
            }
            Ok(Value::Sequence(out))
        }
        Value::Mapping(entries) => {
            let mut out = Mapping::new();
            for (key, item) in entries {
                let key_value =
                    process(context, evaluate_as_undefined, &Value::String(key.clone()))?;
                if key_value.is_undefined() && evaluate_as_undefined {
                    continue;
                }
                if !key_value.is_primitive() {
                    return Err(NexlError::KeyType {
                        key: key.clone(),
                        found: key_value.type_name(),
                    });
                }
                let item_value = process(context, evaluate_as_undefined, item)?;
                if item_value.is_undefined() && evaluate_as_undefined {
                    continue;
                }
                out.insert(key_value.to_string(), item_value);
            }
            Ok(Value::Mapping(out))
        }
        Value::String(text) => {
            let template = nexl_parser::parse_template(text)?;
            assemble::assemble(context, evaluate_as_undefined, &template)
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use nexl_functions::FunctionRegistry;

    fn test_context(json: &str) -> Value {
        let source = match Value::from_json(&serde_json::from_str(json).unwrap()) {
            Value::Mapping(m) => m,
            other => panic!("expected an object source, got {other:?}"),
        };
        context::build(source, None, &FunctionRegistry::default())
    }

    #[test]
    fn test_literal_strings_pass_through() {
        let ctx = test_context(r#"{"a": 1}"#);
        let result = process(&ctx, false, &Value::String("plain text".into())).unwrap();
        assert_eq!(result, Value::String("plain text".into()));
    }

    #[test]
    fn test_scalars_pass_through() {
        let ctx = test_context("{}");
        assert_eq!(process(&ctx, false, &Value::Number(5.0)).unwrap(), Value::Number(5.0));
        assert_eq!(process(&ctx, false, &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_sequence_elements_are_processed_and_spliced() {
        let ctx = test_context(r#"{"pair": [1, 2]}"#);
        let input = Value::Sequence(vec![
            Value::String("${pair}".into()),
            Value::String("x".into()),
        ]);
        let result = process(&ctx, false, &input).unwrap();
        assert_eq!(
            result,
            Value::Sequence(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::String("x".into())
            ])
        );
    }

    #[test]
    fn test_undefined_elements_dropped_under_flag() {
        let ctx = test_context("{}");
        let input = Value::Sequence(vec![
            Value::String("${missing!}".into()),
            Value::String("kept".into()),
        ]);
        let result = process(&ctx, true, &input).unwrap();
        assert_eq!(result, Value::Sequence(vec![Value::String("kept".into())]));
    }

    #[test]
    fn test_mapping_keys_are_evaluated() {
        let ctx = test_context(r#"{"env": "prod"}"#);
        let mut entries = Mapping::new();
        entries.insert("${env}".into(), Value::String("${env}-value".into()));
        let result = process(&ctx, false, &Value::Mapping(entries)).unwrap();
        let mapping = result.as_mapping().unwrap();
        assert_eq!(
            mapping.get("prod"),
            Some(&Value::String("prod-value".into()))
        );
    }

    #[test]
    fn test_non_primitive_key_is_an_error() {
        let ctx = test_context(r#"{"obj": {"a": 1}}"#);
        let mut entries = Mapping::new();
        entries.insert("${obj}".into(), Value::Number(1.0));
        let result = process(&ctx, false, &Value::Mapping(entries));
        assert!(matches!(result, Err(NexlError::KeyType { .. })));
    }
}
