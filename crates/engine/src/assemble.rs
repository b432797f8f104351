//! The chunk assembler: turns a parsed template plus its embedded
//! sub-expressions into concrete values, with cartesian expansion when a
//! substitution produces multiple candidates.

use itertools::Itertools;
use nexl_parser::{Chunk, ChunkTemplate, ExpressionMd};
use nexl_value::Value;

use crate::error::NexlError;
use crate::evaluator::{self, ExpressionEvaluator};

/// Assembles a template against the context.
///
/// A template that is a single whole-text substitution preserves the native
/// type of its evaluated expression; mixed templates stringify every cell.
/// A produced value equal to the context itself collapses to `Undefined`.
pub fn assemble(
    context: &Value,
    evaluate_as_undefined: bool,
    template: &ChunkTemplate,
) -> Result<Value, NexlError> {
    let placeholders = template
        .chunks
        .iter()
        .filter(|c| matches!(c, Chunk::Placeholder))
        .count();
    if placeholders != template.substitutions.len() {
        return Err(NexlError::invariant(template));
    }

    if template.chunks.is_empty() {
        return Ok(Value::Null);
    }

    if template.substitutions.is_empty() {
        return match template.chunks.as_slice() {
            [Chunk::Literal(text)] => Ok(Value::String(text.clone())),
            _ => Err(NexlError::invariant(template)),
        };
    }

    // A single substitution spanning the whole template keeps its native type.
    if let ([Chunk::Placeholder], Some(md)) =
        (template.chunks.as_slice(), template.substitutions.get(&0))
    {
        let value = eval_substitution(context, evaluate_as_undefined, md)?;
        return Ok(collapse_context(context, value));
    }

    let seed: Vec<Value> = template
        .chunks
        .iter()
        .map(|chunk| match chunk {
            Chunk::Literal(text) => Value::String(text.clone()),
            Chunk::Placeholder => Value::Undefined,
        })
        .collect();
    let mut combinations = vec![seed];

    for (&position, md) in &template.substitutions {
        let value = eval_substitution(context, evaluate_as_undefined, md)?;
        let effective =
            evaluate_as_undefined || evaluator::has_undefined_marker(md);

        if matches!(value, Value::Undefined | Value::Null) {
            if effective {
                return Ok(Value::Undefined);
            }
            return Err(NexlError::SubstitutionType {
                expression: md.str.clone(),
                found: value.type_name(),
            });
        }

        let candidates = substitutable_candidates(value, md)?;

        let mut expanded = Vec::with_capacity(combinations.len() * candidates.len());
        for combination in &combinations {
            for candidate in &candidates {
                let mut next = combination.clone();
                next[position] = candidate.clone();
                expanded.push(next);
            }
        }
        combinations = expanded;
    }

    let mut results = Vec::with_capacity(combinations.len());
    for mut combination in combinations {
        if combination.len() == 1 {
            results.push(combination.remove(0));
        } else {
            results.push(Value::String(combination.iter().join("")));
        }
    }

    Ok(collapse_context(context, Value::from_elements(results)))
}

fn eval_substitution(
    context: &Value,
    evaluate_as_undefined: bool,
    md: &ExpressionMd,
) -> Result<Value, NexlError> {
    ExpressionEvaluator::new(context, md, evaluate_as_undefined).eval()
}

/// Only primitives, or sequences of primitives, may be substituted into a
/// string template.
fn substitutable_candidates(value: Value, md: &ExpressionMd) -> Result<Vec<Value>, NexlError> {
    match value {
        Value::Sequence(items) => {
            for item in &items {
                if !item.is_primitive() {
                    return Err(NexlError::SubstitutionType {
                        expression: md.str.clone(),
                        found: item.type_name(),
                    });
                }
            }
            Ok(items)
        }
        value if value.is_primitive() => Ok(vec![value]),
        other => Err(NexlError::SubstitutionType {
            expression: md.str.clone(),
            found: other.type_name(),
        }),
    }
}

fn collapse_context(context: &Value, value: Value) -> Value {
    if &value == context {
        Value::Undefined
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use nexl_functions::FunctionRegistry;
    use nexl_parser::parse_template;

    fn test_context(json: &str) -> Value {
        let source = match Value::from_json(&serde_json::from_str(json).unwrap()) {
            Value::Mapping(m) => m,
            other => panic!("expected an object source, got {other:?}"),
        };
        context::build(source, None, &FunctionRegistry::default())
    }

    fn run(json: &str, text: &str) -> Result<Value, NexlError> {
        let ctx = test_context(json);
        assemble(&ctx, false, &parse_template(text).unwrap())
    }

    #[test]
    fn test_pure_literal_is_returned_verbatim() {
        assert_eq!(
            run("{}", "hello world").unwrap(),
            Value::String("hello world".into())
        );
    }

    #[test]
    fn test_whole_template_substitution_keeps_native_type() {
        assert_eq!(run(r#"{"n": 42}"#, "${n}").unwrap(), Value::Number(42.0));
        assert_eq!(run(r#"{"b": true}"#, "${b}").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_mixed_template_stringifies() {
        assert_eq!(
            run(r#"{"name": "world"}"#, "hello ${name}").unwrap(),
            Value::String("hello world".into())
        );
        assert_eq!(
            run(r#"{"n": 42}"#, "n=${n}").unwrap(),
            Value::String("n=42".into())
        );
    }

    #[test]
    fn test_cartesian_expansion_is_earlier_slot_major() {
        let result = run(r#"{"a": [1, 2], "b": [3, 4]}"#, "${a}-${b}").unwrap();
        assert_eq!(
            result,
            Value::Sequence(vec![
                Value::String("1-3".into()),
                Value::String("1-4".into()),
                Value::String("2-3".into()),
                Value::String("2-4".into()),
            ])
        );
    }

    #[test]
    fn test_undefined_substitution_is_an_error_without_flag() {
        let result = run("{}", "hello ${missing}");
        assert!(matches!(result, Err(NexlError::SubstitutionType { .. })));
    }

    #[test]
    fn test_undefined_marker_short_circuits_whole_template() {
        assert_eq!(run("{}", "hello ${missing!}").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_object_substitution_is_an_error() {
        let result = run(r#"{"obj": {"a": 1}}"#, "x ${obj}");
        assert!(matches!(result, Err(NexlError::SubstitutionType { .. })));
    }

    #[test]
    fn test_empty_expression_collapses_to_undefined() {
        // `${}` evaluates to the context itself, which the assembler folds
        // to Undefined rather than leaking the whole context.
        let ctx = test_context(r#"{"a": 1}"#);
        let result = assemble(&ctx, false, &parse_template("${}").unwrap()).unwrap();
        assert_eq!(result, Value::Undefined);
    }
}
