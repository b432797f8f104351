//! nexl: an embeddable expression-substitution engine.
//!
//! Given a tree of strings, arrays and objects whose string leaves may embed
//! `${...}` expressions, the engine recursively evaluates every expression
//! against a data context and produces a fully-resolved value tree. It is
//! built for configuration generation, templated text and structured-data
//! queries over nested JSON-like data.
//!
//! ```
//! use nexl::Value;
//!
//! let source = serde_json::json!({"name": "world"});
//! let result = nexl::process_json(&source, "hello ${name}").unwrap();
//! assert_eq!(result, Value::String("hello world".into()));
//! ```

pub use nexl_engine::{NexlError, process_item, process_item_with};
pub use nexl_functions::FunctionRegistry;
pub use nexl_parser::{ParseError, parse_expression, parse_template};
pub use nexl_value::{CallError, Callable, Mapping, Value, deep_merge};

/// Convenience entry for JSON-loaded sources: converts `source` to the
/// engine's value model and evaluates `item` against it. A non-object source
/// behaves as an empty context.
pub fn process_json(source: &serde_json::Value, item: &str) -> Result<Value, NexlError> {
    let mapping = match Value::from_json(source) {
        Value::Mapping(m) => m,
        _ => Mapping::new(),
    };
    process_item(mapping, Some(Value::String(item.to_string())), None)
}
