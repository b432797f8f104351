//! The library of named callables available inside nexl expressions.
//!
//! Functions are installed into the reserved `nexl.funcs.sys` namespace of
//! every evaluation context and invoked through the function action, with
//! the context as receiver and positional evaluated arguments.

mod builtins;

use nexl_value::{CallError, Callable, Mapping, Value};
use std::collections::HashMap;

/// The signature for a nexl function implementation. `receiver` is the
/// evaluation context root.
pub type NexlFunction = fn(receiver: &Value, args: &[Value]) -> Result<Value, CallError>;

/// A registry holding all functions available to the engine.
pub struct FunctionRegistry {
    functions: HashMap<String, NexlFunction>,
}

impl FunctionRegistry {
    /// Creates a new, empty function registry.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registers a function, replacing any previous one with the same name.
    pub fn register(&mut self, name: &str, func: NexlFunction) {
        self.functions.insert(name.to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<&NexlFunction> {
        self.functions.get(name)
    }

    /// Materializes the registry as a mapping of callable values, ready to
    /// be placed under the reserved namespace of a context.
    pub fn as_mapping(&self) -> Mapping {
        let mut entries: Vec<(&String, &NexlFunction)> = self.functions.iter().collect();
        entries.sort_by_key(|(name, _)| name.as_str());
        entries
            .into_iter()
            .map(|(name, func)| {
                let f = *func;
                (
                    name.clone(),
                    Value::Callable(Callable::new(move |recv, args| f(recv, args))),
                )
            })
            .collect()
    }
}

impl Default for FunctionRegistry {
    /// A registry populated with every built-in function.
    fn default() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        let registry = FunctionRegistry::default();
        let func = registry.get(name).unwrap_or_else(|| panic!("missing {name}"));
        func(&Value::Undefined, args).unwrap()
    }

    #[test]
    fn test_registry_exposes_builtins_as_callables() {
        let registry = FunctionRegistry::default();
        let mapping = registry.as_mapping();
        assert!(matches!(mapping.get("inc"), Some(Value::Callable(_))));
        assert!(matches!(mapping.get("ifEquals"), Some(Value::Callable(_))));
    }

    #[test]
    fn test_inc_and_dec() {
        assert_eq!(call("inc", &[Value::Number(4.0)]), Value::Number(5.0));
        assert_eq!(
            call("inc", &[Value::Number(4.0), Value::Number(10.0)]),
            Value::Number(14.0)
        );
        assert_eq!(call("dec", &[Value::Number(4.0)]), Value::Number(3.0));
        // Non-numbers pass through untouched.
        assert_eq!(call("inc", &[Value::String("x".into())]), Value::String("x".into()));
    }

    #[test]
    fn test_mult_div_mod() {
        assert_eq!(
            call("mult", &[Value::Number(3.0), Value::Number(4.0)]),
            Value::Number(12.0)
        );
        assert_eq!(
            call("div", &[Value::Number(12.0), Value::Number(4.0)]),
            Value::Number(3.0)
        );
        assert_eq!(
            call("mod", &[Value::Number(7.0), Value::Number(4.0)]),
            Value::Number(3.0)
        );
    }

    #[test]
    fn test_obj_and_arr() {
        let result = call(
            "obj",
            &[Value::String("a".into()), Value::Number(1.0)],
        );
        let mapping = result.as_mapping().unwrap();
        assert_eq!(mapping.get("a"), Some(&Value::Number(1.0)));

        let result = call("arr", &[Value::Number(1.0), Value::String("x".into())]);
        assert_eq!(
            result,
            Value::Sequence(vec![Value::Number(1.0), Value::String("x".into())])
        );
    }

    #[test]
    fn test_obj_rejects_non_primitive_key() {
        let registry = FunctionRegistry::default();
        let func = registry.get("obj").unwrap();
        let result = func(
            &Value::Undefined,
            &[Value::Sequence(vec![]), Value::Number(1.0)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_keys_and_vals_with_level() {
        let nested: Value = {
            let mut inner = Mapping::new();
            inner.insert("x".into(), Value::Number(1.0));
            inner.insert("y".into(), Value::Number(2.0));
            let mut outer = Mapping::new();
            outer.insert("a".into(), Value::Mapping(inner));
            Value::Mapping(outer)
        };
        assert_eq!(
            call("keys", &[nested.clone()]),
            Value::Sequence(vec![Value::String("a".into())])
        );
        assert_eq!(
            call("keys", &[nested.clone(), Value::Number(1.0)]),
            Value::Sequence(vec![Value::String("x".into()), Value::String("y".into())])
        );
        assert_eq!(
            call("vals", &[nested, Value::Number(1.0)]),
            Value::Sequence(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_concat_dispatches_on_first_argument() {
        assert_eq!(
            call(
                "concat",
                &[Value::String("a".into()), Value::Number(1.0), Value::Bool(true)]
            ),
            Value::String("a1true".into())
        );
        assert_eq!(
            call(
                "concat",
                &[
                    Value::Sequence(vec![Value::Number(1.0)]),
                    Value::Sequence(vec![Value::Number(2.0)])
                ]
            ),
            Value::Sequence(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_replace_all_on_string_and_array() {
        assert_eq!(
            call(
                "replaceAll",
                &[
                    Value::String("a-b-c".into()),
                    Value::String("-".into()),
                    Value::String("_".into())
                ]
            ),
            Value::String("a_b_c".into())
        );
        assert_eq!(
            call(
                "replaceAll",
                &[
                    Value::Sequence(vec![Value::Number(1.0), Value::Number(2.0)]),
                    Value::Number(2.0),
                    Value::Number(9.0)
                ]
            ),
            Value::Sequence(vec![Value::Number(1.0), Value::Number(9.0)])
        );
    }

    #[test]
    fn test_predicates() {
        assert_eq!(call("isNum", &[Value::Number(1.0)]), Value::Bool(true));
        assert_eq!(call("isStr", &[Value::Number(1.0)]), Value::Bool(false));
        assert_eq!(call("isUndefined", &[Value::Undefined]), Value::Bool(true));
        assert_eq!(call("isNull", &[Value::Null]), Value::Bool(true));
        assert_eq!(
            call("isGT", &[Value::Number(5.0), Value::Number(3.0)]),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                "isContains",
                &[Value::String("abc".into()), Value::String("b".into())]
            ),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                "isMatch",
                &[Value::String("host-1".into()), Value::String("^host".into())]
            ),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_if_family_selects_branch() {
        assert_eq!(
            call(
                "ifEquals",
                &[
                    Value::Number(1.0),
                    Value::Number(1.0),
                    Value::String("yes".into()),
                    Value::String("no".into())
                ]
            ),
            Value::String("yes".into())
        );
        assert_eq!(
            call(
                "ifUndefined",
                &[
                    Value::Number(1.0),
                    Value::String("yes".into()),
                    Value::String("no".into())
                ]
            ),
            Value::String("no".into())
        );
    }

    #[test]
    fn test_not_only_flips_booleans() {
        assert_eq!(call("not", &[Value::Bool(true)]), Value::Bool(false));
        assert_eq!(call("not", &[Value::Number(1.0)]), Value::Number(1.0));
    }

    #[test]
    fn test_set_val_and_set_key() {
        let mut m = Mapping::new();
        m.insert("a".into(), Value::Number(1.0));
        let obj = Value::Mapping(m);

        let result = call(
            "setVal",
            &[obj.clone(), Value::String("b".into()), Value::Number(2.0)],
        );
        assert_eq!(
            result.as_mapping().unwrap().get("b"),
            Some(&Value::Number(2.0))
        );

        let result = call(
            "setKey",
            &[obj, Value::String("a".into()), Value::String("z".into())],
        );
        let mapping = result.as_mapping().unwrap();
        assert!(mapping.get("a").is_none());
        assert_eq!(mapping.get("z"), Some(&Value::Number(1.0)));
    }
}
