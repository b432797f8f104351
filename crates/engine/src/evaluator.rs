//! The action evaluator: a left-to-right reduction of one expression's
//! action list over a mutable current result.
//!
//! The accumulator starts as the context; the first action resets it to
//! `Undefined` unless it is a property resolution, and a result that still
//! equals the context when the list ends collapses to `Undefined`. After
//! most actions the result is deep-resolved by re-running the tree walker,
//! because strings and containers produced mid-pipeline may themselves embed
//! further expressions.

use itertools::Itertools;
use nexl_parser::{
    Action, ArrayOpCode, ChunkTemplate, ExpressionMd, IndexBound, IndexRange, StringOpCode,
    TransformCode,
};
use nexl_value::{Mapping, Value};

use crate::error::NexlError;
use crate::{assemble, cast, format, walker};

/// True when the expression carries the `!` marker anywhere in its list.
pub fn has_undefined_marker(expression: &ExpressionMd) -> bool {
    expression
        .actions
        .iter()
        .any(|action| matches!(action, Action::EvaluateAsUndefined))
}

pub struct ExpressionEvaluator<'a> {
    context: &'a Value,
    expression: &'a ExpressionMd,
    evaluate_as_undefined: bool,
    result: Value,
    /// Rust has no reference identity on values, so "result is still the
    /// context" is tracked explicitly. Cleared on every replacement.
    result_is_context: bool,
    path_so_far: Vec<String>,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(context: &'a Value, expression: &'a ExpressionMd, evaluate_as_undefined: bool) -> Self {
        Self {
            context,
            expression,
            evaluate_as_undefined: evaluate_as_undefined || has_undefined_marker(expression),
            result: context.clone(),
            result_is_context: true,
            path_so_far: Vec::new(),
        }
    }

    pub fn eval(mut self) -> Result<Value, NexlError> {
        for (index, action) in self.expression.actions.iter().enumerate() {
            // The context is only a meaningful base for a leading lookup.
            if index == 0 && !matches!(action, Action::PropertyResolution(_)) {
                self.set(Value::Undefined);
            }

            let deep = self.apply(action)?;
            if deep && !self.result_is_context {
                self.result =
                    walker::process(self.context, self.evaluate_as_undefined, &self.result)?;
            }
        }

        if self.result_is_context {
            return Ok(Value::Undefined);
        }
        Ok(self.result)
    }

    /// Applies one action; the returned flag requests deep resolution.
    fn apply(&mut self, action: &Action) -> Result<bool, NexlError> {
        match action {
            Action::PropertyResolution(tmpl) => {
                self.resolve_property(tmpl)?;
                Ok(true)
            }
            Action::ArrayIndex(ranges) => {
                self.index(ranges)?;
                Ok(true)
            }
            Action::Function(params) => {
                self.call(params)?;
                Ok(true)
            }
            Action::DefValue(tmpl) => {
                if self.result.is_undefined() {
                    let fallback = self.assemble(tmpl)?;
                    self.set(fallback);
                }
                Ok(false)
            }
            Action::Cast(kind) => {
                if self.result.is_primitive() {
                    let current = self.take();
                    self.set(cast::cast(current, *kind));
                }
                Ok(true)
            }
            Action::Transformations(code) => self.transform(*code),
            Action::ObjectReverseResolution(tmpl) => {
                self.reverse_resolve(tmpl)?;
                Ok(true)
            }
            Action::ArrayOperations(code) => {
                self.array_op(*code);
                Ok(true)
            }
            Action::EliminateArrayElements(tmpl) => {
                self.eliminate(tmpl)?;
                Ok(true)
            }
            Action::AppendToArray(tmpl) => {
                self.append(tmpl)?;
                Ok(false)
            }
            Action::JoinArrayElements(tmpl) => {
                self.join(tmpl)?;
                Ok(false)
            }
            Action::StringOperations(code) => {
                self.string_op(*code);
                Ok(true)
            }
            // Scanned in the pre-pass, no runtime transform.
            Action::EvaluateAsUndefined => Ok(true),
            Action::MandatoryValue(custom) => {
                self.enforce_mandatory(custom.as_ref())?;
                Ok(false)
            }
            Action::Reserved(c) => Err(NexlError::ReservedAction {
                expression: self.expression.str.clone(),
                action: *c,
            }),
        }
    }

    fn assemble(&self, tmpl: &ChunkTemplate) -> Result<Value, NexlError> {
        assemble::assemble(self.context, self.evaluate_as_undefined, tmpl)
    }

    fn set(&mut self, value: Value) {
        self.result = value;
        self.result_is_context = false;
    }

    fn take(&mut self) -> Value {
        self.result_is_context = false;
        std::mem::take(&mut self.result)
    }

    fn path_label(&self, default: &str) -> String {
        if self.path_so_far.is_empty() {
            default.to_string()
        } else {
            self.path_so_far.iter().join(".")
        }
    }

    fn resolve_property(&mut self, tmpl: &ChunkTemplate) -> Result<(), NexlError> {
        let key = self.assemble(tmpl)?;
        match key {
            // An undefined key leaves the result untouched.
            Value::Undefined => {}
            Value::Sequence(keys) => {
                let resolved: Vec<Value> = keys.iter().map(|k| self.lookup(k)).collect();
                self.path_so_far.push("[]".to_string());
                self.set(Value::from_elements(resolved));
            }
            key if key.is_primitive() => {
                let key_text = key.to_string();
                let value = self.lookup(&key);
                self.path_so_far.push(key_text);
                self.set(value);
            }
            _ => self.set(Value::Undefined),
        }
        Ok(())
    }

    /// One key lookup against the current result. An undefined key inside a
    /// key sequence contributes the current result unchanged for its slot.
    fn lookup(&self, key: &Value) -> Value {
        match key {
            Value::Undefined => self.result.clone(),
            key if key.is_primitive() => match &self.result {
                Value::Mapping(entries) => entries
                    .get(&key.to_string())
                    .cloned()
                    .unwrap_or(Value::Undefined),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    fn index(&mut self, ranges: &[IndexRange]) -> Result<(), NexlError> {
        match self.result.clone() {
            Value::Sequence(items) => {
                let len = items.len() as i64;
                let mut selected = Vec::new();
                for range in ranges {
                    let min = self.resolve_bound(&range.min, len)?;
                    let max = self.resolve_bound(&range.max, len)?;
                    for i in min..=max {
                        // Out-of-bounds positions and undefined elements
                        // silently contribute nothing.
                        if i < 0 || i >= len || items[i as usize].is_undefined() {
                            continue;
                        }
                        selected.push(items[i as usize].clone());
                    }
                }
                self.set(if selected.is_empty() {
                    Value::Undefined
                } else {
                    Value::from_elements(selected)
                });
            }
            Value::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                let len = chars.len() as i64;
                let mut parts = Vec::new();
                for range in ranges {
                    let min = self.resolve_bound(&range.min, len)?.max(0);
                    let max = self.resolve_bound(&range.max, len)?.min(len - 1);
                    if min > max {
                        continue;
                    }
                    parts.push(Value::String(
                        chars[min as usize..=max as usize].iter().collect(),
                    ));
                }
                self.set(if parts.is_empty() {
                    Value::Undefined
                } else {
                    Value::from_elements(parts)
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolves an index bound against a container of `len` elements.
    /// Negative values count from the end.
    fn resolve_bound(&self, bound: &IndexBound, len: i64) -> Result<i64, NexlError> {
        let raw = match bound {
            IndexBound::First => 0,
            IndexBound::Last => len - 1,
            IndexBound::Literal(n) => *n,
            IndexBound::Expr(md) => {
                let value =
                    ExpressionEvaluator::new(self.context, md, self.evaluate_as_undefined).eval()?;
                let parsed = match &value {
                    Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                match parsed {
                    Some(n) => n,
                    None => {
                        return Err(NexlError::IndexType {
                            expression: md.str.clone(),
                            found: value.to_string(),
                        });
                    }
                }
            }
        };
        Ok(if raw < 0 { len + raw } else { raw })
    }

    fn call(&mut self, params: &[ExpressionMd]) -> Result<(), NexlError> {
        let mut args = Vec::with_capacity(params.len());
        for param in params {
            args.push(
                ExpressionEvaluator::new(self.context, param, self.evaluate_as_undefined).eval()?,
            );
        }
        // Calling a non-callable is a silent no-op.
        if let Value::Callable(callable) = &self.result {
            let value = callable
                .invoke(self.context, &args)
                .map_err(|source| NexlError::Function {
                    expression: self.expression.str.clone(),
                    source,
                })?;
            self.set(value);
        }
        Ok(())
    }

    fn transform(&mut self, code: TransformCode) -> Result<bool, NexlError> {
        match code {
            TransformCode::WrapArray => {
                if !self.result.is_sequence() {
                    let current = self.take();
                    self.set(Value::Sequence(vec![current]));
                }
                Ok(true)
            }
            TransformCode::WrapObject => {
                if !self.result.is_mapping() {
                    let label = self.path_label("obj");
                    let current = self.take();
                    let mut entries = Mapping::new();
                    entries.insert(label, current);
                    self.set(Value::Mapping(entries));
                }
                Ok(true)
            }
            TransformCode::Keys => {
                if let Value::Mapping(entries) = &self.result {
                    let keys = entries.keys().map(|k| Value::String(k.clone())).collect();
                    self.set(Value::from_elements(keys));
                }
                Ok(true)
            }
            TransformCode::Values => {
                if let Value::Mapping(entries) = &self.result {
                    let values = entries.values().cloned().collect();
                    self.set(Value::from_elements(values));
                }
                Ok(true)
            }
            TransformCode::KeyValueLines => {
                if let Some(entries) = self.deep_resolved_mapping()? {
                    self.set(Value::String(format::to_key_value_lines(&entries)));
                }
                Ok(false)
            }
            TransformCode::Xml => {
                if let Some(entries) = self.deep_resolved_mapping()? {
                    let root = self.path_label("root");
                    self.set(Value::String(format::to_xml(&root, &entries)?));
                }
                Ok(false)
            }
            TransformCode::Yaml => {
                if let Some(entries) = self.deep_resolved_mapping()? {
                    self.set(Value::String(format::to_yaml(&entries)?));
                }
                Ok(false)
            }
        }
    }

    /// Deep-resolves the current result ahead of serialization. `None` when
    /// the result is not a mapping, which makes the serializers no-ops.
    fn deep_resolved_mapping(&mut self) -> Result<Option<Mapping>, NexlError> {
        if !self.result.is_mapping() {
            return Ok(None);
        }
        let resolved = walker::process(self.context, self.evaluate_as_undefined, &self.result)?;
        match resolved {
            Value::Mapping(entries) => Ok(Some(entries)),
            _ => Ok(None),
        }
    }

    fn reverse_resolve(&mut self, tmpl: &ChunkTemplate) -> Result<(), NexlError> {
        let Some(entries) = self.deep_resolved_mapping()? else {
            return Ok(());
        };
        let candidates = self.assemble(tmpl)?.into_elements();
        let matches: Vec<Value> = entries
            .iter()
            .filter(|(_, value)| candidates.iter().any(|candidate| contains(value, candidate)))
            .map(|(key, _)| Value::String(key.clone()))
            .collect();
        self.set(if matches.is_empty() {
            Value::Undefined
        } else {
            Value::from_elements(matches)
        });
        Ok(())
    }

    fn array_op(&mut self, code: ArrayOpCode) {
        let Value::Sequence(items) = &self.result else {
            return;
        };
        let items = items.clone();
        match code {
            ArrayOpCode::SortAsc => {
                let mut items = items;
                items.sort_by(|a, b| a.total_cmp(b));
                self.set(Value::Sequence(items));
            }
            ArrayOpCode::SortDesc => {
                let mut items = items;
                items.sort_by(|a, b| a.total_cmp(b));
                items.reverse();
                self.set(Value::Sequence(items));
            }
            ArrayOpCode::Uniq => {
                let mut unique: Vec<Value> = Vec::new();
                for item in items {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                // Uniq never collapses a singleton; duplicates does.
                self.set(Value::Sequence(unique));
            }
            ArrayOpCode::Duplicates => {
                let mut duplicated: Vec<Value> = Vec::new();
                for item in &items {
                    let occurrences = items.iter().filter(|other| *other == item).count();
                    if occurrences > 1 && !duplicated.contains(item) {
                        duplicated.push(item.clone());
                    }
                }
                self.set(if duplicated.is_empty() {
                    Value::Undefined
                } else {
                    Value::from_elements(duplicated)
                });
            }
            ArrayOpCode::Length => self.set(Value::Number(items.len() as f64)),
        }
    }

    fn eliminate(&mut self, tmpl: &ChunkTemplate) -> Result<(), NexlError> {
        if !self.result.is_sequence() {
            return Ok(());
        }
        let targets = self.assemble(tmpl)?.into_elements();
        if let Value::Sequence(items) = &mut self.result {
            // One removal per target, first occurrence only.
            for target in &targets {
                if let Some(position) = items.iter().position(|item| item == target) {
                    items.remove(position);
                }
            }
            self.result_is_context = false;
        }
        if matches!(&self.result, Value::Sequence(items) if items.is_empty()) {
            self.set(Value::Undefined);
        }
        Ok(())
    }

    fn append(&mut self, tmpl: &ChunkTemplate) -> Result<(), NexlError> {
        if !self.result.is_sequence() {
            return Ok(());
        }
        let value = self.assemble(tmpl)?;
        if let Value::Sequence(items) = &mut self.result {
            match value {
                Value::Sequence(more) => items.extend(more),
                single => items.push(single),
            }
            self.result_is_context = false;
        }
        Ok(())
    }

    fn join(&mut self, tmpl: &ChunkTemplate) -> Result<(), NexlError> {
        if !self.result.is_sequence() {
            return Ok(());
        }
        let separator = self.assemble(tmpl)?;
        if !separator.is_primitive() {
            return Err(NexlError::JoinSeparatorType {
                expression: self.expression.str.clone(),
                found: separator.type_name(),
            });
        }
        let separator = separator.to_string();
        let joined = match &self.result {
            Value::Sequence(items) => items.iter().join(&separator),
            _ => return Ok(()),
        };
        self.set(Value::String(joined));
        Ok(())
    }

    fn string_op(&mut self, code: StringOpCode) {
        let Value::String(text) = &self.result else {
            return;
        };
        let value = match code {
            StringOpCode::Upper => Value::String(text.to_uppercase()),
            StringOpCode::UpperFirst => {
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => {
                        Value::String(first.to_uppercase().chain(chars).collect())
                    }
                    None => Value::String(String::new()),
                }
            }
            StringOpCode::Lower => Value::String(text.to_lowercase()),
            StringOpCode::Length => Value::Number(text.chars().count() as f64),
            StringOpCode::Trim => Value::String(text.trim().to_string()),
        };
        self.set(value);
    }

    fn enforce_mandatory(&mut self, custom: Option<&ChunkTemplate>) -> Result<(), NexlError> {
        if !self.result.is_undefined() {
            return Ok(());
        }
        let default_message = NexlError::default_mandatory_message(&self.expression.str);
        let Some(tmpl) = custom else {
            return Err(NexlError::MandatoryValue {
                message: default_message,
            });
        };
        match self.assemble(tmpl) {
            Ok(payload) => Err(NexlError::MandatoryValue {
                message: payload.to_string(),
            }),
            Err(inner) => Err(NexlError::MandatoryValue {
                message: format!(
                    "{default_message}; additionally the custom message [{}] failed to evaluate: {inner}",
                    tmpl.str
                ),
            }),
        }
    }
}

/// Recursive containment with exact equality at the leaves, used by the
/// reverse-resolution action.
fn contains(value: &Value, candidate: &Value) -> bool {
    if value == candidate {
        return true;
    }
    match value {
        Value::Sequence(items) => items.iter().any(|item| contains(item, candidate)),
        Value::Mapping(entries) => entries.values().any(|item| contains(item, candidate)),
        _ => false,
    }
}
