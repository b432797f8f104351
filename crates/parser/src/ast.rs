//! Parsed expression metadata consumed by the evaluation engine.

use std::collections::BTreeMap;

/// One operation in an expression's left-to-right action pipeline.
///
/// The set of recognized actions is closed; any other unescaped action
/// character the parser encounters is carried through as [`Action::Reserved`]
/// and rejected at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `.key` - index the current result by an (itself templated) key.
    PropertyResolution(ChunkTemplate),
    /// `[a..b, c]` - select elements or substring ranges.
    ArrayIndex(Vec<IndexRange>),
    /// `(p1, p2)` - invoke the current result as a function.
    Function(Vec<ExpressionMd>),
    /// `@tmpl` - fallback when the current result is undefined.
    DefValue(ChunkTemplate),
    /// `:str`, `:num`, `:bool` - coerce the current result.
    Cast(CastKind),
    /// `~A`, `~O`, `~K`, `~V`, `~P`, `~X`, `~Y`.
    Transformations(TransformCode),
    /// `<tmpl` - find the keys whose values contain the given candidates.
    ObjectReverseResolution(ChunkTemplate),
    /// `#S`, `#s`, `#U`, `#D`, `#LEN`.
    ArrayOperations(ArrayOpCode),
    /// `-tmpl` - remove the first occurrence of each target element.
    EliminateArrayElements(ChunkTemplate),
    /// `+tmpl` - append a value or concatenate a sequence.
    AppendToArray(ChunkTemplate),
    /// `&tmpl` - join sequence elements with a primitive separator.
    JoinArrayElements(ChunkTemplate),
    /// `^U`, `^U1`, `^L`, `^LEN`, `^T`.
    StringOperations(StringOpCode),
    /// `!` - marker scanned in the pre-pass, no runtime transform.
    EvaluateAsUndefined,
    /// `*` with an optional custom-message template.
    MandatoryValue(Option<ChunkTemplate>),
    /// An action character reserved for future use.
    Reserved(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Str,
    Num,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformCode {
    /// Wrap into a one-element sequence.
    WrapArray,
    /// Wrap into a labelled object.
    WrapObject,
    /// Object keys.
    Keys,
    /// Object values.
    Values,
    /// Flattened `path=value` lines.
    KeyValueLines,
    /// XML serialization.
    Xml,
    /// YAML serialization.
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayOpCode {
    SortAsc,
    SortDesc,
    Uniq,
    Duplicates,
    Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOpCode {
    Upper,
    UpperFirst,
    Lower,
    Length,
    Trim,
}

/// One bound of an array-index range.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexBound {
    /// A literal index; negative values count from the end.
    Literal(i64),
    /// `^` - the first element.
    First,
    /// `$` - the last element.
    Last,
    /// A nested expression evaluating to an integer.
    Expr(Box<ExpressionMd>),
}

/// An inclusive `min..max` selection; a single index has `min == max`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRange {
    pub min: IndexBound,
    pub max: IndexBound,
}

/// A parsed nexl expression: its ordered action list plus the original
/// source text for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMd {
    pub actions: Vec<Action>,
    pub str: String,
}

/// One cell of a parsed string template.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Literal(String),
    Placeholder,
}

/// A literal-with-placeholders template.
///
/// Invariant: the number of `Placeholder` cells in `chunks` equals the number
/// of entries in `substitutions`, and every key of `substitutions` is the
/// index of a `Placeholder` cell. The parser guarantees this; the engine
/// treats a violation as an internal error.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTemplate {
    pub chunks: Vec<Chunk>,
    pub substitutions: BTreeMap<usize, ExpressionMd>,
    pub str: String,
}

impl ChunkTemplate {
    /// A template consisting of a single literal chunk.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            str: text.clone(),
            chunks: vec![Chunk::Literal(text)],
            substitutions: BTreeMap::new(),
        }
    }

    /// True when the template is one empty literal, i.e. no text at all.
    pub fn is_empty_literal(&self) -> bool {
        self.substitutions.is_empty()
            && matches!(self.chunks.as_slice(), [Chunk::Literal(s)] if s.is_empty())
    }
}
