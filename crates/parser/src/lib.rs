//! Parser for the nexl expression language.
//!
//! A nexl expression lives inside a string template, enclosed in `${` and
//! `}`. The parser turns a raw template into a [`ChunkTemplate`] (literal
//! chunks interleaved with placeholder slots) and each embedded expression
//! into an [`ExpressionMd`] (an ordered list of actions). Evaluation of the
//! parsed metadata is the engine's job; this crate never touches a context.

pub mod ast;
pub mod error;
mod parser;

pub use ast::{
    Action, ArrayOpCode, CastKind, Chunk, ChunkTemplate, ExpressionMd, IndexBound, IndexRange,
    StringOpCode, TransformCode,
};
pub use error::ParseError;
pub use parser::{parse_expression, parse_template};
