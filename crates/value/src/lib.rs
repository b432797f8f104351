//! The dynamically-typed value model used throughout the nexl engine.
//!
//! Every piece of data the engine touches - source documents, contexts,
//! intermediate action results - is a [`Value`]. Mappings preserve insertion
//! order, which is observable through the key/value enumeration actions.

pub mod callable;
pub mod value;

pub use callable::{CallError, Callable};
pub use value::{Mapping, Value, deep_merge};
