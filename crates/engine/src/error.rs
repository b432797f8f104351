//! The engine error type.
//!
//! Every raised error aborts the whole top-level evaluation; there is no
//! partial recovery. Variants carry the originating expression or template
//! source text so failures can be traced back to the input.

use nexl_parser::ParseError;
use nexl_value::CallError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NexlError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Parser/engine contract violation, not a user error.
    #[error(
        "template [{template}] carries {placeholders} placeholder cell(s) but {substitutions} substitution(s)"
    )]
    ParseInvariant {
        template: String,
        placeholders: usize,
        substitutions: usize,
    },

    #[error(
        "the value of [{expression}] is of type [{found}] and cannot be substituted into a string template"
    )]
    SubstitutionType {
        expression: String,
        found: &'static str,
    },

    #[error("the key [{key}] evaluated to a value of type [{found}]; object keys must be primitive")]
    KeyType { key: String, found: &'static str },

    #[error("the array index in [{expression}] evaluated to [{found}]; indexes must be integers")]
    IndexType { expression: String, found: String },

    #[error(
        "the join separator in [{expression}] evaluated to a value of type [{found}]; the separator must be primitive"
    )]
    JoinSeparatorType {
        expression: String,
        found: &'static str,
    },

    #[error("{message}")]
    MandatoryValue { message: String },

    #[error(
        "the [{action}] action in [{expression}] is reserved; escape it with a backslash to use it as text"
    )]
    ReservedAction { expression: String, action: char },

    #[error("the function call in [{expression}] failed: {source}")]
    Function {
        expression: String,
        #[source]
        source: CallError,
    },

    #[error("xml serialization failed: {0}")]
    Xml(#[from] std::io::Error),

    #[error("xml output was not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("yaml serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NexlError {
    pub(crate) fn invariant(template: &nexl_parser::ChunkTemplate) -> Self {
        let placeholders = template
            .chunks
            .iter()
            .filter(|c| matches!(c, nexl_parser::Chunk::Placeholder))
            .count();
        NexlError::ParseInvariant {
            template: template.str.clone(),
            placeholders,
            substitutions: template.substitutions.len(),
        }
    }

    pub(crate) fn default_mandatory_message(expression: &str) -> String {
        format!("the expression [{expression}] is mandatory but evaluated to an undefined value")
    }
}
