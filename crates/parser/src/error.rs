use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("Parse error in [{expression}]: {message}")]
    Syntax { expression: String, message: String },

    #[error("Unterminated expression in [{expression}]: missing closing '}}'")]
    Unterminated { expression: String },
}

impl ParseError {
    pub fn syntax(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.into(),
            message: message.into(),
        }
    }
}
