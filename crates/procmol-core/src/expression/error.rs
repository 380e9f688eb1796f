use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} argument(s) but was given {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Integer division by zero")]
    DivisionByZero,

    #[error("Random functions are not available here")]
    RandomUnavailable,
}

impl ExpressionError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}
