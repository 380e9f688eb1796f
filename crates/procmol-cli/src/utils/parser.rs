use procmol::expression::{Expression, ExpressionValue};
use procmol::procedure::config::FailurePolicy;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid assignment '{0}'. Expected 'KEY=VALUE'.")]
    InvalidAssignment(String),

    #[error("Invalid failure policy '{0}'. Expected 'abort' or 'continue'.")]
    InvalidFailurePolicy(String),

    #[error("Invalid value for variable '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("Variable '{0}' is defined more than once.")]
    DuplicateVariable(String),
}

/// Splits `KEY=VALUE` at the first `=`, trimming both sides.
pub fn parse_assignment(text: &str) -> Result<(&str, &str), ParseError> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidAssignment(text.to_string())),
    }
}

pub fn parse_failure_policy(text: &str) -> Result<FailurePolicy, ParseError> {
    match text.to_ascii_lowercase().as_str() {
        "abort" => Ok(FailurePolicy::Abort),
        "continue" => Ok(FailurePolicy::Continue),
        _ => Err(ParseError::InvalidFailurePolicy(text.to_string())),
    }
}

/// Builds a variable table from `name=value` definitions. Each value is itself an
/// expression, evaluated against the definitions before it.
pub fn parse_definitions(
    definitions: &[String],
) -> Result<HashMap<String, ExpressionValue>, ParseError> {
    let mut variables = HashMap::new();
    for definition in definitions {
        let (name, text) = parse_assignment(definition)?;
        let invalid = |message: String| ParseError::InvalidValue {
            name: name.to_string(),
            message,
        };
        let value = Expression::parse(text)
            .map_err(|e| invalid(e.to_string()))?
            .evaluate(&mut variables)
            .map_err(|e| invalid(e.to_string()))?;
        if variables.insert(name.to_string(), value).is_some() {
            return Err(ParseError::DuplicateVariable(name.to_string()));
        }
    }
    Ok(variables)
}
