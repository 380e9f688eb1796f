use crate::expression::{Environment, Expression, ExpressionError, ExpressionValue};
use thiserror::Error;

/// A keyword value as it appears in a persisted procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    List(Vec<KeywordValue>),
    Map(Vec<(String, KeywordValue)>),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeywordError {
    #[error("unrecognised keyword")]
    Unknown,
    #[error("{0}")]
    Invalid(String),
}

impl KeywordError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl KeywordValue {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn texts<S: AsRef<str>>(values: &[S]) -> Self {
        Self::List(values.iter().map(|s| Self::text(s.as_ref())).collect())
    }

    pub fn doubles(values: &[f64]) -> Self {
        Self::List(values.iter().map(|v| Self::Double(*v)).collect())
    }

    pub fn as_bool(&self) -> Result<bool, KeywordError> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(KeywordError::invalid(format!("expected a boolean, found {other:?}"))),
        }
    }

    pub fn as_text(&self) -> Result<&str, KeywordError> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(KeywordError::invalid(format!("expected a string, found {other:?}"))),
        }
    }

    pub fn as_f64(&self) -> Result<f64, KeywordError> {
        match self {
            Self::Integer(i) => Ok(*i as f64),
            Self::Double(d) => Ok(*d),
            other => Err(KeywordError::invalid(format!("expected a number, found {other:?}"))),
        }
    }

    pub fn as_integer(&self) -> Result<i64, KeywordError> {
        match self {
            Self::Integer(i) => Ok(*i),
            other => Err(KeywordError::invalid(format!("expected an integer, found {other:?}"))),
        }
    }

    pub fn as_list(&self) -> Result<&[KeywordValue], KeywordError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(KeywordError::invalid(format!("expected a list, found {other:?}"))),
        }
    }

    pub fn as_map(&self) -> Result<&[(String, KeywordValue)], KeywordError> {
        match self {
            Self::Map(entries) => Ok(entries),
            other => Err(KeywordError::invalid(format!("expected a table, found {other:?}"))),
        }
    }

    /// A list of strings. A bare string is accepted as a one-element list.
    pub fn as_texts(&self) -> Result<Vec<String>, KeywordError> {
        match self {
            Self::Text(s) => Ok(vec![s.clone()]),
            Self::List(items) => items.iter().map(|i| i.as_text().map(str::to_string)).collect(),
            other => Err(KeywordError::invalid(format!("expected strings, found {other:?}"))),
        }
    }

    /// A fixed-length numeric vector.
    pub fn as_f64_array<const N: usize>(&self) -> Result<[f64; N], KeywordError> {
        let items = self.as_list()?;
        if items.len() != N {
            return Err(KeywordError::invalid(format!(
                "expected {N} values, found {}",
                items.len()
            )));
        }
        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item.as_f64()?;
        }
        Ok(out)
    }

    /// Parses an enumerated option by case-insensitive name.
    pub fn as_option<T: Copy>(&self, options: &[(&str, T)]) -> Result<T, KeywordError> {
        let text = self.as_text()?;
        options
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                let names: Vec<&str> = options.iter().map(|(n, _)| *n).collect();
                KeywordError::invalid(format!("'{text}' is not one of {}", names.join(", ")))
            })
    }
}

/// Returns the name of `value` in an option table.
pub fn option_name<T: PartialEq>(options: &[(&'static str, T)], value: &T) -> &'static str {
    options
        .iter()
        .find(|(_, v)| v == value)
        .map(|(name, _)| *name)
        .unwrap_or("")
}

/// A numeric keyword that is either a literal or an expression evaluated at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    expression: Expression,
}

impl NodeValue {
    pub fn constant(value: impl Into<ExpressionValue>) -> Self {
        Self {
            expression: Expression::constant(value.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            expression: Expression::parse(text)?,
        })
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<ExpressionValue, ExpressionError> {
        self.expression.evaluate(env)
    }

    pub fn to_keyword(&self) -> KeywordValue {
        match self.expression.as_constant() {
            Some(ExpressionValue::Integer(i)) => KeywordValue::Integer(i),
            Some(ExpressionValue::Double(d)) => KeywordValue::Double(d),
            None => KeywordValue::Text(self.expression.text().to_string()),
        }
    }

    pub fn from_keyword(value: &KeywordValue) -> Result<Self, KeywordError> {
        match value {
            KeywordValue::Integer(i) => Ok(Self::constant(*i)),
            KeywordValue::Double(d) => Ok(Self::constant(*d)),
            KeywordValue::Text(text) => {
                Self::parse(text).map_err(|e| KeywordError::invalid(e.to_string()))
            }
            other => Err(KeywordError::invalid(format!(
                "expected a number or expression, found {other:?}"
            ))),
        }
    }
}

impl From<f64> for NodeValue {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<i64> for NodeValue {
    fn from(value: i64) -> Self {
        Self::constant(value)
    }
}
