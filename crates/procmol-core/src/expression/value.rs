use std::fmt;

/// The result of evaluating an expression.
///
/// Integer operands stay integral through `+ - * / % ^` where the result is representable;
/// any floating operand promotes the whole operation to `Double`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpressionValue {
    Integer(i64),
    Double(f64),
}

impl ExpressionValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Double(d) => d,
        }
    }

    /// Integer view of the value. Doubles qualify only when they carry no fractional part.
    pub fn as_integer(self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(i),
            Self::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => Some(d as i64),
            Self::Double(_) => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Integer(_))
    }

    pub fn is_truthy(self) -> bool {
        self.as_f64() != 0.0
    }

    pub(crate) fn from_bool(value: bool) -> Self {
        Self::Integer(value as i64)
    }
}

impl Default for ExpressionValue {
    fn default() -> Self {
        Self::Integer(0)
    }
}

impl From<i64> for ExpressionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ExpressionValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<usize> for ExpressionValue {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for ExpressionValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_integer_and_double_distinct() {
        assert_eq!(ExpressionValue::Integer(2).to_string(), "2");
        assert_eq!(ExpressionValue::Double(2.0).to_string(), "2.0");
        assert_eq!(ExpressionValue::Double(0.25).to_string(), "0.25");
    }

    #[test]
    fn integral_doubles_convert_to_integers() {
        assert_eq!(ExpressionValue::Double(4.0).as_integer(), Some(4));
        assert_eq!(ExpressionValue::Double(4.5).as_integer(), None);
        assert_eq!(ExpressionValue::Integer(-3).as_integer(), Some(-3));
    }
}
