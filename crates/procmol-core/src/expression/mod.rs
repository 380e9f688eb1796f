//! The scalar expression language used by node keywords.
//!
//! Expressions are parsed once into a tree and evaluated any number of times. Variables are
//! resolved through an [`Environment`] at evaluation time, so a later change to a variable is
//! picked up without re-parsing.

pub mod ast;
pub mod error;
pub mod functions;
mod lexer;
mod parser;
pub mod value;

pub use error::ExpressionError;
pub use value::ExpressionValue;

use ast::ExprNode;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Supplies variable values and random draws to an evaluating expression.
pub trait Environment {
    fn lookup(&self, name: &str) -> Option<ExpressionValue>;

    /// Uniform draw in `[0, 1)`.
    fn random_uniform(&mut self) -> Result<f64, ExpressionError> {
        Err(ExpressionError::RandomUnavailable)
    }

    /// Uniform integer draw in `[low, high]`.
    fn random_integer(&mut self, _low: i64, _high: i64) -> Result<i64, ExpressionError> {
        Err(ExpressionError::RandomUnavailable)
    }
}

impl Environment for HashMap<String, ExpressionValue> {
    fn lookup(&self, name: &str) -> Option<ExpressionValue> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    text: String,
    root: ExprNode,
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let root = parser::parse(text)?;
        Ok(Self {
            text: text.trim().to_string(),
            root,
        })
    }

    pub fn constant(value: ExpressionValue) -> Self {
        Self {
            text: value.to_string(),
            root: ExprNode::Constant(value),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &ExprNode {
        &self.root
    }

    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<ExpressionValue, ExpressionError> {
        self.root.evaluate(env)
    }

    /// The value of the expression if it is a bare literal.
    pub fn as_constant(&self) -> Option<ExpressionValue> {
        match self.root {
            ExprNode::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Distinct variable names referenced, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.root.collect_variables(&mut names);
        names
    }

    pub fn uses_random(&self) -> bool {
        self.root.uses_random()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, ExpressionValue)]) -> HashMap<String, ExpressionValue> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn eval(text: &str) -> Result<ExpressionValue, ExpressionError> {
        Expression::parse(text)?.evaluate(&mut HashMap::new())
    }

    struct Counter {
        draws: i64,
    }

    impl Environment for Counter {
        fn lookup(&self, _name: &str) -> Option<ExpressionValue> {
            None
        }

        fn random_uniform(&mut self) -> Result<f64, ExpressionError> {
            self.draws += 1;
            Ok(0.25)
        }

        fn random_integer(&mut self, low: i64, _high: i64) -> Result<i64, ExpressionError> {
            self.draws += 1;
            Ok(low)
        }
    }

    mod arithmetic {
        use super::*;

        #[test]
        fn precedence_is_conventional() {
            assert_eq!(eval("1 + 2 * 3").unwrap(), ExpressionValue::Integer(7));
            assert_eq!(eval("(1 + 2) * 3").unwrap(), ExpressionValue::Integer(9));
            assert_eq!(eval("10 - 4 - 3").unwrap(), ExpressionValue::Integer(3));
        }

        #[test]
        fn power_is_right_associative_and_binds_tighter_than_negation() {
            assert_eq!(eval("2^3^2").unwrap(), ExpressionValue::Integer(512));
            assert_eq!(eval("-2^2").unwrap(), ExpressionValue::Integer(-4));
            assert_eq!(eval("2^-1").unwrap(), ExpressionValue::Double(0.5));
        }

        #[test]
        fn integer_division_truncates() {
            assert_eq!(eval("7 / 2").unwrap(), ExpressionValue::Integer(3));
            assert_eq!(eval("-7 / 2").unwrap(), ExpressionValue::Integer(-3));
            assert_eq!(eval("7 % 3").unwrap(), ExpressionValue::Integer(1));
        }

        #[test]
        fn double_operands_promote() {
            assert_eq!(eval("7.0 / 2").unwrap(), ExpressionValue::Double(3.5));
            assert_eq!(eval("1 + 0.5").unwrap(), ExpressionValue::Double(1.5));
        }

        #[test]
        fn integer_division_by_zero_is_an_error() {
            assert_eq!(eval("1 / 0").unwrap_err(), ExpressionError::DivisionByZero);
            assert_eq!(eval("1 % 0").unwrap_err(), ExpressionError::DivisionByZero);
            assert!(eval("1.0 / 0").unwrap().as_f64().is_infinite());
        }

        #[test]
        fn overflow_falls_back_to_double() {
            let v = eval("9223372036854775807 + 1").unwrap();
            assert!(!v.is_integer());
        }

        #[test]
        fn comparisons_and_logic_yield_integers() {
            assert_eq!(eval("2 < 3").unwrap(), ExpressionValue::Integer(1));
            assert_eq!(eval("2 >= 3").unwrap(), ExpressionValue::Integer(0));
            assert_eq!(eval("1 == 1.0").unwrap(), ExpressionValue::Integer(1));
            assert_eq!(eval("!(1 && 0) || 0").unwrap(), ExpressionValue::Integer(1));
        }

        #[test]
        fn functions_and_constants() {
            let v = eval("sqrt(16) + cos(0)").unwrap();
            assert_eq!(v, ExpressionValue::Double(5.0));
            let v = eval("2 * Pi").unwrap();
            assert!((v.as_f64() - 2.0 * std::f64::consts::PI).abs() < 1e-12);
            assert_eq!(eval("nint(2.6)").unwrap(), ExpressionValue::Integer(3));
        }
    }

    mod variables {
        use super::*;

        #[test]
        fn variables_resolve_at_evaluation_time() {
            let expr = Expression::parse("x * 3 + 1").unwrap();
            let mut env = vars(&[("x", ExpressionValue::Integer(2))]);
            assert_eq!(expr.evaluate(&mut env).unwrap(), ExpressionValue::Integer(7));

            env.insert("x".to_string(), ExpressionValue::Integer(10));
            assert_eq!(expr.evaluate(&mut env).unwrap(), ExpressionValue::Integer(31));
        }

        #[test]
        fn undefined_variable_is_reported_by_name() {
            let err = eval("a + 1").unwrap_err();
            assert_eq!(err, ExpressionError::UndefinedVariable("a".to_string()));
        }

        #[test]
        fn variable_names_are_listed_once_in_order() {
            let expr = Expression::parse("b * a + b").unwrap();
            assert_eq!(expr.variables(), vec!["b", "a"]);
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn wrong_arity_is_rejected_at_parse_time() {
            assert!(matches!(
                Expression::parse("sqrt(1, 2)"),
                Err(ExpressionError::Arity { function: "sqrt", .. })
            ));
        }

        #[test]
        fn unknown_function_is_rejected() {
            assert_eq!(
                Expression::parse("frob(1)").unwrap_err(),
                ExpressionError::UnknownFunction("frob".to_string())
            );
        }

        #[test]
        fn malformed_input_is_a_syntax_error() {
            assert!(matches!(Expression::parse(""), Err(ExpressionError::Syntax { .. })));
            assert!(matches!(Expression::parse("1 +"), Err(ExpressionError::Syntax { .. })));
            assert!(matches!(Expression::parse("(1"), Err(ExpressionError::Syntax { .. })));
            assert!(matches!(Expression::parse("1 2"), Err(ExpressionError::Syntax { .. })));
        }
    }

    mod random {
        use super::*;

        #[test]
        fn random_functions_draw_from_the_environment() {
            let expr = Expression::parse("rand() + randi(3, 9)").unwrap();
            assert!(expr.uses_random());
            let mut env = Counter { draws: 0 };
            assert_eq!(expr.evaluate(&mut env).unwrap(), ExpressionValue::Double(3.25));
            assert_eq!(env.draws, 2);
        }

        #[test]
        fn plain_expressions_do_not_use_random() {
            assert!(!Expression::parse("x + sin(y)").unwrap().uses_random());
        }
    }

    #[test]
    fn display_round_trips_the_source_text() {
        let expr: Expression = " x*3 + 1 ".parse().unwrap();
        assert_eq!(expr.to_string(), "x*3 + 1");
        assert_eq!(Expression::constant(ExpressionValue::Double(2.0)).to_string(), "2.0");
        assert_eq!(
            Expression::parse("4.5").unwrap().as_constant(),
            Some(ExpressionValue::Double(4.5))
        );
    }
}
