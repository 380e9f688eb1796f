use super::Environment;
use super::error::ExpressionError;
use super::functions::Function;
use super::value::ExpressionValue;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Constant(ExpressionValue),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    Binary {
        lhs: Box<ExprNode>,
        op: BinaryOp,
        rhs: Box<ExprNode>,
    },
    Call {
        function: Function,
        args: Vec<ExprNode>,
    },
}

impl ExprNode {
    pub(crate) fn evaluate(
        &self,
        env: &mut dyn Environment,
    ) -> Result<ExpressionValue, ExpressionError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::Variable(name) => env
                .lookup(name)
                .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone())),
            Self::Unary { op, operand } => {
                let value = operand.evaluate(env)?;
                Ok(match op {
                    UnaryOp::Negate => match value {
                        ExpressionValue::Integer(i) => i
                            .checked_neg()
                            .map(ExpressionValue::Integer)
                            .unwrap_or(ExpressionValue::Double(-(i as f64))),
                        ExpressionValue::Double(d) => ExpressionValue::Double(-d),
                    },
                    UnaryOp::Not => ExpressionValue::from_bool(!value.is_truthy()),
                })
            }
            Self::Binary { lhs, op, rhs } => match op {
                BinaryOp::And => {
                    let result = lhs.evaluate(env)?.is_truthy() && rhs.evaluate(env)?.is_truthy();
                    Ok(ExpressionValue::from_bool(result))
                }
                BinaryOp::Or => {
                    let result = lhs.evaluate(env)?.is_truthy() || rhs.evaluate(env)?.is_truthy();
                    Ok(ExpressionValue::from_bool(result))
                }
                _ => {
                    let l = lhs.evaluate(env)?;
                    let r = rhs.evaluate(env)?;
                    apply_binary(*op, l, r)
                }
            },
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate(env))
                    .collect::<Result<Vec<_>, _>>()?;
                function.evaluate(&values, env)
            }
        }
    }

    pub(crate) fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Constant(_) => {}
            Self::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Self::Unary { operand, .. } => operand.collect_variables(names),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Self::Call { args, .. } => args.iter().for_each(|a| a.collect_variables(names)),
        }
    }

    pub(crate) fn uses_random(&self) -> bool {
        match self {
            Self::Constant(_) | Self::Variable(_) => false,
            Self::Unary { operand, .. } => operand.uses_random(),
            Self::Binary { lhs, rhs, .. } => lhs.uses_random() || rhs.uses_random(),
            Self::Call { function, args } => {
                function.is_random() || args.iter().any(ExprNode::uses_random)
            }
        }
    }
}

fn apply_binary(
    op: BinaryOp,
    l: ExpressionValue,
    r: ExpressionValue,
) -> Result<ExpressionValue, ExpressionError> {
    use ExpressionValue::{Double, Integer};

    let integers = match (l, r) {
        (Integer(a), Integer(b)) => Some((a, b)),
        _ => None,
    };
    let (x, y) = (l.as_f64(), r.as_f64());

    let value = match op {
        BinaryOp::Add => integers
            .and_then(|(a, b)| a.checked_add(b))
            .map(Integer)
            .unwrap_or(Double(x + y)),
        BinaryOp::Subtract => integers
            .and_then(|(a, b)| a.checked_sub(b))
            .map(Integer)
            .unwrap_or(Double(x - y)),
        BinaryOp::Multiply => integers
            .and_then(|(a, b)| a.checked_mul(b))
            .map(Integer)
            .unwrap_or(Double(x * y)),
        BinaryOp::Divide => match integers {
            Some((_, 0)) => return Err(ExpressionError::DivisionByZero),
            Some((a, b)) => a.checked_div(b).map(Integer).unwrap_or(Double(x / y)),
            None => Double(x / y),
        },
        BinaryOp::Modulo => match integers {
            Some((_, 0)) => return Err(ExpressionError::DivisionByZero),
            Some((a, b)) => a.checked_rem(b).map(Integer).unwrap_or(Double(x % y)),
            None => Double(x % y),
        },
        BinaryOp::Power => integers
            .and_then(|(a, b)| u32::try_from(b).ok().and_then(|e| a.checked_pow(e)))
            .map(Integer)
            .unwrap_or(Double(x.powf(y))),
        BinaryOp::Equal => ExpressionValue::from_bool(compare(l, r).is_some_and(Ordering::is_eq)),
        BinaryOp::NotEqual => {
            ExpressionValue::from_bool(!compare(l, r).is_some_and(Ordering::is_eq))
        }
        BinaryOp::Less => ExpressionValue::from_bool(compare(l, r).is_some_and(Ordering::is_lt)),
        BinaryOp::LessEqual => {
            ExpressionValue::from_bool(compare(l, r).is_some_and(Ordering::is_le))
        }
        BinaryOp::Greater => {
            ExpressionValue::from_bool(compare(l, r).is_some_and(Ordering::is_gt))
        }
        BinaryOp::GreaterEqual => {
            ExpressionValue::from_bool(compare(l, r).is_some_and(Ordering::is_ge))
        }
        BinaryOp::And | BinaryOp::Or => {
            ExpressionValue::from_bool(match op {
                BinaryOp::And => l.is_truthy() && r.is_truthy(),
                _ => l.is_truthy() || r.is_truthy(),
            })
        }
    };
    Ok(value)
}

/// Orders two values; `None` when either side is NaN.
fn compare(l: ExpressionValue, r: ExpressionValue) -> Option<Ordering> {
    match (l, r) {
        (ExpressionValue::Integer(a), ExpressionValue::Integer(b)) => Some(a.cmp(&b)),
        _ => l.as_f64().partial_cmp(&r.as_f64()),
    }
}
