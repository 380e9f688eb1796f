//! Concrete node types.
//!
//! Each node owns its keyword values and, for flow-control types, a branch [`Sequence`].
//! Results meant for other nodes are published to
//! [`NodeOutputs`](super::state::NodeOutputs) under the node's name.
//!
//! [`Sequence`]: super::sequence::Sequence

pub mod add;
pub mod calculate;
pub mod collect;
pub mod configuration;
pub mod copy;
pub mod import;
pub mod iterate;
pub mod module;
pub mod operate;
pub mod parameters;
pub mod pick;
pub mod process;
pub mod region;
pub mod remove;
pub mod select;

use super::keywords::{KeywordError, KeywordValue, NodeValue};
use crate::expression::{Environment, Expression, ExpressionError, ExpressionValue};
use std::collections::HashMap;

pub(crate) fn node_values<const N: usize>(
    value: &KeywordValue,
) -> Result<[NodeValue; N], KeywordError> {
    let items = value.as_list()?;
    let values = items
        .iter()
        .map(NodeValue::from_keyword)
        .collect::<Result<Vec<_>, _>>()?;
    let found = values.len();
    values
        .try_into()
        .map_err(|_| KeywordError::invalid(format!("expected {N} values, found {found}")))
}

pub(crate) fn node_values_keyword(values: &[NodeValue]) -> KeywordValue {
    KeywordValue::List(values.iter().map(NodeValue::to_keyword).collect())
}

pub(crate) fn optional_text(value: &KeywordValue) -> Result<Option<String>, KeywordError> {
    let text = value.as_text()?;
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Fixed numeric bindings layered over a snapshot of the visible variables.
///
/// Random functions are unavailable, so evaluation is safe to repeat from any thread.
pub(crate) struct Bound<'s> {
    variables: &'s HashMap<String, ExpressionValue>,
    bound: &'s [(&'static str, f64)],
}

impl<'s> Bound<'s> {
    pub(crate) fn new(
        variables: &'s HashMap<String, ExpressionValue>,
        bound: &'s [(&'static str, f64)],
    ) -> Self {
        Self { variables, bound }
    }
}

impl Environment for Bound<'_> {
    fn lookup(&self, name: &str) -> Option<ExpressionValue> {
        self.bound
            .iter()
            .find(|(bound, _)| *bound == name)
            .map(|(_, value)| ExpressionValue::Double(*value))
            .or_else(|| self.variables.get(name).copied())
    }
}

/// Checks that `expression` avoids random functions and only uses `bound` names or
/// variables present in `variables`.
pub(crate) fn check_bound_expression(
    expression: &Expression,
    variables: &HashMap<String, ExpressionValue>,
    bound: &[&str],
) -> Result<(), ExpressionError> {
    if expression.uses_random() {
        return Err(ExpressionError::RandomUnavailable);
    }
    match expression
        .variables()
        .into_iter()
        .find(|name| !bound.contains(name) && !variables.contains_key(*name))
    {
        Some(name) => Err(ExpressionError::UndefinedVariable(name.to_string())),
        None => Ok(()),
    }
}
