//! Operators applied to a `Process` node's data inside its `Normalisation` branch.

use super::{Bound, check_bound_expression};
use crate::core::utils::geometry::spherical_shell_volume;
use crate::expression::{Expression, ExpressionError};
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, NodeValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use crate::procedure::state::ProcessOperand;

const SELECT: &[NodeType] = &[NodeType::Select];
const DATA_VARIABLES: [&str; 4] = ["x", "y", "z", "value"];

#[derive(Debug)]
enum Operation {
    Divide(NodeValue),
    Multiply(NodeValue),
    Expression(Option<Expression>),
    SitePopulationNormalise(Vec<String>),
    NumberDensityNormalise(Vec<String>),
    SphericalShellNormalise,
}

/// One operation on the data currently being processed.
#[derive(Debug)]
pub struct Operate {
    operation: Operation,
}

impl Operate {
    /// # Panics
    ///
    /// Panics if `node_type` is not one of the operate types.
    pub fn new(node_type: NodeType) -> Self {
        let operation = match node_type {
            NodeType::OperateDivide => Operation::Divide(NodeValue::constant(1.0)),
            NodeType::OperateMultiply => Operation::Multiply(NodeValue::constant(1.0)),
            NodeType::OperateExpression => Operation::Expression(None),
            NodeType::OperateSitePopulationNormalise => {
                Operation::SitePopulationNormalise(Vec::new())
            }
            NodeType::OperateNumberDensityNormalise => {
                Operation::NumberDensityNormalise(Vec::new())
            }
            NodeType::OperateSphericalShellNormalise => Operation::SphericalShellNormalise,
            other => panic!("{other} is not an operate node type"),
        };
        Self { operation }
    }

    fn sites(&self) -> &[String] {
        match &self.operation {
            Operation::SitePopulationNormalise(sites) | Operation::NumberDensityNormalise(sites) => {
                sites
            }
            _ => &[],
        }
    }

    /// Average site count of each named selection.
    fn average_counts(&self, env: &NodeEnv<'_, '_>) -> Result<Vec<f64>, ProcedureError> {
        self.sites()
            .iter()
            .map(|name| {
                let average = env
                    .state
                    .outputs
                    .selection(name)
                    .ok_or_else(|| env.fail(format!("selection '{name}' has not been executed")))?
                    .average_count();
                if average > 0.0 {
                    Ok(average)
                } else {
                    Err(env.fail(format!("selection '{name}' has not selected any sites")))
                }
            })
            .collect()
    }
}

fn operand<'o>(
    operand: &'o mut Option<ProcessOperand>,
    name: &str,
) -> Result<&'o mut ProcessOperand, ProcedureError> {
    operand
        .as_mut()
        .ok_or_else(|| ProcedureError::state(name, "there is no data to operate on"))
}

impl NodeKind for Operate {
    fn node_type(&self) -> NodeType {
        match self.operation {
            Operation::Divide(_) => NodeType::OperateDivide,
            Operation::Multiply(_) => NodeType::OperateMultiply,
            Operation::Expression(_) => NodeType::OperateExpression,
            Operation::SitePopulationNormalise(_) => NodeType::OperateSitePopulationNormalise,
            Operation::NumberDensityNormalise(_) => NodeType::OperateNumberDensityNormalise,
            Operation::SphericalShellNormalise => NodeType::OperateSphericalShellNormalise,
        }
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        match &self.operation {
            Operation::Divide(value) | Operation::Multiply(value) => {
                vec![("Value", value.to_keyword())]
            }
            Operation::Expression(expression) => expression
                .iter()
                .map(|e| ("Expression", KeywordValue::text(e.text())))
                .collect(),
            Operation::SitePopulationNormalise(sites) | Operation::NumberDensityNormalise(sites) => {
                vec![("Site", KeywordValue::texts(sites))]
            }
            Operation::SphericalShellNormalise => Vec::new(),
        }
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match (&mut self.operation, keyword) {
            (Operation::Divide(v) | Operation::Multiply(v), "Value") => {
                *v = NodeValue::from_keyword(value)?;
            }
            (Operation::Expression(e), "Expression") => {
                let parsed = Expression::parse(value.as_text()?)
                    .map_err(|err| KeywordError::invalid(err.to_string()))?;
                *e = Some(parsed);
            }
            (
                Operation::SitePopulationNormalise(sites) | Operation::NumberDensityNormalise(sites),
                "Site",
            ) => *sites = value.as_texts()?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.sites()
            .iter()
            .map(|s| Reference::new("Site", s, SELECT))
            .collect()
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        match &self.operation {
            Operation::Expression(None) => Err(env.fail("no expression was given")),
            Operation::Expression(Some(expression)) => {
                let variables = env.state.variables.snapshot(env.scope);
                match check_bound_expression(expression, &variables, &DATA_VARIABLES) {
                    Ok(()) => Ok(()),
                    Err(ExpressionError::RandomUnavailable) => {
                        Err(env.fail("data expressions must not use random functions"))
                    }
                    Err(e) => Err(ProcedureError::argument(env.name, e)),
                }
            }
            Operation::SitePopulationNormalise(sites) | Operation::NumberDensityNormalise(sites)
                if sites.is_empty() =>
            {
                Err(env.fail("no sites were given"))
            }
            _ => Ok(()),
        }
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        match &self.operation {
            Operation::Divide(value) => {
                let divisor = env.evaluate_f64(value)?;
                if divisor == 0.0 {
                    return Err(env.fail("division by zero"));
                }
                operand(&mut env.state.outputs.operand, env.name)?
                    .data
                    .scale(1.0 / divisor);
            }
            Operation::Multiply(value) => {
                let factor = env.evaluate_f64(value)?;
                operand(&mut env.state.outputs.operand, env.name)?
                    .data
                    .scale(factor);
            }
            Operation::Expression(expression) => {
                let Some(expression) = expression else {
                    return Err(env.fail("no expression was given"));
                };
                let variables = env.state.variables.snapshot(env.scope);
                let target = operand(&mut env.state.outputs.operand, env.name)?;
                for index in 0..target.data.len() {
                    let [x, y, z] = target.data.point(index);
                    let value = target.data.values()[index];
                    let bound = [("x", x), ("y", y), ("z", z), ("value", value)];
                    let result = expression
                        .evaluate(&mut Bound::new(&variables, &bound))
                        .map_err(|e| ProcedureError::argument(env.name, e))?;
                    target.data.values_mut()[index] = result.as_f64();
                }
            }
            Operation::SitePopulationNormalise(_) => {
                let product: f64 = self.average_counts(env)?.into_iter().product();
                operand(&mut env.state.outputs.operand, env.name)?
                    .data
                    .scale(1.0 / product);
            }
            Operation::NumberDensityNormalise(_) => {
                let volume = env.ctx.configuration.simulation_box().volume();
                let averages = self.average_counts(env)?;
                let target = operand(&mut env.state.outputs.operand, env.name)?;
                for average in averages {
                    target.data.scale(volume / average);
                }
            }
            Operation::SphericalShellNormalise => {
                let target = operand(&mut env.state.outputs.operand, env.name)?;
                let [axis] = target.axes.as_slice() else {
                    return Err(ProcedureError::state(
                        env.name,
                        format!(
                            "spherical shell normalisation needs 1D data, found rank {}",
                            target.axes.len()
                        ),
                    ));
                };
                let volumes: Vec<f64> = (0..axis.n_bins())
                    .map(|i| {
                        let (inner, outer) = axis.bin_edges(i);
                        spherical_shell_volume(inner, outer)
                    })
                    .collect();
                for (value, volume) in target.data.values_mut().iter_mut().zip(volumes) {
                    *value /= volume;
                }
            }
        }
        Ok(())
    }
}
