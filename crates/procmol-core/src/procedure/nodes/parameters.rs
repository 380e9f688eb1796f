use crate::expression::ExpressionValue;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue, NodeValue};
use crate::procedure::node::{NodeEnv, NodeKind};
use crate::procedure::registry::NodeType;
use crate::procedure::scope::{ScopeError, ScopeId, VariableId, VariableStore};

/// Declares named variables in the scope of its sequence.
///
/// Values are re-evaluated on every prepare and execute. A value never sees its own
/// variable, so `n = n + 1` in a nested sequence reads the enclosing `n`.
#[derive(Debug, Default)]
pub struct Parameters {
    values: Vec<(String, NodeValue)>,
    handles: Vec<VariableId>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<NodeValue>) -> Self {
        self.values.push((name.to_string(), value.into()));
        self
    }

    fn update(&self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        for ((_, value), id) in self.values.iter().zip(&self.handles) {
            let result = {
                let mut scope_env = env
                    .state
                    .variables
                    .environment(env.scope, Some(&mut *env.ctx.random))
                    .excluding(*id);
                value
                    .evaluate(&mut scope_env)
                    .map_err(|e| ProcedureError::argument(env.name, e))?
            };
            env.set_variable(*id, result)?;
        }
        Ok(())
    }
}

impl NodeKind for Parameters {
    fn node_type(&self) -> NodeType {
        NodeType::Parameters
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        let map = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_keyword()))
            .collect();
        vec![("Parameters", KeywordValue::Map(map))]
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Parameters" => {
                self.values = value
                    .as_map()?
                    .iter()
                    .map(|(name, v)| Ok((name.clone(), NodeValue::from_keyword(v)?)))
                    .collect::<Result<_, KeywordError>>()?;
                Ok(())
            }
            _ => Err(KeywordError::Unknown),
        }
    }

    fn declare(
        &mut self,
        own: ScopeId,
        _branch: Option<ScopeId>,
        variables: &mut VariableStore,
    ) -> Result<(), ScopeError> {
        self.handles = self
            .values
            .iter()
            .map(|(name, value)| {
                let initial = value
                    .expression()
                    .as_constant()
                    .unwrap_or(ExpressionValue::Integer(0));
                variables.add_local_variable(own, name, initial)
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        self.update(env)
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        self.update(env)
    }
}
