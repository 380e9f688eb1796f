use super::optional_text;
use crate::procedure::error::ProcedureError;
use crate::procedure::keywords::{KeywordError, KeywordValue};
use crate::procedure::node::{NodeEnv, NodeKind, Reference};
use crate::procedure::registry::NodeType;
use crate::procedure::scope::{ScopeError, ScopeId, VariableId, VariableStore};
use crate::procedure::sequence::Sequence;

const SELECT: &[NodeType] = &[NodeType::Select];

#[derive(Debug, Clone, Copy)]
struct LoopVariables {
    index: VariableId,
    site_index: VariableId,
    stack_index: VariableId,
    n_selected: VariableId,
}

/// Runs its `ForEach` branch once per site of a `Select`, binding that site as current.
#[derive(Debug)]
pub struct IterateSelection {
    selection: Option<String>,
    for_each: Sequence,
    variables: Option<LoopVariables>,
}

impl IterateSelection {
    pub fn new() -> Self {
        Self {
            selection: None,
            for_each: Sequence::branch("ForEach"),
            variables: None,
        }
    }

    fn run(&mut self, env: &mut NodeEnv<'_, '_>, selection: &str) -> Result<(), ProcedureError> {
        let variables = self
            .variables
            .ok_or(ProcedureError::NotValidated)?;
        let sites = env
            .state
            .outputs
            .selection(selection)
            .map(|s| s.sites.clone())
            .ok_or_else(|| env.fail(format!("selection '{selection}' has not been executed")))?;

        env.set_variable(variables.n_selected, sites.len())?;
        for (i, site) in sites.iter().enumerate() {
            env.state.outputs.selection_mut(selection).current = Some(i);
            env.set_variable(variables.index, i + 1)?;
            env.set_variable(variables.site_index, site.site_index)?;
            env.set_variable(variables.stack_index, site.stack_index)?;
            env.run_branch(&mut self.for_each)?;
        }
        Ok(())
    }
}

impl Default for IterateSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeKind for IterateSelection {
    fn node_type(&self) -> NodeType {
        NodeType::IterateSelection
    }

    fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        self.selection
            .iter()
            .map(|s| ("Selection", KeywordValue::text(s)))
            .collect()
    }

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError> {
        match keyword {
            "Selection" => self.selection = optional_text(value)?,
            _ => return Err(KeywordError::Unknown),
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        self.selection
            .iter()
            .map(|s| Reference::new("Selection", s, SELECT))
            .collect()
    }

    fn branch(&self) -> Option<&Sequence> {
        Some(&self.for_each)
    }

    fn branch_mut(&mut self) -> Option<&mut Sequence> {
        Some(&mut self.for_each)
    }

    fn declare(
        &mut self,
        _own: ScopeId,
        branch: Option<ScopeId>,
        variables: &mut VariableStore,
    ) -> Result<(), ScopeError> {
        let scope = branch.ok_or(ScopeError::UnknownScope)?;
        let mut add = |name: &str| variables.add_local_variable(scope, name, 0.into());
        self.variables = Some(LoopVariables {
            index: add("index")?,
            site_index: add("siteIndex")?,
            stack_index: add("stackIndex")?,
            n_selected: add("nSelected")?,
        });
        Ok(())
    }

    fn prepare(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        if self.selection.is_none() {
            return Err(env.fail("no selection was given"));
        }
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        let selection = self.selection.clone().unwrap_or_default();
        let previous = env
            .state
            .outputs
            .selection(&selection)
            .and_then(|s| s.current);
        let result = self.run(env, &selection);
        if env.state.outputs.selection(&selection).is_some() {
            env.state.outputs.selection_mut(&selection).current = previous;
        }
        result
    }
}
