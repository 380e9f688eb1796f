use super::random::RandomSource;
use crate::expression::{Environment, ExpressionError, ExpressionValue};
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use thiserror::Error;

new_key_type! {
    /// Handle to a variable in a [`VariableStore`].
    pub struct VariableId;
    /// Handle to a lexical scope in a [`VariableStore`].
    pub struct ScopeId;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("Variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),
    #[error("Variable handle does not exist")]
    UnknownVariable,
    #[error("Scope handle does not exist")]
    UnknownScope,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionVariable {
    name: String,
    value: ExpressionValue,
    scope: ScopeId,
}

impl ExpressionVariable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> ExpressionValue {
        self.value
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ScopeId>,
    variables: Vec<VariableId>,
}

/// All variables of a procedure, organised as a tree of lexical scopes.
///
/// Each sequence owns one scope whose parent is the scope of the sequence that contains it,
/// so resolution from inside a branch climbs through every enclosing sequence up to the root.
#[derive(Debug, Clone)]
pub struct VariableStore {
    variables: SlotMap<VariableId, ExpressionVariable>,
    scopes: SlotMap<ScopeId, Scope>,
    root: ScopeId,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    pub fn new() -> Self {
        let mut scopes = SlotMap::with_key();
        let root = scopes.insert(Scope::default());
        Self {
            variables: SlotMap::with_key(),
            scopes,
            root,
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn add_scope(&mut self, parent: ScopeId) -> Result<ScopeId, ScopeError> {
        if !self.scopes.contains_key(parent) {
            return Err(ScopeError::UnknownScope);
        }
        Ok(self.scopes.insert(Scope {
            parent: Some(parent),
            variables: Vec::new(),
        }))
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope).and_then(|s| s.parent)
    }

    /// Declares `name` in `scope`. A name may appear once per scope but may shadow a name
    /// declared further out.
    pub fn add_local_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: ExpressionValue,
    ) -> Result<VariableId, ScopeError> {
        let entry = self.scopes.get(scope).ok_or(ScopeError::UnknownScope)?;
        if entry
            .variables
            .iter()
            .any(|id| self.variables.get(*id).is_some_and(|v| v.name == name))
        {
            return Err(ScopeError::DuplicateVariable(name.to_string()));
        }
        let id = self.variables.insert(ExpressionVariable {
            name: name.to_string(),
            value,
            scope,
        });
        if let Some(entry) = self.scopes.get_mut(scope) {
            entry.variables.push(id);
        }
        Ok(id)
    }

    /// Finds the innermost variable called `name` visible from `scope`, skipping `excluding`.
    pub fn get_parameter(
        &self,
        scope: ScopeId,
        name: &str,
        excluding: Option<VariableId>,
    ) -> Option<VariableId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = self.scopes.get(id)?;
            let found = entry.variables.iter().copied().find(|v| {
                Some(*v) != excluding && self.variables.get(*v).is_some_and(|var| var.name == name)
            });
            if found.is_some() {
                return found;
            }
            current = entry.parent;
        }
        None
    }

    pub fn variable(&self, id: VariableId) -> Option<&ExpressionVariable> {
        self.variables.get(id)
    }

    pub fn value(&self, id: VariableId) -> Option<ExpressionValue> {
        self.variables.get(id).map(|v| v.value)
    }

    pub fn set_value(&mut self, id: VariableId, value: ExpressionValue) -> Result<(), ScopeError> {
        let variable = self.variables.get_mut(id).ok_or(ScopeError::UnknownVariable)?;
        variable.value = value;
        Ok(())
    }

    /// Variables declared directly in `scope`, in declaration order.
    pub fn variables_in(&self, scope: ScopeId) -> impl Iterator<Item = &ExpressionVariable> {
        self.scopes
            .get(scope)
            .into_iter()
            .flat_map(|s| s.variables.iter())
            .filter_map(|id| self.variables.get(*id))
    }

    /// Every name visible from `scope` with the value it resolves to.
    pub fn snapshot(&self, scope: ScopeId) -> HashMap<String, ExpressionValue> {
        let mut visible = HashMap::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(entry) = self.scopes.get(id) else {
                break;
            };
            for var in entry.variables.iter().filter_map(|v| self.variables.get(*v)) {
                visible.entry(var.name.clone()).or_insert(var.value);
            }
            current = entry.parent;
        }
        visible
    }

    pub fn environment<'s>(
        &'s self,
        scope: ScopeId,
        random: Option<&'s mut RandomSource>,
    ) -> ScopeEnvironment<'s> {
        ScopeEnvironment {
            store: self,
            scope,
            excluding: None,
            random,
        }
    }
}

/// Resolves expression variables through a scope chain.
pub struct ScopeEnvironment<'s> {
    store: &'s VariableStore,
    scope: ScopeId,
    excluding: Option<VariableId>,
    random: Option<&'s mut RandomSource>,
}

impl ScopeEnvironment<'_> {
    pub fn excluding(mut self, id: VariableId) -> Self {
        self.excluding = Some(id);
        self
    }
}

impl Environment for ScopeEnvironment<'_> {
    fn lookup(&self, name: &str) -> Option<ExpressionValue> {
        self.store
            .get_parameter(self.scope, name, self.excluding)
            .and_then(|id| self.store.value(id))
    }

    fn random_uniform(&mut self) -> Result<f64, ExpressionError> {
        self.random
            .as_deref_mut()
            .map(RandomSource::uniform)
            .ok_or(ExpressionError::RandomUnavailable)
    }

    fn random_integer(&mut self, low: i64, high: i64) -> Result<i64, ExpressionError> {
        self.random
            .as_deref_mut()
            .map(|r| r.integer(low, high))
            .ok_or(ExpressionError::RandomUnavailable)
    }
}
