use super::context::{ExecutionContext, NodeContext};
use super::error::ProcedureError;
use super::keywords::{KeywordError, KeywordValue, NodeValue};
use super::registry::NodeType;
use super::scope::{ScopeError, ScopeId, VariableId, VariableStore};
use super::sequence::{Attach, Sequence};
use super::state::ProcedureState;
use crate::core::models::ids::SpeciesId;
use crate::core::models::species::Species;
use crate::expression::{ExpressionError, ExpressionValue};
use std::fmt;
use tracing::debug;

/// A by-name link from one node to another, checked when the procedure is validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub keyword: &'static str,
    pub target: String,
    pub accepts: &'static [NodeType],
}

impl Reference {
    pub fn new(keyword: &'static str, target: &str, accepts: &'static [NodeType]) -> Self {
        Self {
            keyword,
            target: target.to_string(),
            accepts,
        }
    }
}

/// Behaviour of one node type.
///
/// A node is prepared once per run, executed any number of times and finalised once. Branch
/// preparation and finalisation are handled by the owning [`Node`]; running the branch during
/// `execute` is up to the implementation.
pub trait NodeKind: fmt::Debug {
    fn node_type(&self) -> NodeType;

    /// Current keyword values in persisted order. Unset optional keywords are omitted.
    fn keywords(&self) -> Vec<(&'static str, KeywordValue)>;

    fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), KeywordError>;

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    fn branch(&self) -> Option<&Sequence> {
        None
    }

    fn branch_mut(&mut self) -> Option<&mut Sequence> {
        None
    }

    /// Declares the node's variables. `own` is the scope of the containing sequence and
    /// `branch` the scope of the node's own branch, if it has one.
    fn declare(
        &mut self,
        _own: ScopeId,
        _branch: Option<ScopeId>,
        _variables: &mut VariableStore,
    ) -> Result<(), ScopeError> {
        Ok(())
    }

    fn prepare(&mut self, _env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        Ok(())
    }

    fn execute(&mut self, env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError>;

    fn finalise(&mut self, _env: &mut NodeEnv<'_, '_>) -> Result<(), ProcedureError> {
        Ok(())
    }
}

/// What a node sees while it runs.
pub struct NodeEnv<'e, 'a> {
    pub name: &'e str,
    pub scope: ScopeId,
    pub ctx: &'e mut ExecutionContext<'a>,
    pub state: &'e mut ProcedureState,
}

impl<'a> NodeEnv<'_, 'a> {
    pub fn evaluate(&mut self, value: &NodeValue) -> Result<ExpressionValue, ProcedureError> {
        let mut env = self
            .state
            .variables
            .environment(self.scope, Some(&mut *self.ctx.random));
        value
            .evaluate(&mut env)
            .map_err(|e| ProcedureError::argument(self.name, e))
    }

    pub fn evaluate_f64(&mut self, value: &NodeValue) -> Result<f64, ProcedureError> {
        self.evaluate(value).map(ExpressionValue::as_f64)
    }

    pub fn evaluate_integer(&mut self, value: &NodeValue) -> Result<i64, ProcedureError> {
        let result = self.evaluate(value)?;
        result.as_integer().ok_or_else(|| {
            ProcedureError::argument(
                self.name,
                ExpressionError::Type(format!("expected an integer, found {result}")),
            )
        })
    }

    pub fn set_variable(
        &mut self,
        id: VariableId,
        value: impl Into<ExpressionValue>,
    ) -> Result<(), ProcedureError> {
        self.state
            .variables
            .set_value(id, value.into())
            .map_err(|source| ProcedureError::Scope {
                node: self.name.to_string(),
                source,
            })
    }

    pub fn fail(&self, message: impl Into<String>) -> ProcedureError {
        ProcedureError::state(self.name, message)
    }

    pub fn species(&self, name: &str) -> Result<(SpeciesId, &'a Species), ProcedureError> {
        let core = self.ctx.core;
        core.species
            .find_by_name(name)
            .ok_or_else(|| self.fail(format!("species '{name}' does not exist")))
    }

    pub fn data_key(&self) -> String {
        self.ctx.data_key(self.name)
    }

    /// Executes `branch`, wrapping any failure with this node's name.
    pub fn run_branch(&mut self, branch: &mut Sequence) -> Result<(), ProcedureError> {
        branch
            .execute(self.ctx, self.state)
            .map_err(|e| ProcedureError::child(self.name, e))
    }
}

/// A named node in a procedure tree.
#[derive(Debug)]
pub struct Node {
    name: String,
    scope: Option<ScopeId>,
    kind: Box<dyn NodeKind>,
}

impl Node {
    /// A node of `node_type` with default keywords. It is named automatically when the
    /// procedure is validated.
    pub fn new(node_type: NodeType) -> Self {
        Self::from_kind(node_type.create())
    }

    pub fn named(node_type: NodeType, name: &str) -> Self {
        let mut node = Self::new(node_type);
        node.name = name.to_string();
        node
    }

    pub fn from_kind(kind: Box<dyn NodeKind>) -> Self {
        Self {
            name: String::new(),
            scope: None,
            kind,
        }
    }

    /// Sets a keyword, consuming and returning the node for chained construction.
    pub fn with(mut self, keyword: &str, value: KeywordValue) -> Result<Self, ProcedureError> {
        self.set_keyword(keyword, &value)?;
        Ok(self)
    }

    /// Appends a node to this node's branch.
    pub fn with_child(mut self, child: Node) -> Result<Self, ProcedureError> {
        match self.kind.branch_mut() {
            Some(branch) => {
                branch.push(child);
                Ok(self)
            }
            None => Err(ProcedureError::state(
                self.label(),
                format!("{} nodes have no branch", self.node_type()),
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            self.node_type().tag()
        } else {
            &self.name
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    pub fn keywords(&self) -> Vec<(&'static str, KeywordValue)> {
        self.kind.keywords()
    }

    pub fn set_keyword(&mut self, keyword: &str, value: &KeywordValue) -> Result<(), ProcedureError> {
        self.kind
            .set_keyword(keyword, value)
            .map_err(|e| ProcedureError::Keyword {
                node: self.label().to_string(),
                keyword: keyword.to_string(),
                message: e.to_string(),
            })
    }

    pub fn branch(&self) -> Option<&Sequence> {
        self.kind.branch()
    }

    pub fn branch_mut(&mut self) -> Option<&mut Sequence> {
        self.kind.branch_mut()
    }

    pub(crate) fn attach(
        &mut self,
        context: NodeContext,
        scope: ScopeId,
        attach: &mut Attach<'_>,
    ) -> Result<(), ProcedureError> {
        let node_type = self.node_type();
        if self.name.is_empty() {
            self.name = attach.next_name(node_type);
        }
        if !node_type.accepts(context) {
            return Err(ProcedureError::ContextViolation {
                node: self.name.clone(),
                node_type: node_type.tag(),
                context,
            });
        }
        for reference in self.kind.references() {
            if !attach.resolves(&reference) {
                return Err(ProcedureError::UnresolvedReference {
                    node: self.name.clone(),
                    keyword: reference.keyword,
                    target: reference.target,
                });
            }
        }
        attach.record(&self.name, node_type);
        self.scope = Some(scope);

        let branch_scope = match self.kind.branch() {
            Some(_) => Some(attach.variables.add_scope(scope).map_err(|source| {
                ProcedureError::Scope {
                    node: self.name.clone(),
                    source,
                }
            })?),
            None => None,
        };
        self.kind
            .declare(scope, branch_scope, attach.variables)
            .map_err(|source| ProcedureError::Scope {
                node: self.name.clone(),
                source,
            })?;

        if let (Some(branch), Some(branch_scope)) = (self.kind.branch_mut(), branch_scope) {
            branch.attach(node_type.branch_context(context), branch_scope, attach)?;
        }
        Ok(())
    }

    pub(crate) fn prepare(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        debug!(node = %self.name, "Preparing node");
        let scope = self.scope.ok_or(ProcedureError::NotValidated)?;
        let mut env = NodeEnv {
            name: &self.name,
            scope,
            ctx: &mut *ctx,
            state: &mut *state,
        };
        self.kind.prepare(&mut env)?;
        if let Some(branch) = self.kind.branch_mut() {
            branch
                .prepare(ctx, state)
                .map_err(|e| ProcedureError::child(&self.name, e))?;
        }
        Ok(())
    }

    pub(crate) fn execute(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        debug!(node = %self.name, "Executing node");
        let scope = self.scope.ok_or(ProcedureError::NotValidated)?;
        let mut env = NodeEnv {
            name: &self.name,
            scope,
            ctx,
            state,
        };
        self.kind.execute(&mut env)
    }

    pub(crate) fn finalise(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        debug!(node = %self.name, "Finalising node");
        if let Some(branch) = self.kind.branch_mut() {
            branch
                .finalise(ctx, state)
                .map_err(|e| ProcedureError::child(&self.name, e))?;
        }
        let scope = self.scope.ok_or(ProcedureError::NotValidated)?;
        let mut env = NodeEnv {
            name: &self.name,
            scope,
            ctx,
            state,
        };
        self.kind.finalise(&mut env)
    }
}
