use super::context::{ExecutionContext, NodeContext};
use super::error::ProcedureError;
use super::node::{Node, Reference};
use super::registry::NodeType;
use super::scope::{ScopeId, VariableStore};
use super::state::ProcedureState;
use std::collections::{HashMap, HashSet};

/// An ordered list of nodes sharing one context and one variable scope.
///
/// Children run strictly in order and the first failure stops the sequence. A sequence must
/// be attached to a procedure (which assigns its context and scope) before it can run.
#[derive(Debug, Default)]
pub struct Sequence {
    block_keyword: Option<&'static str>,
    context: Option<NodeContext>,
    scope: Option<ScopeId>,
    nodes: Vec<Node>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty branch persisted under `keyword`.
    pub fn branch(keyword: &'static str) -> Self {
        Self {
            block_keyword: Some(keyword),
            ..Self::default()
        }
    }

    pub fn block_keyword(&self) -> Option<&'static str> {
        self.block_keyword
    }

    /// The context assigned at validation, if the sequence has been attached.
    pub fn context(&self) -> Option<NodeContext> {
        self.context
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// Appends a node. The sequence must be validated again before it can run.
    pub fn push(&mut self, node: Node) {
        self.scope = None;
        self.nodes.push(node);
    }

    pub fn with(mut self, node: Node) -> Self {
        self.push(node);
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds a node by name anywhere in this sequence or its branches.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find_map(|node| {
            if node.name() == name {
                Some(node)
            } else {
                node.branch().and_then(|b| b.find(name))
            }
        })
    }

    /// All nodes in pre-order.
    pub fn walk(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for node in &self.nodes {
            out.push(node);
            if let Some(branch) = node.branch() {
                out.extend(branch.walk());
            }
        }
        out
    }

    pub(crate) fn collect_names(&self, names: &mut HashSet<String>) -> Result<(), ProcedureError> {
        for node in &self.nodes {
            if !node.name().is_empty() && !names.insert(node.name().to_string()) {
                return Err(ProcedureError::DuplicateName(node.name().to_string()));
            }
            if let Some(branch) = node.branch() {
                branch.collect_names(names)?;
            }
        }
        Ok(())
    }

    pub(crate) fn attach(
        &mut self,
        context: NodeContext,
        scope: ScopeId,
        attach: &mut Attach<'_>,
    ) -> Result<(), ProcedureError> {
        self.context = Some(context);
        self.scope = Some(scope);
        for node in &mut self.nodes {
            node.attach(context, scope, attach)?;
        }
        Ok(())
    }

    fn attached(&self) -> Result<(), ProcedureError> {
        self.scope.map(|_| ()).ok_or(ProcedureError::NotValidated)
    }

    pub fn prepare(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        self.attached()?;
        for node in &mut self.nodes {
            node.prepare(ctx, state)?;
        }
        Ok(())
    }

    pub fn execute(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        self.attached()?;
        for node in &mut self.nodes {
            node.execute(ctx, state)?;
        }
        Ok(())
    }

    pub fn finalise(
        &mut self,
        ctx: &mut ExecutionContext<'_>,
        state: &mut ProcedureState,
    ) -> Result<(), ProcedureError> {
        self.attached()?;
        for node in &mut self.nodes {
            node.finalise(ctx, state)?;
        }
        Ok(())
    }
}

/// Book-keeping for one validation pass over a procedure tree.
pub(crate) struct Attach<'v> {
    pub(crate) variables: &'v mut VariableStore,
    taken: HashSet<String>,
    counters: HashMap<NodeType, usize>,
    earlier: HashMap<String, NodeType>,
}

impl<'v> Attach<'v> {
    pub(crate) fn new(variables: &'v mut VariableStore, taken: HashSet<String>) -> Self {
        Self {
            variables,
            taken,
            counters: HashMap::new(),
            earlier: HashMap::new(),
        }
    }

    /// The next free `{Tag}{NN}` name for `node_type`.
    pub(crate) fn next_name(&mut self, node_type: NodeType) -> String {
        let counter = self.counters.entry(node_type).or_insert(0);
        loop {
            *counter += 1;
            let name = format!("{}{:02}", node_type.tag(), counter);
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Whether `reference` names an already visited node of an accepted type.
    pub(crate) fn resolves(&self, reference: &Reference) -> bool {
        self.earlier
            .get(&reference.target)
            .is_some_and(|t| reference.accepts.contains(t))
    }

    pub(crate) fn record(&mut self, name: &str, node_type: NodeType) {
        self.earlier.insert(name.to_string(), node_type);
    }
}
