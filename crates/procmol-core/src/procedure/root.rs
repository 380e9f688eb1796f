use super::context::{ExecutionContext, NodeContext};
use super::error::ProcedureError;
use super::node::Node;
use super::sequence::{Attach, Sequence};
use super::state::{NodeOutputs, ProcedureState};
use std::collections::HashSet;
use tracing::debug;

/// The root of a node tree and the only entry point for running it.
///
/// A procedure validates its whole tree before it can be prepared: node contexts, name
/// uniqueness, references and variable declarations are all checked in one pass. Any
/// structural change through [`Procedure::root_mut`] clears the validated flag.
#[derive(Debug)]
pub struct Procedure {
    context: NodeContext,
    root: Sequence,
    state: ProcedureState,
    validated: bool,
}

impl Procedure {
    /// An empty, trivially valid procedure.
    pub fn new(context: NodeContext) -> Self {
        Self {
            context,
            root: Sequence::new(),
            state: ProcedureState::new(),
            validated: true,
        }
    }

    pub fn from_sequence(context: NodeContext, root: Sequence) -> Result<Self, ProcedureError> {
        let mut procedure = Self {
            context,
            root,
            state: ProcedureState::new(),
            validated: false,
        };
        procedure.validate()?;
        Ok(procedure)
    }

    pub fn context(&self) -> NodeContext {
        self.context
    }

    pub fn root(&self) -> &Sequence {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Sequence {
        self.validated = false;
        &mut self.root
    }

    pub fn add_node(&mut self, node: Node) {
        self.root_mut().push(node);
    }

    pub fn state(&self) -> &ProcedureState {
        &self.state
    }

    /// Mutable access for hosts that seed outputs between phases, such as handing a dataset
    /// to a standalone Operate procedure.
    pub fn state_mut(&mut self) -> &mut ProcedureState {
        &mut self.state
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.root.find(name)
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Checks the whole tree and rebuilds the variable scopes. On failure the procedure stays
    /// unusable until a later validation succeeds.
    pub fn validate(&mut self) -> Result<(), ProcedureError> {
        self.validated = false;
        let mut names = HashSet::new();
        self.root.collect_names(&mut names)?;

        let mut state = ProcedureState::new();
        let root_scope = state.variables.root();
        let mut attach = Attach::new(&mut state.variables, names);
        self.root.attach(self.context, root_scope, &mut attach)?;

        self.state = state;
        self.validated = true;
        debug!(
            context = %self.context,
            nodes = self.root.walk().len(),
            "Procedure validated"
        );
        Ok(())
    }

    fn ensure_validated(&self) -> Result<(), ProcedureError> {
        if self.validated {
            Ok(())
        } else {
            Err(ProcedureError::NotValidated)
        }
    }

    pub fn prepare(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<(), ProcedureError> {
        self.ensure_validated()?;
        self.state.outputs = NodeOutputs::default();
        self.root.prepare(ctx, &mut self.state)
    }

    pub fn execute(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<(), ProcedureError> {
        self.ensure_validated()?;
        self.root.execute(ctx, &mut self.state)
    }

    pub fn finalise(&mut self, ctx: &mut ExecutionContext<'_>) -> Result<(), ProcedureError> {
        self.ensure_validated()?;
        self.root.finalise(ctx, &mut self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::keywords::KeywordValue;
    use crate::procedure::nodes::select::tests::select;
    use crate::procedure::registry::NodeType;
    use crate::procedure::serialization::from_toml_str;
    use crate::procedure::testing::Harness;

    fn text(value: &str) -> KeywordValue {
        KeywordValue::text(value)
    }

    mod validation {
        use super::*;

        #[test]
        fn analysis_nodes_are_rejected_in_generation() {
            let root = Sequence::new()
                .with(Node::new(NodeType::Temperature))
                .with(Node::named(NodeType::CalculateDistance, "r"));
            let err = Procedure::from_sequence(NodeContext::Generation, root).unwrap_err();
            assert!(matches!(
                err,
                ProcedureError::ContextViolation { node, node_type: "CalculateDistance", context: NodeContext::Generation }
                    if node == "r"
            ));
        }

        #[test]
        fn a_failed_validation_leaves_the_procedure_unusable() {
            let mut procedure = Procedure::new(NodeContext::Generation);
            procedure.add_node(Node::new(NodeType::Collect1D));
            assert!(!procedure.is_validated());
            assert!(procedure.validate().is_err());

            let mut harness = Harness::new();
            let mut ctx = harness.ctx();
            assert!(matches!(procedure.prepare(&mut ctx), Err(ProcedureError::NotValidated)));
            assert!(matches!(procedure.execute(&mut ctx), Err(ProcedureError::NotValidated)));
            assert!(matches!(procedure.finalise(&mut ctx), Err(ProcedureError::NotValidated)));
        }

        #[test]
        fn names_must_be_unique_across_branches() {
            let loop_node = Node::new(NodeType::IterateSelection)
                .with("Selection", text("A"))
                .unwrap()
                .with_child(select("A", "Water", "O"))
                .unwrap();
            let root = Sequence::new().with(select("A", "Water", "O")).with(loop_node);
            let err = Procedure::from_sequence(NodeContext::Analysis, root).unwrap_err();
            assert!(matches!(err, ProcedureError::DuplicateName(name) if name == "A"));
        }

        #[test]
        fn references_must_point_backwards() {
            let forward = Sequence::new()
                .with(Node::new(NodeType::IterateSelection).with("Selection", text("A")).unwrap())
                .with(select("A", "Water", "O"));
            let err = Procedure::from_sequence(NodeContext::Analysis, forward).unwrap_err();
            assert!(matches!(
                err,
                ProcedureError::UnresolvedReference { keyword: "Selection", target, .. } if target == "A"
            ));

            let own = Sequence::new().with(
                Node::named(NodeType::Pick, "P")
                    .with("From", text("P"))
                    .unwrap(),
            );
            let err = Procedure::from_sequence(NodeContext::Generation, own).unwrap_err();
            assert!(matches!(err, ProcedureError::UnresolvedReference { node, .. } if node == "P"));
        }

        #[test]
        fn references_check_the_target_type() {
            let root = Sequence::new()
                .with(Node::named(NodeType::Temperature, "T"))
                .with(Node::new(NodeType::IterateSelection).with("Selection", text("T")).unwrap());
            assert!(matches!(
                Procedure::from_sequence(NodeContext::Generation, root),
                Err(ProcedureError::UnresolvedReference { .. })
            ));
        }

        #[test]
        fn unnamed_nodes_get_numbered_names() {
            let root = Sequence::new()
                .with(Node::new(NodeType::Temperature))
                .with(Node::named(NodeType::Temperature, "Temperature02"))
                .with(Node::new(NodeType::Temperature))
                .with(Node::new(NodeType::Box));
            let procedure = Procedure::from_sequence(NodeContext::Generation, root).unwrap();
            let names: Vec<&str> = procedure.root().nodes().iter().map(Node::name).collect();
            assert_eq!(names, ["Temperature01", "Temperature02", "Temperature03", "Box01"]);
        }

        #[test]
        fn structural_edits_require_revalidation() {
            let mut procedure = Procedure::new(NodeContext::Generation);
            assert!(procedure.is_validated());
            procedure.add_node(Node::new(NodeType::Temperature));
            assert!(!procedure.is_validated());
            procedure.validate().unwrap();
            assert!(procedure.find("Temperature01").is_some());
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn a_failing_node_stops_the_sequence() {
            let mut harness = Harness::new();
            let root = Sequence::new()
                .with(Node::new(NodeType::Temperature).with("Temperature", text("250")).unwrap())
                .with(Node::named(NodeType::SizeFactor, "Grow").with("SizeFactor", text("missing * 2")).unwrap())
                .with(Node::new(NodeType::Box).with("Lengths", KeywordValue::doubles(&[5.0, 5.0, 5.0])).unwrap());
            let mut procedure = Procedure::from_sequence(NodeContext::Generation, root).unwrap();

            let err = harness.run_once(&mut procedure).unwrap_err();
            assert!(matches!(&err, ProcedureError::Argument { node, .. } if node == "Grow"));
            assert_eq!(harness.configuration.temperature(), 250.0);
            assert_eq!(harness.configuration.simulation_box().lengths().x, 20.0);
        }

        #[test]
        fn nested_declarations_shadow_outer_ones() {
            let mut harness = Harness::water(1);
            let procedure = harness
                .run_toml(
                    r#"
context = "Generation"

[[node]]
type = "Parameters"
Parameters = { x = 2 }

[[node]]
type = "Select"
name = "O"
Site = [["Water", "O"]]

[[node]]
type = "IterateSelection"
Selection = "O"

[[node.ForEach]]
type = "Parameters"
Parameters = { x = 10 }

[[node.ForEach]]
type = "Box"
Lengths = ["x * 3 + 1", 20.0, 20.0]

[[node]]
type = "Temperature"
Temperature = "x * 3 + 1"
"#,
                )
                .unwrap();

            assert_eq!(harness.configuration.simulation_box().lengths().x, 31.0);
            assert_eq!(harness.configuration.temperature(), 7.0);
            assert!(procedure.is_validated());
        }

        #[test]
        fn prepare_resets_published_outputs() {
            let mut harness = Harness::water(2);
            let mut procedure = from_toml_str(
                "context = \"Analysis\"\n[[node]]\ntype = \"Select\"\nname = \"O\"\nSite = [[\"Water\", \"O\"]]\n",
            )
            .unwrap();
            harness.run_times(&mut procedure, 3).unwrap();
            assert_eq!(procedure.state().outputs.selection("O").unwrap().n_selections, 3);
            harness.run_times(&mut procedure, 1).unwrap();
            assert_eq!(procedure.state().outputs.selection("O").unwrap().n_selections, 1);
        }
    }
}
