//! # Procedure Module
//!
//! The execution engine: a procedure is a tree of nodes that is validated once, prepared once,
//! executed any number of times against a configuration and finally finalised.
//!
//! ## Overview
//!
//! Every node kind implements [`node::NodeKind`]. The [`node::Node`] wrapper owns the kind
//! together with its name and variable scope, and drives the lifecycle of the node's branch
//! when it has one. Nodes never hold pointers to each other: a reference is a node name that
//! is resolved against earlier nodes when the tree is validated, and results are exchanged
//! through the [`state::NodeOutputs`] blackboard keyed by those names.
//!
//! ## Architecture
//!
//! - **Contexts and hosts** ([`context`]) - Sequence contexts, the execution context and the
//!   process-pool and module-host seams
//! - **Variables** ([`scope`]) - Lexically scoped variable store feeding the expression language
//! - **Lifecycle** ([`node`], [`sequence`], [`root`]) - The node trait, ordered sequences and the
//!   validated root
//! - **Node kinds** ([`nodes`], [`registry`]) - Every concrete node and the type-tag registry
//! - **Spatial regions** ([`region`]) - Voxel maps used by region nodes and region positioning
//! - **Persistence** ([`keywords`], [`serialization`]) - Keyword values and the TOML format
//! - **Host support** ([`config`], [`progress`], [`random`]) - Run parameters, progress events and
//!   the shared random stream
//! - **Error Handling** ([`error`]) - The failure taxonomy, always tied to a node name
//!
//! ## Lifecycle
//!
//! 1. [`root::Procedure::validate`] checks contexts, names, references and declarations.
//! 2. [`root::Procedure::prepare`] resolves inputs and resets published outputs.
//! 3. [`root::Procedure::execute`] runs every node in order, stopping at the first failure.
//! 4. [`root::Procedure::finalise`] reports and releases per-run state.

pub mod config;
pub mod context;
pub mod error;
pub mod keywords;
pub mod node;
pub mod nodes;
pub mod progress;
pub mod random;
pub mod region;
pub mod registry;
pub mod root;
pub mod scope;
pub mod sequence;
pub mod serialization;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{CoreData, ExecutionContext, ModuleHost, NodeContext, ProcessPool};
pub use error::ProcedureError;
pub use node::Node;
pub use registry::NodeType;
pub use root::Procedure;
pub use sequence::Sequence;
