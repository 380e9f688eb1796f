use super::context::NodeContext;
use super::scope::ScopeError;
use crate::expression::ExpressionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("Node '{node}' ({node_type}) is not permitted in a {context} sequence")]
    ContextViolation {
        node: String,
        node_type: &'static str,
        context: NodeContext,
    },

    #[error("Node '{node}': {source}")]
    Argument {
        node: String,
        #[source]
        source: ExpressionError,
    },

    #[error("Node '{node}': {message}")]
    State { node: String, message: String },

    #[error("Node '{node}': branch failed: {source}")]
    ChildFailure {
        node: String,
        #[source]
        source: Box<ProcedureError>,
    },

    #[error("Node name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("Node '{node}': keyword '{keyword}' refers to '{target}', which is not an earlier node of an accepted type")]
    UnresolvedReference {
        node: String,
        keyword: &'static str,
        target: String,
    },

    #[error("Node '{node}': {source}")]
    Scope {
        node: String,
        #[source]
        source: ScopeError,
    },

    #[error("Node '{node}': invalid keyword '{keyword}': {message}")]
    Keyword {
        node: String,
        keyword: String,
        message: String,
    },

    #[error("Unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("Procedure has not been validated")]
    NotValidated,

    #[error("Malformed procedure definition: {0}")]
    Serialization(String),

    #[error("Failed to access procedure file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse procedure file '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ProcedureError {
    pub fn state(node: &str, message: impl Into<String>) -> Self {
        Self::State {
            node: node.to_string(),
            message: message.into(),
        }
    }

    pub fn argument(node: &str, source: ExpressionError) -> Self {
        Self::Argument {
            node: node.to_string(),
            source,
        }
    }

    pub fn child(node: &str, source: ProcedureError) -> Self {
        Self::ChildFailure {
            node: node.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost error beneath any branch wrappers.
    pub fn root_cause(&self) -> &ProcedureError {
        match self {
            Self::ChildFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the node that failed first, if the error is tied to a node.
    pub fn node(&self) -> Option<&str> {
        match self.root_cause() {
            Self::ContextViolation { node, .. }
            | Self::Argument { node, .. }
            | Self::State { node, .. }
            | Self::ChildFailure { node, .. }
            | Self::UnresolvedReference { node, .. }
            | Self::Scope { node, .. }
            | Self::Keyword { node, .. } => Some(node),
            Self::DuplicateName(name) => Some(name),
            _ => None,
        }
    }
}
