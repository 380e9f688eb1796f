//! TOML persistence for procedures.
//!
//! A procedure file holds the root `context` and an array of `[[node]]` tables. Each node
//! table carries its `type` tag, an optional `name` and its keywords in order. A branch is
//! stored as a nested array of tables under the owning node's block keyword:
//!
//! ```toml
//! context = "Analysis"
//!
//! [[node]]
//! type = "Select"
//! name = "A"
//! Site = [["Argon", "Ar"]]
//!
//! [[node]]
//! type = "IterateSelection"
//! Selection = "A"
//!
//! [[node.ForEach]]
//! type = "CalculateDistance"
//! I = "A"
//! J = "A"
//! ```

use super::context::NodeContext;
use super::error::ProcedureError;
use super::keywords::KeywordValue;
use super::node::Node;
use super::registry::NodeType;
use super::root::Procedure;
use super::sequence::Sequence;
use std::fs;
use std::path::Path;
use toml::{Table, Value};

const NODES_KEY: &str = "node";

fn malformed(message: impl Into<String>) -> ProcedureError {
    ProcedureError::Serialization(message.into())
}

fn to_keyword(key: &str, value: &Value) -> Result<KeywordValue, ProcedureError> {
    Ok(match value {
        Value::Boolean(b) => KeywordValue::Bool(*b),
        Value::Integer(i) => KeywordValue::Integer(*i),
        Value::Float(f) => KeywordValue::Double(*f),
        Value::String(s) => KeywordValue::Text(s.clone()),
        Value::Array(items) => KeywordValue::List(
            items
                .iter()
                .map(|item| to_keyword(key, item))
                .collect::<Result<_, _>>()?,
        ),
        Value::Table(table) => KeywordValue::Map(
            table
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_keyword(k, v)?)))
                .collect::<Result<_, ProcedureError>>()?,
        ),
        Value::Datetime(_) => return Err(malformed(format!("keyword '{key}' cannot be a date"))),
    })
}

fn to_value(keyword: &KeywordValue) -> Value {
    match keyword {
        KeywordValue::Bool(b) => Value::Boolean(*b),
        KeywordValue::Integer(i) => Value::Integer(*i),
        KeywordValue::Double(d) => Value::Float(*d),
        KeywordValue::Text(s) => Value::String(s.clone()),
        KeywordValue::List(items) => Value::Array(items.iter().map(to_value).collect()),
        KeywordValue::Map(entries) => Value::Table(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_value(v)))
                .collect(),
        ),
    }
}

fn read_sequence(value: &Value, sequence: &mut Sequence) -> Result<(), ProcedureError> {
    let Value::Array(items) = value else {
        return Err(malformed("node lists must be arrays of tables"));
    };
    for item in items {
        let Value::Table(table) = item else {
            return Err(malformed("node lists must be arrays of tables"));
        };
        sequence.push(read_node(table)?);
    }
    Ok(())
}

fn read_node(table: &Table) -> Result<Node, ProcedureError> {
    let tag = table
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("every node needs a string 'type'"))?;
    let node_type = NodeType::from_tag(tag)
        .ok_or_else(|| ProcedureError::UnknownNodeType(tag.to_string()))?;
    let mut node = match table.get("name") {
        None => Node::new(node_type),
        Some(Value::String(name)) => Node::named(node_type, name),
        Some(_) => return Err(malformed(format!("the name of a {tag} node must be a string"))),
    };

    let branch_keyword = node_type.branch_keyword();
    for (key, value) in table {
        match key.as_str() {
            "type" | "name" => {}
            key if Some(key) == branch_keyword => {
                let branch = node
                    .branch_mut()
                    .ok_or_else(|| malformed(format!("{tag} nodes have no branch")))?;
                read_sequence(value, branch)?;
            }
            key => node.set_keyword(key, &to_keyword(key, value)?)?,
        }
    }
    Ok(node)
}

fn write_sequence(sequence: &Sequence) -> Value {
    Value::Array(
        sequence
            .nodes()
            .iter()
            .map(|node| Value::Table(write_node(node)))
            .collect(),
    )
}

fn write_node(node: &Node) -> Table {
    let mut table = Table::new();
    table.insert("type".into(), Value::String(node.node_type().tag().into()));
    if !node.name().is_empty() {
        table.insert("name".into(), Value::String(node.name().into()));
    }
    for (keyword, value) in node.keywords() {
        table.insert(keyword.into(), to_value(&value));
    }
    if let (Some(keyword), Some(branch)) = (node.node_type().branch_keyword(), node.branch()) {
        if !branch.is_empty() {
            table.insert(keyword.into(), write_sequence(branch));
        }
    }
    table
}

fn from_table(table: &Table) -> Result<Procedure, ProcedureError> {
    let context = table
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("a procedure needs a string 'context'"))?;
    let context: NodeContext = context.parse().map_err(malformed)?;
    if let Some(key) = table.keys().find(|k| *k != "context" && *k != NODES_KEY) {
        return Err(malformed(format!("unknown top-level key '{key}'")));
    }
    let mut root = Sequence::new();
    if let Some(nodes) = table.get(NODES_KEY) {
        read_sequence(nodes, &mut root)?;
    }
    Procedure::from_sequence(context, root)
}

/// Parses and validates a procedure.
pub fn from_toml_str(text: &str) -> Result<Procedure, ProcedureError> {
    let table: Table = toml::from_str(text).map_err(|e| malformed(e.to_string()))?;
    from_table(&table)
}

pub fn to_toml_string(procedure: &Procedure) -> Result<String, ProcedureError> {
    let mut table = Table::new();
    table.insert(
        "context".into(),
        Value::String(procedure.context().as_str().into()),
    );
    if !procedure.root().is_empty() {
        table.insert(NODES_KEY.into(), write_sequence(procedure.root()));
    }
    toml::to_string(&table).map_err(|e| malformed(e.to_string()))
}

pub fn load(path: &Path) -> Result<Procedure, ProcedureError> {
    let text = fs::read_to_string(path).map_err(|source| ProcedureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: Table = toml::from_str(&text).map_err(|source| ProcedureError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    from_table(&table)
}

pub fn save(procedure: &Procedure, path: &Path) -> Result<(), ProcedureError> {
    let text = to_toml_string(procedure)?;
    fs::write(path, text).map_err(|source| ProcedureError::Io {
        path: path.to_path_buf(),
        source,
    })
}
