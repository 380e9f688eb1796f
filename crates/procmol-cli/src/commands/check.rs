use crate::cli::CheckArgs;
use crate::error::Result;
use procmol::procedure::keywords::KeywordValue;
use procmol::procedure::sequence::Sequence;
use procmol::procedure::{Procedure, serialization};
use std::fmt::Write;
use tracing::info;

pub fn run(args: CheckArgs) -> Result<()> {
    info!("Validating procedure {:?}", &args.procedure);
    let procedure = serialization::load(&args.procedure)?;
    print!("{}", render_tree(&procedure, args.keywords));
    println!(
        "✓ {} is a valid {} procedure.",
        args.procedure.display(),
        procedure.context()
    );
    Ok(())
}

/// One line per node, indented by branch depth.
pub fn render_tree(procedure: &Procedure, keywords: bool) -> String {
    let mut out = format!("{} procedure\n", procedure.context());
    render_sequence(procedure.root(), 1, keywords, &mut out);
    out
}

fn render_sequence(sequence: &Sequence, depth: usize, keywords: bool, out: &mut String) {
    let indent = "  ".repeat(depth);
    for node in sequence.nodes() {
        let _ = writeln!(out, "{indent}{} [{}]", node.name(), node.node_type());
        if keywords {
            for (keyword, value) in node.keywords() {
                let _ = writeln!(out, "{indent}  · {keyword} = {}", format_keyword(&value));
            }
        }
        if let Some(branch) = node.branch() {
            if let Some(block) = branch.block_keyword() {
                let _ = writeln!(out, "{indent}  {block}:");
            }
            render_sequence(branch, depth + 2, keywords, out);
        }
    }
}

fn format_keyword(value: &KeywordValue) -> String {
    match value {
        KeywordValue::Bool(b) => b.to_string(),
        KeywordValue::Integer(i) => i.to_string(),
        KeywordValue::Double(d) => d.to_string(),
        KeywordValue::Text(s) => format!("\"{s}\""),
        KeywordValue::List(items) => format!(
            "[{}]",
            items.iter().map(format_keyword).collect::<Vec<_>>().join(", ")
        ),
        KeywordValue::Map(entries) => format!(
            "{{ {} }}",
            entries
                .iter()
                .map(|(k, v)| format!("{k} = {}", format_keyword(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
