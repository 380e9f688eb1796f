use crate::cli::EvalArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use procmol::expression::{Expression, ExpressionValue};
use tracing::debug;

pub fn run(args: EvalArgs) -> Result<()> {
    let value = evaluate(&args.expression, &args.definitions)?;
    println!("{value}");
    Ok(())
}

pub fn evaluate(expression: &str, definitions: &[String]) -> Result<ExpressionValue> {
    let mut variables =
        parser::parse_definitions(definitions).map_err(|e| CliError::Argument(e.to_string()))?;
    let expression =
        Expression::parse(expression).map_err(|e| CliError::Argument(e.to_string()))?;
    debug!(variables = ?expression.variables(), "Evaluating expression");
    expression
        .evaluate(&mut variables)
        .map_err(|e| CliError::Argument(e.to_string()))
}
