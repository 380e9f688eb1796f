use crate::procedure::config::{FailurePolicy, RunConfig};
use crate::procedure::context::ExecutionContext;
use crate::procedure::error::ProcedureError;
use crate::procedure::progress::{Progress, ProgressReporter};
use crate::procedure::root::Procedure;
use tracing::{info, instrument, warn};

/// An iteration that failed under [`FailurePolicy::Continue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationFailure {
    /// 1-based iteration number.
    pub iteration: u64,
    pub node: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub succeeded: u64,
    pub failures: Vec<IterationFailure>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Prepares `procedure`, executes it `config.iterations` times and finalises it.
///
/// The context's data prefix is replaced by the one in `config`. Under
/// [`FailurePolicy::Abort`] the first failed iteration is returned as the error and the
/// procedure is not finalised; under [`FailurePolicy::Continue`] failures are recorded in the
/// summary and the run always finalises.
#[instrument(skip_all, name = "procedure_run")]
pub fn run(
    procedure: &mut Procedure,
    ctx: &mut ExecutionContext<'_>,
    config: &RunConfig,
    reporter: &ProgressReporter,
) -> Result<RunSummary, ProcedureError> {
    reporter.report(Progress::RunStart {
        iterations: config.iterations,
    });
    info!(
        context = %procedure.context(),
        iterations = config.iterations,
        prefix = %config.prefix,
        "Starting procedure run."
    );

    ctx.prefix.clone_from(&config.prefix);
    procedure.prepare(ctx)?;
    reporter.report(Progress::Prepared);

    let mut summary = RunSummary {
        iterations: config.iterations,
        succeeded: 0,
        failures: Vec::new(),
    };
    for iteration in 1..=config.iterations {
        match procedure.execute(ctx) {
            Ok(()) => summary.succeeded += 1,
            Err(err) => {
                reporter.report(Progress::IterationFailed {
                    iteration,
                    node: err.node().map(str::to_string),
                });
                if config.failure_policy == FailurePolicy::Abort {
                    return Err(err);
                }
                warn!(iteration, error = %err, "Iteration failed, continuing.");
                summary.failures.push(IterationFailure {
                    iteration,
                    node: err.node().map(str::to_string),
                    message: err.to_string(),
                });
            }
        }
        reporter.report(Progress::IterationFinish);
    }

    procedure.finalise(ctx)?;
    reporter.report(Progress::Finalised);
    info!(
        succeeded = summary.succeeded,
        failed = summary.failures.len(),
        "Procedure run complete."
    );
    Ok(summary)
}
