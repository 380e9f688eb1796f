//! # Workflows Module
//!
//! High-level entry points that drive a validated procedure through its whole lifecycle.
//!
//! ## Overview
//!
//! A host owns the configuration, the species library and the data store, wraps them in an
//! [`ExecutionContext`](crate::procedure::ExecutionContext) and hands them to a workflow
//! together with a [`RunConfig`](crate::procedure::config::RunConfig). The workflow prepares
//! the procedure once, executes it for the configured number of iterations and finalises it,
//! reporting each step through a [`ProgressReporter`](crate::procedure::progress::ProgressReporter).
//!
//! ## Architecture
//!
//! - **Run Workflow** ([`run`]) - The prepare/execute/finalise loop with a configurable policy
//!   for failed iterations.

pub mod run;
