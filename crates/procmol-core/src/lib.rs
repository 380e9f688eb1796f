//! # procmol Core Library
//!
//! A node-graph procedure engine for building, selecting from and analysing molecular
//! configurations. A *procedure* is a tree of nodes (boxes, molecule insertion, site
//! selection, spatial regions, histogram collection) that is validated once and then
//! executed repeatedly against an externally-owned configuration.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same layered split throughout:
//!
//! - **[`core`]: The Foundation.** The minimal simulation model the engine runs against
//!   (`Configuration`, `SimBox`, `Species`), coordinate I/O and N-dimensional histograms.
//!
//! - **[`expression`]: The Sub-language.** A small typed arithmetic language with integer and
//!   floating values, built-in functions and variables resolved through an [`expression::Environment`].
//!
//! - **[`procedure`]: The Engine.** Variable scopes, the node trait and its lifecycle, sequences,
//!   every concrete node kind, the type-tag registry and the TOML persistence format.
//!
//! - **[`workflows`]: The Public API.** The host loop that prepares a procedure once, executes it
//!   for a number of iterations and finalises it, reporting progress along the way.

pub mod core;
pub mod expression;
pub mod procedure;
pub mod workflows;
