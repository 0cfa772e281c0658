//! Arbor Runtime - Evaluation engine for compiled rule trees
//!
//! This crate provides:
//! - The standard expression engine (`engine`)
//! - The sequential and bounded-parallel tree executor (`executor`)
//! - Per-expression evaluation diagnostics (`diagnostics`)

pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod executor;
pub mod result;

// Re-export main types
pub use diagnostics::{Diagnostic, DiagnosticsReconstructor, Provenance};
pub use engine::{HostFunction, StandardEngine, StandardProgram};
pub use error::{ErrorKind, EvalError, Result};
pub use executor::{EvaluateOptions, Executor, Parallelism, WorkerPool};
pub use result::ResultNode;
