//! Arbor SDK
//!
//! High-level API for compiling typed rule trees and evaluating them
//! against input data.

pub mod builder;
pub mod config;
pub mod error;
pub mod rule_engine;
pub mod telemetry;

// Re-export main types
pub use builder::RuleEngineBuilder;
pub use config::EngineConfig;
pub use error::{Result, SdkError};
pub use rule_engine::{CompiledRules, RuleEngine};
pub use telemetry::init_tracing;

// Re-export commonly used types from dependencies
pub use arbor_compiler::CompileOptions;
pub use arbor_core::{
    DiscardFail, EvalOptions, ExprValue, MessageDescriptor, MessageRegistry, RuleNode, Schema,
    SortFunc, Value, ValueType,
};
pub use arbor_runtime::{
    Diagnostic, EvaluateOptions, Parallelism, Provenance, ResultNode, StandardEngine,
};
pub use tokio_util::sync::CancellationToken;
