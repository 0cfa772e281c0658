//! Configuration types for RuleEngine

use crate::error::Result;
use arbor_compiler::CompileOptions;
use arbor_runtime::EvaluateOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main engine configuration
///
/// ```yaml
/// compile:
///   collect_diagnostics: true
/// evaluate:
///   return_diagnostics: false
///   parallelism:
///     workers: 8
///     batch_size: 64
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Options applied to every compile call
    pub compile: CompileOptions,

    /// Options used by `RuleEngine::evaluate_with_defaults`
    pub evaluate: EvaluateOptions,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded engine configuration from {}", path.as_ref().display());
        Self::from_yaml_str(&content)
    }

    /// Set compile options
    pub fn with_compile(mut self, compile: CompileOptions) -> Self {
        self.compile = compile;
        self
    }

    /// Set default evaluate options
    pub fn with_evaluate(mut self, evaluate: EvaluateOptions) -> Self {
        self.evaluate = evaluate;
        self
    }
}
