//! Builder pattern for RuleEngine

use crate::config::EngineConfig;
use crate::error::Result;
use crate::rule_engine::RuleEngine;
use arbor_core::expr::ExpressionEngine;
use arbor_core::{ExprValue, MessageDescriptor, MessageRegistry, TypeBridge};
use arbor_runtime::{Parallelism, StandardEngine};
use std::path::Path;
use std::sync::Arc;

/// Builder for RuleEngine
///
/// # Example
///
/// ```rust,ignore
/// use arbor_sdk::RuleEngineBuilder;
///
/// let engine = RuleEngineBuilder::new()
///     .register_message(MessageDescriptor::new("acme.Account")
///         .with_field("balance", ValueType::int()))
///     .collect_diagnostics(true)
///     .build()?;
///
/// let rules = engine.compile(&root)?;
/// let result = engine.evaluate_with_defaults(&rules, data).await?;
/// ```
pub struct RuleEngineBuilder<E: ExpressionEngine = StandardEngine> {
    engine: E,
    registry: Option<Arc<MessageRegistry>>,
    messages: Vec<MessageDescriptor>,
    config: EngineConfig,
}

impl RuleEngineBuilder<StandardEngine> {
    /// Create a builder for the standard expression engine
    pub fn new() -> Self {
        Self::with_engine(StandardEngine::new())
    }

    /// Register a host function with the standard engine
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[ExprValue]) -> std::result::Result<ExprValue, String> + Send + Sync + 'static,
    {
        self.engine = self.engine.with_function(name, function);
        self
    }
}

impl Default for RuleEngineBuilder<StandardEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ExpressionEngine> RuleEngineBuilder<E> {
    /// Create a builder for a custom expression engine
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            registry: None,
            messages: Vec::new(),
            config: EngineConfig::new(),
        }
    }

    /// Use a shared message registry
    pub fn with_registry(mut self, registry: Arc<MessageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a message descriptor when the engine is built
    pub fn register_message(mut self, descriptor: MessageDescriptor) -> Self {
        self.messages.push(descriptor);
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a YAML file
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.config = EngineConfig::from_file(path)?;
        Ok(self)
    }

    /// Retain syntax trees so evaluations can return diagnostics
    pub fn collect_diagnostics(mut self, enable: bool) -> Self {
        self.config.compile.collect_diagnostics = enable;
        self
    }

    /// Return diagnostics from `evaluate_with_defaults`
    pub fn return_diagnostics(mut self, enable: bool) -> Self {
        self.config.evaluate.return_diagnostics = enable;
        self
    }

    /// Evaluate in parallel by default
    pub fn parallelism(mut self, parallelism: Parallelism) -> Self {
        self.config.evaluate.parallelism = Some(parallelism);
        self
    }

    /// Build the rule engine
    pub fn build(self) -> Result<RuleEngine<E>> {
        let registry = self.registry.unwrap_or_default();
        registry.register_all(self.messages)?;
        tracing::debug!("Message registry holds {} descriptors", registry.len());

        Ok(RuleEngine::new(
            Arc::new(self.engine),
            TypeBridge::new(registry),
            self.config,
        ))
    }
}
