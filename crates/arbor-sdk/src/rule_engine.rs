//! RuleEngine - the caller-facing compile and evaluate API

use crate::config::EngineConfig;
use crate::error::Result;
use arbor_compiler::{CompiledTree, Compiler};
use arbor_core::expr::ExpressionEngine;
use arbor_core::{RuleNode, TypeBridge, Value};
use arbor_runtime::{EvaluateOptions, Executor, ResultNode, StandardEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A compiled rule tree, ready for any number of evaluations
pub struct CompiledRules<E: ExpressionEngine = StandardEngine> {
    executor: Executor<E>,
}

impl<E: ExpressionEngine> CompiledRules<E> {
    /// The underlying compiled tree
    pub fn tree(&self) -> &CompiledTree<E> {
        self.executor.tree()
    }

    /// Root rule id
    pub fn root_id(&self) -> &str {
        &self.tree().root().id
    }

    /// Number of rules in the tree
    pub fn rule_count(&self) -> usize {
        self.tree().rule_count()
    }

    /// Whether evaluations may request diagnostics
    pub fn collects_diagnostics(&self) -> bool {
        self.tree().collects_diagnostics()
    }
}

impl<E: ExpressionEngine> Clone for CompiledRules<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<E: ExpressionEngine> std::fmt::Debug for CompiledRules<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRules")
            .field("root", &self.root_id())
            .field("rules", &self.rule_count())
            .finish()
    }
}

/// Compiles rule trees against one expression engine and evaluates them
pub struct RuleEngine<E: ExpressionEngine = StandardEngine> {
    compiler: Compiler<E>,
    config: EngineConfig,
}

impl<E: ExpressionEngine> RuleEngine<E> {
    pub(crate) fn new(engine: Arc<E>, bridge: TypeBridge, config: EngineConfig) -> Self {
        tracing::info!(
            "Rule engine ready (expression engine: {}, diagnostics: {})",
            engine.name(),
            config.compile.collect_diagnostics
        );
        Self {
            compiler: Compiler::with_options(engine, bridge, config.compile.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the expression engine
    pub fn engine_name(&self) -> &str {
        self.compiler.engine().name()
    }

    /// Compile a rule tree
    pub fn compile(&self, root: &RuleNode) -> Result<CompiledRules<E>> {
        let tree = self.compiler.compile(root)?;
        Ok(CompiledRules {
            executor: Executor::new(tree),
        })
    }

    /// Evaluate compiled rules against input data
    pub async fn evaluate(
        &self,
        rules: &CompiledRules<E>,
        data: HashMap<String, Value>,
        options: &EvaluateOptions,
        cancel: CancellationToken,
    ) -> Result<ResultNode> {
        Ok(rules.executor.evaluate(data, options, cancel).await?)
    }

    /// Evaluate with the configured default options and no cancellation
    pub async fn evaluate_with_defaults(
        &self,
        rules: &CompiledRules<E>,
        data: HashMap<String, Value>,
    ) -> Result<ResultNode> {
        self.evaluate(rules, data, &self.config.evaluate, CancellationToken::new())
            .await
    }

    /// Evaluate on the calling thread, ignoring any configured parallelism
    pub fn evaluate_blocking(
        &self,
        rules: &CompiledRules<E>,
        data: HashMap<String, Value>,
        options: &EvaluateOptions,
        cancel: CancellationToken,
    ) -> Result<ResultNode> {
        Ok(rules.executor.evaluate_sequential(data, options, cancel)?)
    }
}
