//! Rule tree executor
//!
//! Evaluates a compiled rule tree against one set of input data, either
//! depth-first on the calling thread or through a bounded worker pool.

mod pool;
mod traversal;

pub use pool::{Parallelism, WorkerPool};

use crate::error::{EvalError, Result};
use crate::result::ResultNode;
use arbor_compiler::CompiledTree;
use arbor_core::expr::{ExprValue, ExpressionEngine};
use arbor_core::{Value, SELF_IDENT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use traversal::Traversal;

/// Options for one evaluation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateOptions {
    /// Attach a diagnostic tree to every evaluated expression
    pub return_diagnostics: bool,

    /// Evaluate through a worker pool; `None` walks the tree sequentially
    pub parallelism: Option<Parallelism>,
}

impl EvaluateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn return_diagnostics(mut self, enable: bool) -> Self {
        self.return_diagnostics = enable;
        self
    }

    pub fn parallel(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = Some(parallelism);
        self
    }
}

/// Evaluates a compiled rule tree
///
/// The executor holds no per-call state, so one instance can serve any
/// number of concurrent evaluations.
pub struct Executor<E: ExpressionEngine> {
    tree: CompiledTree<E>,
}

impl<E: ExpressionEngine> Executor<E> {
    pub fn new(tree: CompiledTree<E>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &CompiledTree<E> {
        &self.tree
    }

    /// Evaluate the tree against `data`
    ///
    /// Cancelling `cancel` stops the evaluation at the next node boundary
    /// with [`EvalError::Cancelled`]; no partial result is returned.
    pub async fn evaluate(
        &self,
        data: HashMap<String, Value>,
        options: &EvaluateOptions,
        cancel: CancellationToken,
    ) -> Result<ResultNode> {
        let start = Instant::now();
        let traversal = self.prepare(data, options, cancel)?;

        let result = match options.parallelism {
            Some(parallelism) => {
                let pool = WorkerPool::new(parallelism);
                tracing::debug!(
                    "Evaluating rule tree with {} workers, batch size {}",
                    pool.workers(),
                    pool.batch_size()
                );
                Arc::new(traversal)
                    .visit_parallel(Arc::clone(self.tree.root()), pool)
                    .await
            }
            None => traversal.visit(self.tree.root()),
        };

        self.report(&result, start);
        result
    }

    /// Evaluate the tree depth-first on the calling thread
    pub fn evaluate_sequential(
        &self,
        data: HashMap<String, Value>,
        options: &EvaluateOptions,
        cancel: CancellationToken,
    ) -> Result<ResultNode> {
        let start = Instant::now();
        let result = self
            .prepare(data, options, cancel)
            .and_then(|traversal| traversal.visit(self.tree.root()));
        self.report(&result, start);
        result
    }

    fn prepare(
        &self,
        data: HashMap<String, Value>,
        options: &EvaluateOptions,
        cancel: CancellationToken,
    ) -> Result<Traversal<E>> {
        if options.return_diagnostics && !self.tree.collects_diagnostics() {
            return Err(EvalError::DiagnosticsRequestedWithoutTracing);
        }

        let bridge = self.tree.bridge();
        let data: HashMap<String, ExprValue> = data
            .into_iter()
            .filter(|(name, _)| {
                if name == SELF_IDENT {
                    tracing::warn!("Ignoring input named '{}': it is reserved", SELF_IDENT);
                    return false;
                }
                true
            })
            .map(|(name, value)| {
                let value = bridge.to_expr_value(&value);
                (name, value)
            })
            .collect();

        Ok(Traversal::new(
            Arc::clone(self.tree.engine()),
            bridge.clone(),
            Arc::new(data),
            options.return_diagnostics,
            cancel,
        ))
    }

    fn report(&self, result: &Result<ResultNode>, start: Instant) {
        let elapsed = start.elapsed();
        match result {
            Ok(node) => tracing::info!(
                "Rule tree '{}' evaluated: pass={}, {} rules in {:?}",
                node.id,
                node.pass,
                node.rules_evaluated,
                elapsed
            ),
            Err(EvalError::Cancelled) => {
                tracing::info!("Rule tree evaluation cancelled after {:?}", elapsed)
            }
            Err(e) => tracing::warn!("Rule tree evaluation failed: {}", e),
        }
    }
}

impl<E: ExpressionEngine> Clone for Executor<E> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}
