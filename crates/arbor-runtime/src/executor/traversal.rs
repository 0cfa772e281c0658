//! Rule tree traversal
//!
//! The same per-node semantics drive both the sequential depth-first walk
//! and the bounded-parallel walk, so both produce identical result trees.

use super::pool::WorkerPool;
use crate::diagnostics::{Diagnostic, DiagnosticsReconstructor};
use crate::error::{EvalError, Result};
use crate::result::ResultNode;
use arbor_compiler::CompiledRule;
use arbor_core::expr::{Activation, EngineError, ExprValue, ExpressionEngine};
use arbor_core::{TypeBridge, Value, SELF_IDENT};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of a node's own expression
struct OwnResult {
    pass: bool,
    value: Value,
    diagnostics: Option<Diagnostic>,
}

/// State shared by every node visit of one evaluation call
pub(crate) struct Traversal<E: ExpressionEngine> {
    engine: Arc<E>,
    bridge: TypeBridge,
    data: Arc<HashMap<String, ExprValue>>,
    diagnostics: bool,
    cancel: CancellationToken,
}

impl<E: ExpressionEngine> Traversal<E> {
    pub(crate) fn new(
        engine: Arc<E>,
        bridge: TypeBridge,
        data: Arc<HashMap<String, ExprValue>>,
        diagnostics: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            bridge,
            data,
            diagnostics,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(EvalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Depth-first sequential walk
    pub(crate) fn visit(&self, rule: &CompiledRule<E>) -> Result<ResultNode> {
        self.check_cancelled()?;
        let own = self.evaluate_own(rule)?;

        let mut visited = Vec::new();
        for child in children_to_visit(rule, own.pass) {
            self.check_cancelled()?;
            let result = self.visit(&child)?;
            let stop = rule.options.stop_first_positive_child && result.pass;
            visited.push(result);
            if stop {
                break;
            }
        }
        Ok(finish(rule, own, visited))
    }

    /// Bounded-parallel walk; every level fans out through the same pool
    pub(crate) fn visit_parallel(
        self: Arc<Self>,
        rule: Arc<CompiledRule<E>>,
        pool: WorkerPool,
    ) -> BoxFuture<'static, Result<ResultNode>> {
        async move {
            self.check_cancelled()?;
            let own = {
                let _permit = pool.acquire(&self.cancel).await?;
                self.evaluate_own(&rule)?
            };

            let children = children_to_visit(&rule, own.pass);
            let visited = if rule.options.stop_first_positive_child {
                // The visited set depends on order, so siblings go one at a time
                let mut visited = Vec::new();
                for child in children {
                    self.check_cancelled()?;
                    let result = Arc::clone(&self).visit_parallel(child, pool.clone()).await?;
                    let stop = result.pass;
                    visited.push(result);
                    if stop {
                        break;
                    }
                }
                visited
            } else {
                self.fan_out(children, &pool).await?
            };
            Ok(finish(&rule, own, visited))
        }
        .boxed()
    }

    /// Visit children concurrently in batches, keeping their order
    async fn fan_out(
        self: &Arc<Self>,
        children: Vec<Arc<CompiledRule<E>>>,
        pool: &WorkerPool,
    ) -> Result<Vec<ResultNode>> {
        let mut slots: Vec<Option<ResultNode>> = Vec::with_capacity(children.len());
        slots.resize_with(children.len(), || None);

        for (batch_index, batch) in children.chunks(pool.batch_size()).enumerate() {
            let mut tasks = JoinSet::new();
            for (offset, child) in batch.iter().enumerate() {
                self.check_cancelled()?;
                let index = batch_index * pool.batch_size() + offset;
                let traversal = Arc::clone(self);
                let child = Arc::clone(child);
                let pool = pool.clone();
                tasks.spawn(async move { (index, traversal.visit_parallel(child, pool).await) });
            }

            // Dropping the join set on early return aborts the rest of the batch
            loop {
                let joined = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(EvalError::Cancelled),
                    joined = tasks.join_next() => joined,
                };
                let Some(joined) = joined else {
                    break;
                };
                let (index, result) =
                    joined.map_err(|e| EvalError::WorkerFailure(e.to_string()))?;
                slots[index] = Some(result?);
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| EvalError::WorkerFailure("missing child result".to_string()))
            })
            .collect()
    }

    /// Evaluate a node's own expression
    fn evaluate_own(&self, rule: &CompiledRule<E>) -> Result<OwnResult> {
        let Some(program) = rule.program.as_ref() else {
            if rule.expression.is_some() {
                return Err(EvalError::MissingProgram {
                    path: rule.path.clone(),
                });
            }
            return Ok(OwnResult {
                pass: true,
                value: Value::Bool(true),
                diagnostics: None,
            });
        };

        let mut activation = Activation::new(Arc::clone(&self.data));
        if let Some(self_value) = &rule.self_value {
            activation = activation.with_binding(SELF_IDENT, self.bridge.to_expr_value(self_value));
        }

        let evaluation = self
            .engine
            .evaluate(&program.program, &activation)
            .map_err(|source| match source {
                EngineError::UnboundIdentifier(name) if name == SELF_IDENT => {
                    EvalError::UnresolvedSelfReference {
                        path: rule.path.clone(),
                    }
                }
                source => EvalError::Evaluator {
                    path: rule.path.clone(),
                    source,
                },
            })?;

        let value = self
            .bridge
            .convert_runtime_value(&evaluation.value, &program.output_type(&self.bridge))
            .map_err(|source| EvalError::RuntimeConversion {
                path: rule.path.clone(),
                source,
            })?;

        let diagnostics = if self.diagnostics {
            match (&program.syntax_tree, &evaluation.trace) {
                (Some(tree), Some(trace)) => {
                    DiagnosticsReconstructor::new(&self.bridge, tree, trace, &program.inputs)
                        .reconstruct()
                }
                _ => None,
            }
        } else {
            None
        };

        let pass = value.is_true();
        tracing::trace!("Rule '{}' evaluated to {} (pass: {})", rule.path, value, pass);
        Ok(OwnResult {
            pass,
            value,
            diagnostics,
        })
    }
}

/// Children to visit, in visiting order
fn children_to_visit<E: ExpressionEngine>(
    rule: &CompiledRule<E>,
    parent_pass: bool,
) -> Vec<Arc<CompiledRule<E>>> {
    if !parent_pass && rule.options.stop_if_parent_negative {
        return Vec::new();
    }

    let mut children: Vec<Arc<CompiledRule<E>>> = rule
        .children
        .iter()
        .filter(|child| parent_pass || !child.options.stop_if_parent_negative)
        .cloned()
        .collect();
    if let Some(sort) = &rule.options.sort {
        children.sort_by(|a, b| sort.compare(&a.id, &b.id));
    }
    children
}

/// Combine a node's own outcome with its visited children
fn finish<E: ExpressionEngine>(
    rule: &CompiledRule<E>,
    own: OwnResult,
    mut visited: Vec<ResultNode>,
) -> ResultNode {
    let rules_evaluated = 1 + visited.iter().map(|c| c.rules_evaluated).sum::<usize>();
    let pass = if rule.options.true_if_any {
        visited.iter().any(|c| c.pass)
    } else {
        own.pass
    };
    if rule.options.discards_failures() {
        visited.retain(|c| c.pass);
    }

    ResultNode {
        id: rule.id.clone(),
        pass,
        value: own.value,
        children: visited,
        diagnostics: own.diagnostics,
        rules_evaluated,
    }
}
