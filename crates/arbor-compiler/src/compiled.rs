//! Compiled rule trees
//!
//! A `CompiledTree` is the read-only mirror of a rule tree produced by the
//! compiler. It is bound to the engine that compiled it and can be shared
//! across concurrent evaluations.

use arbor_core::expr::{ExprType, ExpressionEngine, SyntaxTree};
use arbor_core::{EvalOptions, TypeBridge, Value, ValueType};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The compiled expression of one rule
pub struct CompiledProgram<E: ExpressionEngine> {
    /// Engine artifact
    pub program: E::Program,

    /// Type inferred by the engine
    pub result_type: Option<ExprType>,

    /// Type declared on the rule
    pub declared_type: Option<ValueType>,

    /// Checked syntax tree, present when compiled for diagnostics
    pub syntax_tree: Option<SyntaxTree>,

    /// Names of the effective schema's elements
    pub inputs: Arc<BTreeSet<String>>,
}

impl<E: ExpressionEngine> CompiledProgram<E> {
    /// Type to convert evaluation results to: declared, else inferred, else `Any`
    pub fn output_type(&self, bridge: &TypeBridge) -> ValueType {
        if let Some(declared) = &self.declared_type {
            return declared.clone();
        }
        self.result_type
            .as_ref()
            .and_then(|ty| bridge.from_expr_type(ty).ok())
            .unwrap_or(ValueType::Any)
    }
}

impl<E: ExpressionEngine> fmt::Debug for CompiledProgram<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("result_type", &self.result_type)
            .field("declared_type", &self.declared_type)
            .field("retains_syntax_tree", &self.syntax_tree.is_some())
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

/// A compiled rule node
pub struct CompiledRule<E: ExpressionEngine> {
    pub id: String,

    /// Dotted id path from the root
    pub path: String,

    /// Expression text; `None` for aggregator rules
    pub expression: Option<String>,

    pub program: Option<CompiledProgram<E>>,

    /// Value bound to `self` for this rule only
    pub self_value: Option<Value>,

    pub options: EvalOptions,

    pub children: Vec<Arc<CompiledRule<E>>>,
}

impl<E: ExpressionEngine> CompiledRule<E> {
    /// Get a direct child by id
    pub fn child(&self, id: &str) -> Option<&Arc<CompiledRule<E>>> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Number of rules in this subtree, including this one
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }
}

impl<E: ExpressionEngine> fmt::Debug for CompiledRule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("path", &self.path)
            .field("expression", &self.expression)
            .field("program", &self.program)
            .field("options", &self.options)
            .field("children", &self.children)
            .finish()
    }
}

/// A compiled rule tree
pub struct CompiledTree<E: ExpressionEngine> {
    engine: Arc<E>,
    bridge: TypeBridge,
    root: Arc<CompiledRule<E>>,
    collect_diagnostics: bool,
}

impl<E: ExpressionEngine> CompiledTree<E> {
    pub(crate) fn new(
        engine: Arc<E>,
        bridge: TypeBridge,
        root: CompiledRule<E>,
        collect_diagnostics: bool,
    ) -> Self {
        Self {
            engine,
            bridge,
            root: Arc::new(root),
            collect_diagnostics,
        }
    }

    pub fn root(&self) -> &Arc<CompiledRule<E>> {
        &self.root
    }

    /// Engine that compiled the tree
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn bridge(&self) -> &TypeBridge {
        &self.bridge
    }

    /// Whether syntax trees were retained for diagnostics
    pub fn collects_diagnostics(&self) -> bool {
        self.collect_diagnostics
    }

    /// Number of rules in the tree
    pub fn rule_count(&self) -> usize {
        self.root.size()
    }

    /// Find a rule by dotted id path, e.g. `root.child.grandchild`
    pub fn find(&self, path: &str) -> Option<&Arc<CompiledRule<E>>> {
        let mut segments = path.split('.');
        if segments.next() != Some(self.root.id.as_str()) {
            return None;
        }
        segments.try_fold(&self.root, |rule, id| rule.child(id))
    }
}

impl<E: ExpressionEngine> Clone for CompiledTree<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            bridge: self.bridge.clone(),
            root: Arc::clone(&self.root),
            collect_diagnostics: self.collect_diagnostics,
        }
    }
}

impl<E: ExpressionEngine> fmt::Debug for CompiledTree<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTree")
            .field("engine", &self.engine.name())
            .field("collect_diagnostics", &self.collect_diagnostics)
            .field("root", &self.root)
            .finish()
    }
}
