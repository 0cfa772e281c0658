//! Main compiler
//!
//! Walks a rule tree in pre-order and compiles every rule expression
//! against its effective schema through an expression engine.

use crate::compiled::{CompiledProgram, CompiledRule, CompiledTree};
use crate::error::{CompileError, Result};
use arbor_core::expr::{Decl, Declarations, EngineError, ExprType, ExpressionEngine};
use arbor_core::{BridgeError, RuleNode, Schema, TypeBridge, SELF_IDENT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Compiler options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Retain syntax trees so evaluations can return diagnostics
    pub collect_diagnostics: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect_diagnostics(mut self, enable: bool) -> Self {
        self.collect_diagnostics = enable;
        self
    }
}

/// Schema in scope for a subtree, with its lowered declarations
struct SchemaScope<'a> {
    schema: &'a Schema,
    inputs: Arc<BTreeSet<String>>,
}

/// The rule tree compiler
pub struct Compiler<E: ExpressionEngine> {
    engine: Arc<E>,
    bridge: TypeBridge,
    options: CompileOptions,
}

impl<E: ExpressionEngine> Compiler<E> {
    /// Create a new compiler with default options
    pub fn new(engine: Arc<E>, bridge: TypeBridge) -> Self {
        Self::with_options(engine, bridge, CompileOptions::default())
    }

    /// Create a new compiler with custom options
    pub fn with_options(engine: Arc<E>, bridge: TypeBridge, options: CompileOptions) -> Self {
        Self {
            engine,
            bridge,
            options,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Compile a rule tree.
    ///
    /// The first failure aborts the whole call and names the failing rule's
    /// dotted path.
    pub fn compile(&self, root: &RuleNode) -> Result<CompiledTree<E>> {
        let compiled = self.compile_rule(root, root.id.clone(), None)?;
        let programs = count_programs(&compiled);
        let tree = CompiledTree::new(
            Arc::clone(&self.engine),
            self.bridge.clone(),
            compiled,
            self.options.collect_diagnostics,
        );

        tracing::info!(
            "Compiled rule tree '{}' with engine {}: {} rules, {} expressions",
            root.id,
            self.engine.name(),
            tree.rule_count(),
            programs
        );
        Ok(tree)
    }

    fn compile_rule(
        &self,
        node: &RuleNode,
        path: String,
        inherited: Option<&SchemaScope<'_>>,
    ) -> Result<CompiledRule<E>> {
        let own_scope = node.schema.as_ref().map(|schema| SchemaScope {
            schema,
            inputs: Arc::new(schema.names().map(str::to_string).collect()),
        });
        let scope = own_scope.as_ref().or(inherited);

        let program = match node.expression_text() {
            Some(text) => {
                let scope = scope.ok_or_else(|| CompileError::MissingSchema { path: path.clone() })?;
                let program = self.compile_expression(node, text, scope, &path)?;
                tracing::debug!(
                    "Compiled rule '{}' ({})",
                    path,
                    program
                        .result_type
                        .as_ref()
                        .map(ExprType::to_string)
                        .unwrap_or_else(|| "untyped".to_string())
                );
                Some(program)
            }
            None => {
                tracing::debug!("Rule '{}' has no expression", path);
                None
            }
        };

        let mut seen = HashSet::with_capacity(node.children.len());
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let child_path = format!("{}.{}", path, child.id);
            if !seen.insert(child.id.as_str()) {
                return Err(CompileError::DuplicateRuleId { path: child_path });
            }
            children.push(Arc::new(self.compile_rule(child, child_path, scope)?));
        }

        Ok(CompiledRule {
            id: node.id.clone(),
            path,
            expression: node.expression_text().map(str::to_string),
            program,
            self_value: node.self_value.clone(),
            options: node.options.clone(),
            children,
        })
    }

    fn compile_expression(
        &self,
        node: &RuleNode,
        text: &str,
        scope: &SchemaScope<'_>,
        path: &str,
    ) -> Result<CompiledProgram<E>> {
        let declarations = self.declarations(scope.schema, path)?;
        let compiled = self
            .engine
            .compile(text, &declarations, self.options.collect_diagnostics)
            .map_err(|e| engine_failure(e, path))?;

        if let Some(declared) = &node.result_type {
            self.bridge
                .validate_result_type(compiled.result_type.as_ref(), Some(declared))
                .map_err(|e| mismatch(e, declared.to_string(), compiled.result_type.as_ref(), path))?;
        }

        Ok(CompiledProgram {
            program: compiled.program,
            result_type: compiled.result_type,
            declared_type: node.result_type.clone(),
            syntax_tree: compiled.syntax_tree,
            inputs: Arc::clone(&scope.inputs),
        })
    }

    /// Schema declarations plus the reserved `self` identifier
    fn declarations(&self, schema: &Schema, path: &str) -> Result<Declarations> {
        let mut declarations = self
            .bridge
            .to_declarations(schema)
            .map_err(|source| CompileError::Declaration {
                path: path.to_string(),
                source,
            })?;
        declarations.declare(Decl::ident(SELF_IDENT, ExprType::Dyn));
        Ok(declarations)
    }
}

fn engine_failure(error: EngineError, path: &str) -> CompileError {
    let path = path.to_string();
    match error {
        EngineError::Parse { message, offset } => CompileError::ParseFailure {
            path,
            message,
            offset,
        },
        EngineError::Check(message) | EngineError::Runtime(message) => {
            CompileError::TypeCheckFailure { path, message }
        }
        EngineError::UnboundIdentifier(name) => CompileError::TypeCheckFailure {
            path,
            message: format!("Undeclared reference: {}", name),
        },
    }
}

fn mismatch(error: BridgeError, declared: String, actual: Option<&ExprType>, path: &str) -> CompileError {
    let (expected, actual) = match error {
        BridgeError::ResultTypeMismatch { expected, actual } => (expected, actual),
        _ => (
            declared,
            actual.map(ExprType::to_string).unwrap_or_else(|| "<none>".to_string()),
        ),
    };
    CompileError::ResultTypeMismatch {
        path: path.to_string(),
        expected,
        actual,
    }
}

fn count_programs<E: ExpressionEngine>(rule: &CompiledRule<E>) -> usize {
    usize::from(rule.program.is_some())
        + rule.children.iter().map(|c| count_programs(c)).sum::<usize>()
}
