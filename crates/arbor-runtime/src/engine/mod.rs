//! Standard expression engine
//!
//! A small CEL-flavoured expression language: the parser from
//! `arbor-parser`, the type checker from `arbor-compiler` and a
//! tree-walking interpreter with optional value tracing.

mod functions;
mod interpreter;
mod operators;

pub use functions::{parse_duration, HostFunction};

use arbor_compiler::semantic::builtins;
use arbor_compiler::{CheckError, TypeChecker};
use arbor_core::expr::{
    Activation, Compiled, Decl, Declarations, EngineError, EngineResult, Evaluation, Expr, ExprId,
    ExprKind, ExpressionEngine, Literal, SyntaxTree,
};
use arbor_core::ExprValue;
use arbor_parser::ExpressionParser;
use interpreter::Interpreter;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A compiled standard-engine expression
pub struct StandardProgram {
    expr: Expr,
    /// Regular expressions of `matches` calls with a literal pattern
    patterns: HashMap<ExprId, Regex>,
    trace: bool,
}

impl StandardProgram {
    /// Whether evaluations record a value trace
    pub fn traces(&self) -> bool {
        self.trace
    }
}

impl fmt::Debug for StandardProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardProgram")
            .field("root", &self.expr.id)
            .field("patterns", &self.patterns.len())
            .field("trace", &self.trace)
            .finish()
    }
}

/// The standard expression engine
#[derive(Clone, Default)]
pub struct StandardEngine {
    functions: HashMap<String, HostFunction>,
}

impl StandardEngine {
    /// Create an engine with the standard functions only
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host function.
    ///
    /// Expressions can call it once a schema declares it with a
    /// `ValueType::Function` element of the same name.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[ExprValue]) -> Result<ExprValue, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Names of the registered host functions
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Every declared function called by `expr` must have an implementation
    fn check_host_functions(&self, expr: &Expr, declarations: &Declarations) -> EngineResult<()> {
        let mut missing = None;
        visit(expr, &mut |node| {
            if let ExprKind::Call {
                function,
                target: None,
                ..
            } = &node.kind
            {
                let declared = matches!(declarations.get(function), Some(Decl::Function { .. }));
                if declared && !self.functions.contains_key(function) && missing.is_none() {
                    missing = Some(function.clone());
                }
            }
        });
        match missing {
            Some(function) => Err(EngineError::Check(format!(
                "function '{}' is declared but has no implementation",
                function
            ))),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StandardEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.function_names().collect();
        names.sort_unstable();
        f.debug_struct("StandardEngine")
            .field("functions", &names)
            .finish()
    }
}

impl ExpressionEngine for StandardEngine {
    type Program = StandardProgram;

    fn name(&self) -> &str {
        "standard"
    }

    fn compile(
        &self,
        source: &str,
        declarations: &Declarations,
        retain_syntax_tree: bool,
    ) -> EngineResult<Compiled<StandardProgram>> {
        let parsed = ExpressionParser::parse(source).map_err(|e| EngineError::Parse {
            message: e.to_string(),
            offset: e.offset(),
        })?;
        let checked = TypeChecker::new(declarations)
            .check(&parsed.expr)
            .map_err(check_failure)?;
        self.check_host_functions(&parsed.expr, declarations)?;
        let patterns = literal_patterns(&parsed.expr)?;

        let syntax_tree = retain_syntax_tree.then(|| SyntaxTree {
            source: parsed.source,
            expr: parsed.expr.clone(),
            source_info: parsed.source_info,
            type_map: checked.type_map,
        });

        tracing::trace!(
            "Compiled expression: {} ({} literal patterns)",
            source,
            patterns.len()
        );
        Ok(Compiled {
            program: StandardProgram {
                expr: parsed.expr,
                patterns,
                trace: retain_syntax_tree,
            },
            result_type: Some(checked.result_type),
            syntax_tree,
        })
    }

    fn evaluate(&self, program: &StandardProgram, activation: &Activation) -> EngineResult<Evaluation> {
        let (value, trace) =
            Interpreter::new(activation, &self.functions, &program.patterns, program.trace)
                .run(&program.expr)?;
        Ok(Evaluation { value, trace })
    }
}

fn check_failure(error: CheckError) -> EngineError {
    EngineError::Check(error.to_string())
}

/// Pre-compile the pattern of every `matches` call whose pattern is a literal
fn literal_patterns(expr: &Expr) -> EngineResult<HashMap<ExprId, Regex>> {
    let mut patterns = HashMap::new();
    let mut failure = None;
    visit(expr, &mut |node| {
        let ExprKind::Call {
            function,
            target,
            args,
        } = &node.kind
        else {
            return;
        };
        if function != builtins::MATCHES {
            return;
        }
        let pattern = match (target, args.as_slice()) {
            (Some(_), [pattern]) | (None, [_, pattern]) => pattern,
            _ => return,
        };
        if let ExprKind::Literal(Literal::String(text)) = &pattern.kind {
            match functions::compile_pattern(text) {
                Ok(regex) => {
                    patterns.insert(node.id, regex);
                }
                Err(message) => {
                    failure.get_or_insert(message);
                }
            }
        }
    });
    match failure {
        Some(message) => Err(EngineError::Check(message)),
        None => Ok(patterns),
    }
}

/// Pre-order walk over every node of a syntax tree
fn visit(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) => {}
        ExprKind::Select { operand, .. } => visit(operand, f),
        ExprKind::Call { target, args, .. } => {
            if let Some(target) = target {
                visit(target, f);
            }
            for arg in args {
                visit(arg, f);
            }
        }
        ExprKind::List(items) => {
            for item in items {
                visit(item, f);
            }
        }
        ExprKind::Map(entries) => {
            for (key, value) in entries {
                visit(key, f);
                visit(value, f);
            }
        }
        ExprKind::Comprehension(comprehension) => {
            visit(&comprehension.iter_range, f);
            visit(&comprehension.accu_init, f);
            visit(&comprehension.loop_condition, f);
            visit(&comprehension.loop_step, f);
            visit(&comprehension.result, f);
        }
    }
}
