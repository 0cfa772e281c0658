//! Evaluation diagnostics
//!
//! Rebuilds a source-located explanation of one expression evaluation
//! from the retained syntax tree and the sparse value trace the engine
//! recorded. Sub-expressions that were never evaluated, such as the
//! untaken side of `&&`, `||` or `?:`, have no trace entry and are left
//! out.

mod unparser;

use arbor_core::expr::{EvalTrace, Expr, ExprKind, ExprValue, SourcePosition, SyntaxTree};
use arbor_core::{TypeBridge, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unparser::Unparser;

/// Where a diagnostic value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Read from the input data
    Input,
    /// Computed by the expression
    Evaluated,
}

/// Explanation of one evaluated sub-expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Canonical text of the sub-expression
    pub text: String,

    /// Value it evaluated to
    pub value: Value,

    pub provenance: Provenance,

    /// Location in the rule's expression text
    pub position: SourcePosition,

    /// Evaluated operands, in source order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Diagnostic>,
}

impl Diagnostic {
    /// Find the first diagnostic in this subtree with the given text
    pub fn find(&self, text: &str) -> Option<&Diagnostic> {
        if self.text == text {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(text))
    }

    /// Number of diagnostics in this subtree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Diagnostic::size).sum::<usize>()
    }
}

/// Rebuilds diagnostics for one evaluation
pub struct DiagnosticsReconstructor<'a> {
    bridge: &'a TypeBridge,
    tree: &'a SyntaxTree,
    trace: &'a EvalTrace,
    /// Schema element names; identifiers among them are inputs
    inputs: &'a BTreeSet<String>,
    unparser: Unparser<'a>,
}

impl<'a> DiagnosticsReconstructor<'a> {
    pub fn new(
        bridge: &'a TypeBridge,
        tree: &'a SyntaxTree,
        trace: &'a EvalTrace,
        inputs: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            bridge,
            tree,
            trace,
            inputs,
            unparser: Unparser::new(&tree.source_info),
        }
    }

    /// Diagnostic of the whole expression; `None` if it was not evaluated
    pub fn reconstruct(&self) -> Option<Diagnostic> {
        self.node(&self.tree.expr)
    }

    fn node(&self, expr: &Expr) -> Option<Diagnostic> {
        let value = self.trace.get(expr.id)?;

        let (text, children) = match &expr.kind {
            ExprKind::Comprehension(_) => (self.describe_comprehension(expr), Vec::new()),
            ExprKind::Call { target, args, .. } => {
                let children = target
                    .as_deref()
                    .into_iter()
                    .chain(args)
                    .filter_map(|operand| self.node(operand))
                    .collect();
                (self.unparser.unparse(expr), children)
            }
            ExprKind::List(items) => (
                self.unparser.unparse(expr),
                items.iter().filter_map(|item| self.node(item)).collect(),
            ),
            ExprKind::Map(entries) => (
                self.unparser.unparse(expr),
                entries
                    .iter()
                    .flat_map(|(key, value)| [key, value])
                    .filter_map(|e| self.node(e))
                    .collect(),
            ),
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Select { .. } => {
                (self.unparser.unparse(expr), Vec::new())
            }
        };

        Some(Diagnostic {
            text,
            value: self.convert(expr, value),
            provenance: self.provenance(expr),
            position: self
                .tree
                .source_info
                .position(expr.id)
                .unwrap_or_else(|| self.tree.source_info.locate(0)),
            children,
        })
    }

    /// `for {quantifier} {var} in {range}: {predicate}`
    fn describe_comprehension(&self, expr: &Expr) -> String {
        let Some(ExprKind::Call {
            function,
            target,
            args,
        }) = self.tree.source_info.macro_calls.get(&expr.id).map(|call| &call.kind)
        else {
            return self.unparser.unparse(expr);
        };

        let range = target
            .as_deref()
            .map(|t| self.unparser.unparse(t))
            .unwrap_or_default();
        match args.split_first() {
            Some((var, rest)) => {
                let body: Vec<String> = rest.iter().map(|e| self.unparser.unparse(e)).collect();
                format!(
                    "for {} {} in {}: {}",
                    function,
                    self.unparser.unparse(var),
                    range,
                    body.join(", ")
                )
            }
            None => format!("for {} in {}", function, range),
        }
    }

    fn provenance(&self, expr: &Expr) -> Provenance {
        let reads_input = match &expr.kind {
            ExprKind::Ident(_) => true,
            ExprKind::Select { test_only, .. } => !test_only,
            _ => false,
        };
        match expr.select_root() {
            Some(root) if reads_input && self.inputs.contains(root) => Provenance::Input,
            _ => Provenance::Evaluated,
        }
    }

    /// Convert a traced value using the checker's type, falling back to a
    /// dynamic conversion and finally to the value's text
    fn convert(&self, expr: &Expr, value: &ExprValue) -> Value {
        let value_type = self
            .tree
            .type_of(expr.id)
            .and_then(|ty| self.bridge.from_expr_type(ty).ok())
            .unwrap_or(ValueType::Any);

        self.bridge
            .convert_runtime_value(value, &value_type)
            .or_else(|_| self.bridge.convert_dynamic(value))
            .unwrap_or_else(|_| Value::String(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StandardEngine;
    use arbor_core::expr::{Activation, Decl, Declarations, ExprType, ExpressionEngine};
    use std::collections::HashMap;

    fn explain(source: &str, bindings: Vec<(&str, ExprValue)>) -> Option<Diagnostic> {
        let mut decls = Declarations::default();
        decls.declare(Decl::ident("amount", ExprType::INT));
        decls.declare(Decl::ident("country", ExprType::STRING));
        decls.declare(Decl::ident("tags", ExprType::list(ExprType::STRING)));
        decls.declare(Decl::ident("self", ExprType::Dyn));

        let engine = StandardEngine::new();
        let compiled = engine.compile(source, &decls, true).unwrap();
        let activation = Activation::from_bindings(
            bindings
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
        );
        let evaluation = engine.evaluate(&compiled.program, &activation).unwrap();
        let tree = compiled.syntax_tree.unwrap();
        let trace = evaluation.trace.unwrap();
        let inputs: BTreeSet<String> =
            ["amount", "country", "tags"].iter().map(|s| s.to_string()).collect();
        let bridge = TypeBridge::default();
        DiagnosticsReconstructor::new(&bridge, &tree, &trace, &inputs).reconstruct()
    }

    #[test]
    fn test_operands_and_provenance() {
        let d = explain(
            "amount > self",
            vec![("amount", ExprValue::Int(5)), ("self", ExprValue::Int(3))],
        )
        .unwrap();
        assert_eq!(d.text, "amount > self");
        assert_eq!(d.value, Value::Bool(true));
        assert_eq!(d.provenance, Provenance::Evaluated);
        assert_eq!(d.children.len(), 2);
        assert_eq!(d.children[0].provenance, Provenance::Input);
        assert_eq!(d.children[0].value, Value::Int(5));
        assert_eq!(d.children[1].text, "self");
        assert_eq!(d.children[1].provenance, Provenance::Evaluated);
    }

    #[test]
    fn test_short_circuit_omits_untaken_branch() {
        let d = explain(
            "amount > 10 || country == 'US'",
            vec![("amount", ExprValue::Int(50))],
        )
        .unwrap();
        assert_eq!(d.children.len(), 1);
        assert_eq!(d.children[0].text, "amount > 10");
        assert!(d.find("country").is_none());

        let d = explain(
            "amount > 10 ? 'high' : country",
            vec![("amount", ExprValue::Int(1)), ("country", ExprValue::String("FR".into()))],
        )
        .unwrap();
        assert_eq!(d.value, Value::String("FR".into()));
        assert!(d.find("\"high\"").is_none());
        assert!(d.find("country").is_some());
    }

    #[test]
    fn test_positions_are_one_based() {
        let d = explain(
            "amount > 1 &&\n  country == 'FR'",
            vec![
                ("amount", ExprValue::Int(5)),
                ("country", ExprValue::String("FR".into())),
            ],
        )
        .unwrap();
        let country = d.find("country").unwrap();
        assert_eq!(country.position.line, 2);
        assert_eq!(country.position.column, 3);
        assert_eq!(d.position.line, 1);
        assert_eq!(d.position.column, 1);
    }

    #[test]
    fn test_comprehension_line() {
        let d = explain(
            "tags.exists(t, t == 'vip')",
            vec![(
                "tags",
                ExprValue::List(vec![ExprValue::String("vip".into())]),
            )],
        )
        .unwrap();
        assert_eq!(d.text, "for exists t in tags: t == \"vip\"");
        assert_eq!(d.value, Value::Bool(true));
        assert!(d.children.is_empty());
    }
}
