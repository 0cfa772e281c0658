//! Macro expansion
//!
//! `has` becomes a presence-test select; the list macros become
//! comprehensions. The original call of every expansion is kept in
//! `SourceInfo::macro_calls`, keyed by the id of the expanded node.

use crate::error::{ParseError, Result};
use crate::expression_parser::Parser;
use arbor_core::expr::ast::operators;
use arbor_core::expr::{Comprehension, Expr, ExprKind, Literal};

/// Accumulator variable of expanded comprehensions
pub const ACCUMULATOR: &str = "__result__";

pub const HAS: &str = "has";
pub const ALL: &str = "all";
pub const EXISTS: &str = "exists";
pub const EXISTS_ONE: &str = "exists_one";
pub const MAP: &str = "map";
pub const FILTER: &str = "filter";

/// Returns true if `function` names a receiver-style macro
pub fn is_receiver_macro(function: &str) -> bool {
    matches!(function, ALL | EXISTS | EXISTS_ONE | MAP | FILTER)
}

impl Parser {
    /// A global call, expanding `has`
    pub(crate) fn global_call(&mut self, function: String, offset: usize, args: Vec<Expr>) -> Result<Expr> {
        if function != HAS {
            return Ok(self.new_expr(
                offset,
                ExprKind::Call {
                    function,
                    target: None,
                    args,
                },
            ));
        }

        let mut args = args.into_iter();
        let (Some(arg), None) = (args.next(), args.next()) else {
            return Err(invalid_macro(HAS, "expects exactly one argument", offset));
        };
        let ExprKind::Select { operand, field, .. } = arg.kind.clone() else {
            return Err(invalid_macro(HAS, "argument must be a field selection", offset));
        };

        let expanded = self.new_expr(
            offset,
            ExprKind::Select {
                operand,
                field,
                test_only: true,
            },
        );
        self.record_macro(&expanded, HAS, None, vec![arg]);
        Ok(expanded)
    }

    /// A receiver-style call, expanding the list macros
    pub(crate) fn receiver_call(
        &mut self,
        target: Expr,
        function: String,
        offset: usize,
        args: Vec<Expr>,
    ) -> Result<Expr> {
        if !is_receiver_macro(&function) {
            let start = self.start_of(&target);
            return Ok(self.new_expr(
                start,
                ExprKind::Call {
                    function,
                    target: Some(Box::new(target)),
                    args,
                },
            ));
        }

        let arity_ok = match function.as_str() {
            MAP => matches!(args.len(), 2 | 3),
            _ => args.len() == 2,
        };
        if !arity_ok {
            return Err(invalid_macro(&function, "wrong number of arguments", offset));
        }
        let iter_var = match &args[0].kind {
            ExprKind::Ident(name) if name != ACCUMULATOR => name.clone(),
            _ => {
                return Err(invalid_macro(
                    &function,
                    "first argument must be a simple variable name",
                    offset,
                ))
            }
        };

        let original_args = args.clone();
        let original_target = target.clone();
        let start = self.start_of(&target);

        let mut rest = args.into_iter().skip(1);
        let first = rest.next();
        let second = rest.next();
        let (init, condition, step, result) = match (function.as_str(), first, second) {
            (ALL, Some(predicate), None) => {
                let init = self.literal(offset, Literal::Bool(true));
                let condition = self.ident(offset, ACCUMULATOR);
                let accu = self.ident(offset, ACCUMULATOR);
                let step = self.call(offset, operators::LOGICAL_AND, vec![accu, predicate]);
                let result = self.ident(offset, ACCUMULATOR);
                (init, condition, step, result)
            }
            (EXISTS, Some(predicate), None) => {
                let init = self.literal(offset, Literal::Bool(false));
                let accu = self.ident(offset, ACCUMULATOR);
                let condition = self.call(offset, operators::LOGICAL_NOT, vec![accu]);
                let accu = self.ident(offset, ACCUMULATOR);
                let step = self.call(offset, operators::LOGICAL_OR, vec![accu, predicate]);
                let result = self.ident(offset, ACCUMULATOR);
                (init, condition, step, result)
            }
            (EXISTS_ONE, Some(predicate), None) => {
                let init = self.literal(offset, Literal::Int(0));
                let condition = self.literal(offset, Literal::Bool(true));
                let accu = self.ident(offset, ACCUMULATOR);
                let one = self.literal(offset, Literal::Int(1));
                let incremented = self.call(offset, operators::ADD, vec![accu, one]);
                let unchanged = self.ident(offset, ACCUMULATOR);
                let step = self.call(
                    offset,
                    operators::CONDITIONAL,
                    vec![predicate, incremented, unchanged],
                );
                let accu = self.ident(offset, ACCUMULATOR);
                let one = self.literal(offset, Literal::Int(1));
                let result = self.call(offset, operators::EQUALS, vec![accu, one]);
                (init, condition, step, result)
            }
            (MAP, Some(transform), None) => {
                let init = self.new_expr(offset, ExprKind::List(Vec::new()));
                let condition = self.literal(offset, Literal::Bool(true));
                let step = self.append(offset, transform);
                let result = self.ident(offset, ACCUMULATOR);
                (init, condition, step, result)
            }
            (MAP, Some(predicate), Some(transform)) => {
                let init = self.new_expr(offset, ExprKind::List(Vec::new()));
                let condition = self.literal(offset, Literal::Bool(true));
                let appended = self.append(offset, transform);
                let unchanged = self.ident(offset, ACCUMULATOR);
                let step = self.call(
                    offset,
                    operators::CONDITIONAL,
                    vec![predicate, appended, unchanged],
                );
                let result = self.ident(offset, ACCUMULATOR);
                (init, condition, step, result)
            }
            (FILTER, Some(predicate), None) => {
                let init = self.new_expr(offset, ExprKind::List(Vec::new()));
                let condition = self.literal(offset, Literal::Bool(true));
                let element = self.ident(offset, &iter_var);
                let appended = self.append(offset, element);
                let unchanged = self.ident(offset, ACCUMULATOR);
                let step = self.call(
                    offset,
                    operators::CONDITIONAL,
                    vec![predicate, appended, unchanged],
                );
                let result = self.ident(offset, ACCUMULATOR);
                (init, condition, step, result)
            }
            _ => return Err(invalid_macro(&function, "wrong number of arguments", offset)),
        };

        let expanded = self.new_expr(
            start,
            ExprKind::Comprehension(Box::new(Comprehension {
                iter_var,
                iter_range: target,
                accu_var: ACCUMULATOR.to_string(),
                accu_init: init,
                loop_condition: condition,
                loop_step: step,
                result,
            })),
        );
        self.record_macro(&expanded, &function, Some(original_target), original_args);
        Ok(expanded)
    }

    /// `__result__ + [element]`
    fn append(&mut self, offset: usize, element: Expr) -> Expr {
        let accu = self.ident(offset, ACCUMULATOR);
        let single = self.new_expr(offset, ExprKind::List(vec![element]));
        self.call(offset, operators::ADD, vec![accu, single])
    }

    fn record_macro(&mut self, expanded: &Expr, function: &str, target: Option<Expr>, args: Vec<Expr>) {
        let call = Expr::new(
            expanded.id,
            ExprKind::Call {
                function: function.to_string(),
                target: target.map(Box::new),
                args,
            },
        );
        self.source_info.macro_calls.insert(expanded.id, call);
    }
}

fn invalid_macro(name: &str, message: &str, offset: usize) -> ParseError {
    ParseError::InvalidMacro {
        name: name.to_string(),
        message: message.to_string(),
        offset,
    }
}
