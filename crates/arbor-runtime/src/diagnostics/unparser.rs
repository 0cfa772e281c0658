//! Render syntax tree nodes back to expression text

use arbor_core::expr::ast::operators;
use arbor_core::expr::{Expr, ExprKind, SourceInfo};

const CONDITIONAL_PRECEDENCE: u8 = 0;
const UNARY_PRECEDENCE: u8 = 6;
const PRIMARY_PRECEDENCE: u8 = 7;

/// Turns syntax tree nodes into canonical source text
///
/// Nodes produced by macro expansion render as the original macro call.
pub(crate) struct Unparser<'a> {
    source_info: &'a SourceInfo,
}

impl<'a> Unparser<'a> {
    pub(crate) fn new(source_info: &'a SourceInfo) -> Self {
        Self { source_info }
    }

    pub(crate) fn unparse(&self, expr: &Expr) -> String {
        let mut out = String::new();
        self.write(expr, &mut out);
        out
    }

    fn write(&self, expr: &Expr, out: &mut String) {
        if let Some(call) = self.source_info.macro_calls.get(&expr.id) {
            if let ExprKind::Call {
                function,
                target,
                args,
            } = &call.kind
            {
                self.write_call(function, target.as_deref(), args, out);
                return;
            }
        }

        match &expr.kind {
            ExprKind::Literal(literal) => out.push_str(&literal.to_string()),
            ExprKind::Ident(name) => out.push_str(name),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => {
                if *test_only {
                    out.push_str("has(");
                }
                self.write_operand(operand, out);
                out.push('.');
                out.push_str(field);
                if *test_only {
                    out.push(')');
                }
            }
            ExprKind::Call {
                function,
                target,
                args,
            } => self.write_call(function, target.as_deref(), args, out),
            ExprKind::List(items) => {
                out.push('[');
                self.write_list(items, out);
                out.push(']');
            }
            ExprKind::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write(key, out);
                    out.push_str(": ");
                    self.write(value, out);
                }
                out.push('}');
            }
            ExprKind::Comprehension(_) => out.push_str("<comprehension>"),
        }
    }

    fn write_call(&self, function: &str, target: Option<&Expr>, args: &[Expr], out: &mut String) {
        if target.is_none() {
            match args {
                [operand] => {
                    if let Some(symbol) = operators::unary(function) {
                        out.push_str(symbol);
                        self.write_nested(operand, UNARY_PRECEDENCE, out);
                        return;
                    }
                }
                [left, right] => {
                    if let Some((symbol, precedence)) = operators::binary(function) {
                        self.write_nested(left, precedence, out);
                        out.push(' ');
                        out.push_str(symbol);
                        out.push(' ');
                        // Left-associative: an equal-precedence right operand needs parentheses
                        self.write_nested(right, precedence + 1, out);
                        return;
                    }
                    if function == operators::INDEX {
                        self.write_operand(left, out);
                        out.push('[');
                        self.write(right, out);
                        out.push(']');
                        return;
                    }
                }
                [condition, then, otherwise] if function == operators::CONDITIONAL => {
                    self.write_nested(condition, CONDITIONAL_PRECEDENCE + 1, out);
                    out.push_str(" ? ");
                    self.write_nested(then, CONDITIONAL_PRECEDENCE + 1, out);
                    out.push_str(" : ");
                    self.write(otherwise, out);
                    return;
                }
                _ => {}
            }
        }

        if let Some(target) = target {
            self.write_operand(target, out);
            out.push('.');
        }
        out.push_str(function);
        out.push('(');
        self.write_list(args, out);
        out.push(')');
    }

    fn write_list(&self, items: &[Expr], out: &mut String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write(item, out);
        }
    }

    /// Receiver of a selection, index or method call
    fn write_operand(&self, expr: &Expr, out: &mut String) {
        self.write_nested(expr, PRIMARY_PRECEDENCE, out);
    }

    fn write_nested(&self, expr: &Expr, min_precedence: u8, out: &mut String) {
        if self.precedence(expr) < min_precedence {
            out.push('(');
            self.write(expr, out);
            out.push(')');
        } else {
            self.write(expr, out);
        }
    }

    fn precedence(&self, expr: &Expr) -> u8 {
        if self.source_info.macro_calls.contains_key(&expr.id) {
            return PRIMARY_PRECEDENCE;
        }
        match &expr.kind {
            ExprKind::Call {
                function,
                target: None,
                args,
            } => match args.len() {
                1 if operators::unary(function).is_some() => UNARY_PRECEDENCE,
                2 => operators::binary(function).map_or(PRIMARY_PRECEDENCE, |(_, p)| p),
                3 if function == operators::CONDITIONAL => CONDITIONAL_PRECEDENCE,
                _ => PRIMARY_PRECEDENCE,
            },
            ExprKind::Literal(arbor_core::expr::Literal::Int(i)) if *i < 0 => UNARY_PRECEDENCE,
            ExprKind::Literal(arbor_core::expr::Literal::Double(d)) if d.is_sign_negative() => {
                UNARY_PRECEDENCE
            }
            _ => PRIMARY_PRECEDENCE,
        }
    }
}
