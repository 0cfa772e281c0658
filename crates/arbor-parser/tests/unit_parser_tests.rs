//! Unit tests for the expression parser
//!
//! Tests node ids, source positions and macro records on realistic rule
//! expressions.

use arbor_core::expr::ast::operators;
use arbor_core::expr::{Expr, ExprKind, Literal};
use arbor_parser::{ExpressionParser, ParseError};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

fn collect_ids(expr: &Expr, ids: &mut Vec<i64>) {
    ids.push(expr.id);
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) => {}
        ExprKind::Select { operand, .. } => collect_ids(operand, ids),
        ExprKind::Call { target, args, .. } => {
            if let Some(target) = target {
                collect_ids(target, ids);
            }
            for arg in args {
                collect_ids(arg, ids);
            }
        }
        ExprKind::List(items) => items.iter().for_each(|item| collect_ids(item, ids)),
        ExprKind::Map(entries) => {
            for (k, v) in entries {
                collect_ids(k, ids);
                collect_ids(v, ids);
            }
        }
        ExprKind::Comprehension(c) => {
            for e in [
                &c.iter_range,
                &c.accu_init,
                &c.loop_condition,
                &c.loop_step,
                &c.result,
            ] {
                collect_ids(e, ids);
            }
        }
    }
}

// =============================================================================
// Ids and positions
// =============================================================================

#[test]
fn test_every_node_has_unique_id_and_position() {
    let parsed = ExpressionParser::parse(
        r#"amount > 1000.0 && country in ["US", "CA"] || tags.exists(t, t == "vip")"#,
    )
    .unwrap();

    let mut ids = Vec::new();
    collect_ids(&parsed.expr, &mut ids);
    let unique: HashSet<i64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    for id in ids {
        assert!(parsed.source_info.position(id).is_some(), "node {} has no position", id);
    }
}

#[test]
fn test_multiline_positions() {
    let source = "order.total > 100\n  && order.customer.vip";
    let parsed = ExpressionParser::parse(source).unwrap();

    let ExprKind::Call { function, args, .. } = &parsed.expr.kind else {
        panic!("Expected call");
    };
    assert_eq!(function, operators::LOGICAL_AND);

    let left = parsed.source_info.position(args[0].id).unwrap();
    assert_eq!((left.line, left.column), (1, 1));

    let right = parsed.source_info.position(args[1].id).unwrap();
    assert_eq!((right.offset, right.line, right.column), (23, 2, 6));
}

#[test]
fn test_parentheses_do_not_create_nodes() {
    let plain = ExpressionParser::parse("a + b").unwrap();
    let wrapped = ExpressionParser::parse("((a + b))").unwrap();
    assert_eq!(
        plain.source_info.positions.len(),
        wrapped.source_info.positions.len()
    );
}

// =============================================================================
// Syntax
// =============================================================================

#[test]
fn test_nested_conditional_is_right_associative() {
    let parsed = ExpressionParser::parse("a ? 1 : b ? 2 : 3").unwrap();
    let ExprKind::Call { function, args, .. } = &parsed.expr.kind else {
        panic!("Expected call");
    };
    assert_eq!(function, operators::CONDITIONAL);
    assert!(args[2].is_call_to(operators::CONDITIONAL));
}

#[test]
fn test_unary_chain() {
    let parsed = ExpressionParser::parse("!!flag").unwrap();
    let ExprKind::Call { args, .. } = &parsed.expr.kind else {
        panic!("Expected call");
    };
    assert!(parsed.expr.is_call_to(operators::LOGICAL_NOT));
    assert!(args[0].is_call_to(operators::LOGICAL_NOT));
}

#[test]
fn test_map_literal_with_mixed_values() {
    let parsed = ExpressionParser::parse(r#"{"limit": 10, "name": 'x', "ok": true}"#).unwrap();
    let ExprKind::Map(entries) = &parsed.expr.kind else {
        panic!("Expected map");
    };
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].1.kind, ExprKind::Literal(Literal::String("x".into())));
}

#[test]
fn test_receiver_call_on_index() {
    let parsed = ExpressionParser::parse(r#"names[0].startsWith("a")"#).unwrap();
    let ExprKind::Call { function, target, .. } = &parsed.expr.kind else {
        panic!("Expected call");
    };
    assert_eq!(function, "startsWith");
    assert!(target.as_ref().unwrap().is_call_to(operators::INDEX));
}

#[test]
fn test_macro_call_is_recorded_with_original_text_parts() {
    let parsed = ExpressionParser::parse("order.items.all(i, i.price > 0)").unwrap();
    let call = &parsed.source_info.macro_calls[&parsed.expr.id];
    let ExprKind::Call { function, target, args } = &call.kind else {
        panic!("Expected call");
    };
    assert_eq!(function, "all");
    assert_eq!(target.as_ref().unwrap().select_root(), Some("order"));
    assert_eq!(args[0].kind, ExprKind::Ident("i".into()));
    assert!(args[1].is_call_to(operators::GREATER));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_error_offsets() {
    let err = ExpressionParser::parse("amount > > 1").unwrap_err();
    assert_eq!(err.offset(), 9);

    let err = ExpressionParser::parse("size(tags").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedEnd { .. }));

    let err = ExpressionParser::parse("'open").unwrap_err();
    assert_eq!(err, ParseError::UnterminatedString { offset: 0 });
}
