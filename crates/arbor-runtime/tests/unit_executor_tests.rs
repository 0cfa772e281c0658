//! Unit tests for rule tree evaluation
//!
//! Trees are compiled with the standard engine and evaluated both
//! sequentially and through the worker pool.

use arbor_compiler::{CompileOptions, Compiler};
use arbor_core::{
    DiscardFail, EvalOptions, ExprValue, RuleNode, Schema, SortFunc, TypeBridge, Value, ValueType,
};
use arbor_runtime::{
    EvalError, EvaluateOptions, Executor, Parallelism, Provenance, ResultNode, StandardEngine,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helpers
// =============================================================================

fn schema() -> Schema {
    Schema::from_elements([
        ("amount", ValueType::int()),
        ("country", ValueType::string()),
        ("tags", ValueType::list(ValueType::string())),
    ])
    .unwrap()
}

fn rule(id: &str, expression: &str) -> RuleNode {
    RuleNode::new(id).with_expression(expression)
}

fn executor_with(engine: StandardEngine, root: RuleNode, diagnostics: bool) -> Executor<StandardEngine> {
    let compiler = Compiler::with_options(
        Arc::new(engine),
        TypeBridge::default(),
        CompileOptions::new().collect_diagnostics(diagnostics),
    );
    Executor::new(compiler.compile(&root).unwrap())
}

fn executor(root: RuleNode) -> Executor<StandardEngine> {
    executor_with(StandardEngine::new(), root, false)
}

fn data(amount: i64, country: &str) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    data.insert("amount".to_string(), Value::Int(amount));
    data.insert("country".to_string(), Value::String(country.to_string()));
    data.insert(
        "tags".to_string(),
        Value::List(vec![Value::String("vip".into()), Value::String("new".into())]),
    );
    data
}

fn evaluate_sequential(executor: &Executor<StandardEngine>, data: HashMap<String, Value>) -> ResultNode {
    executor
        .evaluate_sequential(data, &EvaluateOptions::default(), CancellationToken::new())
        .unwrap()
}

fn child_ids(node: &ResultNode) -> Vec<&str> {
    node.children.iter().map(|c| c.id.as_str()).collect()
}

// =============================================================================
// Basic evaluation
// =============================================================================

#[test]
fn test_single_rule() {
    let exec = executor(rule("large", "amount > 100").with_schema(schema()));

    let result = evaluate_sequential(&exec, data(500, "US"));
    assert_eq!(result.id, "large");
    assert!(result.pass);
    assert_eq!(result.value, Value::Bool(true));
    assert_eq!(result.rules_evaluated, 1);

    let result = evaluate_sequential(&exec, data(5, "US"));
    assert!(!result.pass);
    assert_eq!(result.value, Value::Bool(false));
}

#[test]
fn test_non_boolean_value_does_not_pass() {
    let exec = executor(rule("double", "amount * 2").with_schema(schema()));

    let result = evaluate_sequential(&exec, data(21, "US"));
    assert_eq!(result.value, Value::Int(42));
    assert!(!result.pass);
}

#[test]
fn test_aggregator_rule_passes() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .add_child(rule("us", "country == 'US'"))
        .add_child(rule("fr", "country == 'FR'"));
    let result = evaluate_sequential(&executor(root), data(1, "US"));

    assert!(result.pass);
    assert_eq!(result.value, Value::Bool(true));
    assert_eq!(child_ids(&result), vec!["us", "fr"]);
    assert!(result.find("root.us").unwrap().pass);
    assert!(!result.find("root.fr").unwrap().pass);
    assert_eq!(result.rules_evaluated, 3);
}

#[test]
fn test_declared_result_type_conversion() {
    let exec = executor(
        rule("ratio", "double(amount) / 4.0")
            .with_schema(schema())
            .with_result_type(ValueType::float()),
    );
    let result = evaluate_sequential(&exec, data(10, "US"));
    assert_eq!(result.value, Value::Float(2.5));
}

#[test]
fn test_missing_input_fails_evaluation() {
    let exec = executor(rule("large", "amount > 100").with_schema(schema()));
    let mut input = data(1, "US");
    input.remove("amount");

    let err = exec
        .evaluate_sequential(input, &EvaluateOptions::default(), CancellationToken::new())
        .unwrap_err();
    match err {
        EvalError::Evaluator { path, .. } => assert_eq!(path, "large"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_runtime_error_carries_rule_path() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .add_child(RuleNode::new("group").add_child(rule("div", "100 / amount > 1")));

    let err = executor(root)
        .evaluate_sequential(data(0, "US"), &EvaluateOptions::default(), CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.path(), Some("root.group.div"));
}

// =============================================================================
// Self values
// =============================================================================

#[test]
fn test_self_value_is_bound_per_rule() {
    let root = RuleNode::new("limits")
        .with_schema(schema())
        .add_child(rule("low", "amount > self").with_self_value(10))
        .add_child(rule("high", "amount > self").with_self_value(1000));

    let result = evaluate_sequential(&executor(root), data(500, "US"));
    assert!(result.find("limits.low").unwrap().pass);
    assert!(!result.find("limits.high").unwrap().pass);
}

#[test]
fn test_self_value_is_not_inherited() {
    let root = rule("parent", "amount > self")
        .with_schema(schema())
        .with_self_value(10)
        .add_child(rule("child", "self == 10"));

    let err = executor(root)
        .evaluate_sequential(data(500, "US"), &EvaluateOptions::default(), CancellationToken::new())
        .unwrap_err();
    assert_eq!(
        err,
        EvalError::UnresolvedSelfReference {
            path: "parent.child".into()
        }
    );
}

#[test]
fn test_self_in_input_data_is_ignored() {
    let exec = executor(rule("check", "self == 1").with_schema(schema()));
    let mut input = data(1, "US");
    input.insert("self".to_string(), Value::Int(1));

    let err = exec
        .evaluate_sequential(input, &EvaluateOptions::default(), CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, EvalError::UnresolvedSelfReference { .. }));
}

// =============================================================================
// Visiting policies
// =============================================================================

fn three_children(options: EvalOptions) -> RuleNode {
    RuleNode::new("root")
        .with_schema(schema())
        .with_options(options)
        .add_child(rule("a", "amount > 0"))
        .add_child(rule("b", "amount < 0"))
        .add_child(rule("c", "country == 'US'"))
}

#[test]
fn test_discard_fail_drops_failing_children() {
    let root = three_children(EvalOptions::new().discard_fail(DiscardFail::Discard));
    let result = evaluate_sequential(&executor(root), data(5, "US"));

    assert_eq!(child_ids(&result), vec!["a", "c"]);
    assert_eq!(result.rules_evaluated, 4);
}

#[test]
fn test_keep_all_and_unset_keep_everything() {
    for policy in [DiscardFail::KeepAll, DiscardFail::None] {
        let root = three_children(EvalOptions::new().discard_fail(policy));
        let result = evaluate_sequential(&executor(root), data(5, "US"));
        assert_eq!(child_ids(&result), vec!["a", "b", "c"]);
    }
}

#[test]
fn test_stop_first_positive_child() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(EvalOptions::new().stop_first_positive_child(true))
        .add_child(rule("a", "amount < 0"))
        .add_child(rule("b", "amount > 0"))
        .add_child(rule("c", "country == 'US'"));
    let result = evaluate_sequential(&executor(root), data(5, "US"));

    assert_eq!(child_ids(&result), vec!["a", "b"]);
    assert_eq!(result.rules_evaluated, 3);
}

#[test]
fn test_stop_first_positive_child_with_discard() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(
            EvalOptions::new()
                .stop_first_positive_child(true)
                .discard_fail(DiscardFail::Discard),
        )
        .add_child(rule("a", "amount < 0"))
        .add_child(rule("b", "amount > 0"))
        .add_child(rule("c", "country == 'US'"));
    let result = evaluate_sequential(&executor(root), data(5, "US"));

    assert_eq!(child_ids(&result), vec!["b"]);
    assert_eq!(result.rules_evaluated, 3);
}

#[test]
fn test_stop_if_parent_negative_on_parent() {
    let root = rule("gate", "amount > 100")
        .with_schema(schema())
        .with_options(EvalOptions::new().stop_if_parent_negative(true))
        .add_child(rule("a", "true"))
        .add_child(rule("b", "true"));

    let result = evaluate_sequential(&executor(root.clone()), data(5, "US"));
    assert!(!result.pass);
    assert!(result.children.is_empty());
    assert_eq!(result.rules_evaluated, 1);

    let result = evaluate_sequential(&executor(root), data(500, "US"));
    assert_eq!(child_ids(&result), vec!["a", "b"]);
}

#[test]
fn test_stop_if_parent_negative_on_child() {
    let root = rule("gate", "amount > 100")
        .with_schema(schema())
        .add_child(
            rule("guarded", "true").with_options(EvalOptions::new().stop_if_parent_negative(true)),
        )
        .add_child(rule("free", "true"));

    let result = evaluate_sequential(&executor(root), data(5, "US"));
    assert_eq!(child_ids(&result), vec!["free"]);
    assert_eq!(result.rules_evaluated, 2);
}

#[test]
fn test_true_if_any() {
    let options = EvalOptions::new().true_if_any(true);

    let root = RuleNode::new("any")
        .with_schema(schema())
        .with_options(options.clone())
        .add_child(rule("a", "amount < 0"))
        .add_child(rule("b", "country == 'US'"));
    let result = evaluate_sequential(&executor(root.clone()), data(5, "US"));
    assert!(result.pass);

    let result = evaluate_sequential(&executor(root), data(5, "FR"));
    assert!(!result.pass);

    let leaf = rule("leaf", "true").with_schema(schema()).with_options(options);
    let result = evaluate_sequential(&executor(leaf), data(5, "FR"));
    assert!(!result.pass);
    assert_eq!(result.value, Value::Bool(true));
}

#[test]
fn test_true_if_any_sees_discarded_children() {
    let root = rule("any", "false")
        .with_schema(schema())
        .with_options(
            EvalOptions::new()
                .true_if_any(true)
                .discard_fail(DiscardFail::Discard),
        )
        .add_child(rule("a", "amount < 0"))
        .add_child(rule("b", "amount > 0"));
    let result = evaluate_sequential(&executor(root), data(5, "US"));

    assert!(result.pass);
    assert_eq!(result.value, Value::Bool(false));
    assert_eq!(child_ids(&result), vec!["b"]);
}

#[test]
fn test_sort_orders_children() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(EvalOptions::new().with_sort(SortFunc::by_id()))
        .add_child(rule("zeta", "true"))
        .add_child(rule("alpha", "true"))
        .add_child(rule("mid", "true"));
    let result = evaluate_sequential(&executor(root), data(5, "US"));
    assert_eq!(child_ids(&result), vec!["alpha", "mid", "zeta"]);

    let root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(
            EvalOptions::new()
                .with_sort(SortFunc::new(|a, b| b.cmp(a)))
                .stop_first_positive_child(true),
        )
        .add_child(rule("a", "true"))
        .add_child(rule("b", "false"))
        .add_child(rule("c", "true"));
    let result = evaluate_sequential(&executor(root), data(5, "US"));
    assert_eq!(child_ids(&result), vec!["c"]);
}

// =============================================================================
// Parallel evaluation
// =============================================================================

/// `breadth` chains of `depth` rules under one root
fn wide_tree(breadth: usize, depth: usize) -> RuleNode {
    let mut root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(EvalOptions::new().discard_fail(DiscardFail::Discard));
    for i in 0..breadth {
        let mut chain = rule(&format!("r{}_{}", i, depth), &format!("amount % {} == 0", depth + 1));
        for level in (0..depth - 1).rev() {
            let expression = if i % 3 == 0 {
                format!("amount > {}", i)
            } else {
                format!("country == 'US' || amount < {}", level)
            };
            let options = if level % 2 == 0 {
                EvalOptions::new().stop_if_parent_negative(true)
            } else {
                EvalOptions::new().true_if_any(i % 2 == 0)
            };
            chain = rule(&format!("r{}_{}", i, level), &expression)
                .with_options(options)
                .add_child(chain)
                .add_child(rule(&format!("s{}_{}", i, level), "'vip' in tags"));
        }
        root = root.add_child(chain);
    }
    root
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let exec = executor(wide_tree(120, 6));
    for (amount, country) in [(60, "US"), (7, "FR"), (150, "DE")] {
        let sequential = evaluate_sequential(&exec, data(amount, country));
        for parallelism in [Parallelism::new(1, 1), Parallelism::new(4, 16), Parallelism::new(16, 64)] {
            let parallel = exec
                .evaluate(
                    data(amount, country),
                    &EvaluateOptions::new().parallel(parallelism),
                    CancellationToken::new(),
                )
                .await
                .unwrap();
            assert_eq!(parallel, sequential);
        }
    }
}

#[tokio::test]
async fn test_parallel_stop_first_positive_child() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .with_options(EvalOptions::new().stop_first_positive_child(true))
        .add_child(rule("a", "amount < 0"))
        .add_child(rule("b", "amount > 0"))
        .add_child(rule("c", "true"));
    let result = executor(root)
        .evaluate(
            data(5, "US"),
            &EvaluateOptions::new().parallel(Parallelism::new(8, 8)),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(child_ids(&result), vec!["a", "b"]);
}

#[tokio::test]
async fn test_parallel_error_aborts_evaluation() {
    let mut root = RuleNode::new("root").with_schema(schema());
    for i in 0..50 {
        root = root.add_child(rule(&format!("r{}", i), "100 / amount > 1"));
    }
    let err = executor(root)
        .evaluate(
            data(0, "US"),
            &EvaluateOptions::new().parallel(Parallelism::new(4, 10)),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Evaluator { .. }));
}

#[tokio::test]
async fn test_concurrent_evaluations_agree() {
    let exec = Arc::new(executor(wide_tree(30, 5)));
    let expected = evaluate_sequential(&exec, data(60, "US"));

    let mut handles = Vec::new();
    for i in 0..8 {
        let exec = Arc::clone(&exec);
        handles.push(tokio::spawn(async move {
            let options = if i % 2 == 0 {
                EvaluateOptions::new().parallel(Parallelism::new(4, 8))
            } else {
                EvaluateOptions::new()
            };
            exec.evaluate(data(60, "US"), &options, CancellationToken::new())
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), expected);
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_before_evaluation() {
    let exec = executor(wide_tree(10, 3));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = exec
        .evaluate(data(5, "US"), &EvaluateOptions::default(), cancel.clone())
        .await
        .unwrap_err();
    assert_eq!(err, EvalError::Cancelled);

    let err = exec
        .evaluate(
            data(5, "US"),
            &EvaluateOptions::new().parallel(Parallelism::new(2, 2)),
            cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

fn tripwire_executor(cancel: CancellationToken) -> Executor<StandardEngine> {
    let engine = StandardEngine::new().with_function("trip", move |_args: &[ExprValue]| {
        cancel.cancel();
        Ok(ExprValue::Bool(true))
    });
    let schema = schema()
        .with_element("trip", ValueType::function(vec![], ValueType::bool()))
        .unwrap();
    let mut root = rule("root", "trip()").with_schema(schema);
    for i in 0..20 {
        root = root.add_child(rule(&format!("r{}", i), "amount > 0"));
    }
    executor_with(engine, root, false)
}

#[tokio::test]
async fn test_cancelled_during_evaluation() {
    let cancel = CancellationToken::new();
    let exec = tripwire_executor(cancel.clone());
    let err = exec
        .evaluate_sequential(data(5, "US"), &EvaluateOptions::default(), cancel)
        .unwrap_err();
    assert_eq!(err, EvalError::Cancelled);

    let cancel = CancellationToken::new();
    let exec = tripwire_executor(cancel.clone());
    let err = exec
        .evaluate(
            data(5, "US"),
            &EvaluateOptions::new().parallel(Parallelism::new(4, 4)),
            cancel,
        )
        .await
        .unwrap_err();
    assert_eq!(err, EvalError::Cancelled);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_diagnostics_require_tracing() {
    let exec = executor(rule("large", "amount > 100").with_schema(schema()));
    let err = exec
        .evaluate_sequential(
            data(5, "US"),
            &EvaluateOptions::new().return_diagnostics(true),
            CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(err, EvalError::DiagnosticsRequestedWithoutTracing);
}

#[test]
fn test_diagnostics_off_by_default() {
    let exec = executor_with(
        StandardEngine::new(),
        rule("large", "amount > 100").with_schema(schema()),
        true,
    );
    let result = evaluate_sequential(&exec, data(500, "US"));
    assert!(result.diagnostics.is_none());
}

#[tokio::test]
async fn test_diagnostics_explain_each_rule() {
    let root = RuleNode::new("root")
        .with_schema(schema())
        .add_child(rule("large", "amount > self").with_self_value(100))
        .add_child(rule("region", "country == 'US' || amount > 1000"));
    let exec = executor_with(StandardEngine::new(), root, true);
    let options = EvaluateOptions::new().return_diagnostics(true);

    let result = exec
        .evaluate_sequential(data(500, "FR"), &options, CancellationToken::new())
        .unwrap();
    assert!(result.diagnostics.is_none());

    let large = result.find("root.large").unwrap().diagnostics.as_ref().unwrap();
    assert_eq!(large.text, "amount > self");
    assert_eq!(large.value, Value::Bool(true));
    let amount = large.find("amount").unwrap();
    assert_eq!(amount.value, Value::Int(500));
    assert_eq!(amount.provenance, Provenance::Input);
    assert_eq!(large.find("self").unwrap().provenance, Provenance::Evaluated);

    let region = result.find("root.region").unwrap().diagnostics.as_ref().unwrap();
    assert_eq!(region.value, Value::Bool(false));
    assert_eq!(region.children.len(), 2);
    assert_eq!(region.find("country").unwrap().value, Value::String("FR".into()));

    let parallel = exec
        .evaluate(
            data(500, "FR"),
            &options.clone().parallel(Parallelism::new(2, 2)),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(parallel, result);
}

#[test]
fn test_result_serializes_to_json() {
    let root = three_children(EvalOptions::new().discard_fail(DiscardFail::Discard));
    let result = evaluate_sequential(&executor(root), data(5, "US"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["id"], "root");
    assert_eq!(json["rules_evaluated"], 4);
    assert_eq!(json["children"].as_array().unwrap().len(), 2);
    assert!(json.get("diagnostics").is_none());
    assert_eq!(result.passed_ids(), vec!["root", "root.a", "root.c"]);
}
