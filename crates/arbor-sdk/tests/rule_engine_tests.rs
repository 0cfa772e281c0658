//! End-to-end tests through the SDK
//!
//! Rule trees are loaded from YAML, compiled once and evaluated with the
//! configured defaults or explicit options.

use arbor_sdk::{
    CancellationToken, DiscardFail, EngineConfig, EvalOptions, EvaluateOptions, ExprValue,
    MessageDescriptor, Parallelism, Provenance, RuleEngineBuilder, RuleNode, SdkError, Value,
    ValueType,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

const PAYMENT_RULES: &str = r#"
id: payment
schema:
  id: payments
  elements:
    - name: amount
      type: { primitive: int }
    - name: country
      type: { primitive: string }
    - name: account
      type: { message: acme.Account }
options:
  discard_fail: discard
children:
  - id: large
    expression: amount > self
    self_value: 1000
  - id: foreign
    expression: country != "US"
  - id: overdrawn
    expression: account.balance < amount
    options:
      stop_if_parent_negative: true
    children:
      - id: vip
        expression: account.tier == "gold"
"#;

fn account(balance: i64, tier: &str) -> Value {
    Value::message(
        "acme.Account",
        [
            ("balance", Value::Int(balance)),
            ("tier", Value::String(tier.to_string())),
        ],
    )
}

fn account_descriptor() -> MessageDescriptor {
    MessageDescriptor::new("acme.Account")
        .with_field("balance", ValueType::int())
        .with_field("tier", ValueType::string())
}

fn payment(amount: i64, country: &str, balance: i64) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    data.insert("amount".to_string(), Value::Int(amount));
    data.insert("country".to_string(), Value::String(country.to_string()));
    data.insert("account".to_string(), account(balance, "gold"));
    data
}

fn payment_rules() -> RuleNode {
    serde_yaml::from_str(PAYMENT_RULES).unwrap()
}

#[tokio::test]
async fn test_compile_and_evaluate_yaml_tree() -> anyhow::Result<()> {
    let engine = RuleEngineBuilder::new()
        .register_message(account_descriptor())
        .build()?;
    let rules = engine.compile(&payment_rules())?;
    assert_eq!(rules.root_id(), "payment");
    assert_eq!(rules.rule_count(), 5);

    let result = engine
        .evaluate_with_defaults(&rules, payment(5000, "FR", 100))
        .await?;
    assert!(result.pass);
    assert_eq!(
        result.passed_ids(),
        vec![
            "payment",
            "payment.large",
            "payment.foreign",
            "payment.overdrawn",
            "payment.overdrawn.vip"
        ]
    );
    assert_eq!(result.rules_evaluated, 5);

    let result = engine
        .evaluate_with_defaults(&rules, payment(50, "US", 100))
        .await?;
    assert!(result.children.is_empty());
    assert_eq!(result.rules_evaluated, 4);
    Ok(())
}

#[tokio::test]
async fn test_unregistered_message_fails_compile() {
    let engine = RuleEngineBuilder::new().build().unwrap();
    let err = engine.compile(&payment_rules()).unwrap_err();
    assert!(matches!(err, SdkError::CompileError(_)));
    assert!(err.to_string().contains("acme.Account"));
}

#[tokio::test]
async fn test_config_defaults_drive_evaluation() -> anyhow::Result<()> {
    let config = EngineConfig::from_yaml_str(
        r#"
compile:
  collect_diagnostics: true
evaluate:
  return_diagnostics: true
  parallelism:
    workers: 4
    batch_size: 2
"#,
    )?;
    let engine = RuleEngineBuilder::new()
        .register_message(account_descriptor())
        .with_config(config)
        .build()?;
    let rules = engine.compile(&payment_rules())?;
    assert!(rules.collects_diagnostics());

    let result = engine
        .evaluate_with_defaults(&rules, payment(5000, "FR", 100))
        .await?;
    let large = result.find("payment.large").unwrap();
    let diagnostic = large.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostic.text, "amount > self");
    assert_eq!(diagnostic.find("amount").unwrap().provenance, Provenance::Input);
    assert_eq!(diagnostic.find("self").unwrap().value, Value::Int(1000));

    let vip = result.find("payment.overdrawn.vip").unwrap();
    let tier = vip.diagnostics.as_ref().unwrap().find("account.tier").unwrap();
    assert_eq!(tier.value, Value::String("gold".into()));
    assert_eq!(tier.provenance, Provenance::Input);
    Ok(())
}

#[tokio::test]
async fn test_parallel_and_blocking_agree() -> anyhow::Result<()> {
    let engine = RuleEngineBuilder::new()
        .register_message(account_descriptor())
        .build()?;
    let rules = engine.compile(&payment_rules())?;

    let blocking = engine.evaluate_blocking(
        &rules,
        payment(5000, "FR", 100),
        &EvaluateOptions::default(),
        CancellationToken::new(),
    )?;
    let parallel = engine
        .evaluate(
            &rules,
            payment(5000, "FR", 100),
            &EvaluateOptions::new().parallel(Parallelism::new(2, 1)),
            CancellationToken::new(),
        )
        .await?;
    assert_eq!(parallel, blocking);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_surfaces_as_sdk_error() {
    let engine = RuleEngineBuilder::new()
        .register_message(account_descriptor())
        .build()
        .unwrap();
    let rules = engine.compile(&payment_rules()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .evaluate(&rules, payment(1, "US", 0), &EvaluateOptions::default(), cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_host_function() -> anyhow::Result<()> {
    let engine = RuleEngineBuilder::new()
        .with_function("risk", |args: &[ExprValue]| match args {
            [ExprValue::String(country)] if country == "XX" => Ok(ExprValue::Int(90)),
            [ExprValue::String(_)] => Ok(ExprValue::Int(10)),
            _ => Err("risk expects one string".to_string()),
        })
        .build()?;

    let schema = arbor_sdk::Schema::from_elements([
        ("country", ValueType::string()),
        (
            "risk",
            ValueType::function(vec![ValueType::string()], ValueType::int()),
        ),
    ])?;
    let root = RuleNode::new("risky")
        .with_schema(schema)
        .with_options(EvalOptions::new().discard_fail(DiscardFail::KeepAll))
        .with_expression("risk(country) > 50");
    let rules = engine.compile(&root)?;

    let mut data = HashMap::new();
    data.insert("country".to_string(), Value::String("XX".into()));
    assert!(engine.evaluate_with_defaults(&rules, data.clone()).await?.pass);

    data.insert("country".to_string(), Value::String("FR".into()));
    assert!(!engine.evaluate_with_defaults(&rules, data).await?.pass);
    Ok(())
}

#[tokio::test]
async fn test_compiled_rules_are_shared_across_tasks() -> anyhow::Result<()> {
    let engine = std::sync::Arc::new(
        RuleEngineBuilder::new()
            .register_message(account_descriptor())
            .build()?,
    );
    let rules = engine.compile(&payment_rules())?;
    let expected = engine
        .evaluate_with_defaults(&rules, payment(5000, "FR", 100))
        .await?;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = std::sync::Arc::clone(&engine);
        let rules = rules.clone();
        handles.push(tokio::spawn(async move {
            engine
                .evaluate_with_defaults(&rules, payment(5000, "FR", 100))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await??, expected);
    }
    Ok(())
}
