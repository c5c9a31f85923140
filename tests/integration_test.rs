//! End-to-end tests through the public API

use rule_engine_core::{
    combine, evaluate, evaluate_encoded, evaluate_json, parse, ComparisonOp, Node, Record,
    RuleEngineError, RuleStore, StoredRule,
};
use serde_json::json;

fn employee() -> Record {
    Record::from_json(&json!({
        "age": 35,
        "department": "Sales",
        "salary": 60000,
        "experience": 3
    }))
    .unwrap()
}

#[test]
fn test_create_evaluate_combine_workflow() {
    let store = RuleStore::new();

    let seniors = store
        .create(
            "Senior sales",
            Some("Sales staff over 30"),
            "age > 30 AND department = 'Sales'",
        )
        .unwrap();
    let earners = store
        .create("Earners", None, "salary > 50000 OR experience > 5")
        .unwrap();

    let data = employee();
    assert!(store.evaluate(&seniors.id.to_string(), &data).unwrap().result);
    assert!(store.evaluate(&earners.id.to_string(), &data).unwrap().result);

    let combined = store
        .combine(&[seniors.id.to_string(), earners.id.to_string()])
        .unwrap();
    assert_eq!(combined.name, "Combined Rule (Senior sales, Earners)");
    assert_eq!(combined.ast, Node::and(seniors.ast.clone(), earners.ast.clone()));
    assert!(store.evaluate(&combined.id.to_string(), &data).unwrap().result);

    let junior = Record::from_json(&json!({
        "age": 22,
        "department": "Sales",
        "salary": 60000,
        "experience": 1
    }))
    .unwrap();
    assert!(!store.evaluate(&combined.id.to_string(), &junior).unwrap().result);

    let listed: Vec<String> = store.list().into_iter().map(|r| r.name).collect();
    assert_eq!(
        listed,
        vec![
            "Combined Rule (Senior sales, Earners)".to_string(),
            "Earners".to_string(),
            "Senior sales".to_string(),
        ]
    );
}

#[test]
fn test_stored_ast_survives_json_round_trip() {
    let store = RuleStore::new();
    let rule = store
        .create("Marketing juniors", None, "age < 25 AND department = 'Marketing'")
        .unwrap();

    // Persist the AST as JSON, then evaluate the stored form
    let stored = serde_json::to_value(&rule.ast).unwrap();
    let data = Record::new().with("age", 23).with("department", "Marketing");
    assert!(evaluate_encoded(&stored, &data).unwrap());
}

#[test]
fn test_long_rule_survives_json_text_round_trip() {
    let rule = vec!["a = 1"; 150].join(" AND ");
    let store = RuleStore::new();
    let stored = store.create("Long chain", None, &rule).unwrap();

    let ast_json = serde_json::to_string(&stored.ast).unwrap();
    assert_eq!(Node::from_json_str(&ast_json).unwrap(), stored.ast);
    assert!(evaluate_json(&ast_json, &Record::new().with("a", 1)).unwrap());

    let rule_json = serde_json::to_string(&stored).unwrap();
    assert_eq!(StoredRule::from_json_str(&rule_json).unwrap(), stored);
}

#[test]
fn test_association_and_grouping() {
    let flat = parse("a=1 OR b=2 AND c=3").unwrap();
    let grouped = parse("a=1 OR (b=2 AND c=3)").unwrap();
    assert_ne!(flat, grouped);

    // a=1 holds, c=3 does not
    let data = Record::new().with("a", 1).with("b", 0).with("c", 0);
    assert!(!evaluate(&flat, &data).unwrap());
    assert!(evaluate(&grouped, &data).unwrap());
}

#[test]
fn test_combine_identity_and_order() {
    let n1 = parse("a = 1").unwrap();
    let n2 = parse("b = 2").unwrap();
    let n3 = parse("c = 3").unwrap();

    assert_eq!(combine(vec![n1.clone()]).unwrap(), n1);
    assert_eq!(
        combine(vec![n1.clone(), n2.clone(), n3.clone()]).unwrap(),
        Node::and(Node::and(n1, n2), n3)
    );
    assert!(matches!(
        combine(Vec::new()),
        Err(RuleEngineError::Combination(_))
    ));
}

#[test]
fn test_error_kinds() {
    assert!(parse("age >").unwrap_err().is_syntax());
    assert!(parse("age 20").unwrap_err().is_syntax());

    let unknown = json!({"type": "operand", "operator": "!=", "field": "age", "value": 20});
    assert!(matches!(
        evaluate_encoded(&unknown, &Record::new().with("age", 25)),
        Err(RuleEngineError::Evaluation(_))
    ));
}

#[test]
fn test_string_values_stay_strings() {
    let ast = parse("department = 'Sales'").unwrap();
    assert_eq!(ast, Node::operand("department", ComparisonOp::Equal, "Sales"));

    let numeric_text = parse("code = '42'").unwrap();
    assert_eq!(numeric_text, Node::operand("code", ComparisonOp::Equal, "42"));
}
