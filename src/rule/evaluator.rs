//! Rule evaluator

use crate::error::{Result, RuleEngineError};
use crate::record::Record;
use crate::rule::ast::{ComparisonOp, LogicalOp, Node, Value};
use serde::Deserialize;
use std::cmp::Ordering;

/// Evaluate an AST against a record
///
/// Both children of a logical node are evaluated before combining, so an
/// error anywhere in the tree fails the whole evaluation.
pub fn evaluate(node: &Node, data: &Record) -> Result<bool> {
    match node {
        Node::Operator {
            operator,
            left,
            right,
        } => {
            let left = evaluate(left, data)?;
            let right = evaluate(right, data)?;
            Ok(match operator {
                LogicalOp::And => left && right,
                LogicalOp::Or => left || right,
            })
        }
        Node::Operand {
            operator,
            field,
            value,
        } => {
            let actual = data.get(field).ok_or_else(|| {
                RuleEngineError::Evaluation(format!("Field '{}' not found in data", field))
            })?;
            Ok(compare(actual, *operator, value))
        }
    }
}

/// Decode a stored AST and evaluate it.
///
/// Operator spellings outside the known sets and unknown node types are
/// reported as evaluation errors.
pub fn evaluate_encoded(ast: &serde_json::Value, data: &Record) -> Result<bool> {
    let node = Node::deserialize(ast)
        .map_err(|e| RuleEngineError::Evaluation(format!("Invalid AST: {}", e)))?;
    evaluate(&node, data)
}

/// Decode an AST from JSON text and evaluate it, reporting decode failures
/// as evaluation errors like [`evaluate_encoded`].
pub fn evaluate_json(ast: &str, data: &Record) -> Result<bool> {
    let node = Node::from_json_str(ast).map_err(|e| match e {
        RuleEngineError::InvalidRule(message) => RuleEngineError::Evaluation(message),
        other => other,
    })?;
    evaluate(&node, data)
}

/// Compare a record value against a rule value.
///
/// Numbers compare numerically and strings lexicographically. Across types,
/// `=` is strict and never matches, while ordering operators read the string
/// side as a number; strings that are not numbers never match.
fn compare(actual: &Value, operator: ComparisonOp, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => matches_ordering(a.partial_cmp(b), operator),
        (Value::String(a), Value::String(b)) => matches_ordering(Some(a.cmp(b)), operator),
        _ if operator == ComparisonOp::Equal => false,
        (Value::String(a), Value::Number(b)) => {
            matches_ordering(coerce_number(a).partial_cmp(b), operator)
        }
        (Value::Number(a), Value::String(b)) => {
            matches_ordering(a.partial_cmp(&coerce_number(b)), operator)
        }
    }
}

fn matches_ordering(ordering: Option<Ordering>, operator: ComparisonOp) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };

    match operator {
        ComparisonOp::Greater => ordering == Ordering::Greater,
        ComparisonOp::Less => ordering == Ordering::Less,
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::GreaterEqual => ordering != Ordering::Less,
        ComparisonOp::LessEqual => ordering != Ordering::Greater,
    }
}

/// Blank strings read as 0, unparsable ones as NaN
fn coerce_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}
