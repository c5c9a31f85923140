//! Abstract Syntax Tree for rule expressions

use crate::error::{Result, RuleEngineError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Deepest encoded AST accepted when decoding JSON text
pub const MAX_ENCODED_DEPTH: usize = 1024;

/// AST node for rule expressions
///
/// Encodes as `{"type": "operator", "operator": "AND", "left": .., "right": ..}`
/// or `{"type": "operand", "operator": ">", "field": .., "value": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Logical combination of two sub-rules
    Operator {
        operator: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Single comparison like `age > 30`
    Operand {
        operator: ComparisonOp,
        #[serde(deserialize_with = "non_empty_field")]
        field: String,
        value: Value,
    },
}

impl Node {
    pub fn operator(operator: LogicalOp, left: Node, right: Node) -> Self {
        Node::Operator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Node, right: Node) -> Self {
        Node::operator(LogicalOp::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Self {
        Node::operator(LogicalOp::Or, left, right)
    }

    pub fn operand(field: impl Into<String>, operator: ComparisonOp, value: impl Into<Value>) -> Self {
        Node::Operand {
            operator,
            field: field.into(),
            value: value.into(),
        }
    }

    /// Number of comparisons in the tree
    pub fn operand_count(&self) -> usize {
        match self {
            Node::Operand { .. } => 1,
            Node::Operator { left, right, .. } => left.operand_count() + right.operand_count(),
        }
    }

    /// Nesting depth, a single operand has depth 1
    pub fn depth(&self) -> usize {
        match self {
            Node::Operand { .. } => 1,
            Node::Operator { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Decode an AST from JSON text.
    ///
    /// Trees nested up to [`MAX_ENCODED_DEPTH`] levels decode, so every rule
    /// the parser or the store produces reads back unchanged.
    pub fn from_json_str(json: &str) -> Result<Node> {
        decode_nested(json, MAX_ENCODED_DEPTH)
    }
}

fn non_empty_field<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let field = String::deserialize(deserializer)?;
    if field.is_empty() {
        return Err(serde::de::Error::custom("operand field must not be empty"));
    }
    Ok(field)
}

/// Decode JSON text nested at most `max_depth` objects deep.
///
/// serde_json stops at 128 levels by default, which a flat chain of 128
/// comparisons already reaches. The depth is checked up front instead and
/// the built-in limit is lifted.
pub(crate) fn decode_nested<T: DeserializeOwned>(json: &str, max_depth: usize) -> Result<T> {
    let depth = nesting_depth(json);
    if depth > max_depth {
        return Err(RuleEngineError::InvalidRule(format!(
            "Invalid AST: nested {} levels deep, limit is {}",
            depth, max_depth
        )));
    }

    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let value = T::deserialize(&mut de)
        .and_then(|value| de.end().map(|()| value))
        .map_err(|e| RuleEngineError::InvalidRule(format!("Invalid AST: {}", e)))?;
    Ok(value)
}

/// Deepest object/array nesting in JSON text, ignoring brackets in strings
fn nesting_depth(json: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in json.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    deepest
}

/// Renders the node back to rule text that parses to the same tree.
///
/// Left children never need parentheses because logical operators
/// associate to the left; operator nodes on the right are parenthesized.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Operand {
                operator,
                field,
                value,
            } => write!(f, "{} {} {}", field, operator, value),
            Node::Operator {
                operator,
                left,
                right,
            } => match right.as_ref() {
                Node::Operator { .. } => write!(f, "{} {} ({})", left, operator, right),
                Node::Operand { .. } => write!(f, "{} {} {}", left, operator, right),
            },
        }
    }
}

/// Logical operators joining two sub-rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Greater than (>)
    #[serde(rename = ">")]
    Greater,
    /// Less than (<)
    #[serde(rename = "<")]
    Less,
    /// Equal (=)
    #[serde(rename = "=")]
    Equal,
    /// Greater than or equal (>=)
    #[serde(rename = ">=")]
    GreaterEqual,
    /// Less than or equal (<=)
    #[serde(rename = "<=")]
    LessEqual,
}

impl ComparisonOp {
    /// Look up an operator by its spelling
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(ComparisonOp::Greater),
            "<" => Some(ComparisonOp::Less),
            "=" => Some(ComparisonOp::Equal),
            ">=" => Some(ComparisonOp::GreaterEqual),
            "<=" => Some(ComparisonOp::LessEqual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Greater => ">",
            ComparisonOp::Less => "<",
            ComparisonOp::Equal => "=",
            ComparisonOp::GreaterEqual => ">=",
            ComparisonOp::LessEqual => "<=",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand and record value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operand_encoding() {
        let node = Node::operand("age", ComparisonOp::Greater, 30);
        let encoded = serde_json::to_value(&node).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "operand", "operator": ">", "field": "age", "value": 30.0})
        );
    }

    #[test]
    fn test_operator_encoding_round_trip() {
        let node = Node::and(
            Node::operand("age", ComparisonOp::GreaterEqual, 18),
            Node::operand("department", ComparisonOp::Equal, "Sales"),
        );
        let encoded = serde_json::to_value(&node).unwrap();
        assert_eq!(encoded["type"], "operator");
        assert_eq!(encoded["operator"], "AND");
        assert_eq!(encoded["left"]["operator"], ">=");
        assert_eq!(encoded["right"]["value"], "Sales");
        assert!(encoded.get("field").is_none());

        let decoded: Node = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_decode_integer_value_as_number() {
        let node: Node = serde_json::from_value(
            json!({"type": "operand", "operator": "<=", "field": "salary", "value": 50000}),
        )
        .unwrap();
        assert_eq!(node, Node::operand("salary", ComparisonOp::LessEqual, 50000));
    }

    #[test]
    fn test_decode_rejects_unknown_operator() {
        let result: std::result::Result<Node, _> = serde_json::from_value(
            json!({"type": "operand", "operator": "!=", "field": "age", "value": 1}),
        );
        assert!(result.is_err());

        let result: std::result::Result<Node, _> = serde_json::from_value(json!({
            "type": "operator",
            "operator": ">",
            "left": {"type": "operand", "operator": "=", "field": "a", "value": 1},
            "right": {"type": "operand", "operator": "=", "field": "b", "value": 2}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_empty_field() {
        let result: std::result::Result<Node, _> = serde_json::from_value(
            json!({"type": "operand", "operator": "=", "field": "", "value": 1}),
        );
        assert!(result.is_err());

        let err = Node::from_json_str(r#"{"type":"operand","operator":"=","field":"","value":1}"#)
            .unwrap_err();
        assert!(matches!(err, RuleEngineError::InvalidRule(_)));
    }

    #[test]
    fn test_from_json_str_decodes_deep_chains() {
        // One nesting level per AND, past serde_json's default limit of 128
        let leaf = Node::operand("a", ComparisonOp::Equal, 1);
        let chain = (1..200).fold(leaf.clone(), |acc, _| Node::and(acc, leaf.clone()));
        assert_eq!(chain.depth(), 200);

        let json = serde_json::to_string(&chain).unwrap();
        assert!(serde_json::from_str::<Node>(&json).is_err());
        assert_eq!(Node::from_json_str(&json).unwrap(), chain);
    }

    #[test]
    fn test_from_json_str_limits() {
        let too_deep = format!(
            "{}{}",
            "[".repeat(MAX_ENCODED_DEPTH + 1),
            "]".repeat(MAX_ENCODED_DEPTH + 1)
        );
        assert!(matches!(
            Node::from_json_str(&too_deep),
            Err(RuleEngineError::InvalidRule(_))
        ));

        // Brackets inside strings do not count as nesting
        let node = Node::from_json_str(
            r#"{"type":"operand","operator":"=","field":"a","value":"[[{\"}}"}"#,
        )
        .unwrap();
        assert_eq!(node, Node::operand("a", ComparisonOp::Equal, "[[{\"}}"));

        assert!(Node::from_json_str(r#"{"type":"operand","operator":"=","field":"a","value":1} x"#).is_err());
    }

    #[test]
    fn test_display() {
        let node = Node::and(
            Node::operand("age", ComparisonOp::Greater, 30),
            Node::or(
                Node::operand("department", ComparisonOp::Equal, "Sales"),
                Node::operand("salary", ComparisonOp::GreaterEqual, 2.5),
            ),
        );
        assert_eq!(
            node.to_string(),
            "age > 30 AND (department = 'Sales' OR salary >= 2.5)"
        );
    }

    #[test]
    fn test_shape_helpers() {
        let node = Node::and(
            Node::or(
                Node::operand("a", ComparisonOp::Equal, 1),
                Node::operand("b", ComparisonOp::Equal, 2),
            ),
            Node::operand("c", ComparisonOp::Equal, 3),
        );
        assert_eq!(node.operand_count(), 3);
        assert_eq!(node.depth(), 3);
    }
}
