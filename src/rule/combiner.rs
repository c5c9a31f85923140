//! Combining several rules into one conjunctive rule

use crate::error::{Result, RuleEngineError};
use crate::rule::ast::Node;

/// Fold rules into `((n1 AND n2) AND n3) AND ...`, keeping input order.
///
/// A single rule is returned as is.
pub fn combine(nodes: impl IntoIterator<Item = Node>) -> Result<Node> {
    let mut nodes = nodes.into_iter();
    let first = nodes
        .next()
        .ok_or_else(|| RuleEngineError::Combination("No rules to combine".to_string()))?;

    Ok(nodes.fold(first, Node::and))
}

/// Like [`combine`], failing when the result would hold more than
/// `max_terms` comparisons.
pub fn combine_within(nodes: impl IntoIterator<Item = Node>, max_terms: usize) -> Result<Node> {
    let nodes: Vec<Node> = nodes.into_iter().collect();
    let terms: usize = nodes.iter().map(Node::operand_count).sum();
    if terms > max_terms {
        return Err(RuleEngineError::Combination(format!(
            "Combined rule would hold {} comparisons, limit is {}",
            terms, max_terms
        )));
    }

    combine(nodes)
}
