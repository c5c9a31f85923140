//! In-memory rule store
//!
//! Named rules keyed by UUID, with evaluation and combination of stored
//! rules. Reads clone rules out under a read lock, so callers never observe
//! a half-written rule.

use crate::config::EngineConfig;
use crate::error::{Result, RuleEngineError};
use crate::record::Record;
use crate::rule::{combine_within, decode_nested, evaluate, Node, Parser, MAX_ENCODED_DEPTH};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A stored rule with its parsed AST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRule {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ast: Node,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRule {
    /// Decode a persisted rule from JSON text, however deep its AST
    pub fn from_json_str(json: &str) -> Result<StoredRule> {
        // The AST sits one level below the rule object
        decode_nested(json, MAX_ENCODED_DEPTH + 1)
    }
}

/// Listing view of a rule, without the AST
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredRule> for RuleSummary {
    fn from(rule: &StoredRule) -> Self {
        Self {
            id: rule.id,
            name: rule.name.clone(),
            description: rule.description.clone(),
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

/// Outcome of evaluating a stored rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub result: bool,
    pub rule_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    rules: AHashMap<Uuid, StoredRule>,
    /// Insertion order, oldest first
    order: Vec<Uuid>,
}

/// Thread-safe rule store
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    inner: Arc<RwLock<Inner>>,
    parser: Parser,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose rule strings are parsed with `config.parser`
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            inner: Arc::default(),
            parser: Parser::new(config.parser.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().rules.is_empty()
    }

    /// Parse a rule string and store it under a new id
    #[instrument(skip(self, description, rule_string))]
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        rule_string: &str,
    ) -> Result<StoredRule> {
        let mut missing = Vec::new();
        if name.trim().is_empty() {
            missing.push("name");
        }
        if rule_string.trim().is_empty() {
            missing.push("rule string");
        }
        if !missing.is_empty() {
            return Err(RuleEngineError::InvalidRule(format!(
                "{} required",
                missing.join(" and ")
            )));
        }

        let ast = self.parser.parse(rule_string)?;
        let rule = self.insert(name.to_string(), description.map(str::to_string), ast);
        info!(rule_id = %rule.id, "Rule created");
        Ok(rule)
    }

    /// All rules without their ASTs, newest first
    pub fn list(&self) -> Vec<RuleSummary> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.rules.get(id))
            .map(RuleSummary::from)
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<StoredRule> {
        let id = parse_id(id)?;
        self.inner
            .read()
            .rules
            .get(&id)
            .cloned()
            .ok_or_else(|| RuleEngineError::RuleNotFound(id.to_string()))
    }

    /// Remove a rule, returning it
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<StoredRule> {
        let id = parse_id(id)?;
        let mut inner = self.inner.write();
        match inner.rules.remove(&id) {
            Some(rule) => {
                inner.order.retain(|existing| *existing != id);
                info!(rule_id = %id, "Rule deleted");
                Ok(rule)
            }
            None => {
                warn!(rule_id = %id, "Delete of unknown rule");
                Err(RuleEngineError::RuleNotFound(id.to_string()))
            }
        }
    }

    /// Evaluate a stored rule against a record
    #[instrument(skip(self, data))]
    pub fn evaluate(&self, id: &str, data: &Record) -> Result<Evaluation> {
        let rule = self.get(id)?;
        let result = evaluate(&rule.ast, data)?;
        debug!(rule_id = %rule.id, result, "Rule evaluated");

        Ok(Evaluation {
            result,
            rule_id: rule.id,
            evaluated_at: Utc::now(),
        })
    }

    /// AND-combine stored rules, in the given order, into a new stored rule.
    ///
    /// Every unknown id is reported in a single `RuleNotFound` error. The
    /// result may hold at most `parser.max_terms` comparisons.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn combine<S: AsRef<str>>(&self, ids: &[S]) -> Result<StoredRule> {
        let ids = ids
            .iter()
            .map(|id| parse_id(id.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let rules = {
            let inner = self.inner.read();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !inner.rules.contains_key(*id))
                .map(Uuid::to_string)
                .collect();
            if !missing.is_empty() {
                warn!(missing = ?missing, "Combine references unknown rules");
                return Err(RuleEngineError::RuleNotFound(missing.join(", ")));
            }
            ids.iter()
                .filter_map(|id| inner.rules.get(id).cloned())
                .collect::<Vec<_>>()
        };

        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        let name = format!("Combined Rule ({})", names.join(", "));
        let description = format!(
            "Automatically combined rule from IDs: {}",
            ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
        );

        let ast = combine_within(
            rules.iter().map(|r| r.ast.clone()),
            self.parser.config().max_terms,
        )?;
        let rule = self.insert(name, Some(description), ast);
        info!(rule_id = %rule.id, sources = rules.len(), "Rules combined");
        Ok(rule)
    }

    fn insert(&self, name: String, description: Option<String>, ast: Node) -> StoredRule {
        let now = Utc::now();
        let rule = StoredRule {
            id: Uuid::new_v4(),
            name,
            description,
            ast,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write();
        inner.order.push(rule.id);
        inner.rules.insert(rule.id, rule.clone());
        rule
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim())
        .map_err(|_| RuleEngineError::InvalidRule(format!("Invalid ID format: {}", id)))
}
