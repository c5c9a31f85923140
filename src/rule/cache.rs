//! Rule parsing cache - keyed by the raw rule string

use crate::config::{EngineConfig, ParserConfig};
use crate::error::Result;
use crate::record::Record;
use crate::rule::ast::Node;
use crate::rule::{evaluator, parser};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Entries kept before the cache is flushed
pub const CACHE_CAPACITY: usize = 2048;

/// Global rule cache with fast hashing (ahash)
static RULE_CACHE: Lazy<RwLock<AHashMap<String, Node>>> =
    Lazy::new(|| RwLock::new(AHashMap::with_capacity(CACHE_CAPACITY)));

/// Get or parse a rule string, using cache for repeated rules
#[inline]
pub fn get_or_parse(rule: &str) -> Result<Node> {
    // Fast path: check read lock first
    {
        let cache = RULE_CACHE.read();
        if let Some(ast) = cache.get(rule) {
            return Ok(ast.clone());
        }
    }

    let ast = parser::parse(rule)?;

    {
        let mut cache = RULE_CACHE.write();
        if cache.len() >= CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(rule.to_string(), ast.clone());
    }

    Ok(ast)
}

/// Parse (through the cache) and evaluate a rule string. An empty rule holds.
#[inline]
pub fn check_rule(rule: &str, data: &Record) -> Result<bool> {
    if rule.trim().is_empty() {
        return Ok(true);
    }

    let ast = get_or_parse(rule)?;
    evaluator::evaluate(&ast, data)
}

/// Like [`check_rule`], honoring `cache_enabled` and the parser settings.
///
/// The cache only holds trees parsed with the default parser settings, so a
/// customized parser always parses afresh.
pub fn check_rule_with(rule: &str, data: &Record, config: &EngineConfig) -> Result<bool> {
    if config.cache_enabled && config.parser == ParserConfig::default() {
        return check_rule(rule, data);
    }
    if rule.trim().is_empty() {
        return Ok(true);
    }

    let ast = parser::Parser::new(config.parser.clone()).parse(rule)?;
    evaluator::evaluate(&ast, data)
}

/// Clear the rule cache
pub fn clear_cache() {
    RULE_CACHE.write().clear();
}

/// Number of cached rules
pub fn cache_size() -> usize {
    RULE_CACHE.read().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{const_mutex, Mutex};

    /// Serializes the tests that inspect cache contents or flush it
    static CACHE_LOCK: Mutex<()> = const_mutex(());

    #[test]
    fn test_cache_hit() {
        let _guard = CACHE_LOCK.lock();
        let rule = "cache_hit_field > 5";
        let data = Record::new().with("cache_hit_field", 10);

        assert!(check_rule(rule, &data).unwrap());
        assert!(RULE_CACHE.read().contains_key(rule));
        assert!(cache_size() >= 1);

        assert!(check_rule(rule, &data).unwrap());
        assert_eq!(get_or_parse(rule).unwrap(), parser::parse(rule).unwrap());
    }

    #[test]
    fn test_cache_flushes_at_capacity() {
        let _guard = CACHE_LOCK.lock();
        let data = Record::new().with("cache_fill_field", 1);

        for i in 0..CACHE_CAPACITY + 10 {
            let rule = format!("cache_fill_field < {}", i + 2);
            assert!(check_rule(&rule, &data).unwrap());
            assert!(cache_size() <= CACHE_CAPACITY);
        }

        // More distinct rules than fit, so the first one was flushed
        assert!(!RULE_CACHE.read().contains_key("cache_fill_field < 2"));
        clear_cache();
    }

    #[test]
    fn test_clear_cache() {
        let _guard = CACHE_LOCK.lock();
        get_or_parse("cache_clear_field = 1").unwrap();
        clear_cache();
        assert!(!RULE_CACHE.read().contains_key("cache_clear_field = 1"));
    }

    #[test]
    fn test_check_rule_with_custom_parser() {
        let data = Record::new().with("a", 1);
        let mut config = EngineConfig::default();
        assert!(check_rule_with("(a = 1", &data, &config).is_err());

        config.parser.lenient_parentheses = true;
        assert!(check_rule_with("(a = 1", &data, &config).unwrap());

        config.cache_enabled = false;
        config.parser = ParserConfig::default();
        assert!(check_rule_with("a = 1", &data, &config).unwrap());
    }

    #[test]
    fn test_failed_parse_not_cached() {
        let rule = "broken_field >";
        assert!(get_or_parse(rule).is_err());
        assert!(!RULE_CACHE.read().contains_key(rule));
    }

    #[test]
    fn test_empty_rule() {
        assert!(check_rule("", &Record::new()).unwrap());
        assert!(check_rule("   ", &Record::new()).unwrap());
    }
}
