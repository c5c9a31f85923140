//! Rule Engine Core - parse, evaluate and combine boolean business rules
//!
//! Rules are small textual expressions such as
//! `age > 30 AND department = 'Engineering'`. This crate parses them into an
//! AST, evaluates an AST against a record and AND-combines several ASTs.
//! An in-memory [`RuleStore`](store::RuleStore) and, with the `python`
//! feature, PyO3 bindings drive the core end to end.
//!
//! ```
//! use rule_engine_core::{combine, evaluate, parse, Record};
//!
//! let adults = parse("age >= 18").unwrap();
//! let engineers = parse("department = 'Engineering'").unwrap();
//! let rule = combine(vec![adults, engineers]).unwrap();
//!
//! let data = Record::new().with("age", 25).with("department", "Engineering");
//! assert!(evaluate(&rule, &data).unwrap());
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod rule;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::{EngineConfig, ParserConfig};
pub use error::{Result, RuleEngineError};
pub use record::Record;
pub use rule::{
    check_rule, combine, combine_within, evaluate, evaluate_encoded, evaluate_json, parse,
    ComparisonOp, LogicalOp, Node, Parser, Value,
};
pub use store::{Evaluation, RuleStore, RuleSummary, StoredRule};
