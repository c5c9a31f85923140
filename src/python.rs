//! Python bindings
//!
//! ASTs, records and stored rules cross the boundary as plain Python
//! dicts, converted through the `json` module.

use crate::config::EngineConfig;
use crate::error::RuleEngineError;
use crate::record::Record;
use crate::rule::{self, Node};
use crate::store::RuleStore;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use pyo3::prelude::*;
use serde::Serialize;

// ============================================================================
// Process-wide Configuration
// ============================================================================

static ENGINE_CONFIG: OnceCell<RwLock<EngineConfig>> = OnceCell::new();

fn current_config() -> EngineConfig {
    ENGINE_CONFIG
        .get_or_init(|| RwLock::new(EngineConfig::default()))
        .read()
        .clone()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Serialize a Rust value into the equivalent Python object
fn to_py<'py, T: Serialize>(py: Python<'py>, value: &T) -> PyResult<Bound<'py, PyAny>> {
    let json = serde_json::to_string(value).map_err(RuleEngineError::from)?;
    py.import("json")?.call_method1("loads", (json,))
}

/// Dump a Python object to JSON text
fn to_json(obj: &Bound<'_, PyAny>) -> PyResult<String> {
    obj.py()
        .import("json")?
        .call_method1("dumps", (obj,))?
        .extract()
}

fn extract_record(obj: &Bound<'_, PyAny>) -> PyResult<Record> {
    Ok(Record::from_json_str(&to_json(obj)?)?)
}

fn extract_config(obj: Option<&Bound<'_, PyAny>>) -> PyResult<EngineConfig> {
    match obj {
        Some(obj) if !obj.is_none() => Ok(EngineConfig::from_json(&to_json(obj)?)?),
        _ => Ok(EngineConfig::default()),
    }
}

// ============================================================================
// Python Functions
// ============================================================================

/// Set the configuration used by the module-level functions
///
/// # Arguments
/// * `config` - Dict like {"parser": {"max_depth": 64, "max_terms": 256, "lenient_parentheses": False}, "cache_enabled": True}
#[pyfunction]
#[pyo3(signature = (config=None))]
fn init_config(config: Option<&Bound<'_, PyAny>>) -> PyResult<()> {
    let config = extract_config(config)?;

    if let Some(existing) = ENGINE_CONFIG.get() {
        *existing.write() = config;
    } else if let Err(pending) = ENGINE_CONFIG.set(RwLock::new(config)) {
        // Lost a race with another initializer, overwrite its value
        if let Some(existing) = ENGINE_CONFIG.get() {
            *existing.write() = pending.into_inner();
        }
    }

    Ok(())
}

/// Install a stderr tracing subscriber
///
/// Returns False when a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (level="info"))]
fn init_logging(level: &str) -> PyResult<bool> {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .map_err(|e| RuleEngineError::InvalidConfig(e.to_string()))?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok())
}

/// Parse a rule string into an AST dict
///
/// # Raises
/// ValueError on a malformed rule string
#[pyfunction]
fn parse_rule<'py>(py: Python<'py>, rule_string: &str) -> PyResult<Bound<'py, PyAny>> {
    let parser = rule::Parser::new(current_config().parser);
    to_py(py, &parser.parse(rule_string)?)
}

/// Evaluate an AST dict against a data dict
///
/// # Raises
/// RuntimeError on unknown operators, node types or missing fields
#[pyfunction]
fn evaluate_rule(ast: &Bound<'_, PyAny>, data: &Bound<'_, PyAny>) -> PyResult<bool> {
    let ast = to_json(ast)?;
    let record = extract_record(data)?;
    Ok(rule::evaluate_json(&ast, &record)?)
}

/// AND-combine a list of AST dicts into one AST dict
///
/// # Raises
/// ValueError on a malformed AST dict, RuntimeError on an empty list or a
/// result over `parser.max_terms` comparisons
#[pyfunction]
fn combine_rules<'py>(py: Python<'py>, asts: Vec<Bound<'py, PyAny>>) -> PyResult<Bound<'py, PyAny>> {
    let nodes = asts
        .iter()
        .map(|ast| -> PyResult<Node> { Ok(Node::from_json_str(&to_json(ast)?)?) })
        .collect::<PyResult<Vec<_>>>()?;

    let max_terms = current_config().parser.max_terms;
    to_py(py, &rule::combine_within(nodes, max_terms)?)
}

/// Parse (cached) and evaluate a rule string in one call
#[pyfunction]
fn check_rule(rule_string: &str, data: &Bound<'_, PyAny>) -> PyResult<bool> {
    let record = extract_record(data)?;
    Ok(rule::check_rule_with(rule_string, &record, &current_config())?)
}

// ============================================================================
// RuleEngine PyClass
// ============================================================================

/// RuleEngine - in-memory rule store handle
///
/// Rules live in Rust memory; Python receives dict snapshots.
#[pyclass]
pub struct RuleEngine {
    store: RuleStore,
}

#[pymethods]
impl RuleEngine {
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<&Bound<'_, PyAny>>) -> PyResult<Self> {
        let config = match config {
            Some(config) => extract_config(Some(config))?,
            None => current_config(),
        };
        Ok(Self {
            store: RuleStore::with_config(&config),
        })
    }

    fn __len__(&self) -> usize {
        self.store.len()
    }

    #[pyo3(signature = (name, rule_string, description=None))]
    fn create_rule<'py>(
        &self,
        py: Python<'py>,
        name: &str,
        rule_string: &str,
        description: Option<&str>,
    ) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.store.create(name, description, rule_string)?)
    }

    /// All rules without ASTs, newest first
    fn list_rules<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.store.list())
    }

    fn get_rule<'py>(&self, py: Python<'py>, rule_id: &str) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.store.get(rule_id)?)
    }

    fn delete_rule<'py>(&self, py: Python<'py>, rule_id: &str) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.store.delete(rule_id)?)
    }

    /// Evaluate a stored rule, returning {"result", "ruleId", "evaluatedAt"}
    fn evaluate<'py>(
        &self,
        py: Python<'py>,
        rule_id: &str,
        data: &Bound<'py, PyAny>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let record = extract_record(data)?;
        to_py(py, &self.store.evaluate(rule_id, &record)?)
    }

    fn combine<'py>(&self, py: Python<'py>, rule_ids: Vec<String>) -> PyResult<Bound<'py, PyAny>> {
        to_py(py, &self.store.combine(&rule_ids)?)
    }

    /// Evaluate a stored rule against many records off the event loop
    ///
    /// The batch runs in Tokio's blocking pool and resolves to a list of
    /// booleans; any failing record fails the whole batch.
    ///
    /// # Example (Python)
    /// ```python
    /// results = await engine.evaluate_many_async(rule_id, [{"age": 30}, {"age": 12}])
    /// ```
    fn evaluate_many_async<'py>(
        &self,
        py: Python<'py>,
        rule_id: String,
        records: Vec<Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let records = records
            .iter()
            .map(extract_record)
            .collect::<PyResult<Vec<_>>>()?;
        let store = self.store.clone();

        pyo3_async_runtimes::tokio::future_into_py(py, async move {
            let results = tokio::task::spawn_blocking(move || {
                records
                    .iter()
                    .map(|record| store.evaluate(&rule_id, record).map(|e| e.result))
                    .collect::<crate::error::Result<Vec<bool>>>()
            })
            .await
            .map_err(|e| {
                PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
                    "Evaluation task panicked: {}",
                    e
                ))
            })??;

            Ok(results)
        })
    }
}

// ============================================================================
// Python Module Definition
// ============================================================================

#[pymodule]
fn rule_engine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(init_config, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(parse_rule, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_rule, m)?)?;
    m.add_function(wrap_pyfunction!(combine_rules, m)?)?;
    m.add_function(wrap_pyfunction!(check_rule, m)?)?;
    m.add_class::<RuleEngine>()?;
    Ok(())
}
