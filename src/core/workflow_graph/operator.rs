#![allow(clippy::result_large_err)] // Operator trait and registry return AppError directly for structured diagnostics without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::expression::{EvaluationContext, ExpressionEngine};
use crate::core::workflow_graph::path::{self, ReferencePath};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Execution context provided to each operator run.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub state_id: String,
    /// Context snapshot taken when the Task state was entered.
    pub context: Value,
}

/// Trait implemented by Task-state operators (capability grants).
#[async_trait]
pub trait Operator: Send + Sync + 'static {
    /// Resource name used by Task states, e.g. `classification:detectLabels`.
    fn name(&self) -> &'static str;

    /// Validate params ahead of execution.
    fn validate_params(&self, params: &Value) -> Result<(), AppError>;

    /// Execute the operator with resolved params.
    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError>;
}

/// Builder used to register operators before execution.
pub struct OperatorRegistryBuilder {
    operators: BTreeMap<String, Arc<dyn Operator>>,
}

impl Default for OperatorRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistryBuilder {
    pub fn new() -> Self {
        Self {
            operators: BTreeMap::new(),
        }
    }

    pub fn register<T: Operator>(&mut self, operator: T) -> &mut Self {
        self.register_shared(Arc::new(operator))
    }

    pub fn register_shared(&mut self, operator: Arc<dyn Operator>) -> &mut Self {
        let name = operator.name();
        if self.operators.contains_key(name) {
            panic!("duplicate operator registered: {}", name);
        }
        self.operators.insert(name.to_string(), operator);
        self
    }

    pub fn build(self) -> OperatorRegistry {
        OperatorRegistry {
            inner: Arc::new(self.operators),
        }
    }
}

/// Immutable registry of granted capabilities available during execution.
#[derive(Clone)]
pub struct OperatorRegistry {
    inner: Arc<BTreeMap<String, Arc<dyn Operator>>>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorRegistry {
    pub fn new() -> Self {
        OperatorRegistryBuilder::new().build()
    }

    pub fn builder() -> OperatorRegistryBuilder {
        OperatorRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.inner.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.keys().map(String::as_str).collect()
    }
}

/// Resolve a parameter template against the execution context.
///
/// A single-key object `{"$path": "$.a.b"}` becomes the value at that path
/// (absent ⇒ `MalformedInputError`); `{"$expr": "..."}` becomes the result of
/// the expression. Everything else is copied with its children resolved.
pub fn resolve_value(
    value: &Value,
    engine: &ExpressionEngine,
    ctx: &EvaluationContext,
) -> Result<Value, AppError> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(raw)) = map.get("$path") {
                    let reference = ReferencePath::parse(raw)?;
                    return path::require(&reference, &ctx.context).cloned();
                }
                if let Some(Value::String(expr)) = map.get("$expr") {
                    return engine.evaluate(expr, ctx);
                }
            }
            let mut resolved = Map::new();
            for (key, child) in map {
                resolved.insert(key.clone(), resolve_value(child, engine, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let mut collection = Vec::with_capacity(items.len());
            for item in items {
                collection.push(resolve_value(item, engine, ctx)?);
            }
            Ok(Value::Array(collection))
        }
        other => Ok(other.clone()),
    }
}

/// Deserialize resolved params into an operator's request type.
pub fn decode_params<T: serde::de::DeserializeOwned>(
    operator: &str,
    params: &Value,
) -> Result<T, AppError> {
    serde_json::from_value(params.clone()).map_err(|err| {
        AppError::new(
            ErrorCategory::MalformedInputError,
            format!("invalid params for {}: {}", operator, err),
        )
        .with_code("SC-INPUT-003")
    })
}
