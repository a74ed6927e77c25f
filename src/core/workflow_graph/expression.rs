#![allow(clippy::result_large_err)]

//! Rhai expressions for `expr` conditions and `{"$expr": ...}` templates.
//!
//! Scripts see two read-only variables: `context` (the execution context at
//! state entry) and `input` (the trigger payload). Both arrive as Rhai maps
//! converted through serde, and the result is converted back to JSON.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MAX_OPERATIONS: u64 = 50_000;
const MAX_DEPTH: usize = 64;

#[derive(Clone)]
pub struct EvaluationContext {
    pub context: Value,
    pub input: Value,
}

impl EvaluationContext {
    pub fn new(context: Value, input: Value) -> Self {
        Self { context, input }
    }

    fn scope(&self, expr: &str) -> Result<Scope<'static>, AppError> {
        let mut scope = Scope::new();
        for (name, value) in [("context", &self.context), ("input", &self.input)] {
            let converted = rhai::serde::to_dynamic(value)
                .map_err(|err| runtime_error(expr, format!("cannot expose {}: {}", name, err)))?;
            scope.push_dynamic(name, converted);
        }
        Ok(scope)
    }
}

// Declares the variable names for strict compilation. Plain variables, not
// constants, so the optimizer cannot fold the placeholder values in.
fn declared_names() -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push_dynamic("context", Dynamic::UNIT);
    scope.push_dynamic("input", Dynamic::UNIT);
    scope
}

/// Sandboxed engine with no standard packages, no printing and bounded work.
/// Compiled scripts are cached by source text.
pub struct ExpressionEngine {
    engine: Engine,
    compiled: Mutex<HashMap<String, Arc<AST>>>,
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        let mut engine = Engine::new_raw();
        engine
            .set_max_operations(MAX_OPERATIONS)
            .set_max_call_levels(MAX_DEPTH)
            .set_max_expr_depths(MAX_DEPTH, MAX_DEPTH)
            .set_strict_variables(true);
        engine.on_print(|_| {}).on_debug(|_, _, _| {});
        Self {
            engine,
            compiled: Mutex::new(HashMap::new()),
        }
    }
}

impl ExpressionEngine {
    /// Parse `expr`; failures are definition errors (`SC-DEF-004`).
    pub fn compile(&self, expr: &str) -> Result<Arc<AST>, AppError> {
        if let Some(ast) = self.cached(expr) {
            return Ok(ast);
        }
        let ast = self
            .engine
            .compile_expression_with_scope(&declared_names(), expr)
            .map(Arc::new)
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::DefinitionError,
                    format!("cannot compile expression '{}': {}", expr, err),
                )
                .with_code("SC-DEF-004")
            })?;
        if let Ok(mut compiled) = self.compiled.lock() {
            compiled.insert(expr.to_string(), Arc::clone(&ast));
        }
        Ok(ast)
    }

    pub fn evaluate(&self, expr: &str, ctx: &EvaluationContext) -> Result<Value, AppError> {
        let ast = self.compile(expr)?;
        let mut scope = ctx.scope(expr)?;
        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &ast)
            .map_err(|err| runtime_error(expr, err.to_string()))?;
        rhai::serde::from_dynamic(&result)
            .map_err(|err| runtime_error(expr, format!("result is not JSON: {}", err)))
    }

    pub fn evaluate_bool(&self, expr: &str, ctx: &EvaluationContext) -> Result<bool, AppError> {
        match self.evaluate(expr, ctx)? {
            Value::Bool(flag) => Ok(flag),
            other => Err(runtime_error(
                expr,
                format!("expected a bool, got {}", other),
            )),
        }
    }

    fn cached(&self, expr: &str) -> Option<Arc<AST>> {
        self.compiled.lock().ok()?.get(expr).cloned()
    }
}

fn runtime_error(expr: &str, reason: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::MalformedInputError,
        format!("expression '{}' failed: {}", expr, reason),
    )
    .with_code("SC-INPUT-002")
}
