#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow_graph::expression::{EvaluationContext, ExpressionEngine};
use crate::core::workflow_graph::path::ReferencePath;
use crate::core::workflow_graph::schema::{ChoiceRule, Condition};
use serde_json::Value;

/// Evaluate a single Choice predicate. Side-effect free.
///
/// Missing paths never raise: `is_present` is false and `string_equals` does
/// not match. Only `expr` predicates can fail, with `MalformedInputError`.
pub fn evaluate(
    condition: &Condition,
    engine: &ExpressionEngine,
    ctx: &EvaluationContext,
) -> Result<bool, AppError> {
    match condition {
        Condition::IsPresent { path } => {
            let reference = ReferencePath::parse(path)?;
            Ok(matches!(reference.get(&ctx.context), Some(value) if !value.is_null()))
        }
        Condition::StringEquals { path, value } => {
            let reference = ReferencePath::parse(path)?;
            Ok(matches!(
                reference.get(&ctx.context),
                Some(Value::String(actual)) if actual == value
            ))
        }
        Condition::Not { condition } => Ok(!evaluate(condition, engine, ctx)?),
        Condition::Expr { expr } => engine.evaluate_bool(expr, ctx),
    }
}

/// Pick the successor for a Choice state: the first matching rule wins,
/// otherwise `default`.
pub fn select_next<'a>(
    choices: &'a [ChoiceRule],
    default: &'a str,
    engine: &ExpressionEngine,
    ctx: &EvaluationContext,
) -> Result<&'a str, AppError> {
    for rule in choices {
        if evaluate(&rule.condition, engine, ctx)? {
            return Ok(rule.next.as_str());
        }
    }
    Ok(default)
}
