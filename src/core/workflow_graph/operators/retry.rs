use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::operator::{ExecutionContext, Operator};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded retry settings for a wrapped operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff_ms: u64,
    pub backoff_multiplier: f32,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
            backoff_multiplier: 2.0,
            jitter_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Opt-in decorator retrying `CapabilityInvocationError`s of the inner operator.
/// Any other error category is returned after the first attempt.
pub struct RetryingOperator {
    inner: Arc<dyn Operator>,
    policy: RetryPolicy,
}

impl RetryingOperator {
    pub fn new(inner: Arc<dyn Operator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Operator for RetryingOperator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn validate_params(&self, params: &Value) -> Result<(), AppError> {
        self.inner.validate_params(params)
    }

    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff_ms = self.policy.backoff_ms;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            match self.inner.execute(params.clone(), ctx.clone()).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    if attempts >= max_attempts
                        || err.category != ErrorCategory::CapabilityInvocationError
                    {
                        return Err(err);
                    }
                    let jitter = if self.policy.jitter_ms > 0 {
                        rand::thread_rng().gen_range(0..=self.policy.jitter_ms)
                    } else {
                        0
                    };
                    let sleep_ms = backoff_ms.saturating_add(jitter);
                    tracing::warn!(
                        operator = self.inner.name(),
                        state_id = %ctx.state_id,
                        attempt = attempts,
                        sleep_ms,
                        error = %err.message,
                        "capability call failed, retrying"
                    );
                    if sleep_ms > 0 {
                        sleep(Duration::from_millis(sleep_ms)).await;
                    }
                    backoff_ms =
                        ((backoff_ms as f32) * self.policy.backoff_multiplier).max(1.0) as u64;
                }
            }
        }
    }
}
