use crate::core::error::AppError;
use crate::core::workflow_graph::capability::{NotificationCapability, NotificationRequest};
use crate::core::workflow_graph::operator::{decode_params, ExecutionContext, Operator};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub const PUBLISH: &str = "notification:publish";

pub struct PublishOperator {
    capability: Arc<dyn NotificationCapability>,
}

impl PublishOperator {
    pub fn new(capability: Arc<dyn NotificationCapability>) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl Operator for PublishOperator {
    fn name(&self) -> &'static str {
        PUBLISH
    }

    fn validate_params(&self, params: &Value) -> Result<(), AppError> {
        decode_params::<NotificationRequest>(PUBLISH, params).map(|_| ())
    }

    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError> {
        let request: NotificationRequest = decode_params(PUBLISH, &params)?;
        let topic = request.topic.clone();
        tracing::debug!(execution_id = %ctx.execution_id, topic = %topic, "publishing notification");
        self.capability
            .publish(request)
            .await
            .map_err(|err| err.into_app_error(PUBLISH))?;
        Ok(json!({"topic": topic, "delivered": true}))
    }
}
