use crate::core::error::AppError;
use crate::core::workflow_graph::capability::{ClassificationCapability, ClassificationRequest};
use crate::core::workflow_graph::operator::{decode_params, ExecutionContext, Operator};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DETECT_LABELS: &str = "classification:detectLabels";

/// Calls the classification capability and returns the raw label list.
pub struct DetectLabelsOperator {
    capability: Arc<dyn ClassificationCapability>,
}

impl DetectLabelsOperator {
    pub fn new(capability: Arc<dyn ClassificationCapability>) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl Operator for DetectLabelsOperator {
    fn name(&self) -> &'static str {
        DETECT_LABELS
    }

    fn validate_params(&self, params: &Value) -> Result<(), AppError> {
        decode_params::<ClassificationRequest>(DETECT_LABELS, params).map(|_| ())
    }

    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError> {
        let request: ClassificationRequest = decode_params(DETECT_LABELS, &params)?;
        tracing::debug!(
            execution_id = %ctx.execution_id,
            container = %request.container,
            key = %request.key,
            "detecting labels"
        );
        let labels = self
            .capability
            .detect_labels(request)
            .await
            .map_err(|err| err.into_app_error(DETECT_LABELS))?;
        serde_json::to_value(labels).map_err(AppError::from)
    }
}
