use crate::core::error::AppError;
use crate::core::workflow_graph::capability::{ArtifactCapability, ArtifactRequest};
use crate::core::workflow_graph::operator::{decode_params, ExecutionContext, Operator};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub const GENERATE: &str = "artifact:generate";

/// Runs the external artifact generator (the collage builder).
pub struct GenerateArtifactOperator {
    capability: Arc<dyn ArtifactCapability>,
}

impl GenerateArtifactOperator {
    pub fn new(capability: Arc<dyn ArtifactCapability>) -> Self {
        Self { capability }
    }
}

#[async_trait]
impl Operator for GenerateArtifactOperator {
    fn name(&self) -> &'static str {
        GENERATE
    }

    fn validate_params(&self, params: &Value) -> Result<(), AppError> {
        decode_params::<ArtifactRequest>(GENERATE, params).map(|_| ())
    }

    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError> {
        let request: ArtifactRequest = decode_params(GENERATE, &params)?;
        let destination = request.destination_container.clone();
        tracing::debug!(
            execution_id = %ctx.execution_id,
            destination = %destination,
            "generating artifact"
        );
        self.capability
            .generate(request)
            .await
            .map_err(|err| err.into_app_error(GENERATE))?;
        Ok(json!({"destination_container": destination}))
    }
}
