pub mod artifact;
pub mod classify;
pub mod notify;
pub mod retry;

use crate::core::workflow_graph::capability::Capabilities;
use crate::core::workflow_graph::operator::{Operator, OperatorRegistry, OperatorRegistryBuilder};
use retry::{RetryPolicy, RetryingOperator};
use std::sync::Arc;

/// Register the capability operators granted to the engine.
///
/// With a policy whose `max_attempts > 1`, every operator is wrapped in a
/// [`RetryingOperator`]; otherwise calls are made exactly once.
pub fn register_capabilities(
    builder: &mut OperatorRegistryBuilder,
    capabilities: &Capabilities,
    retry: RetryPolicy,
) {
    let operators: Vec<Arc<dyn Operator>> = vec![
        Arc::new(classify::DetectLabelsOperator::new(
            capabilities.classification.clone(),
        )),
        Arc::new(notify::PublishOperator::new(capabilities.notification.clone())),
        Arc::new(artifact::GenerateArtifactOperator::new(
            capabilities.artifact.clone(),
        )),
    ];
    for operator in operators {
        if retry.is_enabled() {
            builder.register_shared(Arc::new(RetryingOperator::new(operator, retry)));
        } else {
            builder.register_shared(operator);
        }
    }
}

/// Registry holding exactly the capability operators.
pub fn capability_registry(capabilities: &Capabilities, retry: RetryPolicy) -> OperatorRegistry {
    let mut builder = OperatorRegistry::builder();
    register_capabilities(&mut builder, capabilities, retry);
    builder.build()
}
