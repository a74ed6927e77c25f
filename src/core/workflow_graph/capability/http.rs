use crate::core::workflow_graph::capability::{
    ArtifactCapability, ArtifactRequest, Capabilities, CapabilityError, ClassificationCapability,
    ClassificationRequest, Label, NotificationCapability, NotificationRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Endpoints of the three capability services.
#[derive(Debug, Clone)]
pub struct HttpEndpoints {
    pub classification: Url,
    pub notification: Url,
    pub artifact: Url,
}

/// JSON-over-HTTP client implementing every capability trait.
///
/// Each call is a single `POST` with a JSON body; any non-2xx status is an error.
#[derive(Clone)]
pub struct HttpCapabilityClient {
    client: reqwest::Client,
    endpoints: HttpEndpoints,
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct DetectLabelsResponse {
    labels: Vec<Label>,
}

#[derive(Serialize)]
struct DetectLabelsPayload<'a> {
    container: &'a str,
    key: &'a str,
    label_filter: &'a [String],
}

impl HttpCapabilityClient {
    pub fn new(endpoints: HttpEndpoints, request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
            request_timeout,
        }
    }

    /// Share one client as all three capabilities.
    pub fn into_capabilities(self) -> Capabilities {
        let shared = Arc::new(self);
        Capabilities {
            classification: shared.clone(),
            notification: shared.clone(),
            artifact: shared,
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &Url,
        payload: &T,
    ) -> Result<reqwest::Response, CapabilityError> {
        let response = self
            .client
            .post(endpoint.clone())
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| CapabilityError::Network {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ClassificationCapability for HttpCapabilityClient {
    async fn detect_labels(
        &self,
        request: ClassificationRequest,
    ) -> Result<Vec<Label>, CapabilityError> {
        let endpoint = &self.endpoints.classification;
        let payload = DetectLabelsPayload {
            container: &request.container,
            key: &request.key,
            label_filter: &request.label_filter,
        };
        let response = self.post(endpoint, &payload).await?;
        let parsed: DetectLabelsResponse =
            response
                .json()
                .await
                .map_err(|e| CapabilityError::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })?;
        tracing::debug!(
            key = %request.key,
            labels = parsed.labels.len(),
            "classification returned"
        );
        Ok(parsed.labels)
    }
}

#[async_trait]
impl NotificationCapability for HttpCapabilityClient {
    async fn publish(&self, request: NotificationRequest) -> Result<(), CapabilityError> {
        self.post(&self.endpoints.notification, &request).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactCapability for HttpCapabilityClient {
    async fn generate(&self, request: ArtifactRequest) -> Result<(), CapabilityError> {
        self.post(&self.endpoints.artifact, &request).await?;
        Ok(())
    }
}
