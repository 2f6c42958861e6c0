use crate::retry::{on_transient_error, RetryPolicy};
use crate::traits::{BatchConfiguration, BatchTestClient};
use crate::types::{
    BatchConfig, BatchInput, BatchTestError, EvaluationResult, OperationCreated, OperationStatus,
    Result,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const SUBSCRIPTION_KEY_HEADER: &str = "Apim-Subscription-Key";
pub const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// [`BatchTestClient`] that talks to the provider over HTTPS. Every call goes
/// through the transient-retry policy.
pub struct HttpBatchTestClient {
    client: Client,
    configuration: Arc<dyn BatchConfiguration>,
    retry_policy: RetryPolicy,
}

impl HttpBatchTestClient {
    pub fn new(configuration: Arc<dyn BatchConfiguration>, config: &BatchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            configuration,
            retry_policy: RetryPolicy::from(config),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(SUBSCRIPTION_KEY_HEADER, self.configuration.credential()?)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        debug!("Received HTTP {} from batch evaluation service", status);

        Err(BatchTestError::UnexpectedStatus {
            status,
            retry_after,
            body: response.text().await.unwrap_or_default(),
        })
    }

    async fn create_operation(&self, url: &str, body: &str) -> Result<String> {
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let response = self.send(request).await?;

        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let text = response.text().await?;
        let created: OperationCreated = if text.trim().is_empty() {
            OperationCreated::default()
        } else {
            serde_json::from_str(&text)?
        };

        created
            .operation_id
            .or_else(|| location.as_deref().and_then(operation_id_from_location))
            .ok_or(BatchTestError::MissingOperationId)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send(self.client.get(url)).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Last path segment of an `Operation-Location` URL.
pub fn operation_id_from_location(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next()?;
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

#[async_trait]
impl BatchTestClient for HttpBatchTestClient {
    async fn submit(
        &self,
        input: &BatchInput,
        cancellation: &CancellationToken,
    ) -> Result<String> {
        let url = self.configuration.evaluation_endpoint()?;
        let body = serde_json::to_string(input)?;

        let operation_id = on_transient_error(&self.retry_policy, cancellation, || {
            self.create_operation(&url, &body)
        })
        .await?;

        info!(
            "Created evaluation operation {} for {} utterances",
            operation_id,
            input.utterances.len()
        );
        Ok(operation_id)
    }

    async fn poll_status(
        &self,
        operation_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<OperationStatus> {
        let url = self.configuration.status_endpoint(operation_id)?;
        on_transient_error(&self.retry_policy, cancellation, || {
            self.get_json::<OperationStatus>(&url)
        })
        .await
    }

    async fn fetch_result(
        &self,
        operation_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<EvaluationResult> {
        let url = self.configuration.result_endpoint(operation_id)?;
        on_transient_error(&self.retry_policy, cancellation, || {
            self.get_json::<EvaluationResult>(&url)
        })
        .await
    }
}
