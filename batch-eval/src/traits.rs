use crate::types::{BatchInput, EvaluationResult, OperationStatus, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Settings the batch client needs from the provider configuration.
pub trait BatchConfiguration: Send + Sync {
    /// Whether batch evaluation has been switched on.
    fn is_batch_enabled(&self) -> bool;

    /// Endpoint that accepts new evaluation jobs.
    fn evaluation_endpoint(&self) -> Result<String>;

    fn status_endpoint(&self, operation_id: &str) -> Result<String> {
        Ok(format!("{}/{}/status", self.evaluation_endpoint()?, operation_id))
    }

    fn result_endpoint(&self, operation_id: &str) -> Result<String> {
        Ok(format!("{}/{}/result", self.evaluation_endpoint()?, operation_id))
    }

    /// Subscription key sent with every request.
    fn credential(&self) -> Result<String>;
}

/// Remote long-running evaluation jobs.
#[async_trait]
pub trait BatchTestClient: Send + Sync {
    /// Starts an evaluation job and returns its operation id.
    async fn submit(&self, input: &BatchInput, cancellation: &CancellationToken)
        -> Result<String>;

    async fn poll_status(
        &self,
        operation_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<OperationStatus>;

    /// Only meaningful once the job reported success.
    async fn fetch_result(
        &self,
        operation_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<EvaluationResult>;
}
