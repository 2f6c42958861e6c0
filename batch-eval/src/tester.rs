use crate::entities::resolve_utterance;
use crate::results::to_labeled_utterances;
use crate::retry::sleep_or_cancel;
use crate::traits::{BatchConfiguration, BatchTestClient};
use crate::types::{
    BatchConfig, BatchInput, BatchTestError, BatchUtterance, LabeledUtterance,
    NluBatchTestClient, OperationState, Result, Utterance,
};
use crate::utils::{batch, select_async};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument, Span};
use uuid::Uuid;

/// Batches in flight at once.
const BATCH_PARALLELISM: usize = 1;

/// Splits a test set into provider-sized batches, runs each as a remote
/// evaluation job and collects the labeled results in input order.
pub struct BatchTester {
    configuration: Arc<dyn BatchConfiguration>,
    client: Arc<dyn BatchTestClient>,
    config: BatchConfig,
    span: Span,
}

impl BatchTester {
    pub fn new(
        configuration: Arc<dyn BatchConfiguration>,
        client: Arc<dyn BatchTestClient>,
        config: BatchConfig,
    ) -> Self {
        Self {
            configuration,
            client,
            config,
            span: info_span!("batch_tester"),
        }
    }

    /// Parent span for everything this tester logs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_batch_enabled(&self) -> bool {
        self.configuration.is_batch_enabled()
    }

    pub async fn evaluate(
        &self,
        utterances: impl IntoIterator<Item = Utterance>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<LabeledUtterance>> {
        let span = info_span!(parent: &self.span, "evaluate", run_id = %Uuid::new_v4());

        async {
            let resolved = utterances
                .into_iter()
                .map(resolve_utterance)
                .collect::<Result<Vec<_>>>()?;
            let total = resolved.len();
            info!(
                "Evaluating {} utterances in batches of {}",
                total, self.config.batch_size
            );

            let batches = batch(resolved, self.config.batch_size)?;
            let results = select_async(
                batches,
                |utterances| self.evaluate_batch(utterances, cancellation),
                BATCH_PARALLELISM,
            )
            .await?;

            let outcomes: Vec<LabeledUtterance> = results.into_iter().flatten().collect();
            info!("Evaluated {}/{} utterances", outcomes.len(), total);
            Ok(outcomes)
        }
        .instrument(span)
        .await
    }

    async fn evaluate_batch(
        &self,
        utterances: Vec<BatchUtterance>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<LabeledUtterance>> {
        if cancellation.is_cancelled() {
            return Err(BatchTestError::Cancelled);
        }

        let input = BatchInput { utterances };
        let operation_id = self.client.submit(&input, cancellation).await?;

        async {
            self.wait_for_completion(&operation_id, cancellation).await?;
            let result = self.client.fetch_result(&operation_id, cancellation).await?;
            let outcomes = to_labeled_utterances(&input.utterances, &result)?;
            info!("Batch of {} utterances evaluated", input.utterances.len());
            Ok(outcomes)
        }
        .instrument(info_span!("batch", operation_id = %operation_id))
        .await
    }

    async fn wait_for_completion(
        &self,
        operation_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        loop {
            let status = self.client.poll_status(operation_id, cancellation).await?;
            match status.status {
                OperationState::Succeeded => return Ok(()),
                OperationState::Failed => {
                    return Err(BatchTestError::OperationFailed {
                        operation_id: operation_id.to_string(),
                        details: status
                            .error_details
                            .unwrap_or_else(|| "no details provided".to_string()),
                    });
                }
                other => {
                    debug!("Operation {} is {:?}", operation_id, other);
                    sleep_or_cancel(self.config.poll_interval, cancellation).await?;
                }
            }
        }
    }
}

#[async_trait]
impl NluBatchTestClient for BatchTester {
    type Error = BatchTestError;

    fn is_batch_enabled(&self) -> bool {
        BatchTester::is_batch_enabled(self)
    }

    async fn test_batch(
        &self,
        utterances: Vec<Utterance>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<LabeledUtterance>> {
        self.evaluate(utterances, cancellation).await
    }
}
