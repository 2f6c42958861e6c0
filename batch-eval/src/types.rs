use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use interfaces::defs::{
    Entity, EntityAnnotation, EntityMatch, EntitySpan, LabeledUtterance, NluBatchTestClient,
    Utterance,
};

/// Submission envelope for one batch evaluation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    #[serde(rename = "LabeledTestSetUtterances")]
    pub utterances: Vec<BatchUtterance>,
}

/// An utterance whose entities have all been resolved to explicit spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUtterance {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: Vec<BatchEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntity {
    pub start_pos: usize,
    pub end_pos: usize,
    pub entity: String,
}

/// Body of the create-operation response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCreated {
    #[serde(default)]
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Other(String),
}

impl From<String> for OperationState {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "notstarted" => OperationState::NotStarted,
            "running" => OperationState::Running,
            "succeeded" => OperationState::Succeeded,
            "failed" => OperationState::Failed,
            _ => OperationState::Other(value),
        }
    }
}

impl From<OperationState> for String {
    fn from(state: OperationState) -> Self {
        match state {
            OperationState::NotStarted => "notstarted".to_string(),
            OperationState::Running => "running".to_string(),
            OperationState::Succeeded => "succeeded".to_string(),
            OperationState::Failed => "failed".to_string(),
            OperationState::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub status: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl OperationStatus {
    pub fn new(status: OperationState) -> Self {
        Self {
            status,
            error_details: None,
        }
    }
}

/// Structured result of a completed evaluation job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    #[serde(default)]
    pub entity_models_stats: Vec<EntityModelStats>,
    #[serde(default)]
    pub utterances_stats: Vec<UtteranceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityModelStats {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceStats {
    pub text: String,
    #[serde(default)]
    pub predicted_intent_name: Option<String>,
    #[serde(default)]
    pub labeled_intent_name: Option<String>,
    #[serde(default)]
    pub false_positive_entities: Vec<EntityStats>,
    #[serde(default)]
    pub false_negative_entities: Vec<EntityStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStats {
    pub entity_name: String,
    pub start_char_index: usize,
    pub end_char_index: usize,
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Largest number of utterances the provider accepts in one job.
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub transient_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            user_agent: "NLU-Batch-Eval/1.0".to_string(),
            timeout_seconds: 100,
            batch_size: 500,
            poll_interval: Duration::from_secs(2),
            max_attempts: 5,
            transient_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchTestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        status: StatusCode,
        retry_after: Option<String>,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("Could not find occurrence {match_index} of '{match_text}' in '{text}'")]
    EntityNotFound {
        match_text: String,
        match_index: usize,
        text: String,
    },

    #[error("Entity '{match_text}' in '{text}' has no entity type")]
    MissingEntityType { match_text: String, text: String },

    #[error("Entity '{entity}' span [{start}, {end}] is outside '{text}'")]
    InvalidEntitySpan {
        entity: String,
        start: usize,
        end: usize,
        text: String,
    },

    #[error("Submitted {submitted} utterances but received statistics for {received}")]
    StatisticsCountMismatch { submitted: usize, received: usize },

    #[error("No statistics were returned for utterance '{text}'")]
    MissingStatistics { text: String },

    #[error("Evaluation operation response did not include an operation id")]
    MissingOperationId,

    #[error("Evaluation operation {operation_id} failed: {details}")]
    OperationFailed {
        operation_id: String,
        details: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl BatchTestError {
    /// Whether the failure is worth retrying after a delay.
    pub fn is_transient(&self) -> bool {
        match self {
            BatchTestError::UnexpectedStatus { status, .. } => {
                crate::retry::is_transient_status(*status)
            }
            _ => false,
        }
    }

    /// Raw `Retry-After` header value sent with a failed response.
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            BatchTestError::UnexpectedStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchTestError::Cancelled)
    }

    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        BatchTestError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchTestError>;
