use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A test utterance with its expected labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityAnnotation>,
}

/// An expected entity, either as an explicit character span or as a
/// substring to locate in the utterance text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityAnnotation {
    Span(EntitySpan),
    Match(EntityMatch),
}

/// Inclusive character span `[start_pos, end_pos]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySpan {
    pub start_pos: usize,
    pub end_pos: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

impl EntitySpan {
    /// The explicit `entity` name, falling back to the legacy `entityType`.
    pub fn entity_name(&self) -> Option<&str> {
        self.entity.as_deref().or(self.entity_type.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub match_text: String,
    /// Zero-based occurrence of `match_text` within the utterance text.
    #[serde(default)]
    pub match_index: usize,
}

impl EntityMatch {
    /// The explicit `entity` name, falling back to the legacy `entityType`.
    pub fn entity_name(&self) -> Option<&str> {
        self.entity.as_deref().or(self.entity_type.as_deref())
    }
}

/// An utterance as the NLU model understood it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledUtterance {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_type: String,
    pub match_text: String,
    pub match_index: usize,
}

/// A provider that can evaluate many utterances as one remote batch job.
#[async_trait]
pub trait NluBatchTestClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the provider has batch evaluation switched on.
    fn is_batch_enabled(&self) -> bool;

    /// Evaluates `utterances`, returning one outcome per utterance in input order.
    async fn test_batch(
        &self,
        utterances: Vec<Utterance>,
        cancellation: &CancellationToken,
    ) -> Result<Vec<LabeledUtterance>, Self::Error>;
}
