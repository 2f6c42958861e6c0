use crate::entities::{occurrence_index, span_text};
use crate::types::{
    BatchTestError, BatchUtterance, Entity, EntityStats, EvaluationResult, LabeledUtterance,
    Result, UtteranceStats,
};
use std::collections::HashSet;
use tracing::debug;

/// Converts one batch's evaluation result into labeled utterances, one per
/// submitted utterance and in submission order.
///
/// Each submitted utterance takes the statistics record at its own position
/// when the texts agree, otherwise the first unclaimed record with the same
/// text. Predicted entities are the labeled spans minus the false negatives,
/// plus the false positives, keeping only entities whose model is in the
/// result's roster.
pub fn to_labeled_utterances(
    submitted: &[BatchUtterance],
    result: &EvaluationResult,
) -> Result<Vec<LabeledUtterance>> {
    if submitted.len() != result.utterances_stats.len() {
        return Err(BatchTestError::StatisticsCountMismatch {
            submitted: submitted.len(),
            received: result.utterances_stats.len(),
        });
    }

    let roster: HashSet<&str> = result
        .entity_models_stats
        .iter()
        .map(|model| model.model_name.as_str())
        .collect();

    let mut claimed = vec![false; result.utterances_stats.len()];
    submitted
        .iter()
        .enumerate()
        .map(|(i, utterance)| {
            let index = statistics_for(i, utterance, &result.utterances_stats, &claimed)
                .ok_or_else(|| BatchTestError::MissingStatistics {
                    text: utterance.text.clone(),
                })?;
            claimed[index] = true;
            to_labeled_utterance(utterance, &result.utterances_stats[index], &roster)
        })
        .collect()
}

fn statistics_for(
    position: usize,
    utterance: &BatchUtterance,
    stats: &[UtteranceStats],
    claimed: &[bool],
) -> Option<usize> {
    if !claimed[position] && stats[position].text == utterance.text {
        return Some(position);
    }

    let index = (0..stats.len()).find(|&i| !claimed[i] && stats[i].text == utterance.text)?;
    debug!(
        "Statistics for '{}' arrived at position {} instead of {}",
        utterance.text, index, position
    );
    Some(index)
}

fn to_labeled_utterance(
    submitted: &BatchUtterance,
    stats: &UtteranceStats,
    roster: &HashSet<&str>,
) -> Result<LabeledUtterance> {
    let labeled = submitted
        .entities
        .iter()
        .map(|entity| EntityStats {
            entity_name: entity.entity.clone(),
            start_char_index: entity.start_pos,
            end_char_index: entity.end_pos,
        });

    let mut predicted: Vec<EntityStats> = labeled
        .filter(|entity| !stats.false_negative_entities.contains(entity))
        .collect();
    predicted.extend(stats.false_positive_entities.iter().cloned());

    let mut seen = HashSet::new();
    predicted.retain(|entity| seen.insert(entity.clone()));

    let mut entities = Vec::with_capacity(predicted.len());
    for entity in predicted {
        if !roster.contains(entity.entity_name.as_str()) {
            debug!(
                "Dropping entity '{}' without model statistics",
                entity.entity_name
            );
            continue;
        }
        entities.push(to_entity(&stats.text, &entity)?);
    }

    Ok(LabeledUtterance {
        text: stats.text.clone(),
        intent: stats.predicted_intent_name.clone(),
        entities,
    })
}

fn to_entity(text: &str, stats: &EntityStats) -> Result<Entity> {
    let match_text = span_text(text, stats.start_char_index, stats.end_char_index).ok_or_else(
        || BatchTestError::InvalidEntitySpan {
            entity: stats.entity_name.clone(),
            start: stats.start_char_index,
            end: stats.end_char_index,
            text: text.to_string(),
        },
    )?;

    Ok(Entity {
        entity_type: stats.entity_name.clone(),
        match_text: match_text.to_string(),
        match_index: occurrence_index(text, match_text, stats.start_char_index),
    })
}
