//! Character-offset helpers for entity spans.
//!
//! Offsets count Unicode scalar values, and spans are inclusive on both ends.
//! Substring matching is ordinal; occurrences may overlap.

use crate::types::{
    BatchEntity, BatchTestError, BatchUtterance, EntityAnnotation, EntityMatch, EntitySpan, Result,
    Utterance,
};

/// Char offset of the `match_index`-th (zero-based) occurrence of `match_text`.
pub fn find_occurrence(text: &str, match_text: &str, match_index: usize) -> Option<usize> {
    if match_text.is_empty() {
        return None;
    }

    let mut from = 0;
    let mut found = None;
    for _ in 0..=match_index {
        let byte = from + text.get(from..)?.find(match_text)?;
        found = Some(byte);
        from = byte + text[byte..].chars().next().map_or(1, char::len_utf8);
    }

    found.map(|byte| text[..byte].chars().count())
}

/// How many occurrences of `match_text` start before char offset `start`.
pub fn occurrence_index(text: &str, match_text: &str, start: usize) -> usize {
    let Some(limit) = byte_offset(text, start) else {
        return 0;
    };
    if match_text.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut from = 0;
    while let Some(offset) = text[from..].find(match_text) {
        let byte = from + offset;
        if byte >= limit {
            break;
        }
        count += 1;
        from = byte + text[byte..].chars().next().map_or(1, char::len_utf8);
    }
    count
}

/// Text covered by the inclusive char span `[start, end]`.
pub fn span_text(text: &str, start: usize, end: usize) -> Option<&str> {
    if end < start {
        return None;
    }
    let from = byte_offset(text, start)?;
    let to = byte_offset(text, end + 1)?;
    Some(&text[from..to])
}

fn byte_offset(text: &str, char_offset: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_offset)
}

/// Converts a match-form annotation into an explicit span over `text`.
pub fn resolve_match(text: &str, annotation: &EntityMatch) -> Result<BatchEntity> {
    if annotation.match_text.is_empty() {
        return Err(BatchTestError::invalid_argument(
            "matchText",
            format!("empty match text in '{}'", text),
        ));
    }

    let entity = annotation
        .entity_name()
        .ok_or_else(|| BatchTestError::MissingEntityType {
            match_text: annotation.match_text.clone(),
            text: text.to_string(),
        })?;

    let start_pos = find_occurrence(text, &annotation.match_text, annotation.match_index)
        .ok_or_else(|| BatchTestError::EntityNotFound {
            match_text: annotation.match_text.clone(),
            match_index: annotation.match_index,
            text: text.to_string(),
        })?;

    Ok(BatchEntity {
        start_pos,
        end_pos: start_pos + annotation.match_text.chars().count() - 1,
        entity: entity.to_string(),
    })
}

/// Checks an explicit span against `text` before it is submitted.
pub fn resolve_span(text: &str, span: &EntitySpan) -> Result<BatchEntity> {
    let covered = span_text(text, span.start_pos, span.end_pos);

    let entity = span
        .entity_name()
        .ok_or_else(|| BatchTestError::MissingEntityType {
            match_text: covered.unwrap_or_default().to_string(),
            text: text.to_string(),
        })?;

    if covered.is_none() {
        return Err(BatchTestError::InvalidEntitySpan {
            entity: entity.to_string(),
            start: span.start_pos,
            end: span.end_pos,
            text: text.to_string(),
        });
    }

    Ok(BatchEntity {
        start_pos: span.start_pos,
        end_pos: span.end_pos,
        entity: entity.to_string(),
    })
}

/// Resolves every entity of `utterance` to span form.
pub fn resolve_utterance(utterance: Utterance) -> Result<BatchUtterance> {
    let entities = utterance
        .entities
        .iter()
        .map(|annotation| match annotation {
            EntityAnnotation::Span(span) => resolve_span(&utterance.text, span),
            EntityAnnotation::Match(m) => resolve_match(&utterance.text, m),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BatchUtterance {
        text: utterance.text,
        intent: utterance.intent,
        entities,
    })
}
