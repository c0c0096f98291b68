//! Topic pattern matching.
//!
//! Topics are dot-separated segments (`orders.eu.created`). Registration
//! patterns may use two wildcards:
//!
//! - `*` matches exactly one segment
//! - `>` matches one or more trailing segments and must come last

use thiserror::Error;

/// Whether `topic` is accepted by `pattern`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut topic_segments = topic.split('.');

    for segment in pattern.split('.') {
        let current = topic_segments.next();
        match segment {
            // Consumes the rest, but at least one segment must be present
            ">" => return current.is_some(),
            "*" if current.is_none() => return false,
            "*" => {}
            literal if current != Some(literal) => return false,
            _ => {}
        }
    }

    topic_segments.next().is_none()
}

/// Reasons a registration pattern is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("segment {0} is empty")]
    EmptySegment(usize),

    #[error("'>' at segment {0} must be the last segment")]
    TailNotLast(usize),
}

/// Check that `pattern` is well formed: no empty segments, `>` only last.
pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    let segments: Vec<&str> = pattern.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(PatternError::EmptySegment(i));
        }
        if *segment == ">" && i + 1 != segments.len() {
            return Err(PatternError::TailNotLast(i));
        }
    }
    Ok(())
}

/// A concrete topic: non-empty segments and no wildcards.
pub fn is_literal_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic
            .split('.')
            .all(|s| !s.is_empty() && s != "*" && s != ">")
}
