//! # Topic Matching
//!
//! Topics are `/`-separated, hierarchical strings (`chat/room-1/messages`).
//! Subscribe-side patterns may use two wildcards:
//!
//! - `+` matches exactly one segment (`chat/+/messages`)
//! - `#` matches one or more trailing segments and is only legal as the
//!   last segment (`chat/#`)
//!
//! Unlike MQTT, `#` never matches the parent level itself: `foo/#` does not
//! match `foo`.
//!
//! Everything here is pure and safe to call from any thread.

/// Segment separator.
pub const SEPARATOR: char = '/';

/// Matches exactly one segment.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Matches one or more trailing segments.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

fn is_wildcard(segment: &str) -> bool {
    segment == SINGLE_LEVEL_WILDCARD || segment == MULTI_LEVEL_WILDCARD
}

/// Check whether `topic` is well formed.
///
/// Rejects empty topics, empty segments (including a leading or trailing
/// `/`), topics whose first segment is a wildcard, a `#` anywhere but the
/// last segment, and, when `allow_wildcards` is false, any wildcard at all.
pub fn is_valid_topic(topic: &str, allow_wildcards: bool) -> bool {
    if topic.is_empty() {
        return false;
    }

    let segments: Vec<&str> = topic.split(SEPARATOR).collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return false;
        }
        if !is_wildcard(segment) {
            continue;
        }
        if i == 0 || !allow_wildcards {
            return false;
        }
        if *segment == MULTI_LEVEL_WILDCARD && i != last {
            return false;
        }
    }

    true
}

/// Check whether `topic` matches the subscription `pattern`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_parts = pattern.split(SEPARATOR);
    let mut topic_parts = topic.split(SEPARATOR);

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (None, None) => return true,
            // `#` swallows the rest, but only as the final pattern segment
            (Some(MULTI_LEVEL_WILDCARD), Some(_)) => return pattern_parts.next().is_none(),
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => continue,
            (Some(expected), Some(actual)) if expected == actual => continue,
            _ => return false,
        }
    }
}

/// True if `topic` is `prefix` itself or one of its sub-topics.
pub fn is_under_prefix(topic: &str, prefix: &str) -> bool {
    match topic.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// True if the topic contains any wildcard segment.
pub fn has_wildcards(topic: &str) -> bool {
    topic.split(SEPARATOR).any(is_wildcard)
}
