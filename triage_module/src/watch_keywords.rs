//! Watch keywords flag incoming items for attention.
//!
//! Keywords arrive either as a free-form command ("alpha, beta" or
//! "alpha beta") or as repeated `watch` query parameters on the queue sync
//! endpoint. Both paths funnel through [`normalize_watch_keywords`].

use serde_json::Value;

use crate::value_guards::parse_required_string_value;

pub const MIN_WATCH_KEYWORD_LENGTH: usize = 3;
pub const MAX_WATCH_KEYWORDS: usize = 8;

const CURSOR_PARAM: &str = "cursor";
const WATCH_PARAM: &str = "watch";

/// Trim, lowercase and dedupe keywords, keeping first-seen order.
///
/// Iteration stops as soon as [`MAX_WATCH_KEYWORDS`] distinct keywords are held.
pub fn normalize_watch_keywords<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keywords: Vec<String> = Vec::new();

    for entry in entries {
        let keyword = entry.as_ref().trim().to_lowercase();
        if keyword.chars().count() < MIN_WATCH_KEYWORD_LENGTH {
            continue;
        }

        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
        if keywords.len() >= MAX_WATCH_KEYWORDS {
            break;
        }
    }

    keywords
}

/// Split a command on commas when it has any, otherwise on whitespace.
pub fn parse_watch_keyword_command(command: &str) -> Vec<String> {
    let normalized = command.trim();
    if normalized.is_empty() {
        return Vec::new();
    }

    if normalized.contains(',') {
        normalize_watch_keywords(normalized.split(','))
    } else {
        normalize_watch_keywords(normalized.split_whitespace())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSyncQuery {
    pub cursor: Option<String>,
    pub watch_keywords: Option<Vec<String>>,
}

/// Read `cursor` and repeated `watch` parameters from a raw query string.
///
/// Each `&`-separated pair is decoded on its own; a pair that fails to
/// decode is skipped and the rest are kept.
pub fn parse_queue_sync_query(query: &str) -> QueueSyncQuery {
    let pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| {
            serde_urlencoded::from_str::<Vec<(String, String)>>(segment).unwrap_or_default()
        })
        .collect();

    let cursor = pairs
        .iter()
        .find(|(key, _)| key == CURSOR_PARAM)
        .and_then(|(_, value)| parse_required_string_value(&Value::String(value.clone())));
    let watch_keywords = normalize_watch_keywords(
        pairs
            .iter()
            .filter(|(key, _)| key == WATCH_PARAM)
            .map(|(_, value)| value.as_str()),
    );

    QueueSyncQuery {
        cursor,
        watch_keywords: if watch_keywords.is_empty() {
            None
        } else {
            Some(watch_keywords)
        },
    }
}

pub fn build_queue_sync_query(query: &QueueSyncQuery) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(cursor) = query.cursor.as_deref().filter(|cursor| !cursor.is_empty()) {
        pairs.push((CURSOR_PARAM, cursor.to_string()));
    }

    let keywords = normalize_watch_keywords(query.watch_keywords.iter().flatten());
    for keyword in keywords {
        pairs.push((WATCH_PARAM, keyword));
    }

    serde_urlencoded::to_string(&pairs).unwrap_or_default()
}
