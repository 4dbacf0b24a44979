//! Heuristic extraction of regulatory requirements from code text.
//!
//! When a merged source arrives without an explicit requirements list, this
//! module mines candidate requirement sentences out of its content. It is a
//! best-effort heuristic, not a grammar: false positives and negatives are
//! expected. The only contract is determinism, the length bounds, the cap,
//! and the absence of duplicates.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// A candidate shorter than this (after trimming) is discarded as noise.
pub const MIN_REQUIREMENT_CHARS: usize = 15;
/// A candidate this long or longer is discarded as a run-on block.
pub const MAX_REQUIREMENT_CHARS: usize = 200;
/// Upper bound on extracted requirements per source.
pub const MAX_REQUIREMENTS: usize = 7;

/// Lines starting with a `-`, `•`, or `*` bullet marker.
static BULLET_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-•*]\s+(.+)$").unwrap());

/// Lines starting with `1.` / `1)` style numbering.
static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+[.)]\s+(.+)$").unwrap());

/// Sentences containing a number followed by a unit of measure.
static MEASUREMENT_SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[^.]*\b\d+\s*(?:feet|foot|ft|inches|inch|days?|percent|%|square feet|sq\.?\s*ft)[^.]*\.")
        .unwrap()
});

/// Sentences containing an obligation or limit keyword.
static KEYWORD_SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[^.]*\b(?:must|shall|required|prohibited|not permitted|not allowed|maximum|minimum|limited to|cannot exceed|may not)[^.]*\.")
        .unwrap()
});

fn within_bounds(text: &str) -> bool {
    let len = text.chars().count();
    len > MIN_REQUIREMENT_CHARS && len < MAX_REQUIREMENT_CHARS
}

/// Extract up to [`MAX_REQUIREMENTS`] candidate requirement strings from a
/// block of code text.
///
/// Four pattern families are applied in priority order: bulleted lines,
/// numbered lines, measurement sentences, and keyword sentences. Candidates
/// outside the length bounds are dropped; duplicates keep their first-found
/// position. Never fails — text with no matches yields an empty list.
pub fn extract_requirements(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<String> = Vec::new();

    for caps in BULLET_LINE.captures_iter(content) {
        let text = caps[1].trim().to_string();
        if within_bounds(&text) && !candidates.contains(&text) {
            candidates.push(text);
        }
    }

    for caps in NUMBERED_LINE.captures_iter(content) {
        let text = caps[1].trim().to_string();
        if within_bounds(&text) && !candidates.contains(&text) {
            candidates.push(text);
        }
    }

    for m in MEASUREMENT_SENTENCE.find_iter(content) {
        let text = m.as_str().trim().to_string();
        if within_bounds(&text) && !candidates.contains(&text) {
            candidates.push(text);
        }
    }

    for m in KEYWORD_SENTENCE.find_iter(content) {
        let text = m.as_str().trim().to_string();
        if within_bounds(&text) {
            candidates.push(text);
        }
    }

    let mut unique = dedup_preserve_order(candidates);
    unique.truncate(MAX_REQUIREMENTS);
    unique
}

/// Remove duplicate strings, keeping the first occurrence of each.
pub fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
