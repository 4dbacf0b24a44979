//! Response normalizer for raw upstream agent output.
//!
//! The upstream language-model agent answers development-code questions with
//! free text that usually — but not always — embeds a JSON payload carrying
//! the answer, citation sources, and a confidence rating. This module turns
//! that raw string into a well-formed [`NormalizedResponse`] no matter what
//! the agent produced:
//!
//! 1. Extract the payload from a fenced code block, or from a bare
//!    `{`-prefixed string.
//! 2. Apply field defaults, then merge citation fragments by section so the
//!    frontend shows one card per cited code section instead of one per
//!    retrieval chunk.
//! 3. On any parse failure, degrade to plain-text passthrough and salvage a
//!    `**Confidence:**` line marker if one is present.
//!
//! The function is pure and infallible: for any input string it returns a
//! complete response object. There is no retry — a single best-effort pass.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{
    Confidence, ConfidenceLevel, MergedSource, NormalizedResponse, SessionContext, SourceFragment,
};
use crate::requirements::{dedup_preserve_order, extract_requirements};

/// Separator placed between the contents of merged fragments.
pub const CONTENT_SEPARATOR: &str = "\n\n---\n\n";

/// Name used when a fragment arrives without a document name.
pub const UNKNOWN_DOCUMENT: &str = "Unknown Document";

/// Fenced code block, optionally tagged `json`.
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap());

/// `**Confidence:** High — rationale` line marker, tolerant of dash variants.
static CONFIDENCE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\*\*Confidence:\*\*\s*(High|Medium|Low)\s*[—–-]?\s*([^\n]*)").unwrap()
});

/// Any `**Confidence:**` line, for stripping from the answer text.
static CONFIDENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*Confidence:\*\*[^\n]*").unwrap());

/// Behavior switches for [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Merge citation fragments that share a merge key into one source.
    /// When false, normalized fragments pass through unmerged and no
    /// requirement extraction runs.
    pub merge_sources: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            merge_sources: true,
        }
    }
}

/// Normalize raw agent output into a structured response.
///
/// Never fails. Malformed or absent JSON degrades to treating the whole
/// input as the answer text; missing fields take their documented defaults.
/// `history_length` is always `session.history_count + 1`.
pub fn normalize(
    raw_output: &str,
    session: &SessionContext,
    options: &NormalizeOptions,
) -> NormalizedResponse {
    let (answer, sources, confidence) = match extract_payload(raw_output) {
        Some(payload) => structured_fields(&payload, options),
        None => plain_text_fields(raw_output),
    };

    NormalizedResponse {
        status: "success".to_string(),
        session_id: session.session_id.clone(),
        answer,
        sources,
        confidence,
        history_length: session.history_count + 1,
    }
}

/// Locate and parse the embedded JSON payload, if any.
///
/// A fenced code block takes precedence; if one is present but fails to
/// parse, the bare-object path is not attempted (the block was the agent's
/// one shot at structured output).
fn extract_payload(raw_output: &str) -> Option<Value> {
    if let Some(caps) = FENCED_BLOCK.captures(raw_output) {
        return serde_json::from_str(caps[1].trim()).ok();
    }

    let trimmed = raw_output.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).ok();
    }

    None
}

/// Success path: pull answer, sources, and confidence out of the payload,
/// applying defaults for everything missing.
fn structured_fields(
    payload: &Value,
    options: &NormalizeOptions,
) -> (String, Vec<MergedSource>, Confidence) {
    let answer = payload
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let fragments: Vec<SourceFragment> = payload
        .get("sources")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(fragment_from_value).collect())
        .unwrap_or_default();

    let sources = if options.merge_sources {
        merge_by_section(fragments)
    } else {
        fragments.into_iter().map(source_from_fragment).collect()
    };

    let confidence = payload
        .get("confidence")
        .map(confidence_from_value)
        .unwrap_or_default();

    (answer, sources, confidence)
}

/// Fallback path: the raw text is the answer. If it carries a
/// `**Confidence:**` line marker, lift the rating out and strip every such
/// line from the answer.
fn plain_text_fields(raw_output: &str) -> (String, Vec<MergedSource>, Confidence) {
    let mut answer = raw_output.to_string();
    let mut confidence = Confidence::default();

    if let Some(caps) = CONFIDENCE_MARKER.captures(raw_output) {
        confidence.level = ConfidenceLevel::parse(&caps[1]);
        confidence.explanation = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        answer = CONFIDENCE_LINE.replace_all(&answer, "").trim().to_string();
    }

    (answer, Vec::new(), confidence)
}

/// Normalize one raw source object, applying the field defaults.
/// Unknown keys (e.g. `page_number`) are ignored.
fn fragment_from_value(value: &Value) -> SourceFragment {
    let string_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    let document_name = match value.get("document_name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_DOCUMENT.to_string(),
    };

    let string_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    SourceFragment {
        document_name,
        section_title: string_field("section_title"),
        section_hierarchy: string_list("section_hierarchy"),
        // Binding unless the agent explicitly said otherwise.
        is_binding: value.get("is_binding").and_then(Value::as_bool) != Some(false),
        requirements: string_list("requirements"),
        content: string_field("content"),
    }
}

fn confidence_from_value(value: &Value) -> Confidence {
    Confidence {
        level: value
            .get("level")
            .and_then(Value::as_str)
            .map(ConfidenceLevel::parse)
            .unwrap_or_default(),
        explanation: value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

/// Pass-through conversion for the unmerged configuration.
fn source_from_fragment(frag: SourceFragment) -> MergedSource {
    MergedSource {
        document_name: frag.document_name,
        section_title: frag.section_title,
        section_hierarchy: frag.section_hierarchy,
        is_binding: frag.is_binding,
        requirements: frag.requirements,
        content: frag.content,
    }
}

/// Accumulator for one merge-key group.
struct SectionGroup {
    document_name: String,
    section_title: String,
    section_hierarchy: Vec<String>,
    is_binding: bool,
    requirements: Vec<String>,
    content_parts: Vec<String>,
}

/// Group fragments by merge key, preserving first-seen key order.
///
/// Within a group, contents concatenate in encounter order separated by
/// [`CONTENT_SEPARATOR`]; requirements are unioned and deduplicated. A group
/// whose members carry no requirements at all falls back to
/// [`extract_requirements`] over its combined content.
///
/// The binding flag is taken from the first fragment seen for each key and
/// never updated by later members — inherited behavior that is arguably a
/// defect, since a later non-binding fragment is silently ignored.
pub fn merge_by_section(fragments: Vec<SourceFragment>) -> Vec<MergedSource> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, SectionGroup> = HashMap::new();

    for frag in fragments {
        let key = frag.merge_key();
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            SectionGroup {
                document_name: frag.document_name.clone(),
                section_title: frag.section_title.clone(),
                section_hierarchy: frag.section_hierarchy.clone(),
                is_binding: frag.is_binding,
                requirements: Vec::new(),
                content_parts: Vec::new(),
            }
        });

        group.requirements.extend(frag.requirements);
        if !frag.content.is_empty() {
            group.content_parts.push(frag.content);
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|group| {
            let content = group.content_parts.join(CONTENT_SEPARATOR);
            let mut requirements = dedup_preserve_order(group.requirements);

            if requirements.is_empty() && !content.is_empty() {
                requirements = extract_requirements(&content);
            }

            MergedSource {
                document_name: group.document_name,
                section_title: group.section_title,
                section_hierarchy: group.section_hierarchy,
                is_binding: group.is_binding,
                requirements,
                content,
            }
        })
        .collect()
}
