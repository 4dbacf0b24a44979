//! Core data types for the ARC Bot response and upload pipelines.
//!
//! These types represent the citation fragments, merged sources, and
//! structured answers that flow between the upstream agent and the frontend,
//! plus the chunks produced for knowledge-base upload.

use serde::{Deserialize, Serialize};

/// Coarse confidence rating attached to a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Parse a level string leniently. Anything unrecognized maps to `Medium`,
    /// so a sloppy upstream payload can never produce an invalid rating.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => ConfidenceLevel::High,
            "low" => ConfidenceLevel::Low,
            _ => ConfidenceLevel::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// Confidence rating with free-text rationale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub explanation: String,
}

/// A single citation fragment as produced by the upstream agent,
/// after field-level normalization (defaults applied, nothing merged yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFragment {
    pub document_name: String,
    pub section_title: String,
    pub section_hierarchy: Vec<String>,
    pub is_binding: bool,
    pub requirements: Vec<String>,
    pub content: String,
}

impl SourceFragment {
    /// Grouping key: fragments citing the same section of the same document
    /// collapse into one logical source regardless of how many retrieval
    /// chunks they came from.
    pub fn merge_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.document_name,
            self.section_hierarchy.join(" > "),
            self.section_title
        )
    }
}

/// One logical source in the final response: all fragments sharing a merge
/// key, with contents joined and requirements deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedSource {
    pub document_name: String,
    pub section_title: String,
    pub section_hierarchy: Vec<String>,
    pub is_binding: bool,
    pub requirements: Vec<String>,
    pub content: String,
}

/// Per-conversation state supplied by the caller. The normalizer never
/// stores this; it only echoes the id and bumps the history counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub history_count: i64,
}

/// The structured response payload returned to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub status: String,
    pub session_id: String,
    pub answer: String,
    pub sources: Vec<MergedSource>,
    pub confidence: Confidence,
    pub history_length: i64,
}

/// A section of a municipal-code document prepared for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    /// 1-based position within the document.
    pub chunk_index: i64,
    pub section_title: String,
    pub section_hierarchy: Vec<String>,
    pub content: String,
    /// SHA-256 of the content, hex-encoded.
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_level_parse() {
        assert_eq!(ConfidenceLevel::parse("High"), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::parse("LOW"), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::parse("medium"), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::parse("bogus"), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::parse(""), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_confidence_level_serializes_capitalized() {
        let json = serde_json::to_string(&ConfidenceLevel::High).unwrap();
        assert_eq!(json, "\"High\"");
    }

    #[test]
    fn test_merge_key_includes_hierarchy() {
        let frag = SourceFragment {
            document_name: "Development Code".to_string(),
            section_title: "2.7.3750 Large Lot Residential District".to_string(),
            section_hierarchy: vec!["Ch. 2.7".to_string(), "Article XIX".to_string()],
            is_binding: true,
            requirements: vec![],
            content: String::new(),
        };
        assert_eq!(
            frag.merge_key(),
            "Development Code|Ch. 2.7 > Article XIX|2.7.3750 Large Lot Residential District"
        );
    }
}
