//! Section-boundary chunker for municipal-code text.
//!
//! Splits a code document into one chunk per numbered section, keyed on
//! heading lines like `2.7.3750 Large Lot Residential District.`. Section
//! numbers are dot-separated with at least three components, which keeps
//! ordinary decimal figures ("6.5 feet") from being mistaken for headings.
//!
//! Each chunk carries the heading as its section title, the configured
//! hierarchy prefix plus the section number as its hierarchy path, and a
//! SHA-256 hash of its content for change detection.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::CodeChunk;

/// Heading line: section number (three or more numeric components) followed
/// by a title, e.g. `2.7.3700 Discovery West Master Planned Development.`
static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(\d+(?:\.\d+){2,})\s+(\S.*?)\s*$").unwrap());

/// Split municipal-code text into per-section chunks.
///
/// `hierarchy_prefix` is prepended to each chunk's hierarchy path, with the
/// section number appended (e.g. `["BDC Ch. 2.7", "Article XIX", "2.7.3750"]`).
/// Text before the first heading becomes an untitled preamble chunk when
/// non-empty. Chunk indices are 1-based and contiguous; output is
/// deterministic for identical input.
pub fn chunk_code_text(text: &str, hierarchy_prefix: &[String]) -> Vec<CodeChunk> {
    let headings: Vec<(usize, String, String)> = SECTION_HEADING
        .captures_iter(text)
        .map(|caps| {
            let start = caps.get(0).unwrap().start();
            let number = caps[1].to_string();
            let title_line = caps[2].trim_end_matches('.').trim().to_string();
            (start, number, title_line)
        })
        .collect();

    let mut chunks = Vec::new();
    let mut index: i64 = 1;

    // Preamble ahead of the first heading
    let preamble_end = headings.first().map_or(text.len(), |(start, _, _)| *start);
    let preamble = text[..preamble_end].trim();
    if !preamble.is_empty() {
        chunks.push(make_chunk(
            index,
            String::new(),
            hierarchy_prefix.to_vec(),
            preamble,
        ));
        index += 1;
    }

    for (i, (start, number, title)) in headings.iter().enumerate() {
        let end = headings
            .get(i + 1)
            .map_or(text.len(), |(next_start, _, _)| *next_start);
        let content = text[*start..end].trim();
        if content.is_empty() {
            continue;
        }

        let mut hierarchy = hierarchy_prefix.to_vec();
        hierarchy.push(number.clone());

        chunks.push(make_chunk(
            index,
            format!("{} {}", number, title),
            hierarchy,
            content,
        ));
        index += 1;
    }

    chunks
}

fn make_chunk(
    index: i64,
    section_title: String,
    section_hierarchy: Vec<String>,
    content: &str,
) -> CodeChunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    CodeChunk {
        chunk_index: index,
        section_title,
        section_hierarchy,
        content: content.to_string(),
        content_hash,
    }
}
