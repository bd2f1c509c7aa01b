//! Rule-based reading of retrieved guideline excerpts.
//!
//! Used only when the model gave nothing usable for excerpts that were
//! retrieved: bullet lines become entries, the enclosing section header picks
//! the category and the bullet's wording picks the confidence.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{EvidenceConfidence, GuidelineCategory, GuidelineEntry};
use crate::pipeline::retrieval::RetrievedChunk;
use crate::pipeline::validation::policy::{bound_text, MAX_FIELD_CHARS};
use crate::pipeline::validation::MAX_RECOMMENDATIONS;

/// Shorter bullets are headings or fragments, not recommendations.
const MIN_BULLET_CHARS: usize = 25;

/// Entries whose first 80 characters match are duplicates.
const DEDUP_PREFIX_CHARS: usize = 80;

static WORKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)workup|work-up|diagnostic|investigation|screen").expect("valid regex")
});

static MANAGEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)management|treatment|therapy|therapeut|anti-?fibrotic|pharmacolog")
        .expect("valid regex")
});

static MONITORING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)monitor|surveillance|serial|repeat").expect("valid regex")
});

static FOLLOW_UP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)follow.?up|referral|refer all|review").expect("valid regex")
});

static DIRECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\brecommend|indicated|\bshould\b|required|\bmust\b|standard of care")
        .expect("valid regex")
});

static INFERRED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsuggest|consider|\bmay\b|conditional|optional|\bcould\b").expect("valid regex")
});

static NUMBERED_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.\d]* [A-Z]").expect("valid regex"));

static MARKDOWN_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s+\S").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Category named by a header or paragraph, if any.
pub fn category_hint(line: &str) -> Option<GuidelineCategory> {
    [
        (&*WORKUP_RE, GuidelineCategory::Workup),
        (&*MANAGEMENT_RE, GuidelineCategory::Management),
        (&*MONITORING_RE, GuidelineCategory::Monitoring),
        (&*FOLLOW_UP_RE, GuidelineCategory::FollowUp),
    ]
    .into_iter()
    .find_map(|(re, category)| re.is_match(line).then_some(category))
}

/// Imperative wording is `Direct`, hedged wording `Inferred`, anything
/// else `LowEvidence`.
pub fn classify_confidence(text: &str) -> EvidenceConfidence {
    if DIRECT_RE.is_match(text) {
        EvidenceConfidence::Direct
    } else if INFERRED_RE.is_match(text) {
        EvidenceConfidence::Inferred
    } else {
        EvidenceConfidence::LowEvidence
    }
}

/// Numbered section ("1.3 MANAGEMENT"), markdown heading, or a short
/// all-caps line.
fn is_header(line: &str) -> bool {
    NUMBERED_HEADER_RE.is_match(line)
        || MARKDOWN_HEADER_RE.is_match(line)
        || (line.chars().count() < 80
            && line.chars().any(char::is_alphabetic)
            && !line.chars().any(char::is_lowercase))
}

fn bullet_body(line: &str) -> Option<&str> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

struct ChunkReader<'a> {
    source: &'a str,
    category: GuidelineCategory,
    pending: Option<String>,
    entries: Vec<GuidelineEntry>,
}

impl ChunkReader<'_> {
    fn flush(&mut self) {
        let Some(bullet) = self.pending.take() else {
            return;
        };
        let text = WHITESPACE_RE.replace_all(bullet.trim(), " ").into_owned();
        if text.chars().count() < MIN_BULLET_CHARS {
            return;
        }
        self.entries.push(GuidelineEntry {
            category: self.category,
            confidence: classify_confidence(&text),
            recommendation: bound_text("recommendation", text, MAX_FIELD_CHARS),
            source: self.source.to_string(),
        });
    }
}

/// Bullet entries of one excerpt, in reading order.
pub fn entries_from_chunk(chunk: &RetrievedChunk) -> Vec<GuidelineEntry> {
    let mut reader = ChunkReader {
        source: &chunk.source,
        category: GuidelineCategory::Management,
        pending: None,
        entries: Vec::new(),
    };

    for line in chunk.text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_header(trimmed) {
            reader.flush();
            if let Some(category) = category_hint(trimmed) {
                reader.category = category;
            }
        } else if let Some(body) = bullet_body(trimmed) {
            reader.flush();
            reader.pending = Some(body.to_string());
        } else if line.starts_with("  ") && reader.pending.is_some() {
            if let Some(pending) = reader.pending.as_mut() {
                pending.push(' ');
                pending.push_str(trimmed);
            }
        } else if let Some(category) = category_hint(trimmed) {
            reader.category = category;
        }
    }
    reader.flush();
    reader.entries
}

/// Entries from every excerpt, best-ranked first, without near-duplicates.
pub fn entries_from_chunks(chunks: &[RetrievedChunk]) -> Vec<GuidelineEntry> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .flat_map(entries_from_chunk)
        .filter(|entry| {
            let key: String = entry
                .recommendation
                .chars()
                .take(DEDUP_PREFIX_CHARS)
                .collect::<String>()
                .to_lowercase();
            seen.insert(key)
        })
        .take(MAX_RECOMMENDATIONS)
        .collect()
}
