//! Pulls structured fields out of free-form model output.
//!
//! Every function here is pure and total: a transcript that matches none of
//! the expected shapes yields an empty list or a fallback string.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const NO_ANSWER: &str = "Unable to determine an answer from the legal analysis.";

/// Quotes longer than this are truncated to `QUOTE_KEEP` chars plus `...`.
const QUOTE_MAX: usize = 100;
const QUOTE_KEEP: usize = 97;

const MIN_SECTION_ANSWER: usize = 50;
const MIN_LINE_ANSWER: usize = 30;

/// Straight or curly double-quoted span on a single line.
const QUOTE: &str = r#"["“]([^"“”\n]+)["”]"#;

/// End of an answer section: blank line, bold marker, citation label, or end of input.
const SECTION_END: &str = r"(?:\n[ \t]*\n|\*\*|\bcitations?\s*:|\z)";

/// Lines starting with these are search echoes or formatting, not answers.
const METADATA_PREFIXES: &[&str] = &[
    "Document",
    "DOCUMENT",
    "Relevance",
    "Search Results",
    "SEARCH",
    "Content:",
    "ID:",
    "Score:",
    "**",
    "#",
    "- ",
    "* ",
    "• ",
    "===",
    "---",
];

#[allow(clippy::expect_used)]
static DOC_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:clause|doc|section|article|paragraph|rule|code)_[A-Za-z0-9_\-]+\b")
        .expect("valid document id regex")
});

#[allow(clippy::expect_used)]
static ANSWER_SECTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let step = r"(?:step\s*\d+\s*[:.\-]?\s*)?";
    [
        // **Final Answer:** / **STEP 7: FINAL DETERMINATION**
        format!(r"(?is)\*\*\s*{step}final\s+(?:answer|determination)\s*:?\s*\*\*\s*:?\s*(.+?){SECTION_END}"),
        // ## Final Answer / Final Answer: at line start
        format!(r"(?ims)^[ \t]*(?:#{{1,6}}[ \t]*)?{step}final\s+(?:answer|determination)[ \t]*:?\s*(.+?){SECTION_END}"),
        // Answer: / **Answer:**
        format!(r"(?ims)^[ \t#*]*answer[ \t*]*:[ \t*]*(.+?){SECTION_END}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid answer section regex"))
    .collect()
});

/// Unique document IDs in order of first appearance (case-insensitive dedup).
pub fn extract_document_ids(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for m in DOC_ID_RE.find_iter(text) {
        let id = m.as_str();
        if seen.insert(id.to_lowercase()) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Pair each id with a nearby quoted span.
///
/// Returns `id: "quote"` entries joined by `"; "`. Ids with no quote but a
/// literal occurrence in the text are listed bare. When no id has a quote at
/// all the ids are comma-joined instead; an empty `ids` gives an empty string.
pub fn extract_citation(text: &str, ids: &[String]) -> String {
    if ids.is_empty() {
        return String::new();
    }

    let mut entries = Vec::new();
    let mut quoted = 0usize;

    for id in ids {
        if let Some(quote) = find_quote_for(text, id) {
            entries.push(format!("{id}: \"{}\"", truncate_quote(&quote)));
            quoted += 1;
        } else if text.contains(id.as_str()) {
            entries.push(id.clone());
        }
    }

    if quoted == 0 {
        return ids.join(", ");
    }
    entries.join("; ")
}

/// Locate the final answer via section headers, then line heuristics.
pub fn extract_final_answer(text: &str) -> String {
    for re in ANSWER_SECTION_RES.iter() {
        for caps in re.captures_iter(text) {
            let Some(span) = caps.get(1) else { continue };
            let normalized = normalize_whitespace(span.as_str());
            if normalized.chars().count() > MIN_SECTION_ANSWER {
                return normalized;
            }
        }
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(line) = lines.iter().rev().find(|l| is_answer_line(l)) {
        return (*line).to_string();
    }

    match lines.last() {
        Some(line) => (*line).to_string(),
        None => NO_ANSWER.to_string(),
    }
}

fn find_quote_for(text: &str, id: &str) -> Option<String> {
    let id = regex::escape(id);
    let strategies = [
        // id: "quote"
        format!(r#"(?i)\b{id}[*`]*\s*:?[*`]*\s*{QUOTE}"#),
        // "quote" ... id, same line and sentence
        format!(r#"(?i){QUOTE}[^"“”\n.!?]{{0,120}}?\b{id}(?:[^A-Za-z0-9_\-]|$)"#),
        // id ... "quote" before the next sentence boundary
        format!(r#"(?i)\b{id}(?:[^A-Za-z0-9_\-"“”\n.!?][^"“”\n.!?]*)?{QUOTE}"#),
    ];

    strategies.iter().find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        let caps = re.captures(text)?;
        let quote = caps.get(1)?.as_str().trim();
        (!quote.is_empty()).then(|| quote.to_string())
    })
}

fn truncate_quote(quote: &str) -> String {
    if quote.chars().count() > QUOTE_MAX {
        let kept: String = quote.chars().take(QUOTE_KEEP).collect();
        format!("{kept}...")
    } else {
        quote.to_string()
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_answer_line(line: &str) -> bool {
    line.chars().count() > MIN_LINE_ANSWER
        && !METADATA_PREFIXES.iter().any(|p| line.starts_with(p))
        && line.chars().any(char::is_alphanumeric)
}

// ── Tests ──────────────────────────────────────────────────────────────────
