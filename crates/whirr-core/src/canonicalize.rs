//! Text canonicalization pipeline.
//!
//! Both queries and documents pass through here before they reach an
//! embedder or the lexical tokenizer, so the two scorers always see the same
//! text. The document pipeline is: NFC normalization, markdown strip, code
//! block collapse, low-signal line filtering, whitespace collapse, length
//! cap. The full pipeline is idempotent: `canonicalize(canonicalize(s)) ==
//! canonicalize(s)`.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

const MAX_DOC_CHARS: usize = 2000;
const MAX_QUERY_CHARS: usize = 500;
const MAX_IMPORT_RUN: usize = 2;

/// Sentinel token that replaces a collapsed code block.
pub const CODE_SENTINEL: &str = "\u{27ea}code\u{27eb}";

// Markdown link: [text](url) -> text
static MD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("link pattern"));
// Strikethrough, bold, italic markers (content kept)
static MD_STRIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^~]+)~~").expect("strike pattern"));
static MD_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*{1,3}([^*]+)\*{1,3}").expect("star pattern"));
static MD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{1,3}([^_]+)_{1,3}").expect("underscore pattern"));
// ATX heading prefix
static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("heading pattern"));
// Setext heading underline (also swallows horizontal rules)
static MD_SETEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[=-]{2,}\s*$").expect("setext pattern"));
// Fenced code blocks
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n.*?```").expect("fence pattern"));
// Pure URL lines
static URL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*https?://\S+\s*$").expect("url pattern"));
// Import-like declaration lines across common languages
static IMPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(import\s|from\s+\S+\s+import\s|use\s+\S|#include\s|require\(|const\s.+=\s*require\()")
        .expect("import pattern")
});

/// Full canonicalization pipeline for document text.
pub fn canonicalize(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    let stripped = strip_markdown(&nfc);
    let collapsed = collapse_code_blocks(&stripped);
    let filtered = filter_low_signal(&collapsed);
    truncate_chars(&collapse_whitespace(&filtered), MAX_DOC_CHARS)
}

/// Lightweight canonicalization for query text.
///
/// Queries skip the markdown and code handling; they only get NFC, trimming,
/// whitespace collapse, and the length cap.
pub fn canonicalize_query(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    truncate_chars(&collapse_whitespace(&nfc), MAX_QUERY_CHARS)
}

/// Removes markdown structure while keeping inner text.
///
/// Applied to a fixpoint: stripping one layer of a nested construct (for
/// example a link whose text is itself a link) can expose another, and
/// idempotence of the whole pipeline requires none survive.
fn strip_markdown(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = MD_LINK.replace_all(&current, "$1").into_owned();
        next = MD_STRIKE.replace_all(&next, "$1").into_owned();
        next = MD_STAR.replace_all(&next, "$1").into_owned();
        next = MD_UNDERSCORE.replace_all(&next, "$1").into_owned();
        next = MD_HEADING.replace_all(&next, "").into_owned();
        next = MD_SETEXT.replace_all(&next, "").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Replaces each fenced or indented code block with [`CODE_SENTINEL`].
fn collapse_code_blocks(text: &str) -> String {
    let fenced = CODE_FENCE.replace_all(text, CODE_SENTINEL);

    // Indented blocks: contiguous runs of 4-space or tab indented lines.
    let mut out: Vec<&str> = Vec::new();
    let mut in_block = false;
    for line in fenced.lines() {
        let indented = !line.trim().is_empty() && (line.starts_with("    ") || line.starts_with('\t'));
        if indented {
            if !in_block {
                out.push(CODE_SENTINEL);
                in_block = true;
            }
        } else {
            in_block = false;
            out.push(line);
        }
    }
    out.join("\n")
}

/// Drops URL-only lines and contiguous runs of more than
/// [`MAX_IMPORT_RUN`] import-like lines.
fn filter_low_signal(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    for line in text.lines() {
        if URL_LINE.is_match(line) {
            continue;
        }
        if IMPORT_LINE.is_match(line) {
            run.push(line);
            continue;
        }
        flush_import_run(&mut kept, &mut run);
        kept.push(line);
    }
    flush_import_run(&mut kept, &mut run);
    kept.join("\n")
}

fn flush_import_run<'a>(kept: &mut Vec<&'a str>, run: &mut Vec<&'a str>) {
    if run.len() <= MAX_IMPORT_RUN {
        kept.append(run);
    } else {
        run.clear();
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
