//! Markdown optimisation: deterministic cleanup of a raw block rendering.
//!
//! Six rules run in a fixed order. Each rule is a pure `&str → String`
//! function; a rule is listed in [`OptimizationResult::applied_rules`] only
//! when its output differs from its input.
//!
//! | # | Rule                         | Touches fenced code? |
//! |---|------------------------------|----------------------|
//! | 1 | `collapse_blank_lines`       | no                   |
//! | 2 | `normalize_headings`         | no                   |
//! | 3 | `collapse_table_separators`  | no                   |
//! | 4 | `trim_trailing_whitespace`   | yes                  |
//! | 5 | `trim_document`              | yes                  |
//! | 6 | `normalize_list_markers`     | no                   |
//!
//! Line endings are normalised to `\n` before anything is measured; sizes
//! are counted in Unicode scalar values.
//!
//! The module also provides the two optional decorations applied after
//! optimisation: [`table_of_contents`] and [`metadata_header`].

use crate::output::{char_len, OptimizationResult, RuleName};
use once_cell::sync::Lazy;
use regex::Regex;

type Rule = fn(&str) -> String;

const RULES: [(RuleName, Rule); 6] = [
    (RuleName::CollapseBlankLines, collapse_blank_lines),
    (RuleName::NormalizeHeadings, normalize_headings),
    (RuleName::CollapseTableSeparators, collapse_table_separators),
    (RuleName::TrimTrailingWhitespace, trim_trailing_whitespace),
    (RuleName::TrimDocument, trim_document),
    (RuleName::NormalizeListMarkers, normalize_list_markers),
];

/// Optimise a raw Markdown rendering.
///
/// Pure and deterministic: the same input always yields the same result, and
/// optimising an already-optimised document changes nothing.
///
/// ```rust
/// use doc2md::pipeline::optimize;
///
/// let r = optimize("# Title\n\n\n\nBody text.  \n");
/// assert_eq!(r.optimized_markdown, "# Title\n\nBody text.\n");
/// assert_eq!((r.size_before, r.size_after), (24, 20));
/// ```
pub fn optimize(raw: &str) -> OptimizationResult {
    let mut text = normalise_line_endings(raw);
    let size_before = char_len(&text);
    let mut applied_rules = Vec::new();

    for (name, rule) in RULES {
        let next = rule(&text);
        if next != text {
            applied_rules.push(name);
            text = next;
        }
    }

    OptimizationResult {
        size_after: char_len(&text),
        optimized_markdown: text,
        applied_rules,
        size_before,
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Line helpers ─────────────────────────────────────────────────────────────

/// Split into lines, remembering whether the text ended with a newline so
/// the final terminator is not mistaken for a blank line.
fn split_lines(input: &str) -> (Vec<&str>, bool) {
    match input.strip_suffix('\n') {
        Some(body) => (body.split('\n').collect(), true),
        None => (input.split('\n').collect(), false),
    }
}

fn join_lines<S: AsRef<str>>(lines: &[S], trailing_newline: bool) -> String {
    let mut out = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<&str>>()
        .join("\n");
    if trailing_newline {
        out.push('\n');
    }
    out
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Marks every line that belongs to a fenced code block, fences included.
/// A fence opens with 3+ backticks or tildes and closes with a run of the
/// same character at least as long, followed by nothing but whitespace.
/// An unclosed fence runs to the end of the document.
fn fenced_mask(lines: &[&str]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut open: Option<(char, usize)> = None;

    for line in lines {
        let trimmed = line.trim_start();
        let fence = fence_run(trimmed);
        match (open, fence) {
            (None, Some(f)) => {
                open = Some(f);
                mask.push(true);
            }
            (Some((ch, len)), Some((c, n)))
                if c == ch && n >= len && trimmed[n * c.len_utf8()..].trim().is_empty() =>
            {
                open = None;
                mask.push(true);
            }
            (Some(_), _) => mask.push(true),
            (None, None) => mask.push(false),
        }
    }
    mask
}

fn fence_run(trimmed: &str) -> Option<(char, usize)> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let n = trimmed.chars().take_while(|&c| c == first).count();
    (n >= 3).then_some((first, n))
}

/// Rewrite each line outside fenced code with `f`.
fn map_unfenced(input: &str, f: impl Fn(&str) -> String) -> String {
    let (lines, trailing) = split_lines(input);
    let mask = fenced_mask(&lines);
    let out: Vec<String> = lines
        .iter()
        .zip(&mask)
        .map(|(line, &fenced)| if fenced { line.to_string() } else { f(line) })
        .collect();
    join_lines(&out, trailing)
}

// ── Rule 1: Collapse runs of blank lines ─────────────────────────────────────

fn collapse_blank_lines(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let (lines, trailing) = split_lines(input);
    let mask = fenced_mask(&lines);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        if mask[i] || !is_blank(lines[i]) {
            out.push(lines[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && !mask[i] && is_blank(lines[i]) {
            i += 1;
        }
        if i - start >= 2 {
            out.push("");
        } else {
            out.push(lines[start]);
        }
    }
    join_lines(&out, trailing)
}

// ── Rule 2: Normalise ATX headings ───────────────────────────────────────────

fn normalize_headings(input: &str) -> String {
    map_unfenced(input, |line| {
        normalize_heading_line(line).unwrap_or_else(|| line.to_string())
    })
}

/// `Some(rewritten)` when `line` is an ATX heading (1-6 `#` at column 0).
fn normalize_heading_line(line: &str) -> Option<String> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let marker = &line[..hashes];
    let mut content = line[hashes..].trim();

    // Closing sequence: a run of `#` that is the whole content or follows whitespace.
    loop {
        let without = content.trim_end_matches('#');
        if without.len() == content.len() {
            break;
        }
        if without.is_empty() {
            content = without;
            break;
        }
        if without.ends_with(char::is_whitespace) {
            content = without.trim_end();
        } else {
            break;
        }
    }

    let content = collapse_trailing_punctuation(content);
    if content.is_empty() {
        Some(marker.to_string())
    } else {
        Some(format!("{marker} {content}"))
    }
}

/// `Title::` → `Title:` (same for `;` and `,`).
fn collapse_trailing_punctuation(content: &str) -> String {
    let Some(last) = content.chars().last() else {
        return String::new();
    };
    if !matches!(last, ':' | ';' | ',') {
        return content.to_string();
    }
    let stem = content.trim_end_matches(last);
    format!("{stem}{last}")
}

// ── Rule 3: Keep one separator row per table ─────────────────────────────────

fn collapse_table_separators(input: &str) -> String {
    let (lines, trailing) = split_lines(input);
    let mask = fenced_mask(&lines);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut seen_separator = false;

    for (line, &fenced) in lines.iter().zip(&mask) {
        if fenced || !is_table_row(line) {
            seen_separator = false;
            out.push(*line);
            continue;
        }
        if is_separator_row(line) {
            if seen_separator {
                continue;
            }
            seen_separator = true;
        }
        out.push(*line);
    }
    join_lines(&out, trailing)
}

pub(crate) fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

pub(crate) fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    let (lines, trailing) = split_lines(input);
    let out: Vec<&str> = lines.iter().map(|l| l.trim_end()).collect();
    join_lines(&out, trailing)
}

// ── Rule 5: Trim the document ────────────────────────────────────────────────

fn trim_document(input: &str) -> String {
    let (lines, _) = split_lines(input);
    let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
        return String::new();
    };
    let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);
    join_lines(&lines[first..=last], true)
}

// ── Rule 6: Normalise bullet markers ─────────────────────────────────────────

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)[*+•](\s+\S.*)$").expect("valid bullet regex"));

static RE_THEMATIC_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:\*\s*){3,}|(?:-\s*){3,}|(?:_\s*){3,})$").expect("valid break regex")
});

fn normalize_list_markers(input: &str) -> String {
    map_unfenced(input, |line| {
        if RE_THEMATIC_BREAK.is_match(line) {
            return line.to_string();
        }
        RE_BULLET.replace(line, "$1-$2").into_owned()
    })
}

// ── Decorations ──────────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"));

static RE_ANCHOR_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid anchor regex"));

/// Headings outside fenced code, as `(level, title)`.
pub fn headings(markdown: &str) -> Vec<(usize, String)> {
    let (lines, _) = split_lines(markdown);
    let mask = fenced_mask(&lines);
    lines
        .iter()
        .zip(&mask)
        .filter(|(_, fenced)| !**fenced)
        .filter_map(|(line, _)| {
            RE_HEADING
                .captures(line)
                .map(|c| (c[1].len(), c[2].trim().to_string()))
        })
        .collect()
}

/// GitHub-style anchor: punctuation dropped, spaces to `-`, lowercased.
pub fn anchor(title: &str) -> String {
    RE_ANCHOR_STRIP
        .replace_all(title, "")
        .trim()
        .replace(' ', "-")
        .to_lowercase()
}

/// Build a nested table of contents for the headings in `markdown`.
/// Returns `None` when there are no headings.
pub fn table_of_contents(markdown: &str) -> Option<String> {
    let found = headings(markdown);
    if found.is_empty() {
        return None;
    }
    let mut toc = String::from("## Table of Contents\n\n");
    for (level, title) in found {
        let indent = "  ".repeat(level - 1);
        toc.push_str(&format!("{indent}- [{title}](#{})\n", anchor(&title)));
    }
    Some(toc)
}

/// Prepend a table of contents; `None` when the document has no headings.
pub fn prepend_table_of_contents(markdown: &str) -> Option<String> {
    table_of_contents(markdown).map(|toc| format!("{toc}\n{markdown}"))
}

/// YAML front matter describing the document. No timestamp is written so
/// that identical inputs keep producing identical Markdown.
pub fn metadata_header(title: &str, pages: usize, tables: usize) -> String {
    let title = title.replace('"', "'");
    format!("---\ntitle: \"{title}\"\npages: {pages}\ntables: {tables}\n---\n\n")
}

/// Title for the front matter: the first H1, else `fallback`.
pub fn document_title(markdown: &str, fallback: &str) -> String {
    headings(markdown)
        .into_iter()
        .find(|(level, _)| *level == 1)
        .map(|(_, title)| title)
        .unwrap_or_else(|| fallback.to_string())
}
