//! Markdown stripping. Order matters: later passes assume fences, images and
//! links are already gone so their brackets don't get mistaken for emphasis
//! markers. Idempotent — running this twice on its own output is a no-op,
//! since nothing markdown-shaped survives the first pass.

use regex::Regex;

/// Strip fenced code, images, links, emphasis and inline code — every
/// markdown construct that isn't tied to a specific line. Safe to run on a
/// single line or a whole multi-line block.
pub fn strip_inline(input: &str) -> String {
    let mut s = input.to_string();
    s = Regex::new(r"(?s)```.*?```").unwrap().replace_all(&s, "").to_string();
    s = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"~~([^~]+)~~").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"\*\*([^*]+)\*\*").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"__([^_]+)__").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"\*([^*]+)\*").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"_([^_]+)_").unwrap().replace_all(&s, "$1").to_string();
    s = Regex::new(r"`([^`]+)`").unwrap().replace_all(&s, "$1").to_string();
    s
}

/// Strip a leading header/blockquote/bullet marker from a single line.
pub fn strip_line_prefix(line: &str) -> String {
    let header = Regex::new(r"^\s{0,3}#{1,6}\s+").unwrap();
    let blockquote = Regex::new(r"^\s{0,3}>\s?").unwrap();
    let bullet = Regex::new(r"^\s{0,3}(?:[-*+]|\d+\.)\s+").unwrap();
    let line = header.replace(line, "");
    let line = blockquote.replace(&line, "");
    bullet.replace(&line, "").into_owned()
}

/// Collapse any run of whitespace (including newlines) to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    Regex::new(r"\s+").unwrap().replace_all(s.trim(), " ").into_owned()
}

/// Full pipeline: inline stripping, then per-line prefix stripping, then
/// whitespace collapse — flattening the result to one line. Idempotent:
/// nothing markdown-shaped survives a first pass, so a second pass is a
/// no-op.
pub fn clean_markdown(input: &str) -> String {
    let inline_stripped = strip_inline(input);
    let per_line = inline_stripped.lines().map(strip_line_prefix).collect::<Vec<_>>().join(" ");
    collapse_whitespace(&per_line)
}
