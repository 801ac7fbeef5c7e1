//! Codepoint-based sentence boundary detection and truncation. Everything
//! here indexes into a `Vec<char>`, never raw bytes, so a multibyte
//! codepoint is never split.

/// Index (exclusive) just past the next sentence-ending punctuation at or
/// after `from`, or `None` if the text has no further boundary. A `.` is
/// not a boundary when it's adjacent to a digit or immediately followed by
/// a letter — that's an abbreviation, version number, or IP octet, not the
/// end of a sentence.
fn next_boundary(chars: &[char], from: usize) -> Option<usize> {
    let n = chars.len();
    let mut i = from;
    while i < n {
        let c = chars[i];
        if c == '.' || c == '!' || c == '?' {
            if c == '.' {
                let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
                let next_digit = i + 1 < n && chars[i + 1].is_ascii_digit();
                let next_letter = i + 1 < n && chars[i + 1].is_alphabetic();
                if prev_digit || next_digit || next_letter {
                    i += 1;
                    continue;
                }
            }
            if i + 1 >= n || chars[i + 1].is_whitespace() {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

fn all_boundaries(chars: &[char]) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut from = 0;
    while let Some(end) = next_boundary(chars, from) {
        ends.push(end);
        from = end;
    }
    ends
}

/// Every sentence in `text`, split on the same boundary rule used by
/// [`first_sentence`]. A trailing fragment with no terminal punctuation is
/// included as a final "sentence" so callers can still scan it.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;
    for end in all_boundaries(&chars) {
        let s: String = chars[start..end].iter().collect();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
        start = end;
    }
    if start < chars.len() {
        let rest: String = chars[start..].iter().collect();
        let trimmed = rest.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// The first sentence of `text`. Pulls in the second sentence too when the
/// first is under 20 codepoints and the whole text is under 200 — a lone
/// "Ok." shouldn't stand alone when more context is one sentence away.
pub fn first_sentence(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    match next_boundary(&chars, 0) {
        None => text.trim().to_string(),
        Some(end) => {
            if end < 20 && n < 200 {
                if let Some(second_end) = next_boundary(&chars, end) {
                    return chars[0..second_end].iter().collect::<String>().trim().to_string();
                }
            }
            chars[0..end].iter().collect::<String>().trim().to_string()
        }
    }
}

fn last_space_in_range(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi || chars.is_empty() {
        return None;
    }
    let hi = hi.min(chars.len() - 1);
    (lo..=hi).rev().find(|&i| chars[i].is_whitespace())
}

/// Truncate `text` to at most `limit` codepoints, preferring to cut on a
/// sentence boundary, then a word boundary (with `"..."` appended), and
/// only hard-cutting as a last resort. Codepoint-safe throughout.
pub fn truncate(text: &str, limit: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return text.to_string();
    }

    let lo1 = limit / 3;
    if let Some(end) = all_boundaries(&chars).into_iter().filter(|&e| e >= lo1 && e <= limit).max() {
        let s: String = chars[0..end].iter().collect();
        return s.trim_end().to_string();
    }

    let lo2 = limit / 2;
    let hi2 = limit.saturating_sub(3);
    if hi2 > lo2 {
        if let Some(end) = last_space_in_range(&chars, lo2, hi2) {
            let mut s: String = chars[0..end].iter().collect::<String>().trim_end().to_string();
            s.push_str("...");
            return s;
        }
    }

    let cut = limit.saturating_sub(3).min(chars.len());
    let mut s: String = chars[0..cut].iter().collect::<String>().trim_end().to_string();
    s.push_str("...");
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_period_exclamation_question() {
        assert_eq!(first_sentence("Hello there. How are you?"), "Hello there.");
        assert_eq!(first_sentence("Stop! Don't do that."), "Stop!");
    }

    #[test]
    fn guards_version_numbers_and_ips_and_abbreviations() {
        assert_eq!(first_sentence("Upgraded to v1.6.0 today. It works."), "Upgraded to v1.6.0 today.");
        assert_eq!(first_sentence("Bound to 192.168.1.1 now. Ready."), "Bound to 192.168.1.1 now.");
        assert_eq!(first_sentence("Uses helpers, e.g. clamp and lerp. Done."), "Uses helpers, e.g. clamp and lerp.");
    }

    #[test]
    fn includes_second_sentence_when_first_is_short() {
        // "Ok." is 3 codepoints (< 20) and total text is well under 200.
        assert_eq!(first_sentence("Ok. The build finished cleanly."), "Ok. The build finished cleanly.");
    }

    #[test]
    fn does_not_include_second_sentence_when_total_is_long() {
        let long_tail = "x".repeat(250);
        let text = format!("Ok. {long_tail}");
        assert_eq!(first_sentence(&text), "Ok.");
    }

    #[test]
    fn no_terminal_punctuation_returns_whole_text() {
        assert_eq!(first_sentence("no terminator here"), "no terminator here");
    }

    #[test]
    fn split_sentences_finds_keyword_sentence() {
        let sentences = split_sentences("Looked at three files. Found a bug in the review step. All good.");
        assert!(sentences.iter().any(|s| s.contains("review")));
    }

    #[test]
    fn truncate_under_limit_is_unchanged() {
        assert_eq!(truncate("short text", 150), "short text");
    }

    #[test]
    fn truncate_prefers_sentence_boundary() {
        let text = format!("{}. more filler text added here to exceed the limit easily", "A".repeat(20));
        let out = truncate(&text, 50);
        assert!(out.ends_with('.'));
        assert!(!out.ends_with("..."));
        assert!(out.chars().count() <= 50);
    }

    #[test]
    fn truncate_falls_back_to_word_boundary_with_ellipsis() {
        let text = "word ".repeat(40);
        let out = truncate(text.trim(), 30);
        assert!(out.ends_with("..."));
        assert!(out.chars().count() <= 30);
    }

    #[test]
    fn truncate_never_splits_a_codepoint() {
        let text = "caf\u{e9} ".repeat(30);
        let out = truncate(text.trim(), 20);
        assert!(String::from_utf8(out.as_bytes().to_vec()).is_ok());
        assert!(out.chars().count() <= 20);
    }
}
