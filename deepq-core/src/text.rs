//! Text cleanup for model output and prompt budgets

use regex::Regex;
use std::sync::LazyLock;

static THINK_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-span regex"));

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>").expect("valid tag regex"));

const DOUBLE_QUOTES: &[char] = &['"', '`', '\u{201C}', '\u{201D}'];
const SINGLE_QUOTES: &[char] = &['\'', '\u{2018}', '\u{2019}'];

/// Remove `<think>...</think>` spans and any remaining tags, keeping line breaks
pub fn strip_markup(text: &str) -> String {
    let without_thinking = THINK_SPAN.replace_all(text, "");
    MARKUP_TAG.replace_all(&without_thinking, "").into_owned()
}

/// Collapse every whitespace run to a single space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a query before it is sent to a search provider
pub fn clean_query(query: &str) -> String {
    normalize_whitespace(&strip_markup(query))
}

/// Drop every double quote, and every single quote that is not an
/// apostrophe between two word characters
fn strip_quotes(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let is_word = |c: Option<&char>| c.is_some_and(|c| c.is_alphanumeric() || *c == '_');

    chars
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            if DOUBLE_QUOTES.contains(c) {
                return false;
            }
            if SINGLE_QUOTES.contains(c) {
                let prev = i.checked_sub(1).and_then(|p| chars.get(p));
                return is_word(prev) && is_word(chars.get(i + 1));
            }
            true
        })
        .map(|(_, c)| *c)
        .collect()
}

/// Pull the search query out of a chain-of-thought completion: the last
/// non-empty line, with quotes removed.
pub fn extract_query(raw: &str) -> String {
    let text = if raw.contains("<think>") {
        strip_markup(raw)
    } else {
        raw.to_string()
    };

    let last_line = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("");

    normalize_whitespace(&strip_quotes(last_line))
}

/// Truncate to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Like [`truncate_chars`] but marks the cut with `...`
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
