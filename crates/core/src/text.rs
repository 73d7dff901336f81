//! Whitespace and key normalization.
//!
//! `to_plain_spaces` is applied to every inbound line and every extracted
//! field. `normalize_key` derives the identity of a record: two raw keys refer
//! to the same record iff their normalized forms are equal.

use unicode_normalization::UnicodeNormalization;

/// Folds exotic spacing (no-break, wide, zero-width) into plain spaces,
/// collapses whitespace runs to a single space and trims both ends.
pub fn to_plain_spaces(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut pending_space = false;

    for ch in input.chars() {
        if is_spacing(ch) {
            pending_space = !output.is_empty();
            continue;
        }
        if pending_space {
            output.push(' ');
            pending_space = false;
        }
        output.push(ch);
    }

    output
}

/// Lowercase, strip accents (NFD minus combining diacritics) and collapse
/// whitespace.
pub fn normalize_key(input: &str) -> String {
    let stripped: String =
        input.to_lowercase().nfd().filter(|ch| !is_combining_diacritic(*ch)).collect();
    to_plain_spaces(&stripped)
}

pub fn is_dash_variant(ch: char) -> bool {
    matches!(ch, '-' | '\u{2013}' | '\u{2014}')
}

fn is_spacing(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(ch, '\u{00A0}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}')
}

fn is_combining_diacritic(ch: char) -> bool {
    matches!(ch, '\u{0300}'..='\u{036F}')
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            other => output.push(other),
        }
    }
    output
}

/// Inverse of the bot's own markup: drops tags and decodes the entities
/// `escape_html` produces. Used when Telegram refuses an HTML message.
pub fn strip_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            other => output.push(other),
        }
    }
    output.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"").replace("&amp;", "&")
}

/// First `max_chars` characters of `input`, never splitting a code point.
pub fn take_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}
