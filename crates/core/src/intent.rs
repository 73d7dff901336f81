//! Command resolution: one normalized line in, exactly one [`Intent`] out.
//!
//! Rules are tried in a fixed priority order and the first match wins:
//! list-all, edit, save, query, delete. Anything else is `Unrecognized`.
//! Resolution never fails, so one bad line cannot abort a batch.

use crate::text::{is_dash_variant, take_chars, to_plain_spaces};

pub const PAGE_SIZE: u32 = 50;
pub const QUERY_LIMIT: u32 = 50;
pub const UNRECOGNIZED_SAMPLE_CHARS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    ListAll { page: u32 },
    Save { key: String, value: String },
    Edit { key: String, value: String },
    /// Line started with `?+` but did not follow the edit grammar.
    EditHelp { key: String },
    Query { text: String },
    Delete { key: String },
    Unrecognized { sample: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentKind {
    ListAll,
    Save,
    Edit,
    EditHelp,
    Query,
    Delete,
    Unrecognized,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListAll => "list",
            Self::Save => "save",
            Self::Edit => "edit",
            Self::EditHelp => "edit_help",
            Self::Query => "query",
            Self::Delete => "delete",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::ListAll { .. } => IntentKind::ListAll,
            Self::Save { .. } => IntentKind::Save,
            Self::Edit { .. } => IntentKind::Edit,
            Self::EditHelp { .. } => IntentKind::EditHelp,
            Self::Query { .. } => IntentKind::Query,
            Self::Delete { .. } => IntentKind::Delete,
            Self::Unrecognized { .. } => IntentKind::Unrecognized,
        }
    }
}

/// One grammar rule. Implementations receive a line that has already been
/// through `to_plain_spaces`.
pub trait LineMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_match(&self, line: &str) -> Option<Intent>;
}

pub struct ListAllMatcher;
pub struct EditMatcher;
pub struct SaveMatcher;
pub struct QueryMatcher;
pub struct DeleteMatcher;

static DEFAULT_MATCHERS: &[&dyn LineMatcher] =
    &[&ListAllMatcher, &EditMatcher, &SaveMatcher, &QueryMatcher, &DeleteMatcher];

/// Resolves a line with the default rule order.
pub fn resolve(line: &str) -> Intent {
    let line = to_plain_spaces(line);
    let matched = DEFAULT_MATCHERS.iter().find_map(|matcher| matcher.try_match(&line));
    matched_or_unrecognized(matched, &line)
}

pub struct CommandResolver {
    matchers: Vec<Box<dyn LineMatcher>>,
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ListAllMatcher),
            Box::new(EditMatcher),
            Box::new(SaveMatcher),
            Box::new(QueryMatcher),
            Box::new(DeleteMatcher),
        ])
    }
}

impl CommandResolver {
    pub fn new(matchers: Vec<Box<dyn LineMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn resolve(&self, line: &str) -> Intent {
        let line = to_plain_spaces(line);
        let matched = self.matchers.iter().find_map(|matcher| matcher.try_match(&line));
        matched_or_unrecognized(matched, &line)
    }

    pub fn rule_order(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|matcher| matcher.name()).collect()
    }
}

fn matched_or_unrecognized(matched: Option<Intent>, line: &str) -> Intent {
    matched.unwrap_or_else(|| Intent::Unrecognized {
        sample: take_chars(line, UNRECOGNIZED_SAMPLE_CHARS),
    })
}

impl LineMatcher for ListAllMatcher {
    fn name(&self) -> &'static str {
        "list_all"
    }

    fn try_match(&self, line: &str) -> Option<Intent> {
        let rest = line.strip_prefix("?*")?.trim_start();
        if rest.is_empty() {
            return Some(Intent::ListAll { page: 1 });
        }
        if !rest.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }

        // digits only, so a parse failure can only be overflow
        let page = rest.parse::<u32>().unwrap_or(u32::MAX);
        Some(Intent::ListAll { page: page.max(1) })
    }
}

impl LineMatcher for EditMatcher {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn try_match(&self, line: &str) -> Option<Intent> {
        let body = line.strip_prefix("?+")?.trim_start();

        let parsed = split_quoted_key(body).or_else(|| {
            split_at_separator(body).map(|(key, value)| (strip_outer_quotes(key), value))
        });

        let Some((raw_key, raw_value)) = parsed else {
            let attempted =
                body.trim_end_matches(|ch: char| ch.is_whitespace() || is_dash_variant(ch));
            return Some(Intent::EditHelp { key: to_plain_spaces(strip_outer_quotes(attempted)) });
        };

        let key = to_plain_spaces(raw_key);
        if key.is_empty() {
            return Some(Intent::EditHelp { key });
        }
        Some(Intent::Edit { key, value: to_plain_spaces(raw_value) })
    }
}

impl LineMatcher for SaveMatcher {
    fn name(&self) -> &'static str {
        "save"
    }

    fn try_match(&self, line: &str) -> Option<Intent> {
        parse_save(line).map(|(key, value)| Intent::Save { key, value })
    }
}

impl LineMatcher for QueryMatcher {
    fn name(&self) -> &'static str {
        "query"
    }

    fn try_match(&self, line: &str) -> Option<Intent> {
        let text = to_plain_spaces(line.strip_prefix('?')?);
        (!text.is_empty()).then_some(Intent::Query { text })
    }
}

impl LineMatcher for DeleteMatcher {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn try_match(&self, line: &str) -> Option<Intent> {
        let key = to_plain_spaces(line.strip_prefix('-')?);
        (!key.is_empty()).then_some(Intent::Delete { key })
    }
}

/// `#key <dash> value` with both fields normalized. A `#` line without a dash
/// separator is not a save.
pub fn parse_save(line: &str) -> Option<(String, String)> {
    let body = line.strip_prefix('#')?.trim_start();
    let (key, value) = split_at_separator(body)?;
    let key = to_plain_spaces(key);
    let value = to_plain_spaces(value);
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Splits at the first dash variant that leaves a non-empty key before it and
/// a non-empty value after it. The key is the shortest such span.
fn split_at_separator(body: &str) -> Option<(&str, &str)> {
    body.char_indices().skip(1).filter(|(_, ch)| is_dash_variant(*ch)).find_map(|(index, ch)| {
        let value = body[index + ch.len_utf8()..].trim();
        if value.is_empty() {
            return None;
        }
        Some((body[..index].trim_end(), value))
    })
}

/// `"key with - dashes" <dash> value`
fn split_quoted_key(body: &str) -> Option<(&str, &str)> {
    let inner = body.strip_prefix('"')?;
    let close = inner.find('"')?;
    if close == 0 {
        return None;
    }

    let key = &inner[..close];
    let tail = inner[close + 1..].trim_start();
    let dash = tail.chars().next().filter(|ch| is_dash_variant(*ch))?;
    let value = tail[dash.len_utf8()..].trim();
    if value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn strip_outer_quotes(raw: &str) -> &str {
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

/// Free text that asks to wipe every record ("borrar todo", "borra todos").
pub fn is_wipe_request(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().map(trim_word_punctuation).collect();
    words.windows(2).any(|pair| {
        matches!((pair[0], pair[1]), ("borra" | "borrar", "todo" | "todos"))
    })
}

/// Whether free text starts like one of the command grammars (or a slash
/// command). Used to keep commands out of the free-form feedback window.
pub fn looks_like_command(text: &str) -> bool {
    matches!(text.trim_start().chars().next(), Some('#' | '?' | '-' | '/'))
}

/// `/name` style bot commands are routed elsewhere and skipped by the line
/// processor.
pub fn is_slash_command(text: &str) -> bool {
    let mut chars = text.trim_start().chars();
    chars.next() == Some('/') && chars.next().is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
}

fn trim_word_punctuation(word: &str) -> &str {
    word.trim_matches(|ch: char| !ch.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::{
        is_slash_command, is_wipe_request, looks_like_command, parse_save, resolve,
        CommandResolver, Intent, IntentKind, LineMatcher,
    };

    fn save(key: &str, value: &str) -> Intent {
        Intent::Save { key: key.to_owned(), value: value.to_owned() }
    }

    #[test]
    fn dash_variants_parse_to_identical_saves() {
        assert_eq!(resolve("#a - b"), save("a", "b"));
        assert_eq!(resolve("#a – b"), save("a", "b"));
        assert_eq!(resolve("#a — b"), save("a", "b"));
        assert_eq!(resolve("#a-b"), save("a", "b"));
    }

    #[test]
    fn save_key_is_the_shortest_span_before_a_dash() {
        assert_eq!(resolve("#wifi casa - Pepe-123 / x"), save("wifi casa", "Pepe-123 / x"));
        assert_eq!(resolve("#  tel   mamá  —  612 345 679"), save("tel mamá", "612 345 679"));
    }

    #[test]
    fn save_without_separator_is_unrecognized() {
        assert_eq!(resolve("#onlykey"), Intent::Unrecognized { sample: "#onlykey".to_owned() });
        assert_eq!(resolve("#key -").kind(), IntentKind::Unrecognized);
        assert_eq!(resolve("# - value").kind(), IntentKind::Unrecognized);
        assert_eq!(parse_save("#onlykey"), None);
    }

    #[test]
    fn list_all_accepts_optional_page() {
        assert_eq!(resolve("?*"), Intent::ListAll { page: 1 });
        assert_eq!(resolve("?* 3"), Intent::ListAll { page: 3 });
        assert_eq!(resolve("?*2"), Intent::ListAll { page: 2 });
        assert_eq!(resolve("?* 0"), Intent::ListAll { page: 1 });
        assert_eq!(resolve("?* 99999999999999"), Intent::ListAll { page: u32::MAX });
    }

    #[test]
    fn list_all_with_non_numeric_tail_is_a_query() {
        assert_eq!(resolve("?* abc"), Intent::Query { text: "* abc".to_owned() });
    }

    #[test]
    fn edit_parses_unquoted_and_quoted_keys() {
        assert_eq!(
            resolve("?+wifi casa - nueva clave"),
            Intent::Edit { key: "wifi casa".to_owned(), value: "nueva clave".to_owned() }
        );
        assert_eq!(
            resolve("?+\"cumple-john\" — 11/12"),
            Intent::Edit { key: "cumple-john".to_owned(), value: "11/12".to_owned() }
        );
        assert_eq!(
            resolve("?+ \"cumple john\" - 11/12"),
            Intent::Edit { key: "cumple john".to_owned(), value: "11/12".to_owned() }
        );
    }

    #[test]
    fn edit_with_unterminated_quote_falls_back_to_unquoted_key() {
        assert_eq!(
            resolve("?+\"cumple john - 11/12"),
            Intent::Edit { key: "cumple john".to_owned(), value: "11/12".to_owned() }
        );
    }

    #[test]
    fn malformed_edit_resolves_to_edit_help_with_candidate_key() {
        assert_eq!(resolve("?+wifi"), Intent::EditHelp { key: "wifi".to_owned() });
        assert_eq!(resolve("?+\"wifi casa\""), Intent::EditHelp { key: "wifi casa".to_owned() });
        assert_eq!(resolve("?+"), Intent::EditHelp { key: String::new() });
        assert_eq!(resolve("?+wifi -"), Intent::EditHelp { key: "wifi".to_owned() });
        assert_eq!(resolve("?+wifi casa — "), Intent::EditHelp { key: "wifi casa".to_owned() });
        assert_eq!(resolve("?+-"), Intent::EditHelp { key: String::new() });
    }

    #[test]
    fn query_takes_the_rest_of_the_line() {
        assert_eq!(resolve("?wifi"), Intent::Query { text: "wifi".to_owned() });
        assert_eq!(resolve("?  tel   mamá"), Intent::Query { text: "tel mamá".to_owned() });
        assert_eq!(resolve("?").kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn delete_takes_the_rest_of_the_line() {
        assert_eq!(resolve("-wifi casa"), Intent::Delete { key: "wifi casa".to_owned() });
        assert_eq!(resolve("- wifi"), Intent::Delete { key: "wifi".to_owned() });
        assert_eq!(resolve("-").kind(), IntentKind::Unrecognized);
    }

    #[test]
    fn unrecognized_sample_is_bounded() {
        let line = "x".repeat(250);
        let Intent::Unrecognized { sample } = resolve(&line) else {
            panic!("expected unrecognized");
        };
        assert_eq!(sample.chars().count(), 100);
    }

    #[test]
    fn resolver_normalizes_unicode_spacing_first() {
        assert_eq!(resolve("\u{00A0}#a\u{3000}-\u{2003}b "), save("a", "b"));
    }

    #[test]
    fn custom_rule_order_is_respected() {
        struct EverythingIsAQuery;

        impl LineMatcher for EverythingIsAQuery {
            fn name(&self) -> &'static str {
                "catch_all"
            }

            fn try_match(&self, line: &str) -> Option<Intent> {
                Some(Intent::Query { text: line.to_owned() })
            }
        }

        let resolver = CommandResolver::new(vec![Box::new(EverythingIsAQuery)]);
        assert_eq!(resolver.resolve("#a - b"), Intent::Query { text: "#a - b".to_owned() });
        assert_eq!(resolver.rule_order(), vec!["catch_all"]);
        assert_eq!(
            CommandResolver::default().rule_order(),
            vec!["list_all", "edit", "save", "query", "delete"]
        );
    }

    #[test]
    fn wipe_phrases_are_detected() {
        assert!(is_wipe_request("Borrar todo"));
        assert!(is_wipe_request("por favor borra todos mis datos"));
        assert!(!is_wipe_request("delete all, please"));
        assert!(!is_wipe_request("#todo - borrar"));
        assert!(!is_wipe_request("borrador todo"));
    }

    #[test]
    fn command_shapes_are_detected() {
        assert!(looks_like_command("#a - b"));
        assert!(looks_like_command("?+a"));
        assert!(looks_like_command("-a"));
        assert!(!looks_like_command("me encanta"));
        assert!(is_slash_command("/stats"));
        assert!(!is_slash_command("/ nope"));
        assert!(!is_slash_command("?x"));
    }
}
