//! Shell quoting and make variable substitution
//!
//! Paths and free text end up inside recipe lines that make hands to
//! `/bin/sh`, so anything that is not obviously inert gets quoted.

use crate::makefile::Variable;
use regex::Regex;
use std::sync::LazyLock;

/// Characters that never need quoting. A tilde is only inert when not leading.
static INERT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+~0-9A-Za-z_/.%@,:{}=]+$").expect("valid inert pattern"));

/// `name=value` where the value is non-empty and starts with a non-space
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([0-9A-Za-z_]+=)(\S.*)$").expect("valid assignment pattern")
});

const SINGLE_QUOTE: char = '\'';
const DOUBLE_QUOTE: char = '"';

/// A word to quote, or a group of words that quote into one string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Group(Vec<Token>),
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Word(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Word(s)
    }
}

/// True if `text` can be exposed to a POSIX shell unquoted
pub fn is_shell_safe(text: &str) -> bool {
    if !text.starts_with('~') && INERT.is_match(text) {
        return true;
    }
    // A leading caret is harmless as long as it is the only one.
    match text.strip_prefix('^') {
        Some(rest) => !rest.contains('^'),
        None => false,
    }
}

/// Quote a single token against shell expansion
pub fn quote(text: &str) -> String {
    if is_shell_safe(text) {
        return text.to_string();
    }
    // Separators are almost certainly meant for the shell.
    if text.contains(['&', '|', ';']) {
        return text.to_string();
    }
    if text.contains(SINGLE_QUOTE) {
        return format!("{DOUBLE_QUOTE}{text}{DOUBLE_QUOTE}");
    }
    // Cosmetic: foo='bar baz' reads better than 'foo=bar baz'.
    if let Some(caps) = ASSIGNMENT.captures(text) {
        return format!("{}{SINGLE_QUOTE}{}{SINGLE_QUOTE}", &caps[1], &caps[2]);
    }
    format!("{SINGLE_QUOTE}{text}{SINGLE_QUOTE}")
}

/// Quote each token; a group becomes one space-joined string of quoted words
pub fn quote_all(tokens: &[Token]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| match token {
            Token::Word(word) => quote(word),
            Token::Group(inner) => quote_all(inner).join(" "),
        })
        .collect()
}

/// Replace literal variable values in `text` with make expansions
///
/// `$` is doubled first so that the result is safe inside a recipe. Each
/// variable is tried once, in the order given; replaced text is never
/// rescanned, so overlapping values resolve in favour of the earlier one.
pub fn substitute_variables<'a, I>(text: &str, variables: I) -> String
where
    I: IntoIterator<Item = &'a Variable>,
{
    let mut result = text.replace('$', "$$");
    for var in variables {
        let Some(value) = var.scalar_value() else {
            continue;
        };
        if value.is_empty() || !result.contains(value) {
            continue;
        }
        result = replace_outside(&result, value, &var.expand());
    }
    result
}

/// Replace occurrences of `needle` that do not fall inside an earlier
/// `$(NAME)` expansion, keeping substitution single-pass.
fn replace_outside(text: &str, needle: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(end) = expansion_len(rest) {
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        } else if rest.starts_with(needle) {
            out.push_str(replacement);
            rest = &rest[needle.len()..];
        } else {
            let ch = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            out.push_str(&rest[..ch]);
            rest = &rest[ch..];
        }
    }
    out
}

/// Length of a `$(...)` expansion at the start of `text`, if any.
/// `$$` is consumed as a unit so an escaped dollar never opens one.
fn expansion_len(text: &str) -> Option<usize> {
    if text.starts_with("$$") {
        return Some(2);
    }
    let inner = text.strip_prefix("$(")?;
    inner.find(')').map(|close| close + 3)
}
