//! Permissive parser for the two-field model reply.
//!
//! Model output is untrusted and frequently noisy around the requested format:
//! markdown emphasis, list numbering, reasoning blocks, preamble text. The
//! parser scans line by line for the configured field prefixes and ignores
//! everything else.

use std::borrow::Cow;

use crate::taxonomy::FieldNames;
use crate::utils::fold_key;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Fields recovered from a reply. Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub label: String,
    pub justification: String,
}

/// Parse a reply into label and justification.
///
/// A line matches a field when the text before its first colon, stripped of
/// markdown decoration and list numbering, equals one of the field's spellings
/// ignoring case and accents. When a field appears more than once the last
/// occurrence wins.
pub fn parse_reply(reply: &str, fields: &FieldNames) -> ParsedReply {
    let label_keys = folded(&fields.label);
    let justification_keys = folded(&fields.justification);

    let mut parsed = ParsedReply::default();
    for line in strip_think_blocks(reply).lines() {
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        let key = fold_key(clean_head(head));
        if key.is_empty() {
            continue;
        }

        if label_keys.contains(&key) {
            parsed.label = clean_value(value).to_string();
        } else if justification_keys.contains(&key) {
            parsed.justification = clean_value(value).to_string();
        }
    }
    parsed
}

fn folded(spellings: &[String]) -> Vec<String> {
    spellings
        .iter()
        .map(|s| fold_key(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Remove `<think>...</think>` sections emitted by reasoning models.
/// An unclosed block drops the rest of the reply.
fn strip_think_blocks(reply: &str) -> Cow<'_, str> {
    if !reply.contains(THINK_OPEN) {
        return Cow::Borrowed(reply);
    }

    let mut out = String::with_capacity(reply.len());
    let mut rest = reply;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(end) => rest = &after_open[end + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn is_decoration(c: char) -> bool {
    c.is_whitespace() || matches!(c, '*' | '#' | '-' | '>' | '_' | '`')
}

/// "**2. Razón**" -> "Razón"
fn clean_head(head: &str) -> &str {
    let head = head.trim_matches(is_decoration);
    let without_number = head.trim_start_matches(|c: char| c.is_ascii_digit());
    if without_number.len() != head.len() {
        if let Some(stripped) = without_number
            .strip_prefix('.')
            .or_else(|| without_number.strip_prefix(')'))
        {
            return stripped.trim_matches(is_decoration);
        }
    }
    head
}

/// "** BARRERA ROTA " -> "BARRERA ROTA"
fn clean_value(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '*' || c == '`').trim()
}
