//! Block-style YAML output for flat string mappings.
//!
//! Every value must read back as the exact same string, so scalars are only
//! written plain when the YAML parser agrees; everything else is double
//! quoted, and multi-line text uses literal blocks.

use std::fmt::Write as _;

use indexmap::IndexMap;

/// Parsers reject implicit keys that run past this many characters.
const IMPLICIT_KEY_LIMIT: usize = 1024;

pub(crate) fn write_mapping(mapping: &IndexMap<String, String>, indent: usize) -> String {
    if mapping.is_empty() {
        return String::from("{}\n");
    }
    let mut out = String::new();
    let mut key_text = String::new();
    for (key, value) in mapping {
        key_text.clear();
        write_scalar(&mut key_text, key);
        if key_text.len() >= IMPLICIT_KEY_LIMIT {
            out.push_str("? ");
            out.push_str(&key_text);
            out.push('\n');
        } else {
            out.push_str(&key_text);
        }
        out.push(':');
        if value.contains('\n') && is_block_safe(value) {
            write_literal_block(&mut out, value, indent);
        } else {
            out.push(' ');
            write_scalar(&mut out, value);
            out.push('\n');
        }
    }
    out
}

fn write_scalar(out: &mut String, text: &str) {
    if is_plain_safe(text) {
        out.push_str(text);
    } else {
        write_double_quoted(out, text);
    }
}

fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if text.trim() != text {
        return false;
    }
    if matches!(
        first,
        '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`'
    ) {
        return false;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }
    if text.chars().any(|c| c.is_control() || is_special_break(c)) {
        return false;
    }
    matches!(serde_yaml::from_str::<serde_yaml::Value>(text), Ok(serde_yaml::Value::String(parsed)) if parsed == text)
}

fn write_double_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if c.is_control() || c == '\u{feff}' => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Literal blocks cannot carry control characters or whitespace-only lines.
fn is_block_safe(text: &str) -> bool {
    let body = text.trim_end_matches('\n');
    if body.trim().is_empty() {
        return false;
    }
    body.split('\n').all(|line| {
        (line.is_empty() || !line.trim().is_empty())
            && !line.chars().any(|c| (c.is_control() && c != '\t') || is_special_break(c))
    })
}

/// Byte order mark and the Unicode line/paragraph separators, which YAML
/// treats as structure rather than content.
fn is_special_break(c: char) -> bool {
    matches!(c, '\u{feff}' | '\u{2028}' | '\u{2029}')
}

fn write_literal_block(out: &mut String, text: &str, indent: usize) {
    let body = text.trim_end_matches('\n');
    let trailing_newlines = text.len() - body.len();

    out.push_str(" |");
    let first_content = body.split('\n').find(|line| !line.is_empty());
    if first_content.is_some_and(|line| line.starts_with([' ', '\t'])) {
        let _ = write!(out, "{indent}");
    }
    match trailing_newlines {
        0 => out.push('-'),
        1 => {}
        _ => out.push('+'),
    }
    out.push('\n');

    let padding = " ".repeat(indent);
    for line in body.split('\n') {
        if !line.is_empty() {
            out.push_str(&padding);
            out.push_str(line);
        }
        out.push('\n');
    }
    for _ in 1..trailing_newlines {
        out.push('\n');
    }
}
