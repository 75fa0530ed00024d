//! Tcl list syntax: parsing, formatting, and element quoting.
//!
//! Exposed publicly so hosts implement list/dict shimmering with exactly the
//! grammar the core uses. A well-formed list is a sequence of elements
//! separated by whitespace; elements may be bare (backslash escapes
//! processed), brace-quoted (raw, nestable), or double-quoted (escapes
//! processed).

use std::fmt;

use crate::{error::FeatherError, parse::substitute_backslashes};

/// Malformed list syntax (unbalanced brace or quote, bad separator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSyntaxError {
    pub message: String,
}

impl ListSyntaxError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ListSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ListSyntaxError {}

impl From<ListSyntaxError> for FeatherError {
    fn from(err: ListSyntaxError) -> Self {
        Self::new(err.message)
    }
}

/// Splits list text into its elements.
pub fn parse_list(text: &str) -> Result<Vec<String>, ListSyntaxError> {
    let bytes = text.as_bytes();
    let mut elements = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let (element, next) = match bytes[i] {
            b'{' => parse_braced_element(text, i)?,
            b'"' => parse_quoted_element(text, i)?,
            _ => parse_bare_element(text, i),
        };
        elements.push(element);
        i = next;
    }
    Ok(elements)
}

fn parse_braced_element(text: &str, start: usize) -> Result<(String, usize), ListSyntaxError> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let content = text[start + 1..i].to_owned();
                    let next = i + 1;
                    if next < bytes.len() && !bytes[next].is_ascii_whitespace() {
                        return Err(ListSyntaxError::new(format!(
                            "list element in braces followed by \"{}\" instead of space",
                            &text[next..bytes.len().min(next + 1)]
                        )));
                    }
                    return Ok((content, next));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ListSyntaxError::new("unmatched open brace in list"))
}

fn parse_quoted_element(text: &str, start: usize) -> Result<(String, usize), ListSyntaxError> {
    let bytes = text.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'"' => {
                let content = substitute_backslashes(&text[start + 1..i]);
                let next = i + 1;
                if next < bytes.len() && !bytes[next].is_ascii_whitespace() {
                    return Err(ListSyntaxError::new(format!(
                        "list element in quotes followed by \"{}\" instead of space",
                        &text[next..bytes.len().min(next + 1)]
                    )));
                }
                return Ok((content, next));
            }
            _ => {}
        }
        i += 1;
    }
    Err(ListSyntaxError::new("unmatched open quote in list"))
}

fn parse_bare_element(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 2,
            b if b.is_ascii_whitespace() => break,
            _ => i += 1,
        }
    }
    (substitute_backslashes(&text[start..i]), i)
}

/// Joins elements into canonical list text, quoting as needed so the result
/// re-parses to the same elements.
pub fn format_list<S: AsRef<str>>(elements: &[S]) -> String {
    let mut out = String::new();
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&quote_element(element.as_ref()));
    }
    out
}

/// Quotes one element for inclusion in list text.
///
/// Plain words pass through; anything containing separators or syntax
/// characters is brace-quoted when its braces balance, otherwise
/// backslash-escaped.
pub fn quote_element(element: &str) -> String {
    if element.is_empty() {
        return "{}".to_owned();
    }
    if !needs_quoting(element) {
        return element.to_owned();
    }
    if braces_balanced(element) && !element.ends_with('\\') {
        return format!("{{{element}}}");
    }
    let mut out = String::with_capacity(element.len() + 4);
    for c in element.chars() {
        match c {
            ' ' | '\t' | '{' | '}' | '[' | ']' | '$' | '"' | ';' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn needs_quoting(element: &str) -> bool {
    element.chars().any(|c| {
        matches!(
            c,
            ' ' | '\t' | '\n' | '\r' | '{' | '}' | '[' | ']' | '$' | '"' | ';' | '\\'
        )
    })
}

fn braces_balanced(element: &str) -> bool {
    let mut depth = 0i64;
    let mut bytes = element.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'\\' => {
                bytes.next();
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Parses index syntax: an integer, `end`, `end±N`, or `M±N`.
///
/// `len` is the collection length; `end` means `len - 1`. The result may be
/// negative or past the end — callers clamp or reject as their command
/// requires.
pub fn parse_index(text: &str, len: usize) -> Result<i64, FeatherError> {
    let s = text.trim();
    let end = len as i64 - 1;
    if s == "end" {
        return Ok(end);
    }
    if let Some(rest) = s.strip_prefix("end") {
        let (negate, digits) = match rest.as_bytes().first() {
            Some(b'+') => (false, &rest[1..]),
            Some(b'-') => (true, &rest[1..]),
            _ => return Err(FeatherError::bad_index(text)),
        };
        let offset = parse_plain_int(digits).ok_or_else(|| FeatherError::bad_index(text))?;
        return Ok(if negate { end - offset } else { end + offset });
    }
    if let Some(i) = parse_plain_int(s) {
        return Ok(i);
    }
    // M+N / M-N arithmetic forms (skip the leading sign when looking for
    // the operator)
    if s.is_char_boundary(1) {
        if let Some(pos) = s[1..].find(['+', '-']).map(|p| p + 1) {
            let lhs = parse_plain_int(&s[..pos]);
            let rhs = parse_plain_int(&s[pos + 1..]);
            if let (Some(l), Some(r)) = (lhs, rhs) {
                return Ok(if s.as_bytes()[pos] == b'+' { l + r } else { l - r });
            }
        }
    }
    Err(FeatherError::bad_index(text))
}

fn parse_plain_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}
