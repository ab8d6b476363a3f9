//! sinuscheck-ts3/src/reply.rs
//!
//! Text-level helpers for the ServerQuery line protocol: value escaping and
//! parsing of status and data lines.

use crate::models::Record;
use crate::{Result, Ts3Error};

/// Escape a value before it is put on the wire.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            ' ' => out.push_str("\\s"),
            '|' => out.push_str("\\p"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0B}' => out.push_str("\\v"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape`]. Unknown escapes are kept verbatim.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('s') => out.push(' '),
            Some('p') => out.push('|'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0B}'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Build a command line, escaping every argument value.
pub fn command(name: &str, args: &[(&str, String)]) -> String {
    let mut line = name.to_string();
    for (key, value) in args {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&escape(value));
    }
    line
}

/// Split one data line into records.
///
/// Records are separated by `|`, fields by a space. A bare key maps to an
/// empty value.
pub fn parse_records(line: &str) -> Vec<Record> {
    line.split('|')
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            chunk
                .split(' ')
                .filter(|field| !field.is_empty())
                .map(|field| match field.split_once('=') {
                    Some((key, value)) => (key.to_string(), unescape(value)),
                    None => (field.to_string(), String::new()),
                })
                .collect()
        })
        .collect()
}

/// `Some(..)` when the line is a status line (`error id=.. msg=..`).
///
/// `Ok(())` for id 0, otherwise the server's error.
pub fn parse_status(line: &str) -> Option<Result<()>> {
    let rest = line.strip_prefix("error ")?;
    let Some(record) = parse_records(rest).into_iter().next() else {
        return Some(Err(Ts3Error::MalformedReply(line.to_string())));
    };

    let id = match record.get("id").and_then(|v| v.parse::<u32>().ok()) {
        Some(id) => id,
        None => return Some(Err(Ts3Error::MalformedReply(line.to_string()))),
    };
    if id == 0 {
        return Some(Ok(()));
    }

    let message = record.get("msg").cloned().unwrap_or_default();
    Some(Err(Ts3Error::Command { id, message }))
}

pub fn is_notification(line: &str) -> bool {
    line.starts_with("notify")
}
