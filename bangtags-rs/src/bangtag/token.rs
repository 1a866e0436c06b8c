//! Splits post text into literal and command segments.
//!
//! A command starts with the marker `#!` and takes one of three forms,
//! tried leftmost-first:
//!
//! | Form | Example |
//! |------|---------|
//! | terminated | `#!var:greeting:hello there:!#` |
//! | braced | `#!{tf:s:cat:dog}` |
//! | bare | `#!draft` (ends at whitespace or `#`) |
//!
//! `#!!` escapes the marker.  [`escape`] swaps it for [`PLACEHOLDER`] before
//! tokenizing and [`restore`] turns the placeholder into a literal `#!` once
//! the final text is assembled.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Introduces a command.
pub const MARKER: &str = "#!";

/// Escaped marker in source text.
pub const ESCAPED_MARKER: &str = "#!!";

/// Private-use codepoint standing in for an escaped marker.
pub const PLACEHOLDER: char = '\u{E000}';

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#!(?:.*?:!#|\{.*?\}|[^\s#]+)").expect("token pattern"))
}

/// One piece of tokenized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Plain text between commands.
    Text(&'a str),
    /// A candidate command, marker included.
    Command(&'a str),
}

impl<'a> Segment<'a> {
    /// The source text of the segment.
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Text(s) | Segment::Command(s) => s,
        }
    }
}

/// Replace every escaped marker with [`PLACEHOLDER`].
pub fn escape(text: &str) -> Cow<'_, str> {
    if text.contains(ESCAPED_MARKER) {
        Cow::Owned(text.replace(ESCAPED_MARKER, PLACEHOLDER.encode_utf8(&mut [0; 4])))
    } else {
        Cow::Borrowed(text)
    }
}

/// Turn placeholders back into a literal marker.
pub fn restore(text: &str) -> Cow<'_, str> {
    if text.contains(PLACEHOLDER) {
        Cow::Owned(text.replace(PLACEHOLDER, MARKER))
    } else {
        Cow::Borrowed(text)
    }
}

/// Split escaped text into segments.  Concatenating the segments reproduces
/// the input exactly; empty literal segments are not emitted.
pub fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in token_re().find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(&text[last..m.start()]));
        }
        segments.push(Segment::Command(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(&text[last..]));
    }
    segments
}

// ── Tests ─────────────────────────────────────────────────────────────────────
