//! Final text assembly and the discard rule.

use std::sync::OnceLock;

use regex::Regex;

use super::token::restore;

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run pattern"))
}

fn mentions_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\s*@[\w.\-]+(?:@[\w\-]+(?:\.[\w\-]+)*)?)+\s*$").expect("mention pattern")
    })
}

/// Whitespace normalization requested with `#!ws:…`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Whitespace {
    /// Collapse runs of blank lines into one.
    pub collapse: bool,
    /// Trim every line.
    pub strip_lines: bool,
}

/// Result of assembling a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    Text(String),
    /// Nothing worth posting is left.
    Discard,
}

/// Returns `true` if `text` is nothing but one or more @-mentions.
pub fn is_mentions_only(text: &str) -> bool {
    mentions_only_re().is_match(text)
}

/// Join the output chunks into the final post text.
pub fn assemble(chunks: &[String], ws: Whitespace) -> Assembled {
    let mut text = chunks.concat();
    if ws.collapse {
        text = blank_run_re().replace_all(&text, "\n\n").into_owned();
    }
    let mut text = text.trim().to_owned();
    if ws.strip_lines {
        text = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    }
    let text = restore(&text).into_owned();

    if text.is_empty() || is_mentions_only(&text) {
        Assembled::Discard
    } else {
        Assembled::Text(text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
