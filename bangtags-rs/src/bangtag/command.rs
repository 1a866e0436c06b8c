//! Command normalization and the verb table.
//!
//! A command token such as `#!var:greeting::a:b:::c:d` becomes a path of
//! identifiers:
//!
//! 1. a trailing `:!#` terminator and surrounding braces are stripped;
//! 2. everything after the first `:::` is kept as one final segment;
//! 3. the head is split on `::`, and the first of those pieces on `:`;
//! 4. `\:` is never a split point and unescapes to `:`;
//! 5. prefix injection and alias rewriting are applied.
//!
//! Alias rewriting walks the whole table in order, so one path can be
//! rewritten more than once.

use std::sync::OnceLock;

use regex::Regex;

use super::token::MARKER;

/// Bare identifiers that imply a leading namespace.
const PREFIXES: &[(&str, &[&str])] = &[
    ("permalink", &["link"]),
    ("cloudroot", &["link"]),
    ("blogroot", &["link"]),
];

/// Leading-path rewrites, applied in order.
const ALIASES: &[(&[&str], &[&str])] = &[
    (&["media", "end"], &["var", "end"]),
    (&["media", "stop"], &["var", "end"]),
    (&["media", "endall"], &["var", "endall"]),
    (&["media", "stopall"], &["var", "endall"]),
    (&["thread", "live"], &["l", "thread"]),
    (&["thread", "lifespan"], &["l", "thread"]),
    (&["thread", "defed"], &["defed", "thread"]),
];

/// Sub-verbs that close a scope.
const EXIT_WORDS: &[&str] = &["end", "stop", "endall", "stopall"];

fn terminator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\\:)?:+!#$").expect("terminator pattern"))
}

// ── Verb ──────────────────────────────────────────────────────────────────────

/// Leading identifier of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Var,
    Tf,
    End,
    EndAll,
    Hide,
    Comment,
    Draft,
    Once,
    Emoji,
    Emojify,
    Char,
    Join,
    Link,
    Ping,
    Tag,
    Thread,
    Parent,
    Media,
    Bangtag,
    Identity,
    Sharekey,
    Format,
    Visibility,
    Sensitive,
    Keysmash,
    Admin,
    Lifespan,
    Defederate,
    Whitespace,
    Eval,
    Announce,
    Mention,
}

impl Verb {
    /// Case-insensitive lookup; `None` for unknown verbs.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "var" => Verb::Var,
            "tf" => Verb::Tf,
            "end" | "stop" => Verb::End,
            "endall" | "stopall" => Verb::EndAll,
            "hide" => Verb::Hide,
            "comment" => Verb::Comment,
            "draft" => Verb::Draft,
            "once" => Verb::Once,
            "emoji" => Verb::Emoji,
            "emojify" => Verb::Emojify,
            "char" => Verb::Char,
            "join" => Verb::Join,
            "link" => Verb::Link,
            "ping" => Verb::Ping,
            "tag" => Verb::Tag,
            "thread" => Verb::Thread,
            "parent" => Verb::Parent,
            "media" => Verb::Media,
            "bangtag" => Verb::Bangtag,
            "i" | "we" => Verb::Identity,
            "sharekey" => Verb::Sharekey,
            "format" | "type" => Verb::Format,
            "visibility" | "v" => Verb::Visibility,
            "sensitive" => Verb::Sensitive,
            "keysmash" => Verb::Keysmash,
            "admin" => Verb::Admin,
            "lifespan" | "l" | "live" | "ttl" => Verb::Lifespan,
            "defed" | "defederate" => Verb::Defederate,
            "ws" | "whitespace" => Verb::Whitespace,
            "eval" => Verb::Eval,
            "announce" => Verb::Announce,
            "mention" => Verb::Mention,
            _ => return None,
        })
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A normalized command path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    path: Vec<String>,
    /// Token text with the terminator and braces removed, marker included.
    literal: String,
}

impl Command {
    /// Normalize a command token (marker included).
    ///
    /// Returns `None` when the token has no leading identifier.
    pub fn parse(token: &str) -> Option<Self> {
        let body = token.strip_prefix(MARKER).unwrap_or(token);
        let body = terminator().replace(body, "$1");
        let body = body
            .strip_prefix('{')
            .and_then(|b| b.strip_suffix('}'))
            .unwrap_or(&*body);
        let literal = format!("{MARKER}{body}");

        let body = body.trim();
        if body.is_empty() {
            return None;
        }

        let (head, tail) = match find_unescaped(body, ":::") {
            Some(at) => (&body[..at], Some(&body[at + 3..])),
            None => (body, None),
        };

        let mut pieces = split_unescaped(head, "::").into_iter();
        let mut path: Vec<&str> = pieces.next().map(|first| split_unescaped(first, ":")).unwrap_or_default();
        path.extend(pieces);
        path.extend(tail.filter(|t| !t.is_empty()));
        while path.last().is_some_and(|s| s.is_empty()) {
            path.pop();
        }

        let mut path: Vec<String> = path.into_iter().map(|s| s.replace("\\:", ":")).collect();
        if path.first().map_or(true, |first| first.trim().is_empty()) {
            return None;
        }

        if let Some((_, prefix)) = PREFIXES
            .iter()
            .find(|(name, _)| path[0].eq_ignore_ascii_case(name))
        {
            path.splice(0..0, prefix.iter().map(|s| (*s).to_owned()));
        }

        for (from, to) in ALIASES {
            if starts_with_path(&path, from) {
                path.splice(0..from.len(), to.iter().map(|s| (*s).to_owned()));
            }
        }

        Some(Self { path, literal })
    }

    pub fn verb(&self) -> Option<Verb> {
        Verb::parse(&self.path[0])
    }

    /// Path element `i` (the verb is element 0).
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.path.get(i).map(String::as_str)
    }

    /// Lowercased path element `i`.
    pub fn word(&self, i: usize) -> Option<String> {
        self.arg(i).map(str::to_ascii_lowercase)
    }

    /// Path elements from `i` onward.
    pub fn rest(&self, i: usize) -> &[String] {
        self.path.get(i..).unwrap_or(&[])
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The token as written, minus terminator and braces.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Returns `true` if element `i` is one of the scope-closing sub-verbs.
    pub fn is_exit(&self, i: usize) -> bool {
        self.arg(i)
            .is_some_and(|a| EXIT_WORDS.iter().any(|w| a.eq_ignore_ascii_case(w)))
    }
}

fn starts_with_path(path: &[String], prefix: &[&str]) -> bool {
    path.len() >= prefix.len()
        && path.iter().zip(prefix).all(|(p, want)| p.eq_ignore_ascii_case(want))
}

/// Byte offset of the first `sep` not inside a `\:` escape.
fn find_unescaped(s: &str, sep: &str) -> Option<usize> {
    let mut i = 0;
    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with("\\:") {
            i += 2;
        } else if rest.starts_with(sep) {
            return Some(i);
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

/// Split on `sep`, skipping escaped colons and dropping trailing empty pieces.
fn split_unescaped<'a>(s: &'a str, sep: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut rest = s;
    while let Some(at) = find_unescaped(rest, sep) {
        pieces.push(&rest[..at]);
        rest = &rest[at + sep.len()..];
    }
    pieces.push(rest);
    while pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }
    pieces
}

// ── Tests ─────────────────────────────────────────────────────────────────────
