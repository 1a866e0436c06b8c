//! The in-flight post mutated by a bangtag pass.
//!
//! The post is owned by the caller; an invocation borrows it mutably for the
//! duration of one pass.  Persistence goes through [`crate::host::PostStore`].

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tag applied to drafts.
pub const DRAFT_TAG: &str = "self.draft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Visibility ────────────────────────────────────────────────────────────────

/// Who can see a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Direct,
    Private,
    Unlisted,
    Local,
    #[default]
    Public,
}

impl Visibility {
    /// Parse one of the visibility names accepted by `#!visibility:…`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "direct" | "dm" | "whisper" | "d" => Visibility::Direct,
            "private" | "packmate" | "group" | "f" | "g" => Visibility::Private,
            "unlisted" | "u" => Visibility::Unlisted,
            "local" | "monsterpit" | "l" | "m" => Visibility::Local,
            "public" | "world" | "p" => Visibility::Public,
            _ => return None,
        })
    }
}

// ── ContentType ───────────────────────────────────────────────────────────────

/// Markup language of the post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/markdown")]
    Markdown,
    #[serde(rename = "text/x-bbcode")]
    BbCode,
    #[serde(rename = "text/x-bbcode+markdown")]
    BbCodeMarkdown,
    #[serde(rename = "text/html")]
    Html,
}

impl ContentType {
    /// Parse one of the short names accepted by `#!format:…`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "t" | "txt" | "text" | "plain" | "plaintext" => ContentType::Plain,
            "m" | "md" | "markdown" => ContentType::Markdown,
            "b" | "bbc" | "bbcode" => ContentType::BbCode,
            "d" | "bm" | "bbm" | "bbdown" => ContentType::BbCodeMarkdown,
            "h" | "htm" | "html" => ContentType::Html,
            _ => return None,
        })
    }

    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Plain => "text/plain",
            ContentType::Markdown => "text/markdown",
            ContentType::BbCode => "text/x-bbcode",
            ContentType::BbCodeMarkdown => "text/x-bbcode+markdown",
            ContentType::Html => "text/html",
        }
    }
}

// ── Lifespan ──────────────────────────────────────────────────────────────────

/// Which expiry a lifespan command sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Delete the post after the duration.
    Delete,
    /// Stop federating the post after the duration.
    Defederate,
}

/// Parse a lifespan such as `90`, `30s`, `5m`, `2h`, `3d`, `1w`.
///
/// A bare number is minutes.  Returns `Some(None)` for the explicit "no
/// expiry" spellings and `None` for anything unparseable.
pub fn parse_lifespan(src: &str) -> Option<Option<Duration>> {
    let src = src.trim().to_ascii_lowercase();
    if matches!(src.as_str(), "off" | "never" | "none" | "forever" | "0") {
        return Some(None);
    }
    let split = src.find(|c: char| !c.is_ascii_digit()).unwrap_or(src.len());
    let (digits, unit) = src.split_at(split);
    let n: u64 = digits.parse().ok()?;
    let secs = match unit.trim() {
        "" | "m" | "min" | "mins" | "minute" | "minutes" => n.checked_mul(60)?,
        "s" | "sec" | "secs" | "second" | "seconds" => n,
        "h" | "hr" | "hrs" | "hour" | "hours" => n.checked_mul(3_600)?,
        "d" | "day" | "days" => n.checked_mul(86_400)?,
        "w" | "wk" | "week" | "weeks" => n.checked_mul(604_800)?,
        _ => return None,
    };
    Some(Some(Duration::from_secs(secs)))
}

// ── Post ──────────────────────────────────────────────────────────────────────

/// An attached media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: MediaId,
    pub description: Option<String>,
}

/// A post being composed (or a stored post loaded for reply-scoped commands).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned on first save, or reserved early by `#!link:self`.
    pub id: Option<PostId>,
    /// Username of the author.
    pub author: String,
    pub text: String,
    pub footer: Option<String>,
    pub content_type: ContentType,
    pub visibility: Visibility,
    pub local_only: bool,
    pub sensitive: bool,
    pub sharekey: Option<String>,
    pub delete_after: Option<Duration>,
    pub defederate_after: Option<Duration>,
    pub tags: BTreeSet<String>,
    pub media: Vec<MediaAttachment>,
    pub in_reply_to: Option<PostId>,
    pub conversation: Option<ConversationId>,
}

impl Post {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_draft(&self) -> bool {
        self.tags.contains(DRAFT_TAG)
    }

    pub fn set_expiry(&mut self, which: Expiry, after: Option<Duration>) {
        match which {
            Expiry::Delete => self.delete_after = after,
            Expiry::Defederate => self.defederate_after = after,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
