//! Collaborator interfaces.
//!
//! The interpreter never touches storage, federation, or moderation directly.
//! Everything outside the text pass goes through the traits in this module,
//! bundled as [`Host`].  All calls are synchronous; any error aborts the pass
//! and propagates to the caller unmodified.

use std::fmt;
use std::time::Duration;

use crate::error::HostError;
use crate::post::{ConversationId, Expiry, MediaId, Post, PostId};

// ── Acting user ───────────────────────────────────────────────────────────────

/// Something the acting user may or may not be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Apply moderation policies to accounts and domains.
    Moderate,
    /// Broadcast through a service account.
    Announce,
    /// Evaluate expressions inside a post.
    Evaluate,
}

/// Authorization attached to the acting user for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Authorization {
    pub admin: bool,
    pub moderator: bool,
}

impl Authorization {
    pub const ADMIN: Self = Self { admin: true, moderator: true };
    pub const MODERATOR: Self = Self { admin: false, moderator: true };

    pub fn permits(&self, capability: Capability) -> bool {
        match capability {
            Capability::Moderate => self.admin || self.moderator,
            Capability::Announce | Capability::Evaluate => self.admin,
        }
    }
}

/// The user whose post is being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
    pub authorization: Authorization,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authorization: Authorization::default(),
        }
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.authorization.permits(capability)
    }
}

// ── Moderation vocabulary ─────────────────────────────────────────────────────

/// A moderation policy applicable to an account or a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Silence,
    Unsilence,
    Suspend,
    Unsuspend,
    ForceUnlisted,
    AllowPublic,
    ForceSensitive,
    AllowNonsensitive,
    /// Lift every restriction at once.
    Reset,
}

impl Policy {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "silence" => Policy::Silence,
            "unsilence" => Policy::Unsilence,
            "suspend" => Policy::Suspend,
            "unsuspend" => Policy::Unsuspend,
            "force_unlisted" => Policy::ForceUnlisted,
            "allow_public" => Policy::AllowPublic,
            "force_sensitive" => Policy::ForceSensitive,
            "allow_nonsensitive" => Policy::AllowNonsensitive,
            "reset" | "forgive" => Policy::Reset,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Policy::Silence => "silence",
            Policy::Unsilence => "unsilence",
            Policy::Suspend => "suspend",
            Policy::Unsuspend => "unsuspend",
            Policy::ForceUnlisted => "force_unlisted",
            Policy::AllowPublic => "allow_public",
            Policy::ForceSensitive => "force_sensitive",
            Policy::AllowNonsensitive => "allow_nonsensitive",
            Policy::Reset => "reset",
        }
    }

    /// Verb used in the report lines produced by admin filters.
    pub fn report_verb(self) -> &'static str {
        match self {
            Policy::Silence => "Silenced",
            Policy::Suspend => "Suspended",
            Policy::ForceUnlisted => "Forced unlisted for",
            Policy::ForceSensitive => "Forced sensitive for",
            Policy::Unsilence
            | Policy::Unsuspend
            | Policy::AllowPublic
            | Policy::AllowNonsensitive
            | Policy::Reset => "Reset policy for",
        }
    }
}

/// A local (`@user`) or remote (`@user@domain`) account reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub username: String,
    pub domain: Option<String>,
}

impl AccountRef {
    /// Parse `@user` or `@user@domain`; the leading `@` is required.
    pub fn parse(src: &str) -> Option<Self> {
        let rest = src.strip_prefix('@')?;
        let mut parts = rest.splitn(2, '@');
        let username = parts.next().filter(|u| !u.is_empty())?;
        let domain = parts.next().filter(|d| !d.is_empty()).map(str::to_ascii_lowercase);
        Some(Self { username: username.to_owned(), domain })
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "@{}@{}", self.username, domain),
            None => write!(f, "@{}", self.username),
        }
    }
}

/// Staff groups that can be pinged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffRole {
    Admins,
    Moderators,
}

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Persistent per-user string → string map.
pub trait VariableStore {
    fn get(&self, user: &str, key: &str) -> Result<Option<String>, HostError>;
    fn set(&mut self, user: &str, key: &str, value: &str) -> Result<(), HostError>;
    fn delete(&mut self, user: &str, key: &str) -> Result<(), HostError>;
    fn keys(&self, user: &str) -> Result<Vec<String>, HostError>;
}

/// Post persistence.
pub trait PostStore {
    fn find_post(&self, id: PostId) -> Result<Option<Post>, HostError>;
    /// Allocate an id ahead of the first save.
    fn reserve_post_id(&mut self) -> Result<PostId, HostError>;
    /// Insert or update; assigns an id if the post has none.
    fn save_post(&mut self, post: &mut Post) -> Result<PostId, HostError>;
    fn delete_post(&mut self, id: PostId) -> Result<(), HostError>;
}

/// Moderation actions.  Implementations re-check authorization and return
/// `Ok(false)` rather than an error when the actor is not allowed.
pub trait Moderation {
    fn account_policy(
        &mut self,
        actor: &Actor,
        target: &AccountRef,
        policy: Policy,
    ) -> Result<bool, HostError>;
    fn domain_policy(&mut self, actor: &Actor, domain: &str, policy: Policy) -> Result<bool, HostError>;
}

/// Posting as a designated system account.
pub trait Messaging {
    fn service_post(&mut self, service: &str, text: &str) -> Result<(), HostError>;
    fn service_dm(&mut self, service: &str, to: &str, text: &str) -> Result<(), HostError>;
}

/// Custom emoji registry.
pub trait EmojiRegistry {
    /// Copy a known emoji into the local registry.  Returns `false` when no
    /// source emoji exists.
    fn copy_emoji(&mut self, shortcode: &str, domain: Option<&str>) -> Result<bool, HostError>;
    /// Create a local emoji from an account's avatar unless one exists.
    fn emoji_from_avatar(&mut self, account: &str, shortcode: &str) -> Result<bool, HostError>;
    /// Copy every emoji used by a post.
    fn copy_post_emojis(&mut self, post: PostId) -> Result<(), HostError>;
}

/// Media attachment updates.
pub trait MediaStore {
    fn update_description(&mut self, media: MediaId, description: Option<&str>) -> Result<(), HostError>;
}

/// Conversation membership and thread-wide updates.
pub trait Threads {
    /// Accounts (as `@user` or `@user@domain`) who posted in the thread,
    /// excluding `except`.
    fn participants(&self, conversation: ConversationId, except: &str) -> Result<Vec<String>, HostError>;
    /// The author's own posts in the thread, oldest first.
    fn thread_posts(&self, conversation: ConversationId, author: &str) -> Result<Vec<Post>, HostError>;
    fn kick(&mut self, conversation: ConversationId, account: &AccountRef) -> Result<(), HostError>;
    fn unkick(&mut self, conversation: ConversationId, account: &AccountRef) -> Result<(), HostError>;
    fn mute(&mut self, conversation: ConversationId, user: &str) -> Result<(), HostError>;
    fn set_thread_expiry(
        &mut self,
        conversation: ConversationId,
        author: &str,
        which: Expiry,
        after: Option<Duration>,
    ) -> Result<(), HostError>;
}

/// Secret access keys.
pub trait Sharekeys {
    fn generate_sharekey(&mut self) -> String;
    /// Remove the sharekey from every post the author made in the thread.
    fn revoke_thread_sharekeys(&mut self, conversation: ConversationId, author: &str) -> Result<(), HostError>;
    /// Give every post the author made in the thread the same key, reusing the
    /// earliest post's key unless `regenerate` is set.  Returns the key.
    fn sync_thread_sharekeys(
        &mut self,
        conversation: ConversationId,
        author: &str,
        regenerate: bool,
    ) -> Result<String, HostError>;
}

/// Account directory and mention records.
pub trait Directory {
    fn staff(&self, role: StaffRole) -> Result<Vec<String>, HostError>;
    fn create_mention(&mut self, post: PostId, account: &str) -> Result<(), HostError>;
}

/// Every collaborator an invocation may call.
pub trait Host:
    VariableStore
    + PostStore
    + Moderation
    + Messaging
    + EmojiRegistry
    + MediaStore
    + Threads
    + Sharekeys
    + Directory
{
}

impl<T> Host for T where
    T: VariableStore
        + PostStore
        + Moderation
        + Messaging
        + EmojiRegistry
        + MediaStore
        + Threads
        + Sharekeys
        + Directory
{
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_capabilities_need_admin() {
        assert!(!Actor::new("pup").can(Capability::Moderate));
        let mod_only = Actor::new("mod").with_authorization(Authorization::MODERATOR);
        assert!(mod_only.can(Capability::Moderate));
        assert!(!mod_only.can(Capability::Evaluate));
        let admin = Actor::new("root").with_authorization(Authorization::ADMIN);
        assert!(admin.can(Capability::Moderate));
        assert!(admin.can(Capability::Announce));
    }

    #[test]
    fn policy_names_round_trip() {
        for name in ["silence", "suspend", "force_unlisted", "allow_nonsensitive", "reset"] {
            assert_eq!(Policy::parse(name).map(Policy::name), Some(name));
        }
        assert_eq!(Policy::parse("forgive"), Some(Policy::Reset));
        assert_eq!(Policy::parse("banish"), None);
    }

    #[test]
    fn account_refs() {
        assert_eq!(
            AccountRef::parse("@bob@Example.COM"),
            Some(AccountRef { username: "bob".into(), domain: Some("example.com".into()) })
        );
        assert_eq!(AccountRef::parse("@bob").map(|a| a.to_string()), Some("@bob".into()));
        assert_eq!(AccountRef::parse("bob"), None);
        assert_eq!(AccountRef::parse("@"), None);
    }
}
