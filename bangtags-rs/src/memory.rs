//! In-memory host.
//!
//! [`MemoryHost`] implements every collaborator trait from [`crate::host`]
//! with plain collections.  The CLI runs against it (persisting variables to a
//! JSON file between runs) and the tests use it to observe side effects: every
//! externally visible action is appended to [`MemoryHost::calls`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng;

use crate::error::{Error, HostError, Result};
use crate::host::{
    AccountRef, Actor, Capability, Directory, EmojiRegistry, MediaStore, Messaging, Moderation,
    Policy, PostStore, Sharekeys, StaffRole, Threads, VariableStore,
};
use crate::post::{ConversationId, Expiry, MediaId, Post, PostId};

/// Number of random bytes in a generated sharekey.
const SHAREKEY_BYTES: usize = 32;

/// A side effect observed by the in-memory host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    AccountPolicy { target: String, policy: Policy },
    DomainPolicy { domain: String, policy: Policy },
    ServicePost { service: String, text: String },
    ServiceDm { service: String, to: String, text: String },
    EmojiCopied { shortcode: String },
    EmojiFromAvatar { account: String, shortcode: String },
    DescriptionUpdated { media: MediaId, description: Option<String> },
    Kick { conversation: ConversationId, account: String },
    Unkick { conversation: ConversationId, account: String },
    Mute { conversation: ConversationId, user: String },
    ThreadExpiry { conversation: ConversationId, which: Expiry, after: Option<Duration> },
    SharekeysRevoked { conversation: ConversationId },
    SharekeysSynced { conversation: ConversationId, key: String },
    Mention { post: PostId, account: String },
    PostDeleted { post: PostId },
}

/// Collaborators backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryHost {
    vars: BTreeMap<String, BTreeMap<String, String>>,
    posts: BTreeMap<PostId, Post>,
    next_id: u64,
    /// Known accounts, as `@user` or `@user@domain`.
    pub accounts: BTreeSet<String>,
    /// Domains currently under a policy.
    pub domain_blocks: BTreeMap<String, Policy>,
    pub admins: Vec<String>,
    pub moderators: Vec<String>,
    /// Emoji registry keyed by `(shortcode, domain)`; local emoji have no domain.
    pub emojis: BTreeSet<(String, Option<String>)>,
    /// Shortcodes used by stored posts.
    pub post_emojis: BTreeMap<PostId, Vec<String>>,
    pub calls: Vec<HostCall>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Test and CLI helpers ──────────────────────────────────────────────────

    pub fn set_var(&mut self, user: &str, key: &str, value: &str) {
        self.vars
            .entry(user.to_owned())
            .or_default()
            .insert(key.to_owned(), value.to_owned());
    }

    pub fn var(&self, user: &str, key: &str) -> Option<&str> {
        self.vars.get(user)?.get(key).map(String::as_str)
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.get(&id)
    }

    /// Store a post directly, assigning an id if it has none.
    pub fn insert_post(&mut self, mut post: Post) -> PostId {
        let id = match post.id {
            Some(id) => {
                self.next_id = self.next_id.max(id.0);
                id
            }
            None => self.allocate_id(),
        };
        post.id = Some(id);
        self.posts.insert(id, post);
        id
    }

    pub fn add_account(&mut self, account: &str) {
        self.accounts.insert(account.to_owned());
    }

    /// Load every user's variables from a JSON file.  A missing file is not
    /// an error.
    pub fn load_vars_json(&mut self, path: &Path) -> Result<()> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(Error::Io { path: path.to_owned(), source }),
        };
        self.vars = serde_json::from_str(&text)
            .map_err(|source| Error::VarFile { path: path.to_owned(), source })?;
        Ok(())
    }

    /// Write every user's variables to a JSON file, creating parent
    /// directories as needed.
    pub fn save_vars_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.vars)
            .map_err(|source| Error::VarFile { path: path.to_owned(), source })?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_owned(), source })?;
        }
        std::fs::write(path, json).map_err(|source| Error::Io { path: path.to_owned(), source })
    }

    fn allocate_id(&mut self) -> PostId {
        self.next_id += 1;
        PostId(self.next_id)
    }

    fn thread_post_ids(&self, conversation: ConversationId, author: &str) -> Vec<PostId> {
        self.posts
            .values()
            .filter(|p| p.conversation == Some(conversation) && p.author == author)
            .filter_map(|p| p.id)
            .collect()
    }
}

// ── VariableStore ─────────────────────────────────────────────────────────────

impl VariableStore for MemoryHost {
    fn get(&self, user: &str, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.var(user, key).map(str::to_owned))
    }

    fn set(&mut self, user: &str, key: &str, value: &str) -> Result<(), HostError> {
        self.set_var(user, key, value);
        Ok(())
    }

    fn delete(&mut self, user: &str, key: &str) -> Result<(), HostError> {
        if let Some(vars) = self.vars.get_mut(user) {
            vars.remove(key);
        }
        Ok(())
    }

    fn keys(&self, user: &str) -> Result<Vec<String>, HostError> {
        Ok(self
            .vars
            .get(user)
            .map(|vars| vars.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ── PostStore ─────────────────────────────────────────────────────────────────

impl PostStore for MemoryHost {
    fn find_post(&self, id: PostId) -> Result<Option<Post>, HostError> {
        Ok(self.posts.get(&id).cloned())
    }

    fn reserve_post_id(&mut self) -> Result<PostId, HostError> {
        Ok(self.allocate_id())
    }

    fn save_post(&mut self, post: &mut Post) -> Result<PostId, HostError> {
        let id = match post.id {
            Some(id) => id,
            None => self.allocate_id(),
        };
        post.id = Some(id);
        self.posts.insert(id, post.clone());
        Ok(id)
    }

    fn delete_post(&mut self, id: PostId) -> Result<(), HostError> {
        self.posts.remove(&id);
        self.calls.push(HostCall::PostDeleted { post: id });
        Ok(())
    }
}

// ── Moderation ────────────────────────────────────────────────────────────────

impl Moderation for MemoryHost {
    fn account_policy(
        &mut self,
        actor: &Actor,
        target: &AccountRef,
        policy: Policy,
    ) -> Result<bool, HostError> {
        let target = target.to_string();
        if !actor.can(Capability::Moderate) || !self.accounts.contains(&target) {
            return Ok(false);
        }
        self.calls.push(HostCall::AccountPolicy { target, policy });
        Ok(true)
    }

    fn domain_policy(&mut self, actor: &Actor, domain: &str, policy: Policy) -> Result<bool, HostError> {
        if !actor.can(Capability::Moderate) {
            return Ok(false);
        }
        match policy {
            Policy::Silence | Policy::Suspend | Policy::ForceUnlisted | Policy::ForceSensitive => {
                self.domain_blocks.insert(domain.to_owned(), policy);
            }
            // Lifting a policy needs one to exist.
            _ => {
                if self.domain_blocks.remove(domain).is_none() {
                    return Ok(false);
                }
            }
        }
        self.calls.push(HostCall::DomainPolicy { domain: domain.to_owned(), policy });
        Ok(true)
    }
}

// ── Messaging ─────────────────────────────────────────────────────────────────

impl Messaging for MemoryHost {
    fn service_post(&mut self, service: &str, text: &str) -> Result<(), HostError> {
        self.calls.push(HostCall::ServicePost {
            service: service.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    fn service_dm(&mut self, service: &str, to: &str, text: &str) -> Result<(), HostError> {
        if AccountRef::parse(to).is_none() {
            return Err(HostError::InvalidTarget(to.to_owned()));
        }
        self.calls.push(HostCall::ServiceDm {
            service: service.to_owned(),
            to: to.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }
}

// ── EmojiRegistry ─────────────────────────────────────────────────────────────

impl EmojiRegistry for MemoryHost {
    fn copy_emoji(&mut self, shortcode: &str, domain: Option<&str>) -> Result<bool, HostError> {
        let local = (shortcode.to_owned(), None);
        if self.emojis.contains(&local) {
            return Ok(true);
        }
        let found = self.emojis.iter().any(|(code, from)| {
            code == shortcode && domain.map_or(true, |d| from.as_deref() == Some(d))
        });
        if found {
            self.emojis.insert(local);
            self.calls.push(HostCall::EmojiCopied { shortcode: shortcode.to_owned() });
        }
        Ok(found)
    }

    fn emoji_from_avatar(&mut self, account: &str, shortcode: &str) -> Result<bool, HostError> {
        if !self.emojis.insert((shortcode.to_owned(), None)) {
            return Ok(false);
        }
        self.calls.push(HostCall::EmojiFromAvatar {
            account: account.to_owned(),
            shortcode: shortcode.to_owned(),
        });
        Ok(true)
    }

    fn copy_post_emojis(&mut self, post: PostId) -> Result<(), HostError> {
        let codes = self.post_emojis.get(&post).cloned().unwrap_or_default();
        for code in codes {
            if self.emojis.insert((code.clone(), None)) {
                self.calls.push(HostCall::EmojiCopied { shortcode: code });
            }
        }
        Ok(())
    }
}

// ── MediaStore ────────────────────────────────────────────────────────────────

impl MediaStore for MemoryHost {
    fn update_description(&mut self, media: MediaId, description: Option<&str>) -> Result<(), HostError> {
        self.calls.push(HostCall::DescriptionUpdated {
            media,
            description: description.map(str::to_owned),
        });
        Ok(())
    }
}

// ── Threads ───────────────────────────────────────────────────────────────────

impl Threads for MemoryHost {
    fn participants(&self, conversation: ConversationId, except: &str) -> Result<Vec<String>, HostError> {
        let mut seen = BTreeSet::new();
        Ok(self
            .posts
            .values()
            .filter(|p| p.conversation == Some(conversation) && p.author != except)
            .filter(|p| seen.insert(p.author.clone()))
            .map(|p| format!("@{}", p.author))
            .collect())
    }

    fn thread_posts(&self, conversation: ConversationId, author: &str) -> Result<Vec<Post>, HostError> {
        Ok(self
            .thread_post_ids(conversation, author)
            .into_iter()
            .filter_map(|id| self.posts.get(&id).cloned())
            .collect())
    }

    fn kick(&mut self, conversation: ConversationId, account: &AccountRef) -> Result<(), HostError> {
        self.calls.push(HostCall::Kick { conversation, account: account.to_string() });
        Ok(())
    }

    fn unkick(&mut self, conversation: ConversationId, account: &AccountRef) -> Result<(), HostError> {
        self.calls.push(HostCall::Unkick { conversation, account: account.to_string() });
        Ok(())
    }

    fn mute(&mut self, conversation: ConversationId, user: &str) -> Result<(), HostError> {
        self.calls.push(HostCall::Mute { conversation, user: user.to_owned() });
        Ok(())
    }

    fn set_thread_expiry(
        &mut self,
        conversation: ConversationId,
        author: &str,
        which: Expiry,
        after: Option<Duration>,
    ) -> Result<(), HostError> {
        for id in self.thread_post_ids(conversation, author) {
            if let Some(post) = self.posts.get_mut(&id) {
                post.set_expiry(which, after);
            }
        }
        self.calls.push(HostCall::ThreadExpiry { conversation, which, after });
        Ok(())
    }
}

// ── Sharekeys ─────────────────────────────────────────────────────────────────

impl Sharekeys for MemoryHost {
    fn generate_sharekey(&mut self) -> String {
        let mut bytes = [0u8; SHAREKEY_BYTES];
        rand::thread_rng().fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    fn revoke_thread_sharekeys(&mut self, conversation: ConversationId, author: &str) -> Result<(), HostError> {
        for id in self.thread_post_ids(conversation, author) {
            if let Some(post) = self.posts.get_mut(&id) {
                post.sharekey = None;
            }
        }
        self.calls.push(HostCall::SharekeysRevoked { conversation });
        Ok(())
    }

    fn sync_thread_sharekeys(
        &mut self,
        conversation: ConversationId,
        author: &str,
        regenerate: bool,
    ) -> Result<String, HostError> {
        let ids = self.thread_post_ids(conversation, author);
        let existing = ids
            .first()
            .and_then(|id| self.posts.get(id))
            .and_then(|p| p.sharekey.clone());
        let key = match existing {
            Some(key) if !regenerate => key,
            _ => self.generate_sharekey(),
        };
        for id in ids {
            if let Some(post) = self.posts.get_mut(&id) {
                post.sharekey = Some(key.clone());
            }
        }
        self.calls.push(HostCall::SharekeysSynced { conversation, key: key.clone() });
        Ok(key)
    }
}

// ── Directory ─────────────────────────────────────────────────────────────────

impl Directory for MemoryHost {
    fn staff(&self, role: StaffRole) -> Result<Vec<String>, HostError> {
        Ok(match role {
            StaffRole::Admins => self.admins.clone(),
            StaffRole::Moderators => self.moderators.clone(),
        })
    }

    fn create_mention(&mut self, post: PostId, account: &str) -> Result<(), HostError> {
        if !self.posts.contains_key(&post) {
            return Err(HostError::NotFound { kind: "post", id: post.to_string() });
        }
        self.calls.push(HostCall::Mention { post, account: account.to_owned() });
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
