//! The dispatcher.
//!
//! [`Interpreter`] walks the segments of one post exactly once.  Literal text
//! and command output are routed through the active filters into whatever
//! the innermost scope says (a variable, the bin, or the output list); every
//! command either emits a chunk, mutates the post, opens or closes a scope,
//! or queues a [`DeferredAction`].
//!
//! The interpreter never fails on user input.  Unknown verbs, unknown
//! sub-verbs and malformed arguments are dropped; the only errors are the
//! ones collaborators return.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::assemble::Whitespace;
use super::command::{Command, Verb};
use super::deferred::{media_desc_key, DeferredAction, DeferredQueue};
use super::filter::{head_counter_key, Filter, FilterContext};
use super::scope::{Scope, ScopeKind, ScopeStack};
use super::session;
use super::token::{escape, tokenize, Segment, MARKER};
use crate::config::Config;
use crate::error::Result;
use crate::host::{AccountRef, Actor, Capability, Host, Policy, StaffRole};
use crate::post::{parse_lifespan, ContentType, ConversationId, Expiry, Post, Visibility, DRAFT_TAG};
use crate::tags;
use crate::var::{is_reserved, VarStore};

/// Banner put at the top of a draft.  The placeholder becomes `#!` on
/// assembly, so the banner survives as text.
pub const DRAFT_BANNER: &str = "[center]`\u{E000}draft!#`[/center]\n";

/// The draft banner as it reads in stored text.
pub const DRAFT_MARK: &str = "[center]`#!draft!#`[/center]";

/// Name of the identity currently used for the footer.
pub const CURRENT_IDENTITY: &str = "_they:are";

/// Variable holding the footer text for identity `name`.
pub fn identity_key(name: &str) -> String {
    format!("{CURRENT_IDENTITY}:{name}")
}

/// Footer text of the current identity, if one is set.
pub fn identity_footer(vars: &VarStore) -> Option<String> {
    let name = vars.get(CURRENT_IDENTITY)?;
    vars.get(&identity_key(name)).map(str::to_owned)
}

/// `text` without a leading draft banner.
pub fn strip_draft_banner(text: &str) -> &str {
    text.trim_start()
        .strip_prefix(DRAFT_MARK)
        .map_or(text, |rest| rest.strip_prefix('\n').unwrap_or(rest))
}

/// Character-group table for `keysmash`.  Earlier groups are picked far more
/// often than later ones.
const KEYBOARD: &[&str] = &[
    "asdf", "jkl;", "gh", "'", "we", "io", "r", "u", "cv", "nm", "t", "x", ",", "q", "z", "y",
    "b", "p", "[", ".", "/", "]", "\\",
];

fn named_char(name: &str) -> Option<&'static str> {
    Some(match name {
        "zws" => "\u{200B}",
        "zwnj" => "\u{200C}",
        "zwj" => "\u{200D}",
        "\\n" => "\n",
        "\\r" => "\r",
        "\\t" => "\t",
        "\\T" => "    ",
        _ => return None,
    })
}

/// A hex codepoint of one to five digits, or `None`.
fn hex_char(code: &str) -> Option<char> {
    if code.is_empty() || code.len() > 5 || !code.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let n = u32::from_str_radix(code, 16).ok().filter(|&n| n > 0)?;
    Some(char::from_u32(n).unwrap_or('?'))
}

fn is_shortcode(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn identity_name(who: &str) -> String {
    who.to_lowercase().split_whitespace().collect()
}

fn keysmash() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(6..=33);
    (0..len)
        .filter_map(|_| {
            let r: f64 = rng.gen();
            let group = ((KEYBOARD.len() as f64) * r.powi(3)) as usize;
            let group = KEYBOARD[group.min(KEYBOARD.len() - 1)];
            group.as_bytes().choose(&mut rng).map(|&b| char::from(b))
        })
        .collect()
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// What a finished pass hands back to the session.
#[derive(Debug)]
pub struct Pass {
    pub chunks: Vec<String>,
    pub whitespace: Whitespace,
    pub deferred: DeferredQueue,
}

pub struct Interpreter<'a, H: Host> {
    host: &'a mut H,
    config: &'a Config,
    actor: &'a Actor,
    post: &'a mut Post,
    vars: &'a mut VarStore,
    /// The post being replied to, if any.
    parent: Option<Post>,
    /// Nesting level; 0 for the outermost invocation.
    depth: usize,

    scopes: ScopeStack,
    chunks: Vec<String>,
    deferred: DeferredQueue,
    once: bool,
    /// Set once a draft begins; everything after is copied verbatim.
    frozen: bool,
    banner: bool,
    whitespace: Whitespace,
    next_slot: usize,
}

impl<'a, H: Host> Interpreter<'a, H> {
    pub fn new(
        host: &'a mut H,
        config: &'a Config,
        actor: &'a Actor,
        post: &'a mut Post,
        vars: &'a mut VarStore,
        depth: usize,
    ) -> Result<Self> {
        let parent = match post.in_reply_to {
            Some(id) => host.find_post(id)?,
            None => None,
        };
        Ok(Self {
            host,
            config,
            actor,
            post,
            vars,
            parent,
            depth,
            scopes: ScopeStack::new(),
            chunks: Vec::new(),
            deferred: DeferredQueue::new(),
            once: false,
            frozen: false,
            banner: false,
            whitespace: Whitespace::default(),
            next_slot: 0,
        })
    }

    /// Run the pass over the post's text.
    pub fn run(mut self) -> Result<Pass> {
        let text = escape(&self.post.text).into_owned();
        if text.trim_start().starts_with(DRAFT_MARK) {
            self.frozen = true;
            self.banner = true;
        }

        for segment in tokenize(&text) {
            self.feed(segment)?;
        }

        for scope in self.scopes.clear() {
            self.close(scope);
        }
        Ok(Pass {
            chunks: self.chunks,
            whitespace: self.whitespace,
            deferred: self.deferred,
        })
    }

    fn feed(&mut self, segment: Segment<'_>) -> Result<()> {
        tracing::trace!(?segment, depth = self.scopes.len(), "segment");
        if self.frozen {
            self.chunks.push(segment.as_str().to_owned());
            return Ok(());
        }

        let token = match segment {
            Segment::Text(text) => return self.place(text.to_owned()),
            Segment::Command(token) => token,
        };

        if self.scopes.top_is(ScopeKind::Raw) {
            let closes = Command::parse(token)
                .is_some_and(|cmd| cmd.verb() == Some(Verb::Comment) && cmd.is_exit(1));
            if closes {
                self.scopes.pop();
            } else {
                self.chunks.push(token.to_owned());
            }
            return Ok(());
        }

        let Some(cmd) = Command::parse(token) else { return Ok(()) };

        if self.scopes.top_is(ScopeKind::Discard) && !closes_discard(&cmd) {
            tracing::trace!(path = ?cmd.path(), "swallowed by hide");
            return Ok(());
        }

        let once = std::mem::take(&mut self.once);
        let Some(verb) = cmd.verb() else {
            tracing::debug!(path = ?cmd.path(), "unknown verb");
            return Ok(());
        };
        tracing::debug!(?verb, path = ?cmd.path(), "dispatch");

        if let Some(chunk) = self.dispatch(&cmd, verb, once)? {
            self.place(chunk)?;
        }
        Ok(())
    }

    /// Run `chunk` through the active filters and route it to the current
    /// sink.
    fn place(&mut self, chunk: String) -> Result<()> {
        let sink = self.scopes.sink().map(Scope::kind);
        // Blank chunks are never captured: a capture stays unset until its
        // first non-blank chunk.
        if chunk.trim().is_empty() {
            if !matches!(sink, Some(ScopeKind::Capture | ScopeKind::Discard)) && !chunk.is_empty() {
                self.chunks.push(chunk);
            }
            return Ok(());
        }

        let mut chunk = chunk;
        for (slot, filter) in self.scopes.filters() {
            let mut cx = FilterContext {
                vars: &mut *self.vars,
                moderation: &mut *self.host,
                actor: self.actor,
                config: self.config,
                depth: self.depth,
                slot,
            };
            chunk = filter.apply(chunk, &mut cx)?;
        }

        match self.scopes.sink() {
            Some(Scope::Capture(name)) => self.vars.capture(name, &chunk),
            Some(Scope::Discard) => {}
            _ => self.chunks.push(chunk),
        }
        Ok(())
    }

    /// Tidy up after a scope that has just been removed from the stack.
    fn close(&mut self, scope: Scope) {
        match scope {
            Scope::Capture(name) => self.vars.finish_capture(&name),
            Scope::Transform { slot, .. } => {
                self.vars.unset(&head_counter_key(self.depth, slot));
            }
            Scope::Discard | Scope::Raw | Scope::Draft => {}
        }
    }

    fn close_all(&mut self, kind: ScopeKind) {
        for scope in self.scopes.remove_all(kind) {
            self.close(scope);
        }
    }

    fn close_innermost(&mut self, kind: ScopeKind) {
        if let Some(scope) = self.scopes.remove_innermost(kind) {
            self.close(scope);
        }
    }

    fn alloc_slot(&mut self) -> usize {
        self.next_slot += 1;
        self.next_slot - 1
    }

    fn conversation(&self) -> Option<ConversationId> {
        self.post
            .conversation
            .or_else(|| self.parent.as_ref().and_then(|p| p.conversation))
    }

    fn privileged(&self, capability: Capability, verb: &str) -> bool {
        let allowed = self.actor.can(capability);
        if !allowed {
            tracing::warn!(user = %self.actor.username, verb, "privileged command ignored");
        }
        allowed
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    fn dispatch(&mut self, cmd: &Command, verb: Verb, once: bool) -> Result<Option<String>> {
        Ok(match verb {
            Verb::Var => self.var(cmd, once),
            Verb::Tf => {
                match cmd.word(1).as_deref() {
                    None => {}
                    Some("end" | "stop") => self.close_innermost(ScopeKind::Transform),
                    Some("endall" | "stopall") => self.close_all(ScopeKind::Transform),
                    Some(_) => {
                        let slot = self.alloc_slot();
                        let filter = Filter::parse(cmd.rest(1));
                        self.scopes.push(Scope::Transform { filter, slot });
                    }
                }
                None
            }
            Verb::End => {
                if let Some(scope) = self.scopes.pop() {
                    self.close(scope);
                }
                None
            }
            Verb::EndAll => {
                for scope in self.scopes.clear() {
                    self.close(scope);
                }
                None
            }
            Verb::Hide => {
                if cmd.is_exit(1) {
                    self.scopes.remove_all(ScopeKind::Discard);
                } else if cmd.arg(1).is_none() && !self.scopes.contains(ScopeKind::Discard) {
                    self.scopes.push(Scope::Discard);
                }
                None
            }
            Verb::Comment => {
                if cmd.arg(1).is_none() {
                    self.scopes.push(Scope::Raw);
                }
                None
            }
            Verb::Draft => {
                if !self.banner {
                    self.chunks.insert(0, DRAFT_BANNER.to_owned());
                    self.banner = true;
                }
                self.post.visibility = Visibility::Direct;
                self.post.content_type = ContentType::BbCodeMarkdown;
                tags::add_tags(self.post, [DRAFT_TAG]);
                self.scopes.push(Scope::Draft);
                self.frozen = true;
                None
            }
            Verb::Once => {
                self.once = true;
                None
            }
            Verb::Emoji => {
                let Some(code) = cmd.arg(1).filter(|c| is_shortcode(c)) else { return Ok(None) };
                let domain = cmd.word(2).filter(|d| !d.is_empty());
                self.host.copy_emoji(code, domain.as_deref())?;
                Some(format!(":{code}:"))
            }
            Verb::Emojify => self.emojify(cmd)?,
            Verb::Char => {
                let text: String = cmd
                    .rest(1)
                    .iter()
                    .filter_map(|c| named_char(c).map(str::to_owned).or_else(|| hex_char(c).map(String::from)))
                    .collect();
                Some(text)
            }
            Verb::Join => {
                let Some(sep) = cmd.arg(1) else { return Ok(None) };
                let sep = named_char(sep).unwrap_or(sep);
                Some(cmd.rest(2).join(sep))
            }
            Verb::Link => self.link(cmd)?,
            Verb::Ping => self.ping(cmd)?,
            Verb::Tag => {
                tags::add_tags(self.post, cmd.rest(1).iter().map(String::as_str));
                None
            }
            Verb::Thread => self.thread(cmd)?,
            Verb::Parent => self.parent(cmd)?,
            Verb::Media => {
                self.media(cmd);
                None
            }
            Verb::Bangtag => cmd
                .literal()
                .split_once(':')
                .map(|(_, rest)| format!("{MARKER}{}", rest.replace(':', ":\u{200C}"))),
            Verb::Identity => self.identity(cmd),
            Verb::Sharekey => {
                match cmd.word(1).as_deref() {
                    Some("new") => self.post.sharekey = Some(self.host.generate_sharekey()),
                    Some("revoke") => self.post.sharekey = None,
                    _ => {}
                }
                None
            }
            Verb::Format => {
                if let Some(content_type) = cmd.arg(1).and_then(ContentType::parse) {
                    self.post.content_type = content_type;
                }
                None
            }
            Verb::Visibility => {
                if let Some(visibility) = cmd.arg(1).and_then(Visibility::parse) {
                    self.post.visibility = visibility;
                }
                None
            }
            Verb::Sensitive => {
                match cmd.word(1).as_deref() {
                    None | Some("on" | "yes" | "true" | "1") => self.post.sensitive = true,
                    Some("off" | "no" | "false" | "0") => self.post.sensitive = false,
                    _ => {}
                }
                None
            }
            Verb::Keysmash => Some(keysmash()),
            Verb::Admin => {
                if !self.privileged(Capability::Moderate, "admin") {
                    return Ok(None);
                }
                let Some(name) = cmd.word(1) else { return Ok(None) };
                let Some(policy) = Policy::parse(&name) else { return Ok(None) };
                self.post.content_type = ContentType::Markdown;
                let slot = self.alloc_slot();
                self.scopes.push(Scope::Transform { filter: Filter::Admin(policy), slot });
                Some(format!("<code>admin:{name}</code>:\n"))
            }
            Verb::Lifespan => self.lifespan(cmd, Expiry::Delete)?,
            Verb::Defederate => self.lifespan(cmd, Expiry::Defederate)?,
            Verb::Whitespace => {
                match cmd.word(1).as_deref() {
                    Some("collapse") => self.whitespace.collapse = true,
                    Some("strip") => self.whitespace.strip_lines = true,
                    Some("all") => {
                        self.whitespace.collapse = true;
                        self.whitespace.strip_lines = true;
                    }
                    _ => {}
                }
                None
            }
            Verb::Eval => {
                if !self.privileged(Capability::Evaluate, "eval") {
                    return Ok(None);
                }
                let key = format!("_eval:{}:{}", self.depth, self.deferred.len());
                self.vars.mark_ephemeral(key.clone());
                let expr = cmd.rest(1);
                if expr.is_empty() {
                    self.vars.unset(&key);
                    self.scopes.push(Scope::Capture(key.clone()));
                } else {
                    self.vars.set(key.clone(), expr.join(":"));
                }
                self.deferred.push(DeferredAction::Evaluate { key });
                None
            }
            Verb::Announce => {
                if !self.privileged(Capability::Announce, "announce") {
                    return Ok(None);
                }
                let to = match cmd.word(1).as_deref() {
                    Some("dm") => match cmd.arg(2) {
                        Some(to) => Some(to.to_owned()),
                        None => return Ok(None),
                    },
                    _ => None,
                };
                let key = format!("_announce:{}:{}", self.depth, self.deferred.len());
                self.vars.mark_ephemeral(key.clone());
                self.vars.unset(&key);
                self.scopes.push(Scope::Capture(key.clone()));
                self.deferred.push(DeferredAction::Announce { key, to });
                None
            }
            Verb::Mention => {
                self.deferred.push(DeferredAction::Mention);
                None
            }
        })
    }

    fn var(&mut self, cmd: &Command, once: bool) -> Option<String> {
        let name = cmd.arg(1)?;
        match cmd.word(1).as_deref() {
            Some("end" | "stop") => {
                self.close_innermost(ScopeKind::Capture);
                return None;
            }
            Some("endall" | "stopall") => {
                self.close_all(ScopeKind::Capture);
                return None;
            }
            _ => {}
        }
        if is_reserved(name) || name.trim().is_empty() {
            return None;
        }

        match cmd.rest(2) {
            [] => self.vars.get(name).map(str::to_owned),
            [dash] if dash == "-" => {
                self.vars.unset(name);
                self.scopes.push(Scope::Capture(name.to_owned()));
                None
            }
            value => {
                self.vars.set(name, value.join(":"));
                if once {
                    self.vars.mark_ephemeral(name);
                }
                None
            }
        }
    }

    fn emojify(&mut self, cmd: &Command) -> Result<Option<String>> {
        let (account, code) = match cmd.word(1).as_deref() {
            Some("avatar") => (self.actor.username.clone(), cmd.arg(2)),
            Some("parent") if cmd.word(2).as_deref() == Some("avatar") => match &self.parent {
                Some(parent) => (parent.author.clone(), cmd.arg(3)),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        let Some(code) = code.filter(|c| is_shortcode(c)) else { return Ok(None) };
        self.host.emoji_from_avatar(&account, code)?;
        Ok(Some(format!(":{code}:")))
    }

    fn link(&mut self, cmd: &Command) -> Result<Option<String>> {
        let user = &self.actor.username;
        Ok(match cmd.word(1).as_deref() {
            Some("permalink" | "self") => {
                let id = match self.post.id {
                    Some(id) => id,
                    None => {
                        let id = self.host.reserve_post_id()?;
                        self.post.id = Some(id);
                        id
                    }
                };
                Some(self.config.permalink(user, id))
            }
            Some("cloudroot") => Some(self.config.cloud_url(user)),
            Some("blogroot") => Some(self.config.blog_url(user)),
            _ => None,
        })
    }

    fn ping(&mut self, cmd: &Command) -> Result<Option<String>> {
        let roles: &[StaffRole] = match cmd.word(1).as_deref() {
            Some("admins") => &[StaffRole::Admins],
            Some("mods") => &[StaffRole::Moderators],
            Some("staff") => &[StaffRole::Admins, StaffRole::Moderators],
            _ => return Ok(None),
        };
        let mut mentions = BTreeSet::new();
        for &role in roles {
            mentions.extend(self.host.staff(role)?.into_iter().map(|u| format!("@{u}")));
        }
        Ok(Some(mentions.into_iter().collect::<Vec<_>>().join(" ")))
    }

    fn thread(&mut self, cmd: &Command) -> Result<Option<String>> {
        let conversation = self.conversation();
        let user = &self.actor.username;
        match (cmd.word(1).as_deref(), conversation) {
            (Some("reall"), Some(conv)) => {
                let mut mentions: Vec<String> = Vec::new();
                let extras = cmd.rest(2).iter().map(|s| s.trim().to_owned());
                for mention in extras.chain(self.host.participants(conv, user)?) {
                    if !mention.is_empty() && !mentions.contains(&mention) {
                        mentions.push(mention);
                    }
                }
                return Ok(Some(mentions.join(" ")));
            }
            (Some("sharekey"), conv) => match (cmd.word(2).as_deref(), conv) {
                (Some("revoke"), Some(conv)) => {
                    self.host.revoke_thread_sharekeys(conv, user)?;
                    self.post.sharekey = None;
                }
                (Some(mode @ ("sync" | "new")), Some(conv)) => {
                    let key = self.host.sync_thread_sharekeys(conv, user, mode == "new")?;
                    self.post.sharekey = Some(key);
                }
                (Some("sync" | "new"), None) => {
                    self.post.sharekey = Some(self.host.generate_sharekey());
                }
                _ => {}
            },
            (Some("emoji"), Some(conv)) => {
                for post in self.host.thread_posts(conv, user)? {
                    if let Some(id) = post.id {
                        self.host.copy_post_emojis(id)?;
                    }
                }
            }
            (Some("kick"), Some(conv)) => {
                if let Some(account) = cmd.arg(2).and_then(AccountRef::parse) {
                    self.host.kick(conv, &account)?;
                }
            }
            (Some("unkick"), Some(conv)) => {
                if let Some(account) = cmd.arg(2).and_then(AccountRef::parse) {
                    self.host.unkick(conv, &account)?;
                }
            }
            (Some("mute"), Some(conv)) => self.host.mute(conv, user)?,
            _ => {}
        }
        Ok(None)
    }

    fn parent(&mut self, cmd: &Command) -> Result<Option<String>> {
        let Some(sub) = cmd.word(1) else { return Ok(None) };
        if sub == "publish" {
            return self.publish_parent();
        }
        let Some(parent) = self.parent.as_mut() else { return Ok(None) };

        match sub.as_str() {
            "permalink" => return Ok(parent.id.map(|id| self.config.permalink(&parent.author, id))),
            "tag" | "untag" => {
                if parent.author != self.actor.username {
                    return Ok(None);
                }
                let names = cmd.rest(2).iter().map(String::as_str);
                let changed = if sub == "tag" {
                    tags::add_tags(parent, names)
                } else {
                    tags::remove_tags(parent, names)
                };
                if changed > 0 {
                    self.host.save_post(parent)?;
                }
            }
            "emoji" => {
                if let Some(id) = parent.id {
                    self.host.copy_post_emojis(id)?;
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// Publish the draft being replied to by running it through a nested
    /// invocation that shares this one's variables.
    fn publish_parent(&mut self) -> Result<Option<String>> {
        let Some(parent) = self.parent.as_ref() else { return Ok(None) };
        if parent.author != self.actor.username || !parent.is_draft() {
            return Ok(None);
        }
        let depth = self.depth + 1;
        if depth > self.config.max_depth {
            tracing::warn!(depth, max = self.config.max_depth, "nesting limit reached; draft not published");
            return Ok(None);
        }

        let mut draft = parent.clone();
        draft.text = strip_draft_banner(&draft.text).to_owned();
        draft.tags.remove(DRAFT_TAG);
        draft.visibility = Visibility::Public;
        tracing::info!(post = ?draft.id, depth, "publishing draft");

        session::publish_nested(&mut *self.host, self.config, self.actor, &mut draft, &mut *self.vars, depth)?;
        self.parent = Some(draft);
        Ok(None)
    }

    fn media(&mut self, cmd: &Command) {
        let Some(index) = cmd
            .arg(1)
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
        else {
            return;
        };
        if index == 0 || index > self.post.media.len() || cmd.word(2).as_deref() != Some("desc") {
            return;
        }

        let key = media_desc_key(index);
        let text = cmd.rest(3);
        if text.is_empty() {
            self.vars.unset(&key);
            self.scopes.push(Scope::Capture(key));
        } else {
            self.vars.set(key, text.join(":"));
        }
        self.deferred.push(DeferredAction::MediaDescription { index });
    }

    fn identity(&mut self, cmd: &Command) -> Option<String> {
        if !matches!(cmd.word(1).as_deref(), Some("am" | "are")) {
            return None;
        }
        let who = cmd.arg(2).map(str::trim).unwrap_or_default();

        match who {
            "" => {
                self.vars.unset(CURRENT_IDENTITY);
                self.post.footer = None;
                None
            }
            "not" => {
                let name = identity_name(cmd.arg(3)?);
                if name.is_empty() {
                    return None;
                }
                self.vars.unset(&identity_key(&name));
                if self.vars.get(CURRENT_IDENTITY) == Some(name.as_str()) {
                    self.vars.unset(CURRENT_IDENTITY);
                    self.post.footer = None;
                }
                None
            }
            "list" => {
                self.post.visibility = Visibility::Direct;
                self.post.local_only = true;
                self.post.content_type = ContentType::Markdown;
                let prefix = identity_key("");
                let mut lines = vec!["\n# <code>#!</code><code>i:am:list</code>:\n<hr />\n".to_owned()];
                lines.extend(
                    self.vars
                        .with_prefix(&prefix)
                        .map(|(k, v)| format!("<code>{}</code> is <em>{v}</em>", &k[prefix.len()..])),
                );
                Some(lines.join("\n") + "\n")
            }
            _ => {
                let name = identity_name(who);
                let key = identity_key(&name);
                let description = cmd.rest(3).join(":");
                let description = description.trim();
                if !description.is_empty() {
                    self.vars.set(key.clone(), description);
                } else if !self.vars.contains(&key) {
                    self.vars.set(key.clone(), who);
                }
                self.vars.set(CURRENT_IDENTITY, name);
                self.post.footer = self.vars.get(&key).map(str::to_owned);
                None
            }
        }
    }

    fn lifespan(&mut self, cmd: &Command, which: Expiry) -> Result<Option<String>> {
        let thread = cmd.word(1).as_deref() == Some("thread");
        let Some(after) = cmd.arg(if thread { 2 } else { 1 }).and_then(parse_lifespan) else {
            return Ok(None);
        };
        if after.is_some_and(|d| d < self.config.min_lifespan) {
            tracing::debug!(?after, "lifespan below minimum ignored");
            return Ok(None);
        }

        self.post.set_expiry(which, after);
        if thread {
            if let Some(conv) = self.conversation() {
                self.host.set_thread_expiry(conv, &self.actor.username, which, after)?;
            }
        }
        Ok(None)
    }
}

/// Whether `cmd` may close a hide scope.
fn closes_discard(cmd: &Command) -> bool {
    match cmd.verb() {
        Some(Verb::End | Verb::EndAll) => true,
        Some(Verb::Hide) => cmd.is_exit(1),
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
