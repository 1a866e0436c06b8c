//! Deferred actions.
//!
//! Some commands cannot finish during the pass: a media description is only
//! known once its capture closes, and a mention needs the post's final id.
//! Those commands queue a [`DeferredAction`] instead.  Actions read the
//! variable working copy as it stands when they run (after the pass), in the
//! order they were queued.

use crate::config::Config;
use crate::error::HostError;
use crate::host::{Actor, Capability, Host};
use crate::post::Post;
use crate::script::{eval_str, VarContext};
use crate::var::VarStore;

/// Variable that holds the pending description for media item `index`.
pub fn media_desc_key(index: usize) -> String {
    format!("_media:{index}:desc")
}

/// When an action runs relative to saving the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// After the pass, before assembly; may add output.
    PreSave,
    /// After the post is saved and has an id.
    PostSave,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Copy `_media:<index>:desc` onto attachment `index` (1-based).
    MediaDescription { index: usize },
    /// Evaluate the expression stored in `key` and append the result.
    Evaluate { key: String },
    /// Broadcast the text stored in `key` as the announcement account, or DM
    /// it to `to`.
    Announce { key: String, to: Option<String> },
    /// Record a mention of the author on the saved post.
    Mention,
}

impl DeferredAction {
    pub fn phase(&self) -> Phase {
        match self {
            DeferredAction::MediaDescription { .. } | DeferredAction::Evaluate { .. } => Phase::PreSave,
            DeferredAction::Announce { .. } | DeferredAction::Mention => Phase::PostSave,
        }
    }
}

/// FIFO queue of deferred actions for one pass.
#[derive(Debug, Default, Clone)]
pub struct DeferredQueue {
    actions: Vec<DeferredAction>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` unless an identical one is already waiting.
    pub fn push(&mut self, action: DeferredAction) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Split into `(pre_save, post_save)`, each in queue order.
    pub fn split(self) -> (Vec<DeferredAction>, Vec<DeferredAction>) {
        self.actions
            .into_iter()
            .partition(|a| a.phase() == Phase::PreSave)
    }
}

/// Everything an action may touch.
pub struct ActionContext<'a, H: Host> {
    pub host: &'a mut H,
    pub config: &'a Config,
    pub actor: &'a Actor,
    pub post: &'a mut Post,
    pub vars: &'a mut VarStore,
}

impl DeferredAction {
    /// Run the action.  Returns a chunk to append to the output, if any.
    pub fn run<H: Host>(&self, cx: &mut ActionContext<'_, H>) -> Result<Option<String>, HostError> {
        match self {
            DeferredAction::MediaDescription { index } => {
                let key = media_desc_key(*index);
                let description = cx.vars.get(&key).map(str::to_owned);
                cx.vars.unset(&key);
                let Some(media) = index.checked_sub(1).and_then(|i| cx.post.media.get_mut(i)) else {
                    return Ok(None);
                };
                media.description = description;
                cx.host.update_description(media.id, media.description.as_deref())?;
                Ok(None)
            }

            DeferredAction::Evaluate { key } => {
                let source = cx.vars.get(key).unwrap_or_default().to_owned();
                cx.vars.unset(key);
                if !cx.actor.can(Capability::Evaluate) || source.trim().is_empty() {
                    return Ok(None);
                }
                let rendered = match eval_str(&source, &mut VarContext::new(&mut *cx.vars)) {
                    Ok(value) => value.to_string(),
                    Err(e) => format!("error: {e}"),
                };
                tracing::debug!(expr = %source, result = %rendered, "evaluated expression");
                Ok(Some(rendered))
            }

            DeferredAction::Announce { key, to } => {
                if !cx.actor.can(Capability::Announce) {
                    return Ok(None);
                }
                let Some(text) = cx.vars.get(key).map(str::trim).filter(|t| !t.is_empty()) else {
                    return Ok(None);
                };
                let service = &cx.config.announce_service;
                match to {
                    Some(to) => cx.host.service_dm(service, to, text)?,
                    None => cx.host.service_post(service, text)?,
                }
                tracing::info!(service = %service, direct = to.is_some(), "announcement sent");
                Ok(None)
            }

            DeferredAction::Mention => {
                if let Some(id) = cx.post.id {
                    cx.host.create_mention(id, &cx.actor.username)?;
                }
                Ok(None)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Authorization;
    use crate::memory::{HostCall, MemoryHost};
    use crate::post::{MediaAttachment, MediaId};

    fn run(action: &DeferredAction, host: &mut MemoryHost, actor: &Actor, post: &mut Post, vars: &mut VarStore) -> Option<String> {
        let config = Config::default();
        let mut cx = ActionContext { host, config: &config, actor, post, vars };
        action.run(&mut cx).unwrap()
    }

    #[test]
    fn queue_splits_by_phase_in_order() {
        let mut queue = DeferredQueue::new();
        queue.push(DeferredAction::Mention);
        queue.push(DeferredAction::Evaluate { key: "_eval:1".into() });
        queue.push(DeferredAction::MediaDescription { index: 1 });
        queue.push(DeferredAction::MediaDescription { index: 1 });
        assert_eq!(queue.len(), 3);

        let (pre, post) = queue.split();
        assert_eq!(
            pre,
            [
                DeferredAction::Evaluate { key: "_eval:1".into() },
                DeferredAction::MediaDescription { index: 1 }
            ]
        );
        assert_eq!(post, [DeferredAction::Mention]);
    }

    #[test]
    fn media_description_applied_and_cleared() {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", "");
        post.media.push(MediaAttachment { id: MediaId(9), description: None });
        let mut vars = VarStore::new();
        vars.set(media_desc_key(1), "a sleepy cat");

        run(
            &DeferredAction::MediaDescription { index: 1 },
            &mut host,
            &Actor::new("alice"),
            &mut post,
            &mut vars,
        );
        assert_eq!(post.media[0].description.as_deref(), Some("a sleepy cat"));
        assert!(!vars.contains(&media_desc_key(1)));
        assert_eq!(
            host.calls,
            [HostCall::DescriptionUpdated { media: MediaId(9), description: Some("a sleepy cat".into()) }]
        );
    }

    #[test]
    fn evaluate_renders_value_or_error() {
        let mut host = MemoryHost::new();
        let admin = Actor::new("root").with_authorization(Authorization::ADMIN);
        let mut post = Post::new("root", "");
        let mut vars = VarStore::new();

        vars.set("_eval:0", "6 * 7");
        let action = DeferredAction::Evaluate { key: "_eval:0".into() };
        assert_eq!(run(&action, &mut host, &admin, &mut post, &mut vars), Some("42".into()));
        assert!(!vars.contains("_eval:0"));

        vars.set("_eval:0", "1 / 0");
        assert_eq!(
            run(&action, &mut host, &admin, &mut post, &mut vars),
            Some("error: division by zero".into())
        );
    }

    #[test]
    fn evaluate_requires_capability() {
        let mut vars = VarStore::new();
        vars.set("_eval:0", "1 + 1");
        let out = run(
            &DeferredAction::Evaluate { key: "_eval:0".into() },
            &mut MemoryHost::new(),
            &Actor::new("pup"),
            &mut Post::new("pup", ""),
            &mut vars,
        );
        assert_eq!(out, None);
    }

    #[test]
    fn announce_posts_or_dms() {
        let mut host = MemoryHost::new();
        let admin = Actor::new("root").with_authorization(Authorization::ADMIN);
        let mut post = Post::new("root", "");
        let mut vars = VarStore::new();
        vars.set("_announce:0", "  maintenance tonight ");

        run(
            &DeferredAction::Announce { key: "_announce:0".into(), to: None },
            &mut host,
            &admin,
            &mut post,
            &mut vars,
        );
        run(
            &DeferredAction::Announce { key: "_announce:0".into(), to: Some("@bob".into()) },
            &mut host,
            &admin,
            &mut post,
            &mut vars,
        );
        assert_eq!(
            host.calls,
            [
                HostCall::ServicePost { service: "announcements".into(), text: "maintenance tonight".into() },
                HostCall::ServiceDm {
                    service: "announcements".into(),
                    to: "@bob".into(),
                    text: "maintenance tonight".into()
                },
            ]
        );
    }

    #[test]
    fn mention_needs_saved_post() {
        let mut host = MemoryHost::new();
        let actor = Actor::new("alice");
        let mut post = Post::new("alice", "hi");
        run(&DeferredAction::Mention, &mut host, &actor, &mut post, &mut VarStore::new());
        assert!(host.calls.is_empty());

        let id = host.insert_post(post.clone());
        post.id = Some(id);
        run(&DeferredAction::Mention, &mut host, &actor, &mut post, &mut VarStore::new());
        assert_eq!(host.calls, [HostCall::Mention { post: id, account: "alice".into() }]);
    }
}
