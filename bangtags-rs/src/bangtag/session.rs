//! Invocation lifecycle.
//!
//! ```text
//! load vars → pass → pre-save actions → assemble ─┬─ discard → delete post
//!                                                 └─ keep → commit vars → save → post-save actions
//! ```
//!
//! Nested invocations (publishing a draft parent) share the outer working
//! copy of the variables and never commit it themselves; the outermost
//! invocation writes everything back once.

use super::assemble::{assemble, Assembled};
use super::deferred::{ActionContext, DeferredAction};
use super::interp::{identity_footer, Interpreter};
use super::token::MARKER;
use crate::config::Config;
use crate::error::Result;
use crate::host::{Actor, Host};
use crate::post::{Post, PostId};
use crate::var::{VarStore, DISABLE_KEY};

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The post was saved under this id.
    Saved(PostId),
    /// Nothing worth posting was left; the post was not saved.
    Discarded,
}

/// Process `post` for `actor` and persist the result.
///
/// Variables are loaded from and committed back to the host's
/// [`VariableStore`](crate::host::VariableStore).  On
/// [`Outcome::Discarded`] nothing is committed and an already-saved post is
/// deleted.
#[tracing::instrument(level = "debug", skip_all, fields(user = %actor.username))]
pub fn process<H: Host>(host: &mut H, config: &Config, actor: &Actor, post: &mut Post) -> Result<Outcome> {
    let mut vars = VarStore::load(&*host, &actor.username)?;

    if !post.text.contains(MARKER) || vars.contains(DISABLE_KEY) {
        apply_footer(post, &vars);
        let id = host.save_post(post)?;
        return Ok(Outcome::Saved(id));
    }

    let Some(post_save) = evaluate(host, config, actor, post, &mut vars, 0)? else {
        discard(host, post)?;
        return Ok(Outcome::Discarded);
    };

    vars.commit(&mut *host, &actor.username)?;
    let id = host.save_post(post)?;
    run_post_save(host, config, actor, post, &mut vars, &post_save)?;
    Ok(Outcome::Saved(id))
}

/// Run a nested invocation over `post` at `depth`, sharing `vars`.
///
/// The post is saved (or deleted, when it assembles to nothing) but the
/// variables are left for the outermost invocation to commit.
#[tracing::instrument(level = "debug", skip_all, fields(user = %actor.username, depth = depth))]
pub fn publish_nested<H: Host>(
    host: &mut H,
    config: &Config,
    actor: &Actor,
    post: &mut Post,
    vars: &mut VarStore,
    depth: usize,
) -> Result<Outcome> {
    let Some(post_save) = evaluate(host, config, actor, post, vars, depth)? else {
        discard(host, post)?;
        return Ok(Outcome::Discarded);
    };
    let id = host.save_post(post)?;
    run_post_save(host, config, actor, post, vars, &post_save)?;
    tracing::info!(post = %id, "nested post published");
    Ok(Outcome::Saved(id))
}

/// Pass, pre-save actions and assembly.  Returns the post-save actions, or
/// `None` when the post is to be discarded.
fn evaluate<H: Host>(
    host: &mut H,
    config: &Config,
    actor: &Actor,
    post: &mut Post,
    vars: &mut VarStore,
    depth: usize,
) -> Result<Option<Vec<DeferredAction>>> {
    let pass = Interpreter::new(&mut *host, config, actor, &mut *post, &mut *vars, depth)?.run()?;
    let mut chunks = pass.chunks;
    let (pre_save, post_save) = pass.deferred.split();

    let mut cx = ActionContext { host, config, actor, post: &mut *post, vars: &mut *vars };
    for action in &pre_save {
        if let Some(chunk) = action.run(&mut cx)? {
            chunks.push(chunk);
        }
    }

    match assemble(&chunks, pass.whitespace) {
        Assembled::Discard => Ok(None),
        Assembled::Text(text) => {
            post.text = text;
            apply_footer(post, vars);
            Ok(Some(post_save))
        }
    }
}

fn run_post_save<H: Host>(
    host: &mut H,
    config: &Config,
    actor: &Actor,
    post: &mut Post,
    vars: &mut VarStore,
    actions: &[DeferredAction],
) -> Result<()> {
    let mut cx = ActionContext { host, config, actor, post, vars };
    for action in actions {
        action.run(&mut cx)?;
    }
    Ok(())
}

fn discard<H: Host>(host: &mut H, post: &Post) -> Result<()> {
    if let Some(id) = post.id {
        host.delete_post(id)?;
    }
    tracing::info!(post = ?post.id, "post discarded: nothing left after processing");
    Ok(())
}

/// Fill in the footer from the current identity unless one is already set.
fn apply_footer(post: &mut Post, vars: &VarStore) {
    if post.footer.is_none() {
        post.footer = identity_footer(vars);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HostCall, MemoryHost};

    #[test]
    fn text_without_commands_is_saved_as_is() {
        let mut host = MemoryHost::new();
        host.set_var("alice", "_they:are", "fox");
        host.set_var("alice", "_they:are:fox", "a fox");
        let mut post = Post::new("alice", "  just words  ");

        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        let Outcome::Saved(id) = outcome else { panic!("discarded") };
        let saved = host.post(id).unwrap();
        assert_eq!(saved.text, "  just words  ");
        assert_eq!(saved.footer.as_deref(), Some("a fox"));
    }

    #[test]
    fn disabled_user_skips_processing() {
        let mut host = MemoryHost::new();
        host.set_var("alice", DISABLE_KEY, "1");
        let mut post = Post::new("alice", "#!var:x:1 hi");
        process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        assert_eq!(post.text, "#!var:x:1 hi");
        assert_eq!(host.var("alice", "x"), None);
    }

    #[test]
    fn variables_are_committed_on_save() {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", "#!var:x:1 #!once #!var:y:2 hi");
        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        assert!(matches!(outcome, Outcome::Saved(_)));
        assert_eq!(post.text, "hi");
        assert_eq!(host.var("alice", "x"), Some("1"));
        assert_eq!(host.var("alice", "y"), None);
    }

    #[test]
    fn discard_deletes_and_skips_commit() {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", "#!var:x:1 @bob");
        let id = host.insert_post(post.clone());
        post.id = Some(id);

        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        assert_eq!(outcome, Outcome::Discarded);
        assert_eq!(host.var("alice", "x"), None);
        assert!(host.post(id).is_none());
        assert_eq!(host.calls, [HostCall::PostDeleted { post: id }]);
    }

    #[test]
    fn mention_runs_after_save() {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", "#!mention hello");
        let Outcome::Saved(id) =
            process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap()
        else {
            panic!("discarded")
        };
        assert_eq!(host.calls, [HostCall::Mention { post: id, account: "alice".into() }]);
    }
}
