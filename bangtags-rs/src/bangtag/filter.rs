//! Transformation filters.
//!
//! A `tf` scope (or an `admin` command) pushes a [`Filter`]; every chunk
//! produced while the scope is open passes through it.  Nested filters run
//! innermost first.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;
use crate::error::HostError;
use crate::host::{AccountRef, Actor, Capability, Moderation, Policy};
use crate::var::VarStore;

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").expect("anchor pattern"))
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("link pattern"))
}

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w\-]+\.[\w\-]+(?:\.[\w\-]+)*$").expect("domain pattern"))
}

/// Variable holding the running word count of a `head` filter.
///
/// Nested invocations share one variable store, so the key carries the
/// nesting depth as well as the scope's slot.
pub fn head_counter_key(depth: usize, slot: usize) -> String {
    format!("_tf:head:{depth}:{slot}")
}

/// A text transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Replace the first (or every) occurrence of each `(from, to)` pair.
    Replace { pairs: Vec<(String, String)>, all: bool },
    /// Replace HTML anchors with their inner text.
    StripAnchors,
    /// Remove bare URLs.
    StripLinks,
    /// Keep only the first `n` words across every chunk in the scope.
    Head(usize),
    /// Apply a moderation policy to every account and domain in the chunk.
    Admin(Policy),
    /// Unknown filter: passes text through but still occupies a scope.
    Identity,
}

impl Filter {
    /// Build a filter from the path after `tf` (`["s", "cat", "dog"]`).
    pub fn parse(args: &[String]) -> Self {
        let Some(name) = args.first() else { return Filter::Identity };
        let pairs = || -> Vec<(String, String)> {
            args[1..]
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect()
        };
        match name.to_ascii_lowercase().as_str() {
            "replace" | "sub" | "s" => Filter::Replace { pairs: pairs(), all: false },
            "replaceall" | "gsub" | "gs" => Filter::Replace { pairs: pairs(), all: true },
            "stripanchors" | "noanchors" => Filter::StripAnchors,
            "striplinks" | "nolinks" => Filter::StripLinks,
            "head" | "take" => {
                let n = args
                    .get(1)
                    .and_then(|n| n.trim().parse::<i64>().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or(1);
                Filter::Head(usize::try_from(n).unwrap_or(usize::MAX))
            }
            "admin" => args
                .get(1)
                .and_then(|p| Policy::parse(p))
                .map_or(Filter::Identity, Filter::Admin),
            _ => Filter::Identity,
        }
    }
}

/// What a filter may touch while it runs.
pub struct FilterContext<'a> {
    pub vars: &'a mut VarStore,
    pub moderation: &'a mut dyn Moderation,
    pub actor: &'a Actor,
    pub config: &'a Config,
    /// Nesting depth of the invocation running the filter.
    pub depth: usize,
    /// Identifies the scope the filter belongs to.
    pub slot: usize,
}

impl Filter {
    /// Transform one chunk.
    pub fn apply(&self, chunk: String, cx: &mut FilterContext<'_>) -> Result<String, HostError> {
        Ok(match self {
            Filter::Replace { pairs, all } => {
                let mut chunk = chunk;
                for (from, to) in pairs {
                    chunk = if *all {
                        chunk.replace(from.as_str(), to)
                    } else {
                        chunk.replacen(from.as_str(), to, 1)
                    };
                }
                chunk
            }
            Filter::StripAnchors => anchor_re().replace_all(&chunk, "$1").into_owned(),
            Filter::StripLinks => link_re().replace_all(&chunk, "").into_owned(),
            Filter::Head(limit) => {
                let key = head_counter_key(cx.depth, cx.slot);
                let used = cx.vars.get_int(&key).and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
                let (kept, words) = take_words(&chunk, limit.saturating_sub(used));
                cx.vars.set(key, (used + words).to_string());
                kept.to_owned()
            }
            Filter::Admin(policy) => apply_policy(*policy, &chunk, cx)?,
            Filter::Identity => chunk,
        })
    }
}

/// The prefix of `text` holding at most `n` words, and how many it holds.
fn take_words(text: &str, n: usize) -> (&str, usize) {
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word && words == n {
                return (&text[..i], words);
            }
            in_word = false;
        } else if !in_word {
            if words == n {
                return (&text[..i], words);
            }
            in_word = true;
            words += 1;
        }
    }
    (text, words)
}

fn apply_policy(policy: Policy, chunk: &str, cx: &mut FilterContext<'_>) -> Result<String, HostError> {
    if !cx.actor.can(Capability::Moderate) {
        tracing::warn!(user = %cx.actor.username, policy = policy.name(), "admin filter ignored");
        return Ok(chunk.to_owned());
    }
    if chunk.starts_with("<code>admin:") {
        return Ok(chunk.to_owned());
    }

    let mut report = Vec::new();
    for word in chunk.split_whitespace() {
        if word.starts_with('@') {
            let Some(account) = AccountRef::parse(word) else { continue };
            if cx.moderation.account_policy(cx.actor, &account, policy)? {
                report.push(format!("    {} <code>{}</code>", policy.report_verb(), account));
            }
        } else if domain_re().is_match(word) {
            let domain = word.to_ascii_lowercase();
            if cx.config.is_excluded(&domain) {
                continue;
            }
            if cx.moderation.domain_policy(cx.actor, &domain, policy)? {
                report.push(format!("    {} <code>{}</code>", policy.report_verb(), domain));
            }
        }
    }
    if report.is_empty() {
        report.push("    No action.".to_owned());
    }
    tracing::info!(policy = policy.name(), actions = report.len(), "admin filter applied");
    Ok(report.join("\n") + "\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Authorization;
    use crate::memory::{HostCall, MemoryHost};

    fn args(path: &str) -> Vec<String> {
        path.split(':').map(String::from).collect()
    }

    fn run(filter: &Filter, chunk: &str, vars: &mut VarStore, host: &mut MemoryHost, actor: &Actor) -> String {
        let config = Config::default();
        let mut cx = FilterContext { vars, moderation: host, actor, config: &config, depth: 0, slot: 0 };
        filter.apply(chunk.to_owned(), &mut cx).unwrap()
    }

    fn quick(filter: &Filter, chunk: &str) -> String {
        run(filter, chunk, &mut VarStore::new(), &mut MemoryHost::new(), &Actor::new("alice"))
    }

    #[test]
    fn parse_names() {
        assert_eq!(
            Filter::parse(&args("s:cat:dog:odd")),
            Filter::Replace { pairs: vec![("cat".into(), "dog".into())], all: false }
        );
        assert!(matches!(Filter::parse(&args("GS:a:b")), Filter::Replace { all: true, .. }));
        assert_eq!(Filter::parse(&args("noanchors")), Filter::StripAnchors);
        assert_eq!(Filter::parse(&args("take:3")), Filter::Head(3));
        assert_eq!(Filter::parse(&args("admin:silence")), Filter::Admin(Policy::Silence));
        assert_eq!(Filter::parse(&args("admin:banish")), Filter::Identity);
        assert_eq!(Filter::parse(&args("sparkle")), Filter::Identity);
        assert_eq!(Filter::parse(&[]), Filter::Identity);
    }

    #[test]
    fn head_count_defaults_to_one() {
        assert_eq!(Filter::parse(&args("head:zero")), Filter::Head(1));
        assert_eq!(Filter::parse(&args("head:-4")), Filter::Head(1));
        assert_eq!(Filter::parse(&args("head")), Filter::Head(1));
    }

    #[test]
    fn replace_first_and_all() {
        let first = Filter::parse(&args("s:a:o"));
        let all = Filter::parse(&args("gs:a:o"));
        assert_eq!(quick(&first, "banana"), "bonana");
        assert_eq!(quick(&all, "banana"), "bonono");
    }

    #[test]
    fn replace_pairs_apply_in_order() {
        let f = Filter::parse(&args("gs:cat:dog:dog:wolf"));
        assert_eq!(quick(&f, "cat dog"), "wolf wolf");
    }

    #[test]
    fn strip_anchors_and_links() {
        assert_eq!(
            quick(&Filter::StripAnchors, r#"see <a href="https://x.example">this</a>!"#),
            "see this!"
        );
        assert_eq!(quick(&Filter::StripLinks, "go to https://x.example/a?b now"), "go to  now");
    }

    #[test]
    fn take_words_preserves_whitespace() {
        assert_eq!(take_words("  one two  three", 2), ("  one two", 2));
        assert_eq!(take_words("one", 5), ("one", 1));
        assert_eq!(take_words("one two", 0), ("", 0));
    }

    #[test]
    fn head_counts_across_chunks() {
        let mut vars = VarStore::new();
        let mut host = MemoryHost::new();
        let actor = Actor::new("alice");
        let f = Filter::Head(3);

        assert_eq!(run(&f, "a", &mut vars, &mut host, &actor), "a");
        assert_eq!(vars.get_int(&head_counter_key(0, 0)), Some(1));
        assert_eq!(run(&f, " b c", &mut vars, &mut host, &actor), " b c");
        assert_eq!(vars.get_int(&head_counter_key(0, 0)), Some(3));
        assert_eq!(run(&f, " d e f g", &mut vars, &mut host, &actor), "");
    }

    #[test]
    fn head_counters_are_kept_per_depth() {
        let mut vars = VarStore::new();
        let mut host = MemoryHost::new();
        let actor = Actor::new("alice");
        let config = Config::default();
        let f = Filter::Head(2);

        for depth in [0, 1] {
            let mut cx = FilterContext {
                vars: &mut vars,
                moderation: &mut host,
                actor: &actor,
                config: &config,
                depth,
                slot: 0,
            };
            assert_eq!(f.apply("a b c".to_owned(), &mut cx).unwrap(), "a b");
        }
        assert_eq!(vars.get_int(&head_counter_key(0, 0)), Some(2));
        assert_eq!(vars.get_int(&head_counter_key(1, 0)), Some(2));
    }

    #[test]
    fn admin_filter_reports_actions() {
        let mut host = MemoryHost::new();
        host.add_account("@spam@bad.example");
        let admin = Actor::new("root").with_authorization(Authorization::ADMIN);
        let out = run(
            &Filter::Admin(Policy::Silence),
            "@spam@bad.example @ghost evil.example monsterpit.net",
            &mut VarStore::new(),
            &mut host,
            &admin,
        );
        assert_eq!(
            out,
            "    Silenced <code>@spam@bad.example</code>\n    Silenced <code>evil.example</code>\n"
        );
        assert!(host.calls.contains(&HostCall::DomainPolicy {
            domain: "evil.example".into(),
            policy: Policy::Silence
        }));
    }

    #[test]
    fn admin_filter_without_targets() {
        let admin = Actor::new("root").with_authorization(Authorization::ADMIN);
        let out = run(
            &Filter::Admin(Policy::Suspend),
            "nothing here",
            &mut VarStore::new(),
            &mut MemoryHost::new(),
            &admin,
        );
        assert_eq!(out, "    No action.\n");
    }

    #[test]
    fn admin_filter_needs_authorization() {
        let mut host = MemoryHost::new();
        host.add_account("@spam");
        let out = run(
            &Filter::Admin(Policy::Suspend),
            "@spam",
            &mut VarStore::new(),
            &mut host,
            &Actor::new("pup"),
        );
        assert_eq!(out, "@spam");
        assert!(host.calls.is_empty());
    }
}
