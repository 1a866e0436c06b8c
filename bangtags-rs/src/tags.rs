//! Tag validation and normalization.
//!
//! Tags are namespaced with `.` (`self.draft`, `art.wip`); bangtag arguments
//! may spell the separator `:`, which is folded to `.` here.  A name ending in
//! `.` removes the whole namespace.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::post::Post;

fn valid_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[\w:._\-]*[\p{Alphabetic}:._·\-][\w:._\-]*$").expect("tag pattern")
    })
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[:.]+").expect("separator pattern"))
}

/// Returns `true` if `name` is acceptable as a tag.
pub fn is_valid(name: &str) -> bool {
    !name.is_empty() && valid_name().is_match(name)
}

/// Lowercase and fold runs of `:`/`.` into a single `.`.
///
/// Returns `None` for names that are invalid or reduce to nothing.
pub fn normalize(name: &str) -> Option<String> {
    if !is_valid(name) {
        return None;
    }
    let folded = separators().replace_all(&name.to_lowercase(), ".").into_owned();
    if folded.is_empty() || folded == "." {
        None
    } else {
        Some(folded)
    }
}

/// Add every valid tag in `names` to the post.  Returns how many were new.
pub fn add_tags<'a>(post: &mut Post, names: impl IntoIterator<Item = &'a str>) -> usize {
    let before = post.tags.len();
    post.tags.extend(names.into_iter().filter_map(normalize));
    post.tags.len() - before
}

/// Remove tags from the post.  A name ending in `.` removes that namespace
/// and everything under it.  Returns how many were removed.
pub fn remove_tags<'a>(post: &mut Post, names: impl IntoIterator<Item = &'a str>) -> usize {
    let doomed: BTreeSet<String> = names.into_iter().filter_map(normalize).collect();
    let before = post.tags.len();
    post.tags.retain(|tag| {
        !doomed.iter().any(|name| {
            if name.ends_with('.') {
                tag == name || tag.starts_with(name.as_str())
            } else {
                tag == name
            }
        })
    });
    before - post.tags.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_separators() {
        assert_eq!(normalize("Art:WIP").as_deref(), Some("art.wip"));
        assert_eq!(normalize("a::b..c").as_deref(), Some("a.b.c"));
        assert_eq!(normalize("self.draft").as_deref(), Some("self.draft"));
    }

    #[test]
    fn rejects_invalid_names() {
        assert_eq!(normalize("123"), None);
        assert_eq!(normalize("has space"), None);
        assert_eq!(normalize(""), None);
        assert_eq!(normalize(":"), None);
    }

    #[test]
    fn add_and_remove() {
        let mut post = Post::new("alice", "");
        assert_eq!(add_tags(&mut post, ["art.wip", "art.done", "cats", "123"]), 3);
        assert_eq!(add_tags(&mut post, ["cats"]), 0);

        assert_eq!(remove_tags(&mut post, ["art."]), 2);
        assert_eq!(post.tags.iter().collect::<Vec<_>>(), vec!["cats"]);

        assert_eq!(remove_tags(&mut post, ["dogs"]), 0);
        assert_eq!(remove_tags(&mut post, ["CATS"]), 1);
        assert!(post.tags.is_empty());
    }
}
